// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Native load report: ordered log of every library load attempt.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of a single library load attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadOutcome {
    Loaded,
    /// The library (or one of its dependencies) could not be found or linked.
    Unavailable,
    /// The loader refused the library for security reasons.
    SecurityDenied,
}

/// One line of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryLoadEntry {
    pub name: String,
    pub outcome: LoadOutcome,
    /// Loader message; empty for successful loads.
    pub detail: String,
}

/// Full report of one load pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeLoadReport {
    entries: Vec<LibraryLoadEntry>,
    runtime_loaded: bool,
    features_loaded: bool,
}

impl NativeLoadReport {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            runtime_loaded: false,
            features_loaded: true,
        }
    }

    pub(crate) fn push(&mut self, name: &str, outcome: LoadOutcome, detail: String) {
        self.entries.push(LibraryLoadEntry {
            name: name.to_owned(),
            outcome,
            detail,
        });
    }

    pub(crate) fn mark_runtime_loaded(&mut self) {
        self.runtime_loaded = true;
    }

    pub(crate) fn mark_feature_failed(&mut self) {
        self.features_loaded = false;
    }

    /// Every attempt, in load order.
    pub fn entries(&self) -> &[LibraryLoadEntry] {
        &self.entries
    }

    /// Look up the latest attempt for a library.
    pub fn entry(&self, name: &str) -> Option<&LibraryLoadEntry> {
        self.entries.iter().rev().find(|e| e.name == name)
    }

    pub fn runtime_loaded(&self) -> bool {
        self.runtime_loaded
    }

    /// Runtime loaded and every feature library loaded.
    pub fn is_success(&self) -> bool {
        self.runtime_loaded && self.features_loaded
    }

    /// Attempts that did not load.
    pub fn failures(&self) -> impl Iterator<Item = &LibraryLoadEntry> {
        self.entries.iter().filter(|e| e.outcome != LoadOutcome::Loaded)
    }

    /// Text of the blocking dialog shown when the launch cannot continue.
    pub fn fatal_message(&self) -> String {
        format!("Broken package?\n{self}")
    }
}

impl fmt::Display for NativeLoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            match entry.outcome {
                LoadOutcome::Loaded => {
                    writeln!(f, "Info:  native library \"{}\" has been loaded", entry.name)?
                }
                LoadOutcome::Unavailable => writeln!(
                    f,
                    "Error: native library \"{}\" is unavailable:\n  {}",
                    entry.name, entry.detail
                )?,
                LoadOutcome::SecurityDenied => writeln!(
                    f,
                    "Error: native library \"{}\" can not be loaded for security reasons:\n  {}",
                    entry.name, entry.detail
                )?,
            }
        }
        Ok(())
    }
}
