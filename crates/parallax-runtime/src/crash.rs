// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persisted crash / diagnostic records for fatal launch failures.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parallax_core::error::{ParallaxError, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::report::NativeLoadReport;

/// One fatal failure, written as JSON under the crash directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Human-readable platform, e.g. "Android (API 29)".
    pub platform: String,
    /// Short reason, e.g. "native libraries failed to load".
    pub reason: String,
    /// Full diagnostic text.
    pub details: String,
    /// Structured report, when the failure came from the loader.
    pub load_report: Option<NativeLoadReport>,
}

impl CrashRecord {
    pub fn new(platform: impl Into<String>, reason: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            platform: platform.into(),
            reason: reason.into(),
            details: details.into(),
            load_report: None,
        }
    }

    /// Record for a failed native load pass.
    pub fn from_load_report(platform: impl Into<String>, report: &NativeLoadReport) -> Self {
        Self {
            load_report: Some(report.clone()),
            ..Self::new(platform, "native libraries failed to load", report.to_string())
        }
    }

    fn file_name(&self) -> String {
        format!("crash-{}-{}.json", self.timestamp.format("%Y%m%dT%H%M%S"), self.id)
    }

    /// Write the record into `dir`, creating it if needed.
    #[instrument(skip(self), fields(id = %self.id))]
    pub fn persist(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, serde_json::to_vec_pretty(self)?)?;
        info!(path = %path.display(), "crash record persisted");
        Ok(path)
    }

    /// Read every record in `dir`, oldest first. Unreadable files are skipped.
    pub fn load_all(dir: &Path) -> Result<Vec<CrashRecord>> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed: Result<CrashRecord> = std::fs::read(&path)
                .map_err(ParallaxError::from)
                .and_then(|bytes| serde_json::from_slice(&bytes).map_err(ParallaxError::from));
            match parsed {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable crash record");
                }
            }
        }
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }
}
