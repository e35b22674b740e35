// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Native runtime loader.
//
// The C++ runtime is loaded first (primary name, then the legacy name), then
// every feature library in dependency order. A failure never stops the pass:
// the report has to name *all* missing libraries, not just the first one.
// The pass runs at most once per loader; later callers get the memoized
// report.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use libloading::Library;
use parallax_core::AppConfig;
use tracing::{debug, error, info, warn};

use crate::report::{LoadOutcome, NativeLoadReport};

/// Why a single library did not load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadFailure {
    Unavailable(String),
    SecurityDenied(String),
}

impl LoadFailure {
    /// Classify a dynamic-linker message.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        let denied = ["permission denied", "eacces", "not permitted", "security"]
            .iter()
            .any(|needle| lower.contains(needle));
        if denied {
            Self::SecurityDenied(message)
        } else {
            Self::Unavailable(message)
        }
    }

    fn into_parts(self) -> (LoadOutcome, String) {
        match self {
            Self::Unavailable(msg) => (LoadOutcome::Unavailable, msg),
            Self::SecurityDenied(msg) => (LoadOutcome::SecurityDenied, msg),
        }
    }
}

/// Something that can bring a named native library into the process.
pub trait LibraryLoader: Send + Sync {
    fn load(&self, name: &str) -> Result<(), LoadFailure>;
}

/// `dlopen`-backed loader.
///
/// Loaded libraries are kept for the lifetime of the loader, which for the
/// process-wide instance is the lifetime of the process.
#[derive(Debug, Default)]
pub struct DlopenLoader {
    dir: Option<PathBuf>,
    libraries: Mutex<Vec<Library>>,
}

impl DlopenLoader {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            libraries: Mutex::new(Vec::new()),
        }
    }

    /// Platform file name for a library, inside the search dir if one is set.
    pub fn library_path(&self, name: &str) -> PathBuf {
        let file = PathBuf::from(libloading::library_filename(name));
        match &self.dir {
            Some(dir) => dir.join(file),
            None => file,
        }
    }
}

impl LibraryLoader for DlopenLoader {
    fn load(&self, name: &str) -> Result<(), LoadFailure> {
        let path = self.library_path(name);
        // SAFETY: loading runs the library's initialisers. The library list
        // is fixed by the package, which ships these libraries itself.
        let library = unsafe { Library::new(&path) }
            .map_err(|e| LoadFailure::from_message(e.to_string()))?;
        self.libraries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(library);
        Ok(())
    }
}

/// Ordered library names for one load pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlan {
    /// Runtime candidates; first success wins.
    pub runtime: Vec<String>,
    /// Feature libraries in dependency order.
    pub features: Vec<String>,
}

impl LoadPlan {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            runtime: config.runtime_libraries.clone(),
            features: config.feature_libraries.clone(),
        }
    }
}

/// Memoizing runner for a [`LoadPlan`].
pub struct RuntimeLoader<L> {
    plan: LoadPlan,
    loader: L,
    report: OnceLock<NativeLoadReport>,
}

impl<L: LibraryLoader> RuntimeLoader<L> {
    pub fn new(plan: LoadPlan, loader: L) -> Self {
        Self {
            plan,
            loader,
            report: OnceLock::new(),
        }
    }

    /// Run the load pass on first call; return the memoized report after.
    ///
    /// Concurrent first callers block until the single pass completes.
    pub fn load_all(&self) -> &NativeLoadReport {
        self.report.get_or_init(|| self.attempt())
    }

    /// Whether the pass has already run.
    pub fn attempted(&self) -> bool {
        self.report.get().is_some()
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    fn attempt(&self) -> NativeLoadReport {
        let mut report = NativeLoadReport::new();

        let mut last_runtime_failure = None;
        for name in &self.plan.runtime {
            match self.loader.load(name) {
                Ok(()) => {
                    info!(library = %name, "C++ runtime loaded");
                    report.push(name, LoadOutcome::Loaded, String::new());
                    report.mark_runtime_loaded();
                    last_runtime_failure = None;
                    break;
                }
                Err(failure) => {
                    debug!(library = %name, ?failure, "C++ runtime candidate unavailable");
                    last_runtime_failure = Some((name, failure));
                }
            }
        }
        if let Some((name, failure)) = last_runtime_failure {
            warn!(library = %name, "no C++ runtime candidate could be loaded");
            let (outcome, detail) = failure.into_parts();
            report.push(name, outcome, detail);
        }

        for name in &self.plan.features {
            match self.loader.load(name) {
                Ok(()) => {
                    debug!(library = %name, "native library loaded");
                    report.push(name, LoadOutcome::Loaded, String::new());
                }
                Err(failure) => {
                    error!(library = %name, ?failure, "native library failed to load");
                    let (outcome, detail) = failure.into_parts();
                    report.push(name, outcome, detail);
                    report.mark_feature_failed();
                }
            }
        }

        info!(
            success = report.is_success(),
            attempts = report.entries().len(),
            "native load pass finished"
        );
        report
    }
}

/// Process-wide load pass.
///
/// The first caller's configuration decides the plan; every later call
/// returns the same report without touching the dynamic linker again.
pub fn load_natives(config: &AppConfig) -> &'static NativeLoadReport {
    static LOADER: OnceLock<RuntimeLoader<DlopenLoader>> = OnceLock::new();
    LOADER
        .get_or_init(|| {
            RuntimeLoader::new(
                LoadPlan::from_config(config),
                DlopenLoader::new(config.library_dir.clone()),
            )
        })
        .load_all()
}

/// Resolve the on-disk path of a library the way [`DlopenLoader`] would.
pub fn resolve_library_path(dir: Option<&Path>, name: &str) -> PathBuf {
    DlopenLoader::new(dir.map(Path::to_path_buf)).library_path(name)
}
