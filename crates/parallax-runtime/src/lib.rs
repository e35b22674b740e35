// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Parallax — native runtime bootstrap.
//
// Loads the engine's shared libraries once per process, records what
// happened, and persists diagnostics when the launch cannot continue.

pub mod audio_config;
pub mod crash;
pub mod loader;
pub mod report;

pub use audio_config::{AudioConfigOutcome, ensure_audio_config};
pub use crash::CrashRecord;
pub use loader::{DlopenLoader, LibraryLoader, LoadFailure, LoadPlan, RuntimeLoader, load_natives};
pub use report::{LibraryLoadEntry, LoadOutcome, NativeLoadReport};
