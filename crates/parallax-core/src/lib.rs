// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Parallax — Core types, capability table and error definitions shared across all crates.

pub mod capabilities;
pub mod config;
pub mod error;
pub mod types;

pub use capabilities::HostCapabilities;
pub use config::AppConfig;
pub use error::ParallaxError;
pub use types::*;
