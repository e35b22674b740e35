// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Parallax.

use thiserror::Error;

/// Top-level error type for all Parallax operations.
#[derive(Debug, Error)]
pub enum ParallaxError {
    // -- Native runtime --
    #[error("native library load failed: {0}")]
    NativeLoad(String),

    #[error("native engine entry point missing: {0}")]
    EngineSymbol(String),

    // -- Host lifecycle --
    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("native surface failed to start: {0}")]
    Surface(String),

    #[error("orientation sensor error: {0}")]
    Sensor(String),

    #[error("content reference could not be resolved: {0}")]
    ContentResolution(String),

    #[error("playback service error: {0}")]
    Service(String),

    // -- Storage / persistence --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

impl ParallaxError {
    /// Whether this error ends the process launch (no retry is possible).
    ///
    /// A missing native dependency cannot heal within the same process, and a
    /// surface that failed to start leaves nothing to render into.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NativeLoad(_) | Self::EngineSymbol(_) | Self::Surface(_))
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ParallaxError>;
