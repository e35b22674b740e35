// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ParallaxError, Result};

/// File name of the settings file inside the data directory.
pub const CONFIG_FILE: &str = "parallax.json";

/// Package id used when no config file names one.
pub const DEFAULT_APPLICATION_ID: &str = "com.parallax";

/// Persistent host settings.
///
/// Every field has a production default, so a config file only needs to name
/// what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Package / application id, also used as the prefix of intent actions.
    pub application_id: String,
    /// C++ runtime library candidates, tried in order; the first success wins.
    pub runtime_libraries: Vec<String>,
    /// Feature libraries in dependency order. The last entry is the
    /// top-level application library that exports the engine entry points.
    pub feature_libraries: Vec<String>,
    /// Directory to load native libraries from. `None` lets the dynamic
    /// linker search its default path (the APK's native library dir).
    pub library_dir: Option<PathBuf>,
    /// App-private data directory (audio config, crash records).
    pub data_dir: PathBuf,
    /// Notification channel used by the background playback service.
    pub notification_channel_id: String,
    /// Notification title used when the engine supplies none.
    pub default_playback_title: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            application_id: DEFAULT_APPLICATION_ID.into(),
            runtime_libraries: vec!["c++_shared".into(), "gnustl_shared".into()],
            feature_libraries: [
                // codec/runtime support
                "freetype",
                "avutil-54",
                "swresample-1",
                // media codecs
                "avcodec-56",
                "avformat-56",
                "swscale-3",
                // audio
                "openal",
                // shared utility
                "StShared",
                // widgets / core
                "StGLWidgets",
                "StCore",
                // output modes
                "StOutAnaglyph",
                "StOutDistorted",
                "StOutInterlace",
                // applications
                "StImageViewer",
                "StMoviePlayer",
                // top-level application library
                "sview",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            library_dir: None,
            data_dir: default_data_dir(),
            notification_channel_id: "com.parallax.audio_channel".into(),
            default_playback_title: "Audio playback".into(),
        }
    }
}

impl AppConfig {
    /// Load settings from a JSON file.
    ///
    /// A missing file is not an error: the defaults are returned instead.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Load the settings file kept in an app-private files directory.
    ///
    /// The directory the host reports becomes `data_dir`, whatever the file
    /// says.
    pub fn load_in(files_dir: impl Into<PathBuf>) -> Result<Self> {
        let files_dir = files_dir.into();
        let mut config = Self::load(files_dir.join(CONFIG_FILE))?;
        config.data_dir = files_dir;
        Ok(config)
    }

    /// Write the settings to a JSON file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.feature_libraries.is_empty() {
            return Err(ParallaxError::Config(
                "feature_libraries must name at least the top-level application library".into(),
            ));
        }
        if self.application_id.trim().is_empty() {
            return Err(ParallaxError::Config("application_id is empty".into()));
        }
        Ok(())
    }

    /// The top-level application library (last in load order).
    pub fn application_library(&self) -> Option<&str> {
        self.feature_libraries.last().map(String::as_str)
    }

    /// Default location of the settings file.
    pub fn default_path() -> PathBuf {
        Self::default().data_dir.join(CONFIG_FILE)
    }

    /// Directory holding the audio engine's own configuration file.
    pub fn audio_config_dir(&self) -> PathBuf {
        self.data_dir.join("openal")
    }

    /// Search path the audio engine uses for HRTF tables.
    pub fn hrtf_search_dir(&self) -> PathBuf {
        self.audio_config_dir().join("hrtf")
    }

    /// Directory receiving persisted crash / diagnostic records.
    pub fn crash_dir(&self) -> PathBuf {
        self.data_dir.join("crash")
    }
}

/// Files directory Android assigns to `application_id` for the primary user.
pub fn package_data_dir(application_id: &str) -> PathBuf {
    PathBuf::from("/data/data").join(application_id).join("files")
}

#[cfg(target_os = "android")]
fn default_data_dir() -> PathBuf {
    package_data_dir(DEFAULT_APPLICATION_ID)
}

#[cfg(not(target_os = "android"))]
fn default_data_dir() -> PathBuf {
    // Try XDG data dir, then fallback to home
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg).join("parallax");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share").join("parallax");
    }
    // Last resort
    PathBuf::from("/tmp/parallax")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_end_with_application_library() {
        let config = AppConfig::default();
        assert_eq!(config.application_library(), Some("sview"));
        assert_eq!(config.runtime_libraries[0], "c++_shared");
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parallax.json");
        std::fs::write(&path, r#"{ "library_dir": "/opt/parallax/lib" }"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.library_dir, Some(PathBuf::from("/opt/parallax/lib")));
        assert_eq!(config.application_id, "com.parallax");
    }

    #[test]
    fn empty_library_list_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parallax.json");
        std::fs::write(&path, r#"{ "feature_libraries": [] }"#).unwrap();

        assert!(matches!(AppConfig::load(&path), Err(ParallaxError::Config(_))));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("parallax.json");
        let mut config = AppConfig::default();
        config.data_dir = dir.path().to_path_buf();
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.crash_dir(), dir.path().join("crash"));
        assert_eq!(loaded.hrtf_search_dir(), dir.path().join("openal").join("hrtf"));
    }

    #[test]
    fn host_files_dir_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{ "application_id": "org.example.viewer", "data_dir": "/data/data/com.parallax/files" }"#,
        )
        .unwrap();

        let config = AppConfig::load_in(dir.path()).unwrap();
        assert_eq!(config.application_id, "org.example.viewer");
        assert_eq!(config.data_dir, dir.path());
        assert_eq!(config.crash_dir(), dir.path().join("crash"));
    }

    #[test]
    fn empty_files_dir_gives_defaults_there() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_in(dir.path()).unwrap();
        assert_eq!(config.application_id, DEFAULT_APPLICATION_ID);
        assert_eq!(config.audio_config_dir(), dir.path().join("openal"));
    }

    #[test]
    fn package_dir_follows_application_id() {
        assert_eq!(package_data_dir("org.example.viewer"), PathBuf::from("/data/data/org.example.viewer/files"));
        assert_eq!(package_data_dir(DEFAULT_APPLICATION_ID), PathBuf::from("/data/data/com.parallax/files"));
    }
}
