// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Audio engine configuration file.
//
// The audio library reads `alsoft.conf` from its config directory during its
// own startup, so the file must exist before the native libraries load. It is
// written once; an existing file is left alone.

use std::path::PathBuf;

use parallax_core::error::Result;
use parallax_core::{AppConfig, HostCapabilities};
use tracing::{debug, info, instrument};

/// File name the audio engine looks for.
pub const AUDIO_CONFIG_FILE: &str = "alsoft.conf";

/// What [`ensure_audio_config`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioConfigOutcome {
    Written(PathBuf),
    AlreadyPresent(PathBuf),
    /// The host does not support a private audio config.
    Skipped,
}

/// Write the audio engine's config file if the host supports it and it does
/// not exist yet.
#[instrument(skip_all, fields(dir = %config.audio_config_dir().display()))]
pub fn ensure_audio_config(
    config: &AppConfig,
    caps: &HostCapabilities,
) -> Result<AudioConfigOutcome> {
    if !caps.writes_audio_config {
        debug!("audio config not supported on this host");
        return Ok(AudioConfigOutcome::Skipped);
    }

    let dir = config.audio_config_dir();
    let path = dir.join(AUDIO_CONFIG_FILE);
    if path.exists() {
        debug!("audio config already present");
        return Ok(AudioConfigOutcome::AlreadyPresent(path));
    }

    let hrtf_dir = config.hrtf_search_dir();
    std::fs::create_dir_all(&hrtf_dir)?;
    std::fs::write(&path, render(&hrtf_dir))?;
    info!(path = %path.display(), "audio config written");
    Ok(AudioConfigOutcome::Written(path))
}

fn render(hrtf_dir: &std::path::Path) -> String {
    format!(
        "# Written on first launch; edit freely.\n[general]\nhrtf-paths = {}\n",
        hrtf_dir.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use parallax_core::capabilities::ProbeResults;

    fn config_in(dir: &std::path::Path) -> AppConfig {
        AppConfig {
            data_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn written_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let caps = HostCapabilities::resolve(28, ProbeResults::default());

        let first = ensure_audio_config(&config, &caps).unwrap();
        let AudioConfigOutcome::Written(path) = first else {
            panic!("expected a fresh write, got {first:?}");
        };
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[general]"));
        assert!(text.contains(&format!("hrtf-paths = {}", config.hrtf_search_dir().display())));
        assert!(config.hrtf_search_dir().is_dir());

        // User edits survive later launches.
        std::fs::write(&path, "[general]\nhrtf = true\n").unwrap();
        assert_eq!(
            ensure_audio_config(&config, &caps).unwrap(),
            AudioConfigOutcome::AlreadyPresent(path.clone())
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[general]\nhrtf = true\n");
    }

    #[test]
    fn skipped_on_old_hosts() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let caps = HostCapabilities::resolve(19, ProbeResults::default());

        assert_eq!(ensure_audio_config(&config, &caps).unwrap(), AudioConfigOutcome::Skipped);
        assert!(!config.audio_config_dir().exists());
    }
}
