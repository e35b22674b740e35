// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host capability table.
//
// Everything that depends on the OS version or on optional third-party code
// is resolved once at startup into `HostCapabilities`. Components consult the
// table instead of branching on version numbers themselves.

use serde::{Deserialize, Serialize};
use tracing::info;

/// First API level with immersive system-bar flags (4.4).
pub const SDK_IMMERSIVE: u32 = 19;
/// First API level where the audio engine honours its private config file (5.0).
pub const SDK_AUDIO_CONFIG: u32 = 21;
/// First API level with runtime permission queries (6.0).
pub const SDK_RUNTIME_PERMISSIONS: u32 = 23;
/// First API level where background audio needs a visible service (7.0).
pub const SDK_AUDIO_CONTINUITY: u32 = 24;
/// First API level with `startForegroundService` and notification channels (8.0).
pub const SDK_FOREGROUND_SERVICE: u32 = 26;

/// Optional components found by probing at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResults {
    /// The third-party stereo surface library is present and usable.
    pub stereo_surface: bool,
    /// The permission-query API could be located.
    pub permission_api: bool,
}

/// Typed capability set consumed by the rest of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCapabilities {
    pub sdk_level: u32,
    pub supports_system_bar_flags: bool,
    pub supports_immersive_sticky: bool,
    pub writes_audio_config: bool,
    pub supports_runtime_permissions: bool,
    pub supports_audio_continuity: bool,
    pub supports_foreground_service: bool,
    pub supports_notification_channels: bool,
    /// Notification actions render as glyphs rather than text labels.
    pub notification_glyph_labels: bool,
    pub has_stereo_surface: bool,
}

impl HostCapabilities {
    /// Resolve the table for an API level and a set of probe results.
    pub fn resolve(sdk_level: u32, probes: ProbeResults) -> Self {
        let caps = Self {
            sdk_level,
            supports_system_bar_flags: sdk_level >= SDK_IMMERSIVE,
            supports_immersive_sticky: sdk_level >= SDK_IMMERSIVE,
            writes_audio_config: sdk_level >= SDK_AUDIO_CONFIG,
            supports_runtime_permissions: sdk_level >= SDK_RUNTIME_PERMISSIONS
                && probes.permission_api,
            supports_audio_continuity: sdk_level >= SDK_AUDIO_CONTINUITY,
            supports_foreground_service: sdk_level >= SDK_FOREGROUND_SERVICE,
            supports_notification_channels: sdk_level >= SDK_FOREGROUND_SERVICE,
            notification_glyph_labels: sdk_level >= SDK_AUDIO_CONTINUITY,
            has_stereo_surface: probes.stereo_surface,
        };
        info!(?caps, "host capabilities resolved");
        caps
    }

    /// Table for a desktop host: no OS version gates apply, nothing optional.
    pub fn desktop() -> Self {
        Self {
            sdk_level: 0,
            supports_system_bar_flags: false,
            supports_immersive_sticky: false,
            writes_audio_config: true,
            supports_runtime_permissions: false,
            supports_audio_continuity: false,
            supports_foreground_service: false,
            supports_notification_channels: false,
            notification_glyph_labels: true,
            has_stereo_surface: false,
        }
    }

    /// `View.setSystemUiVisibility` flags hiding the requested bars.
    ///
    /// Returns `None` when the host cannot change window decoration.
    pub fn system_ui_flags(&self, hide_status_bar: bool, hide_nav_bar: bool) -> Option<i32> {
        const LAYOUT_STABLE: i32 = 0x0000_0100;
        const LAYOUT_HIDE_NAVIGATION: i32 = 0x0000_0200;
        const LAYOUT_FULLSCREEN: i32 = 0x0000_0400;
        const HIDE_NAVIGATION: i32 = 0x0000_0002;
        const FULLSCREEN: i32 = 0x0000_0004;
        const IMMERSIVE_STICKY: i32 = 0x0000_1000;

        if !self.supports_system_bar_flags {
            return None;
        }

        let mut flags = LAYOUT_STABLE | LAYOUT_HIDE_NAVIGATION | LAYOUT_FULLSCREEN;
        if hide_status_bar {
            flags |= FULLSCREEN;
        }
        if hide_nav_bar {
            flags |= HIDE_NAVIGATION;
            if self.supports_immersive_sticky {
                flags |= IMMERSIVE_STICKY;
            }
        }
        Some(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_gates() {
        let kitkat = HostCapabilities::resolve(19, ProbeResults::default());
        assert!(kitkat.supports_system_bar_flags);
        assert!(!kitkat.writes_audio_config);
        assert!(!kitkat.supports_audio_continuity);

        let nougat = HostCapabilities::resolve(24, ProbeResults::default());
        assert!(nougat.supports_audio_continuity);
        assert!(!nougat.supports_foreground_service);

        let oreo = HostCapabilities::resolve(26, ProbeResults::default());
        assert!(oreo.supports_foreground_service);
        assert!(oreo.supports_notification_channels);
    }

    #[test]
    fn permissions_need_the_query_api() {
        let without = HostCapabilities::resolve(30, ProbeResults::default());
        assert!(!without.supports_runtime_permissions);

        let with = HostCapabilities::resolve(30, ProbeResults { permission_api: true, ..Default::default() });
        assert!(with.supports_runtime_permissions);
    }

    #[test]
    fn system_ui_flags() {
        let caps = HostCapabilities::resolve(28, ProbeResults::default());
        assert_eq!(caps.system_ui_flags(true, true), Some(0x0700 | 0x2 | 0x4 | 0x1000));
        assert_eq!(caps.system_ui_flags(false, false), Some(0x0700));
        assert_eq!(HostCapabilities::resolve(16, ProbeResults::default()).system_ui_flags(true, true), None);
    }
}
