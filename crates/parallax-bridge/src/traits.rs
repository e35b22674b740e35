// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Seams between the lifecycle bridge and the outside world.
//
// `NativeEngine` is the engine side: every call takes the live handle, which
// the caller has just checked. The remaining traits are the host platform,
// grouped under `HostPlatform` the same way each OS glue module provides one
// implementation of the whole set.

use std::os::fd::OwnedFd;

use parallax_core::capabilities::HostCapabilities;
use parallax_core::error::{ParallaxError, Result};
use parallax_core::types::{Quaternion, ScreenRotation, SensorInventory, SensorKind};

use crate::continuity::{NotificationChannel, PlaybackNotification};
use crate::handle::BridgeHandle;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Entry points of the native engine.
pub trait NativeEngine: Send + Sync {
    /// Hand over the file (or transport action tag) to open.
    fn set_open_path(&self, handle: BridgeHandle, path: &str, mime: &str, from_history: bool);

    fn set_orientation_quaternion(&self, handle: BridgeHandle, quat: Quaternion, screen_rotation_deg: f32);

    fn set_orientation_legacy(
        &self,
        handle: BridgeHandle,
        azimuth: f32,
        pitch: f32,
        roll: f32,
        screen_rotation_deg: f32,
    );

    /// Tell the engine whether head tracking is possible and how far to trust it.
    fn define_orientation_sensor(&self, handle: BridgeHandle, has_sensor: bool, is_low_quality: bool);

    fn on_back_pressed(&self, handle: BridgeHandle);

    /// Bracket a surface reconfiguration (`true` before, `false` after).
    fn on_before_surface_changed(&self, handle: BridgeHandle, is_before: bool);

    /// Whether the engine consumes this key code itself.
    fn is_key_overridden(&self, handle: BridgeHandle, key_code: i32) -> bool;

    fn set_swap_eyes(&self, handle: BridgeHandle, swap: bool);
}

// ---------------------------------------------------------------------------
// Host platform
// ---------------------------------------------------------------------------

/// Work item scheduled on the UI thread.
pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// Marshal closures onto the thread that owns the UI.
pub trait UiThread {
    fn run_on_ui_thread(&self, task: UiTask);
}

/// Visual sinks. Called on the UI thread only.
pub trait HostUi {
    fn show_toast(&self, text: &str);

    /// Non-fatal message dialog with a single dismiss button.
    fn show_message(&self, text: &str);

    /// Blocking dialog whose only button leaves the app.
    fn show_fatal_dialog(&self, text: &str);

    fn set_window_title(&self, title: &str);

    /// Apply `View.setSystemUiVisibility` flags to the decor view.
    fn set_system_ui_flags(&self, flags: i32);

    /// Close the activity.
    fn finish(&self);

    /// The platform's own back-button behaviour.
    fn default_back_pressed(&self);
}

/// Orientation sensor registration.
pub trait SensorHub {
    fn inventory(&self) -> SensorInventory;

    /// Register for `kind` at the fastest delivery rate.
    fn register(&self, kind: SensorKind) -> Result<()>;

    fn unregister(&self);

    fn display_rotation(&self) -> ScreenRotation;
}

/// Open abstract content references.
pub trait ContentResolver {
    /// Open a read-only descriptor for a `content://` reference.
    fn open_read_only(&self, reference: &str) -> Result<OwnedFd>;
}

/// Activity-side control of the playback service and wake lock.
pub trait ServiceControl {
    /// `startForegroundService` with the start action.
    fn start_foreground_service(&self, title: &str) -> Result<()>;

    /// Plain `startService` with the start action.
    fn start_service(&self, title: &str) -> Result<()>;

    fn stop_service(&self) -> Result<()>;

    fn acquire_wake_lock(&self, tag: &str) -> Result<()>;

    fn release_wake_lock(&self) -> Result<()>;
}

/// Service-side notification surface.
pub trait ForegroundSink {
    fn create_channel(&self, channel: &NotificationChannel) -> Result<()>;

    /// Enter the foreground with `notification`, replacing any previous one
    /// carrying the same id.
    fn post_foreground(&self, notification: &PlaybackNotification) -> Result<()>;

    /// Leave the foreground, remove the notification and stop the service.
    fn stop_foreground(&self) -> Result<()>;
}

/// Runtime permission queries.
pub trait Permissions {
    /// `Some(granted)`, or `None` when the query API is absent.
    fn is_granted(&self, permission: &str) -> Option<bool>;

    fn request(&self, permission: &str);
}

/// One platform implementation of every host seam.
pub trait HostPlatform:
    UiThread + HostUi + SensorHub + ContentResolver + ServiceControl + Permissions + Send + Sync
{
    /// Human-readable platform name (e.g. "Android 14").
    fn platform_name(&self) -> String;

    /// Probe the host once and build the capability table.
    fn capabilities(&self) -> HostCapabilities;

    /// Switch the optional stereo output surface.
    fn set_stereo_surface(&self, _enabled: bool) -> Result<()> {
        Err(ParallaxError::PlatformUnavailable)
    }
}
