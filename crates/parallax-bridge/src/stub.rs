// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Desktop platform for the harness and CI.
//
// No sensors, no services, no permission system. UI sinks are logged,
// `content://` references are treated as plain paths, and UI tasks queue up
// until the harness drains them.

use std::fs::File;
use std::os::fd::OwnedFd;
use std::sync::atomic::{AtomicBool, Ordering};

use parallax_core::capabilities::HostCapabilities;
use parallax_core::error::{ParallaxError, Result};
use parallax_core::types::{CONTENT_SCHEME, ScreenRotation, SensorInventory, SensorKind};
use tracing::{error, info, warn};

use crate::traits::*;
use crate::ui_queue::UiTaskQueue;

#[derive(Default)]
pub struct StubPlatform {
    ui: UiTaskQueue,
    exit_requested: AtomicBool,
}

impl StubPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run queued UI work; the harness calls this from its main loop.
    pub fn drain_ui(&self) -> usize {
        self.ui.drain()
    }

    /// Set once the app asked to close or a fatal dialog was shown.
    pub fn exit_requested(&self) -> bool {
        self.exit_requested.load(Ordering::Acquire)
    }
}

impl UiThread for StubPlatform {
    fn run_on_ui_thread(&self, task: UiTask) {
        self.ui.post(task);
    }
}

impl HostUi for StubPlatform {
    fn show_toast(&self, text: &str) {
        info!(text, "toast");
    }

    fn show_message(&self, text: &str) {
        info!(text, "message");
    }

    fn show_fatal_dialog(&self, text: &str) {
        error!("{text}");
        self.exit_requested.store(true, Ordering::Release);
    }

    fn set_window_title(&self, title: &str) {
        info!(title, "window title");
    }

    fn set_system_ui_flags(&self, flags: i32) {
        info!(flags = format_args!("{flags:#x}"), "system UI flags");
    }

    fn finish(&self) {
        info!("exit requested");
        self.exit_requested.store(true, Ordering::Release);
    }

    fn default_back_pressed(&self) {
        self.finish();
    }
}

impl SensorHub for StubPlatform {
    fn inventory(&self) -> SensorInventory {
        SensorInventory::default()
    }

    fn register(&self, kind: SensorKind) -> Result<()> {
        warn!(?kind, "SensorHub::register called on stub platform");
        Err(ParallaxError::PlatformUnavailable)
    }

    fn unregister(&self) {}

    fn display_rotation(&self) -> ScreenRotation {
        ScreenRotation::Deg0
    }
}

impl ContentResolver for StubPlatform {
    fn open_read_only(&self, reference: &str) -> Result<OwnedFd> {
        let path = reference.strip_prefix(CONTENT_SCHEME).unwrap_or(reference);
        Ok(File::open(path)?.into())
    }
}

impl ServiceControl for StubPlatform {
    fn start_foreground_service(&self, _title: &str) -> Result<()> {
        warn!("ServiceControl::start_foreground_service called on stub platform");
        Err(ParallaxError::PlatformUnavailable)
    }

    fn start_service(&self, _title: &str) -> Result<()> {
        warn!("ServiceControl::start_service called on stub platform");
        Err(ParallaxError::PlatformUnavailable)
    }

    fn stop_service(&self) -> Result<()> {
        Ok(())
    }

    fn acquire_wake_lock(&self, tag: &str) -> Result<()> {
        info!(tag, "wake lock held");
        Ok(())
    }

    fn release_wake_lock(&self) -> Result<()> {
        info!("wake lock released");
        Ok(())
    }
}

impl Permissions for StubPlatform {
    fn is_granted(&self, _permission: &str) -> Option<bool> {
        None
    }

    fn request(&self, _permission: &str) {}
}

impl HostPlatform for StubPlatform {
    fn platform_name(&self) -> String {
        format!("Desktop ({})", std::env::consts::OS)
    }

    fn capabilities(&self) -> HostCapabilities {
        HostCapabilities::desktop()
    }
}
