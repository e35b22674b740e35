// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host activity orchestration.
//
// `launch` runs once before any activity exists: capability probe, audio
// config, native load pass, and the fatal path if that pass failed.
// `HostActivity` then owns the engine handle for one activity instance and
// routes host lifecycle events and engine requests to the components.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parallax_core::capabilities::HostCapabilities;
use parallax_core::config::AppConfig;
use parallax_core::error::{ParallaxError, Result};
use parallax_core::types::{ActivityId, LaunchRequest, OpenRequest, SensorKind, TransportCommand};
use parallax_runtime::audio_config::ensure_audio_config;
use parallax_runtime::crash::CrashRecord;
use parallax_runtime::report::NativeLoadReport;
use tracing::{debug, error, info, warn};

use crate::content::{ContentReferences, FdPathProbe, ProcSelfFd};
use crate::continuity::{ContinuityService, PlaybackTarget};
use crate::handle::{BridgeHandle, BridgeSlot};
use crate::open_path::OpenPathResolver;
use crate::orientation::OrientationAdapter;
use crate::traits::{HostPlatform, NativeEngine};

/// Requested once per activity so the engine can open sibling files.
pub const STORAGE_PERMISSION: &str = "android.permission.READ_EXTERNAL_STORAGE";

/// Probe the host, prepare the audio config, and run the native load pass.
///
/// A failed pass is fatal: the report is shown, a crash record persisted,
/// and the error returned so the caller stops the launch.
pub fn launch<'r>(
    config: &AppConfig,
    platform: &Arc<dyn HostPlatform>,
    load: impl FnOnce(&AppConfig) -> &'r NativeLoadReport,
) -> Result<HostCapabilities> {
    let caps = platform.capabilities();

    // The audio engine reads its config while loading, so this goes first.
    if let Err(e) = ensure_audio_config(config, &caps) {
        warn!(error = %e, "audio config not written");
    }

    let report = load(config);
    if report.is_success() {
        info!(libraries = report.entries().len(), "native libraries loaded");
        return Ok(caps);
    }

    let failed: Vec<&str> = report.failures().map(|e| e.name.as_str()).collect();
    let record = CrashRecord::from_load_report(platform.platform_name(), report);
    present_fatal(platform, config, record, report.fatal_message());
    Err(ParallaxError::NativeLoad(failed.join(", ")))
}

/// Show the blocking "broken package" dialog and persist a crash record.
pub fn present_fatal(platform: &Arc<dyn HostPlatform>, config: &AppConfig, record: CrashRecord, dialog: String) {
    error!(reason = %record.reason, "fatal launch failure");
    match record.persist(&config.crash_dir()) {
        Ok(path) => info!(path = %path.display(), "crash record saved"),
        Err(e) => error!(error = %e, "crash record could not be saved"),
    }
    let ui = Arc::clone(platform);
    platform.run_on_ui_thread(Box::new(move || ui.show_fatal_dialog(&dialog)));
}

/// Everything an activity needs from the launch.
pub struct ActivityContext {
    pub config: AppConfig,
    pub caps: HostCapabilities,
    pub platform: Arc<dyn HostPlatform>,
    pub engine: Arc<dyn NativeEngine>,
    pub continuity: Arc<ContinuityService>,
    pub probe: Box<dyn FdPathProbe>,
}

impl ActivityContext {
    pub fn new(
        config: AppConfig,
        caps: HostCapabilities,
        platform: Arc<dyn HostPlatform>,
        engine: Arc<dyn NativeEngine>,
        continuity: Arc<ContinuityService>,
    ) -> Self {
        Self { config, caps, platform, engine, continuity, probe: Box::new(ProcSelfFd) }
    }
}

/// Who handled a back press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackPress {
    Engine,
    Platform,
}

pub struct HostActivity {
    id: ActivityId,
    me: Weak<HostActivity>,
    config: AppConfig,
    caps: HostCapabilities,
    platform: Arc<dyn HostPlatform>,
    engine: Arc<dyn NativeEngine>,
    continuity: Arc<ContinuityService>,
    probe: Box<dyn FdPathProbe>,
    slot: BridgeSlot,
    orientation: OrientationAdapter,
    open_path: OpenPathResolver,
    permission_requested: AtomicBool,
    resumed: AtomicBool,
}

impl HostActivity {
    /// `onCreate` after a successful launch.
    pub fn create(ctx: ActivityContext, launch: Option<LaunchRequest>) -> Arc<Self> {
        let orientation = OrientationAdapter::new(ctx.platform.inventory());
        let activity = Arc::new_cyclic(|me| Self {
            id: ActivityId::next(),
            me: me.clone(),
            config: ctx.config,
            caps: ctx.caps,
            platform: ctx.platform,
            engine: ctx.engine,
            continuity: ctx.continuity,
            probe: ctx.probe,
            slot: BridgeSlot::empty(),
            orientation,
            open_path: OpenPathResolver::new(launch),
            permission_requested: AtomicBool::new(false),
            resumed: AtomicBool::new(false),
        });
        info!(id = %activity.id, "activity created");
        activity.ensure_storage_permission();
        activity
    }

    pub fn id(&self) -> ActivityId {
        self.id
    }

    pub fn caps(&self) -> &HostCapabilities {
        &self.caps
    }

    pub fn orientation(&self) -> &OrientationAdapter {
        &self.orientation
    }

    pub fn continuity(&self) -> &Arc<ContinuityService> {
        &self.continuity
    }

    pub fn is_native_live(&self) -> bool {
        self.slot.is_live()
    }

    /// Queue `task` for the UI thread. Dropped if the activity is gone by then.
    fn on_ui(&self, task: impl FnOnce(&HostActivity) + Send + 'static) {
        let me = self.me.clone();
        self.platform.run_on_ui_thread(Box::new(move || {
            if let Some(activity) = me.upgrade() {
                task(&activity);
            }
        }));
    }

    fn content(&self) -> ContentReferences<'_> {
        ContentReferences::new(&*self.platform, &*self.probe)
    }

    /// Ask for storage access once per activity if the host gates it.
    pub fn ensure_storage_permission(&self) {
        if !self.caps.supports_runtime_permissions || self.permission_requested.swap(true, Ordering::AcqRel) {
            return;
        }
        match self.platform.is_granted(STORAGE_PERMISSION) {
            Some(false) => {
                info!(permission = STORAGE_PERMISSION, "requesting permission");
                self.platform.request(STORAGE_PERMISSION);
            }
            Some(true) => {}
            None => debug!("permission query unavailable"),
        }
    }

    // -- Host lifecycle ------------------------------------------------------

    pub fn on_new_intent(&self, request: LaunchRequest) {
        self.open_path.set_launch_request(request);
    }

    pub fn on_resume(&self) {
        self.resumed.store(true, Ordering::Release);
        self.orientation.on_resume(&*self.platform);
    }

    pub fn on_pause(&self) {
        self.resumed.store(false, Ordering::Release);
        self.orientation.on_pause(&*self.platform);
    }

    pub fn on_back_pressed(&self) -> BackPress {
        match self.slot.get() {
            Some(handle) => {
                self.engine.on_back_pressed(handle);
                BackPress::Engine
            }
            None => {
                self.platform.default_back_pressed();
                BackPress::Platform
            }
        }
    }

    /// Whether the engine wants `key_code` for itself.
    pub fn on_key_down(&self, key_code: i32) -> bool {
        self.slot.with(|h| self.engine.is_key_overridden(h, key_code)).unwrap_or(false)
    }

    pub fn on_sensor_changed(&self, kind: SensorKind, values: &[f32]) {
        self.orientation
            .forward(&self.slot, &*self.engine, kind, values, self.platform.display_rotation());
    }

    /// Reconfigure the native surface, bracketed by engine notifications.
    /// A failure here is fatal.
    pub fn on_surface_changed(&self, apply: impl FnOnce() -> Result<()>) -> Result<()> {
        self.slot.with(|h| self.engine.on_before_surface_changed(h, true));
        let applied = apply();
        self.slot.with(|h| self.engine.on_before_surface_changed(h, false));

        applied.map_err(|e| {
            let reason = e.to_string();
            let record = CrashRecord::new(self.platform.platform_name(), "native surface failed to start", &reason);
            present_fatal(&self.platform, &self.config, record, format!("Broken package?\n{reason}"));
            ParallaxError::Surface(reason)
        })
    }

    /// Called on the UI thread; the sensor is released directly.
    pub fn on_destroy(&self) {
        if self.slot.set(None).is_some() {
            info!(id = %self.id, "native instance detached");
        }
        self.resumed.store(false, Ordering::Release);
        self.orientation.enable(&*self.platform, false);
        self.continuity.detach(&*self.platform, self.id);
        info!(id = %self.id, "activity destroyed");
    }

    // -- Engine requests -----------------------------------------------------

    /// The engine announces (non-zero) or withdraws (zero) its instance.
    pub fn set_native_instance(&self, raw: u64) {
        let handle = BridgeHandle::from_raw(raw);
        let previous = self.slot.set(handle);
        match handle {
            Some(handle) => {
                info!(id = %self.id, "native instance attached");
                self.orientation.define_for(&*self.engine, handle);
                // A replacement instance inherits the tracking intent.
                self.on_ui(|a| {
                    if a.resumed.load(Ordering::Acquire) {
                        a.orientation.on_resume(&*a.platform);
                    }
                });
            }
            None if previous.is_some() => {
                info!(id = %self.id, "native instance detached");
                self.on_ui(|a| a.orientation.enable(&*a.platform, false));
            }
            None => {}
        }
    }

    pub fn set_track_orientation(&self, track: bool) {
        self.on_ui(move |a| {
            a.orientation.set_tracking(&*a.platform, track);
        });
    }

    /// Keep playback running in the background (or stop doing so).
    pub fn request_wake_lock(&self, title: Option<String>, on: bool) {
        self.on_ui(move |a| {
            let target: Weak<dyn PlaybackTarget> = a.me.clone();
            a.continuity.request_lock(&*a.platform, a.id, target, title.as_deref(), on);
        });
    }

    pub fn set_window_title(&self, title: String) {
        self.on_ui(move |a| a.platform.set_window_title(&title));
    }

    pub fn hide_system_bars(&self, hide_status_bar: bool, hide_nav_bar: bool) {
        let Some(flags) = self.caps.system_ui_flags(hide_status_bar, hide_nav_bar) else {
            debug!("system bars cannot be hidden on this host");
            return;
        };
        self.on_ui(move |a| a.platform.set_system_ui_flags(flags));
    }

    pub fn post_toast(&self, text: String) {
        self.on_ui(move |a| a.platform.show_toast(&text));
    }

    pub fn post_message(&self, text: String) {
        self.on_ui(move |a| a.platform.show_message(&text));
    }

    pub fn post_exit(&self) {
        self.on_ui(|a| a.platform.finish());
    }

    /// Resolve the pending launch request and hand it to the engine.
    pub fn read_open_path(&self, clear_after_read: bool) -> OpenRequest {
        let request = self.open_path.resolve(clear_after_read, &self.content());
        self.slot.with(|h| match &request {
            OpenRequest::Control(command) => self.engine.set_open_path(h, command.action_tag(), "", false),
            OpenRequest::Open { path, mime, from_history } => {
                self.engine.set_open_path(h, path, mime, *from_history)
            }
        });
        request
    }

    /// Raw descriptor for a path the engine could not open itself.
    pub fn open_descriptor_for(&self, path: &str) -> i32 {
        self.content().open_descriptor(path)
    }

    pub fn set_hardware_stereo(&self, enabled: bool) {
        if !self.caps.has_stereo_surface {
            debug!("no stereo surface on this host");
            return;
        }
        self.on_ui(move |a| match a.platform.set_stereo_surface(enabled) {
            Ok(()) => {
                a.slot.with(|h| a.engine.set_swap_eyes(h, enabled));
            }
            Err(e) => warn!(error = %e, "stereo surface switch failed"),
        });
    }
}

impl PlaybackTarget for HostActivity {
    /// Notification buttons arrive as a fresh launch request for the engine
    /// to pull.
    fn set_playback_action(&self, command: TransportCommand) {
        debug!(id = %self.id, %command, "playback action queued");
        self.open_path.set_launch_request(LaunchRequest::action(format!(
            "{}.{}",
            self.config.application_id,
            command.action_tag()
        )));
    }
}
