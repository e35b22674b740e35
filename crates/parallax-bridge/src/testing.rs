// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Recording doubles for the engine and platform seams.

use std::collections::HashMap;
use std::fs::File;
use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parallax_core::capabilities::{HostCapabilities, ProbeResults};
use parallax_core::error::{ParallaxError, Result};
use parallax_core::types::{Quaternion, ScreenRotation, SensorInventory, SensorKind, TransportCommand};

use crate::continuity::{NotificationChannel, PlaybackNotification, PlaybackTarget};
use crate::handle::BridgeHandle;
use crate::traits::*;
use crate::ui_queue::UiTaskQueue;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    SetOpenPath { path: String, mime: String, from_history: bool },
    Quaternion { quat: Quaternion, rotation: f32 },
    Legacy { azimuth: f32, pitch: f32, roll: f32, rotation: f32 },
    DefineOrientationSensor { has_sensor: bool, low_quality: bool },
    BackPressed,
    SurfaceChanged(bool),
    KeyQuery(i32),
    SwapEyes(bool),
}

#[derive(Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<(BridgeHandle, EngineCall)>>,
    overridden_keys: Mutex<Vec<i32>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn override_key(&self, key_code: i32) {
        self.overridden_keys.lock().unwrap().push(key_code);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn handles(&self) -> Vec<BridgeHandle> {
        self.calls.lock().unwrap().iter().map(|(h, _)| *h).collect()
    }

    fn record(&self, handle: BridgeHandle, call: EngineCall) {
        self.calls.lock().unwrap().push((handle, call));
    }
}

impl NativeEngine for RecordingEngine {
    fn set_open_path(&self, handle: BridgeHandle, path: &str, mime: &str, from_history: bool) {
        self.record(
            handle,
            EngineCall::SetOpenPath { path: path.into(), mime: mime.into(), from_history },
        );
    }

    fn set_orientation_quaternion(&self, handle: BridgeHandle, quat: Quaternion, screen_rotation_deg: f32) {
        self.record(handle, EngineCall::Quaternion { quat, rotation: screen_rotation_deg });
    }

    fn set_orientation_legacy(
        &self,
        handle: BridgeHandle,
        azimuth: f32,
        pitch: f32,
        roll: f32,
        screen_rotation_deg: f32,
    ) {
        self.record(
            handle,
            EngineCall::Legacy { azimuth, pitch, roll, rotation: screen_rotation_deg },
        );
    }

    fn define_orientation_sensor(&self, handle: BridgeHandle, has_sensor: bool, is_low_quality: bool) {
        self.record(
            handle,
            EngineCall::DefineOrientationSensor { has_sensor, low_quality: is_low_quality },
        );
    }

    fn on_back_pressed(&self, handle: BridgeHandle) {
        self.record(handle, EngineCall::BackPressed);
    }

    fn on_before_surface_changed(&self, handle: BridgeHandle, is_before: bool) {
        self.record(handle, EngineCall::SurfaceChanged(is_before));
    }

    fn is_key_overridden(&self, handle: BridgeHandle, key_code: i32) -> bool {
        self.record(handle, EngineCall::KeyQuery(key_code));
        self.overridden_keys.lock().unwrap().contains(&key_code)
    }

    fn set_swap_eyes(&self, handle: BridgeHandle, swap: bool) {
        self.record(handle, EngineCall::SwapEyes(swap));
    }
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// Resolver backed by a reference -> file map.
#[derive(Default)]
pub struct MapResolver {
    files: Mutex<HashMap<String, PathBuf>>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, reference: &str, file: &Path) -> Self {
        self.insert(reference, file);
        self
    }

    pub fn insert(&self, reference: &str, file: &Path) {
        self.files.lock().unwrap().insert(reference.into(), file.into());
    }
}

impl ContentResolver for MapResolver {
    fn open_read_only(&self, reference: &str) -> Result<OwnedFd> {
        let path = self
            .files
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .ok_or_else(|| ParallaxError::ContentResolution(reference.into()))?;
        Ok(File::open(path)?.into())
    }
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Toast(String),
    Message(String),
    Fatal(String),
    Title(String),
    SystemUiFlags(i32),
    Finish,
    DefaultBack,
    Stereo(bool),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    StartForeground(String),
    Start(String),
    Stop,
    AcquireWakeLock(String),
    ReleaseWakeLock,
}

pub struct RecordingPlatform {
    caps: Mutex<HostCapabilities>,
    inventory: Mutex<SensorInventory>,
    rotation: Mutex<ScreenRotation>,
    registrations: Mutex<Vec<SensorKind>>,
    unregistrations: AtomicUsize,
    fail_sensor: AtomicBool,
    fail_service: AtomicBool,
    ui_events: Mutex<Vec<UiEvent>>,
    service_calls: Mutex<Vec<ServiceCall>>,
    permission: Mutex<Option<bool>>,
    permission_requests: Mutex<Vec<String>>,
    content: MapResolver,
    defer_ui: AtomicBool,
    ui_queue: UiTaskQueue,
}

impl RecordingPlatform {
    /// Modern host: every capability on, all sensors present.
    pub fn new() -> Self {
        Self {
            caps: Mutex::new(HostCapabilities::resolve(
                28,
                ProbeResults { stereo_surface: false, permission_api: true },
            )),
            inventory: Mutex::new(SensorInventory {
                rotation_vector: true,
                legacy_orientation: true,
                gyroscope: true,
            }),
            rotation: Mutex::new(ScreenRotation::Deg0),
            registrations: Mutex::new(Vec::new()),
            unregistrations: AtomicUsize::new(0),
            fail_sensor: AtomicBool::new(false),
            fail_service: AtomicBool::new(false),
            ui_events: Mutex::new(Vec::new()),
            service_calls: Mutex::new(Vec::new()),
            permission: Mutex::new(Some(true)),
            permission_requests: Mutex::new(Vec::new()),
            content: MapResolver::new(),
            defer_ui: AtomicBool::new(false),
            ui_queue: UiTaskQueue::new(),
        }
    }

    pub fn set_caps(&self, caps: HostCapabilities) {
        *self.caps.lock().unwrap() = caps;
    }

    pub fn set_inventory(&self, inventory: SensorInventory) {
        *self.inventory.lock().unwrap() = inventory;
    }

    pub fn set_rotation(&self, rotation: ScreenRotation) {
        *self.rotation.lock().unwrap() = rotation;
    }

    pub fn set_permission(&self, granted: Option<bool>) {
        *self.permission.lock().unwrap() = granted;
    }

    pub fn fail_sensor_registration(&self, fail: bool) {
        self.fail_sensor.store(fail, Ordering::SeqCst);
    }

    pub fn fail_service_start(&self, fail: bool) {
        self.fail_service.store(fail, Ordering::SeqCst);
    }

    /// Queue UI tasks until `drain_ui` instead of running them inline.
    pub fn defer_ui(&self, defer: bool) {
        self.defer_ui.store(defer, Ordering::SeqCst);
    }

    pub fn drain_ui(&self) -> usize {
        self.ui_queue.drain()
    }

    pub fn content(&self) -> &MapResolver {
        &self.content
    }

    pub fn registrations(&self) -> Vec<SensorKind> {
        self.registrations.lock().unwrap().clone()
    }

    pub fn unregistrations(&self) -> usize {
        self.unregistrations.load(Ordering::SeqCst)
    }

    pub fn ui_events(&self) -> Vec<UiEvent> {
        self.ui_events.lock().unwrap().clone()
    }

    pub fn service_calls(&self) -> Vec<ServiceCall> {
        self.service_calls.lock().unwrap().clone()
    }

    pub fn permission_requests(&self) -> Vec<String> {
        self.permission_requests.lock().unwrap().clone()
    }

    fn ui(&self, event: UiEvent) {
        self.ui_events.lock().unwrap().push(event);
    }

    fn service(&self, call: ServiceCall) {
        self.service_calls.lock().unwrap().push(call);
    }
}

impl UiThread for RecordingPlatform {
    fn run_on_ui_thread(&self, task: UiTask) {
        if self.defer_ui.load(Ordering::SeqCst) {
            self.ui_queue.post(task);
        } else {
            task();
        }
    }
}

impl HostUi for RecordingPlatform {
    fn show_toast(&self, text: &str) {
        self.ui(UiEvent::Toast(text.into()));
    }

    fn show_message(&self, text: &str) {
        self.ui(UiEvent::Message(text.into()));
    }

    fn show_fatal_dialog(&self, text: &str) {
        self.ui(UiEvent::Fatal(text.into()));
    }

    fn set_window_title(&self, title: &str) {
        self.ui(UiEvent::Title(title.into()));
    }

    fn set_system_ui_flags(&self, flags: i32) {
        self.ui(UiEvent::SystemUiFlags(flags));
    }

    fn finish(&self) {
        self.ui(UiEvent::Finish);
    }

    fn default_back_pressed(&self) {
        self.ui(UiEvent::DefaultBack);
    }
}

impl SensorHub for RecordingPlatform {
    fn inventory(&self) -> SensorInventory {
        *self.inventory.lock().unwrap()
    }

    fn register(&self, kind: SensorKind) -> Result<()> {
        if self.fail_sensor.load(Ordering::SeqCst) {
            return Err(ParallaxError::Sensor("registration refused".into()));
        }
        self.registrations.lock().unwrap().push(kind);
        Ok(())
    }

    fn unregister(&self) {
        self.unregistrations.fetch_add(1, Ordering::SeqCst);
    }

    fn display_rotation(&self) -> ScreenRotation {
        *self.rotation.lock().unwrap()
    }
}

impl ContentResolver for RecordingPlatform {
    fn open_read_only(&self, reference: &str) -> Result<OwnedFd> {
        self.content.open_read_only(reference)
    }
}

impl ServiceControl for RecordingPlatform {
    fn start_foreground_service(&self, title: &str) -> Result<()> {
        if self.fail_service.load(Ordering::SeqCst) {
            return Err(ParallaxError::Service("start refused".into()));
        }
        self.service(ServiceCall::StartForeground(title.into()));
        Ok(())
    }

    fn start_service(&self, title: &str) -> Result<()> {
        if self.fail_service.load(Ordering::SeqCst) {
            return Err(ParallaxError::Service("start refused".into()));
        }
        self.service(ServiceCall::Start(title.into()));
        Ok(())
    }

    fn stop_service(&self) -> Result<()> {
        self.service(ServiceCall::Stop);
        Ok(())
    }

    fn acquire_wake_lock(&self, tag: &str) -> Result<()> {
        self.service(ServiceCall::AcquireWakeLock(tag.into()));
        Ok(())
    }

    fn release_wake_lock(&self) -> Result<()> {
        self.service(ServiceCall::ReleaseWakeLock);
        Ok(())
    }
}

impl Permissions for RecordingPlatform {
    fn is_granted(&self, _permission: &str) -> Option<bool> {
        *self.permission.lock().unwrap()
    }

    fn request(&self, permission: &str) {
        self.permission_requests.lock().unwrap().push(permission.into());
    }
}

impl HostPlatform for RecordingPlatform {
    fn platform_name(&self) -> String {
        "Recording".into()
    }

    fn capabilities(&self) -> HostCapabilities {
        *self.caps.lock().unwrap()
    }

    fn set_stereo_surface(&self, enabled: bool) -> Result<()> {
        if !self.capabilities().has_stereo_surface {
            return Err(ParallaxError::PlatformUnavailable);
        }
        self.ui(UiEvent::Stereo(enabled));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Service side
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingSink {
    channel: AtomicBool,
    posted: Mutex<Vec<PlaybackNotification>>,
    stops: AtomicUsize,
}

impl RecordingSink {
    pub fn channel_created(&self) -> bool {
        self.channel.load(Ordering::SeqCst)
    }

    pub fn posted(&self) -> Vec<PlaybackNotification> {
        self.posted.lock().unwrap().clone()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl ForegroundSink for RecordingSink {
    fn create_channel(&self, _channel: &NotificationChannel) -> Result<()> {
        self.channel.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn post_foreground(&self, notification: &PlaybackNotification) -> Result<()> {
        self.posted.lock().unwrap().push(notification.clone());
        Ok(())
    }

    fn stop_foreground(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingTarget {
    commands: Mutex<Vec<TransportCommand>>,
}

impl RecordingTarget {
    pub fn commands(&self) -> Vec<TransportCommand> {
        self.commands.lock().unwrap().clone()
    }
}

impl PlaybackTarget for RecordingTarget {
    fn set_playback_action(&self, command: TransportCommand) {
        self.commands.lock().unwrap().push(command);
    }
}
