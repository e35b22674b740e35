// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Background playback continuity.
//
// Keeps audio alive while the activity is hidden. On hosts that require it a
// foreground service shows one persistent notification with transport
// buttons; older hosts get a partial wake lock instead. Button presses come
// back to the service, which routes them to the single registered activity.

use std::sync::{Mutex, PoisonError, Weak};

use parallax_core::capabilities::HostCapabilities;
use parallax_core::config::AppConfig;
use parallax_core::types::{ActivityId, TransportCommand};
use tracing::{debug, info, warn};

use crate::traits::{ForegroundSink, ServiceControl};

/// Service start action.
pub const ACTION_START_SERVICE: &str = "ACTION_START_SERVICE";
/// Service stop action.
pub const ACTION_STOP_SERVICE: &str = "ACTION_STOP_SERVICE";
/// Fixed id so every post replaces the previous notification.
pub const NOTIFICATION_ID: i32 = 1;
/// Partial wake lock tag used below the continuity threshold.
pub const WAKE_LOCK_TAG: &str = "parallax:playback";
/// Activity class, relative to the application id, opened by tapping the notification.
pub const HOST_ACTIVITY_CLASS: &str = "HostActivity";

/// Receives transport commands while registered for background playback.
pub trait PlaybackTarget: Send + Sync {
    fn set_playback_action(&self, command: TransportCommand);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuityState {
    Idle,
    Foregrounding,
    Active,
    Stopping,
}

/// Value returned from the service's start-command callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Recreate the service if the OS kills it.
    Sticky,
    NotSticky,
}

impl StartMode {
    /// `Service.START_STICKY` / `Service.START_NOT_STICKY`.
    pub fn as_android(&self) -> i32 {
        match self {
            Self::Sticky => 1,
            Self::NotSticky => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationChannel {
    pub id: String,
    pub name: String,
    pub low_importance: bool,
    pub lights: bool,
    pub vibration: bool,
    pub sound: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAction {
    pub label: String,
    pub command: TransportCommand,
    /// Intent action re-entering the service.
    pub intent_action: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackNotification {
    pub id: i32,
    pub channel_id: String,
    pub title: String,
    pub low_priority: bool,
    pub ongoing: bool,
    /// Fully qualified activity brought back on tap.
    pub content_activity: String,
    pub actions: Vec<NotificationAction>,
}

/// Single-slot registry of the activity playing in the background.
#[derive(Default)]
pub struct BackgroundRegistry {
    slot: Mutex<Option<(ActivityId, Weak<dyn PlaybackTarget>)>>,
}

impl BackgroundRegistry {
    pub fn register(&self, id: ActivityId, target: Weak<dyn PlaybackTarget>) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((previous, _)) = slot.as_ref().filter(|(prev, _)| *prev != id) {
            debug!(%previous, replaced_by = %id, "background target replaced");
        }
        *slot = Some((id, target));
    }

    /// Clear the slot if `id` owns it. Returns whether it did.
    pub fn clear(&self, id: ActivityId) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some((owner, _)) if *owner == id => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    pub fn registered(&self) -> Option<ActivityId> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).as_ref().map(|(id, _)| *id)
    }

    /// Deliver `command` to the registered target. Dropped when there is none.
    pub fn route(&self, command: TransportCommand) -> bool {
        let target = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|(_, weak)| weak.upgrade());
        match target {
            Some(target) => {
                target.set_playback_action(command);
                true
            }
            None => {
                debug!(%command, "no background target, command dropped");
                false
            }
        }
    }
}

struct Session {
    state: ContinuityState,
    title: String,
    wake_lock_held: bool,
}

pub struct ContinuityService {
    caps: HostCapabilities,
    application_id: String,
    channel_id: String,
    default_title: String,
    session: Mutex<Session>,
    registry: BackgroundRegistry,
}

impl ContinuityService {
    pub fn new(caps: HostCapabilities, config: &AppConfig) -> Self {
        Self {
            caps,
            application_id: config.application_id.clone(),
            channel_id: config.notification_channel_id.clone(),
            default_title: config.default_playback_title.clone(),
            session: Mutex::new(Session {
                state: ContinuityState::Idle,
                title: config.default_playback_title.clone(),
                wake_lock_held: false,
            }),
            registry: BackgroundRegistry::default(),
        }
    }

    fn session(&self) -> std::sync::MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn caps(&self) -> &HostCapabilities {
        &self.caps
    }

    pub fn state(&self) -> ContinuityState {
        self.session().state
    }

    pub fn title(&self) -> String {
        self.session().title.clone()
    }

    pub fn wake_lock_held(&self) -> bool {
        self.session().wake_lock_held
    }

    pub fn registry(&self) -> &BackgroundRegistry {
        &self.registry
    }

    /// Turn background playback on or off for activity `id`.
    pub fn request_lock(
        &self,
        control: &dyn ServiceControl,
        id: ActivityId,
        target: Weak<dyn PlaybackTarget>,
        title: Option<&str>,
        on: bool,
    ) {
        if !on {
            self.release(control, id);
            return;
        }

        let title = title.filter(|t| !t.is_empty()).unwrap_or(self.default_title.as_str()).to_string();

        if !self.caps.supports_audio_continuity {
            let mut session = self.session();
            if !session.wake_lock_held {
                match control.acquire_wake_lock(WAKE_LOCK_TAG) {
                    Ok(()) => session.wake_lock_held = true,
                    Err(e) => warn!(error = %e, "wake lock unavailable"),
                }
            }
            session.state = ContinuityState::Active;
            session.title = title;
            return;
        }

        {
            let mut session = self.session();
            session.state = ContinuityState::Foregrounding;
            session.title = title.clone();
        }
        self.registry.register(id, target);

        let started = if self.caps.supports_foreground_service {
            control.start_foreground_service(&title)
        } else {
            control.start_service(&title)
        };
        match started {
            Ok(()) => {
                self.session().state = ContinuityState::Active;
                info!(%id, title = %title, "background playback active");
            }
            Err(e) => {
                warn!(%id, error = %e, "playback service did not start");
                self.registry.clear(id);
                self.session().state = ContinuityState::Idle;
            }
        }
    }

    fn release(&self, control: &dyn ServiceControl, id: ActivityId) {
        let wake_lock_held = {
            let mut session = self.session();
            if session.state == ContinuityState::Idle && !session.wake_lock_held {
                return;
            }
            session.state = ContinuityState::Stopping;
            session.wake_lock_held
        };

        self.registry.clear(id);
        if self.caps.supports_audio_continuity {
            if let Err(e) = control.stop_service() {
                warn!(error = %e, "playback service did not stop");
            }
        }
        if wake_lock_held {
            if let Err(e) = control.release_wake_lock() {
                warn!(error = %e, "wake lock release failed");
            }
        }

        let mut session = self.session();
        session.wake_lock_held = false;
        session.state = ContinuityState::Idle;
        info!(%id, "background playback released");
    }

    /// Release the lock on behalf of an activity that is going away, if it is
    /// the one registered.
    pub fn detach(&self, control: &dyn ServiceControl, id: ActivityId) {
        if self.registry.registered() == Some(id) {
            self.release(control, id);
        }
    }

    /// Service start-command entry point.
    pub fn on_start_command(&self, sink: &dyn ForegroundSink, action: Option<&str>) -> StartMode {
        let tag = action.map(|a| a.rsplit('.').next().unwrap_or(a));
        match tag {
            Some(ACTION_START_SERVICE) => {
                if self.caps.supports_notification_channels {
                    if let Err(e) = sink.create_channel(&self.channel()) {
                        warn!(error = %e, "notification channel not created");
                    }
                }
                if let Err(e) = sink.post_foreground(&self.notification()) {
                    warn!(error = %e, "foreground notification not posted");
                }
                StartMode::Sticky
            }
            Some(ACTION_STOP_SERVICE) | None => {
                if let Err(e) = sink.stop_foreground() {
                    warn!(error = %e, "foreground stop failed");
                }
                StartMode::NotSticky
            }
            Some(other) => {
                match TransportCommand::from_action(other) {
                    Some(command) => {
                        self.registry.route(command);
                    }
                    None => debug!(action = other, "unknown service action ignored"),
                }
                StartMode::NotSticky
            }
        }
    }

    pub fn channel(&self) -> NotificationChannel {
        NotificationChannel {
            id: self.channel_id.clone(),
            name: "Audio playback".into(),
            low_importance: true,
            lights: false,
            vibration: false,
            sound: false,
        }
    }

    /// The notification for the current title.
    pub fn notification(&self) -> PlaybackNotification {
        let glyphs = self.caps.notification_glyph_labels;
        let action = |command: TransportCommand, glyph: &str, text: &str| NotificationAction {
            label: (if glyphs { glyph } else { text }).to_string(),
            command,
            intent_action: format!("{}.{}", self.application_id, command.action_tag()),
        };
        PlaybackNotification {
            id: NOTIFICATION_ID,
            channel_id: self.channel_id.clone(),
            title: self.title(),
            low_priority: true,
            ongoing: true,
            content_activity: format!("{}.{HOST_ACTIVITY_CLASS}", self.application_id),
            actions: vec![
                action(TransportCommand::Previous, "\u{23EE}", "PREV"),
                action(TransportCommand::PlayPause, "\u{23F9}", "PAUSE"),
                action(TransportCommand::Next, "\u{23ED}", "NEXT"),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingPlatform, RecordingSink, RecordingTarget, ServiceCall};
    use parallax_core::capabilities::ProbeResults;
    use std::sync::Arc;

    fn service(sdk: u32) -> ContinuityService {
        ContinuityService::new(HostCapabilities::resolve(sdk, ProbeResults::default()), &AppConfig::default())
    }

    fn weak(target: &Arc<RecordingTarget>) -> Weak<dyn PlaybackTarget> {
        let target: Arc<dyn PlaybackTarget> = target.clone();
        Arc::downgrade(&target)
    }

    #[test]
    fn lifecycle_on_oreo() {
        let svc = service(28);
        let host = RecordingPlatform::new();
        let target = Arc::new(RecordingTarget::default());
        let id = ActivityId::next();

        svc.request_lock(&host, id, weak(&target), Some("Track 3"), true);
        assert_eq!(svc.state(), ContinuityState::Active);
        assert_eq!(svc.registry().registered(), Some(id));
        assert_eq!(host.service_calls(), vec![ServiceCall::StartForeground("Track 3".into())]);

        let sink = RecordingSink::default();
        assert_eq!(svc.on_start_command(&sink, Some("com.parallax.ACTION_START_SERVICE")), StartMode::Sticky);
        assert_eq!(sink.posted().len(), 1);
        assert_eq!(sink.posted()[0].title, "Track 3");
        assert!(sink.channel_created());

        assert_eq!(svc.on_start_command(&sink, Some("com.parallax.ACTION_PLAY_NEXT")), StartMode::NotSticky);
        assert_eq!(target.commands(), vec![TransportCommand::Next]);

        svc.request_lock(&host, id, weak(&target), None, false);
        assert_eq!(svc.state(), ContinuityState::Idle);
        assert_eq!(svc.registry().registered(), None);
        assert_eq!(host.service_calls().last(), Some(&ServiceCall::Stop));

        // Nothing registered: delivered commands vanish.
        svc.on_start_command(&sink, Some("ACTION_PLAY_PREV"));
        assert_eq!(target.commands(), vec![TransportCommand::Next]);
    }

    #[test]
    fn plain_start_below_foreground_threshold() {
        let svc = service(24);
        let host = RecordingPlatform::new();
        let target = Arc::new(RecordingTarget::default());
        svc.request_lock(&host, ActivityId::next(), weak(&target), Some(""), true);
        assert_eq!(host.service_calls(), vec![ServiceCall::Start("Audio playback".into())]);

        let sink = RecordingSink::default();
        svc.on_start_command(&sink, Some(ACTION_START_SERVICE));
        assert!(!sink.channel_created());
    }

    #[test]
    fn wake_lock_below_continuity_threshold() {
        let svc = service(21);
        let host = RecordingPlatform::new();
        let target = Arc::new(RecordingTarget::default());
        let id = ActivityId::next();

        svc.request_lock(&host, id, weak(&target), Some("a"), true);
        svc.request_lock(&host, id, weak(&target), Some("b"), true);
        assert!(svc.wake_lock_held());
        assert_eq!(svc.registry().registered(), None);
        assert_eq!(host.service_calls(), vec![ServiceCall::AcquireWakeLock(WAKE_LOCK_TAG.into())]);

        svc.request_lock(&host, id, weak(&target), None, false);
        assert!(!svc.wake_lock_held());
        assert_eq!(host.service_calls().last(), Some(&ServiceCall::ReleaseWakeLock));
    }

    #[test]
    fn failed_start_falls_back_to_idle() {
        let svc = service(28);
        let host = RecordingPlatform::new();
        host.fail_service_start(true);
        let target = Arc::new(RecordingTarget::default());
        svc.request_lock(&host, ActivityId::next(), weak(&target), None, true);
        assert_eq!(svc.state(), ContinuityState::Idle);
        assert_eq!(svc.registry().registered(), None);
    }

    #[test]
    fn stop_action_leaves_foreground() {
        let svc = service(28);
        let sink = RecordingSink::default();
        assert_eq!(svc.on_start_command(&sink, None), StartMode::NotSticky);
        assert_eq!(svc.on_start_command(&sink, Some(ACTION_STOP_SERVICE)), StartMode::NotSticky);
        assert_eq!(sink.stops(), 2);
    }

    #[test]
    fn registry_ignores_foreign_clear() {
        let registry = BackgroundRegistry::default();
        let target = Arc::new(RecordingTarget::default());
        let owner = ActivityId::next();
        registry.register(owner, weak(&target));
        assert!(!registry.clear(ActivityId::next()));
        assert_eq!(registry.registered(), Some(owner));
        assert!(registry.clear(owner));
    }

    #[test]
    fn dropped_target_is_not_called() {
        let registry = BackgroundRegistry::default();
        let target = Arc::new(RecordingTarget::default());
        registry.register(ActivityId::next(), weak(&target));
        drop(target);
        assert!(!registry.route(TransportCommand::Pause));
    }

    #[test]
    fn notification_labels_follow_capabilities() {
        let modern = service(28).notification();
        assert_eq!(modern.id, NOTIFICATION_ID);
        assert_eq!(modern.channel_id, "com.parallax.audio_channel");
        let labels: Vec<_> = modern.actions.iter().map(|a| a.label.as_str()).collect();
        assert_eq!(labels, vec!["\u{23EE}", "\u{23F9}", "\u{23ED}"]);
        assert_eq!(modern.actions[2].intent_action, "com.parallax.ACTION_PLAY_NEXT");
        assert_eq!(modern.content_activity, "com.parallax.HostActivity");

        let legacy = service(21).notification();
        let labels: Vec<_> = legacy.actions.iter().map(|a| a.label.as_str()).collect();
        assert_eq!(labels, vec!["PREV", "PAUSE", "NEXT"]);
        assert_eq!(legacy.title, "Audio playback");
    }

    #[test]
    fn middle_button_toggles_playback() {
        let svc = service(28);
        let middle = &svc.notification().actions[1];
        assert_eq!(middle.command, TransportCommand::PlayPause);
        assert_eq!(middle.intent_action, "com.parallax.ACTION_PLAY_PAUSE");

        let target = Arc::new(RecordingTarget::default());
        svc.registry().register(ActivityId::next(), weak(&target));
        let sink = RecordingSink::default();
        assert_eq!(svc.on_start_command(&sink, Some(&middle.intent_action)), StartMode::NotSticky);
        assert_eq!(target.commands(), vec![TransportCommand::PlayPause]);
    }
}
