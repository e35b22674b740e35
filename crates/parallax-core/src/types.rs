// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types shared by the loader, the bridge and the platform glue.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Launch requests (OS intents)
// ---------------------------------------------------------------------------

/// `Intent.ACTION_SEND`.
pub const ACTION_SEND: &str = "android.intent.action.SEND";

/// `Intent.EXTRA_STREAM`.
pub const EXTRA_STREAM: &str = "android.intent.extra.STREAM";

/// `Intent.FLAG_ACTIVITY_LAUNCHED_FROM_HISTORY`.
pub const FLAG_LAUNCHED_FROM_HISTORY: u32 = 0x0010_0000;

/// Scheme of an abstract content reference.
pub const CONTENT_SCHEME: &str = "content://";

/// Scheme of a plain file URI.
pub const FILE_SCHEME: &str = "file://";

/// Platform-neutral rendering of the intent that (re)launched the activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchRequest {
    /// Intent action, e.g. `android.intent.action.VIEW`.
    pub action: Option<String>,
    /// Data URI string (`getDataString()`).
    pub data: Option<String>,
    /// MIME type (`getType()`).
    pub mime: Option<String>,
    /// `EXTRA_STREAM` URI carried by share intents.
    pub stream: Option<String>,
    /// Intent flags.
    pub flags: u32,
}

impl LaunchRequest {
    /// A request opening `data` with the given MIME type.
    pub fn view(data: impl Into<String>, mime: impl Into<String>) -> Self {
        Self {
            action: Some("android.intent.action.VIEW".into()),
            data: Some(data.into()),
            mime: Some(mime.into()),
            ..Default::default()
        }
    }

    /// A request carrying only an action (notification buttons).
    pub fn action(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            ..Default::default()
        }
    }

    /// Whether the OS relaunched the activity from the recents list.
    pub fn is_launched_from_history(&self) -> bool {
        self.flags & FLAG_LAUNCHED_FROM_HISTORY != 0
    }

    /// Whether this is a share action carrying an attached stream.
    pub fn is_share_with_stream(&self) -> bool {
        self.action.as_deref() == Some(ACTION_SEND) && self.stream.is_some()
    }

    /// Whether the request carries anything to act on.
    pub fn has_payload(&self) -> bool {
        self.data.is_some() || self.stream.is_some() || self.action.is_some()
    }
}

// ---------------------------------------------------------------------------
// Transport control
// ---------------------------------------------------------------------------

/// Playback transport command, originating from notification actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportCommand {
    Previous,
    Pause,
    Next,
    PlayPause,
}

impl TransportCommand {
    pub const ALL: [TransportCommand; 4] = [Self::Previous, Self::Pause, Self::Next, Self::PlayPause];

    /// Intent action tag (without package prefix).
    pub fn action_tag(&self) -> &'static str {
        match self {
            Self::Previous => "ACTION_PLAY_PREV",
            Self::Pause => "ACTION_PAUSE",
            Self::Next => "ACTION_PLAY_NEXT",
            Self::PlayPause => "ACTION_PLAY_PAUSE",
        }
    }

    /// Short name used in logs and by the engine.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Previous => "play-prev",
            Self::Pause => "pause",
            Self::Next => "play-next",
            Self::PlayPause => "play-pause",
        }
    }

    /// Match an intent action, with or without a package prefix
    /// (`ACTION_PLAY_NEXT` and `com.parallax.ACTION_PLAY_NEXT` both match).
    pub fn from_action(action: &str) -> Option<Self> {
        let tag = action.rsplit('.').next().unwrap_or(action);
        Self::ALL.into_iter().find(|cmd| cmd.action_tag() == tag)
    }
}

impl std::fmt::Display for TransportCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Open requests
// ---------------------------------------------------------------------------

/// Normalized open command handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenRequest {
    /// Route a transport command into the playback session.
    Control(TransportCommand),
    /// Open a path (filesystem path or unresolved content reference).
    Open {
        path: String,
        mime: String,
        from_history: bool,
    },
}

impl OpenRequest {
    /// The explicit "nothing to open" command.
    pub fn empty() -> Self {
        Self::Open {
            path: String::new(),
            mime: String::new(),
            from_history: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Open { path, mime, .. } if path.is_empty() && mime.is_empty())
    }

    /// Path slot as seen by the engine; empty for control commands.
    pub fn path(&self) -> &str {
        match self {
            Self::Control(_) => "",
            Self::Open { path, .. } => path,
        }
    }

    /// MIME slot as seen by the engine; empty for control commands.
    pub fn mime(&self) -> &str {
        match self {
            Self::Control(_) => "",
            Self::Open { mime, .. } => mime,
        }
    }
}

/// Outcome of resolving a content reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentResolution {
    /// A real filesystem path readable by this process.
    CanonicalPath(PathBuf),
    /// A raw descriptor detached from its owner; the caller closes it.
    Descriptor(i32),
}

// ---------------------------------------------------------------------------
// Orientation
// ---------------------------------------------------------------------------

/// Android sensor type ids relevant to orientation tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    /// `Sensor.TYPE_ORIENTATION` (deprecated azimuth/pitch/roll).
    Orientation,
    /// `Sensor.TYPE_GYROSCOPE`.
    Gyroscope,
    /// `Sensor.TYPE_ROTATION_VECTOR`.
    RotationVector,
    /// Anything else; never forwarded.
    Other(i32),
}

impl SensorKind {
    pub fn from_type_id(id: i32) -> Self {
        match id {
            3 => Self::Orientation,
            4 => Self::Gyroscope,
            11 => Self::RotationVector,
            other => Self::Other(other),
        }
    }

    pub fn type_id(&self) -> i32 {
        match self {
            Self::Orientation => 3,
            Self::Gyroscope => 4,
            Self::RotationVector => 11,
            Self::Other(id) => *id,
        }
    }
}

/// Which orientation-related sensors the device exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorInventory {
    pub rotation_vector: bool,
    pub legacy_orientation: bool,
    pub gyroscope: bool,
}

/// Sensor chosen at startup and the confidence the engine should assume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSelection {
    pub kind: Option<SensorKind>,
    pub low_quality: bool,
}

impl SensorSelection {
    /// Pick the orientation source.
    ///
    /// Rotation vector is preferred. Without it the legacy orientation sensor
    /// is used and flagged low-quality. A rotation vector without a gyroscope
    /// is also low-quality since fusion will drift.
    pub fn select(inventory: SensorInventory) -> Self {
        if inventory.rotation_vector {
            return Self {
                kind: Some(SensorKind::RotationVector),
                low_quality: !inventory.gyroscope,
            };
        }
        Self {
            kind: inventory.legacy_orientation.then_some(SensorKind::Orientation),
            low_quality: true,
        }
    }

    pub fn has_sensor(&self) -> bool {
        self.kind.is_some()
    }
}

/// Display rotation snapped to the four discrete angles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScreenRotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl ScreenRotation {
    /// Map `Display.getRotation()` (`Surface.ROTATION_*`, 0..=3).
    pub fn from_surface_rotation(rotation: i32) -> Self {
        match rotation.rem_euclid(4) {
            1 => Self::Deg90,
            2 => Self::Deg180,
            3 => Self::Deg270,
            _ => Self::Deg0,
        }
    }

    pub fn degrees(&self) -> f32 {
        match self {
            Self::Deg0 => 0.0,
            Self::Deg90 => 90.0,
            Self::Deg180 => 180.0,
            Self::Deg270 => 270.0,
        }
    }
}

/// Unit quaternion describing device attitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    /// Convert rotation-vector sensor values.
    ///
    /// The scalar part is the optional fourth component; older devices only
    /// report three, in which case it is reconstructed from the unit norm.
    pub fn from_rotation_vector(values: &[f32]) -> Option<Self> {
        let [x, y, z, rest @ ..] = values else {
            return None;
        };
        let w = match rest.first() {
            Some(w) => *w,
            None => {
                let w2 = 1.0 - x * x - y * y - z * z;
                if w2 > 0.0 { w2.sqrt() } else { 0.0 }
            }
        };
        Some(Self { x: *x, y: *y, z: *z, w })
    }
}

/// One normalized orientation reading, ready for forwarding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrientationSample {
    Quaternion {
        quat: Quaternion,
        rotation: ScreenRotation,
    },
    Legacy {
        azimuth: f32,
        pitch: f32,
        roll: f32,
        rotation: ScreenRotation,
    },
}

// ---------------------------------------------------------------------------
// Activity identity
// ---------------------------------------------------------------------------

/// Process-unique identifier of one host activity instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityId(pub u64);

impl ActivityId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ActivityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "activity#{}", self.0)
    }
}
