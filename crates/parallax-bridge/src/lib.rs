// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Parallax — host lifecycle bridge.
//
// Sits between the mobile host (activity, sensors, content provider, playback
// service) and the native stereo engine. The components here are platform
// neutral; `android` wires them to the real OS through JNI and `stub` gives
// desktop builds a degraded host to run against.

pub mod activity;
pub mod content;
pub mod continuity;
pub mod engine_ffi;
pub mod handle;
pub mod open_path;
pub mod orientation;
pub mod sessions;
pub mod traits;
pub mod ui_queue;

#[cfg(target_os = "android")]
pub mod android;

#[cfg(not(target_os = "android"))]
pub mod stub;

#[cfg(test)]
mod testing;

pub use activity::{ActivityContext, BackPress, HostActivity, launch, present_fatal};
pub use content::{ContentReferences, FdPathProbe, ProcSelfFd};
pub use continuity::{ContinuityService, ContinuityState, PlaybackTarget, StartMode};
pub use engine_ffi::FfiEngine;
pub use handle::{BridgeHandle, BridgeSlot};
pub use traits::{HostPlatform, NativeEngine};
