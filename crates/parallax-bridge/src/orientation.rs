// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Orientation sensor adapter.
//
// Picks the best attitude source once, keeps the subscription in step with
// the engine's tracking request and the activity's visibility, and turns raw
// sensor samples into engine calls.

use std::sync::atomic::{AtomicBool, Ordering};

use parallax_core::types::{
    OrientationSample, Quaternion, ScreenRotation, SensorInventory, SensorKind, SensorSelection,
};
use tracing::{debug, info, warn};

use crate::handle::{BridgeHandle, BridgeSlot};
use crate::traits::{NativeEngine, SensorHub};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Unsubscribed,
    Subscribed,
}

pub struct OrientationAdapter {
    selection: SensorSelection,
    /// Last tracking request from the engine; survives pause/resume.
    wants_tracking: AtomicBool,
    subscribed: AtomicBool,
}

impl OrientationAdapter {
    pub fn new(inventory: SensorInventory) -> Self {
        let selection = SensorSelection::select(inventory);
        info!(
            sensor = ?selection.kind,
            low_quality = selection.low_quality,
            "orientation source selected"
        );
        Self {
            selection,
            wants_tracking: AtomicBool::new(false),
            subscribed: AtomicBool::new(false),
        }
    }

    pub fn selection(&self) -> SensorSelection {
        self.selection
    }

    pub fn state(&self) -> SubscriptionState {
        if self.subscribed.load(Ordering::Acquire) {
            SubscriptionState::Subscribed
        } else {
            SubscriptionState::Unsubscribed
        }
    }

    pub fn wants_tracking(&self) -> bool {
        self.wants_tracking.load(Ordering::Acquire)
    }

    /// Report the selected source to a freshly acquired engine instance.
    pub fn define_for(&self, engine: &dyn NativeEngine, handle: BridgeHandle) {
        engine.define_orientation_sensor(handle, self.selection.has_sensor(), self.selection.low_quality);
    }

    /// Record the engine's tracking request. The subscription is only touched
    /// when the request actually changes; returns whether it did.
    pub fn set_tracking(&self, hub: &dyn SensorHub, track: bool) -> bool {
        if self.wants_tracking.swap(track, Ordering::AcqRel) == track {
            return false;
        }
        self.enable(hub, track);
        true
    }

    /// Subscribe or unsubscribe right now, on the calling thread.
    pub fn enable(&self, hub: &dyn SensorHub, track: bool) {
        if !track {
            if self.subscribed.swap(false, Ordering::AcqRel) {
                hub.unregister();
                debug!("orientation sensor unregistered");
            }
            return;
        }

        let Some(kind) = self.selection.kind else {
            debug!("no orientation sensor, tracking request ignored");
            return;
        };
        if self
            .subscribed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        match hub.register(kind) {
            Ok(()) => debug!(?kind, "orientation sensor registered"),
            Err(e) => {
                self.subscribed.store(false, Ordering::Release);
                warn!(?kind, error = %e, "orientation sensor registration failed");
            }
        }
    }

    pub fn on_pause(&self, hub: &dyn SensorHub) {
        self.enable(hub, false);
    }

    pub fn on_resume(&self, hub: &dyn SensorHub) {
        if self.wants_tracking() {
            self.enable(hub, true);
        }
    }

    /// Forward one raw sample. Dropped when there is no engine instance or
    /// the sample cannot be interpreted.
    pub fn forward(
        &self,
        slot: &BridgeSlot,
        engine: &dyn NativeEngine,
        kind: SensorKind,
        values: &[f32],
        rotation: ScreenRotation,
    ) -> Option<OrientationSample> {
        let handle = slot.get()?;
        let sample = normalize(kind, values, rotation)?;
        match sample {
            OrientationSample::Quaternion { quat, rotation } => {
                engine.set_orientation_quaternion(handle, quat, rotation.degrees());
            }
            OrientationSample::Legacy { azimuth, pitch, roll, rotation } => {
                engine.set_orientation_legacy(handle, azimuth, pitch, roll, rotation.degrees());
            }
        }
        Some(sample)
    }
}

/// Interpret raw sensor values for the given source.
pub fn normalize(kind: SensorKind, values: &[f32], rotation: ScreenRotation) -> Option<OrientationSample> {
    match kind {
        SensorKind::RotationVector => {
            Quaternion::from_rotation_vector(values).map(|quat| OrientationSample::Quaternion { quat, rotation })
        }
        SensorKind::Orientation => match values {
            [azimuth, pitch, roll, ..] => Some(OrientationSample::Legacy {
                azimuth: *azimuth,
                pitch: *pitch,
                roll: *roll,
                rotation,
            }),
            _ => None,
        },
        SensorKind::Gyroscope | SensorKind::Other(_) => None,
    }
}
