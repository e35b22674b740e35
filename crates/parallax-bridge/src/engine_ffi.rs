// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `NativeEngine` over the engine's C ABI.
//
// The top-level engine library exports one `parallax_engine_*` function per
// bridge call. All of them are resolved when the library is opened, so a
// missing entry point fails the launch instead of the first call.

use std::ffi::{CString, c_char};
use std::path::Path;

use libloading::{Library, Symbol};
use parallax_core::config::AppConfig;
use parallax_core::error::{ParallaxError, Result};
use parallax_core::types::Quaternion;
use parallax_runtime::loader::resolve_library_path;
use tracing::{info, warn};

use crate::handle::BridgeHandle;
use crate::traits::NativeEngine;

type SetOpenPathFn = unsafe extern "C" fn(u64, *const c_char, *const c_char, bool);
type SetQuaternionFn = unsafe extern "C" fn(u64, f32, f32, f32, f32, f32);
type SetOrientationFn = unsafe extern "C" fn(u64, f32, f32, f32, f32);
type DefineSensorFn = unsafe extern "C" fn(u64, bool, bool);
type HandleFn = unsafe extern "C" fn(u64);
type HandleFlagFn = unsafe extern "C" fn(u64, bool);
type KeyQueryFn = unsafe extern "C" fn(u64, i32) -> bool;

#[derive(Clone, Copy)]
struct EntryPoints {
    set_open_path: SetOpenPathFn,
    set_quaternion: SetQuaternionFn,
    set_orientation: SetOrientationFn,
    define_orientation_sensor: DefineSensorFn,
    on_back_pressed: HandleFn,
    on_before_surface_changed: HandleFlagFn,
    is_key_overridden: KeyQueryFn,
    set_swap_eyes: HandleFlagFn,
}

/// Copy one function pointer out of `library`.
///
/// # Safety
/// `T` must match the exported symbol's real signature.
unsafe fn entry<T: Copy>(library: &Library, name: &str) -> Result<T> {
    // SAFETY: forwarded to the caller.
    let symbol: Symbol<T> = unsafe { library.get(name.as_bytes()) }
        .map_err(|e| ParallaxError::EngineSymbol(format!("{name}: {e}")))?;
    Ok(*symbol)
}

impl EntryPoints {
    /// # Safety
    /// The library must export the engine ABI these types describe.
    unsafe fn resolve(library: &Library) -> Result<Self> {
        // SAFETY: signatures mirror the engine's exported C declarations.
        unsafe {
            Ok(Self {
                set_open_path: entry(library, "parallax_engine_set_open_path")?,
                set_quaternion: entry(library, "parallax_engine_set_orientation_quaternion")?,
                set_orientation: entry(library, "parallax_engine_set_orientation")?,
                define_orientation_sensor: entry(library, "parallax_engine_define_orientation_sensor")?,
                on_back_pressed: entry(library, "parallax_engine_on_back_pressed")?,
                on_before_surface_changed: entry(library, "parallax_engine_on_before_surface_changed")?,
                is_key_overridden: entry(library, "parallax_engine_is_key_overridden")?,
                set_swap_eyes: entry(library, "parallax_engine_set_swap_eyes")?,
            })
        }
    }
}

/// Engine reached through its exported C functions.
pub struct FfiEngine {
    entry: EntryPoints,
    // Keeps the function pointers above valid.
    _library: Library,
}

impl FfiEngine {
    /// Open the configured top-level library.
    pub fn open(config: &AppConfig) -> Result<Self> {
        let name = config
            .application_library()
            .ok_or_else(|| ParallaxError::Config("feature library list is empty".into()))?;
        Self::open_path(&resolve_library_path(config.library_dir.as_deref(), name))
    }

    pub fn open_path(path: &Path) -> Result<Self> {
        // SAFETY: the engine library was already loaded by the runtime pass;
        // opening it again only bumps its reference count.
        let library = unsafe { Library::new(path) }
            .map_err(|e| ParallaxError::NativeLoad(format!("{}: {e}", path.display())))?;
        // SAFETY: the library is the engine build this bridge ships with.
        let entry = unsafe { EntryPoints::resolve(&library)? };
        info!(path = %path.display(), "engine entry points resolved");
        Ok(Self { entry, _library: library })
    }
}

/// NUL-terminated copy of `s`; interior NULs make the call a no-op.
fn c_string(what: &str, s: &str) -> Option<CString> {
    match CString::new(s) {
        Ok(c) => Some(c),
        Err(_) => {
            warn!(what, "interior NUL, call dropped");
            None
        }
    }
}

impl NativeEngine for FfiEngine {
    fn set_open_path(&self, handle: BridgeHandle, path: &str, mime: &str, from_history: bool) {
        let (Some(path), Some(mime)) = (c_string("path", path), c_string("mime", mime)) else {
            return;
        };
        // SAFETY: both strings outlive the call; the engine copies them.
        unsafe { (self.entry.set_open_path)(handle.as_raw(), path.as_ptr(), mime.as_ptr(), from_history) }
    }

    fn set_orientation_quaternion(&self, handle: BridgeHandle, quat: Quaternion, screen_rotation_deg: f32) {
        // SAFETY: plain values only.
        unsafe {
            (self.entry.set_quaternion)(handle.as_raw(), quat.x, quat.y, quat.z, quat.w, screen_rotation_deg)
        }
    }

    fn set_orientation_legacy(
        &self,
        handle: BridgeHandle,
        azimuth: f32,
        pitch: f32,
        roll: f32,
        screen_rotation_deg: f32,
    ) {
        // SAFETY: plain values only.
        unsafe { (self.entry.set_orientation)(handle.as_raw(), azimuth, pitch, roll, screen_rotation_deg) }
    }

    fn define_orientation_sensor(&self, handle: BridgeHandle, has_sensor: bool, is_low_quality: bool) {
        // SAFETY: plain values only.
        unsafe { (self.entry.define_orientation_sensor)(handle.as_raw(), has_sensor, is_low_quality) }
    }

    fn on_back_pressed(&self, handle: BridgeHandle) {
        // SAFETY: plain values only.
        unsafe { (self.entry.on_back_pressed)(handle.as_raw()) }
    }

    fn on_before_surface_changed(&self, handle: BridgeHandle, is_before: bool) {
        // SAFETY: plain values only.
        unsafe { (self.entry.on_before_surface_changed)(handle.as_raw(), is_before) }
    }

    fn is_key_overridden(&self, handle: BridgeHandle, key_code: i32) -> bool {
        // SAFETY: plain values only.
        unsafe { (self.entry.is_key_overridden)(handle.as_raw(), key_code) }
    }

    fn set_swap_eyes(&self, handle: BridgeHandle, swap: bool) {
        // SAFETY: plain values only.
        unsafe { (self.entry.set_swap_eyes)(handle.as_raw(), swap) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_is_a_load_error() {
        let err = FfiEngine::open_path(Path::new("/nonexistent/libsview.so")).err().unwrap();
        assert!(matches!(err, ParallaxError::NativeLoad(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn empty_feature_list_is_a_config_error() {
        let config = AppConfig { feature_libraries: Vec::new(), ..Default::default() };
        assert!(matches!(FfiEngine::open(&config), Err(ParallaxError::Config(_))));
    }

    #[test]
    fn interior_nul_is_rejected() {
        assert!(c_string("path", "/sdcard/a\0b.mp4").is_none());
        assert_eq!(c_string("mime", "video/mp4").unwrap().as_bytes(), b"video/mp4");
    }
}
