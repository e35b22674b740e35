// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Android host via JNI.
//
// Two halves. `AndroidPlatform` implements the host seams by calling the
// Android SDK (and a handful of shim methods on the activity) through JNI.
// The `Java_com_parallax_*` exports are what the Java shim classes call: the
// activity forwards its lifecycle and the engine's requests, the playback
// service forwards `onStartCommand`.
//
// ## Shim contract
//
// `com.parallax.HostActivity` must provide:
// - `requestUiDrain()`: `runOnUiThread(() -> nativeDrainUiQueue())`
// - `showMessageDialog(String)`, `showFatalDialog(String)` (the fatal dialog's
//   only button leaves the app)
// - `superOnBackPressed()`, `superSurfaceChanged(SurfaceHolder, int, int, int)`
// - `registerOrientationListener(int) -> boolean`, `unregisterOrientationListener()`
//   with the listener calling `nativeOnSensorChanged(int, float[])`
// - `setStereoSurface(boolean)`
//
// `com.parallax.PlaybackService` returns `nativeOnStartCommand(action)` from
// `onStartCommand`.

#![cfg(target_os = "android")]

use std::cell::RefCell;
use std::os::fd::{FromRawFd, OwnedFd};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, Once, OnceLock, PoisonError};

use jni::objects::{GlobalRef, JFloatArray, JObject, JString, JValue, JValueOwned};
use jni::sys::{JNI_FALSE, JNI_TRUE, jboolean, jint, jlong};
use jni::{AttachGuard, JNIEnv, JavaVM};

use parallax_core::capabilities::{HostCapabilities, ProbeResults};
use parallax_core::config::AppConfig;
use parallax_core::error::{ParallaxError, Result};
use parallax_core::types::{LaunchRequest, ScreenRotation, SensorInventory, SensorKind};
use parallax_runtime::crash::CrashRecord;
use parallax_runtime::loader::load_natives;
use tracing::{error, info, warn};

use crate::activity::{ActivityContext, HostActivity, launch, present_fatal};
use crate::continuity::{
    ContinuityService, NotificationChannel, PlaybackNotification, StartMode,
};
use crate::engine_ffi::FfiEngine;
use crate::sessions::SessionTable;
use crate::traits::*;
use crate::ui_queue::UiTaskQueue;

/// Playback service class, as named in the manifest.
const SERVICE_CLASS: &str = "com.parallax.PlaybackService";
/// Optional third-party stereo surface.
const STEREO_SURFACE_CLASS: &str = "com.s3dv.s3dvsurface.S3DVSurface";

const PARTIAL_WAKE_LOCK: jint = 0x0000_0001;
const PERMISSION_GRANTED: jint = 0;
const PERMISSION_REQUEST_CODE: jint = 0x5058_0001;
const IMPORTANCE_LOW: jint = 2;
const IMPORTANCE_DEFAULT: jint = 3;
const PRIORITY_LOW: jint = -1;
/// `FLAG_UPDATE_CURRENT | FLAG_IMMUTABLE`.
const PENDING_INTENT_FLAGS: jint = 0x0800_0000 | 0x0400_0000;
/// `android.R.drawable.ic_media_play`.
const ICON_MEDIA_PLAY: jint = 0x0108_0023;

// ---------------------------------------------------------------------------
// JNI helpers
// ---------------------------------------------------------------------------

/// Convert a JNI error, clearing any pending Java exception.
fn jni_err(env: &mut JNIEnv, what: &str, e: jni::errors::Error) -> ParallaxError {
    if env.exception_check().unwrap_or(false) {
        let _ = env.exception_describe();
        let _ = env.exception_clear();
    }
    ParallaxError::Bridge(format!("{what}: {e}"))
}

fn call<'local>(
    env: &mut JNIEnv<'local>,
    obj: &JObject,
    name: &str,
    sig: &str,
    args: &[JValue],
) -> Result<JValueOwned<'local>> {
    let result = env.call_method(obj, name, sig, args);
    result.map_err(|e| jni_err(env, name, e))
}

fn call_static<'local>(
    env: &mut JNIEnv<'local>,
    class: &str,
    name: &str,
    sig: &str,
    args: &[JValue],
) -> Result<JValueOwned<'local>> {
    let result = env.call_static_method(class, name, sig, args);
    result.map_err(|e| jni_err(env, name, e))
}

fn obj(value: JValueOwned<'_>) -> Result<JObject<'_>> {
    value.l().map_err(|e| ParallaxError::Bridge(format!("expected object: {e}")))
}

fn jstring<'local>(env: &mut JNIEnv<'local>, s: &str) -> Result<JString<'local>> {
    let result = env.new_string(s);
    result.map_err(|e| jni_err(env, "new_string", e))
}

fn opt_string(env: &mut JNIEnv, s: &JString) -> Option<String> {
    if s.is_null() {
        return None;
    }
    env.get_string(s).ok().map(Into::into)
}

fn system_service<'local>(env: &mut JNIEnv<'local>, ctx: &JObject, name: &str) -> Result<JObject<'local>> {
    let name = jstring(env, name)?;
    obj(call(
        env,
        ctx,
        "getSystemService",
        "(Ljava/lang/String;)Ljava/lang/Object;",
        &[JValue::Object(&name)],
    )?)
}

fn log_failure(what: &str, result: Result<()>) {
    if let Err(e) = result {
        warn!(what, error = %e, "host call failed");
    }
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

pub struct AndroidPlatform {
    vm: JavaVM,
    activity: GlobalRef,
    application_id: String,
    caps: OnceLock<HostCapabilities>,
    ui: UiTaskQueue,
    wake_lock: Mutex<Option<GlobalRef>>,
}

impl AndroidPlatform {
    pub fn new(env: &mut JNIEnv, activity: &JObject, application_id: &str) -> Result<Arc<Self>> {
        let vm = env.get_java_vm().map_err(|e| jni_err(env, "get_java_vm", e))?;
        let activity = env.new_global_ref(activity).map_err(|e| jni_err(env, "new_global_ref", e))?;
        Ok(Arc::new(Self {
            vm,
            activity,
            application_id: application_id.to_string(),
            caps: OnceLock::new(),
            ui: UiTaskQueue::new(),
            wake_lock: Mutex::new(None),
        }))
    }

    fn env(&self) -> Result<AttachGuard<'_>> {
        self.vm
            .attach_current_thread()
            .map_err(|e| ParallaxError::Bridge(format!("failed to attach JNI thread: {e}")))
    }

    fn activity(&self) -> &JObject<'static> {
        self.activity.as_obj()
    }

    /// Call a no-argument void method on the activity.
    fn call_activity(&self, name: &str) -> Result<()> {
        let mut env = self.env()?;
        call(&mut env, self.activity(), name, "()V", &[]).map(|_| ())
    }

    /// Call a `(String)V` method on the activity.
    fn call_activity_str(&self, name: &str, arg: &str) -> Result<()> {
        let mut env = self.env()?;
        let arg = jstring(&mut env, arg)?;
        call(&mut env, self.activity(), name, "(Ljava/lang/String;)V", &[JValue::Object(&arg)]).map(|_| ())
    }

    /// Run queued UI tasks. Called from the shim's UI-thread runnable.
    pub fn drain_ui(&self) -> usize {
        self.ui.drain()
    }

    fn probe(&self) -> Result<HostCapabilities> {
        let mut env = self.env()?;
        let sdk = env
            .get_static_field("android/os/Build$VERSION", "SDK_INT", "I")
            .and_then(|v| v.i());
        let sdk = sdk.map_err(|e| jni_err(&mut env, "Build.VERSION.SDK_INT", e))?;

        let stereo_surface = self.class_exists(&mut env, STEREO_SURFACE_CLASS);
        let permission_api = match env.get_method_id(
            "android/app/Activity",
            "checkSelfPermission",
            "(Ljava/lang/String;)I",
        ) {
            Ok(_) => true,
            Err(e) => {
                jni_err(&mut env, "checkSelfPermission", e);
                false
            }
        };

        Ok(HostCapabilities::resolve(
            u32::try_from(sdk).unwrap_or(0),
            ProbeResults { stereo_surface, permission_api },
        ))
    }

    /// Look a class up through the app's own class loader.
    fn class_exists(&self, env: &mut JNIEnv, dotted_name: &str) -> bool {
        let found = (|| -> Result<()> {
            let loader = obj(call(env, self.activity(), "getClassLoader", "()Ljava/lang/ClassLoader;", &[])?)?;
            let name = jstring(env, dotted_name)?;
            call(
                env,
                &loader,
                "loadClass",
                "(Ljava/lang/String;)Ljava/lang/Class;",
                &[JValue::Object(&name)],
            )?;
            Ok(())
        })();
        found.is_ok()
    }

    fn service_intent<'local>(&self, env: &mut JNIEnv<'local>, action: &str) -> Result<JObject<'local>> {
        let intent = env.new_object("android/content/Intent", "()V", &[]);
        let intent = intent.map_err(|e| jni_err(env, "new Intent", e))?;
        let class = jstring(env, SERVICE_CLASS)?;
        call(
            env,
            &intent,
            "setClassName",
            "(Landroid/content/Context;Ljava/lang/String;)Landroid/content/Intent;",
            &[JValue::Object(self.activity()), JValue::Object(&class)],
        )?;
        let action = jstring(env, &format!("{}.{action}", self.application_id))?;
        call(
            env,
            &intent,
            "setAction",
            "(Ljava/lang/String;)Landroid/content/Intent;",
            &[JValue::Object(&action)],
        )?;
        Ok(intent)
    }

    fn start_with(&self, method: &str) -> Result<()> {
        let mut env = self.env()?;
        let intent = self.service_intent(&mut env, crate::continuity::ACTION_START_SERVICE)?;
        call(
            &mut env,
            self.activity(),
            method,
            "(Landroid/content/Intent;)Landroid/content/ComponentName;",
            &[JValue::Object(&intent)],
        )
        .map(|_| ())
    }
}

impl UiThread for AndroidPlatform {
    fn run_on_ui_thread(&self, task: UiTask) {
        self.ui.post(task);
        log_failure("requestUiDrain", self.call_activity("requestUiDrain"));
    }
}

impl HostUi for AndroidPlatform {
    fn show_toast(&self, text: &str) {
        log_failure("toast", (|| {
            let mut env = self.env()?;
            let text = jstring(&mut env, text)?;
            let toast = obj(call_static(
                &mut env,
                "android/widget/Toast",
                "makeText",
                "(Landroid/content/Context;Ljava/lang/CharSequence;I)Landroid/widget/Toast;",
                &[JValue::Object(self.activity()), JValue::Object(&text), JValue::Int(0)],
            )?)?;
            call(&mut env, &toast, "show", "()V", &[]).map(|_| ())
        })());
    }

    fn show_message(&self, text: &str) {
        log_failure("showMessageDialog", self.call_activity_str("showMessageDialog", text));
    }

    fn show_fatal_dialog(&self, text: &str) {
        log_failure("showFatalDialog", self.call_activity_str("showFatalDialog", text));
    }

    fn set_window_title(&self, title: &str) {
        log_failure("setTitle", (|| {
            let mut env = self.env()?;
            let title = jstring(&mut env, title)?;
            call(
                &mut env,
                self.activity(),
                "setTitle",
                "(Ljava/lang/CharSequence;)V",
                &[JValue::Object(&title)],
            )
            .map(|_| ())
        })());
    }

    fn set_system_ui_flags(&self, flags: i32) {
        log_failure("setSystemUiVisibility", (|| {
            let mut env = self.env()?;
            let window = obj(call(&mut env, self.activity(), "getWindow", "()Landroid/view/Window;", &[])?)?;
            let decor = obj(call(&mut env, &window, "getDecorView", "()Landroid/view/View;", &[])?)?;
            call(&mut env, &decor, "setSystemUiVisibility", "(I)V", &[JValue::Int(flags)]).map(|_| ())
        })());
    }

    fn finish(&self) {
        log_failure("finish", self.call_activity("finish"));
    }

    fn default_back_pressed(&self) {
        log_failure("superOnBackPressed", self.call_activity("superOnBackPressed"));
    }
}

impl SensorHub for AndroidPlatform {
    fn inventory(&self) -> SensorInventory {
        let probed = (|| -> Result<SensorInventory> {
            let mut env = self.env()?;
            let manager = system_service(&mut env, self.activity(), "sensor")?;
            let mut has = |kind: SensorKind| -> Result<bool> {
                let sensor = obj(call(
                    &mut env,
                    &manager,
                    "getDefaultSensor",
                    "(I)Landroid/hardware/Sensor;",
                    &[JValue::Int(kind.type_id())],
                )?)?;
                Ok(!sensor.is_null())
            };
            Ok(SensorInventory {
                rotation_vector: has(SensorKind::RotationVector)?,
                legacy_orientation: has(SensorKind::Orientation)?,
                gyroscope: has(SensorKind::Gyroscope)?,
            })
        })();
        probed.unwrap_or_else(|e| {
            warn!(error = %e, "sensor inventory unavailable");
            SensorInventory::default()
        })
    }

    fn register(&self, kind: SensorKind) -> Result<()> {
        let mut env = self.env()?;
        let registered = call(
            &mut env,
            self.activity(),
            "registerOrientationListener",
            "(I)Z",
            &[JValue::Int(kind.type_id())],
        )?
        .z()
        .map_err(|e| ParallaxError::Bridge(e.to_string()))?;
        if registered {
            Ok(())
        } else {
            Err(ParallaxError::Sensor(format!("listener for {kind:?} refused")))
        }
    }

    fn unregister(&self) {
        log_failure("unregisterOrientationListener", self.call_activity("unregisterOrientationListener"));
    }

    fn display_rotation(&self) -> ScreenRotation {
        let rotation = (|| -> Result<i32> {
            let mut env = self.env()?;
            let wm = obj(call(&mut env, self.activity(), "getWindowManager", "()Landroid/view/WindowManager;", &[])?)?;
            let display = obj(call(&mut env, &wm, "getDefaultDisplay", "()Landroid/view/Display;", &[])?)?;
            call(&mut env, &display, "getRotation", "()I", &[])?
                .i()
                .map_err(|e| ParallaxError::Bridge(e.to_string()))
        })();
        ScreenRotation::from_surface_rotation(rotation.unwrap_or(0))
    }
}

impl ContentResolver for AndroidPlatform {
    fn open_read_only(&self, reference: &str) -> Result<OwnedFd> {
        let mut env = self.env()?;
        let uri_string = jstring(&mut env, reference)?;
        let uri = obj(call_static(
            &mut env,
            "android/net/Uri",
            "parse",
            "(Ljava/lang/String;)Landroid/net/Uri;",
            &[JValue::Object(&uri_string)],
        )?)?;
        let resolver = obj(call(
            &mut env,
            self.activity(),
            "getContentResolver",
            "()Landroid/content/ContentResolver;",
            &[],
        )?)?;
        let mode = jstring(&mut env, "r")?;
        let pfd = obj(call(
            &mut env,
            &resolver,
            "openFileDescriptor",
            "(Landroid/net/Uri;Ljava/lang/String;)Landroid/os/ParcelFileDescriptor;",
            &[JValue::Object(&uri), JValue::Object(&mode)],
        )
        .map_err(|e| ParallaxError::ContentResolution(format!("{reference}: {e}")))?)?;
        if pfd.is_null() {
            return Err(ParallaxError::ContentResolution(format!("{reference}: no descriptor")));
        }

        let fd = call(&mut env, &pfd, "detachFd", "()I", &[])?
            .i()
            .map_err(|e| ParallaxError::Bridge(e.to_string()))?;
        if fd < 0 {
            return Err(ParallaxError::ContentResolution(format!("{reference}: invalid descriptor")));
        }
        // SAFETY: `detachFd` transferred ownership of this descriptor to us.
        Ok(unsafe { OwnedFd::from_raw_fd(fd) })
    }
}

impl ServiceControl for AndroidPlatform {
    fn start_foreground_service(&self, _title: &str) -> Result<()> {
        self.start_with("startForegroundService")
    }

    fn start_service(&self, _title: &str) -> Result<()> {
        self.start_with("startService")
    }

    fn stop_service(&self) -> Result<()> {
        let mut env = self.env()?;
        let intent = self.service_intent(&mut env, crate::continuity::ACTION_STOP_SERVICE)?;
        call(
            &mut env,
            self.activity(),
            "stopService",
            "(Landroid/content/Intent;)Z",
            &[JValue::Object(&intent)],
        )
        .map(|_| ())
    }

    fn acquire_wake_lock(&self, tag: &str) -> Result<()> {
        let mut env = self.env()?;
        let power = system_service(&mut env, self.activity(), "power")?;
        let tag = jstring(&mut env, tag)?;
        let lock = obj(call(
            &mut env,
            &power,
            "newWakeLock",
            "(ILjava/lang/String;)Landroid/os/PowerManager$WakeLock;",
            &[JValue::Int(PARTIAL_WAKE_LOCK), JValue::Object(&tag)],
        )?)?;
        call(&mut env, &lock, "acquire", "()V", &[])?;
        let lock = env.new_global_ref(&lock).map_err(|e| jni_err(&mut env, "new_global_ref", e))?;
        *self.wake_lock.lock().unwrap_or_else(PoisonError::into_inner) = Some(lock);
        Ok(())
    }

    fn release_wake_lock(&self) -> Result<()> {
        let Some(lock) = self.wake_lock.lock().unwrap_or_else(PoisonError::into_inner).take() else {
            return Ok(());
        };
        let mut env = self.env()?;
        call(&mut env, lock.as_obj(), "release", "()V", &[]).map(|_| ())
    }
}

impl Permissions for AndroidPlatform {
    fn is_granted(&self, permission: &str) -> Option<bool> {
        let mut env = self.env().ok()?;
        let permission = jstring(&mut env, permission).ok()?;
        let status = call(
            &mut env,
            self.activity(),
            "checkSelfPermission",
            "(Ljava/lang/String;)I",
            &[JValue::Object(&permission)],
        )
        .ok()?;
        Some(status.i().ok()? == PERMISSION_GRANTED)
    }

    fn request(&self, permission: &str) {
        log_failure("requestPermissions", (|| {
            let mut env = self.env()?;
            let permission = jstring(&mut env, permission)?;
            let array = env.new_object_array(1, "java/lang/String", &permission);
            let array = array.map_err(|e| jni_err(&mut env, "new_object_array", e))?;
            call(
                &mut env,
                self.activity(),
                "requestPermissions",
                "([Ljava/lang/String;I)V",
                &[JValue::Object(&array), JValue::Int(PERMISSION_REQUEST_CODE)],
            )
            .map(|_| ())
        })());
    }
}

impl HostPlatform for AndroidPlatform {
    fn platform_name(&self) -> String {
        format!("Android (API {})", self.capabilities().sdk_level)
    }

    fn capabilities(&self) -> HostCapabilities {
        *self.caps.get_or_init(|| {
            self.probe().unwrap_or_else(|e| {
                warn!(error = %e, "capability probe failed, assuming minimal host");
                HostCapabilities::resolve(0, ProbeResults::default())
            })
        })
    }

    fn set_stereo_surface(&self, enabled: bool) -> Result<()> {
        let mut env = self.env()?;
        call(&mut env, self.activity(), "setStereoSurface", "(Z)V", &[JValue::Bool(enabled.into())]).map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Playback service side
// ---------------------------------------------------------------------------

/// Notification calls on the running service, for one `onStartCommand`.
struct ServiceSink<'local> {
    env: RefCell<JNIEnv<'local>>,
    service: JObject<'local>,
    channels: bool,
}

impl ForegroundSink for ServiceSink<'_> {
    fn create_channel(&self, channel: &NotificationChannel) -> Result<()> {
        let mut env = self.env.borrow_mut();
        let env = &mut *env;
        let id = jstring(env, &channel.id)?;
        let name = jstring(env, &channel.name)?;
        let importance = if channel.low_importance { IMPORTANCE_LOW } else { IMPORTANCE_DEFAULT };
        let created = env.new_object(
            "android/app/NotificationChannel",
            "(Ljava/lang/String;Ljava/lang/CharSequence;I)V",
            &[JValue::Object(&id), JValue::Object(&name), JValue::Int(importance)],
        );
        let ch = created.map_err(|e| jni_err(env, "new NotificationChannel", e))?;
        call(env, &ch, "enableLights", "(Z)V", &[JValue::Bool(channel.lights.into())])?;
        call(env, &ch, "enableVibration", "(Z)V", &[JValue::Bool(channel.vibration.into())])?;
        if !channel.sound {
            let none = JObject::null();
            call(
                env,
                &ch,
                "setSound",
                "(Landroid/net/Uri;Landroid/media/AudioAttributes;)V",
                &[JValue::Object(&none), JValue::Object(&none)],
            )?;
        }
        let manager = system_service(env, &self.service, "notification")?;
        call(
            env,
            &manager,
            "createNotificationChannel",
            "(Landroid/app/NotificationChannel;)V",
            &[JValue::Object(&ch)],
        )
        .map(|_| ())
    }

    fn post_foreground(&self, notification: &PlaybackNotification) -> Result<()> {
        let mut env = self.env.borrow_mut();
        let env = &mut *env;
        let ctx = &self.service;

        let builder = if self.channels {
            let channel = jstring(env, &notification.channel_id)?;
            env.new_object(
                "android/app/Notification$Builder",
                "(Landroid/content/Context;Ljava/lang/String;)V",
                &[JValue::Object(ctx), JValue::Object(&channel)],
            )
        } else {
            env.new_object("android/app/Notification$Builder", "(Landroid/content/Context;)V", &[JValue::Object(ctx)])
        };
        let builder = builder.map_err(|e| jni_err(env, "new Notification.Builder", e))?;

        const BUILDER: &str = "Landroid/app/Notification$Builder;";
        let title = jstring(env, &notification.title)?;
        call(env, &builder, "setContentTitle", &format!("(Ljava/lang/CharSequence;){BUILDER}"), &[JValue::Object(&title)])?;
        call(env, &builder, "setSmallIcon", &format!("(I){BUILDER}"), &[JValue::Int(ICON_MEDIA_PLAY)])?;
        call(env, &builder, "setOngoing", &format!("(Z){BUILDER}"), &[JValue::Bool(notification.ongoing.into())])?;
        if notification.low_priority {
            call(env, &builder, "setPriority", &format!("(I){BUILDER}"), &[JValue::Int(PRIORITY_LOW)])?;
        }

        let created = env.new_object("android/content/Intent", "()V", &[]);
        let open_intent = created.map_err(|e| jni_err(env, "new Intent", e))?;
        let activity_class = jstring(env, &notification.content_activity)?;
        call(
            env,
            &open_intent,
            "setClassName",
            "(Landroid/content/Context;Ljava/lang/String;)Landroid/content/Intent;",
            &[JValue::Object(ctx), JValue::Object(&activity_class)],
        )?;
        let open_pending = obj(call_static(
            env,
            "android/app/PendingIntent",
            "getActivity",
            "(Landroid/content/Context;ILandroid/content/Intent;I)Landroid/app/PendingIntent;",
            &[JValue::Object(ctx), JValue::Int(0), JValue::Object(&open_intent), JValue::Int(PENDING_INTENT_FLAGS)],
        )?)?;
        call(
            env,
            &builder,
            "setContentIntent",
            &format!("(Landroid/app/PendingIntent;){BUILDER}"),
            &[JValue::Object(&open_pending)],
        )?;

        let class = obj(call(env, ctx, "getClass", "()Ljava/lang/Class;", &[])?)?;
        for (request_code, action) in (0..).zip(&notification.actions) {
            let created = env.new_object("android/content/Intent", "()V", &[]);
            let intent = created.map_err(|e| jni_err(env, "new Intent", e))?;
            call(
                env,
                &intent,
                "setClass",
                "(Landroid/content/Context;Ljava/lang/Class;)Landroid/content/Intent;",
                &[JValue::Object(ctx), JValue::Object(&class)],
            )?;
            let intent_action = jstring(env, &action.intent_action)?;
            call(
                env,
                &intent,
                "setAction",
                "(Ljava/lang/String;)Landroid/content/Intent;",
                &[JValue::Object(&intent_action)],
            )?;
            let pending = obj(call_static(
                env,
                "android/app/PendingIntent",
                "getService",
                "(Landroid/content/Context;ILandroid/content/Intent;I)Landroid/app/PendingIntent;",
                &[
                    JValue::Object(ctx),
                    JValue::Int(request_code),
                    JValue::Object(&intent),
                    JValue::Int(PENDING_INTENT_FLAGS),
                ],
            )?)?;
            let label = jstring(env, &action.label)?;
            call(
                env,
                &builder,
                "addAction",
                &format!("(ILjava/lang/CharSequence;Landroid/app/PendingIntent;){BUILDER}"),
                &[JValue::Int(0), JValue::Object(&label), JValue::Object(&pending)],
            )?;
        }

        let built = obj(call(env, &builder, "build", "()Landroid/app/Notification;", &[])?)?;
        call(
            env,
            ctx,
            "startForeground",
            "(ILandroid/app/Notification;)V",
            &[JValue::Int(notification.id), JValue::Object(&built)],
        )
        .map(|_| ())
    }

    fn stop_foreground(&self) -> Result<()> {
        let mut env = self.env.borrow_mut();
        let env = &mut *env;
        call(env, &self.service, "stopForeground", "(Z)V", &[JValue::Bool(JNI_TRUE)])?;
        call(env, &self.service, "stopSelf", "()V", &[]).map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Process state
// ---------------------------------------------------------------------------

static LOGGING: Once = Once::new();

/// Shared by every activity instance and the playback service.
static CONTINUITY: OnceLock<Arc<ContinuityService>> = OnceLock::new();

/// The platform outlives a failed launch so its fatal dialog still drains.
struct Session {
    platform: Arc<AndroidPlatform>,
    activity: Option<Arc<HostActivity>>,
}

/// One entry per live activity object.
static SESSIONS: SessionTable<Session> = SessionTable::new();

fn init_logging() {
    LOGGING.call_once(|| {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Info)
                .with_tag("parallax"),
        );

        std::panic::set_hook(Box::new(|info| {
            let payload = info
                .payload()
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| info.payload().downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            let location = info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                .unwrap_or_else(|| "unknown".to_string());
            error!(%location, %payload, "panic");
        }));
    });
}

/// Matches the session whose platform wraps `this`.
fn owned_by<'a>(env: &'a JNIEnv, this: &'a JObject) -> impl FnMut(&Session) -> bool + 'a {
    move |session| env.is_same_object(session.platform.activity(), this).unwrap_or(false)
}

fn set_session(env: &JNIEnv, this: &JObject, platform: Arc<AndroidPlatform>, activity: Option<Arc<HostActivity>>) {
    SESSIONS.insert(Session { platform, activity }, owned_by(env, this));
}

fn current_platform(env: &JNIEnv, this: &JObject) -> Option<Arc<AndroidPlatform>> {
    SESSIONS.find(owned_by(env, this), |s| Arc::clone(&s.platform))
}

fn current_activity(env: &JNIEnv, this: &JObject) -> Option<Arc<HostActivity>> {
    SESSIONS.find(owned_by(env, this), |s| s.activity.clone()).flatten()
}

/// Run `f` against the activity behind `this`, outside the session lock.
fn with_activity<R>(env: &JNIEnv, this: &JObject, fallback: R, f: impl FnOnce(&HostActivity) -> R) -> R {
    match current_activity(env, this) {
        Some(activity) => f(&activity),
        None => fallback,
    }
}

/// `Context.getFilesDir()`, the package's private data directory.
fn files_dir(env: &mut JNIEnv, ctx: &JObject) -> Result<PathBuf> {
    let dir = obj(call(env, ctx, "getFilesDir", "()Ljava/io/File;", &[])?)?;
    let path = obj(call(env, &dir, "getAbsolutePath", "()Ljava/lang/String;", &[])?)?;
    opt_string(env, &JString::from(path))
        .map(PathBuf::from)
        .ok_or_else(|| ParallaxError::Bridge("getFilesDir returned no path".into()))
}

fn launch_request(
    env: &mut JNIEnv,
    action: &JString,
    data: &JString,
    mime: &JString,
    stream: &JString,
    flags: jint,
) -> Option<LaunchRequest> {
    let request = LaunchRequest {
        action: opt_string(env, action),
        data: opt_string(env, data),
        mime: opt_string(env, mime),
        stream: opt_string(env, stream),
        flags: flags as u32,
    };
    request.has_payload().then_some(request)
}

// ---------------------------------------------------------------------------
// Activity exports
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_parallax_HostActivity_nativeOnCreate(
    mut env: JNIEnv,
    this: JObject,
    action: JString,
    data: JString,
    mime: JString,
    stream: JString,
    flags: jint,
) -> jboolean {
    init_logging();

    let config = match files_dir(&mut env, &this) {
        Ok(dir) => AppConfig::load_in(&dir).unwrap_or_else(|e| {
            warn!(error = %e, "config unreadable, using defaults");
            AppConfig { data_dir: dir, ..AppConfig::default() }
        }),
        Err(e) => {
            warn!(error = %e, "files dir unavailable, using package default");
            AppConfig::load(AppConfig::default_path()).unwrap_or_default()
        }
    };
    let platform = match AndroidPlatform::new(&mut env, &this, &config.application_id) {
        Ok(platform) => platform,
        Err(e) => {
            error!(error = %e, "android platform unavailable");
            return JNI_FALSE;
        }
    };
    let host: Arc<dyn HostPlatform> = platform.clone();

    let caps = match launch(&config, &host, load_natives) {
        Ok(caps) => caps,
        Err(_) => {
            set_session(&env, &this, platform, None);
            return JNI_FALSE;
        }
    };
    let engine = match FfiEngine::open(&config) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            set_session(&env, &this, platform, None);
            let record = CrashRecord::new(host.platform_name(), "engine entry points missing", e.to_string());
            present_fatal(&host, &config, record, format!("Broken package?\n{e}"));
            return JNI_FALSE;
        }
    };
    let continuity = Arc::clone(CONTINUITY.get_or_init(|| Arc::new(ContinuityService::new(caps, &config))));

    let request = launch_request(&mut env, &action, &data, &mime, &stream, flags);
    let activity = HostActivity::create(ActivityContext::new(config, caps, host, engine, continuity), request);
    set_session(&env, &this, platform, Some(activity));
    JNI_TRUE
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_parallax_HostActivity_nativeOnNewIntent(
    mut env: JNIEnv,
    this: JObject,
    action: JString,
    data: JString,
    mime: JString,
    stream: JString,
    flags: jint,
) {
    if let Some(request) = launch_request(&mut env, &action, &data, &mime, &stream, flags) {
        with_activity(&env, &this, (), |a| a.on_new_intent(request));
    }
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_parallax_HostActivity_nativeOnResume(env: JNIEnv, this: JObject) {
    with_activity(&env, &this, (), HostActivity::on_resume);
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_parallax_HostActivity_nativeOnPause(env: JNIEnv, this: JObject) {
    with_activity(&env, &this, (), HostActivity::on_pause);
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_parallax_HostActivity_nativeOnDestroy(env: JNIEnv, this: JObject) {
    let session = SESSIONS.remove(owned_by(&env, &this));
    if let Some(activity) = session.and_then(|s| s.activity) {
        activity.on_destroy();
    }
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_parallax_HostActivity_nativeOnBackPressed(env: JNIEnv, this: JObject) {
    with_activity(&env, &this, (), |a| {
        a.on_back_pressed();
    });
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_parallax_HostActivity_nativeOnKeyDown(
    env: JNIEnv,
    this: JObject,
    key_code: jint,
) -> jboolean {
    with_activity(&env, &this, false, |a| a.on_key_down(key_code)).into()
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_parallax_HostActivity_nativeOnSensorChanged(
    env: JNIEnv,
    this: JObject,
    sensor_type: jint,
    values: JFloatArray,
) {
    let mut buf = [0f32; 5];
    let len = env.get_array_length(&values).unwrap_or(0).clamp(0, buf.len() as i32) as usize;
    if env.get_float_array_region(&values, 0, &mut buf[..len]).is_err() {
        return;
    }
    with_activity(&env, &this, (), |a| a.on_sensor_changed(SensorKind::from_type_id(sensor_type), &buf[..len]));
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_parallax_HostActivity_nativeSurfaceChanged(
    mut env: JNIEnv,
    this: JObject,
    holder: JObject,
    format: jint,
    width: jint,
    height: jint,
) {
    let Some(activity) = current_activity(&env, &this) else {
        return;
    };
    let applied = activity.on_surface_changed(|| {
        call(
            &mut env,
            &this,
            "superSurfaceChanged",
            "(Landroid/view/SurfaceHolder;III)V",
            &[JValue::Object(&holder), JValue::Int(format), JValue::Int(width), JValue::Int(height)],
        )
        .map(|_| ())
    });
    if let Err(e) = applied {
        error!(error = %e, "surface change failed");
    }
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_parallax_HostActivity_nativeDrainUiQueue(env: JNIEnv, this: JObject) {
    if let Some(platform) = current_platform(&env, &this) {
        platform.drain_ui();
    }
}

// -- Engine requests forwarded by the shim ----------------------------------

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_parallax_HostActivity_nativeSetInstance(env: JNIEnv, this: JObject, handle: jlong) {
    with_activity(&env, &this, (), |a| a.set_native_instance(handle as u64));
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_parallax_HostActivity_nativeSetTrackOrientation(
    env: JNIEnv,
    this: JObject,
    track: jboolean,
) {
    with_activity(&env, &this, (), |a| a.set_track_orientation(track != JNI_FALSE));
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_parallax_HostActivity_nativeSetWakeLock(
    mut env: JNIEnv,
    this: JObject,
    title: JString,
    on: jboolean,
) {
    let title = opt_string(&mut env, &title);
    with_activity(&env, &this, (), |a| a.request_wake_lock(title, on != JNI_FALSE));
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_parallax_HostActivity_nativeSetWindowTitle(
    mut env: JNIEnv,
    this: JObject,
    title: JString,
) {
    let title = opt_string(&mut env, &title).unwrap_or_default();
    with_activity(&env, &this, (), |a| a.set_window_title(title));
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_parallax_HostActivity_nativeHideSystemBars(
    env: JNIEnv,
    this: JObject,
    hide_status_bar: jboolean,
    hide_nav_bar: jboolean,
) {
    with_activity(&env, &this, (), |a| a.hide_system_bars(hide_status_bar != JNI_FALSE, hide_nav_bar != JNI_FALSE));
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_parallax_HostActivity_nativePostToast(mut env: JNIEnv, this: JObject, text: JString) {
    let text = opt_string(&mut env, &text).unwrap_or_default();
    with_activity(&env, &this, (), |a| a.post_toast(text));
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_parallax_HostActivity_nativePostMessage(mut env: JNIEnv, this: JObject, text: JString) {
    let text = opt_string(&mut env, &text).unwrap_or_default();
    with_activity(&env, &this, (), |a| a.post_message(text));
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_parallax_HostActivity_nativePostExit(env: JNIEnv, this: JObject) {
    with_activity(&env, &this, (), HostActivity::post_exit);
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_parallax_HostActivity_nativeReadOpenPath(
    env: JNIEnv,
    this: JObject,
    clear_after_read: jboolean,
) {
    with_activity(&env, &this, (), |a| {
        a.read_open_path(clear_after_read != JNI_FALSE);
    });
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_parallax_HostActivity_nativeOpenFileDescriptor(
    mut env: JNIEnv,
    this: JObject,
    path: JString,
) -> jint {
    let Some(path) = opt_string(&mut env, &path) else {
        return -1;
    };
    with_activity(&env, &this, -1, |a| a.open_descriptor_for(&path))
}

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_parallax_HostActivity_nativeSetHardwareStereo(
    env: JNIEnv,
    this: JObject,
    enabled: jboolean,
) {
    with_activity(&env, &this, (), |a| a.set_hardware_stereo(enabled != JNI_FALSE));
}

// ---------------------------------------------------------------------------
// Service export
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub extern "system" fn Java_com_parallax_PlaybackService_nativeOnStartCommand(
    mut env: JNIEnv,
    service: JObject,
    action: JString,
) -> jint {
    init_logging();
    let action = opt_string(&mut env, &action);

    let continuity = CONTINUITY.get().cloned();
    let sink = ServiceSink {
        env: RefCell::new(env),
        service,
        channels: continuity.as_ref().is_some_and(|c| c.caps().supports_notification_channels),
    };

    match continuity {
        Some(continuity) => continuity.on_start_command(&sink, action.as_deref()).as_android(),
        None => {
            // Restarted without an activity; there is nothing to keep playing.
            info!("playback service started without a session, stopping");
            if let Err(e) = sink.stop_foreground() {
                warn!(error = %e, "foreground stop failed");
            }
            StartMode::NotSticky.as_android()
        }
    }
}
