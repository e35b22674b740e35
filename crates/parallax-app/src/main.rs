// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Parallax desktop harness.
//
// Runs one activity lifecycle against the stub platform: load natives, bind
// the engine, resolve the launch target, then pause and tear down. The
// resolved open request is printed as JSON on stdout.

mod request;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use parallax_bridge::stub::StubPlatform;
use parallax_bridge::{ActivityContext, ContinuityService, FfiEngine, HostActivity, HostPlatform, launch, present_fatal};
use parallax_core::config::AppConfig;
use parallax_runtime::crash::CrashRecord;
use parallax_runtime::loader::load_natives;
use request::Invocation;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let invocation = Invocation::parse();

    let config_path = invocation.config.clone().unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&config_path).unwrap_or_else(|e| {
        tracing::warn!(path = %config_path.display(), error = %e, "config unreadable, using defaults");
        AppConfig::default()
    });

    tracing::info!("Parallax starting");

    let platform = Arc::new(StubPlatform::new());
    let host: Arc<dyn HostPlatform> = platform.clone();

    let caps = match launch(&config, &host, load_natives) {
        Ok(caps) => caps,
        Err(_) => {
            platform.drain_ui();
            return ExitCode::FAILURE;
        }
    };

    let engine = match FfiEngine::open(&config) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            let record = CrashRecord::new(host.platform_name(), "engine entry points missing", e.to_string());
            present_fatal(&host, &config, record, format!("Broken package?\n{e}"));
            platform.drain_ui();
            return ExitCode::FAILURE;
        }
    };

    let continuity = Arc::new(ContinuityService::new(caps, &config));
    let activity = HostActivity::create(
        ActivityContext::new(config, caps, host, engine, continuity),
        invocation.launch_request(),
    );

    activity.on_resume();
    let resolved = activity.read_open_path(true);
    platform.drain_ui();

    match serde_json::to_string_pretty(&resolved) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!(error = %e, "failed to encode open request"),
    }

    activity.on_pause();
    activity.on_destroy();
    platform.drain_ui();

    tracing::info!(exit_requested = platform.exit_requested(), "Parallax stopped");
    ExitCode::SUCCESS
}
