// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command line to launch request.

use std::path::{Path, PathBuf};

use clap::Parser;
use parallax_core::types::{ACTION_SEND, FILE_SCHEME, FLAG_LAUNCHED_FROM_HISTORY, LaunchRequest};

#[derive(Debug, Default, PartialEq, Eq, Parser)]
#[command(name = "parallax", about = "Run one host activity lifecycle against the desktop stub")]
pub struct Invocation {
    /// Settings file to load instead of the default location.
    #[arg(long, env = "PARALLAX_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Deliver the target as a share stream instead of a view.
    #[arg(long)]
    pub share: bool,
    /// Mark the launch as coming from the recents list.
    #[arg(long)]
    pub history: bool,
    /// File path or URI to open.
    #[arg(value_name = "PATH | URI")]
    pub target: Option<String>,
}

impl Invocation {
    pub fn launch_request(&self) -> Option<LaunchRequest> {
        let target = self.target.as_deref()?;
        let reference = to_reference(target);
        let mime = mime_for(target);

        let mut request = if self.share {
            LaunchRequest {
                action: Some(ACTION_SEND.into()),
                stream: Some(reference),
                mime: Some(mime.into()),
                ..Default::default()
            }
        } else {
            LaunchRequest::view(reference, mime)
        };
        if self.history {
            request.flags |= FLAG_LAUNCHED_FROM_HISTORY;
        }
        Some(request)
    }
}

/// URIs pass through; plain paths become `file://` URLs.
fn to_reference(target: &str) -> String {
    if target.contains("://") {
        return target.to_string();
    }
    let path = Path::new(target);
    let absolute = path
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().map(|d| d.join(path)).unwrap_or_else(|_| path.to_path_buf()));
    format!("{FILE_SCHEME}{}", percent_encode(&absolute.to_string_lossy()))
}

fn percent_encode(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for byte in path.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'/' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn mime_for(target: &str) -> &'static str {
    let ext = Path::new(target)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("mp4" | "m4v") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("jpg" | "jpeg" | "jps") => "image/jpeg",
        Some("png") => "image/png",
        Some("mpo") => "image/mpo",
        _ => "*/*",
    }
}
