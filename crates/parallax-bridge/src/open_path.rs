// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Open-path resolution.
//
// Turns the launch request the activity was (re)started with into the single
// command the engine pulls when it is ready: a transport control, a path to
// open, or nothing.

use std::sync::{Mutex, PoisonError};

use parallax_core::types::{CONTENT_SCHEME, FILE_SCHEME, LaunchRequest, OpenRequest, TransportCommand};
use tracing::debug;

use crate::content::ContentReferences;

/// Holds the pending launch request until the engine consumes it.
#[derive(Debug, Default)]
pub struct OpenPathResolver {
    pending: Mutex<Option<LaunchRequest>>,
}

impl OpenPathResolver {
    pub fn new(initial: Option<LaunchRequest>) -> Self {
        Self { pending: Mutex::new(initial) }
    }

    /// Replace the pending request (a new intent arrived).
    pub fn set_launch_request(&self, request: LaunchRequest) {
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(request);
    }

    pub fn has_pending(&self) -> bool {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Resolve the pending request. With `clear_after_read` the request is
    /// consumed, so asking again before a new launch yields the empty command.
    pub fn resolve(&self, clear_after_read: bool, content: &ContentReferences<'_>) -> OpenRequest {
        let request = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            if clear_after_read { pending.take() } else { pending.clone() }
        };
        resolve_request(request.as_ref(), content)
    }
}

/// Normalize one launch request.
pub fn resolve_request(request: Option<&LaunchRequest>, content: &ContentReferences<'_>) -> OpenRequest {
    let Some(request) = request.filter(|r| r.has_payload()) else {
        return OpenRequest::empty();
    };

    if let Some(command) = request.action.as_deref().and_then(TransportCommand::from_action) {
        debug!(%command, "launch request is a transport command");
        return OpenRequest::Control(command);
    }

    let mime = request.mime.clone().unwrap_or_default();
    let from_history = request.is_launched_from_history();
    let mut path = request.data.clone().unwrap_or_default();

    let subject = if request.is_share_with_stream() {
        request.stream.clone()
    } else if path.starts_with(CONTENT_SCHEME) {
        Some(path.clone())
    } else {
        None
    };

    match subject {
        Some(reference) => {
            path = match content.resolve_canonical_path(&reference) {
                Some(canonical) => canonical.to_string_lossy().into_owned(),
                // Left as-is; the engine will ask for a descriptor.
                None => reference,
            };
        }
        None => {
            if let Some(local) = path.strip_prefix(FILE_SCHEME) {
                path = percent_decode(local);
            }
        }
    }

    OpenRequest::Open { path, mime, from_history }
}

/// Decode `%XX` escapes. Malformed escapes are kept literally.
fn percent_decode(input: &str) -> String {
    fn hex(b: u8) -> Option<u8> {
        match b {
            b'0'..=b'9' => Some(b - b'0'),
            b'a'..=b'f' => Some(b - b'a' + 10),
            b'A'..=b'F' => Some(b - b'A' + 10),
            _ => None,
        }
    }

    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ProcSelfFd;
    use crate::testing::MapResolver;
    use parallax_core::types::{ACTION_SEND, FLAG_LAUNCHED_FROM_HISTORY};

    fn no_content() -> MapResolver {
        MapResolver::new()
    }

    #[test]
    fn nothing_pending_is_empty() {
        let resolver = no_content();
        let refs = ContentReferences::new(&resolver, &ProcSelfFd);
        assert!(OpenPathResolver::default().resolve(true, &refs).is_empty());
        assert!(resolve_request(Some(&LaunchRequest::default()), &refs).is_empty());
    }

    #[test]
    fn consumption_is_idempotent() {
        let resolver = no_content();
        let refs = ContentReferences::new(&resolver, &ProcSelfFd);
        let open = OpenPathResolver::new(Some(LaunchRequest::view("/sdcard/a.jps", "image/x-jps")));

        // Peeking leaves the request in place.
        assert_eq!(open.resolve(false, &refs).path(), "/sdcard/a.jps");
        assert_eq!(open.resolve(true, &refs).path(), "/sdcard/a.jps");
        assert!(open.resolve(true, &refs).is_empty());
        assert!(!open.has_pending());
    }

    #[test]
    fn transport_wins_over_data() {
        let resolver = no_content();
        let refs = ContentReferences::new(&resolver, &ProcSelfFd);
        let mut request = LaunchRequest::view("content://media/external/video/1", "video/mp4");
        request.action = Some("com.parallax.ACTION_PLAY_NEXT".into());

        assert_eq!(resolve_request(Some(&request), &refs), OpenRequest::Control(TransportCommand::Next));
    }

    #[test]
    fn file_uri_is_decoded() {
        let resolver = no_content();
        let refs = ContentReferences::new(&resolver, &ProcSelfFd);
        let mut request = LaunchRequest::view("file:///sdcard/My%20Movies/a%2Bb.mkv", "video/x-matroska");
        request.flags = FLAG_LAUNCHED_FROM_HISTORY;

        assert_eq!(
            resolve_request(Some(&request), &refs),
            OpenRequest::Open {
                path: "/sdcard/My Movies/a+b.mkv".into(),
                mime: "video/x-matroska".into(),
                from_history: true,
            }
        );
    }

    #[test]
    fn unresolvable_content_keeps_reference() {
        let resolver = no_content();
        let refs = ContentReferences::new(&resolver, &ProcSelfFd);
        let request = LaunchRequest::view("content://gmail/attachment/3", "image/jpeg");
        assert_eq!(resolve_request(Some(&request), &refs).path(), "content://gmail/attachment/3");
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    #[test]
    fn shared_stream_resolves_to_real_path() {
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("DCIM/pair.mpo");
        std::fs::create_dir_all(photo.parent().unwrap()).unwrap();
        std::fs::write(&photo, b"mpo").unwrap();

        let resolver = MapResolver::new().with("content://media/external/images/9", &photo);
        let refs = ContentReferences::new(&resolver, &ProcSelfFd);
        let request = LaunchRequest {
            action: Some(ACTION_SEND.into()),
            mime: Some("image/mpo".into()),
            stream: Some("content://media/external/images/9".into()),
            ..Default::default()
        };

        let resolved = resolve_request(Some(&request), &refs);
        assert_eq!(resolved.path(), photo.canonicalize().unwrap().to_str().unwrap());
        assert_eq!(resolved.mime(), "image/mpo");
    }

    #[test]
    fn percent_decoding_edges() {
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%4"), "%4");
        assert_eq!(percent_decode("%zz%41"), "%zzA");
        assert_eq!(percent_decode("%C3%A9t%C3%A9"), "été");
    }
}
