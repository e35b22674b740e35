// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content reference resolution.
//
// A `content://` reference is opaque, but the descriptor the provider hands
// back often points at an ordinary file. Reading the `/proc/self/fd` link of
// that descriptor recovers the real path, which the engine can open by itself
// and use to find sibling files (subtitles, the other half of a stereo pair).
// When that fails the engine asks for a descriptor instead.

use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, IntoRawFd, RawFd};
use std::path::{Path, PathBuf};

use parallax_core::types::{CONTENT_SCHEME, ContentResolution};
use tracing::{debug, warn};

use crate::traits::ContentResolver;

/// Maps an open descriptor back to the path it refers to.
pub trait FdPathProbe: Send + Sync {
    fn target_of(&self, fd: RawFd) -> io::Result<PathBuf>;

    /// Whether this process can open `path` directly.
    fn is_readable(&self, path: &Path) -> bool {
        File::open(path).is_ok()
    }
}

/// Reads `/proc/self/fd/<n>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcSelfFd;

impl FdPathProbe for ProcSelfFd {
    fn target_of(&self, fd: RawFd) -> io::Result<PathBuf> {
        std::fs::read_link(format!("/proc/self/fd/{fd}"))
    }
}

/// Resolves references through a platform resolver and a path probe.
pub struct ContentReferences<'a> {
    resolver: &'a dyn ContentResolver,
    probe: &'a dyn FdPathProbe,
}

impl<'a> ContentReferences<'a> {
    pub fn new(resolver: &'a dyn ContentResolver, probe: &'a dyn FdPathProbe) -> Self {
        Self { resolver, probe }
    }

    /// Real filesystem path behind `reference`, if there is one this process
    /// may read. Failures are expected and only logged at debug level.
    pub fn resolve_canonical_path(&self, reference: &str) -> Option<PathBuf> {
        let fd = match self.resolver.open_read_only(reference) {
            Ok(fd) => fd,
            Err(e) => {
                debug!(reference, error = %e, "content reference could not be opened");
                return None;
            }
        };

        let target = match self.probe.target_of(fd.as_raw_fd()) {
            Ok(target) => target,
            Err(e) => {
                debug!(reference, error = %e, "descriptor link unreadable");
                return None;
            }
        };
        // Pipes and sockets show up as `pipe:[1234]`.
        if !target.is_absolute() {
            debug!(reference, target = %target.display(), "descriptor is not backed by a file");
            return None;
        }
        if !self.probe.is_readable(&target) {
            debug!(reference, target = %target.display(), "canonical path not readable");
            return None;
        }
        Some(target)
    }

    /// A fresh read-only descriptor for `reference`, detached from its owner.
    /// The caller becomes responsible for closing it. `-1` on failure.
    pub fn open_descriptor(&self, reference: &str) -> RawFd {
        let opened = if reference.starts_with(CONTENT_SCHEME) {
            self.resolver.open_read_only(reference)
        } else {
            File::open(reference).map(Into::into).map_err(Into::into)
        };
        match opened {
            Ok(fd) => fd.into_raw_fd(),
            Err(e) => {
                warn!(reference, error = %e, "descriptor handoff failed");
                -1
            }
        }
    }

    /// Prefer the canonical path, fall back to a detached descriptor.
    pub fn resolve(&self, reference: &str) -> Option<ContentResolution> {
        if let Some(path) = self.resolve_canonical_path(reference) {
            return Some(ContentResolution::CanonicalPath(path));
        }
        match self.open_descriptor(reference) {
            -1 => None,
            fd => Some(ContentResolution::Descriptor(fd)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MapResolver;
    use std::os::fd::{FromRawFd, OwnedFd};

    struct DenyingProbe;

    impl FdPathProbe for DenyingProbe {
        fn target_of(&self, _fd: RawFd) -> io::Result<PathBuf> {
            Err(io::Error::from(io::ErrorKind::PermissionDenied))
        }
    }

    fn movie_file() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let movies = dir.path().join("storage/emulated/0/Movies");
        std::fs::create_dir_all(&movies).unwrap();
        let clip = movies.join("clip.mp4");
        std::fs::write(&clip, b"\0\0\0\x18ftypmp42").unwrap();
        (dir, clip)
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    #[test]
    fn canonical_path_through_proc_self_fd() {
        let (_dir, clip) = movie_file();
        let resolver = MapResolver::new().with("content://media/external/video/42", &clip);
        let refs = ContentReferences::new(&resolver, &ProcSelfFd);

        let resolved = refs.resolve_canonical_path("content://media/external/video/42").unwrap();
        assert_eq!(resolved, clip.canonicalize().unwrap());
        assert!(resolved.ends_with("Movies/clip.mp4"));
    }

    #[test]
    fn unknown_reference_resolves_to_nothing() {
        let resolver = MapResolver::new();
        let refs = ContentReferences::new(&resolver, &ProcSelfFd);
        assert!(refs.resolve_canonical_path("content://nowhere/1").is_none());
        assert_eq!(refs.open_descriptor("content://nowhere/1"), -1);
        assert!(refs.resolve("content://nowhere/1").is_none());
    }

    #[test]
    fn descriptor_fallback_is_valid() {
        let (_dir, clip) = movie_file();
        let resolver = MapResolver::new().with("content://downloads/7", &clip);
        let refs = ContentReferences::new(&resolver, &DenyingProbe);

        assert!(refs.resolve_canonical_path("content://downloads/7").is_none());
        let Some(ContentResolution::Descriptor(fd)) = refs.resolve("content://downloads/7") else {
            panic!("expected descriptor fallback");
        };
        assert!(fd >= 0);
        // SAFETY: the descriptor was detached for us and is closed exactly once here.
        let owned = unsafe { OwnedFd::from_raw_fd(fd) };
        let mut file = File::from(owned);
        let mut bytes = Vec::new();
        std::io::Read::read_to_end(&mut file, &mut bytes).unwrap();
        assert_eq!(&bytes[4..8], b"ftyp");
    }

    #[test]
    fn plain_paths_open_directly() {
        let (_dir, clip) = movie_file();
        let resolver = MapResolver::new();
        let refs = ContentReferences::new(&resolver, &ProcSelfFd);

        let fd = refs.open_descriptor(clip.to_str().unwrap());
        assert!(fd >= 0);
        // SAFETY: detached descriptor owned by this test.
        drop(unsafe { OwnedFd::from_raw_fd(fd) });

        assert_eq!(refs.open_descriptor("/definitely/not/here.mkv"), -1);
    }
}
