// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Live activity sessions, looked up by the host object that owns them.
//
// The host may create the next activity before it destroys the previous one
// (rotation, re-launch from recents), so entries are found by a caller
// supplied identity test instead of assuming a single current session.

use std::sync::{Mutex, PoisonError};

use tracing::debug;

pub struct SessionTable<T> {
    entries: Mutex<Vec<T>>,
}

impl<T> SessionTable<T> {
    pub const fn new() -> Self {
        Self { entries: Mutex::new(Vec::new()) }
    }

    /// Store `entry`, replacing the one `owns` matches. Returns the replaced entry.
    pub fn insert(&self, entry: T, mut owns: impl FnMut(&T) -> bool) -> Option<T> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.iter().position(|e| owns(e)) {
            Some(index) => Some(std::mem::replace(&mut entries[index], entry)),
            None => {
                entries.push(entry);
                debug!(live = entries.len(), "session added");
                None
            }
        }
    }

    /// Map the matching entry while holding the lock. Keep `map` short.
    pub fn find<R>(&self, mut owns: impl FnMut(&T) -> bool, map: impl FnOnce(&T) -> R) -> Option<R> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.iter().find(|e| owns(e)).map(map)
    }

    /// Take the matching entry out. Other sessions are left alone.
    pub fn remove(&self, mut owns: impl FnMut(&T) -> bool) -> Option<T> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let index = entries.iter().position(|e| owns(e))?;
        let removed = entries.swap_remove(index);
        debug!(live = entries.len(), "session removed");
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for SessionTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
