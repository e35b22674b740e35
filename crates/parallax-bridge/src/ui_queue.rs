// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Queue of closures waiting for the UI thread.
//
// Callbacks arrive on the sensor thread, the service thread and whatever
// thread the engine calls from. They post here; the thread that owns the UI
// drains the queue (Android: from a `runOnUiThread` runnable, desktop: from
// the harness loop).

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::trace;

use crate::traits::UiTask;

pub struct UiTaskQueue {
    sender: Sender<UiTask>,
    receiver: Receiver<UiTask>,
}

impl UiTaskQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Enqueue from any thread.
    pub fn post(&self, task: UiTask) {
        // The receiver lives as long as the queue, so sending cannot fail.
        let _ = self.sender.send(task);
    }

    /// Run everything queued so far. Call on the UI thread only.
    pub fn drain(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task();
            ran += 1;
        }
        if ran > 0 {
            trace!(ran, "drained UI tasks");
        }
        ran
    }

    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl Default for UiTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_in_posting_order() {
        let queue = UiTaskQueue::new();
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        for i in 0..3 {
            let log = Arc::clone(&log);
            queue.post(Box::new(move || log.lock().unwrap().push(i)));
        }
        assert_eq!(queue.pending(), 3);
        assert_eq!(queue.drain(), 3);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn posts_from_other_threads() {
        let queue = Arc::new(UiTaskQueue::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let hits = Arc::clone(&hits);
                std::thread::spawn(move || {
                    queue.post(Box::new(move || {
                        hits.fetch_add(1, Ordering::SeqCst);
                    }))
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        // Nothing runs until the owner drains.
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        queue.drain();
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }
}
