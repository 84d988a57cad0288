//! One-shot completion gate.

use std::sync::atomic::{AtomicBool, Ordering};

use event_listener::Event;

/// A gate that starts closed and opens exactly once.
///
/// Opening publishes with release ordering; observers see it with acquire
/// ordering. Any number of tasks may wait concurrently, before or after the
/// opening.
#[derive(Debug)]
pub(crate) struct Gate {
    opened: AtomicBool,
    event: Event,
}

impl Gate {
    pub(crate) fn new() -> Self {
        Self {
            opened: AtomicBool::new(false),
            event: Event::new(),
        }
    }

    /// Opens the gate and wakes every waiter. Idempotent.
    pub(crate) fn open(&self) {
        self.opened.store(true, Ordering::Release);
        self.event.notify(usize::MAX);
    }

    pub(crate) fn is_open(&self) -> bool {
        self.opened.load(Ordering::Acquire)
    }

    /// Resolves once the gate is open.
    pub(crate) async fn wait(&self) {
        loop {
            if self.is_open() {
                return;
            }

            // Register before the re-check so an opening between the check
            // and the listen cannot be missed.
            let listener = self.event.listen();

            if self.is_open() {
                return;
            }

            listener.await;
        }
    }
}
