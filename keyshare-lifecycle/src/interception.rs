//! Scoped suspension of lifecycle event dispatch.
//!
//! Housekeeping writes (key files, share-keys, account records) would look
//! like ordinary file events to the dispatcher. Handlers run synchronously,
//! so any event those writes raise is dispatched on the same thread, inside
//! the handler's call chain. A [`Suspension`] marks that call chain: while it
//! is alive the dispatcher suppresses events raised from the thread that took
//! it, and only from that thread. Requests served on other threads are
//! dispatched normally. Writers in [`KeyManager`](crate::KeyManager) take a
//! `&Suspension` to prove dispatch is suspended.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};

/// Per-call-chain switch consulted by the dispatcher.
#[derive(Clone, Debug, Default)]
pub struct Interception {
    depths: Arc<Mutex<HashMap<ThreadId, usize>>>,
}

impl Interception {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspends dispatch for the calling thread until the returned guard is
    /// dropped. Nests.
    pub fn suspend(&self) -> Suspension {
        let thread = thread::current().id();
        *self.lock().entry(thread).or_insert(0) += 1;
        Suspension {
            depths: Arc::clone(&self.depths),
            thread,
        }
    }

    /// Whether the calling thread is inside a suspension.
    pub fn is_suspended(&self) -> bool {
        self.lock().contains_key(&thread::current().id())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ThreadId, usize>> {
        // The map holds plain counters, so a poisoned lock is still usable.
        self.depths.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Capability proving event dispatch is suspended for one call chain.
/// Restores on drop.
#[derive(Debug)]
#[must_use = "dispatch resumes as soon as the suspension is dropped"]
pub struct Suspension {
    depths: Arc<Mutex<HashMap<ThreadId, usize>>>,
    thread: ThreadId,
}

impl Drop for Suspension {
    fn drop(&mut self) {
        let mut depths = self.depths.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(depth) = depths.get_mut(&self.thread) {
            *depth -= 1;
            if *depth == 0 {
                depths.remove(&self.thread);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suspension_restores_on_drop() {
        let interception = Interception::new();
        assert!(!interception.is_suspended());
        {
            let _outer = interception.suspend();
            {
                let _inner = interception.suspend();
                assert!(interception.is_suspended());
            }
            assert!(interception.is_suspended());
        }
        assert!(!interception.is_suspended());
    }

    #[test]
    fn clones_share_state() {
        let a = Interception::new();
        let b = a.clone();
        let guard = a.suspend();
        assert!(b.is_suspended());
        drop(guard);
        assert!(!b.is_suspended());
    }

    #[test]
    fn suspension_does_not_leak_to_other_threads() {
        let interception = Interception::new();
        let _guard = interception.suspend();

        let other = interception.clone();
        let seen = thread::spawn(move || other.is_suspended()).join().unwrap();
        assert!(!seen);
        assert!(interception.is_suspended());
    }

    #[test]
    fn separate_instances_are_independent() {
        let a = Interception::new();
        let b = Interception::new();
        let _guard = a.suspend();
        assert!(!b.is_suspended());
    }
}
