use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Single-slot, overwrite-on-publish buffer shared between one producer and
/// any number of readers.
///
/// Publishing swaps in a new `Arc`, so readers always see a complete value.
/// Nothing is queued: a slow reader skips straight to the freshest value.
pub struct SnapshotSlot<T> {
    state: Mutex<SlotState<T>>,
    published: Condvar,
}

struct SlotState<T> {
    value: Option<Arc<T>>,
    version: u64,
}

impl<T> SnapshotSlot<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                value: None,
                version: 0,
            }),
            published: Condvar::new(),
        }
    }

    /// Replaces the current value and wakes any waiting readers.
    pub fn publish(&self, value: T) {
        let mut state = self.lock();
        state.value = Some(Arc::new(value));
        state.version += 1;
        drop(state);
        self.published.notify_all();
    }

    pub fn latest(&self) -> Option<Arc<T>> {
        self.lock().value.clone()
    }

    /// Latest value together with its version (0 = nothing published yet).
    pub fn latest_versioned(&self) -> (u64, Option<Arc<T>>) {
        let state = self.lock();
        (state.version, state.value.clone())
    }

    /// Blocks until a value newer than `seen_version` is published or
    /// `timeout` elapses. Returns `None` on timeout.
    pub fn wait_newer(&self, seen_version: u64, timeout: Duration) -> Option<(u64, Arc<T>)> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if state.version > seen_version {
                if let Some(ref value) = state.value {
                    return Some((state.version, value.clone()));
                }
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            state = match self.published.wait_timeout(state, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        // The slot only holds plain data; a panicking publisher cannot leave
        // it half-written, so a poisoned lock is still safe to read.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T> Default for SnapshotSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
