use std::sync::Arc;

use meslink_codec::Status;
use parking_lot::Mutex;

/// Shared, cloneable view of the live resource [`Status`].
///
/// Reads take a full copy under the lock, so the heartbeat never frames a
/// half-applied update.
#[derive(Debug, Clone, Default)]
pub struct StatusHandle {
    inner: Arc<Mutex<Status>>,
}

impl StatusHandle {
    pub fn new(status: Status) -> Self {
        Self {
            inner: Arc::new(Mutex::new(status)),
        }
    }

    /// Copy of the current status.
    pub fn snapshot(&self) -> Status {
        *self.inner.lock()
    }

    /// Replace the status. Returns whether it changed.
    pub fn set(&self, status: Status) -> bool {
        let mut current = self.inner.lock();
        let changed = *current != status;
        *current = status;
        changed
    }

    /// Apply `change` atomically and return the resulting status together
    /// with whether anything changed.
    pub fn update(&self, change: impl FnOnce(&mut Status)) -> (Status, bool) {
        let mut current = self.inner.lock();
        let before = *current;
        change(&mut *current);
        (*current, *current != before)
    }
}
