//! Latest-wins hand-off between the notification callback and the
//! consumption loop.
//!
//! The transport delivers notifications on its own threads, so the slot is
//! guarded by a mutex. The lock is only ever held for a copy of one
//! [`TelemetrySample`], which keeps the receive path non-blocking in practice.

use crate::domain::models::TelemetrySample;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Slot {
    sample: TelemetrySample,
    has_unread: bool,
}

/// Holds the most recent sample and whether it has been read yet.
#[derive(Debug, Default)]
pub struct SampleStore {
    slot: Mutex<Slot>,
    wake: Notify,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the stored sample and mark it unread. Single writer.
    pub fn publish(&self, sample: TelemetrySample) {
        {
            let mut slot = self.lock();
            slot.sample = sample;
            slot.has_unread = true;
        }
        // At most one permit is stored, so a burst collapses into one wake-up.
        self.wake.notify_one();
    }

    /// Return the stored sample if it has not been taken yet. Single reader.
    pub fn take_if_unread(&self) -> Option<TelemetrySample> {
        let mut slot = self.lock();
        if slot.has_unread {
            slot.has_unread = false;
            Some(slot.sample)
        } else {
            None
        }
    }

    /// Forget any unread sample, e.g. one left over from a previous session.
    pub fn reset(&self) {
        self.lock().has_unread = false;
    }

    /// Resolves once `publish` has been called since the last wake-up.
    pub async fn changed(&self) {
        self.wake.notified().await;
    }

    // The slot is always written wholesale, so a panic elsewhere cannot leave
    // it half-updated.
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
