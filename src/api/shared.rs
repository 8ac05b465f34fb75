//! Mutex-serialized tracker for hosts that call in from several threads.
//!
//! The tracker has no internal locking. `SharedTracker` takes the one lock
//! around every call, which is all the serialization the tracker needs.

use std::ptr::NonNull;

use crate::api::config::TrackerConfig;
use crate::api::stats::TrackerStats;
use crate::api::tracker::Tracker;
use crate::sync::mutex::Mutex;

/// A [`Tracker`] behind a mutex.
pub struct SharedTracker {
    inner: Mutex<Tracker>,
}

impl SharedTracker {
    /// Create a shared tracker with the given configuration.
    pub fn new(config: TrackerConfig) -> Self {
        Self::from_tracker(Tracker::with_config(config))
    }

    /// Wrap an existing tracker.
    pub fn from_tracker(tracker: Tracker) -> Self {
        Self {
            inner: Mutex::new(tracker),
        }
    }

    /// Locked [`Tracker::realloc`].
    ///
    /// # Safety
    ///
    /// Same contract as [`Tracker::realloc`].
    pub unsafe fn realloc(
        &self,
        ptr: Option<NonNull<u8>>,
        old_size: usize,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        self.inner.lock().realloc(ptr, old_size, new_size)
    }

    /// Locked [`Tracker::allocate`].
    pub fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        self.inner.lock().allocate(size)
    }

    /// Locked [`Tracker::free`].
    ///
    /// # Safety
    ///
    /// Same contract as [`Tracker::free`].
    pub unsafe fn free(&self, ptr: NonNull<u8>, size: usize) {
        self.inner.lock().free(ptr, size)
    }

    /// Current accounting.
    pub fn stats(&self) -> TrackerStats {
        self.inner.lock().stats()
    }

    /// Run `f` with exclusive access to the tracker.
    pub fn with<R>(&self, f: impl FnOnce(&mut Tracker) -> R) -> R {
        f(&mut self.inner.lock())
    }

    /// Unwrap and destroy the tracker, running the leak check.
    pub fn destroy(self) {
        self.inner.into_inner().destroy();
    }
}

impl Default for SharedTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}
