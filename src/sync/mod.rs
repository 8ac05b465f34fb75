//! Synchronization primitives.
//!
//! The tracker itself is single-threaded; this only backs `SharedTracker`.

pub(crate) mod mutex;
