//! Mutex wrapper - uses parking_lot if available, std otherwise.
//!
//! Both variants expose the same surface: `new`, `lock`, `into_inner`.
//! A std mutex poisoned by a fatal diagnostic stays unusable.

#[cfg(feature = "parking_lot")]
pub use parking_lot::Mutex;

#[cfg(not(feature = "parking_lot"))]
mod std_mutex {
    use std::sync::{Mutex as StdMutex, MutexGuard as StdMutexGuard};

    const POISONED: &str = "arenalloc tracker poisoned by an earlier fatal error";

    /// Thin wrapper around std::sync::Mutex.
    pub struct Mutex<T>(StdMutex<T>);

    impl<T> Mutex<T> {
        /// Create a new mutex.
        pub const fn new(value: T) -> Self {
            Self(StdMutex::new(value))
        }

        /// Lock the mutex.
        pub fn lock(&self) -> MutexGuard<'_, T> {
            MutexGuard(self.0.lock().expect(POISONED))
        }

        /// Consume the mutex and return the value.
        pub fn into_inner(self) -> T {
            self.0.into_inner().expect(POISONED)
        }
    }

    /// Guard for std mutex.
    pub struct MutexGuard<'a, T>(StdMutexGuard<'a, T>);

    impl<T> std::ops::Deref for MutexGuard<'_, T> {
        type Target = T;

        fn deref(&self) -> &Self::Target {
            &self.0
        }
    }

    impl<T> std::ops::DerefMut for MutexGuard<'_, T> {
        fn deref_mut(&mut self) -> &mut Self::Target {
            &mut self.0
        }
    }
}

#[cfg(not(feature = "parking_lot"))]
pub use std_mutex::Mutex;
