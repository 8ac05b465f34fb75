//! # arenalloc
//!
//! Arena-pooled memory allocator with built-in accounting, installed behind
//! a four-argument realloc callback (`lua_Alloc` style).
//!
//! ## Features
//!
//! - Fixed 1 MiB arenas (up to 128), created lazily
//! - Exact-fit fast path, best-fit tail carving otherwise
//! - Address-ordered coalescing on free, inferred from addresses alone
//! - Requests over 1 MiB routed to the system allocator and tracked apart
//! - Live bytes, peak pooled bytes, and live count; leaks are fatal at
//!   teardown
//! - C ABI entry points for hosts that take an allocator hook
//!
//! ## Quick Start
//!
//! ```rust
//! use arenalloc::{Tracker, TrackerConfig};
//!
//! let mut tracker = Tracker::with_config(TrackerConfig::default());
//!
//! unsafe {
//!     let a = tracker.realloc(None, 0, 100).unwrap();
//!     let a = tracker.realloc(Some(a), 100, 200).unwrap();
//!     tracker.realloc(Some(a), 200, 0);
//! }
//!
//! println!("{}", tracker.stats());
//! tracker.destroy();
//! ```

pub mod api;
pub mod diagnostics;
pub mod ffi;

mod allocators;
mod sync;
mod util;

#[cfg(feature = "debug")]
pub mod debug;

// Re-export public API at crate root for convenience
pub use api::config::TrackerConfig;
pub use api::shared::SharedTracker;
pub use api::snapshot::{ArenaSnapshot, TrackerSnapshot};
pub use api::stats::TrackerStats;
pub use api::tracker::{size_class, InvariantError, Tracker};

// Arena engine types that show up in snapshots and errors
pub use allocators::arena::{ALIGNMENT, ARENA_SIZE};
pub use allocators::coalesce::CoalesceError;
pub use allocators::free_list::{FreeBlock, FreeListError};
pub use allocators::table::{ArenaId, MAX_ARENAS};

// Diagnostics
pub use diagnostics::{Diagnostic, DiagnosticKind, MemoryEvent, ProfilerHooks, SizeClass};
pub use diagnostics::{set_strict_mode, StrictMode, StrictModeGuard};

// C ABI
pub use ffi::{arenalloc_delete, arenalloc_new, arenalloc_realloc, ReallocFn};
