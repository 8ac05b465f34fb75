//! Diagnostics and profiler hooks.
//!
//! This module provides:
//! - **Runtime diagnostics**: coded, rustc-style messages for allocator
//!   problems, written to stderr and optionally to `log`
//! - **Strict mode**: escalate misuse reports to panics (for CI)
//! - **Profiler hooks**: per-event callbacks and optional Tracy plots
//!
//! ## Diagnostic Codes
//!
//! | Code  | Meaning                                   |
//! |-------|-------------------------------------------|
//! | AL0xx | Exhaustion (out of memory, table full)    |
//! | AL1xx | Invariant violations (always fatal)       |
//! | AL2xx | Caller misuse seen by the debug ledger    |
//!
//! Invariant violations mean memory is already corrupt, so they panic no
//! matter how strict mode is set.

pub mod emit;
pub mod kind;
pub mod macros;
pub mod profiler;
pub mod strict;

pub use emit::{emit, emit_with_context, fatal, render};
pub use kind::{Diagnostic, DiagnosticKind};
pub use profiler::{MemoryEvent, ProfilerCallback, ProfilerHooks, SizeClass};
pub use strict::{init_from_env, set_strict_mode, strict_mode, StrictMode, StrictModeGuard};

pub use kind::{AL001, AL002, AL101, AL102, AL103, AL104, AL105, AL106, AL201, AL202};
