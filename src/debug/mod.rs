//! Debug utilities for tracking allocations.
//!
//! Only compiled when the `debug` feature is enabled.

pub mod ledger;

pub use ledger::{AllocationLedger, LedgerEntry, LedgerMismatch};
