//! Allocation ledger.
//!
//! Records the size and an unresolved backtrace for every live allocation
//! so that frees can be checked against the size actually allocated and
//! leaks at teardown can be attributed to a call site.

use std::collections::HashMap;
use std::fmt::Write;

use backtrace::Backtrace;

/// A recorded live allocation.
#[derive(Clone)]
pub struct LedgerEntry {
    /// Requested size in bytes
    pub size: usize,

    /// Allocation sequence number (1-based)
    pub sequence: u64,

    /// Captured backtrace (resolved lazily for reports)
    pub backtrace: Backtrace,
}

/// Why a release did not match the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerMismatch {
    /// No live allocation starts at the address.
    Unknown,
    /// The allocation exists but was recorded with another size.
    Size { recorded: usize },
}

/// Ledger of live allocations keyed by address.
#[derive(Default)]
pub struct AllocationLedger {
    live: HashMap<usize, LedgerEntry>,
    sequence: u64,
}

impl AllocationLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new allocation.
    pub fn record(&mut self, address: usize, size: usize) {
        self.sequence += 1;
        self.live.insert(
            address,
            LedgerEntry {
                size,
                sequence: self.sequence,
                backtrace: Backtrace::new_unresolved(),
            },
        );
    }

    /// Remove an allocation, checking that `size` matches the record.
    ///
    /// On a size mismatch the entry is removed anyway: the block is gone
    /// from the caller's point of view.
    pub fn release(&mut self, address: usize, size: usize) -> Result<LedgerEntry, LedgerMismatch> {
        let entry = self.live.remove(&address).ok_or(LedgerMismatch::Unknown)?;
        if entry.size != size {
            return Err(LedgerMismatch::Size { recorded: entry.size });
        }
        Ok(entry)
    }

    /// Number of live allocations.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Build a leak report listing every live allocation, oldest first.
    pub fn leak_report(&self) -> String {
        if self.live.is_empty() {
            return String::from("no live allocations");
        }

        let mut entries: Vec<_> = self.live.iter().collect();
        entries.sort_by_key(|(_, entry)| entry.sequence);

        let mut report = format!("{} live allocations:\n", entries.len());
        for (address, entry) in entries {
            let mut backtrace = entry.backtrace.clone();
            backtrace.resolve();
            let _ = writeln!(
                report,
                "  #{} at 0x{:x}, {} bytes\n{:?}",
                entry.sequence, address, entry.size, backtrace
            );
        }
        report
    }
}
