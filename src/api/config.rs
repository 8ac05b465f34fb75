//! Tracker configuration.
//!
//! Arena size and arena count are fixed constants; configuration only
//! controls how much checking the tracker does on each operation.

/// Configuration for a [`Tracker`](crate::Tracker).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Overwrite freed pooled memory past the free-block header with `0xCD`
    pub poison_freed: bool,

    /// Run the full free-list check on the owning arena after every free
    pub validate_on_free: bool,

    /// Keep a per-allocation ledger (sizes and backtraces); needs the
    /// `debug` feature, ignored otherwise
    pub debug_mode: bool,

    /// Emit `AL001` when an allocation fails
    pub report_out_of_memory: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poison_freed: cfg!(feature = "debug"),
            validate_on_free: false,
            debug_mode: cfg!(feature = "debug"),
            report_out_of_memory: true,
        }
    }
}

impl TrackerConfig {
    /// Every check enabled. Slow; meant for tests and leak hunts.
    pub fn paranoid() -> Self {
        Self {
            poison_freed: true,
            validate_on_free: true,
            debug_mode: true,
            report_out_of_memory: true,
        }
    }

    /// No optional work at all.
    pub fn minimal() -> Self {
        Self {
            poison_freed: false,
            validate_on_free: false,
            debug_mode: false,
            report_out_of_memory: false,
        }
    }

    /// Builder pattern: poison freed memory.
    pub fn with_poison(mut self, enable: bool) -> Self {
        self.poison_freed = enable;
        self
    }

    /// Builder pattern: validate the arena after each free.
    pub fn with_validation(mut self, enable: bool) -> Self {
        self.validate_on_free = enable;
        self
    }

    /// Builder pattern: enable the allocation ledger.
    pub fn with_debug(mut self, enable: bool) -> Self {
        self.debug_mode = enable;
        self
    }

    /// Builder pattern: report allocation failures.
    pub fn with_oom_reports(mut self, enable: bool) -> Self {
        self.report_out_of_memory = enable;
        self
    }

    /// Whether the ledger will actually be kept in this build.
    pub fn ledger_enabled(&self) -> bool {
        cfg!(feature = "debug") && self.debug_mode
    }
}
