//! Strict mode handling for diagnostics.
//!
//! Fatal diagnostics always panic. Strict mode decides what happens to the
//! lesser kinds:
//! - Warn: just emit
//! - PanicOnError: misuse reports (`AL2xx`) panic too (useful for CI)
//! - PanicOnWarning: out-of-memory reports panic as well

use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

use super::kind::DiagnosticKind;

/// Strict mode behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StrictMode {
    /// Just warn, don't panic.
    Warn = 0,
    /// Panic on errors.
    PanicOnError = 1,
    /// Panic on errors and warnings.
    PanicOnWarning = 2,
}

impl StrictMode {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => StrictMode::PanicOnError,
            2 => StrictMode::PanicOnWarning,
            _ => StrictMode::Warn,
        }
    }

    /// Whether a diagnostic of `kind` panics under this mode.
    pub fn panics_on(self, kind: DiagnosticKind) -> bool {
        match kind {
            DiagnosticKind::Fatal => true,
            DiagnosticKind::Error => self != StrictMode::Warn,
            DiagnosticKind::Warning => self == StrictMode::PanicOnWarning,
        }
    }
}

impl FromStr for StrictMode {
    type Err = ();

    /// Accepts `0`/`warn`, `1`/`error`, `2`/`warning`/`all`.
    fn from_str(s: &str) -> Result<Self, ()> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "warn" | "false" => Ok(StrictMode::Warn),
            "1" | "error" | "true" => Ok(StrictMode::PanicOnError),
            "2" | "warning" | "all" => Ok(StrictMode::PanicOnWarning),
            _ => Err(()),
        }
    }
}

/// Global strict mode setting.
static STRICT_MODE: AtomicU8 = AtomicU8::new(StrictMode::Warn as u8);

/// Set the strict mode.
pub fn set_strict_mode(mode: StrictMode) {
    STRICT_MODE.store(mode as u8, Ordering::Relaxed);
}

/// Get the current strict mode.
pub fn strict_mode() -> StrictMode {
    StrictMode::from_raw(STRICT_MODE.load(Ordering::Relaxed))
}

/// Whether a diagnostic of `kind` panics under the current mode.
pub fn should_panic(kind: DiagnosticKind) -> bool {
    strict_mode().panics_on(kind)
}

/// RAII guard for temporarily setting strict mode.
pub struct StrictModeGuard {
    previous: StrictMode,
}

impl StrictModeGuard {
    /// Create a new guard that sets strict mode.
    pub fn new(mode: StrictMode) -> Self {
        let previous = strict_mode();
        set_strict_mode(mode);
        Self { previous }
    }

    /// Create a guard that enables panic-on-error.
    pub fn panic_on_error() -> Self {
        Self::new(StrictMode::PanicOnError)
    }
}

impl Drop for StrictModeGuard {
    fn drop(&mut self) {
        set_strict_mode(self.previous);
    }
}

/// Initialize strict mode from the `ARENALLOC_STRICT` environment variable.
///
/// Unknown values leave the current mode unchanged.
pub fn init_from_env() {
    if let Some(mode) = std::env::var("ARENALLOC_STRICT")
        .ok()
        .and_then(|val| val.parse().ok())
    {
        set_strict_mode(mode);
    }
}
