//! Diagnostic kinds and predefined codes.
//!
//! Mirrors rustc's diagnostic levels for familiar UX.

/// The severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticKind {
    /// Something unusual but recoverable happened (e.g. out of memory).
    Warning,
    /// The caller or the allocator did something wrong.
    Error,
    /// Memory is corrupt; execution cannot continue.
    Fatal,
}

impl DiagnosticKind {
    /// Get the display prefix for this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Error => "error",
            DiagnosticKind::Fatal => "fatal",
        }
    }
}

/// A diagnostic message with code, message, and optional context.
///
/// Diagnostic codes follow the pattern:
/// - `AL0xx` - resource exhaustion
/// - `AL1xx` - internal invariant violations (always fatal)
/// - `AL2xx` - caller misuse detected by the debug ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity level.
    pub kind: DiagnosticKind,
    /// Diagnostic code (e.g., "AL101").
    pub code: &'static str,
    /// Primary message.
    pub message: &'static str,
    /// Optional additional context.
    pub note: Option<&'static str>,
    /// Optional fix suggestion.
    pub help: Option<&'static str>,
}

impl Diagnostic {
    /// Create a new warning diagnostic.
    pub const fn warning(code: &'static str, message: &'static str) -> Self {
        Self::new(DiagnosticKind::Warning, code, message)
    }

    /// Create a new error diagnostic.
    pub const fn error(code: &'static str, message: &'static str) -> Self {
        Self::new(DiagnosticKind::Error, code, message)
    }

    /// Create a new fatal diagnostic.
    pub const fn fatal(code: &'static str, message: &'static str) -> Self {
        Self::new(DiagnosticKind::Fatal, code, message)
    }

    const fn new(kind: DiagnosticKind, code: &'static str, message: &'static str) -> Self {
        Self {
            kind,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Add a note to this diagnostic.
    pub const fn with_note(mut self, note: &'static str) -> Self {
        self.note = Some(note);
        self
    }

    /// Add a help message to this diagnostic.
    pub const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

// =============================================================================
// AL0xx - Exhaustion
// =============================================================================

/// AL001: Neither the arenas nor the system allocator could satisfy a request.
pub const AL001: Diagnostic = Diagnostic::warning(
    "AL001",
    "out of memory: pooled arenas and system allocator both exhausted"
).with_note("the callback returned null; the host decides whether to abort")
 .with_help("check live_allocations in TrackerStats for a leak in the host");

/// AL002: All arena slots are in use.
pub const AL002: Diagnostic = Diagnostic::warning(
    "AL002",
    "arena table is full, no new arena can be created"
).with_note("arena count and size are fixed; fragmentation can exhaust them early")
 .with_help("inspect Tracker::snapshot() for fragmented arenas");

// =============================================================================
// AL1xx - Invariant violations
// =============================================================================

/// AL101: A pooled pointer was freed that no arena owns.
pub const AL101: Diagnostic = Diagnostic::fatal(
    "AL101",
    "freed pointer is not owned by any arena"
).with_note("the pointer did not come from this allocator, or its size was reported wrong")
 .with_help("sizes up to 1 MiB are pooled; the old size passed on free must match the allocation");

/// AL102: A freed range collides with free-list state.
pub const AL102: Diagnostic = Diagnostic::fatal(
    "AL102",
    "freed range overlaps a free block or leaves its arena"
).with_note("this is a double free or a free with the wrong size")
 .with_help("enable the `debug` feature to record sizes and backtraces per allocation");

/// AL103: Live memory remained at teardown.
pub const AL103: Diagnostic = Diagnostic::fatal(
    "AL103",
    "tracker destroyed with live allocations"
).with_note("every allocation must be freed before the tracker is destroyed")
 .with_help("enable the `debug` feature for a leak report with backtraces");

/// AL104: Free-list or accounting invariant check failed.
pub const AL104: Diagnostic = Diagnostic::fatal(
    "AL104",
    "arena free list or accounting is inconsistent"
).with_note("this indicates memory corruption by the host or a bug in arenalloc");

/// AL105: A counter would go below zero.
pub const AL105: Diagnostic = Diagnostic::fatal(
    "AL105",
    "accounting underflow"
).with_note("more bytes or allocations were freed than were ever allocated");

/// AL106: A huge block was freed with a size no allocation could have.
pub const AL106: Diagnostic = Diagnostic::fatal(
    "AL106",
    "huge block freed with an impossible size"
).with_note("the size has no valid layout, so the block was not released")
 .with_help("the old size passed on free must match the allocation");

// =============================================================================
// AL2xx - Caller misuse (debug ledger)
// =============================================================================

/// AL201: Size passed on free differs from the allocation size.
pub const AL201: Diagnostic = Diagnostic::error(
    "AL201",
    "free size does not match the allocation size"
).with_note("the allocator trusts the caller's size; a mismatch corrupts the free list")
 .with_help("pass the exact size used when the block was allocated or last resized");

/// AL202: An address with no live allocation was freed.
pub const AL202: Diagnostic = Diagnostic::error(
    "AL202",
    "free of an address with no live allocation"
).with_note("this is a double free or a free of a foreign pointer");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predefined_codes() {
        assert_eq!(AL101.kind, DiagnosticKind::Fatal);
        assert_eq!(AL001.kind, DiagnosticKind::Warning);
        assert_eq!(AL201.kind, DiagnosticKind::Error);
        assert!(AL103.help.is_some());
        assert!(AL104.help.is_none());
    }

    #[test]
    fn test_kind_ordering() {
        assert!(DiagnosticKind::Fatal > DiagnosticKind::Error);
        assert!(DiagnosticKind::Error > DiagnosticKind::Warning);
        assert_eq!(DiagnosticKind::Fatal.prefix(), "fatal");
    }
}
