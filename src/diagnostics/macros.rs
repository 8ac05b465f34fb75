//! Diagnostic macros.
//!
//! Thin wrappers over [`emit`](super::emit) so call sites read as one line.

/// Emit a predefined diagnostic by code, optionally with formatted context.
///
/// # Example
///
/// ```rust,ignore
/// al_emit!(AL001);
/// al_emit!(AL201, "freed {} bytes, allocated {}", given, recorded);
/// ```
#[macro_export]
macro_rules! al_emit {
    ($code:ident) => {{
        $crate::diagnostics::emit::emit(&$crate::diagnostics::$code);
    }};
    ($code:ident, $($ctx:tt)+) => {{
        $crate::diagnostics::emit::emit_with_context(
            &$crate::diagnostics::$code,
            &format!($($ctx)+),
        );
    }};
}

/// Raise a fatal diagnostic with formatted context. Never returns.
///
/// # Example
///
/// ```rust,ignore
/// al_fatal!(AL101, "pointer {:p}, size {}", ptr, size);
/// ```
#[macro_export]
macro_rules! al_fatal {
    ($code:ident, $($ctx:tt)+) => {
        $crate::diagnostics::emit::fatal(&$crate::diagnostics::$code, &format!($($ctx)+))
    };
}

/// Assert a condition or raise a fatal diagnostic.
///
/// # Example
///
/// ```rust,ignore
/// al_assert!(self.live_count == 0, AL103, "live={}", self.live_count);
/// ```
#[macro_export]
macro_rules! al_assert {
    ($cond:expr, $code:ident, $($ctx:tt)+) => {{
        if !$cond {
            $crate::al_fatal!($code, $($ctx)+);
        }
    }};
}
