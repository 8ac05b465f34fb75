//! Diagnostic emission backend.
//!
//! Writes diagnostics to stderr (debug builds, or the `diagnostics`
//! feature), forwards them to the `log` crate when that feature is on, and
//! panics according to [`strict`](super::strict) mode.

#[cfg(any(debug_assertions, feature = "diagnostics"))]
use std::io::Write;

use super::kind::{Diagnostic, DiagnosticKind};
use super::strict::should_panic;

/// Emit a diagnostic.
pub fn emit(diag: &Diagnostic) {
    emit_inner(diag, None);
}

/// Emit a diagnostic with additional runtime context.
pub fn emit_with_context(diag: &Diagnostic, context: &str) {
    emit_inner(diag, Some(context));
}

/// Emit a fatal diagnostic and panic, whatever the strict mode.
#[cold]
#[track_caller]
pub fn fatal(diag: &Diagnostic, context: &str) -> ! {
    emit_inner(diag, Some(context));
    panic!("[arenalloc][{}] {}\ncontext: {}", diag.code, diag.message, context);
}

#[track_caller]
fn emit_inner(diag: &Diagnostic, context: Option<&str>) {
    #[cfg(any(debug_assertions, feature = "diagnostics"))]
    write_to_stderr(diag, context);

    #[cfg(feature = "log")]
    emit_to_log(diag, context);

    // Fatal diagnostics are raised by `fatal` with their context
    if diag.kind != DiagnosticKind::Fatal && should_panic(diag.kind) {
        panic!(
            "[arenalloc][{}] {}\nStrict mode enabled - {}s are fatal.",
            diag.code,
            diag.message,
            diag.kind.prefix()
        );
    }
}

/// Render a diagnostic in the rustc-like multi-line format.
pub fn render(diag: &Diagnostic, context: Option<&str>) -> String {
    let mut out = format!("[arenalloc][{}] {}: {}\n", diag.code, diag.kind.prefix(), diag.message);

    if let Some(context) = context {
        out.push_str(&format!("  context: {}\n", context));
    }
    if let Some(note) = diag.note {
        out.push_str(&format!("  note: {}\n", note));
    }
    if let Some(help) = diag.help {
        out.push_str(&format!("  help: {}\n", help));
    }
    out
}

#[cfg(any(debug_assertions, feature = "diagnostics"))]
fn write_to_stderr(diag: &Diagnostic, context: Option<&str>) {
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{}", render(diag, context));
}

/// Forward a diagnostic to the `log` crate.
#[cfg(feature = "log")]
fn emit_to_log(diag: &Diagnostic, context: Option<&str>) {
    let context = context.unwrap_or("-");
    match diag.kind {
        DiagnosticKind::Fatal | DiagnosticKind::Error => {
            log::error!("[{}] {} ({})", diag.code, diag.message, context);
        }
        DiagnosticKind::Warning => {
            log::warn!("[{}] {} ({})", diag.code, diag.message, context);
        }
    }

    if let Some(note) = diag.note {
        log::info!("  note: {}", note);
    }
    if let Some(help) = diag.help {
        log::info!("  help: {}", help);
    }
}
