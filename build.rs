//! Build script for arenalloc.
//!
//! Reports which optional integrations are compiled in, and warns about
//! combinations that cost performance in release builds.

use std::env;

fn main() {
    // Re-run if features change
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_DEBUG");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_DIAGNOSTICS");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_LOG");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_PARKING_LOT");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_TRACY");

    let debug_enabled = env::var("CARGO_FEATURE_DEBUG").is_ok();
    let diagnostics_enabled = env::var("CARGO_FEATURE_DIAGNOSTICS").is_ok();
    let log_enabled = env::var("CARGO_FEATURE_LOG").is_ok();
    let tracy_enabled = env::var("CARGO_FEATURE_TRACY").is_ok();

    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    let is_release = profile == "release";

    if debug_enabled {
        emit_info("Allocation ledger enabled (debug feature)");
        emit_note("Enable it per tracker with TrackerConfig::with_debug(true);");
        emit_note("frees are checked against the allocated size (AL201/AL202)");
        emit_note("and leaks at teardown are reported with backtraces.");

        if is_release {
            emit_warning("Ledger compiled into a release build!");
            emit_note("Every allocation captures a backtrace while it is enabled.");
        }
    }

    if tracy_enabled {
        emit_info("Tracy integration enabled: plotting pooled and huge bytes");
    }

    if is_release && !diagnostics_enabled && !log_enabled {
        emit_note("Warnings (AL0xx) are silent in release builds.");
        emit_note("Enable 'diagnostics' or 'log' to keep out-of-memory reports.");
    }
}

fn emit_info(msg: &str) {
    println!("cargo:warning=[arenalloc] {}", msg);
}

fn emit_note(msg: &str) {
    println!("cargo:warning=[arenalloc]    {}", msg);
}

fn emit_warning(msg: &str) {
    println!("cargo:warning=[arenalloc] warning: {}", msg);
}
