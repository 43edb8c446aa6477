//! Build script for llmtrack.
//!
//! Reports which optional features are compiled in, with reminders for
//! combinations that behave differently than users tend to expect.

use std::env;

fn main() {
    // Re-run if features change
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_ASSET_TAGS");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_DEBUG");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_PARKING_LOT");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_TRACY");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_LOG");

    let asset_tags = env::var("CARGO_FEATURE_ASSET_TAGS").is_ok();
    let debug_enabled = env::var("CARGO_FEATURE_DEBUG").is_ok();
    let parking_lot_enabled = env::var("CARGO_FEATURE_PARKING_LOT").is_ok();
    let tracy_enabled = env::var("CARGO_FEATURE_TRACY").is_ok();
    let log_enabled = env::var("CARGO_FEATURE_LOG").is_ok();

    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    let is_release = profile == "release";

    // =========================================================================
    // Feature-specific diagnostics
    // =========================================================================

    if !asset_tags {
        emit_info("Asset tag sets compiled out");
        emit_note("-llmtagsets=Assets will be rejected with LLM001.");
        emit_note("AssetClasses still work but are not charged to allocations.");
    }

    if debug_enabled {
        emit_info("Debug features enabled: fatal tracking errors carry a backtrace");
        if is_release {
            emit_warning("Debug features enabled in release build!");
            emit_note("Backtrace capture only happens on fatal paths, but adds code size.");
        }
    }

    if parking_lot_enabled {
        emit_info("Using parking_lot for tracker locks");
    }

    if tracy_enabled {
        emit_info("Tracy profiler integration enabled");
        emit_note("Route frame stats to Tracy plots with:");
        emit_note("  LowLevelMemTracker::builder(config).stat_sink(Arc::new(TracyStatSink::new()))");
    }

    if log_enabled {
        emit_info("Diagnostics routed through the log crate");
    }

    // =========================================================================
    // Environment checks
    // =========================================================================

    check_target_features();
}

// =============================================================================
// Diagnostic emission helpers
// =============================================================================

fn emit_info(msg: &str) {
    println!("cargo:warning=[llmtrack] {}", msg);
}

fn emit_note(msg: &str) {
    println!("cargo:warning=[llmtrack]    {}", msg);
}

fn emit_warning(msg: &str) {
    println!("cargo:warning=[llmtrack] warning: {}", msg);
}

fn check_target_features() {
    let target = env::var("TARGET").unwrap_or_default();

    if !target.contains("linux") {
        emit_info("Physical memory figures come from /proc/meminfo on Linux only");
        emit_note("Elsewhere SystemMemory reports zeros; supply a PlatformMemory to the builder.");
    }
}
