//! Diagnostic kinds and core types.
//!
//! Mirrors rustc's diagnostic levels for familiar UX.

/// The severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A hard error. Tracking errors of this kind are always fatal.
    Error,
    /// A warning - something is probably wrong or misconfigured.
    Warning,
    /// Informational output, such as frame reports.
    Note,
    /// Actionable suggestion to fix the issue.
    Help,
}

impl DiagnosticKind {
    /// Get the display prefix for this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Note => "note",
            DiagnosticKind::Help => "help",
        }
    }
}

/// A diagnostic message with code, message, and optional context.
///
/// Diagnostic codes follow the pattern:
/// - `LLM0xx` - Configuration issues
/// - `LLM1xx` - Accounting inconsistencies (fatal)
/// - `LLM2xx` - Fixed capacity exhausted (fatal)
/// - `LLM3xx` - Reports and output
/// - `LLM9xx` - Internal errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity level.
    pub kind: DiagnosticKind,
    /// Diagnostic code (e.g., "LLM101").
    pub code: &'static str,
    /// Primary message.
    pub message: &'static str,
    /// Optional additional context.
    pub note: Option<&'static str>,
    /// Optional fix suggestion.
    pub help: Option<&'static str>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub const fn error(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Error,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Create a new warning diagnostic.
    pub const fn warning(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Warning,
            code,
            message,
            note: None,
            help: None,
        }
    }

    /// Create a new informational diagnostic.
    pub const fn note(code: &'static str, message: &'static str) -> Self {
        Self {
            kind: DiagnosticKind::Note,
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
// Predefined diagnostics (LLM0xx - Configuration)
// =============================================================================

/// LLM001: Tag set requested but not compiled in.
pub const LLM001: Diagnostic = Diagnostic::warning(
    "LLM001",
    "the Assets tag set was requested but asset tags are not compiled in"
).with_note("asset tracking has a per-thread memory overhead and is feature gated")
 .with_help("enable the `asset_tags` cargo feature");

/// LLM002: Unknown tag set name.
pub const LLM002: Diagnostic = Diagnostic::warning(
    "LLM002",
    "unknown tag set name in -llmtagsets"
).with_note("the entry was ignored, tracking continues without it")
 .with_help("valid tag sets are Assets and AssetClasses");

/// LLM003: Tracking cannot be enabled.
pub const LLM003: Diagnostic = Diagnostic::warning(
    "LLM003",
    "memory tracking was requested but cannot be enabled"
).with_note("no backing allocator is available for tracker bookkeeping");

// =============================================================================
// Predefined diagnostics (LLM1xx - Accounting)
// =============================================================================

/// LLM101: Free of a pointer that is not tracked.
pub const LLM101: Diagnostic = Diagnostic::error(
    "LLM101",
    "freed a pointer that is not tracked"
).with_note("this is a double free, or the alloc and free were reported to different trackers")
 .with_help("check that every free is reported to the tracker that saw the allocation");

/// LLM102: Free size does not match the recorded size.
pub const LLM102: Diagnostic = Diagnostic::error(
    "LLM102",
    "free size does not match the tracked allocation size"
);

/// LLM103: Tag stack overflow.
pub const LLM103: Diagnostic = Diagnostic::error(
    "LLM103",
    "tag scope depth exceeded the configured maximum"
).with_note("scoped tags are probably not being popped")
 .with_help("raise TrackerConfig::max_tag_stack_depth if the nesting is legitimate");

/// LLM104: Tag stack underflow.
pub const LLM104: Diagnostic = Diagnostic::error(
    "LLM104",
    "popped a tag scope without a matching push"
);

// =============================================================================
// Predefined diagnostics (LLM2xx - Capacity)
// =============================================================================

/// LLM201: Too many threads.
pub const LLM201: Diagnostic = Diagnostic::error(
    "LLM201",
    "too many threads touched a tracker"
).with_help("raise TrackerConfig::max_tracked_threads");

/// LLM202: Per-thread tag table full.
pub const LLM202: Diagnostic = Diagnostic::error(
    "LLM202",
    "too many distinct tags used on one thread between frame updates"
).with_help("raise TrackerConfig::max_tags_per_thread");

/// LLM203: Pointer table capacity exceeded.
pub const LLM203: Diagnostic = Diagnostic::error(
    "LLM203",
    "pointer tracking table exceeded its maximum capacity"
).with_help("raise TrackerConfig::table_max_capacity");

/// LLM204: CSV column table full.
pub const LLM204: Diagnostic = Diagnostic::error(
    "LLM204",
    "too many CSV stat columns"
).with_help("raise TrackerConfig::csv_max_columns");

// =============================================================================
// Predefined diagnostics (LLM3xx - Reports)
// =============================================================================

/// LLM301: Untracked memory report.
pub const LLM301: Diagnostic = Diagnostic::note("LLM301", "untracked memory");

/// LLM302: Allocation spam self-test progress.
pub const LLM302: Diagnostic = Diagnostic::note("LLM302", "LLMEM SPAMALLOC");

/// LLM303: Tracker dump.
pub const LLM303: Diagnostic = Diagnostic::note("LLM303", "LLMEM DUMP");

/// LLM310: CSV output failed.
pub const LLM310: Diagnostic = Diagnostic::warning(
    "LLM310",
    "failed to write LLM csv output"
).with_note("csv output is disabled for this tracker from now on");

// =============================================================================
// Predefined diagnostics (LLM9xx - Internal)
// =============================================================================

/// LLM901: Backing allocation failed.
pub const LLM901: Diagnostic = Diagnostic::error(
    "LLM901",
    "backing allocator failed to provide tracker memory"
);

/// LLM902: Name id collides with the reserved tag range.
pub const LLM902: Diagnostic = Diagnostic::error(
    "LLM902",
    "interned name id falls inside the reserved tag range"
).with_help("name tables must hand out indices above MAX_USER_TAG");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique() {
        let all = [
            &LLM001, &LLM002, &LLM003, &LLM101, &LLM102, &LLM103, &LLM104, &LLM201, &LLM202,
            &LLM203, &LLM204, &LLM301, &LLM302, &LLM303, &LLM310, &LLM901, &LLM902,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.code, b.code);
            }
        }
    }

    #[test]
    fn test_accounting_errors_are_errors() {
        assert_eq!(LLM101.kind, DiagnosticKind::Error);
        assert_eq!(LLM001.kind, DiagnosticKind::Warning);
        assert_eq!(LLM301.kind, DiagnosticKind::Note);
    }
}
