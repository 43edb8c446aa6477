//! Diagnostic emission backend.
//!
//! Handles outputting diagnostics to stderr, logs, or custom sinks, and the
//! fail-fast path used for tracking errors.

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use super::context::DiagContext;
use super::kind::{Diagnostic, DiagnosticKind};
use super::strict::should_panic_on_warning;
use crate::sync::mutex::Mutex;

/// Global flag to suppress diagnostic output (for testing).
static DIAGNOSTICS_SUPPRESSED: AtomicBool = AtomicBool::new(false);

thread_local! {
    static FAILING: Cell<bool> = const { Cell::new(false) };
}

/// Suppress all diagnostic output.
///
/// Fatal errors still panic; only the printed report is skipped.
pub fn suppress_diagnostics(suppress: bool) {
    DIAGNOSTICS_SUPPRESSED.store(suppress, Ordering::Relaxed);
}

/// Check if diagnostics are suppressed.
pub fn is_suppressed() -> bool {
    DIAGNOSTICS_SUPPRESSED.load(Ordering::Relaxed)
}

/// Emit a diagnostic.
///
/// With the `log` feature the diagnostic goes to the `log` crate. Otherwise it
/// is written to stderr in debug builds, or in release builds with the
/// `diagnostics` feature.
pub fn emit(diag: &Diagnostic) {
    emit_inner(diag, None);
}

/// Emit a diagnostic with additional runtime context.
pub fn emit_with_context(diag: &Diagnostic, context: &str) {
    emit_inner(diag, Some(context));
}

fn emit_inner(diag: &Diagnostic, context: Option<&str>) {
    if !is_suppressed() {
        #[cfg(feature = "log")]
        emit_to_log(diag, context);

        #[cfg(all(not(feature = "log"), any(debug_assertions, feature = "diagnostics")))]
        emit_to_stderr(diag, context);
    }

    if diag.kind == DiagnosticKind::Warning && should_panic_on_warning() {
        panic!(
            "[llmtrack][{}] {}\nStrict mode enabled - warnings are fatal.",
            diag.code, diag.message
        );
    }
}

/// Whether the calling thread has started reporting a fatal error.
///
/// Allocation hooks check this to stop feeding the tracker while the report
/// and the panic allocate. It stays set for the rest of the thread.
pub fn is_failing() -> bool {
    FAILING.try_with(Cell::get).unwrap_or(false)
}

/// Report a tracking error and panic.
#[cold]
#[inline(never)]
pub fn fatal(diag: &Diagnostic, details: fmt::Arguments<'_>) -> ! {
    let _ = FAILING.try_with(|failing| failing.set(true));
    let context = format!("{} ({})", details, DiagContext::capture());

    #[cfg(feature = "debug")]
    let context = format!("{}\n{:?}", context, backtrace::Backtrace::new());

    if !is_suppressed() {
        #[cfg(feature = "log")]
        emit_to_log(diag, Some(&context));

        #[cfg(not(feature = "log"))]
        emit_to_stderr(diag, Some(&context));
    }

    panic!("[llmtrack][{}] {}: {}", diag.code, diag.message, context);
}

/// Internal: emit to stderr.
#[cfg(not(feature = "log"))]
fn emit_to_stderr(diag: &Diagnostic, context: Option<&str>) {
    use std::io::Write;

    let mut stderr = std::io::stderr().lock();

    let _ = writeln!(
        stderr,
        "[llmtrack][{}] {}: {}",
        diag.code,
        diag.kind.prefix(),
        diag.message
    );

    if let Some(context) = context {
        let _ = writeln!(stderr, "  context: {}", context);
    }

    if let Some(note) = diag.note {
        let _ = writeln!(stderr, "  note: {}", note);
    }

    if let Some(help) = diag.help {
        let _ = writeln!(stderr, "  help: {}", help);
    }
}

/// Emit a diagnostic using the log crate.
#[cfg(feature = "log")]
fn emit_to_log(diag: &Diagnostic, context: Option<&str>) {
    let context = context.unwrap_or("");
    match diag.kind {
        DiagnosticKind::Error => {
            log::error!("[{}] {} {}", diag.code, diag.message, context);
        }
        DiagnosticKind::Warning => {
            log::warn!("[{}] {} {}", diag.code, diag.message, context);
        }
        DiagnosticKind::Note | DiagnosticKind::Help => {
            log::info!("[{}] {} {}", diag.code, diag.message, context);
        }
    }

    if let Some(note) = diag.note {
        log::debug!("  note: {}", note);
    }
    if let Some(help) = diag.help {
        log::debug!("  help: {}", help);
    }
}

/// A diagnostic sink trait for custom output.
///
/// A tracker forwards its configuration warnings and reports to its sink in
/// addition to the global output above.
pub trait DiagnosticSink: Send + Sync {
    /// Handle a diagnostic.
    fn emit(&self, diag: &Diagnostic, context: Option<&str>);
}

/// A sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn emit(&self, _diag: &Diagnostic, _context: Option<&str>) {}
}

/// A simple sink that collects diagnostics.
#[derive(Default)]
pub struct CollectingSink {
    diagnostics: Mutex<Vec<(Diagnostic, Option<String>)>>,
}

impl CollectingSink {
    /// Create a new collecting sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected diagnostics.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().iter().map(|(d, _)| d.clone()).collect()
    }

    /// Get the context strings recorded for a given code.
    pub fn contexts(&self, code: &str) -> Vec<String> {
        self.diagnostics
            .lock()
            .iter()
            .filter(|(d, _)| d.code == code)
            .filter_map(|(_, c)| c.clone())
            .collect()
    }

    /// Check whether a diagnostic with this code was collected.
    pub fn contains(&self, code: &str) -> bool {
        self.diagnostics.lock().iter().any(|(d, _)| d.code == code)
    }

    /// Clear collected diagnostics.
    pub fn clear(&self) {
        self.diagnostics.lock().clear();
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        self.diagnostics
            .lock()
            .iter()
            .any(|(d, _)| d.kind == DiagnosticKind::Warning)
    }
}

impl DiagnosticSink for CollectingSink {
    fn emit(&self, diag: &Diagnostic, context: Option<&str>) {
        self.diagnostics
            .lock()
            .push((diag.clone(), context.map(String::from)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::kind::{LLM002, LLM301};

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingSink::new();
        sink.emit(&LLM002, None);
        sink.emit(&LLM301, Some("at frame 3"));

        assert_eq!(sink.diagnostics().len(), 2);
        assert!(sink.has_warnings());
        assert!(sink.contains("LLM301"));
        assert_eq!(sink.contexts("LLM301"), vec!["at frame 3".to_string()]);

        sink.clear();
        assert!(sink.diagnostics().is_empty());
    }

    #[test]
    #[should_panic(expected = "LLM101")]
    fn test_fatal_panics_with_code() {
        fatal(&crate::diagnostics::kind::LLM101, format_args!("ptr=0x{:x}", 0x1000));
    }

    #[test]
    fn test_fatal_marks_thread_failing() {
        let failed = std::thread::spawn(|| {
            assert!(!is_failing());
            let result = std::panic::catch_unwind(|| {
                fatal(&crate::diagnostics::kind::LLM104, format_args!("empty"))
            });
            (result.is_err(), is_failing())
        })
        .join()
        .unwrap();
        assert_eq!(failed, (true, true));
        assert!(!is_failing());
    }
}
