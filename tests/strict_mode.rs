//! Strict mode turns configuration warnings into panics.
//!
//! Strict mode is process-wide, so this lives in its own test binary.

use llmtrack::diagnostics::{emit, strict_mode, suppress_diagnostics};
use llmtrack::{
    CollectingSink, FixedMemory, LowLevelMemTracker, StrictMode, StrictModeGuard, TrackerConfig,
    LLM002,
};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

#[test]
fn test_strict_mode_guard() {
    suppress_diagnostics(true);
    let sink = Arc::new(CollectingSink::new());
    let llm = LowLevelMemTracker::builder(TrackerConfig::default())
        .platform(Arc::new(FixedMemory::new(0, 0)))
        .diagnostic_sink(sink.clone())
        .build();

    assert_eq!(strict_mode(), StrictMode::Warn);
    {
        let _strict = StrictModeGuard::panic_on_warning();
        assert_eq!(strict_mode(), StrictMode::PanicOnWarning);

        let result = catch_unwind(|| emit(&LLM002));
        assert!(result.is_err());

        // An unknown tag set is a warning, so the command line aborts.
        let result = catch_unwind(AssertUnwindSafe(|| {
            llm.process_command_line("-llmtagsets=Bogus")
        }));
        assert!(result.is_err());
        assert!(sink.contains("LLM002"));
    }
    assert_eq!(strict_mode(), StrictMode::Warn);

    sink.clear();
    llm.process_command_line("-llmtagsets=Bogus");
    assert!(sink.contains("LLM002"));
}
