//! Diagnostic macros.
//!
//! Fail-fast checks used on the tracking paths.

/// Report a predefined tracking error and panic.
///
/// # Example
///
/// ```rust,ignore
/// llm_fatal!(LLM101, "ptr=0x{:x}", key);
/// ```
#[macro_export]
macro_rules! llm_fatal {
    ($code:ident, $($arg:tt)+) => {
        $crate::diagnostics::emit::fatal(&$crate::diagnostics::$code, format_args!($($arg)+))
    };
}

/// Check an invariant, reporting a predefined tracking error if it fails.
///
/// Active in every build.
///
/// # Example
///
/// ```rust,ignore
/// llm_check!(depth < max, LLM103, "depth={}", depth);
/// ```
#[macro_export]
macro_rules! llm_check {
    ($cond:expr, $code:ident, $($arg:tt)+) => {
        if !$cond {
            $crate::llm_fatal!($code, $($arg)+);
        }
    };
}
