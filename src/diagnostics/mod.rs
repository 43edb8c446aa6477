//! Diagnostics for the tracker.
//!
//! This module provides:
//! - **Runtime diagnostics**: error messages with codes
//! - **Fail-fast checks**: accounting errors report and panic
//! - **Strict mode**: Optional panic-on-warning for CI
//!
//! ## Diagnostic Codes
//!
//! | Code   | Meaning                          |
//! |--------|----------------------------------|
//! | LLM0xx | Configuration issues             |
//! | LLM1xx | Accounting inconsistencies       |
//! | LLM2xx | Fixed capacity exhausted         |
//! | LLM3xx | Reports and output               |
//! | LLM9xx | Internal errors                  |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use llmtrack::{llm_check, llm_fatal};
//!
//! // Fail fast on a broken invariant
//! llm_check!(depth > 0, LLM104, "stack was empty on pop");
//!
//! // Or unconditionally
//! llm_fatal!(LLM101, "ptr=0x{:x}", key);
//! ```

// Core diagnostic types
pub mod context;
pub mod emit;
pub mod kind;
pub mod macros;
pub mod strict;

// Re-export core types
pub use emit::{emit, emit_with_context, fatal, suppress_diagnostics, CollectingSink, DiagnosticSink, NullSink};
pub use kind::{Diagnostic, DiagnosticKind};
pub use strict::{init_from_env, set_strict_mode, strict_mode, StrictMode, StrictModeGuard};

// Re-export predefined diagnostics
pub use kind::{
    LLM001, LLM002, LLM003, LLM101, LLM102, LLM103, LLM104, LLM201, LLM202, LLM203, LLM204,
    LLM301, LLM302, LLM303, LLM310, LLM901, LLM902,
};
