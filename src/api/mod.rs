//! Public API for llmtrack.
//!
//! This module contains all user-facing types and functions.
//! Most users should only interact with types from this module.

pub mod config;
pub mod global_alloc;
pub mod llm;
pub mod names;
pub mod platform;
pub mod scope;
pub mod stats;
pub mod tag;
