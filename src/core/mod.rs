//! Tracker internals: per-thread accumulators, thread registries, trackers
//! and CSV output.

pub mod csv;
pub mod registry;
pub mod thread_state;
pub mod tracker;
