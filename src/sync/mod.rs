//! Synchronization primitives.
//!
//! Provides thin wrappers over std or parking_lot mutexes, plus the
//! atomic byte counters used for running totals.

pub(crate) mod atomics;
pub(crate) mod mutex;
