//! Atomic helpers for running byte totals.

use std::sync::atomic::{AtomicI64, Ordering};

/// A signed running byte total.
///
/// Allocations add, frees subtract. Relaxed ordering is enough: the value is
/// only read by the aggregator once per frame and no other data is published
/// through it.
pub struct AtomicBytes(AtomicI64);

impl AtomicBytes {
    /// Create a new total.
    pub const fn new(initial: i64) -> Self {
        Self(AtomicI64::new(initial))
    }

    /// Add a signed amount, returning the new total.
    pub fn add(&self, amount: i64) -> i64 {
        self.0.fetch_add(amount, Ordering::Relaxed).wrapping_add(amount)
    }

    /// Subtract an amount, returning the new total.
    pub fn sub(&self, amount: i64) -> i64 {
        self.0.fetch_sub(amount, Ordering::Relaxed).wrapping_sub(amount)
    }

    /// Get the current value.
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Replace the value, returning the previous one.
    pub fn swap(&self, value: i64) -> i64 {
        self.0.swap(value, Ordering::Relaxed)
    }
}

impl Default for AtomicBytes {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_sub_round_trip() {
        let total = AtomicBytes::new(0);
        assert_eq!(total.add(256), 256);
        assert_eq!(total.add(64), 320);
        assert_eq!(total.sub(320), 0);
        assert_eq!(total.sub(8), -8);
        assert_eq!(total.get(), -8);
    }

    #[test]
    fn test_swap() {
        let total = AtomicBytes::new(10);
        assert_eq!(total.swap(42), 10);
        assert_eq!(total.get(), 42);
    }
}
