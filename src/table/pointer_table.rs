//! Pointer-keyed hash map in backing memory.
//!
//! Open addressing with linear probing. The bucket array stores entry
//! references into an [`EntryPool`]; keys and values live in the pool.
//! Deletion uses backward shifting, so there are no tombstones and probe
//! chains never degrade under churn.

use std::sync::Arc;

use super::backing::{BackingAlloc, RawBuf};
use super::pool::{EntryPool, EntryRef};
use crate::llm_fatal;

const EMPTY: EntryRef = EntryRef::MAX;

/// Sizing parameters for a [`PointerTable`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableConfig {
    /// Bucket count at creation and after `clear`. Rounded up to a power of two.
    pub initial_capacity: usize,
    /// Largest bucket count the table may grow to.
    pub max_capacity: usize,
    /// Maximum `count / capacity` before the table doubles.
    pub load_factor: f32,
    /// Entries per pool block.
    pub block_entries: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 1024,
            max_capacity: 1 << 30,
            load_factor: 0.75,
            block_entries: 1024,
        }
    }
}

/// Map from live pointer (as an address) to allocation metadata.
pub struct PointerTable<V: Copy> {
    buckets: RawBuf<EntryRef>,
    pool: EntryPool<V>,
    config: TableConfig,
}

#[inline]
fn hash(key: usize) -> usize {
    let h = (key as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    (h ^ (h >> 29)) as usize
}

impl<V: Copy> PointerTable<V> {
    /// Create a table drawing all of its memory from `backing`.
    pub fn new(backing: Arc<dyn BackingAlloc>, config: TableConfig) -> Self {
        let config = TableConfig {
            initial_capacity: config.initial_capacity.max(8).next_power_of_two(),
            max_capacity: config.max_capacity.max(8).next_power_of_two(),
            load_factor: config.load_factor.clamp(0.1, 0.95),
            block_entries: config.block_entries,
        };
        Self {
            buckets: RawBuf::filled(backing.clone(), config.initial_capacity, EMPTY),
            pool: EntryPool::new(backing, config.block_entries),
            config,
        }
    }

    /// Number of live entries.
    pub fn count(&self) -> usize {
        self.pool.len()
    }

    /// Current bucket count. Always a power of two.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Bytes of backing memory held by buckets and pool.
    pub fn total_memory_used(&self) -> usize {
        self.buckets.bytes() + self.pool.memory_used()
    }

    /// Insert or overwrite.
    pub fn add(&mut self, key: usize, value: V) {
        if let Some(bucket) = self.find(key) {
            self.pool.set_value(self.buckets[bucket], value);
            return;
        }

        if (self.count() + 1) as f64 > self.capacity() as f64 * self.config.load_factor as f64 {
            self.grow();
        }

        let entry = self.pool.insert(key, value);
        self.place(entry, key);
    }

    /// Remove a key that must be present, returning its value.
    ///
    /// A missing key means a double free or a free reported to the wrong
    /// tracker, and is fatal (LLM101).
    pub fn remove(&mut self, key: usize) -> V {
        match self.try_remove(key) {
            Some(value) => value,
            None => llm_fatal!(LLM101, "ptr=0x{:x}", key),
        }
    }

    /// Remove a key if present.
    pub fn try_remove(&mut self, key: usize) -> Option<V> {
        let bucket = self.find(key)?;
        let value = self.pool.release(self.buckets[bucket]);
        self.backward_shift(bucket);
        Some(value)
    }

    /// Whether `key` is present.
    pub fn has_key(&self, key: usize) -> bool {
        self.find(key).is_some()
    }

    /// Value stored for `key`.
    pub fn get_value(&self, key: usize) -> Option<V> {
        self.find(key).map(|bucket| self.pool.value(self.buckets[bucket]))
    }

    /// Drop every entry and shrink back to the initial capacity.
    pub fn clear(&mut self) {
        self.pool.clear();
        self.buckets = RawBuf::filled(
            self.buckets.backing().clone(),
            self.config.initial_capacity,
            EMPTY,
        );
    }

    /// Visit every live entry, in bucket order.
    pub fn for_each(&self, mut f: impl FnMut(usize, V)) {
        for &entry in self.buckets.iter().filter(|&&e| e != EMPTY) {
            f(self.pool.key(entry), self.pool.value(entry));
        }
    }

    fn mask(&self) -> usize {
        self.capacity() - 1
    }

    fn find(&self, key: usize) -> Option<usize> {
        let mask = self.mask();
        let mut bucket = hash(key) & mask;
        // The load factor keeps at least one bucket empty, so this terminates.
        loop {
            let entry = self.buckets[bucket];
            if entry == EMPTY {
                return None;
            }
            if self.pool.key(entry) == key {
                return Some(bucket);
            }
            bucket = (bucket + 1) & mask;
        }
    }

    fn place(&mut self, entry: EntryRef, key: usize) {
        let mask = self.mask();
        let mut bucket = hash(key) & mask;
        while self.buckets[bucket] != EMPTY {
            bucket = (bucket + 1) & mask;
        }
        self.buckets[bucket] = entry;
    }

    fn backward_shift(&mut self, removed: usize) {
        let mask = self.mask();
        let mut hole = removed;
        let mut probe = (removed + 1) & mask;
        loop {
            let entry = self.buckets[probe];
            if entry == EMPTY {
                break;
            }
            let ideal = hash(self.pool.key(entry)) & mask;
            // Move the entry back if the hole is no further from its ideal
            // bucket than where it sits now.
            if probe.wrapping_sub(ideal) & mask >= probe.wrapping_sub(hole) & mask {
                self.buckets[hole] = entry;
                hole = probe;
            }
            probe = (probe + 1) & mask;
        }
        self.buckets[hole] = EMPTY;
    }

    fn grow(&mut self) {
        let new_capacity = self.capacity() * 2;
        if new_capacity > self.config.max_capacity {
            llm_fatal!(
                LLM203,
                "count={} capacity={} max={}",
                self.count(),
                self.capacity(),
                self.config.max_capacity
            );
        }

        let grown = RawBuf::filled(self.buckets.backing().clone(), new_capacity, EMPTY);
        let old = std::mem::replace(&mut self.buckets, grown);
        for &entry in old.iter().filter(|&&e| e != EMPTY) {
            let key = self.pool.key(entry);
            self.place(entry, key);
        }
    }
}
