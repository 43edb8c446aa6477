//! Entry pool for the pointer table.
//!
//! Entries live in fixed-size blocks carved from backing memory. Vacant slots
//! form an intrusive free list, so inserting and removing entries touches the
//! backing allocator only when a new block is needed.

use std::ptr::NonNull;
use std::sync::Arc;

use super::backing::{BackingAlloc, RawBuf};
use crate::llm_fatal;

/// Index of an entry: block number in the high bits, slot in the low bits.
pub(crate) type EntryRef = u32;

/// End of the free list.
const NIL: EntryRef = u32::MAX;

#[derive(Clone, Copy)]
enum PoolSlot<V: Copy> {
    Occupied { key: usize, value: V },
    Free { next: EntryRef },
}

pub(crate) struct EntryPool<V: Copy> {
    backing: Arc<dyn BackingAlloc>,
    /// Block table. Only the first `block_count` pointers are set.
    blocks: RawBuf<*mut PoolSlot<V>>,
    block_count: usize,
    block_entries: usize,
    shift: u32,
    mask: u32,
    free_head: EntryRef,
    live: usize,
}

impl<V: Copy> EntryPool<V> {
    pub fn new(backing: Arc<dyn BackingAlloc>, block_entries: usize) -> Self {
        let block_entries = block_entries.max(16).next_power_of_two();
        Self {
            blocks: RawBuf::filled(backing.clone(), 0, std::ptr::null_mut()),
            backing,
            block_count: 0,
            block_entries,
            shift: block_entries.trailing_zeros(),
            mask: (block_entries - 1) as u32,
            free_head: NIL,
            live: 0,
        }
    }

    /// Number of occupied entries.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Total entries across all blocks.
    pub fn capacity(&self) -> usize {
        self.block_count * self.block_entries
    }

    /// Bytes of backing memory held by the pool.
    pub fn memory_used(&self) -> usize {
        self.blocks.bytes() + self.capacity() * std::mem::size_of::<PoolSlot<V>>()
    }

    pub fn insert(&mut self, key: usize, value: V) -> EntryRef {
        if self.free_head == NIL {
            self.add_block();
        }
        let entry = self.free_head;
        let slot = self.slot_mut(entry);
        let next = match *slot {
            PoolSlot::Free { next } => next,
            PoolSlot::Occupied { .. } => llm_fatal!(LLM901, "pool free list reached live entry {}", entry),
        };
        *slot = PoolSlot::Occupied { key, value };
        self.free_head = next;
        self.live += 1;
        entry
    }

    pub fn key(&self, entry: EntryRef) -> usize {
        match *self.slot(entry) {
            PoolSlot::Occupied { key, .. } => key,
            PoolSlot::Free { .. } => llm_fatal!(LLM901, "read of vacant pool entry {}", entry),
        }
    }

    pub fn value(&self, entry: EntryRef) -> V {
        match *self.slot(entry) {
            PoolSlot::Occupied { value, .. } => value,
            PoolSlot::Free { .. } => llm_fatal!(LLM901, "read of vacant pool entry {}", entry),
        }
    }

    pub fn set_value(&mut self, entry: EntryRef, value: V) {
        match self.slot_mut(entry) {
            PoolSlot::Occupied { value: slot, .. } => *slot = value,
            PoolSlot::Free { .. } => llm_fatal!(LLM901, "write to vacant pool entry {}", entry),
        }
    }

    /// Vacate an entry, returning its value.
    pub fn release(&mut self, entry: EntryRef) -> V {
        let value = self.value(entry);
        let head = self.free_head;
        *self.slot_mut(entry) = PoolSlot::Free { next: head };
        self.free_head = entry;
        self.live -= 1;
        value
    }

    /// Drop every entry and return all blocks to the backing allocator.
    pub fn clear(&mut self) {
        self.free_blocks();
        self.blocks = RawBuf::filled(self.backing.clone(), 0, std::ptr::null_mut());
        self.free_head = NIL;
        self.live = 0;
    }

    fn add_block(&mut self) {
        let first = (self.block_count << self.shift) as u64;
        if first + self.block_entries as u64 > NIL as u64 {
            llm_fatal!(LLM203, "entry pool is out of addressable entries ({})", first);
        }

        if self.block_count == self.blocks.len() {
            let mut grown = RawBuf::filled(
                self.backing.clone(),
                (self.blocks.len() * 2).max(4),
                std::ptr::null_mut(),
            );
            grown[..self.block_count].copy_from_slice(&self.blocks[..self.block_count]);
            self.blocks = grown;
        }

        let block = RawBuf::filled(
            self.backing.clone(),
            self.block_entries,
            PoolSlot::Free { next: NIL },
        )
        .into_raw()
        .as_ptr();

        // Thread the new slots so the lowest index is handed out first.
        let mut head = self.free_head;
        for i in (0..self.block_entries).rev() {
            // SAFETY: `i` is within the block just allocated.
            unsafe { block.add(i).write(PoolSlot::Free { next: head }) };
            head = first as EntryRef + i as EntryRef;
        }

        self.blocks[self.block_count] = block;
        self.block_count += 1;
        self.free_head = head;
    }

    fn slot_ptr(&self, entry: EntryRef) -> *mut PoolSlot<V> {
        let block = (entry >> self.shift) as usize;
        if block >= self.block_count {
            llm_fatal!(LLM901, "pool entry {} is outside {} blocks", entry, self.block_count);
        }
        // SAFETY: every block below `block_count` holds `block_entries` slots.
        unsafe { self.blocks[block].add((entry & self.mask) as usize) }
    }

    fn slot(&self, entry: EntryRef) -> &PoolSlot<V> {
        // SAFETY: `slot_ptr` checked the block; slots are always initialized.
        unsafe { &*self.slot_ptr(entry) }
    }

    fn slot_mut(&mut self, entry: EntryRef) -> &mut PoolSlot<V> {
        // SAFETY: as `slot`, and `&mut self` makes the access exclusive.
        unsafe { &mut *self.slot_ptr(entry) }
    }

    fn free_blocks(&mut self) {
        for i in 0..self.block_count {
            if let Some(block) = NonNull::new(self.blocks[i]) {
                // SAFETY: produced by `into_raw` in `add_block` with this length.
                drop(unsafe { RawBuf::from_raw(self.backing.clone(), block, self.block_entries) });
            }
            self.blocks[i] = std::ptr::null_mut();
        }
        self.block_count = 0;
    }
}

impl<V: Copy> Drop for EntryPool<V> {
    fn drop(&mut self) {
        self.free_blocks();
    }
}

// SAFETY: the pool exclusively owns its blocks; the raw pointers are never shared.
unsafe impl<V: Copy + Send> Send for EntryPool<V> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::backing::{CountingBacking, SystemBacking};

    #[test]
    fn test_release_reuses_slots() {
        let mut pool = EntryPool::<u64>::new(Arc::new(SystemBacking), 16);
        let a = pool.insert(0x1000, 1);
        let b = pool.insert(0x2000, 2);
        assert_eq!((a, b), (0, 1));
        assert_eq!(pool.release(a), 1);
        assert_eq!(pool.insert(0x3000, 3), a);
        assert_eq!(pool.key(a), 0x3000);
        assert_eq!(pool.value(b), 2);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_blocks_are_allocated_on_demand() {
        let backing = Arc::new(CountingBacking::new(SystemBacking));
        let mut pool = EntryPool::<u32>::new(backing.clone(), 16);

        for i in 0..16 {
            pool.insert(i, i as u32);
        }
        // One block table, one block.
        assert_eq!(backing.allocs(), 2);

        pool.insert(16, 16);
        assert_eq!(pool.capacity(), 32);
        assert_eq!(backing.allocs(), 3);

        pool.clear();
        assert_eq!(pool.len(), 0);
        assert_eq!(pool.memory_used(), 0);
        assert_eq!(backing.allocs(), backing.frees());
    }

    #[test]
    #[should_panic(expected = "LLM901")]
    fn test_vacant_read_is_fatal() {
        let mut pool = EntryPool::<u8>::new(Arc::new(SystemBacking), 16);
        let a = pool.insert(1, 1);
        pool.release(a);
        pool.value(a);
    }
}
