//! Fixed pool of per-thread slots for one tracker.
//!
//! A thread claims a slot the first time it reports to a tracker and keeps it
//! for the lifetime of the registry. Slots are never released, so a claimed
//! slot index stays valid and can be cached in a thread-local without any
//! lifetime bookkeeping.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use super::thread_state::ThreadState;
use crate::llm_fatal;
use crate::sync::mutex::Mutex;

const CACHE_WAYS: usize = 8;

static NEXT_THREAD_KEY: AtomicU64 = AtomicU64::new(1);
static NEXT_REGISTRY_ID: AtomicUsize = AtomicUsize::new(1);

// Both cells are const-initialized and have no destructor, so they stay
// usable during thread teardown and never allocate.
thread_local! {
    static THREAD_KEY: Cell<u64> = const { Cell::new(0) };
    static SLOT_CACHE: Cell<[(usize, u32); CACHE_WAYS]> = const { Cell::new([(0, 0); CACHE_WAYS]) };
}

/// Process-unique key of the calling thread.
fn thread_key() -> u64 {
    THREAD_KEY.with(|key| match key.get() {
        0 => {
            let fresh = NEXT_THREAD_KEY.fetch_add(1, Ordering::Relaxed);
            key.set(fresh);
            fresh
        }
        existing => existing,
    })
}

/// Per-tracker thread slots.
pub struct ThreadRegistry {
    id: usize,
    slots: Box<[ThreadState]>,
    claimed: AtomicUsize,
    create_lock: Mutex<()>,
}

impl ThreadRegistry {
    /// Create a registry with `max_threads` preallocated slots.
    pub fn new(max_threads: usize, max_depth: usize, max_tags: usize) -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            slots: (0..max_threads)
                .map(|_| ThreadState::new(max_depth, max_tags))
                .collect(),
            claimed: AtomicUsize::new(0),
            create_lock: Mutex::new(()),
        }
    }

    /// The calling thread's slot, if it has one. Never locks.
    pub fn current(&self) -> Option<&ThreadState> {
        let way = self.id % CACHE_WAYS;
        let (cached_id, cached_slot) = SLOT_CACHE.with(|cache| cache.get()[way]);
        if cached_id == self.id {
            return Some(&self.slots[cached_slot as usize]);
        }

        let key = thread_key();
        let claimed = self.claimed.load(Ordering::Acquire);
        let index = self.slots[..claimed].iter().position(|s| s.owner() == key)?;
        self.remember(index);
        Some(&self.slots[index])
    }

    /// The calling thread's slot, claiming one on first touch.
    ///
    /// Only the claim takes the creation lock. Fatal (LLM201) when every slot
    /// is taken.
    pub fn current_or_create(&self) -> &ThreadState {
        if let Some(state) = self.current() {
            return state;
        }

        let claimed = {
            let _guard = self.create_lock.lock();
            let index = self.claimed.load(Ordering::Relaxed);
            (index < self.slots.len()).then(|| {
                self.slots[index].claim(thread_key());
                self.claimed.store(index + 1, Ordering::Release);
                self.remember(index);
                index
            })
        };
        match claimed {
            Some(index) => &self.slots[index],
            None => llm_fatal!(LLM201, "limit={}", self.slots.len()),
        }
    }

    fn remember(&self, index: usize) {
        let way = self.id % CACHE_WAYS;
        SLOT_CACHE.with(|cache| {
            let mut entries = cache.get();
            entries[way] = (self.id, index as u32);
            cache.set(entries);
        });
    }

    /// Slots claimed so far.
    ///
    /// Reads the claim count without the creation lock; a thread claiming
    /// concurrently shows up on the next call.
    pub fn claimed(&self) -> &[ThreadState] {
        &self.slots[..self.claimed.load(Ordering::Acquire)]
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Bytes of preallocated slot memory.
    pub fn memory_used(&self) -> usize {
        self.slots.iter().map(ThreadState::memory_used).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tag::{Tag, TagSet};
    use std::sync::Arc;

    #[test]
    fn test_same_thread_same_slot() {
        let registry = ThreadRegistry::new(4, 4, 4);
        assert!(registry.current().is_none());
        let a = registry.current_or_create() as *const ThreadState;
        let b = registry.current_or_create() as *const ThreadState;
        assert_eq!(a, b);
        assert_eq!(registry.claimed().len(), 1);
    }

    #[test]
    fn test_threads_get_distinct_slots() {
        let registry = Arc::new(ThreadRegistry::new(8, 4, 4));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    registry
                        .current_or_create()
                        .push_tag(Tag::from_raw(100 + i), TagSet::None);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut tops: Vec<i64> = registry
            .claimed()
            .iter()
            .map(|s| s.top_tag(TagSet::None).raw())
            .collect();
        tops.sort();
        assert_eq!(tops, vec![100, 101, 102, 103]);
    }

    #[test]
    fn test_registries_do_not_share_slots() {
        let first = ThreadRegistry::new(2, 4, 4);
        let second = ThreadRegistry::new(2, 4, 4);
        first.current_or_create().set_paused(true);
        assert!(!second.current_or_create().is_paused());
        assert!(first.current().is_some_and(ThreadState::is_paused));
    }

    #[test]
    #[should_panic(expected = "LLM201")]
    fn test_thread_limit_is_fatal() {
        let registry = Arc::new(ThreadRegistry::new(1, 4, 4));
        let other = registry.clone();
        std::thread::spawn(move || {
            other.current_or_create();
        })
        .join()
        .unwrap();
        registry.current_or_create();
    }
}
