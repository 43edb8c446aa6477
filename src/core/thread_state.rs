//! Per-thread accumulator.
//!
//! Each thread that reports to a tracker owns one [`ThreadState`]. The owning
//! thread pushes tags and accumulates byte deltas; the aggregator drains the
//! deltas once per frame. The lock inside is only ever contended by that
//! drain, so the hot path takes it uncontended.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::api::tag::{Tag, TagSet};
use crate::llm_fatal;
use crate::sync::mutex::Mutex;

/// One thread's slot in a tracker.
pub struct ThreadState {
    /// Key of the owning thread, 0 while unclaimed.
    owner: AtomicU64,
    paused: AtomicBool,
    tags: Mutex<ThreadTags>,
}

struct TagStack {
    tags: Box<[Tag]>,
    depth: usize,
}

impl TagStack {
    fn new(max_depth: usize) -> Self {
        Self {
            tags: vec![Tag::UNTAGGED; max_depth].into_boxed_slice(),
            depth: 0,
        }
    }

    /// Returns the depth reached when the stack is already full.
    fn push(&mut self, tag: Tag) -> Result<(), usize> {
        if self.depth == self.tags.len() {
            return Err(self.depth);
        }
        self.tags[self.depth] = tag;
        self.depth += 1;
        Ok(())
    }

    fn pop(&mut self) -> Option<Tag> {
        self.depth = self.depth.checked_sub(1)?;
        Some(self.tags[self.depth])
    }

    fn top(&self) -> Tag {
        match self.depth {
            0 => Tag::UNTAGGED,
            depth => self.tags[depth - 1],
        }
    }
}

struct ThreadTags {
    scope: TagStack,
    asset: TagStack,
    deltas: Box<[(Tag, i64)]>,
    len: usize,
    untagged: i64,
}

impl ThreadTags {
    fn stack(&mut self, set: TagSet) -> &mut TagStack {
        if set.uses_asset_stack() {
            &mut self.asset
        } else {
            &mut self.scope
        }
    }

    /// Returns the tag that did not fit when the delta table is full.
    fn increment(&mut self, tag: Tag, amount: i64, track_untagged: bool) -> Result<(), Tag> {
        if tag.is_untagged() {
            if track_untagged {
                self.untagged += amount;
            }
            return Ok(());
        }

        if let Some(entry) = self.deltas[..self.len].iter_mut().find(|(t, _)| *t == tag) {
            entry.1 += amount;
            return Ok(());
        }

        if self.len == self.deltas.len() {
            return Err(tag);
        }
        self.deltas[self.len] = (tag, amount);
        self.len += 1;
        Ok(())
    }
}

// Reporting allocates, and with a tracking global allocator that allocation
// comes back through this slot. These run after the lock is released.

#[cold]
fn stack_overflow(depth: usize, tag: Tag) -> ! {
    llm_fatal!(LLM103, "depth={} pushing {}", depth, tag)
}

#[cold]
fn delta_table_full(limit: usize, tag: Tag) -> ! {
    llm_fatal!(LLM202, "limit={} adding {}", limit, tag)
}

/// Deltas taken out of a [`ThreadState`], preallocated by the aggregator.
pub struct DrainSnapshot {
    entries: Box<[(Tag, i64)]>,
    len: usize,
    untagged: i64,
}

impl DrainSnapshot {
    /// Create a snapshot able to hold `capacity` tags.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: vec![(Tag::UNTAGGED, 0); capacity].into_boxed_slice(),
            len: 0,
            untagged: 0,
        }
    }

    /// The drained `(tag, delta)` pairs.
    pub fn entries(&self) -> &[(Tag, i64)] {
        &self.entries[..self.len]
    }

    /// The drained untagged delta.
    pub fn untagged(&self) -> i64 {
        self.untagged
    }

    /// Bytes held by the snapshot buffer.
    pub fn memory_used(&self) -> usize {
        std::mem::size_of_val(&*self.entries)
    }
}

impl ThreadState {
    /// Create an unclaimed slot with preallocated stacks and delta table.
    pub fn new(max_depth: usize, max_tags: usize) -> Self {
        Self {
            owner: AtomicU64::new(0),
            paused: AtomicBool::new(false),
            tags: Mutex::new(ThreadTags {
                scope: TagStack::new(max_depth),
                asset: TagStack::new(max_depth),
                deltas: vec![(Tag::UNTAGGED, 0); max_tags].into_boxed_slice(),
                len: 0,
                untagged: 0,
            }),
        }
    }

    pub(crate) fn owner(&self) -> u64 {
        self.owner.load(Ordering::Acquire)
    }

    pub(crate) fn claim(&self, key: u64) {
        self.owner.store(key, Ordering::Release);
    }

    /// Whether ordinary tracking is paused on this thread.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Set or clear the paused flag.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    /// Push a scope tag. Fatal (LLM103) past the depth limit.
    pub fn push_tag(&self, tag: Tag, set: TagSet) {
        let pushed = self.tags.lock().stack(set).push(tag);
        if let Err(depth) = pushed {
            stack_overflow(depth, tag);
        }
    }

    /// Pop a scope tag. Fatal (LLM104) on an empty stack.
    pub fn pop_tag(&self, set: TagSet) -> Tag {
        let popped = self.tags.lock().stack(set).pop();
        match popped {
            Some(tag) => tag,
            None => llm_fatal!(LLM104, "tag stack was empty"),
        }
    }

    /// Innermost tag, or `Untagged` when the stack is empty.
    pub fn top_tag(&self, set: TagSet) -> Tag {
        self.tags.lock().stack(set).top()
    }

    /// Add a signed amount to a tag's pending delta.
    ///
    /// `Untagged` goes to the separate untagged delta when `track_untagged`,
    /// otherwise it is dropped. Fatal (LLM202) when the delta table is full.
    pub fn increment_tag(&self, tag: Tag, amount: i64, track_untagged: bool) {
        let result = self.tags.lock().increment(tag, amount, track_untagged);
        if let Err(tag) = result {
            delta_table_full(self.max_tags(), tag);
        }
    }

    fn max_tags(&self) -> usize {
        self.tags.lock().deltas.len()
    }

    /// Account a new allocation to the current scope.
    ///
    /// Returns the `(tag, asset_tag)` pair to remember with the pointer. The
    /// scope tag falls back to `default_tag` when no scope is open.
    pub fn track_allocation(&self, size: i64, default_tag: Tag, assets: bool) -> (Tag, Tag) {
        let mut tags = self.tags.lock();
        let tag = match tags.scope.top() {
            top if top.is_untagged() => default_tag,
            top => top,
        };
        let asset_tag = if assets { tags.asset.top() } else { Tag::UNTAGGED };
        let result = tags
            .increment(tag, size, true)
            .and_then(|()| tags.increment(asset_tag, size, false))
            .map(|()| (tag, asset_tag));
        drop(tags);

        match result {
            Ok(tags) => tags,
            Err(tag) => delta_table_full(self.max_tags(), tag),
        }
    }

    /// Reverse a recorded allocation.
    pub fn track_free(&self, tag: Tag, asset_tag: Tag, size: i64) {
        let mut tags = self.tags.lock();
        let result = tags
            .increment(tag, -size, true)
            .and_then(|()| tags.increment(asset_tag, -size, false));
        drop(tags);

        if let Err(tag) = result {
            delta_table_full(self.max_tags(), tag);
        }
    }

    /// Pending delta for a tag since the last drain, if the tag was touched.
    pub fn pending_delta(&self, tag: Tag) -> Option<i64> {
        let tags = self.tags.lock();
        if tag.is_untagged() {
            return Some(tags.untagged);
        }
        tags.deltas[..tags.len]
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|&(_, delta)| delta)
    }

    /// Move the pending deltas into `into` and reset them.
    ///
    /// Only the copy happens under the lock; reporting the snapshot is the
    /// caller's business.
    pub fn drain(&self, into: &mut DrainSnapshot) {
        let mut tags = self.tags.lock();
        let len = tags.len.min(into.entries.len());
        into.entries[..len].copy_from_slice(&tags.deltas[..len]);
        into.len = len;
        into.untagged = tags.untagged;
        tags.len = 0;
        tags.untagged = 0;
    }

    /// Bytes of preallocated buffers owned by this slot.
    pub fn memory_used(&self) -> usize {
        let tags = self.tags.lock();
        std::mem::size_of::<Self>()
            + std::mem::size_of_val(&*tags.scope.tags)
            + std::mem::size_of_val(&*tags.asset.tags)
            + std::mem::size_of_val(&*tags.deltas)
    }
}
