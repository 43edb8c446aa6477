//! One independently tracked allocation layer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::csv::{CsvColumn, CsvWriter};
use super::registry::ThreadRegistry;
use super::thread_state::DrainSnapshot;
use crate::api::config::TrackerConfig;
use crate::api::names::NameTable;
use crate::api::stats::{Stat, StatSink, TrackerKind, STAT_TRACKED_TOTAL, STAT_UNTAGGED};
use crate::api::tag::{Tag, TagKind, TagSet, USER_MEMORY_STAT};
use crate::llm_fatal;
use crate::sync::atomics::AtomicBytes;
use crate::sync::mutex::Mutex;
use crate::table::{BackingAlloc, PointerTable};

/// What the tracker remembers about a live allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocInfo {
    /// Allocation size in bytes.
    pub size: u64,
    /// Scope tag the allocation was charged to.
    pub tag: Tag,
    /// Asset tag the allocation was charged to, or `Untagged`.
    pub asset_tag: Tag,
}

/// A pointer table plus a pool of per-thread accumulators.
///
/// The running total is updated atomically on every event, so it always
/// equals the drained stats plus whatever the threads have not yet handed
/// over.
pub struct Tracker {
    kind: TrackerKind,
    table: Mutex<PointerTable<AllocInfo>>,
    registry: ThreadRegistry,
    tracked_total: AtomicBytes,
    asset_tracking: AtomicBool,
    shutting_down: AtomicBool,
    scratch: Mutex<DrainSnapshot>,
    csv: CsvWriter,
}

impl Tracker {
    /// Create a tracker whose table draws memory from `backing`.
    pub fn new(kind: TrackerKind, config: &TrackerConfig, backing: Arc<dyn BackingAlloc>) -> Self {
        Self {
            kind,
            table: Mutex::new(PointerTable::new(backing, config.table_config())),
            registry: ThreadRegistry::new(
                config.max_tracked_threads,
                config.max_tag_stack_depth,
                config.max_tags_per_thread,
            ),
            tracked_total: AtomicBytes::new(0),
            asset_tracking: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
            scratch: Mutex::new(DrainSnapshot::with_capacity(config.max_tags_per_thread)),
            csv: CsvWriter::new(
                &config.csv_directory,
                kind.csv_name(),
                config.csv_write_interval,
                config.csv_max_columns,
            ),
        }
    }

    /// Which layer this tracker observes.
    pub fn kind(&self) -> TrackerKind {
        self.kind
    }

    /// Whether ordinary events from the calling thread are ignored.
    ///
    /// Always true once shutdown has begun.
    pub fn is_paused(&self) -> bool {
        self.shutting_down.load(Ordering::Relaxed)
            || self.registry.current().is_some_and(|state| state.is_paused())
    }

    /// Record an allocation.
    ///
    /// The size is charged to the innermost scope tag, or to `default_tag`
    /// when no scope is open. A null `ptr` is charged but not remembered.
    pub fn track_allocation(&self, ptr: *const u8, size: u64, default_tag: Tag) {
        if self.is_paused() {
            return;
        }
        self.tracked_total.add(size as i64);

        let state = self.registry.current_or_create();
        let assets = self.asset_tracking.load(Ordering::Relaxed);
        let (tag, asset_tag) = state.track_allocation(size as i64, default_tag, assets);

        if !ptr.is_null() {
            self.table.lock().add(ptr as usize, AllocInfo { size, tag, asset_tag });
        }
    }

    /// Record a free.
    ///
    /// Fatal if `ptr` is not tracked (LLM101), or if `check_size` is nonzero
    /// and differs from the recorded size (LLM102).
    pub fn track_free(&self, ptr: *const u8, check_size: u64) {
        if self.is_paused() {
            return;
        }
        let removed = self.table.lock().try_remove(ptr as usize);
        let Some(info) = removed else {
            llm_fatal!(LLM101, "ptr={:p}", ptr);
        };
        self.release(info);

        if check_size != 0 && check_size != info.size {
            llm_fatal!(
                LLM102,
                "ptr={:p} allocated={} freed={}",
                ptr,
                info.size,
                check_size
            );
        }
    }

    /// Record a free of a pointer that may never have been recorded, such as
    /// memory allocated before tracking started or while paused.
    ///
    /// Returns the record if there was one.
    pub fn try_track_free(&self, ptr: *const u8) -> Option<AllocInfo> {
        if self.is_paused() {
            return None;
        }
        let info = self.table.lock().try_remove(ptr as usize)?;
        self.release(info);
        Some(info)
    }

    /// Take the record for a block about to be reallocated.
    ///
    /// The bytes stay charged until [`finish_reallocation`] settles them, but
    /// the address is free for other threads to record as soon as the
    /// underlying allocator releases it.
    ///
    /// [`finish_reallocation`]: Tracker::finish_reallocation
    pub fn take_allocation(&self, ptr: *const u8) -> Option<AllocInfo> {
        if self.is_paused() {
            return None;
        }
        self.table.lock().try_remove(ptr as usize)
    }

    /// Settle a record taken by [`take_allocation`].
    ///
    /// A null `new_ptr` means the reallocation failed and the record goes
    /// back under `old`. Otherwise the old bytes are released and the new
    /// block is recorded like a fresh allocation.
    ///
    /// [`take_allocation`]: Tracker::take_allocation
    pub fn finish_reallocation(
        &self,
        old: *const u8,
        info: AllocInfo,
        new_ptr: *const u8,
        new_size: u64,
        default_tag: Tag,
    ) {
        if new_ptr.is_null() {
            self.table.lock().add(old as usize, info);
            return;
        }
        self.release(info);
        self.track_allocation(new_ptr, new_size, default_tag);
    }

    fn release(&self, info: AllocInfo) {
        self.tracked_total.sub(info.size as i64);
        self.registry
            .current_or_create()
            .track_free(info.tag, info.asset_tag, info.size as i64);
    }

    /// Move a record to a new address, keeping size and tags.
    pub fn on_alloc_moved(&self, dest: *const u8, source: *const u8) {
        let moved = {
            let mut table = self.table.lock();
            let info = table.try_remove(source as usize);
            if let Some(info) = info {
                table.add(dest as usize, info);
            }
            info.is_some()
        };
        if !moved {
            llm_fatal!(LLM101, "moved from untracked ptr={:p}", source);
        }
    }

    /// Charge `amount` bytes to `tag` without a pointer.
    pub fn track_memory(&self, tag: Tag, amount: i64) {
        self.registry
            .current_or_create()
            .increment_tag(tag, amount, true);
        self.tracked_total.add(amount);
    }

    /// Pause the calling thread and charge `amount` bytes to `tag`.
    ///
    /// Used when a layer knows the size of what it is about to do and wants
    /// the individual events below it ignored.
    pub fn pause_and_track_memory(&self, tag: Tag, amount: i64) {
        let state = self.registry.current_or_create();
        state.set_paused(true);
        state.increment_tag(tag, amount, true);
        self.tracked_total.add(amount);
    }

    /// Pause tracking for the calling thread.
    pub fn pause(&self) {
        self.registry.current_or_create().set_paused(true);
    }

    /// Resume tracking for the calling thread.
    pub fn unpause(&self) {
        self.registry.current_or_create().set_paused(false);
    }

    /// Push a tag onto the calling thread's stack for `set`.
    pub fn push_tag(&self, tag: Tag, set: TagSet) {
        self.registry.current_or_create().push_tag(tag, set);
    }

    /// Pop the calling thread's innermost tag for `set`.
    pub fn pop_tag(&self, set: TagSet) -> Tag {
        match self.registry.current() {
            Some(state) => state.pop_tag(set),
            None => llm_fatal!(LLM104, "thread never pushed a tag on the {:?} tracker", self.kind),
        }
    }

    /// The calling thread's innermost tag for `set`.
    pub fn top_tag(&self, set: TagSet) -> Tag {
        self.registry
            .current()
            .map_or(Tag::UNTAGGED, |state| state.top_tag(set))
    }

    /// The calling thread's undrained delta for `tag`.
    pub fn pending_delta(&self, tag: Tag) -> Option<i64> {
        self.registry.current()?.pending_delta(tag)
    }

    /// Charge allocations to the asset tag stack as well.
    pub fn set_asset_tracking(&self, enabled: bool) {
        self.asset_tracking.store(enabled, Ordering::Relaxed);
    }

    /// Make every thread behave as paused from now on.
    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::Relaxed);
    }

    /// Drain every thread and report to `sink`. Returns the tracked total.
    ///
    /// Builtin tags go to their dedicated counters, reserved ids without a
    /// builtin meaning to `User Memory`, and name tags to their names.
    pub fn update_frame(&self, sink: &dyn StatSink, names: &dyn NameTable) -> i64 {
        let group = self.kind.stat_group();
        let mut scratch = self.scratch.lock();

        for state in self.registry.claimed() {
            state.drain(&mut scratch);

            sink.add(&Stat::named(group, STAT_UNTAGGED), scratch.untagged());
            self.csv.add_stat(CsvColumn::Untagged, scratch.untagged());

            for &(tag, delta) in scratch.entries() {
                self.csv.add_stat(CsvColumn::Tag(tag), delta);
                match tag.kind() {
                    TagKind::Untagged => sink.add(&Stat::tagged(group, STAT_UNTAGGED, tag), delta),
                    TagKind::Builtin(builtin) => {
                        sink.add(&Stat::tagged(group, builtin.stat_name(), tag), delta)
                    }
                    TagKind::User(_) => sink.add(&Stat::tagged(group, USER_MEMORY_STAT, tag), delta),
                    TagKind::Name(id) => {
                        let name = names.resolve(id).unwrap_or_else(|| tag.to_string());
                        sink.add(&Stat::tagged(group, &name, tag), delta);
                    }
                }
            }
        }

        let total = self.tracked_total.get();
        sink.set(&Stat::named(group, STAT_TRACKED_TOTAL), total);
        self.csv.set_stat(CsvColumn::TrackedTotal, total);
        total
    }

    /// Running tracked total.
    pub fn tracked_total(&self) -> i64 {
        self.tracked_total.get()
    }

    /// Number of remembered allocations.
    pub fn live_allocations(&self) -> usize {
        self.table.lock().count()
    }

    /// The record for a live pointer.
    pub fn allocation(&self, ptr: *const u8) -> Option<AllocInfo> {
        self.table.lock().get_value(ptr as usize)
    }

    /// Bytes held by the pointer table.
    pub fn table_memory_used(&self) -> usize {
        self.table.lock().total_memory_used()
    }

    /// Bytes of fixed bookkeeping: the tracker itself and its thread pool.
    pub fn static_memory_used(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.registry.memory_used()
            + self.scratch.lock().memory_used()
    }

    /// Forget every remembered allocation.
    pub fn clear(&self) {
        self.table.lock().clear();
    }

    /// This tracker's CSV writer.
    pub fn csv(&self) -> &CsvWriter {
        &self.csv
    }
}
