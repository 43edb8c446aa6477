//! The process-wide tracker.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use rand::Rng;

use crate::api::config::TrackerConfig;
use crate::api::names::{NameTable, StdNameTable};
use crate::api::platform::{PlatformMemory, SystemMemory};
use crate::api::stats::{
    NullStatSink, Stat, StatSink, TrackerKind, OVERHEAD_GROUP, STAT_OVERHEAD_TOTAL,
    STAT_PLATFORM_TOTAL, STAT_PLATFORM_UNTRACKED, STAT_POINTER_TRACKING_OVERHEAD,
    STAT_STATIC_OVERHEAD,
};
use crate::api::tag::{BuiltinTag, Tag, TagSet};
use crate::core::csv::CsvColumn;
use crate::core::tracker::Tracker;
use crate::diagnostics::{
    self, Diagnostic, DiagnosticSink, NullSink, LLM001, LLM002, LLM003, LLM301, LLM302, LLM303,
};
use crate::sync::atomics::AtomicBytes;
use crate::sync::mutex::Mutex;
use crate::table::{BackingAlloc, SystemBacking};
use crate::util::cmdline;
use crate::util::size::{format_bytes, kb, to_mb};

/// Allocations made by `LLMEM SPAMALLOC`.
const SPAM_ALLOCATIONS: usize = 128;

/// Largest `LLMEM SPAMALLOC` size when none is given.
const SPAM_DEFAULT_MAX: usize = kb(128);

static GLOBAL: OnceLock<LowLevelMemTracker> = OnceLock::new();

/// Install `tracker` as the process global.
///
/// Events reported through [`global`] before this call are dropped. Fails,
/// handing the tracker back, if a global is already installed.
pub fn install_global(tracker: LowLevelMemTracker) -> Result<(), LowLevelMemTracker> {
    GLOBAL.set(tracker)
}

/// The process global tracker, once installed.
pub fn global() -> Option<&'static LowLevelMemTracker> {
    GLOBAL.get()
}

/// Figures computed by one [`LowLevelMemTracker::update_stats_per_frame`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameSummary {
    /// Tracked total per tracker, indexed by [`TrackerKind::index`].
    pub tracked: [i64; TrackerKind::COUNT],
    /// Fixed bookkeeping bytes.
    pub static_overhead: i64,
    /// Pointer table bytes across all trackers.
    pub pointer_tracking_overhead: i64,
    /// `static_overhead + pointer_tracking_overhead`.
    pub overhead_total: i64,
    /// Physical memory in use minus tracker overhead.
    pub platform_process_memory: i64,
    /// `platform_process_memory` minus what the platform tracker accounts for.
    pub untracked: i64,
}

impl FrameSummary {
    /// Tracked total for one tracker.
    pub fn tracked(&self, kind: TrackerKind) -> i64 {
        self.tracked[kind.index()]
    }
}

/// Builder for [`LowLevelMemTracker`].
pub struct LowLevelMemTrackerBuilder {
    config: TrackerConfig,
    stats: Arc<dyn StatSink>,
    platform: Arc<dyn PlatformMemory>,
    names: Arc<dyn NameTable>,
    diagnostics: Arc<dyn DiagnosticSink>,
    backing: Arc<dyn BackingAlloc>,
}

impl LowLevelMemTrackerBuilder {
    /// Where per-frame stats go (default: dropped).
    pub fn stat_sink(mut self, sink: Arc<dyn StatSink>) -> Self {
        self.stats = sink;
        self
    }

    /// Source of physical memory figures (default: the OS).
    pub fn platform(mut self, platform: Arc<dyn PlatformMemory>) -> Self {
        self.platform = platform;
        self
    }

    /// Name table for name tags (default: a fresh [`StdNameTable`]).
    pub fn names(mut self, names: Arc<dyn NameTable>) -> Self {
        self.names = names;
        self
    }

    /// Extra receiver for warnings and reports (default: none).
    pub fn diagnostic_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = sink;
        self
    }

    /// Memory for pointer tables (default: the system allocator).
    pub fn backing(mut self, backing: Arc<dyn BackingAlloc>) -> Self {
        self.backing = backing;
        self
    }

    /// Build the tracker. The program size is measured immediately, and
    /// `LLMTRACK_STRICT` is read to set the strict mode.
    pub fn build(self) -> LowLevelMemTracker {
        diagnostics::init_from_env();
        let can_enable = self.backing.is_available();
        let config = self.config;
        let trackers =
            TrackerKind::ALL.map(|kind| Tracker::new(kind, &config, self.backing.clone()));

        let llm = LowLevelMemTracker {
            disabled: AtomicBool::new(!config.enabled_by_default || !can_enable),
            can_enable,
            first_update: AtomicBool::new(true),
            csv_enabled: AtomicBool::new(false),
            active_sets: TagSet::ALL.map(|set| AtomicBool::new(set == TagSet::None)),
            program_size: AtomicBytes::new(0),
            trackers,
            stats: self.stats,
            platform: self.platform,
            names: self.names,
            diagnostics: self.diagnostics,
            update_lock: Mutex::new(()),
            config,
        };
        llm.refresh_program_size();
        llm
    }
}

/// Coordinates all trackers: enablement, tag sets and per-frame reporting.
///
/// Allocation layers report through the `on_low_level_*` methods; one
/// thread calls [`update_stats_per_frame`](Self::update_stats_per_frame)
/// once per frame.
///
/// # Example
///
/// ```rust
/// use llmtrack::{LowLevelMemTracker, ScopedTag, Tag, TagSet, TrackerConfig, TrackerKind};
///
/// let llm = LowLevelMemTracker::new(TrackerConfig::default());
/// llm.process_command_line("game -llm");
///
/// let block = [0u8; 64];
/// {
///     let _scope = ScopedTag::new(&llm, Tag::from_raw(120), TagSet::None);
///     llm.on_low_level_alloc(TrackerKind::Default, block.as_ptr(), 64);
/// }
/// llm.on_low_level_free(TrackerKind::Default, block.as_ptr(), 64);
/// llm.update_stats_per_frame(Some("startup"));
/// ```
pub struct LowLevelMemTracker {
    config: TrackerConfig,
    trackers: [Tracker; TrackerKind::COUNT],
    disabled: AtomicBool,
    can_enable: bool,
    first_update: AtomicBool,
    csv_enabled: AtomicBool,
    active_sets: [AtomicBool; TagSet::COUNT],
    program_size: AtomicBytes,
    stats: Arc<dyn StatSink>,
    platform: Arc<dyn PlatformMemory>,
    names: Arc<dyn NameTable>,
    diagnostics: Arc<dyn DiagnosticSink>,
    update_lock: Mutex<()>,
}

impl LowLevelMemTracker {
    /// Create a tracker with default collaborators.
    pub fn new(config: TrackerConfig) -> Self {
        Self::builder(config).build()
    }

    /// Start building a tracker with custom collaborators.
    pub fn builder(config: TrackerConfig) -> LowLevelMemTrackerBuilder {
        LowLevelMemTrackerBuilder {
            config,
            stats: Arc::new(NullStatSink),
            platform: Arc::new(SystemMemory),
            names: Arc::new(StdNameTable::new()),
            diagnostics: Arc::new(NullSink),
            backing: Arc::new(SystemBacking),
        }
    }

    /// The configuration this tracker was built with.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// One tracker.
    pub fn tracker(&self, kind: TrackerKind) -> &Tracker {
        &self.trackers[kind.index()]
    }

    /// The name table used for name tags.
    pub fn names(&self) -> &dyn NameTable {
        &*self.names
    }

    /// Intern `name` and return its tag.
    pub fn name_tag(&self, name: &str) -> Tag {
        self.names.tag(name)
    }

    /// Whether events are being recorded.
    pub fn is_enabled(&self) -> bool {
        !self.disabled.load(Ordering::Relaxed)
    }

    /// Whether scopes of `set` take effect. Always false while disabled.
    pub fn is_tag_set_active(&self, set: TagSet) -> bool {
        self.is_enabled() && self.active_sets[set.index()].load(Ordering::Relaxed)
    }

    /// Whether an asset tag set is active, which multiplies per-thread cost.
    pub fn should_reduce_threads(&self) -> bool {
        self.is_tag_set_active(TagSet::Assets) || self.is_tag_set_active(TagSet::AssetClasses)
    }

    /// Whether `-llmcsv` output is on.
    pub fn is_csv_enabled(&self) -> bool {
        self.csv_enabled.load(Ordering::Relaxed)
    }

    /// Apply `-llm`, `-nollm`, `-llmcsv` and `-llmtagsets=...`.
    pub fn process_command_line(&self, cmdline: &str) {
        let mut disabled = self.disabled.load(Ordering::Relaxed);
        if self.can_enable {
            disabled = if self.config.commandline_enables {
                !cmdline::has_param(cmdline, "llm")
            } else {
                cmdline::has_param(cmdline, "nollm")
            };
        } else if cmdline::has_param(cmdline, "llm") || cmdline::has_param(cmdline, "llmcsv") {
            self.report(&LLM003, cmdline);
        }

        let csv = cmdline::has_param(cmdline, "llmcsv");
        if csv && disabled && self.can_enable {
            disabled = false;
        }
        self.disabled.store(disabled, Ordering::Relaxed);
        self.csv_enabled.store(csv && !disabled, Ordering::Relaxed);
        for tracker in &self.trackers {
            tracker.csv().set_enabled(csv && !disabled);
        }

        if disabled {
            for tracker in &self.trackers {
                tracker.clear();
            }
        }

        if let Some(list) = cmdline::param_value(cmdline, "llmtagsets") {
            for name in cmdline::split_list(list) {
                match TagSet::from_name(name) {
                    Some(TagSet::Assets) if !cfg!(feature = "asset_tags") => {
                        self.report(&LLM001, name)
                    }
                    Some(set) => self.active_sets[set.index()].store(true, Ordering::Relaxed),
                    None => self.report(&LLM002, name),
                }
            }
        }

        let assets = cfg!(feature = "asset_tags")
            && (self.active_sets[TagSet::Assets.index()].load(Ordering::Relaxed)
                || self.active_sets[TagSet::AssetClasses.index()].load(Ordering::Relaxed));
        for tracker in &self.trackers {
            tracker.set_asset_tracking(assets);
        }
    }

    /// Report an allocation of `size` bytes at `ptr`.
    pub fn on_low_level_alloc(&self, kind: TrackerKind, ptr: *const u8, size: u64) {
        self.on_low_level_alloc_tagged(kind, ptr, size, Tag::UNTAGGED);
    }

    /// Report an allocation, charging `default_tag` when no scope is open.
    pub fn on_low_level_alloc_tagged(
        &self,
        kind: TrackerKind,
        ptr: *const u8,
        size: u64,
        default_tag: Tag,
    ) {
        if self.is_enabled() {
            self.tracker(kind).track_allocation(ptr, size, default_tag);
        }
    }

    /// Report a free. Null pointers are ignored; a nonzero `check_size` must
    /// match the recorded size.
    pub fn on_low_level_free(&self, kind: TrackerKind, ptr: *const u8, check_size: u64) {
        if self.is_enabled() && !ptr.is_null() {
            self.tracker(kind).track_free(ptr, check_size);
        }
    }

    /// Report a free that may not have been recorded. Returns whether it was.
    ///
    /// For hooks that see memory allocated before tracking was installed.
    pub fn try_on_low_level_free(&self, kind: TrackerKind, ptr: *const u8) -> bool {
        self.is_enabled() && !ptr.is_null() && self.tracker(kind).try_track_free(ptr).is_some()
    }

    /// Report that an allocation moved from `source` to `dest`.
    pub fn on_low_level_alloc_moved(&self, kind: TrackerKind, dest: *const u8, source: *const u8) {
        if self.is_enabled() {
            self.tracker(kind).on_alloc_moved(dest, source);
        }
    }

    /// Charge `amount` bytes to `tag` without a pointer.
    pub fn track_memory(&self, kind: TrackerKind, tag: Tag, amount: i64) {
        if self.is_enabled() {
            self.tracker(kind).track_memory(tag, amount);
        }
    }

    /// Re-measure the program size from the platform and charge the change.
    pub fn refresh_program_size(&self) {
        let used = self.platform.stats().used_physical() as i64;
        self.set_program_size(used);
    }

    /// Set the program size and charge the change to the program size tags.
    pub fn set_program_size(&self, bytes: i64) {
        let diff = bytes - self.program_size.swap(bytes);
        for tracker in &self.trackers {
            if let Some(tag) = tracker.kind().program_size_tag() {
                tracker.track_memory(tag.into(), diff);
            }
        }
    }

    /// Make every tracker ignore events from now on.
    ///
    /// Shutdown frees arrive in bulk and in no particular order; counting
    /// them would only overflow the per-thread tables.
    pub fn begin_shutdown(&self) {
        for tracker in &self.trackers {
            tracker.begin_shutdown();
        }
    }

    /// Drain every tracker, publish stats and compute untracked memory.
    ///
    /// Returns `None` without doing anything while disabled, except on the
    /// very first call, which always reports so the fixed overhead is visible.
    /// With a `log_name`, the untracked figure is also reported as LLM301.
    pub fn update_stats_per_frame(&self, log_name: Option<&str>) -> Option<FrameSummary> {
        let _guard = self.update_lock.lock();
        let first = self.first_update.swap(false, Ordering::Relaxed);
        if !self.is_enabled() && !first {
            return None;
        }

        let mut summary = FrameSummary::default();
        let mut static_overhead = std::mem::size_of::<Self>();
        let mut pointer_overhead = 0;
        for tracker in &self.trackers {
            summary.tracked[tracker.kind().index()] =
                tracker.update_frame(&*self.stats, &*self.names);
            pointer_overhead += tracker.table_memory_used();
            static_overhead += tracker.static_memory_used();
        }

        summary.static_overhead = static_overhead as i64;
        summary.pointer_tracking_overhead = pointer_overhead as i64;
        summary.overhead_total = summary.static_overhead + summary.pointer_tracking_overhead;
        self.set_stat(OVERHEAD_GROUP, STAT_OVERHEAD_TOTAL, summary.overhead_total);
        self.set_stat(OVERHEAD_GROUP, STAT_STATIC_OVERHEAD, summary.static_overhead);
        self.set_stat(
            OVERHEAD_GROUP,
            STAT_POINTER_TRACKING_OVERHEAD,
            summary.pointer_tracking_overhead,
        );

        let platform = self.platform.stats();
        summary.platform_process_memory = platform.used_physical() as i64 - summary.overhead_total;
        summary.untracked =
            summary.platform_process_memory - summary.tracked(TrackerKind::Platform);
        let group = TrackerKind::Platform.stat_group();
        self.set_stat(group, STAT_PLATFORM_TOTAL, summary.platform_process_memory);
        self.set_stat(group, STAT_PLATFORM_UNTRACKED, summary.untracked);

        if self.is_csv_enabled() {
            for tracker in &self.trackers {
                tracker
                    .csv()
                    .set_stat(CsvColumn::AvailablePhysical, platform.available_physical as i64);
                tracker.csv().update(&*self.names);
            }
        }

        if let Some(name) = log_name {
            let context = format!(
                "---> Untracked memory at {} = {:.2} mb",
                name,
                to_mb(summary.untracked)
            );
            self.report(&LLM301, &context);
        }

        Some(summary)
    }

    /// Run an `LLMEM` console command. Returns whether the command was one.
    ///
    /// - `LLMEM DUMP`: report tracker totals and table occupancy.
    /// - `LLMEM SPAMALLOC [max_bytes]`: allocation self-test.
    pub fn exec(&self, command: &str) -> bool {
        let mut words = command.split_whitespace();
        if !words
            .next()
            .is_some_and(|word| word.eq_ignore_ascii_case("LLMEM"))
        {
            return false;
        }

        match words.next() {
            Some(sub) if sub.eq_ignore_ascii_case("DUMP") => self.dump(),
            Some(sub) if sub.eq_ignore_ascii_case("SPAMALLOC") => {
                let max = words.next().and_then(|w| w.parse().ok()).unwrap_or(0);
                self.spam_alloc(max);
            }
            _ => {}
        }
        true
    }

    /// Report every tracker's total and table state as LLM303 notes.
    pub fn dump(&self) {
        for tracker in &self.trackers {
            let context = format!(
                "{}: tracked {}, {} live allocations, table {}",
                tracker.kind().stat_group(),
                format_bytes(tracker.tracked_total()),
                tracker.live_allocations(),
                format_bytes(tracker.table_memory_used() as i64),
            );
            self.report(&LLM303, &context);
        }
    }

    /// Allocate and free 128 blocks of `[max/2, max)` bytes straight from the
    /// system allocator, reporting them to the default tracker, with a frame
    /// update before, in between and after. Returns the bytes allocated.
    ///
    /// A `max_size` of 0 means 128 KiB.
    pub fn spam_alloc(&self, max_size: usize) -> usize {
        let max_size = if max_size == 0 { SPAM_DEFAULT_MAX } else { max_size };
        let min_size = (max_size / 2).max(1);

        self.update_stats_per_frame(Some("Before spam"));
        self.report(
            &LLM302,
            &format!(
                "----> Spamming {} allocations, from {}..{} bytes",
                SPAM_ALLOCATIONS, min_size, max_size
            ),
        );

        let mut rng = rand::rng();
        let mut spam = Vec::with_capacity(SPAM_ALLOCATIONS);
        let mut total = 0;
        for _ in 0..SPAM_ALLOCATIONS {
            let size = if min_size < max_size {
                rng.random_range(min_size..max_size)
            } else {
                min_size
            };
            let Ok(layout) = Layout::from_size_align(size, 16) else {
                continue;
            };
            // SAFETY: `size` is at least 1.
            let ptr = unsafe { System.alloc(layout) };
            if ptr.is_null() {
                continue;
            }
            self.on_low_level_alloc(TrackerKind::Default, ptr, size as u64);
            spam.push((ptr, layout));
            total += size;
        }
        self.report(&LLM302, &format!("----> Allocated {} total bytes", total));

        self.update_stats_per_frame(Some("After spam"));

        for (ptr, layout) in spam {
            self.on_low_level_free(TrackerKind::Default, ptr, layout.size() as u64);
            // SAFETY: allocated above with this layout.
            unsafe { System.dealloc(ptr, layout) };
        }

        self.update_stats_per_frame(Some("After cleanup"));
        total
    }

    fn set_stat(&self, group: &'static str, name: &str, value: i64) {
        self.stats.set(&Stat::named(group, name), value);
    }

    fn report(&self, diag: &Diagnostic, context: &str) {
        self.diagnostics.emit(diag, Some(context));
        diagnostics::emit_with_context(diag, context);
    }
}

impl Default for LowLevelMemTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::platform::FixedMemory;
    use crate::api::stats::CollectingStatSink;
    use crate::diagnostics::CollectingSink;

    fn quiet() -> LowLevelMemTracker {
        LowLevelMemTracker::builder(TrackerConfig::minimal())
            .platform(Arc::new(FixedMemory::new(0, 0)))
            .build()
    }

    #[test]
    fn test_commandline_enables() {
        let llm = LowLevelMemTracker::builder(TrackerConfig::minimal().with_commandline_enables(true))
            .platform(Arc::new(FixedMemory::new(0, 0)))
            .build();
        llm.process_command_line("game.exe");
        assert!(!llm.is_enabled());
        llm.process_command_line("game.exe -llm");
        assert!(llm.is_enabled());
    }

    #[test]
    fn test_nollm_disables_and_clears() {
        let llm = quiet();
        let block = [0u8; 8];
        llm.on_low_level_alloc(TrackerKind::Default, block.as_ptr(), 8);
        assert_eq!(llm.tracker(TrackerKind::Default).live_allocations(), 1);

        llm.process_command_line("-nollm");
        assert!(!llm.is_enabled());
        assert!(!llm.is_tag_set_active(TagSet::None));
        assert_eq!(llm.tracker(TrackerKind::Default).live_allocations(), 0);
        // Frees are ignored while disabled rather than hitting the fatal path.
        llm.on_low_level_free(TrackerKind::Default, block.as_ptr(), 8);
    }

    #[test]
    fn test_llmcsv_enables() {
        let llm = LowLevelMemTracker::builder(TrackerConfig::minimal().with_commandline_enables(true))
            .platform(Arc::new(FixedMemory::new(0, 0)))
            .build();
        llm.process_command_line("-llmcsv");
        assert!(llm.is_enabled());
        assert!(llm.is_csv_enabled());
        assert!(llm.tracker(TrackerKind::Platform).csv().is_enabled());
    }

    #[test]
    fn test_tag_sets() {
        let sink = Arc::new(CollectingSink::new());
        let llm = LowLevelMemTracker::builder(TrackerConfig::minimal())
            .platform(Arc::new(FixedMemory::new(0, 0)))
            .diagnostic_sink(sink.clone())
            .build();
        diagnostics::suppress_diagnostics(true);
        llm.process_command_line("-llmtagsets=AssetClasses,Textures");
        assert!(llm.is_tag_set_active(TagSet::None));
        assert!(llm.is_tag_set_active(TagSet::AssetClasses));
        assert!(!llm.is_tag_set_active(TagSet::Assets));
        assert!(llm.should_reduce_threads());
        assert_eq!(sink.contexts("LLM002"), vec!["Textures".to_string()]);

        llm.process_command_line("-llmtagsets=Assets");
        #[cfg(feature = "asset_tags")]
        assert!(llm.is_tag_set_active(TagSet::Assets));
        #[cfg(not(feature = "asset_tags"))]
        assert!(sink.contains("LLM001"));
    }

    #[test]
    fn test_first_update_runs_while_disabled() {
        let llm = LowLevelMemTracker::builder(TrackerConfig::minimal().with_enabled(false))
            .platform(Arc::new(FixedMemory::new(0, 0)))
            .build();
        let first = llm.update_stats_per_frame(None);
        assert!(first.is_some_and(|s| s.static_overhead > 0));
        assert!(llm.update_stats_per_frame(None).is_none());
    }

    #[test]
    fn test_untracked_computation() {
        let stats = Arc::new(CollectingStatSink::new());
        let memory = Arc::new(FixedMemory::new(1 << 30, 1 << 29));
        let llm = LowLevelMemTracker::builder(TrackerConfig::minimal())
            .platform(memory.clone())
            .stat_sink(stats.clone())
            .build();

        llm.on_low_level_alloc(TrackerKind::Platform, std::ptr::null(), 1 << 20);
        let summary = llm.update_stats_per_frame(None).unwrap();

        // The program size measured at startup is charged to the platform tracker.
        let tracked = summary.tracked(TrackerKind::Platform);
        assert_eq!(tracked, (1 << 29) + (1 << 20));
        assert_eq!(summary.platform_process_memory, (1 << 29) - summary.overhead_total);
        assert_eq!(summary.untracked, summary.platform_process_memory - tracked);
        assert_eq!(stats.value("LLMPlatform", STAT_PLATFORM_UNTRACKED), summary.untracked);
        assert_eq!(stats.value(OVERHEAD_GROUP, STAT_OVERHEAD_TOTAL), summary.overhead_total);
    }

    #[test]
    fn test_program_size_charges_difference() {
        let stats = Arc::new(CollectingStatSink::new());
        let llm = LowLevelMemTracker::builder(TrackerConfig::minimal())
            .platform(Arc::new(FixedMemory::new(0, 0)))
            .stat_sink(stats.clone())
            .build();
        llm.set_program_size(1000);
        llm.set_program_size(600);
        llm.update_stats_per_frame(None);
        assert_eq!(
            stats.tag_value("LLM", BuiltinTag::ProgramSizeDefault.into()),
            600
        );
        assert_eq!(
            stats.tag_value("LLMPlatform", BuiltinTag::ProgramSizePlatform.into()),
            600
        );
        assert_eq!(llm.tracker(TrackerKind::Rhi).tracked_total(), 0);
    }

    #[test]
    fn test_exec() {
        let sink = Arc::new(CollectingSink::new());
        let llm = LowLevelMemTracker::builder(TrackerConfig::minimal())
            .platform(Arc::new(FixedMemory::new(0, 0)))
            .diagnostic_sink(sink.clone())
            .build();
        assert!(!llm.exec("STAT FPS"));
        assert!(llm.exec("llmem dump"));
        assert_eq!(sink.contexts("LLM303").len(), TrackerKind::COUNT);

        assert!(llm.exec("LLMEM SPAMALLOC 1024"));
        let untracked = sink.contexts("LLM301");
        assert_eq!(untracked.len(), 3);
        assert!(untracked[0].contains("Before spam"));
        assert!(untracked[1].contains("After spam"));
        assert!(untracked[2].contains("After cleanup"));
        assert_eq!(llm.tracker(TrackerKind::Default).tracked_total(), 0);
    }
}
