//! Stat reporting.
//!
//! The tracker does not own a stats system. Once per frame it forwards the
//! drained per-tag deltas and a handful of absolute values to a [`StatSink`].

use std::collections::HashMap;

use crate::api::tag::{BuiltinTag, Tag};
use crate::sync::mutex::Mutex;

/// Stat group for the tracker's own bookkeeping.
pub const OVERHEAD_GROUP: &str = "LLMOverhead";

/// Total bookkeeping overhead.
pub const STAT_OVERHEAD_TOTAL: &str = "LLM Overhead Total";
/// Fixed-size bookkeeping (trackers, thread pools).
pub const STAT_STATIC_OVERHEAD: &str = "LLM Static Overhead";
/// Pointer table storage.
pub const STAT_POINTER_TRACKING_OVERHEAD: &str = "LLM Pointer Tracking Overhead";
/// Process memory as reported by the OS, minus overhead. Platform group.
pub const STAT_PLATFORM_TOTAL: &str = "Total";
/// Process memory not accounted for by the platform tracker. Platform group.
pub const STAT_PLATFORM_UNTRACKED: &str = "Untracked";
/// Per-tracker untagged bytes.
pub const STAT_UNTAGGED: &str = "Untagged";
/// Per-tracker tracked total.
pub const STAT_TRACKED_TOTAL: &str = "Tracked Total";

/// An independently tracked allocation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerKind {
    /// OS-level allocations (pages, mappings). Untracked memory is computed
    /// against this layer.
    Platform,
    /// The general purpose heap.
    Default,
    /// Graphics API memory.
    Rhi,
}

impl TrackerKind {
    /// Number of trackers.
    pub const COUNT: usize = 3;

    /// Every tracker.
    pub const ALL: [TrackerKind; Self::COUNT] =
        [TrackerKind::Platform, TrackerKind::Default, TrackerKind::Rhi];

    /// Index into per-tracker arrays.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Stat group this tracker reports into.
    pub const fn stat_group(self) -> &'static str {
        match self {
            TrackerKind::Platform => "LLMPlatform",
            TrackerKind::Default => "LLM",
            TrackerKind::Rhi => "LLMRHI",
        }
    }

    /// Base name of this tracker's csv file.
    pub const fn csv_name(self) -> &'static str {
        self.stat_group()
    }

    /// Builtin tag holding the executable image size, if this tracker has one.
    pub const fn program_size_tag(self) -> Option<BuiltinTag> {
        match self {
            TrackerKind::Platform => Some(BuiltinTag::ProgramSizePlatform),
            TrackerKind::Default => Some(BuiltinTag::ProgramSizeDefault),
            TrackerKind::Rhi => None,
        }
    }
}

/// A stat being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat<'a> {
    /// Stat group, e.g. `LLMPlatform`.
    pub group: &'static str,
    /// Counter name within the group.
    pub name: &'a str,
    /// The tag the counter was derived from, for per-tag stats.
    pub tag: Option<Tag>,
}

impl<'a> Stat<'a> {
    /// A stat that is not derived from a tag.
    pub const fn named(group: &'static str, name: &'a str) -> Self {
        Self { group, name, tag: None }
    }

    /// A per-tag stat.
    pub const fn tagged(group: &'static str, name: &'a str, tag: Tag) -> Self {
        Self { group, name, tag: Some(tag) }
    }
}

/// Receiver of tracker statistics.
///
/// Called only from the frame update, never from the tracking hot path, so
/// implementations may allocate and lock freely.
pub trait StatSink: Send + Sync {
    /// Apply a signed delta to a counter.
    fn add(&self, stat: &Stat<'_>, delta: i64);

    /// Set a counter to an absolute value.
    fn set(&self, stat: &Stat<'_>, value: i64);
}

/// A sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStatSink;

impl StatSink for NullStatSink {
    fn add(&self, _stat: &Stat<'_>, _delta: i64) {}
    fn set(&self, _stat: &Stat<'_>, _value: i64) {}
}

/// A sink that keeps every counter in memory.
#[derive(Default)]
pub struct CollectingStatSink {
    by_name: Mutex<HashMap<(&'static str, String), i64>>,
    by_tag: Mutex<HashMap<(&'static str, Tag), i64>>,
}

impl CollectingStatSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a named counter (0 if never reported).
    pub fn value(&self, group: &str, name: &str) -> i64 {
        self.by_name
            .lock()
            .iter()
            .find(|((g, n), _)| *g == group && n == name)
            .map_or(0, |(_, v)| *v)
    }

    /// Whether a named counter was ever reported.
    pub fn contains(&self, group: &str, name: &str) -> bool {
        self.by_name
            .lock()
            .keys()
            .any(|(g, n)| *g == group && n == name)
    }

    /// Accumulated value for a tag (0 if never reported).
    pub fn tag_value(&self, group: &'static str, tag: Tag) -> i64 {
        self.by_tag.lock().get(&(group, tag)).copied().unwrap_or(0)
    }

    /// Names reported in a group, sorted.
    pub fn names(&self, group: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .by_name
            .lock()
            .keys()
            .filter(|(g, _)| *g == group)
            .map(|(_, n)| n.clone())
            .collect();
        names.sort();
        names
    }

    /// Forget every counter.
    pub fn clear(&self) {
        self.by_name.lock().clear();
        self.by_tag.lock().clear();
    }
}

impl StatSink for CollectingStatSink {
    fn add(&self, stat: &Stat<'_>, delta: i64) {
        *self
            .by_name
            .lock()
            .entry((stat.group, stat.name.to_string()))
            .or_insert(0) += delta;
        if let Some(tag) = stat.tag {
            *self.by_tag.lock().entry((stat.group, tag)).or_insert(0) += delta;
        }
    }

    fn set(&self, stat: &Stat<'_>, value: i64) {
        self.by_name
            .lock()
            .insert((stat.group, stat.name.to_string()), value);
        if let Some(tag) = stat.tag {
            self.by_tag.lock().insert((stat.group, tag), value);
        }
    }
}

/// Forwards counters to Tracy plots.
///
/// Tracy plots absolute values, so deltas are accumulated here first.
#[cfg(feature = "tracy")]
#[derive(Default)]
pub struct TracyStatSink {
    plots: Mutex<HashMap<String, (tracy_client::PlotName, i64)>>,
}

#[cfg(feature = "tracy")]
impl TracyStatSink {
    /// Create a sink. Values are dropped while no Tracy client is running.
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, stat: &Stat<'_>, apply: impl FnOnce(i64) -> i64) {
        let Some(client) = tracy_client::Client::running() else {
            return;
        };
        let key = format!("{}/{}", stat.group, stat.name);
        let mut plots = self.plots.lock();
        let (plot, value) = plots
            .entry(key)
            .or_insert_with_key(|key| (tracy_client::PlotName::new_leak(key.clone()), 0));
        *value = apply(*value);
        client.plot(*plot, *value as f64);
    }
}

#[cfg(feature = "tracy")]
impl StatSink for TracyStatSink {
    fn add(&self, stat: &Stat<'_>, delta: i64) {
        self.update(stat, |current| current + delta);
    }

    fn set(&self, stat: &Stat<'_>, value: i64) {
        self.update(stat, |_| value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink_accumulates() {
        let sink = CollectingStatSink::new();
        let stat = Stat::tagged("LLM", "User Memory", Tag::from_raw(120));

        sink.add(&stat, 100);
        sink.add(&stat, -30);
        assert_eq!(sink.value("LLM", "User Memory"), 70);
        assert_eq!(sink.tag_value("LLM", Tag::from_raw(120)), 70);

        sink.set(&Stat::named("LLM", STAT_TRACKED_TOTAL), 4096);
        assert_eq!(sink.value("LLM", STAT_TRACKED_TOTAL), 4096);
        assert_eq!(sink.names("LLM"), vec!["Tracked Total".to_string(), "User Memory".to_string()]);
        assert!(!sink.contains("LLMPlatform", STAT_TRACKED_TOTAL));
    }

    #[test]
    fn test_tracker_groups_are_distinct() {
        for (i, a) in TrackerKind::ALL.iter().enumerate() {
            assert_eq!(a.index(), i);
            for b in &TrackerKind::ALL[i + 1..] {
                assert_ne!(a.stat_group(), b.stat_group());
            }
        }
    }
}
