//! Scope guards for tags and pauses.

use std::marker::PhantomData;

use crate::api::llm::{global, LowLevelMemTracker};
use crate::api::stats::TrackerKind;
use crate::api::tag::{Tag, TagSet};

/// Charges allocations on this thread to a tag for the guard's lifetime.
///
/// The push happens only if `tag` is not `Untagged` and `set` is active when
/// the guard is created; the drop pops exactly what was pushed even if the
/// tag set was switched off in between. Guards must be dropped in reverse
/// order of creation on the thread that created them.
///
/// # Example
///
/// ```rust
/// use llmtrack::{LowLevelMemTracker, ScopedTag, TagSet, TrackerConfig, TrackerKind};
///
/// let llm = LowLevelMemTracker::new(TrackerConfig::default());
/// let textures = llm.name_tag("Textures");
/// {
///     let _tag = ScopedTag::new(&llm, textures, TagSet::None);
///     assert_eq!(llm.tracker(TrackerKind::Default).top_tag(TagSet::None), textures);
/// }
/// ```
#[must_use = "the tag is popped when the guard is dropped"]
pub struct ScopedTag<'a> {
    llm: &'a LowLevelMemTracker,
    set: TagSet,
    target: Option<TrackerKind>,
    active: bool,
    // Tag stacks are per thread.
    _not_send: PhantomData<*const ()>,
}

impl<'a> ScopedTag<'a> {
    /// Push `tag` on every tracker.
    pub fn new(llm: &'a LowLevelMemTracker, tag: Tag, set: TagSet) -> Self {
        Self::push(llm, tag, set, None)
    }

    /// Push `tag` on one tracker only.
    pub fn for_tracker(llm: &'a LowLevelMemTracker, tag: Tag, set: TagSet, kind: TrackerKind) -> Self {
        Self::push(llm, tag, set, Some(kind))
    }

    fn push(llm: &'a LowLevelMemTracker, tag: Tag, set: TagSet, target: Option<TrackerKind>) -> Self {
        let active = !tag.is_untagged() && llm.is_tag_set_active(set);
        if active {
            for kind in targets(target) {
                llm.tracker(kind).push_tag(tag, set);
            }
        }
        Self {
            llm,
            set,
            target,
            active,
            _not_send: PhantomData,
        }
    }

    /// Whether this guard pushed anything.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl ScopedTag<'static> {
    /// Push `tag` on every tracker of the installed global.
    ///
    /// Returns `None` if no global is installed.
    pub fn global(tag: Tag, set: TagSet) -> Option<Self> {
        global().map(|llm| Self::new(llm, tag, set))
    }
}

impl Drop for ScopedTag<'_> {
    fn drop(&mut self) {
        if self.active {
            for kind in targets(self.target) {
                self.llm.tracker(kind).pop_tag(self.set);
            }
        }
    }
}

/// Stops tracking on this thread for the guard's lifetime.
///
/// Useful around code whose allocations are accounted for another way,
/// typically with [`ScopedPause::with_amount`] charging the known total up
/// front.
#[must_use = "tracking resumes when the guard is dropped"]
pub struct ScopedPause<'a> {
    llm: &'a LowLevelMemTracker,
    active: bool,
    _not_send: PhantomData<*const ()>,
}

impl<'a> ScopedPause<'a> {
    /// Pause every tracker for this thread.
    pub fn new(llm: &'a LowLevelMemTracker) -> Self {
        Self::with_amount(llm, Tag::UNTAGGED, 0, None)
    }

    /// Pause every tracker and charge `amount` bytes to `tag` on `tracker`
    /// (on every tracker when `None`).
    pub fn with_amount(
        llm: &'a LowLevelMemTracker,
        tag: Tag,
        amount: i64,
        tracker: Option<TrackerKind>,
    ) -> Self {
        let active = llm.is_tag_set_active(TagSet::None);
        if active {
            for kind in TrackerKind::ALL {
                let charged = amount != 0 && tracker.map_or(true, |target| target == kind);
                if charged {
                    llm.tracker(kind).pause_and_track_memory(tag, amount);
                } else {
                    llm.tracker(kind).pause();
                }
            }
        }
        Self {
            llm,
            active,
            _not_send: PhantomData,
        }
    }

    /// Whether this guard paused anything.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for ScopedPause<'_> {
    fn drop(&mut self) {
        if self.active {
            for kind in TrackerKind::ALL {
                self.llm.tracker(kind).unpause();
            }
        }
    }
}

fn targets(target: Option<TrackerKind>) -> impl Iterator<Item = TrackerKind> {
    TrackerKind::ALL
        .into_iter()
        .filter(move |kind| target.map_or(true, |t| t == *kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::config::TrackerConfig;
    use crate::api::platform::FixedMemory;
    use std::sync::Arc;

    fn llm() -> LowLevelMemTracker {
        LowLevelMemTracker::builder(TrackerConfig::minimal())
            .platform(Arc::new(FixedMemory::new(0, 0)))
            .build()
    }

    #[test]
    fn test_nested_tags_pop_in_order() {
        let llm = llm();
        let default = llm.tracker(TrackerKind::Default);
        {
            let _outer = ScopedTag::new(&llm, Tag::from_raw(110), TagSet::None);
            {
                let _inner = ScopedTag::new(&llm, Tag::from_raw(111), TagSet::None);
                assert_eq!(default.top_tag(TagSet::None), Tag::from_raw(111));
            }
            assert_eq!(default.top_tag(TagSet::None), Tag::from_raw(110));
        }
        assert_eq!(default.top_tag(TagSet::None), Tag::UNTAGGED);
    }

    #[test]
    fn test_untagged_and_inactive_sets_do_nothing() {
        let llm = llm();
        let untagged = ScopedTag::new(&llm, Tag::UNTAGGED, TagSet::None);
        assert!(!untagged.is_active());
        let assets = ScopedTag::new(&llm, Tag::from_raw(300), TagSet::Assets);
        assert!(!assets.is_active());
    }

    #[test]
    fn test_single_tracker_tag() {
        let llm = llm();
        let _tag = ScopedTag::for_tracker(&llm, Tag::from_raw(120), TagSet::None, TrackerKind::Rhi);
        assert_eq!(llm.tracker(TrackerKind::Rhi).top_tag(TagSet::None), Tag::from_raw(120));
        assert_eq!(llm.tracker(TrackerKind::Default).top_tag(TagSet::None), Tag::UNTAGGED);
    }

    #[test]
    fn test_drop_pops_after_disable() {
        let llm = llm();
        {
            let _tag = ScopedTag::new(&llm, Tag::from_raw(120), TagSet::None);
            llm.process_command_line("-nollm");
        }
        assert_eq!(llm.tracker(TrackerKind::Default).top_tag(TagSet::None), Tag::UNTAGGED);
    }

    #[test]
    fn test_pause_with_amount() {
        let llm = llm();
        let tag = Tag::from_raw(140);
        {
            let _pause = ScopedPause::with_amount(&llm, tag, 4096, Some(TrackerKind::Default));
            llm.on_low_level_alloc(TrackerKind::Default, 0x1000 as *const u8, 64);
            llm.on_low_level_alloc(TrackerKind::Platform, 0x2000 as *const u8, 64);
            assert!(llm.tracker(TrackerKind::Platform).is_paused());
        }
        assert!(!llm.tracker(TrackerKind::Default).is_paused());
        assert_eq!(llm.tracker(TrackerKind::Default).tracked_total(), 4096);
        assert_eq!(llm.tracker(TrackerKind::Default).pending_delta(tag), Some(4096));
        assert_eq!(llm.tracker(TrackerKind::Platform).tracked_total(), 0);
    }
}
