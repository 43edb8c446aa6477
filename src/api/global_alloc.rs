//! `#[global_allocator]` hook reporting to the installed tracker.
//!
//! ```rust,no_run
//! use llmtrack::{install_global, LowLevelMemTracker, TrackerConfig, TrackingAllocator};
//!
//! #[global_allocator]
//! static ALLOC: TrackingAllocator = TrackingAllocator::system();
//!
//! fn main() {
//!     let _ = install_global(LowLevelMemTracker::new(TrackerConfig::default()));
//!     let data = vec![0u8; 4096];
//!     drop(data);
//! }
//! ```

use std::alloc::{GlobalAlloc, Layout, System};

use crate::api::llm::{global, LowLevelMemTracker};
use crate::api::stats::TrackerKind;
use crate::api::tag::{BuiltinTag, Tag};
use crate::core::tracker::AllocInfo;
use crate::diagnostics::emit::is_failing;

/// Wraps a [`GlobalAlloc`] and reports every block to [`global`].
///
/// Allocations outside any tag scope are charged to `Malloc`. Frees of
/// memory that was never recorded (allocated before the tracker was
/// installed, or while paused) are passed through silently.
pub struct TrackingAllocator<A = System> {
    inner: A,
    kind: TrackerKind,
}

impl TrackingAllocator<System> {
    /// Track the system allocator on the default tracker.
    pub const fn system() -> Self {
        Self::new(System)
    }
}

impl<A> TrackingAllocator<A> {
    /// Track `inner` on the default tracker.
    pub const fn new(inner: A) -> Self {
        Self::with_tracker(inner, TrackerKind::Default)
    }

    /// Track `inner` on `kind`.
    pub const fn with_tracker(inner: A, kind: TrackerKind) -> Self {
        Self { inner, kind }
    }

    /// The wrapped allocator.
    pub fn inner(&self) -> &A {
        &self.inner
    }

    fn record(&self, ptr: *mut u8, size: usize) {
        if ptr.is_null() || is_failing() {
            return;
        }
        if let Some(llm) = global() {
            llm.on_low_level_alloc_tagged(self.kind, ptr, size as u64, Tag::from(BuiltinTag::Malloc));
        }
    }

    fn take(&self, ptr: *mut u8) -> Option<(&'static LowLevelMemTracker, AllocInfo)> {
        if is_failing() {
            return None;
        }
        let llm = global().filter(|llm| llm.is_enabled())?;
        let info = llm.tracker(self.kind).take_allocation(ptr)?;
        Some((llm, info))
    }

    fn forget(&self, ptr: *mut u8) {
        if is_failing() {
            return;
        }
        if let Some(llm) = global() {
            llm.try_on_low_level_free(self.kind, ptr);
        }
    }
}

unsafe impl<A: GlobalAlloc> GlobalAlloc for TrackingAllocator<A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = self.inner.alloc(layout);
        self.record(ptr, layout.size());
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = self.inner.alloc_zeroed(layout);
        self.record(ptr, layout.size());
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        self.forget(ptr);
        self.inner.dealloc(ptr, layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // The record comes out before the inner allocator can hand the old
        // address to another thread.
        let taken = self.take(ptr);
        let new_ptr = self.inner.realloc(ptr, layout, new_size);
        match taken {
            Some((llm, info)) => llm.tracker(self.kind).finish_reallocation(
                ptr,
                info,
                new_ptr,
                new_size as u64,
                Tag::from(BuiltinTag::Malloc),
            ),
            None => self.record(new_ptr, new_size),
        }
        new_ptr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes_through_without_global() {
        let alloc = TrackingAllocator::system();
        let layout = Layout::from_size_align(64, 8).unwrap();
        unsafe {
            let ptr = alloc.alloc_zeroed(layout);
            assert!(!ptr.is_null());
            assert_eq!(*ptr, 0);
            let ptr = alloc.realloc(ptr, layout, 128);
            assert!(!ptr.is_null());
            alloc.dealloc(ptr, Layout::from_size_align(128, 8).unwrap());
        }
    }

    #[test]
    fn test_tracker_choice() {
        let alloc = TrackingAllocator::with_tracker(System, TrackerKind::Rhi);
        assert_eq!(alloc.kind, TrackerKind::Rhi);
    }
}
