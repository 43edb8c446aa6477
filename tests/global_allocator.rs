//! The tracking allocator installed as this test binary's global allocator.

use llmtrack::{
    global, install_global, BuiltinTag, FixedMemory, LowLevelMemTracker, ScopedPause, ScopedTag,
    Tag, TagSet, TrackerConfig, TrackerKind, TrackingAllocator,
};
use std::sync::Arc;

#[global_allocator]
static ALLOC: TrackingAllocator = TrackingAllocator::system();

// Everything runs in one test so no other test thread races the global.
#[test]
fn test_tracking_allocator() {
    // Freed after installation without ever being recorded.
    let early = vec![1u8; 256];

    let llm = LowLevelMemTracker::builder(TrackerConfig::default().with_max_threads(256))
        .platform(Arc::new(FixedMemory::new(0, 0)))
        .build();
    assert!(install_global(llm).is_ok());
    let llm = global().unwrap();
    let default = llm.tracker(TrackerKind::Default);

    drop(early);

    // Untagged heap allocations land on Malloc.
    let plain: Vec<u64> = Vec::with_capacity(1000);
    let info = default.allocation(plain.as_ptr().cast()).unwrap();
    assert_eq!(info.size, 8000);
    assert_eq!(info.tag, Tag::from(BuiltinTag::Malloc));

    // Scoped allocations land on the scope's tag.
    let buffers = llm.name_tag("Buffers");
    let tagged = {
        let _scope = ScopedTag::new(llm, buffers, TagSet::None);
        vec![0u8; 4096]
    };
    let info = default.allocation(tagged.as_ptr()).unwrap();
    assert_eq!(info.tag, buffers);
    assert_eq!(info.size, 4096);

    // Growing moves the record.
    let mut grown = tagged;
    let old = grown.as_ptr();
    grown.reserve_exact(1 << 20);
    if grown.as_ptr() != old {
        assert!(default.allocation(old).is_none());
    }
    assert_eq!(
        default.allocation(grown.as_ptr()).map(|info| info.size),
        Some(grown.capacity() as u64)
    );

    let addr = grown.as_ptr();
    drop(grown);
    drop(plain);
    assert!(default.allocation(addr).is_none());

    // Paused allocations are not recorded and their frees pass through.
    let hidden = {
        let _pause = ScopedPause::new(llm);
        Box::new([0u8; 512])
    };
    assert!(default.allocation(hidden.as_ptr()).is_none());
    drop(hidden);

    assert!(llm.update_stats_per_frame(None).is_some());
}
