//! # llmtrack
//!
//! Low-level memory tracking for Rust game engines: every allocation is
//! charged to a tag, and per-tag totals are published once per frame.
//!
//! ## Features
//!
//! - Three independent trackers (platform, default, RHI)
//! - Scoped tags with per-thread stacks, plus optional asset tag sets
//! - Per-thread accumulators drained once per frame (no global lock on the hot path)
//! - Pointer table that never allocates through the allocator it observes
//! - Untracked memory estimate from OS physical memory figures
//! - Optional CSV output and Tracy plots
//! - `#[global_allocator]` hook
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use llmtrack::{LowLevelMemTracker, ScopedTag, TagSet, TrackerConfig, TrackerKind};
//!
//! let llm = LowLevelMemTracker::new(TrackerConfig::default());
//! llm.process_command_line(&std::env::args().collect::<Vec<_>>().join(" "));
//! let meshes = llm.name_tag("Meshes");
//!
//! // Game loop
//! {
//!     let _tag = ScopedTag::new(&llm, meshes, TagSet::None);
//!     let block = vec![0u8; 1024];
//!     llm.on_low_level_alloc(TrackerKind::Default, block.as_ptr(), 1024);
//!     llm.on_low_level_free(TrackerKind::Default, block.as_ptr(), 1024);
//! }
//! llm.update_stats_per_frame(None);
//! ```

pub mod api;
pub mod diagnostics;
pub mod table;

mod core;
mod sync;
mod util;

// Re-export public API at crate root for convenience
pub use api::config::TrackerConfig;
pub use api::global_alloc::TrackingAllocator;
pub use api::llm::{global, install_global, FrameSummary, LowLevelMemTracker, LowLevelMemTrackerBuilder};
pub use api::names::{NameTable, StdNameTable};
pub use api::platform::{FixedMemory, PhysicalMemoryStats, PlatformMemory, SystemMemory};
pub use api::scope::{ScopedPause, ScopedTag};
pub use api::stats::{CollectingStatSink, NullStatSink, Stat, StatSink, TrackerKind};
pub use api::tag::{BuiltinTag, NameId, Tag, TagKind, TagSet};

#[cfg(feature = "tracy")]
pub use api::stats::TracyStatSink;

// Tracker internals that show up in public signatures
pub use core::csv::{CsvColumn, CsvWriter};
pub use core::tracker::{AllocInfo, Tracker};

// Pointer table
pub use table::{BackingAlloc, CountingBacking, PointerTable, SystemBacking, TableConfig};

// Diagnostics - Core types and predefined codes
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, CollectingSink, NullSink};
pub use diagnostics::{StrictMode, set_strict_mode, StrictModeGuard};
pub use diagnostics::{
    LLM001, LLM002, LLM003, LLM101, LLM102, LLM103, LLM104, LLM201, LLM202, LLM203, LLM204,
    LLM301, LLM302, LLM303, LLM310, LLM901, LLM902,
};
