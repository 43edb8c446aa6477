//! Allocation bookkeeping that never touches the tracked allocator.

pub mod backing;
pub(crate) mod pool;
pub mod pointer_table;

pub use backing::{BackingAlloc, CountingBacking, SystemBacking};
pub use pointer_table::{PointerTable, TableConfig};
