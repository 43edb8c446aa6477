//! Small helpers shared across the crate.

pub(crate) mod cmdline;
pub(crate) mod size;
