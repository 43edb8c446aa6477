//! Tracker configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::table::TableConfig;

/// Tags one thread may touch between frame updates with asset tags compiled in.
pub const MAX_TAGS_PER_THREAD_WITH_ASSETS: usize = 4000;

/// Tags one thread may touch between frame updates without asset tags.
pub const MAX_TAGS_PER_THREAD: usize = 64;

/// Configuration for [`LowLevelMemTracker`](crate::LowLevelMemTracker).
///
/// Every fixed bound in the tracker lives here. Exceeding one is a fatal
/// error, not a silent drop.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Threads per tracker that may ever report (default: 64)
    pub max_tracked_threads: usize,

    /// Nesting depth of tag scopes per thread (default: 32)
    pub max_tag_stack_depth: usize,

    /// Distinct tags per thread between frame updates
    pub max_tags_per_thread: usize,

    /// Pointer table buckets at startup (default: 1024)
    pub table_initial_capacity: usize,

    /// Pointer table bucket limit (default: 2^30)
    pub table_max_capacity: usize,

    /// Pointer table load factor before doubling (default: 0.75)
    pub table_load_factor: f32,

    /// Entries per pointer table pool block (default: 1024)
    pub pool_block_entries: usize,

    /// Whether tracking starts enabled before the command line is seen
    pub enabled_by_default: bool,

    /// `true`: tracking is off unless `-llm` is given.
    /// `false`: tracking is on unless `-nollm` is given.
    pub commandline_enables: bool,

    /// Directory for `-llmcsv` output (default: current directory)
    pub csv_directory: PathBuf,

    /// Time between CSV rows (default: 5 s)
    pub csv_write_interval: Duration,

    /// Distinct CSV columns per tracker (default: 512)
    pub csv_max_columns: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_tracked_threads: 64,
            max_tag_stack_depth: 32,
            max_tags_per_thread: if cfg!(feature = "asset_tags") {
                MAX_TAGS_PER_THREAD_WITH_ASSETS
            } else {
                MAX_TAGS_PER_THREAD
            },
            table_initial_capacity: 1024,
            table_max_capacity: 1 << 30,
            table_load_factor: 0.75,
            pool_block_entries: 1024,
            enabled_by_default: true,
            commandline_enables: false,
            csv_directory: PathBuf::from("."),
            csv_write_interval: Duration::from_secs(5),
            csv_max_columns: 512,
        }
    }
}

impl TrackerConfig {
    /// Create a minimal config for tests or constrained environments.
    pub fn minimal() -> Self {
        Self {
            max_tracked_threads: 8,
            max_tag_stack_depth: 8,
            max_tags_per_thread: 32,
            table_initial_capacity: 64,
            table_max_capacity: 1 << 20,
            table_load_factor: 0.75,
            pool_block_entries: 64,
            csv_max_columns: 64,
            ..Self::default()
        }
    }

    /// Sizing for each tracker's pointer table.
    pub fn table_config(&self) -> TableConfig {
        TableConfig {
            initial_capacity: self.table_initial_capacity,
            max_capacity: self.table_max_capacity,
            load_factor: self.table_load_factor,
            block_entries: self.pool_block_entries,
        }
    }

    /// Builder pattern: set the thread limit.
    pub fn with_max_threads(mut self, threads: usize) -> Self {
        self.max_tracked_threads = threads;
        self
    }

    /// Builder pattern: set the scope nesting limit.
    pub fn with_max_stack_depth(mut self, depth: usize) -> Self {
        self.max_tag_stack_depth = depth;
        self
    }

    /// Builder pattern: set the per-thread tag limit.
    pub fn with_max_tags_per_thread(mut self, tags: usize) -> Self {
        self.max_tags_per_thread = tags;
        self
    }

    /// Builder pattern: set pointer table sizing.
    pub fn with_table_capacity(mut self, initial: usize, max: usize) -> Self {
        self.table_initial_capacity = initial;
        self.table_max_capacity = max;
        self
    }

    /// Builder pattern: set the pointer table load factor.
    pub fn with_load_factor(mut self, load_factor: f32) -> Self {
        self.table_load_factor = load_factor;
        self
    }

    /// Builder pattern: set whether tracking starts enabled.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled_by_default = enabled;
        self
    }

    /// Builder pattern: require `-llm` on the command line.
    pub fn with_commandline_enables(mut self, enables: bool) -> Self {
        self.commandline_enables = enables;
        self
    }

    /// Builder pattern: set the CSV output directory.
    pub fn with_csv_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.csv_directory = dir.into();
        self
    }

    /// Builder pattern: set the CSV row interval.
    pub fn with_csv_interval(mut self, interval: Duration) -> Self {
        self.csv_write_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.max_tracked_threads, 64);
        assert_eq!(config.max_tag_stack_depth, 32);
        assert_eq!(config.csv_max_columns, 512);
        assert_eq!(config.csv_write_interval, Duration::from_secs(5));
        #[cfg(feature = "asset_tags")]
        assert_eq!(config.max_tags_per_thread, 4000);
    }

    #[test]
    fn test_builders() {
        let config = TrackerConfig::minimal()
            .with_max_threads(2)
            .with_commandline_enables(true)
            .with_csv_directory("/tmp/llm");
        assert_eq!(config.max_tracked_threads, 2);
        assert!(config.commandline_enables);
        assert_eq!(config.table_config().initial_capacity, 64);
        assert_eq!(config.csv_directory, PathBuf::from("/tmp/llm"));
    }
}
