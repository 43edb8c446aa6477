//! Physical memory queries.

/// Snapshot of machine memory, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhysicalMemoryStats {
    /// Installed physical memory.
    pub total_physical: u64,
    /// Physical memory not in use.
    pub available_physical: u64,
}

impl PhysicalMemoryStats {
    /// Physical memory in use: `total - available`, saturating at 0.
    pub fn used_physical(&self) -> u64 {
        self.total_physical.saturating_sub(self.available_physical)
    }
}

/// Source of physical memory statistics.
///
/// Queried once per frame update and when the program size is refreshed,
/// never from the tracking path.
pub trait PlatformMemory: Send + Sync {
    /// Current physical memory statistics.
    fn stats(&self) -> PhysicalMemoryStats;
}

/// Reads the operating system's counters.
///
/// On Linux this parses `/proc/meminfo`. Elsewhere it reports zeros.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMemory;

impl SystemMemory {
    #[cfg(target_os = "linux")]
    fn read() -> Option<PhysicalMemoryStats> {
        let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
        Some(PhysicalMemoryStats {
            total_physical: meminfo_field(&meminfo, "MemTotal")?,
            available_physical: meminfo_field(&meminfo, "MemAvailable")
                .or_else(|| meminfo_field(&meminfo, "MemFree"))?,
        })
    }

    #[cfg(not(target_os = "linux"))]
    fn read() -> Option<PhysicalMemoryStats> {
        None
    }
}

impl PlatformMemory for SystemMemory {
    fn stats(&self) -> PhysicalMemoryStats {
        Self::read().unwrap_or_default()
    }
}

/// Value of a `Key:   1234 kB` line, in bytes.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn meminfo_field(meminfo: &str, key: &str) -> Option<u64> {
    meminfo.lines().find_map(|line| {
        let (name, rest) = line.split_once(':')?;
        if name.trim() != key {
            return None;
        }
        let mut parts = rest.split_whitespace();
        let value: u64 = parts.next()?.parse().ok()?;
        match parts.next() {
            Some(unit) if unit.eq_ignore_ascii_case("kB") => Some(value * 1024),
            _ => Some(value),
        }
    })
}

/// Fixed statistics, for tests and platforms without a query.
#[derive(Debug, Default)]
pub struct FixedMemory {
    stats: crate::sync::mutex::Mutex<PhysicalMemoryStats>,
}

impl FixedMemory {
    /// Report `total` installed and `available` free bytes.
    pub fn new(total: u64, available: u64) -> Self {
        Self {
            stats: crate::sync::mutex::Mutex::new(PhysicalMemoryStats {
                total_physical: total,
                available_physical: available,
            }),
        }
    }

    /// Change the available figure.
    pub fn set_available(&self, available: u64) {
        self.stats.lock().available_physical = available;
    }
}

impl PlatformMemory for FixedMemory {
    fn stats(&self) -> PhysicalMemoryStats {
        *self.stats.lock()
    }
}
