//! Size helper functions.

/// Convert kilobytes to bytes.
#[inline]
pub const fn kb(n: usize) -> usize {
    n * 1024
}

/// Convert megabytes to bytes.
#[inline]
pub const fn mb(n: usize) -> usize {
    n * 1024 * 1024
}

/// Convert a signed byte count to megabytes, as used in reports and CSV rows.
#[inline]
pub fn to_mb(bytes: i64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Format a signed byte count as a human-readable string.
pub fn format_bytes(bytes: i64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    let sign = if bytes < 0 { "-" } else { "" };
    let magnitude = bytes.unsigned_abs();

    if magnitude >= GB {
        format!("{}{:.2} GB", sign, magnitude as f64 / GB as f64)
    } else if magnitude >= MB {
        format!("{}{:.2} MB", sign, magnitude as f64 / MB as f64)
    } else if magnitude >= KB {
        format!("{}{:.2} KB", sign, magnitude as f64 / KB as f64)
    } else {
        format!("{}{} B", sign, magnitude)
    }
}
