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

/// Format bytes as a human-readable string.
pub fn format_bytes(bytes: usize) -> String {
    const KB: usize = kb(1);
    const MB: usize = mb(1);

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
