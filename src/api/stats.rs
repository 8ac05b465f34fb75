//! Allocation statistics.

use crate::allocators::arena::ARENA_SIZE;
use crate::util::size::format_bytes;

/// Accounting snapshot of a tracker.
///
/// Pooled bytes are counted after rounding to the 8-byte arena granularity;
/// huge bytes are counted exactly as requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerStats {
    /// Bytes currently held by pooled allocations.
    pub pooled_bytes: usize,

    /// Highest value `pooled_bytes` has reached (high water mark).
    pub peak_pooled_bytes: usize,

    /// Bytes currently held by huge (system) allocations.
    pub huge_bytes: usize,

    /// Number of live allocations, pooled and huge.
    pub live_allocations: usize,

    /// Number of live huge allocations.
    pub huge_allocations: usize,

    /// Number of arenas created.
    pub arenas: usize,

    /// Successful fresh allocations over the tracker's lifetime.
    pub total_allocations: u64,

    /// Frees over the tracker's lifetime.
    pub total_frees: u64,

    /// Successful resizes over the tracker's lifetime.
    pub total_resizes: u64,

    /// Allocations and resizes that returned null.
    pub failed_requests: u64,
}

impl TrackerStats {
    /// Create empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pooled plus huge bytes.
    pub fn live_bytes(&self) -> usize {
        self.pooled_bytes + self.huge_bytes
    }

    /// Whether nothing is live: the condition for a clean teardown.
    pub fn is_quiescent(&self) -> bool {
        self.pooled_bytes == 0 && self.huge_bytes == 0 && self.live_allocations == 0
    }

    /// Share of created arena capacity that is handed out.
    pub fn arena_utilization(&self) -> f64 {
        if self.arenas == 0 {
            return 0.0;
        }
        self.pooled_bytes as f64 / (self.arenas * ARENA_SIZE) as f64
    }
}

impl std::fmt::Display for TrackerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Allocation Statistics:")?;
        writeln!(f, "  Pooled:          {}", format_bytes(self.pooled_bytes))?;
        writeln!(f, "  Peak pooled:     {}", format_bytes(self.peak_pooled_bytes))?;
        writeln!(
            f,
            "  Huge:            {} in {} blocks",
            format_bytes(self.huge_bytes),
            self.huge_allocations
        )?;
        writeln!(f, "  Live:            {}", self.live_allocations)?;
        writeln!(
            f,
            "  Arenas:          {} ({:.1}% used)",
            self.arenas,
            self.arena_utilization() * 100.0
        )?;
        writeln!(f, "  Allocations:     {}", self.total_allocations)?;
        writeln!(f, "  Frees:           {}", self.total_frees)?;
        writeln!(f, "  Resizes:         {}", self.total_resizes)?;
        writeln!(f, "  Failed:          {}", self.failed_requests)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiescent() {
        let mut stats = TrackerStats::new();
        assert!(stats.is_quiescent());

        stats.huge_bytes = 1;
        assert!(!stats.is_quiescent());
    }

    #[test]
    fn test_utilization() {
        let stats = TrackerStats {
            pooled_bytes: ARENA_SIZE / 2,
            arenas: 1,
            ..Default::default()
        };
        assert!((stats.arena_utilization() - 0.5).abs() < f64::EPSILON);
        assert_eq!(TrackerStats::new().arena_utilization(), 0.0);
    }

    #[test]
    fn test_display() {
        let stats = TrackerStats {
            pooled_bytes: 304,
            live_allocations: 2,
            arenas: 1,
            ..Default::default()
        };
        let text = stats.to_string();
        assert!(text.contains("Pooled:          304 B"));
        assert!(text.contains("Live:            2"));
    }
}
