//! Buffer pool statistics tracking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters the buffer pool manager updates as it works.
///
/// All fields are atomic with `Ordering::Relaxed`: the counters only
/// need atomicity, not ordering between each other, and readers accept
/// eventually consistent values.
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Fetches answered from a resident frame.
    pub hits: AtomicU64,

    /// Fetches that had to load the page from disk.
    pub misses: AtomicU64,

    /// Frames reclaimed through the replacer.
    pub evictions: AtomicU64,

    /// Dirty pages written back during eviction.
    pub writebacks: AtomicU64,
}

impl PoolStats {
    /// Create a stats tracker with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a non-atomic copy of the current counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            writebacks: self.writebacks.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`PoolStats`].
///
/// Safe to print, compare, and store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub writebacks: u64,
}

impl StatsSnapshot {
    /// Fraction of fetches served without touching the disk (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ hits: {}, misses: {}, evictions: {}, writebacks: {}, hit_rate: {:.2}% }}",
            self.hits,
            self.misses,
            self.evictions,
            self.writebacks,
            self.hit_rate() * 100.0
        )
    }
}
