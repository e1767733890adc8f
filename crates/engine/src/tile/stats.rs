//! Lock-free job counters.
//!
//! Render workers and downscale tasks bump these with relaxed atomic adds;
//! the job reads a snapshot for progress and end-of-phase logging.

use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::time::Instant;

use serde::Serialize;

pub struct RenderStats {
    tiles_rendered: AtomicU64,
    tiles_saved: AtomicU64,
    tiles_empty: AtomicU64,
    save_failures: AtomicU64,
    tiles_downscaled: AtomicU64,
    sprites_rasterized: AtomicU64,

    started_at: Instant,
}

impl RenderStats {
    pub fn new() -> Self {
        Self {
            tiles_rendered: AtomicU64::new(0),
            tiles_saved: AtomicU64::new(0),
            tiles_empty: AtomicU64::new(0),
            save_failures: AtomicU64::new(0),
            tiles_downscaled: AtomicU64::new(0),
            sprites_rasterized: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Returns the number of tiles rendered so far, this one included.
    pub fn tile_rendered(&self) -> u64 {
        self.tiles_rendered.fetch_add(1, Relaxed) + 1
    }

    pub fn tile_saved(&self) {
        self.tiles_saved.fetch_add(1, Relaxed);
    }

    pub fn tile_empty(&self) {
        self.tiles_empty.fetch_add(1, Relaxed);
    }

    pub fn save_failed(&self) {
        self.save_failures.fetch_add(1, Relaxed);
    }

    pub fn tile_downscaled(&self) {
        self.tiles_downscaled.fetch_add(1, Relaxed);
    }

    /// Folded in by each worker when it retires its renderer.
    pub fn add_sprites(&self, count: u64) {
        self.sprites_rasterized.fetch_add(count, Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
            tiles_rendered: self.tiles_rendered.load(Relaxed),
            tiles_saved: self.tiles_saved.load(Relaxed),
            tiles_empty: self.tiles_empty.load(Relaxed),
            save_failures: self.save_failures.load(Relaxed),
            tiles_downscaled: self.tiles_downscaled.load(Relaxed),
            sprites_rasterized: self.sprites_rasterized.load(Relaxed),
        }
    }
}

impl Default for RenderStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub elapsed_secs: f64,
    pub tiles_rendered: u64,
    pub tiles_saved: u64,
    pub tiles_empty: u64,
    pub save_failures: u64,
    pub tiles_downscaled: u64,
    pub sprites_rasterized: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_snapshot_json() {
        let stats = RenderStats::new();
        assert_eq!(stats.tile_rendered(), 1);
        assert_eq!(stats.tile_rendered(), 2);
        stats.tile_saved();
        stats.tile_empty();
        stats.save_failed();
        stats.add_sprites(7);

        let snap = stats.snapshot();
        assert_eq!(snap.tiles_rendered, 2);
        assert_eq!(snap.tiles_saved, 1);
        assert_eq!(snap.tiles_empty, 1);
        assert_eq!(snap.save_failures, 1);
        assert_eq!(snap.sprites_rasterized, 7);

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["tiles_downscaled"], 0);
    }
}
