//! Tile job driver: parallel zoom-0 render and the downscaled pyramid.
//!
//! Layout on disk is `{root}/{level}/{x}/{y}.png`. Level 0 is written by
//! `full_render`; every level above it is built from the one below by
//! `downscale_tiles`. Tiles with nothing on them are never written, so a
//! missing file always means "no data".

pub mod stats;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;

use anyhow::{Context, Result};
use image::RgbaImage;
use image::imageops::{self, FilterType};
use rayon::prelude::*;

use crate::raster::png::{load_png, save_png};
use crate::render::{Renderer, TILE_SIZE};
use crate::world::World;
use crate::world::position::{Region, TilePosition};
pub use stats::{RenderStats, StatsSnapshot};

/// Queued tiles per worker.
const QUEUE_DEPTH: usize = 4;
/// Log progress every this many rendered tiles.
const PROGRESS_INTERVAL: u64 = 1000;

/// Work queue shared by the render workers. The receiver is dropped when
/// the last worker exits, so the producer's `send` fails instead of
/// blocking forever if every worker has died.
struct TileQueue {
    receiver: Mutex<Option<Receiver<TilePosition>>>,
    workers: AtomicUsize,
}

impl TileQueue {
    fn new(receiver: Receiver<TilePosition>, workers: usize) -> Self {
        Self {
            receiver: Mutex::new(Some(receiver)),
            workers: AtomicUsize::new(workers),
        }
    }

    fn next(&self) -> Option<TilePosition> {
        let receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
        receiver.as_ref()?.recv().ok()
    }
}

/// Held by each worker thread for its whole run, including unwinding.
struct WorkerGuard<'a>(&'a TileQueue);

impl Drop for WorkerGuard<'_> {
    fn drop(&mut self) {
        if self.0.workers.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.receiver.lock().unwrap_or_else(PoisonError::into_inner).take();
        }
    }
}

/// Path of a tile image under `root`.
pub fn tile_path(root: &Path, level: u32, tile: TilePosition) -> PathBuf {
    root.join(level.to_string())
        .join(tile.x.to_string())
        .join(format!("{}.png", tile.y))
}

pub struct Tiler {
    region: Region,
    zoom_levels: u32,
    tiles_root: PathBuf,
    stats: RenderStats,
}

impl Tiler {
    pub fn new(region: Region, zoom_levels: u32, tiles_root: impl Into<PathBuf>) -> Self {
        Self {
            region,
            zoom_levels,
            tiles_root: tiles_root.into(),
            stats: RenderStats::new(),
        }
    }

    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }

    pub fn tiles_root(&self) -> &Path {
        &self.tiles_root
    }

    /// Render every zoom-0 tile covering the region with `workers` threads,
    /// each owning a renderer built by `factory`.
    pub fn full_render<F>(&self, world: &World, workers: usize, factory: F) -> Result<StatsSnapshot>
    where
        F: Fn() -> Box<dyn Renderer> + Sync,
    {
        let workers = workers.max(1);
        let projected = factory().project_region(&self.region);
        let total = projected.tile_count();
        tracing::info!(
            "Rendering {} tiles (x {}..={}, y {}..={}) with {} workers",
            total,
            projected.x_bounds.min,
            projected.x_bounds.max,
            projected.y_bounds.min,
            projected.y_bounds.max,
            workers
        );

        for x in projected.x_bounds.min..=projected.x_bounds.max {
            let dir = self.tiles_root.join("0").join(x.to_string());
            fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        }

        let (tx, rx) = mpsc::sync_channel::<TilePosition>(workers * QUEUE_DEPTH);
        let queue = TileQueue::new(rx, workers);

        thread::scope(|scope| {
            for id in 0..workers {
                let queue = &queue;
                let factory = &factory;
                scope.spawn(move || {
                    let _guard = WorkerGuard(queue);
                    self.render_worker(id, world, queue, factory(), total);
                });
            }

            for tile in projected.positions() {
                if tx.send(tile).is_err() {
                    tracing::error!("All render workers exited, abandoning the queue");
                    break;
                }
            }
            drop(tx);
        });

        let snapshot = self.stats.snapshot();
        tracing::info!(
            "Full render done in {:.1}s: {} rendered, {} saved, {} empty, {} failed, {} sprites",
            snapshot.elapsed_secs,
            snapshot.tiles_rendered,
            snapshot.tiles_saved,
            snapshot.tiles_empty,
            snapshot.save_failures,
            snapshot.sprites_rasterized
        );
        Ok(snapshot)
    }

    fn render_worker(
        &self,
        id: usize,
        world: &World,
        queue: &TileQueue,
        mut renderer: Box<dyn Renderer>,
        total: u64,
    ) {
        while let Some(tile) = queue.next() {
            let buffer = renderer.render_tile(tile, world);
            let rendered = self.stats.tile_rendered();
            if rendered % PROGRESS_INTERVAL == 0 {
                tracing::info!("Rendered {}/{} tiles", rendered, total);
            }

            if !buffer.dirty {
                self.stats.tile_empty();
                continue;
            }

            let path = tile_path(&self.tiles_root, 0, tile);
            match save_png(&buffer.color, &path) {
                Ok(()) => {
                    tracing::debug!("Saved {}", path.display());
                    self.stats.tile_saved();
                }
                Err(e) => {
                    tracing::warn!("Failed to save tile ({}, {}): {:#}", tile.x, tile.y, e);
                    self.stats.save_failed();
                }
            }
        }

        let sprites = renderer.sprites_rasterized();
        self.stats.add_sprites(sprites);
        tracing::debug!("Worker {} finished, {} sprites rasterized", id, sprites);
    }

    /// Build levels `1..=zoom_levels` from the saved zoom-0 tiles.
    pub fn downscale_tiles(&self) -> Result<()> {
        let mut tiles = self.scan_level(0)?;
        tracing::info!("Downscaling {} base tiles into {} levels", tiles.len(), self.zoom_levels);

        for level in 1..=self.zoom_levels {
            let mut parents: Vec<TilePosition> = tiles.iter().map(TilePosition::parent).collect();
            parents.sort_unstable();
            parents.dedup();

            let mut columns: Vec<i64> = parents.iter().map(|p| p.x).collect();
            columns.dedup();
            for x in columns {
                let dir = self.tiles_root.join(level.to_string()).join(x.to_string());
                fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
            }

            let written = parents.par_iter().filter(|parent| self.downscale_tile(level, **parent)).count();
            tracing::info!("Zoom level {} saved: {} tiles", level, written);

            tiles = parents;
        }
        Ok(())
    }

    /// Compose one tile of `level` from its (up to four) children. Returns
    /// whether a tile was written.
    fn downscale_tile(&self, level: u32, parent: TilePosition) -> bool {
        let half = TILE_SIZE / 2;
        let mut target = RgbaImage::new(TILE_SIZE, TILE_SIZE);
        let mut children = 0;

        for qy in 0..2 {
            for qx in 0..2 {
                let path = tile_path(&self.tiles_root, level - 1, parent.child(qx, qy));
                if !path.exists() {
                    continue;
                }
                let child = match load_png(&path) {
                    Ok(child) => child,
                    Err(e) => {
                        tracing::warn!("Skipping unreadable tile: {:#}", e);
                        continue;
                    }
                };
                let small = imageops::resize(&child, half, half, FilterType::Lanczos3);
                imageops::replace(&mut target, &small, qx * half as i64, qy * half as i64);
                children += 1;
            }
        }

        if children == 0 {
            return false;
        }

        let path = tile_path(&self.tiles_root, level, parent);
        match save_png(&target, &path) {
            Ok(()) => {
                tracing::debug!("Saved {}", path.display());
                self.stats.tile_downscaled();
                true
            }
            Err(e) => {
                tracing::warn!("Failed to save tile {} ({}, {}): {:#}", level, parent.x, parent.y, e);
                self.stats.save_failed();
                false
            }
        }
    }

    /// Positions of every `{x}/{y}.png` present at `level`, sorted.
    fn scan_level(&self, level: u32) -> Result<Vec<TilePosition>> {
        let dir = self.tiles_root.join(level.to_string());
        let mut tiles = Vec::new();

        let columns = match fs::read_dir(&dir) {
            Ok(columns) => columns,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("No tiles found at {}", dir.display());
                return Ok(tiles);
            }
            Err(e) => return Err(e).with_context(|| format!("reading {}", dir.display())),
        };

        for column in columns {
            let column = column.with_context(|| format!("reading {}", dir.display()))?;
            let Some(x) = column.file_name().to_str().and_then(|s| s.parse::<i64>().ok()) else {
                continue;
            };
            let column_path = column.path();
            let entries = fs::read_dir(&column_path).with_context(|| format!("reading {}", column_path.display()))?;
            for entry in entries {
                let path = entry.with_context(|| format!("reading {}", column_path.display()))?.path();
                if !path.extension().is_some_and(|ext| ext == "png") {
                    continue;
                }
                let Some(y) = path.file_stem().and_then(|s| s.to_str()).and_then(|s| s.parse::<i64>().ok()) else {
                    continue;
                };
                tiles.push(TilePosition::new(x, y));
            }
        }

        tiles.sort_unstable();
        Ok(tiles)
    }
}
