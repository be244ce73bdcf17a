//! Test utilities for integration tests.
//!
//! This module provides a store wrapper that counts reads and helpers for
//! building small pyramids.

use std::sync::atomic::{AtomicUsize, Ordering};

use mz_tiles::{
    FnDataProvider, Level, MemoryStore, Point, Rect, Tile, TileBuilder, TileError, TileKey,
    TileRange, TileStore,
};

// =============================================================================
// Tracking Store
// =============================================================================

/// A memory store that counts every `load_tile` call.
///
/// This is useful for verifying iterator cache behavior.
#[derive(Default)]
pub struct TrackingStore {
    inner: MemoryStore,
    loads: AtomicUsize,
}

impl TrackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn reset_tracking(&self) {
        self.loads.store(0, Ordering::SeqCst);
    }
}

impl TileStore for TrackingStore {
    fn save_tile(&self, tile: &Tile) -> Result<bool, TileError> {
        self.inner.save_tile(tile)
    }

    fn load_tile(&self, level: Level, pos: Point) -> Result<Tile, TileError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load_tile(level, pos)
    }

    fn contains(&self, level: Level, pos: Point) -> Result<bool, TileError> {
        self.inner.contains(level, pos)
    }

    fn boundary(&self, level: Level) -> Result<Rect, TileError> {
        self.inner.boundary(level)
    }

    fn available_levels(&self) -> Result<Vec<Level>, TileError> {
        self.inner.available_levels()
    }

    fn start(&self) -> Result<(), TileError> {
        self.inner.start()
    }

    fn end(&self) -> Result<(), TileError> {
        self.inner.end()
    }

    fn rollback(&self) -> Result<(), TileError> {
        self.inner.rollback()
    }

    fn clear(&self) -> Result<(), TileError> {
        self.inner.clear()
    }

    fn save_tile_part(&self, key: TileKey, data: &[f64]) -> Result<(), TileError> {
        self.inner.save_tile_part(key, data)
    }

    fn finalize_tile_parts(&self) -> Result<usize, TileError> {
        self.inner.finalize_tile_parts()
    }

    fn pending_tile_parts(&self) -> Result<usize, TileError> {
        self.inner.pending_tile_parts()
    }
}

// =============================================================================
// Data Helpers
// =============================================================================

/// Sample value that encodes its own grid position.
pub fn gradient(x: i32, y: i32) -> f64 {
    (x + 1000 * y) as f64
}

/// A range of `width x height` level-1 samples with unit steps.
pub fn unit_range(width: i32, height: i32) -> TileRange {
    TileRange::with_steps(0.0, (width - 1) as f64, 1.0, 0, (height - 1) as i64, 1)
        .expect("valid test range")
}

/// Fill level 1 of `store` with [`gradient`] values.
pub fn build_gradient_level1(store: &dyn TileStore, range: TileRange) {
    TileBuilder::new(range)
        .build_level1_tiles(store, &mut FnDataProvider::new(gradient))
        .expect("level 1 build");
}

/// Store one tile at `(level, x, y)` holding `value` everywhere.
pub fn put_filled(store: &dyn TileStore, level: Level, x: i32, y: i32, value: f64) {
    let tile = Tile::filled(TileKey::new(level, Point::new(x, y)), value);
    store.save_tile(&tile).expect("save tile");
}
