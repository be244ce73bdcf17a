//! Tile-grid facade over a [`TileStore`].
//!
//! [`TileManager`] adds grid arithmetic on top of a store: aligning
//! positions to tile origins, fetching every tile under a rect, and
//! materializing a rect into a dense row-major buffer.
//!
//! Grid coordinates may be negative; column and row lookups use floor
//! division so `-1` belongs to the tile starting at `-64`.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::TileError;
use crate::geometry::{Point, Rect};
use crate::iter::RandomTileIterator;
use crate::raster::TileRaster;
use crate::store::TileStore;
use crate::tile::{Level, Tile, TileKey, TILE_HEIGHT, TILE_WIDTH};

/// Facade combining a store with tile-grid arithmetic.
pub struct TileManager<'a> {
    store: &'a dyn TileStore,
    access_log: Option<Arc<TileAccessLog>>,
}

impl<'a> TileManager<'a> {
    pub fn new(store: &'a dyn TileStore) -> Self {
        Self {
            store,
            access_log: None,
        }
    }

    /// Count every tile fetch in `log`.
    pub fn with_access_log(mut self, log: Arc<TileAccessLog>) -> Self {
        self.access_log = Some(log);
        self
    }

    pub fn store(&self) -> &'a dyn TileStore {
        self.store
    }

    pub fn access_log(&self) -> Option<&Arc<TileAccessLog>> {
        self.access_log.as_ref()
    }

    // =========================================================================
    // Grid arithmetic
    // =========================================================================

    /// Column index of the tile holding grid position `x`.
    pub fn x_to_column(x: i32) -> i32 {
        x.div_euclid(TILE_WIDTH)
    }

    /// Row index of the tile holding grid position `y`.
    pub fn y_to_row(y: i32) -> i32 {
        y.div_euclid(TILE_HEIGHT)
    }

    /// Origin X of the tile holding `x`.
    pub fn normalize_x(x: i32) -> i32 {
        Self::x_to_column(x) * TILE_WIDTH
    }

    /// Origin Y of the tile holding `y`.
    pub fn normalize_y(y: i32) -> i32 {
        Self::y_to_row(y) * TILE_HEIGHT
    }

    /// Smallest tile-aligned rect containing `rc`.
    pub fn normalize_rect(rc: &Rect) -> Rect {
        let left = Self::normalize_x(rc.left());
        let top = Self::normalize_y(rc.top());
        let right = Self::normalize_x(rc.right()) + TILE_WIDTH - 1;
        let bottom = Self::normalize_y(rc.bottom()) + TILE_HEIGHT - 1;
        Rect::from_corners(Point::new(left, top), Point::new(right, bottom))
    }

    /// Number of tile columns touched by `width` positions starting at `x`.
    pub fn tile_columns(x: i32, width: i32) -> i32 {
        if width <= 0 {
            return 0;
        }
        Self::x_to_column(x + width - 1) - Self::x_to_column(x) + 1
    }

    /// Number of tile rows touched by `height` positions starting at `y`.
    pub fn tile_rows(y: i32, height: i32) -> i32 {
        if height <= 0 {
            return 0;
        }
        Self::y_to_row(y + height - 1) - Self::y_to_row(y) + 1
    }

    /// Number of tile columns stored at `level`.
    pub fn column_count(&self, level: Level) -> Result<i32, TileError> {
        Ok(self.store.boundary(level)?.width / TILE_WIDTH)
    }

    /// Number of tile rows stored at `level`.
    pub fn row_count(&self, level: Level) -> Result<i32, TileError> {
        Ok(self.store.boundary(level)?.height / TILE_HEIGHT)
    }

    // =========================================================================
    // Fetch / insert
    // =========================================================================

    /// Tile holding grid position `(x, y)` at `level`.
    pub fn fetch_tile(&self, level: Level, x: i32, y: i32) -> Result<Tile, TileError> {
        let pos = Point::new(Self::normalize_x(x), Self::normalize_y(y));
        self.fetch_tile_key(TileKey::new(level, pos))
    }

    /// Tile stored at an aligned key.
    pub fn fetch_tile_key(&self, key: TileKey) -> Result<Tile, TileError> {
        if let Some(log) = &self.access_log {
            log.record(key);
        }
        self.store.load_tile(key.level, key.pos)
    }

    /// Every tile intersecting `area`, row by row. Missing tiles come back
    /// as null tiles so the result always has one entry per grid cell.
    pub fn fetch_tiles(&self, level: Level, area: &Rect) -> Result<Vec<Tile>, TileError> {
        if area.is_empty() {
            return Ok(Vec::new());
        }

        let first_column = Self::x_to_column(area.left());
        let last_column = Self::x_to_column(area.right());
        let first_row = Self::y_to_row(area.top());
        let last_row = Self::y_to_row(area.bottom());

        let mut tiles = Vec::with_capacity(
            ((last_column - first_column + 1) * (last_row - first_row + 1)) as usize,
        );
        for row in first_row..=last_row {
            for column in first_column..=last_column {
                let pos = Point::new(column * TILE_WIDTH, row * TILE_HEIGHT);
                tiles.push(self.fetch_tile_key(TileKey::new(level, pos))?);
            }
        }
        Ok(tiles)
    }

    /// Save every non-null tile. Returns how many were newly stored.
    pub fn insert_tiles(&self, tiles: &[Tile]) -> Result<usize, TileError> {
        let mut stored = 0;
        for tile in tiles.iter().filter(|t| !t.is_null()) {
            if self.store.save_tile(tile)? {
                stored += 1;
            }
        }
        Ok(stored)
    }

    pub fn clear_tiles(&self) -> Result<(), TileError> {
        self.store.clear()
    }

    // =========================================================================
    // Materialization
    // =========================================================================

    /// Fill `buffer` (row-major, `area.width * area.height` values) with the
    /// samples of `area` at `level`. Missing tiles read as the default
    /// value.
    pub fn write(&self, level: Level, area: &Rect, buffer: &mut [f64]) -> Result<(), TileError> {
        let expected = area.size().area();
        if buffer.len() != expected {
            return Err(TileError::BufferSize {
                expected,
                actual: buffer.len(),
            });
        }
        if expected == 0 {
            return Ok(());
        }

        debug!(level = %level, area = ?area, "Writing tile area to buffer");

        let width = area.width as usize;
        let mut iterator = RandomTileIterator::new(self);

        let mut rows_remaining = area.height;
        let mut buffer_y = 0;
        let mut tile_y = area.y;
        while rows_remaining > 0 {
            let rows_to_work = iterator.num_contiguous_rows(tile_y).min(rows_remaining);

            let mut columns_remaining = area.width;
            let mut buffer_x = 0;
            let mut tile_x = area.x;
            while columns_remaining > 0 {
                let columns_to_work = iterator.num_contiguous_cols(tile_x).min(columns_remaining);

                for row in 0..rows_to_work {
                    let offset = (buffer_y + row) as usize * width + buffer_x as usize;
                    for col in 0..columns_to_work {
                        iterator.move_to(level, tile_x + col, tile_y + row);
                        buffer[offset + col as usize] = iterator.value();
                    }
                }

                tile_x += columns_to_work;
                buffer_x += columns_to_work;
                columns_remaining -= columns_to_work;
            }

            tile_y += rows_to_work;
            buffer_y += rows_to_work;
            rows_remaining -= rows_to_work;
        }
        Ok(())
    }

    /// Fill an allocated raster from `level`.
    pub fn write_raster(&self, level: Level, raster: &mut TileRaster) -> Result<(), TileError> {
        let area = raster.tile_area();
        self.write(level, &area, raster.data_mut())
    }
}

/// Per-key fetch counter, shareable between managers.
#[derive(Debug, Default)]
pub struct TileAccessLog {
    counts: Mutex<HashMap<TileKey, u64>>,
}

impl TileAccessLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, key: TileKey) {
        *self.counts.lock().entry(key).or_insert(0) += 1;
    }

    pub fn count(&self, key: &TileKey) -> u64 {
        self.counts.lock().get(key).copied().unwrap_or(0)
    }

    /// Total fetches over all keys.
    pub fn total(&self) -> u64 {
        self.counts.lock().values().sum()
    }

    /// Counts ordered by level, then position.
    pub fn snapshot(&self) -> Vec<(TileKey, u64)> {
        let mut entries: Vec<_> = self.counts.lock().iter().map(|(k, v)| (*k, *v)).collect();
        entries.sort_by_key(|(k, _)| (k.level, k.pos));
        entries
    }

    pub fn clear(&self) {
        self.counts.lock().clear();
    }

    /// Write the snapshot as CSV with a `levelX,levelY,posX,posY,AccessCount`
    /// header.
    pub fn write_csv<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        writeln!(out, "levelX,levelY,posX,posY,AccessCount")?;
        for (key, count) in self.snapshot() {
            writeln!(
                out,
                "{},{},{},{},{}",
                key.level.x, key.level.y, key.pos.x, key.pos.y, count
            )?;
        }
        out.flush()
    }
}
