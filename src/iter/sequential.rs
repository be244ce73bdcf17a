use tracing::warn;

use crate::geometry::{Point, Rect};
use crate::manager::TileManager;
use crate::tile::{Level, DEFAULT_TILE_VALUE};

use super::RandomTileIterator;

/// Visits every cell of a grid rect exactly once.
///
/// Traversal is tile by tile: the part of the area inside one tile is read
/// row by row before moving to the next tile on the right, and tile rows
/// are taken top to bottom. Each tile is therefore fetched once. The last
/// cell visited is always the bottom-right cell of the area.
///
/// ```text
///   area spanning two tiles:
///   ┌──────────┬──────────┐
///   │ 1 → → →  │ 4 → → →  │
///   │ 2 → → →  │ 5 → → →  │
///   │ 3 → → →  │ 6 → → →  │
///   └──────────┴──────────┘
/// ```
///
/// The first [`advance`](Self::advance) reads the top-left cell without
/// moving; every later call moves one cell.
pub struct SequentialTileIterator<'a> {
    area: Rect,
    level: Level,
    iterator: RandomTileIterator<'a>,
    tile_x: i32,
    tile_y: i32,
    end: Point,
    first_done: bool,
    last_value: f64,
}

impl<'a> SequentialTileIterator<'a> {
    pub fn new(manager: &'a TileManager<'a>, area: Rect, level: Level) -> Self {
        Self {
            area,
            level,
            iterator: RandomTileIterator::new(manager),
            tile_x: area.x,
            tile_y: area.y,
            end: area.bottom_right(),
            first_done: false,
            last_value: DEFAULT_TILE_VALUE,
        }
    }

    /// True while cells remain to visit.
    pub fn has_next(&self) -> bool {
        if self.area.is_empty() {
            return false;
        }
        !self.first_done || Point::new(self.tile_x, self.tile_y) != self.end
    }

    /// Move to the next cell and read it.
    pub fn advance(&mut self) {
        if !self.has_next() {
            warn!(area = ?self.area, "Trying to advance beyond the tile area");
            return;
        }

        if !self.first_done {
            self.first_done = true;
            self.read();
            return;
        }

        let remaining_tile_cols = self.iterator.num_contiguous_cols(self.tile_x) - 1;
        let remaining_area_cols = self.area.width - (self.tile_x - self.area.x) - 1;

        if remaining_tile_cols.min(remaining_area_cols) > 0 {
            self.tile_x += 1;
        } else {
            let remaining_tile_rows = self.iterator.num_contiguous_rows(self.tile_y) - 1;
            let remaining_area_rows = self.area.height - (self.tile_y - self.area.y) - 1;

            if remaining_tile_rows.min(remaining_area_rows) > 0 {
                // Next row inside the current tile.
                self.tile_x = TileManager::normalize_x(self.tile_x).max(self.area.x);
                self.tile_y += 1;
            } else if remaining_area_cols > 0 {
                // Next tile to the right, back to its first row.
                self.tile_x += 1;
                self.tile_y = TileManager::normalize_y(self.tile_y).max(self.area.y);
            } else {
                // Next row of tiles.
                self.tile_x = self.area.x;
                self.tile_y += 1;
            }
        }

        self.read();
    }

    /// Value of the current cell.
    pub fn value(&self) -> f64 {
        self.last_value
    }

    /// Grid X of the current cell.
    pub fn x(&self) -> i32 {
        self.tile_x
    }

    /// Grid Y of the current cell.
    pub fn y(&self) -> i32 {
        self.tile_y
    }

    pub fn area(&self) -> Rect {
        self.area
    }

    pub fn level(&self) -> Level {
        self.level
    }

    fn read(&mut self) {
        self.iterator.move_to(self.level, self.tile_x, self.tile_y);
        self.last_value = self.iterator.value();
    }
}

impl Iterator for SequentialTileIterator<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if !self.has_next() {
            return None;
        }
        self.advance();
        Some(self.last_value)
    }
}
