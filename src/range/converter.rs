use tracing::warn;

use crate::geometry::RectF;
use crate::tile::Level;

use super::TileRange;

/// Maps world coordinates (m/z, scan index) to level-local tile-grid
/// coordinates and back.
///
/// Sample `i` of a level covers the bin centered at
/// `min + step / 2 + i * step`, so the continuous mapping is
/// `(w - (min + step / 2)) / step`. The `global_tile_*` lookups use the
/// converter's current level and snap to the bin that really contains the
/// value.
#[derive(Debug, Clone, PartialEq)]
pub struct TilePositionConverter {
    range: TileRange,
    current_level: Level,
}

impl TilePositionConverter {
    /// Converter over `range`, starting at level `(1, 1)`.
    pub fn new(range: TileRange) -> Self {
        Self {
            range,
            current_level: Level::ONE,
        }
    }

    pub fn range(&self) -> &TileRange {
        &self.range
    }

    pub fn current_level(&self) -> Level {
        self.current_level
    }

    pub fn set_current_level(&mut self, level: Level) {
        self.current_level = level;
    }

    /// Continuous level-local X; `0.0` when the range has no X step.
    pub fn world_to_level_x(&self, wx: f64, level: Level) -> f64 {
        let step = self.range.level_step_x(level);
        if step <= 0.0 {
            warn!(step, "World to level conversion without an X step");
            return 0.0;
        }
        (wx - (self.range.min_x + step * 0.5)) / step
    }

    /// Continuous level-local Y; `0.0` when the range has no Y step.
    pub fn world_to_level_y(&self, wy: f64, level: Level) -> f64 {
        let step = self.range.level_step_y(level);
        if step <= 0.0 {
            warn!(step, "World to level conversion without a Y step");
            return 0.0;
        }
        (wy - (self.range.min_y as f64 + step * 0.5)) / step
    }

    pub fn level_to_world_x(&self, x: i32, level: Level) -> f64 {
        let step = self.range.level_step_x(level);
        x as f64 * step + self.range.min_x + step * 0.5
    }

    pub fn level_to_world_y(&self, y: i32, level: Level) -> f64 {
        let step = self.range.level_step_y(level);
        y as f64 * step + self.range.min_y as f64 + step * 0.5
    }

    /// Map all four corners of a world rect into `level` coordinates.
    pub fn world_to_level_rect(&self, area: &RectF, level: Level) -> RectF {
        let x1 = self.world_to_level_x(area.left(), level);
        let x2 = self.world_to_level_x(area.right(), level);
        let y1 = self.world_to_level_y(area.top(), level);
        let y2 = self.world_to_level_y(area.bottom(), level);
        RectF::from_edges(x1, y1, x2, y2)
    }

    /// Global tile-grid column holding `mz` at the current level.
    pub fn global_tile_x(&self, mz: f64) -> i32 {
        let step = self.range.level_step_x(self.current_level);
        if step <= 0.0 {
            return 0;
        }

        let tile_x = ((mz - self.range.min_x) / step).floor() as i32;
        let lower = self.mz_at(tile_x);
        let upper = self.mz_at(tile_x + 1);
        snap_to_bin(tile_x, mz, lower, upper)
    }

    /// Global tile-grid row holding `scan_index` at the current level.
    pub fn global_tile_y(&self, scan_index: i64) -> i32 {
        let step = self.range.level_step_y(self.current_level);
        if step <= 0.0 {
            return 0;
        }

        let start = self.range.min_y as f64;
        let value = scan_index as f64;
        let tile_y = ((value - start) / step).floor() as i32;
        let lower = start + tile_y as f64 * step;
        let upper = start + (tile_y + 1) as f64 * step;
        snap_to_bin(tile_y, value, lower, upper)
    }

    /// Lower m/z edge of column `global_tile_x` at the current level.
    pub fn mz_at(&self, global_tile_x: i32) -> f64 {
        self.range.min_x + global_tile_x as f64 * self.range.level_step_x(self.current_level)
    }

    /// First scan index of row `global_tile_y` at the current level.
    pub fn scan_index_at(&self, global_tile_y: i32) -> i64 {
        let step = self.range.level_step_y(self.current_level);
        (self.range.min_y as f64 + global_tile_y as f64 * step) as i64
    }
}

/// Correct a floor-based bin index when rounding put `value` on the wrong
/// side of a bin edge.
fn snap_to_bin(index: i32, value: f64, lower: f64, upper: f64) -> i32 {
    if lower <= value && value < upper {
        index
    } else if value < lower {
        index - 1
    } else if value >= upper {
        index + 1
    } else {
        warn!("Unexpected bin lookup for value {}", value);
        index
    }
}
