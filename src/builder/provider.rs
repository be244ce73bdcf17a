use crate::error::TileError;
use crate::geometry::{Point, Rect};
use crate::manager::TileManager;
use crate::tile::{TILE_HEIGHT, TILE_SAMPLES, TILE_WIDTH};

/// Source of level-1 samples for [`TileBuilder`](super::TileBuilder).
pub trait TileDataProvider {
    /// Samples for one tile-aligned grid rect, as `TILE_SAMPLES` row-major
    /// values relative to the tile origin.
    fn fetch_tile_data(&mut self, tile_area: &Rect) -> Result<Vec<f64>, TileError>;
}

/// Build a tile buffer by sampling `f(x, y)` at every grid cell of
/// `tile_area` that falls inside the tile holding its top-left corner.
/// Cells outside `tile_area` stay zero.
pub fn sample_tile_area(tile_area: &Rect, mut f: impl FnMut(i32, i32) -> f64) -> Vec<f64> {
    let mut data = vec![0.0; TILE_SAMPLES];

    let origin = Point::new(
        TileManager::normalize_x(tile_area.x),
        TileManager::normalize_y(tile_area.y),
    );
    let tile = Rect::new(origin.x, origin.y, TILE_WIDTH, TILE_HEIGHT);
    let Some(area) = tile.intersected(tile_area) else {
        return data;
    };

    for y in area.top()..=area.bottom() {
        let row = ((y - origin.y) * TILE_WIDTH) as usize;
        for x in area.left()..=area.right() {
            data[row + (x - origin.x) as usize] = f(x, y);
        }
    }
    data
}

/// Procedural checkerboard of `1.0` and `0.0` cells.
///
/// Cell `(col, row)` of size `checker_width × checker_height` is high when
/// `col` and `row` have the same parity. Grid positions are shifted by the
/// offset before lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckerDataProvider {
    checker_width: f64,
    checker_height: f64,
    offset_x: f64,
    offset_y: f64,
}

impl CheckerDataProvider {
    pub const HIGH: f64 = 1.0;
    pub const LOW: f64 = 0.0;

    pub fn new(checker_width: f64, checker_height: f64) -> Self {
        Self {
            checker_width,
            checker_height,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }

    pub fn with_offset(mut self, offset_x: f64, offset_y: f64) -> Self {
        self.offset_x = offset_x;
        self.offset_y = offset_y;
        self
    }

    /// Checker value at a shifted grid position.
    pub fn value(&self, wx: f64, wy: f64) -> f64 {
        let col = (wx / self.checker_width).floor() as i64;
        let row = (wy / self.checker_height).floor() as i64;
        if col.rem_euclid(2) == row.rem_euclid(2) {
            Self::HIGH
        } else {
            Self::LOW
        }
    }
}

impl TileDataProvider for CheckerDataProvider {
    fn fetch_tile_data(&mut self, tile_area: &Rect) -> Result<Vec<f64>, TileError> {
        if !(self.checker_width > 0.0 && self.checker_height > 0.0) {
            return Err(TileError::InvalidRange(format!(
                "checker size must be positive, got {}x{}",
                self.checker_width, self.checker_height
            )));
        }
        Ok(sample_tile_area(tile_area, |x, y| {
            self.value(x as f64 + self.offset_x, y as f64 + self.offset_y)
        }))
    }
}

/// Provider backed by a closure over global grid positions.
pub struct FnDataProvider<F> {
    sample: F,
}

impl<F: FnMut(i32, i32) -> f64> FnDataProvider<F> {
    pub fn new(sample: F) -> Self {
        Self { sample }
    }
}

impl<F: FnMut(i32, i32) -> f64> TileDataProvider for FnDataProvider<F> {
    fn fetch_tile_data(&mut self, tile_area: &Rect) -> Result<Vec<f64>, TileError> {
        Ok(sample_tile_area(tile_area, &mut self.sample))
    }
}
