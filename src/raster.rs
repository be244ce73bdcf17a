//! Dense rectangular buffer of grid samples.
//!
//! A [`TileRaster`] covers a rect of grid cells at one level and keeps the
//! converter needed to map its cells back to world coordinates. It is the
//! usual target of [`TileManager::write_raster`](crate::manager::TileManager::write_raster).

use tracing::warn;

use crate::error::TileError;
use crate::geometry::Rect;
use crate::range::{TilePositionConverter, TileRange};
use crate::tile::DEFAULT_TILE_VALUE;

/// Geometry of a raster without its samples.
#[derive(Debug, Clone, PartialEq)]
pub struct TileRasterInfo {
    pub converter: TilePositionConverter,
    pub tile_area: Rect,
}

/// Row-major sample buffer over a grid rect.
///
/// The buffer starts empty; call [`allocate_tile_area`](Self::allocate_tile_area)
/// before filling it.
#[derive(Debug, Clone)]
pub struct TileRaster {
    tile_area: Rect,
    converter: TilePositionConverter,
    data: Vec<f64>,
}

impl TileRaster {
    pub fn new(tile_area: Rect, range: TileRange) -> Self {
        Self {
            tile_area,
            converter: TilePositionConverter::new(range),
            data: Vec::new(),
        }
    }

    /// Size the buffer to the area, zero-filled.
    ///
    /// Reservation failure is reported as [`TileError::Allocation`] and
    /// leaves the raster empty.
    pub fn allocate_tile_area(&mut self) -> Result<(), TileError> {
        let requested = self.tile_area.size().area();
        self.data.clear();
        if let Err(e) = self.data.try_reserve_exact(requested) {
            warn!(area = ?self.tile_area, "Raster allocation failed: {}", e);
            return Err(TileError::Allocation { requested });
        }
        self.data.resize(requested, 0.0);
        Ok(())
    }

    /// Sample at grid position `(tile_x, tile_y)`.
    ///
    /// Positions outside the raster, or an unallocated raster, read as
    /// [`DEFAULT_TILE_VALUE`] with a warning.
    pub fn value(&self, tile_x: i32, tile_y: i32) -> f64 {
        if !self.tile_area.contains(tile_x, tile_y) {
            warn!(tile_x, tile_y, area = ?self.tile_area, "Raster read outside its area");
            return DEFAULT_TILE_VALUE;
        }

        let ix = (tile_x - self.tile_area.x) as usize;
        let iy = (tile_y - self.tile_area.y) as usize;
        match self.data.get(iy * self.tile_area.width as usize + ix) {
            Some(v) => *v,
            None => {
                warn!(tile_x, tile_y, "Raster read before allocation");
                DEFAULT_TILE_VALUE
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Release the samples; the area is kept.
    pub fn clear(&mut self) {
        self.data = Vec::new();
    }

    pub fn tile_area(&self) -> Rect {
        self.tile_area
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn converter(&self) -> &TilePositionConverter {
        &self.converter
    }

    pub fn range(&self) -> &TileRange {
        self.converter.range()
    }

    pub fn info(&self) -> TileRasterInfo {
        TileRasterInfo {
            converter: self.converter.clone(),
            tile_area: self.tile_area,
        }
    }
}
