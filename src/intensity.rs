//! Minimum and maximum intensity over grid areas.
//!
//! [`IntensityRange`] is an associative reduction, so partial results from
//! independent workers can be merged in any order.
//! [`scan_partitioned`] splits an area into horizontal bands and scans them
//! in parallel with rayon. Each worker opens its own store handle and runs
//! its own iterator; nothing is shared between workers.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TileError;
use crate::geometry::Rect;
use crate::iter::SequentialTileIterator;
use crate::manager::TileManager;
use crate::range::TileRange;
use crate::store::TileStore;
use crate::tile::Level;

/// Smallest and largest value seen. Empty until the first value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntensityRange {
    pub min: f64,
    pub max: f64,
}

impl IntensityRange {
    pub const EMPTY: IntensityRange = IntensityRange {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
    };

    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    pub fn include(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn include_all(&mut self, values: &[f64]) {
        for v in values {
            self.include(*v);
        }
    }

    pub fn merge(self, other: IntensityRange) -> IntensityRange {
        IntensityRange {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Copy into the range's intensity bounds. An empty range leaves them
    /// untouched.
    pub fn apply_to(&self, range: &mut TileRange) {
        if !self.is_empty() {
            range.min_intensity = self.min;
            range.max_intensity = self.max;
        }
    }
}

impl Default for IntensityRange {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Scan every cell of `area` at `level`. Missing tiles count as the
/// default value.
pub fn scan_area(manager: &TileManager<'_>, level: Level, area: &Rect) -> IntensityRange {
    let mut result = IntensityRange::EMPTY;
    for value in SequentialTileIterator::new(manager, *area, level) {
        result.include(value);
    }
    result
}

/// Scan `area` in up to `partitions` row bands on the rayon pool.
///
/// `open_store` is called once per band and must return an independent
/// handle.
pub fn scan_partitioned<S, F>(
    open_store: F,
    level: Level,
    area: &Rect,
    partitions: usize,
) -> Result<IntensityRange, TileError>
where
    S: TileStore,
    F: Fn() -> Result<S, TileError> + Sync,
{
    let bands = split_rows(area, partitions.max(1));
    debug!(bands = bands.len(), area = ?area, "Scanning intensity range");

    let partial = bands
        .par_iter()
        .map(|band| {
            let store = open_store()?;
            let manager = TileManager::new(&store);
            Ok(scan_area(&manager, level, band))
        })
        .collect::<Result<Vec<_>, TileError>>()?;

    Ok(partial
        .into_iter()
        .fold(IntensityRange::EMPTY, IntensityRange::merge))
}

/// Disjoint full-width bands covering `area`.
fn split_rows(area: &Rect, partitions: usize) -> Vec<Rect> {
    if area.is_empty() {
        return Vec::new();
    }

    let rows_per_band = (area.height as usize).div_ceil(partitions) as i32;
    let mut bands = Vec::with_capacity(partitions);
    let mut y = area.y;
    while y <= area.bottom() {
        let height = rows_per_band.min(area.bottom() - y + 1);
        bands.push(Rect::new(area.x, y, area.width, height));
        y += height;
    }
    bands
}
