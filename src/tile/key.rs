//! Pyramid coordinates of a tile.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

/// Mip-map level, tracked per axis.
///
/// Level `(1, 1)` is full resolution. Each increment of an axis halves the
/// resolution along that axis only, so `(3, 1)` is downsampled four times
/// along X and untouched along Y (rip-mapping).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Level {
    pub x: i32,
    pub y: i32,
}

impl Level {
    /// Full resolution on both axes.
    pub const ONE: Level = Level { x: 1, y: 1 };

    /// Sentinel used by the null tile.
    pub const NULL: Level = Level { x: -1, y: -1 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Same level on both axes.
    pub const fn uniform(level: i32) -> Self {
        Self { x: level, y: level }
    }

    pub fn is_valid(&self) -> bool {
        *self != Level::NULL
    }

    /// Downsampling factor relative to level 1 along X.
    pub fn scale_x(&self) -> f64 {
        2f64.powi(self.x - 1)
    }

    /// Downsampling factor relative to level 1 along Y.
    pub fn scale_y(&self) -> f64 {
        2f64.powi(self.y - 1)
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::ONE
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl FromStr for Level {
    type Err = String;

    /// Parses `"X,Y"` or a single `"N"` meaning `(N, N)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<i32>()
                .map_err(|e| format!("invalid level component '{}': {}", part.trim(), e))
        };

        let level = match s.split_once(',') {
            Some((x, y)) => Level::new(parse(x)?, parse(y)?),
            None => Level::uniform(parse(s)?),
        };

        if level.x < 1 || level.y < 1 {
            return Err(format!("levels start at 1, got {}", level));
        }
        Ok(level)
    }
}

/// Identifies one stored tile: its level and the top-left corner in that
/// level's global tile-grid coordinates.
///
/// `pos` is always a multiple of the tile edge length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileKey {
    pub level: Level,
    pub pos: Point,
}

impl TileKey {
    /// Key carried by the null tile.
    pub const NULL: TileKey = TileKey {
        level: Level::NULL,
        pos: Point { x: 0, y: 0 },
    };

    pub const fn new(level: Level, pos: Point) -> Self {
        Self { level, pos }
    }

    pub fn is_valid(&self) -> bool {
        self.level.is_valid()
    }
}

impl Default for TileKey {
    fn default() -> Self {
        TileKey::NULL
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TileKey(level {}, pos ({}, {}))",
            self.level, self.pos.x, self.pos.y
        )
    }
}
