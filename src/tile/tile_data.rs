use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::TileError;
use crate::geometry::Point;

use super::codec::{self, SerializeFormat};
use super::key::{Level, TileKey};
use super::{TILE_HEIGHT, TILE_SAMPLES, TILE_WIDTH};

/// Fixed-size grid of `TILE_WIDTH * TILE_HEIGHT` samples and its pyramid
/// coordinates.
///
/// Tiles are immutable. The sample buffer is reference counted, so cloning
/// a tile into a cache is cheap and never aliases mutable state.
///
/// The null tile (see [`Tile::null`]) stands for "not present". It is
/// distinct from a tile full of zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    key: TileKey,
    data: Arc<[f64]>,
}

impl Tile {
    /// Create a tile from exactly `TILE_SAMPLES` row-major values.
    ///
    /// # Panics
    ///
    /// Panics if `data` does not hold `TILE_SAMPLES` values. Use
    /// [`Tile::try_new`] for data coming from outside the crate.
    pub fn new(key: TileKey, data: Vec<f64>) -> Self {
        assert_eq!(
            data.len(),
            TILE_SAMPLES,
            "tile {} needs {} samples",
            key,
            TILE_SAMPLES
        );
        Self {
            key,
            data: data.into(),
        }
    }

    /// Create a tile, rejecting buffers of the wrong length.
    pub fn try_new(key: TileKey, data: Vec<f64>) -> Result<Self, TileError> {
        if data.len() != TILE_SAMPLES {
            return Err(TileError::CorruptData(format!(
                "tile {} has {} samples, expected {}",
                key,
                data.len(),
                TILE_SAMPLES
            )));
        }
        Ok(Self::new(key, data))
    }

    /// Convenience constructor from level and position.
    pub fn at(level: Level, pos: Point, data: Vec<f64>) -> Self {
        Self::new(TileKey::new(level, pos), data)
    }

    /// A tile with every sample set to `value`.
    pub fn filled(key: TileKey, value: f64) -> Self {
        Self::new(key, vec![value; TILE_SAMPLES])
    }

    /// The "not present" sentinel.
    pub fn null() -> Self {
        Self {
            key: TileKey::NULL,
            data: Arc::from(Vec::<f64>::new()),
        }
    }

    pub fn is_null(&self) -> bool {
        !self.key.is_valid() && self.data.is_empty()
    }

    pub fn key(&self) -> TileKey {
        self.key
    }

    pub fn level(&self) -> Level {
        self.key.level
    }

    pub fn pos(&self) -> Point {
        self.key.pos
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Sample at tile-local coordinates.
    ///
    /// # Panics
    ///
    /// Panics if the tile is null or `(x, y)` lies outside the tile.
    pub fn value(&self, x: i32, y: i32) -> f64 {
        assert!(!self.is_null(), "value requested from the null tile");
        assert!(
            (0..TILE_WIDTH).contains(&x) && (0..TILE_HEIGHT).contains(&y),
            "({}, {}) is outside the tile",
            x,
            y
        );
        self.data[(y * TILE_WIDTH + x) as usize]
    }

    /// Sample at tile-local coordinates, `None` when out of bounds or null.
    pub fn get(&self, x: i32, y: i32) -> Option<f64> {
        if self.is_null() || !(0..TILE_WIDTH).contains(&x) || !(0..TILE_HEIGHT).contains(&y) {
            return None;
        }
        self.data.get((y * TILE_WIDTH + x) as usize).copied()
    }

    pub fn serialize(&self, format: SerializeFormat) -> Bytes {
        codec::serialize(&self.data, format)
    }

    /// Decode a sample buffer; empty when the stream is short or corrupt.
    pub fn deserialize(input: &[u8], format: SerializeFormat) -> Vec<f64> {
        codec::deserialize(input, format)
    }

    /// Elementwise `self - other`, keyed like `other`.
    ///
    /// The null tile when either side is null.
    pub fn difference(&self, other: &Tile) -> Tile {
        if self.is_null() || other.is_null() || self.data.len() != other.data.len() {
            return Tile::null();
        }
        let data = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a - b)
            .collect::<Vec<_>>();
        Tile::new(other.key, data)
    }

    /// Tile-local positions whose samples differ exactly.
    pub fn different_cells(&self, other: &Tile) -> Vec<Point> {
        let mut cells = Vec::new();
        for y in 0..TILE_HEIGHT {
            for x in 0..TILE_WIDTH {
                let idx = (y * TILE_WIDTH + x) as usize;
                if self.data.get(idx) != other.data.get(idx) {
                    cells.push(Point::new(x, y));
                }
            }
        }
        cells
    }

    /// Write the samples as `TILE_HEIGHT` lines of `;`-terminated values.
    pub fn write_csv<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        for row in self.data.chunks(TILE_WIDTH as usize) {
            for value in row {
                write!(out, "{};", value)?;
            }
            writeln!(out)?;
        }
        out.flush()
    }
}

impl Default for Tile {
    fn default() -> Self {
        Tile::null()
    }
}

/// Dump a tile's samples to a text file, see [`Tile::write_csv`].
pub fn save_tile_to_file(tile: &Tile, path: impl AsRef<Path>) -> Result<(), TileError> {
    let file = File::create(path.as_ref())?;
    tile.write_csv(BufWriter::new(file))?;
    Ok(())
}
