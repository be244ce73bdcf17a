//! Tiles: the unit of storage.
//!
//! A [`Tile`] is a fixed 64×64 grid of intensity samples plus the
//! [`TileKey`] that places it in the pyramid. Tiles are immutable once
//! built; new data means a new tile.
//!
//! # Components
//!
//! - [`Level`]: per-axis mip-map level, `(1, 1)` is full resolution
//! - [`TileKey`]: level plus the tile's top-left corner in grid coordinates
//! - [`Tile`]: the sample buffer, including the null "not present" tile
//! - [`SerializeFormat`]: raw or zlib-compressed byte layout used by stores

mod codec;
mod key;
mod tile_data;

pub use codec::{deserialize, serialize, try_deserialize, SerializeFormat};
pub use key::{Level, TileKey};
pub use tile_data::{save_tile_to_file, Tile};

/// Tile edge length along X, in samples.
pub const TILE_WIDTH: i32 = 64;

/// Tile edge length along Y, in samples.
pub const TILE_HEIGHT: i32 = 64;

/// Number of samples in one tile.
pub const TILE_SAMPLES: usize = (TILE_WIDTH * TILE_HEIGHT) as usize;

/// Value reported for positions that fall in a missing tile.
pub const DEFAULT_TILE_VALUE: f64 = 0.0;
