//! # mz-tiles
//!
//! Multi-resolution tile pyramids for mass-spectrometry intensity maps.
//!
//! An intensity map is a 2D grid of `f64` samples: m/z along X, scan index
//! along Y. The grid is cut into 64×64 [`Tile`]s and stored at several
//! resolutions so that any zoom level can be rendered without touching the
//! full-resolution data.
//!
//! ## Features
//!
//! - **Rip-map pyramid**: levels are tracked per axis, so X and Y can be
//!   downsampled independently
//! - **Pluggable storage**: in-memory and SQLite [`TileStore`] backends,
//!   with no-overwrite semantics and transactional batches
//! - **Cached access**: random, sequential and bilinear iterators over the
//!   grid with a bounded, position-aware tile cache
//! - **Parallel reductions**: min/max intensity scans split over rayon
//!   workers, each with its own store handle
//!
//! ## Architecture
//!
//! - [`tile`] - tile, key, level and the byte codec
//! - [`range`] - world domain and world/grid conversion
//! - [`store`] - storage trait and backends
//! - [`manager`] - tile lookup by grid position
//! - [`iter`] - cached sample iterators
//! - [`raster`] - dense sample buffers
//! - [`builder`] - pyramid construction
//! - [`intensity`] - min/max reductions
//! - [`config`] - CLI types for the `mz-tiles` binary
//!
//! ## Example
//!
//! ```rust,no_run
//! use mz_tiles::{
//!     CheckerDataProvider, Level, RandomTileIterator, SqliteStore, TileBuilder, TileManager,
//!     TileRange,
//! };
//!
//! fn main() -> Result<(), mz_tiles::TileError> {
//!     let range = TileRange::with_steps(400.0, 1600.0, 0.5, 0, 2999, 1)?;
//!     let store = SqliteStore::open("map.db")?;
//!
//!     let mut builder = TileBuilder::new(range);
//!     builder.build_level1_tiles(&store, &mut CheckerDataProvider::new(32.0, 32.0))?;
//!     builder.build_tile_pyramid(4, &store)?;
//!
//!     let manager = TileManager::new(&store);
//!     let mut it = RandomTileIterator::new(&manager);
//!     it.move_to(Level::new(2, 2), 100, 50);
//!     println!("{}", it.value());
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod geometry;
pub mod intensity;
pub mod iter;
pub mod manager;
pub mod range;
pub mod raster;
pub mod store;
pub mod tile;

// Re-export commonly used types
pub use builder::{
    BuildProgress, BuildStats, CheckerDataProvider, FnDataProvider, ProgressCalculator,
    ProgressReporter, TileBuilder, TileDataProvider,
};
pub use config::{BuildConfig, Cli, Command, DumpConfig, InfoConfig};
pub use error::TileError;
pub use geometry::{Point, Rect, RectF, Size};
pub use intensity::{scan_area, scan_partitioned, IntensityRange};
pub use iter::{
    RandomBilinearTileIterator, RandomTileIterator, SequentialTileIterator, DEFAULT_CACHE_CAPACITY,
};
pub use manager::{TileAccessLog, TileManager};
pub use range::{TileLevelSelector, TilePositionConverter, TileRange};
pub use raster::{TileRaster, TileRasterInfo};
pub use store::{MemoryStore, SqliteStore, TileStore, TransactionGuard};
pub use tile::{
    save_tile_to_file, Level, SerializeFormat, Tile, TileKey, DEFAULT_TILE_VALUE, TILE_HEIGHT,
    TILE_SAMPLES, TILE_WIDTH,
};
