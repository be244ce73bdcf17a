//! World-coordinate domain and its mapping onto the tile grid.
//!
//! - [`TileRange`]: bounds, steps and level-1 size of the domain, with the
//!   per-level scaling rules
//! - [`TilePositionConverter`]: world ↔ level-local grid coordinates
//! - [`TileLevelSelector`]: nearest stored level for a display scale

mod converter;
mod level_selector;
mod tile_range;

pub use converter::TilePositionConverter;
pub use level_selector::TileLevelSelector;
pub use tile_range::TileRange;
pub(crate) use tile_range::TileRangeRecord;
