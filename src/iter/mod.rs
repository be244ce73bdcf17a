//! Cursors over the tile grid.
//!
//! # Components
//!
//! - [`RandomTileIterator`]: point lookups with a small spatial tile cache
//! - [`SequentialTileIterator`]: visits every cell of a rect once, tile by
//!   tile, so each tile is fetched once
//! - [`RandomBilinearTileIterator`]: bilinear samples at fractional grid
//!   positions
//!
//! Every cursor owns its cache. Cursors are cheap to create, so parallel
//! workers each build their own over their own store handle.
//!
//! # Cache Eviction
//!
//! ```text
//!        ┌────┬────┬────┐
//!        │ NW │ N  │ NE │      kept: same level as the anchor and at most
//!        ├────┼────┼────┤            one tile away on both axes
//!        │ W  │ ** │ E  │
//!        ├────┼────┼────┤      evicted: everything else
//!        │ SW │ S  │ SE │
//!        └────┴────┴────┘      ** = anchor ("main tile")
//! ```
//!
//! Eviction runs when a new tile is about to be cached into a full cache.
//! If there is no anchor, or nothing is far enough to evict, the cache is
//! wiped except for the anchor itself.

mod bilinear;
mod random;
mod sequential;

pub use bilinear::RandomBilinearTileIterator;
pub use random::{RandomTileIterator, DEFAULT_CACHE_CAPACITY};
pub use sequential::SequentialTileIterator;
