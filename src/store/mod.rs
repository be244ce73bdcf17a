//! Persistent tile storage.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │            TileManager / TileBuilder          │
//! └───────────────────────┬───────────────────────┘
//!                         │ &dyn TileStore
//!            ┌────────────┴────────────┐
//!            ▼                         ▼
//! ┌─────────────────────┐   ┌─────────────────────┐
//! │     MemoryStore     │   │     SqliteStore     │
//! │  HashMap<TileKey,   │   │  Tiles / TilesPart  │
//! │        Tile>        │   │  TilesRange tables  │
//! └─────────────────────┘   └─────────────────────┘
//! ```
//!
//! # Contract
//!
//! - Tiles are never overwritten: saving a key that is already present is
//!   a no-op reported as `Ok(false)`.
//! - A missing tile loads as [`Tile::null`], not as an error.
//! - Writes between [`TileStore::start`] and [`TileStore::end`] become
//!   durable when `end` returns. Prefer [`TransactionGuard`], which rolls
//!   back if it is dropped before [`TransactionGuard::commit`].
//! - A store handle has a single writer. Parallel readers each open their
//!   own handle.
//!
//! Partial tiles written with [`TileStore::save_tile_part`] go to a
//! separate write-ahead area. Parts for the same key are summed
//! elementwise by [`TileStore::finalize_tile_parts`], which then stores the
//! merged tiles through the normal no-overwrite path.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use tracing::warn;

use crate::error::TileError;
use crate::geometry::{Point, Rect};
use crate::tile::{Level, Tile, TileKey};

/// Storage backend for tiles.
pub trait TileStore {
    /// Store a tile. Returns `Ok(true)` when it was newly stored and
    /// `Ok(false)` when its key was already present.
    fn save_tile(&self, tile: &Tile) -> Result<bool, TileError>;

    /// Load a tile, or the null tile when none is stored at the key.
    fn load_tile(&self, level: Level, pos: Point) -> Result<Tile, TileError>;

    fn contains(&self, level: Level, pos: Point) -> Result<bool, TileError>;

    /// Extent of the stored tiles at `level` in tile-grid coordinates. The
    /// last row and column are padded to a full tile edge. Empty when the
    /// level has no tiles.
    fn boundary(&self, level: Level) -> Result<Rect, TileError>;

    /// Distinct levels holding at least one tile, ordered by `(x, y)`.
    fn available_levels(&self) -> Result<Vec<Level>, TileError>;

    /// Begin a write batch.
    fn start(&self) -> Result<(), TileError>;

    /// Make every write since [`start`](Self::start) durable.
    fn end(&self) -> Result<(), TileError>;

    /// Discard every write since [`start`](Self::start).
    fn rollback(&self) -> Result<(), TileError>;

    /// Remove every tile and pending part.
    fn clear(&self) -> Result<(), TileError>;

    /// Add a partial contribution for `key` to the write-ahead area.
    fn save_tile_part(&self, key: TileKey, data: &[f64]) -> Result<(), TileError>;

    /// Merge pending parts into full tiles and empty the write-ahead area.
    /// Returns how many tiles were newly stored.
    fn finalize_tile_parts(&self) -> Result<usize, TileError>;

    /// Number of keys with parts waiting to be finalized.
    fn pending_tile_parts(&self) -> Result<usize, TileError>;
}

/// Scoped write batch over a [`TileStore`].
///
/// Calls [`TileStore::start`] on creation. [`commit`](Self::commit) ends the
/// batch; dropping the guard without committing rolls it back, so early
/// returns never leave a transaction open.
pub struct TransactionGuard<'a, S: TileStore + ?Sized> {
    store: &'a S,
    finished: bool,
}

impl<'a, S: TileStore + ?Sized> TransactionGuard<'a, S> {
    pub fn begin(store: &'a S) -> Result<Self, TileError> {
        store.start()?;
        Ok(Self {
            store,
            finished: false,
        })
    }

    pub fn commit(mut self) -> Result<(), TileError> {
        self.finished = true;
        self.store.end()
    }

    pub fn rollback(mut self) -> Result<(), TileError> {
        self.finished = true;
        self.store.rollback()
    }
}

impl<S: TileStore + ?Sized> Drop for TransactionGuard<'_, S> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.store.rollback() {
                warn!("Failed to roll back abandoned tile transaction: {}", e);
            }
        }
    }
}

/// Sum `part` into `acc`, growing `acc` if needed.
pub(crate) fn accumulate_part(acc: &mut Vec<f64>, part: &[f64]) {
    if acc.len() < part.len() {
        acc.resize(part.len(), 0.0);
    }
    for (a, p) in acc.iter_mut().zip(part) {
        *a += p;
    }
}

/// Tile-grid extent covered by tiles with the given top-left corners.
pub(crate) fn padded_boundary(min_x: i32, max_x: i32, min_y: i32, max_y: i32) -> Rect {
    use crate::tile::{TILE_HEIGHT, TILE_WIDTH};

    let right = max_x + TILE_WIDTH;
    let bottom = max_y + TILE_HEIGHT;
    Rect::new(min_x, min_y, right - min_x, bottom - min_y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_commits() {
        let store = SqliteStore::open_in_memory().unwrap();
        let tile = Tile::filled(TileKey::new(Level::ONE, Point::new(0, 0)), 1.0);

        let guard = TransactionGuard::begin(&store).unwrap();
        assert!(store.save_tile(&tile).unwrap());
        guard.commit().unwrap();

        assert!(store.contains(Level::ONE, Point::new(0, 0)).unwrap());
    }

    #[test]
    fn test_guard_rolls_back_on_drop() {
        let store = SqliteStore::open_in_memory().unwrap();
        let tile = Tile::filled(TileKey::new(Level::ONE, Point::new(0, 0)), 1.0);

        {
            let _guard = TransactionGuard::begin(&store).unwrap();
            assert!(store.save_tile(&tile).unwrap());
        }

        assert!(!store.contains(Level::ONE, Point::new(0, 0)).unwrap());
        // The store accepts a new batch afterwards.
        let guard = TransactionGuard::begin(&store).unwrap();
        guard.commit().unwrap();
    }

    #[test]
    fn test_guard_over_trait_object() {
        let store = MemoryStore::new();
        let dyn_store: &dyn TileStore = &store;
        let guard = TransactionGuard::begin(dyn_store).unwrap();
        guard.commit().unwrap();
    }

    #[test]
    fn test_padded_boundary() {
        assert_eq!(padded_boundary(0, 64, 0, 0), Rect::new(0, 0, 128, 64));
    }

    #[test]
    fn test_accumulate_part() {
        let mut acc = Vec::new();
        accumulate_part(&mut acc, &[1.0, 2.0]);
        accumulate_part(&mut acc, &[0.5, 0.5]);
        assert_eq!(acc, vec![1.5, 2.5]);
    }
}
