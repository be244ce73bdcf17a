use std::collections::{BTreeSet, HashMap};

use parking_lot::{Mutex, RwLock};

use crate::error::TileError;
use crate::geometry::{Point, Rect};
use crate::tile::{Level, Tile, TileKey, TILE_SAMPLES};

use super::{accumulate_part, padded_boundary, TileStore};

/// In-memory tile store for tests and ephemeral pyramids.
///
/// Transactions are no-ops: every save is visible immediately and
/// [`TileStore::rollback`] does not undo anything.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tiles: RwLock<HashMap<TileKey, Tile>>,
    parts: Mutex<HashMap<TileKey, Vec<f64>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tiles.
    pub fn len(&self) -> usize {
        self.tiles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.read().is_empty()
    }
}

impl TileStore for MemoryStore {
    fn save_tile(&self, tile: &Tile) -> Result<bool, TileError> {
        if tile.is_null() {
            return Ok(false);
        }

        let mut tiles = self.tiles.write();
        if tiles.contains_key(&tile.key()) {
            return Ok(false);
        }
        tiles.insert(tile.key(), tile.clone());
        Ok(true)
    }

    fn load_tile(&self, level: Level, pos: Point) -> Result<Tile, TileError> {
        let key = TileKey::new(level, pos);
        Ok(self.tiles.read().get(&key).cloned().unwrap_or_default())
    }

    fn contains(&self, level: Level, pos: Point) -> Result<bool, TileError> {
        Ok(self.tiles.read().contains_key(&TileKey::new(level, pos)))
    }

    fn boundary(&self, level: Level) -> Result<Rect, TileError> {
        let tiles = self.tiles.read();
        let mut positions = tiles.keys().filter(|k| k.level == level).map(|k| k.pos);

        let Some(first) = positions.next() else {
            return Ok(Rect::default());
        };

        let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
        for pos in positions {
            min_x = min_x.min(pos.x);
            max_x = max_x.max(pos.x);
            min_y = min_y.min(pos.y);
            max_y = max_y.max(pos.y);
        }
        Ok(padded_boundary(min_x, max_x, min_y, max_y))
    }

    fn available_levels(&self) -> Result<Vec<Level>, TileError> {
        let levels: BTreeSet<Level> = self.tiles.read().keys().map(|k| k.level).collect();
        Ok(levels.into_iter().collect())
    }

    fn start(&self) -> Result<(), TileError> {
        Ok(())
    }

    fn end(&self) -> Result<(), TileError> {
        Ok(())
    }

    fn rollback(&self) -> Result<(), TileError> {
        Ok(())
    }

    fn clear(&self) -> Result<(), TileError> {
        self.tiles.write().clear();
        self.parts.lock().clear();
        Ok(())
    }

    fn save_tile_part(&self, key: TileKey, data: &[f64]) -> Result<(), TileError> {
        if data.len() != TILE_SAMPLES {
            return Err(TileError::CorruptData(format!(
                "tile part for {} has {} samples, expected {}",
                key,
                data.len(),
                TILE_SAMPLES
            )));
        }
        let mut parts = self.parts.lock();
        accumulate_part(parts.entry(key).or_default(), data);
        Ok(())
    }

    fn finalize_tile_parts(&self) -> Result<usize, TileError> {
        let parts: Vec<(TileKey, Vec<f64>)> = self.parts.lock().drain().collect();

        let mut stored = 0;
        for (key, data) in parts {
            if self.save_tile(&Tile::try_new(key, data)?)? {
                stored += 1;
            }
        }
        Ok(stored)
    }

    fn pending_tile_parts(&self) -> Result<usize, TileError> {
        Ok(self.parts.lock().len())
    }
}
