use std::collections::HashMap;

use tracing::{debug, warn};

use crate::geometry::Point;
use crate::manager::TileManager;
use crate::tile::{Level, Tile, TileKey, DEFAULT_TILE_VALUE, TILE_HEIGHT, TILE_WIDTH};

/// Default cache size: the anchor tile and its eight neighbors.
pub const DEFAULT_CACHE_CAPACITY: usize = 9;

/// Point-query cursor with a bounded tile cache.
///
/// Positions are global grid coordinates at the requested level. Missing
/// tiles read as [`DEFAULT_TILE_VALUE`]; they are cached like any other
/// tile so repeated misses do not hit the store.
pub struct RandomTileIterator<'a> {
    manager: &'a TileManager<'a>,
    last_value: f64,
    pos: Point,
    capacity: usize,
    cache: HashMap<TileKey, Tile>,
    main_tile: Option<TileKey>,
}

impl<'a> RandomTileIterator<'a> {
    pub fn new(manager: &'a TileManager<'a>) -> Self {
        Self::with_capacity(manager, DEFAULT_CACHE_CAPACITY)
    }

    /// Cursor caching at most `capacity` tiles (minimum 1).
    pub fn with_capacity(manager: &'a TileManager<'a>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            manager,
            last_value: DEFAULT_TILE_VALUE,
            pos: Point::new(-1, -1),
            capacity,
            cache: HashMap::with_capacity(capacity),
            main_tile: None,
        }
    }

    /// Move to grid position `(x, y)` at `level` and read its value.
    ///
    /// A store failure is logged and reads as the default value; the tile
    /// is not cached so the next visit retries.
    pub fn move_to(&mut self, level: Level, x: i32, y: i32) {
        self.pos = Point::new(x, y);

        let tile_x = TileManager::normalize_x(x);
        let tile_y = TileManager::normalize_y(y);
        let key = TileKey::new(level, Point::new(tile_x, tile_y));

        if let Some(tile) = self.cache.get(&key) {
            self.last_value = sample(tile, x - tile_x, y - tile_y);
            return;
        }

        match self.manager.fetch_tile_key(key) {
            Ok(tile) => {
                self.last_value = sample(&tile, x - tile_x, y - tile_y);
                self.insert(key, tile);
            }
            Err(e) => {
                warn!(level = %level, x, y, "Tile fetch failed: {}", e);
                self.last_value = DEFAULT_TILE_VALUE;
            }
        }
    }

    /// Value read by the last [`move_to`](Self::move_to).
    pub fn value(&self) -> f64 {
        self.last_value
    }

    /// Last X passed to [`move_to`](Self::move_to), `-1` before the first.
    pub fn x(&self) -> i32 {
        self.pos.x
    }

    pub fn y(&self) -> i32 {
        self.pos.y
    }

    /// Positions left in the tile along X, starting at `x` itself.
    pub fn num_contiguous_cols(&self, x: i32) -> i32 {
        TILE_WIDTH - (x - TileManager::normalize_x(x))
    }

    /// Positions left in the tile along Y, starting at `y` itself.
    pub fn num_contiguous_rows(&self, y: i32) -> i32 {
        TILE_HEIGHT - (y - TileManager::normalize_y(y))
    }

    /// Set the eviction anchor. Does not fetch anything.
    pub fn set_main_tile(&mut self, key: TileKey) {
        self.main_tile = Some(key);
    }

    pub fn main_tile(&self) -> Option<TileKey> {
        self.main_tile
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_cached(&self, key: &TileKey) -> bool {
        self.cache.contains_key(key)
    }

    fn insert(&mut self, key: TileKey, tile: Tile) {
        if self.cache.len() >= self.capacity {
            match self.clear_distant_tiles() {
                Some(0) => {
                    warn!(
                        cached = self.cache.len(),
                        "No distant tiles to evict; wiping tile cache"
                    );
                    self.wipe_cache();
                }
                Some(_) => {}
                None => self.wipe_cache(),
            }
        }
        self.cache.insert(key, tile);
    }

    /// Remove tiles on another level than the anchor or more than one
    /// tile away from it. `None` when there is no anchor.
    fn clear_distant_tiles(&mut self) -> Option<usize> {
        let anchor = self.main_tile?;
        let anchor_col = TileManager::x_to_column(anchor.pos.x);
        let anchor_row = TileManager::y_to_row(anchor.pos.y);

        let before = self.cache.len();
        let mut other_level = false;
        self.cache.retain(|key, _| {
            if key.level != anchor.level {
                other_level = true;
                return false;
            }
            let column_dist = (TileManager::x_to_column(key.pos.x) - anchor_col).abs();
            let row_dist = (TileManager::y_to_row(key.pos.y) - anchor_row).abs();
            column_dist <= 1 && row_dist <= 1
        });

        if other_level {
            debug!("Evicted tiles from other levels; anchor eviction works best on one level");
        }
        Some(before - self.cache.len())
    }

    /// Drop every cached tile except the anchor.
    fn wipe_cache(&mut self) {
        match self.main_tile {
            Some(anchor) if self.capacity > 1 => self.cache.retain(|key, _| *key == anchor),
            _ => self.cache.clear(),
        }
    }
}

fn sample(tile: &Tile, offset_x: i32, offset_y: i32) -> f64 {
    if tile.is_null() {
        DEFAULT_TILE_VALUE
    } else {
        tile.value(offset_x, offset_y)
    }
}
