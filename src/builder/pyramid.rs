use std::sync::mpsc::Sender;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::TileError;
use crate::geometry::{Point, Rect};
use crate::intensity::IntensityRange;
use crate::iter::RandomTileIterator;
use crate::manager::TileManager;
use crate::range::TileRange;
use crate::store::{TileStore, TransactionGuard};
use crate::tile::{Level, Tile, TileKey, TILE_HEIGHT, TILE_SAMPLES, TILE_WIDTH};

use super::{BuildProgress, TileDataProvider};

/// Level-1 tiles between progress events.
pub const LEVEL1_REPORT_INTERVAL: usize = 4000;

/// Derived-level tiles between progress events.
pub const LEVEL_REPORT_INTERVAL: usize = 400;

type ProgressCallback = Box<dyn FnMut(&BuildProgress)>;

/// Outcome counters of one or more level builds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildStats {
    /// Tiles newly stored.
    pub written: usize,
    /// Tiles already present, left untouched.
    pub skipped: usize,
    /// Tiles whose save failed.
    pub failed: usize,
    /// Sample range of the level-1 tiles produced.
    pub intensity: IntensityRange,
}

impl BuildStats {
    pub fn merge(&mut self, other: &BuildStats) {
        self.written += other.written;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.intensity = self.intensity.merge(other.intensity);
    }

    fn record_save(&mut self, key: TileKey, result: Result<bool, TileError>) {
        match result {
            Ok(true) => self.written += 1,
            Ok(false) => {
                debug!(level = %key.level, pos = ?key.pos, "Tile already stored");
                self.skipped += 1;
            }
            Err(e) => {
                warn!(level = %key.level, pos = ?key.pos, "Failed to store tile: {}", e);
                self.failed += 1;
            }
        }
    }
}

impl Default for BuildStats {
    fn default() -> Self {
        Self {
            written: 0,
            skipped: 0,
            failed: 0,
            intensity: IntensityRange::EMPTY,
        }
    }
}

/// Builds a tile pyramid for one [`TileRange`].
///
/// Level 1 comes from a [`TileDataProvider`]; every coarser level is box
/// filtered from the level below it. Derived levels skip tiles that are
/// already stored, so an interrupted build can simply be run again.
///
/// Each level is written in one store transaction. A failed save is logged
/// and counted, and the build goes on.
pub struct TileBuilder {
    range: TileRange,
    progress: Option<ProgressCallback>,
    level1_interval: usize,
    level_interval: usize,
}

impl TileBuilder {
    pub fn new(range: TileRange) -> Self {
        Self {
            range,
            progress: None,
            level1_interval: LEVEL1_REPORT_INTERVAL,
            level_interval: LEVEL_REPORT_INTERVAL,
        }
    }

    /// Call `callback` with every progress event.
    pub fn with_progress(mut self, callback: impl FnMut(&BuildProgress) + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Send every progress event down a channel. A closed receiver is
    /// ignored.
    pub fn with_progress_sender(self, sender: Sender<BuildProgress>) -> Self {
        self.with_progress(move |p| {
            let _ = sender.send(*p);
        })
    }

    /// Tiles between progress events for level 1 and derived levels.
    pub fn with_report_intervals(mut self, level1: usize, level: usize) -> Self {
        self.level1_interval = level1.max(1);
        self.level_interval = level.max(1);
        self
    }

    pub fn range(&self) -> &TileRange {
        &self.range
    }

    // =========================================================================
    // Level 1
    // =========================================================================

    /// Fetch and store every level-1 tile of the range.
    ///
    /// Provider errors abort the build and roll back the transaction.
    pub fn build_level1_tiles(
        &mut self,
        store: &dyn TileStore,
        provider: &mut dyn TileDataProvider,
    ) -> Result<BuildStats, TileError> {
        let level = Level::ONE;
        let tile_count_x = self.range.tile_count_x();
        let tile_count_y = self.range.tile_count_y();
        let total = (tile_count_x.max(0) * tile_count_y.max(0)) as usize;

        info!(tiles = total, columns = tile_count_x, rows = tile_count_y, "Building level 1");

        let guard = TransactionGuard::begin(store)?;
        let mut stats = BuildStats::default();
        let mut reporter = BatchReporter::new(level, total, self.level1_interval);

        for y in 0..tile_count_y {
            debug!(row = y, rows = tile_count_y, "Level 1 row");
            for x in 0..tile_count_x {
                let rect = Rect::new(x * TILE_WIDTH, y * TILE_HEIGHT, TILE_WIDTH, TILE_HEIGHT);
                let data = provider.fetch_tile_data(&rect)?;
                let tile = Tile::try_new(TileKey::new(level, rect.top_left()), data)?;

                stats.intensity.include_all(tile.data());
                stats.record_save(tile.key(), store.save_tile(&tile));
                reporter.tick(&mut self.progress);
            }
        }

        guard.commit()?;
        reporter.finish(&mut self.progress);
        Ok(stats)
    }

    // =========================================================================
    // Derived levels
    // =========================================================================

    /// Build every missing tile of `level` from `parent_level`.
    ///
    /// Each axis of `level` must equal the parent's or be one above it, and
    /// at least one axis must be above.
    pub fn build_level(
        &mut self,
        parent_level: Level,
        level: Level,
        store: &dyn TileStore,
    ) -> Result<BuildStats, TileError> {
        let scale = Scaling::between(parent_level, level)?;

        let tile_count = self.range.level_tile_count(level);
        let total = tile_count.area();
        debug!(
            level = %level,
            parent = %parent_level,
            width = self.range.level_width(level),
            height = self.range.level_height(level),
            tiles = total,
            "Building level"
        );

        let manager = TileManager::new(store);
        let mut iterator = RandomTileIterator::new(&manager);

        let guard = TransactionGuard::begin(store)?;
        let mut stats = BuildStats::default();
        let mut reporter = BatchReporter::new(level, total, self.level_interval);

        for y in 0..tile_count.height {
            debug!(level = %level, row = y, rows = tile_count.height, "Level row");
            for x in 0..tile_count.width {
                let pos = Point::new(x * TILE_WIDTH, y * TILE_HEIGHT);
                if store.contains(level, pos)? {
                    stats.skipped += 1;
                    continue;
                }

                iterator.clear_cache();
                let tile = compute_tile(pos, &mut iterator, parent_level, level, scale);
                stats.record_save(tile.key(), store.save_tile(&tile));
                reporter.tick(&mut self.progress);
            }
        }

        guard.commit()?;
        reporter.finish(&mut self.progress);
        info!(level = %level, written = stats.written, skipped = stats.skipped, "Level built");
        Ok(stats)
    }

    /// Build levels `(2, 2)` through `(last_level, last_level)`, each from
    /// the one before.
    pub fn build_tile_pyramid(
        &mut self,
        last_level: i32,
        store: &dyn TileStore,
    ) -> Result<BuildStats, TileError> {
        let mut stats = BuildStats::default();
        for level in 2..=last_level {
            let built = self.build_level(Level::uniform(level - 1), Level::uniform(level), store)?;
            stats.merge(&built);
        }
        Ok(stats)
    }

    /// Build every level `(x, y)` with `x <= last_level.x` and
    /// `y <= last_level.y` that can be reached from the diagonal by moving
    /// along one axis.
    ///
    /// For each diagonal level `(d, d)` the build runs `(d+1, d)`,
    /// `(d+2, d)`, ... along X, then `(d, d+1)`, `(d, d+2)`, ... along Y,
    /// then moves on to `(d+1, d+1)`.
    pub fn build_rip_tile_pyramid(
        &mut self,
        last_level: Level,
        store: &dyn TileStore,
    ) -> Result<BuildStats, TileError> {
        let mut stats = BuildStats::default();
        let mut parent = Level::ONE;
        let mut next = parent;

        while next.x <= last_level.x && next.y <= last_level.y {
            if next != parent {
                stats.merge(&self.build_level(parent, next, store)?);
            }

            let mut sub_parent = next;
            for x in next.x + 1..=last_level.x {
                let level = Level::new(x, next.y);
                stats.merge(&self.build_level(sub_parent, level, store)?);
                sub_parent = level;
            }

            sub_parent = next;
            for y in next.y + 1..=last_level.y {
                let level = Level::new(next.x, y);
                stats.merge(&self.build_level(sub_parent, level, store)?);
                sub_parent = level;
            }

            parent = next;
            next = Level::new(next.x + 1, next.y + 1);
        }
        Ok(stats)
    }
}

/// Which axes are halved between a parent level and its child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scaling {
    X,
    Y,
    Both,
}

impl Scaling {
    fn between(parent: Level, level: Level) -> Result<Self, TileError> {
        let dx = level.x - parent.x;
        let dy = level.y - parent.y;
        match (dx, dy) {
            (1, 0) => Ok(Scaling::X),
            (0, 1) => Ok(Scaling::Y),
            (1, 1) => Ok(Scaling::Both),
            _ => Err(TileError::InvalidRange(format!(
                "level {} cannot be built from {}",
                level, parent
            ))),
        }
    }
}

/// Box filter one tile of `level` from `parent_level`.
fn compute_tile(
    pos: Point,
    iterator: &mut RandomTileIterator<'_>,
    parent_level: Level,
    level: Level,
    scale: Scaling,
) -> Tile {
    let mut sample = |x: i32, y: i32| {
        iterator.move_to(parent_level, x, y);
        iterator.value()
    };

    let mut data = Vec::with_capacity(TILE_SAMPLES);
    for tile_y in 0..TILE_HEIGHT {
        let gy = pos.y + tile_y;
        for tile_x in 0..TILE_WIDTH {
            let gx = pos.x + tile_x;
            let value = match scale {
                Scaling::X => (sample(gx * 2, gy) + sample(gx * 2 + 1, gy)) / 2.0,
                Scaling::Y => (sample(gx, gy * 2) + sample(gx, gy * 2 + 1)) / 2.0,
                Scaling::Both => {
                    let top_left = sample(gx * 2, gy * 2);
                    let top_right = sample(gx * 2 + 1, gy * 2);
                    let bottom_left = sample(gx * 2, gy * 2 + 1);
                    let bottom_right = sample(gx * 2 + 1, gy * 2 + 1);
                    (top_left + top_right + bottom_left + bottom_right) / 4.0
                }
            };
            data.push(value);
        }
    }
    Tile::new(TileKey::new(level, pos), data)
}

/// Emits a progress event every `interval` tiles, then one for any tiles
/// left over at the end.
struct BatchReporter {
    level: Level,
    total: usize,
    interval: usize,
    processed: usize,
    started: Instant,
}

impl BatchReporter {
    fn new(level: Level, total: usize, interval: usize) -> Self {
        Self {
            level,
            total,
            interval,
            processed: 0,
            started: Instant::now(),
        }
    }

    fn tick(&mut self, callback: &mut Option<ProgressCallback>) {
        self.processed += 1;
        if self.processed % self.interval == 0 {
            self.emit(callback, self.interval);
        }
    }

    fn finish(&mut self, callback: &mut Option<ProgressCallback>) {
        let pending = self.processed % self.interval;
        if pending > 0 {
            self.emit(callback, pending);
        }
    }

    fn emit(&mut self, callback: &mut Option<ProgressCallback>, processed: usize) {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        self.started = Instant::now();
        if let Some(cb) = callback {
            cb(&BuildProgress {
                level: self.level,
                total_tile_count: self.total,
                processed_tiles: processed,
                elapsed_ms,
            });
        }
    }
}
