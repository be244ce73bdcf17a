//! SQLite-backed tile store.
//!
//! # Schema
//!
//! ```text
//! Tiles(LevelX INT, LevelY INT, PosX INT, PosY INT, Data BLOB,
//!       PRIMARY KEY (LevelX, LevelY, PosX, PosY))
//! TilesPart(LevelX INT, LevelY INT, PosX INT, PosY INT, WriteOrder INT, Data BLOB,
//!           PRIMARY KEY (LevelX, LevelY, PosX, PosY, WriteOrder))
//! TilesRange(MinX REAL, MaxX REAL, StepX REAL, SizeX INT,
//!            MinY INT, MaxY INT, StepY INT, SizeY INT,
//!            MinIntensity REAL, MaxIntensity REAL)
//! ```
//!
//! `Data` holds [`SerializeFormat::Compressed`] bytes. Files written before
//! levels were tracked per axis have a single `Level` column; they are
//! migrated on open.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::TileError;
use crate::geometry::{Point, Rect};
use crate::range::{TileRange, TileRangeRecord};
use crate::tile::{self, Level, SerializeFormat, Tile, TileKey, TILE_SAMPLES};

use super::{accumulate_part, padded_boundary, TileStore};

const BLOB_FORMAT: SerializeFormat = SerializeFormat::Compressed;

/// How long a handle waits on a lock held by another handle to the same file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CREATE_TILES: &str = "CREATE TABLE IF NOT EXISTS Tiles (
    LevelX INT,
    LevelY INT,
    PosX INT,
    PosY INT,
    Data BLOB,
    PRIMARY KEY (LevelX, LevelY, PosX, PosY)
);";

const CREATE_TILES_PART: &str = "CREATE TABLE IF NOT EXISTS TilesPart (
    LevelX INT,
    LevelY INT,
    PosX INT,
    PosY INT,
    WriteOrder INT,
    Data BLOB,
    PRIMARY KEY (LevelX, LevelY, PosX, PosY, WriteOrder)
);";

const CREATE_TILES_RANGE: &str = "CREATE TABLE IF NOT EXISTS TilesRange (
    MinX REAL,
    MaxX REAL,
    StepX REAL,
    SizeX INT,
    MinY INT,
    MaxY INT,
    StepY INT,
    SizeY INT,
    MinIntensity REAL,
    MaxIntensity REAL
);";

/// Tile store kept in a single SQLite database file.
///
/// A handle owns one connection and is not shared between threads. Open one
/// handle per worker for parallel reads.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open or create a store file.
    ///
    /// Fails if the file cannot be opened or is not a SQLite database.
    /// Missing tables are created and a legacy single-level schema is
    /// upgraded.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TileError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|e| TileError::Io(format!("could not open {}: {}", path.display(), e)))?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let store = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        store.initialize()?;
        info!(path = %path.display(), "Opened tile store");
        Ok(store)
    }

    /// Store backed by a private in-memory database.
    pub fn open_in_memory() -> Result<Self, TileError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
            path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<(), TileError> {
        // Touch the file header so a non-database file fails here.
        self.conn
            .query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
            .map_err(|e| TileError::Io(format!("not a tile store: {}", e)))?;

        if self.has_table("Tiles")? && !self.is_2d_level_schema()? {
            self.upgrade_schema_to_2d_level()?;
        }
        self.create_tables()
    }

    /// Database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn create_tables(&self) -> Result<(), TileError> {
        self.conn.execute_batch(CREATE_TILES)?;
        self.conn.execute_batch(CREATE_TILES_PART)?;
        self.conn.execute_batch(CREATE_TILES_RANGE)?;
        Ok(())
    }

    pub fn drop_tables(&self) -> Result<(), TileError> {
        self.conn.execute_batch(
            "DROP TABLE IF EXISTS Tiles;
             DROP TABLE IF EXISTS TilesPart;
             DROP TABLE IF EXISTS TilesRange;",
        )?;
        Ok(())
    }

    fn has_table(&self, name: &str) -> Result<bool, TileError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn tile_columns(&self) -> Result<Vec<String>, TileError> {
        let mut stmt = self.conn.prepare("PRAGMA table_info(Tiles)")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// True when the `Tiles` table tracks levels per axis.
    pub fn is_2d_level_schema(&self) -> Result<bool, TileError> {
        let columns = self.tile_columns()?;
        let has = |name: &str| columns.iter().any(|c| c == name);
        Ok(!has("Level") && has("LevelX") && has("LevelY"))
    }

    /// Migrate a single `Level` column to `LevelX = LevelY = Level`.
    ///
    /// Runs in one transaction; on failure the old table is left untouched.
    pub fn upgrade_schema_to_2d_level(&self) -> Result<(), TileError> {
        info!("Upgrading tile store schema to per-axis levels");

        self.conn.execute_batch("BEGIN")?;
        let migrated = self.conn.execute_batch(&format!(
            "ALTER TABLE Tiles RENAME TO tmp_Tiles;
             {}
             INSERT INTO Tiles(LevelX, LevelY, PosX, PosY, Data)
                 SELECT Level, Level, PosX, PosY, Data FROM tmp_Tiles;
             DROP TABLE tmp_Tiles;",
            CREATE_TILES
        ));

        match migrated {
            Ok(()) => self.conn.execute_batch("COMMIT")?,
            Err(e) => {
                self.conn.execute_batch("ROLLBACK")?;
                return Err(TileError::Schema(format!("schema upgrade failed: {}", e)));
            }
        }

        if let Err(e) = self.conn.execute_batch("VACUUM") {
            warn!("VACUUM after schema upgrade failed: {}", e);
        }
        Ok(())
    }

    /// Replace the persisted range.
    pub fn save_range(&self, range: &TileRange) -> Result<(), TileError> {
        let r = TileRangeRecord::from(*range);
        self.conn.execute("DELETE FROM TilesRange", [])?;
        self.conn.execute(
            "INSERT INTO TilesRange(MinX, MaxX, StepX, SizeX, MinY, MaxY, StepY, SizeY, MinIntensity, MaxIntensity)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                r.min_x,
                r.max_x,
                r.step_x,
                r.size_x,
                r.min_y,
                r.max_y,
                r.step_y,
                r.size_y,
                r.min_intensity,
                r.max_intensity
            ],
        )?;
        Ok(())
    }

    /// Read the persisted range.
    ///
    /// Returns [`TileError::Schema`] when no range is stored or the stored
    /// one is inconsistent.
    pub fn load_range(&self) -> Result<TileRange, TileError> {
        if !self.has_table("TilesRange")? {
            return Err(TileError::Schema("store has no TilesRange table".into()));
        }

        let record = self
            .conn
            .query_row(
                "SELECT MinX, MaxX, StepX, SizeX, MinY, MaxY, StepY, SizeY, MinIntensity, MaxIntensity
                 FROM TilesRange LIMIT 1",
                [],
                |row| {
                    Ok(TileRangeRecord {
                        min_x: row.get(0)?,
                        max_x: row.get(1)?,
                        step_x: row.get(2)?,
                        size_x: row.get(3)?,
                        min_y: row.get(4)?,
                        max_y: row.get(5)?,
                        step_y: row.get(6)?,
                        size_y: row.get(7)?,
                        min_intensity: row.get::<_, Option<f64>>(8)?.unwrap_or_default(),
                        max_intensity: row.get::<_, Option<f64>>(9)?.unwrap_or_default(),
                    })
                },
            )
            .optional()?
            .ok_or_else(|| TileError::Schema("store has no persisted range".into()))?;

        let range = TileRange::from(record);
        range
            .validate()
            .map_err(|e| TileError::Schema(format!("persisted range is invalid: {}", e)))?;
        Ok(range)
    }

    /// Number of stored tiles at `level`.
    pub fn tile_count(&self, level: Level) -> Result<usize, TileError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM Tiles WHERE LevelX = ?1 AND LevelY = ?2",
            params![level.x, level.y],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn insert_tile(&self, key: TileKey, blob: &[u8]) -> Result<bool, TileError> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO Tiles(LevelX, LevelY, PosX, PosY, Data) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        let changed = stmt.execute(params![key.level.x, key.level.y, key.pos.x, key.pos.y, blob])?;
        Ok(changed == 1)
    }

    fn merge_parts(&self) -> Result<usize, TileError> {
        let mut merged: HashMap<TileKey, Vec<f64>> = HashMap::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT LevelX, LevelY, PosX, PosY, Data FROM TilesPart
                 ORDER BY LevelX, LevelY, PosX, PosY, WriteOrder",
            )?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let key = TileKey::new(
                    Level::new(row.get(0)?, row.get(1)?),
                    Point::new(row.get(2)?, row.get(3)?),
                );
                let blob: Vec<u8> = row.get(4)?;
                let part = tile::try_deserialize(&blob, BLOB_FORMAT)?;
                accumulate_part(merged.entry(key).or_default(), &part);
            }
        }

        let mut stored = 0;
        for (key, data) in merged {
            if self.save_tile(&Tile::try_new(key, data)?)? {
                stored += 1;
            }
        }
        self.conn.execute("DELETE FROM TilesPart", [])?;
        Ok(stored)
    }
}

impl TileStore for SqliteStore {
    fn save_tile(&self, tile: &Tile) -> Result<bool, TileError> {
        if tile.is_null() {
            return Ok(false);
        }
        self.insert_tile(tile.key(), &tile.serialize(BLOB_FORMAT))
    }

    fn load_tile(&self, level: Level, pos: Point) -> Result<Tile, TileError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT Data FROM Tiles WHERE LevelX = ?1 AND LevelY = ?2 AND PosX = ?3 AND PosY = ?4",
        )?;
        let blob: Option<Vec<u8>> = stmt
            .query_row(params![level.x, level.y, pos.x, pos.y], |row| row.get(0))
            .optional()?;

        let Some(blob) = blob else {
            return Ok(Tile::null());
        };

        match tile::try_deserialize(&blob, BLOB_FORMAT) {
            Ok(data) => Tile::try_new(TileKey::new(level, pos), data),
            Err(e) => {
                warn!(level = %level, pos = ?pos, "Unreadable tile blob: {}", e);
                Ok(Tile::null())
            }
        }
    }

    fn contains(&self, level: Level, pos: Point) -> Result<bool, TileError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT 1 FROM Tiles WHERE LevelX = ?1 AND LevelY = ?2 AND PosX = ?3 AND PosY = ?4",
        )?;
        let found = stmt
            .query_row(params![level.x, level.y, pos.x, pos.y], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    fn boundary(&self, level: Level) -> Result<Rect, TileError> {
        let bounds: (Option<i32>, Option<i32>, Option<i32>, Option<i32>) = self.conn.query_row(
            "SELECT MIN(PosX), MAX(PosX), MIN(PosY), MAX(PosY) FROM Tiles WHERE LevelX = ?1 AND LevelY = ?2",
            params![level.x, level.y],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        match bounds {
            (Some(min_x), Some(max_x), Some(min_y), Some(max_y)) => {
                Ok(padded_boundary(min_x, max_x, min_y, max_y))
            }
            _ => {
                debug!(level = %level, "No tiles stored at level");
                Ok(Rect::default())
            }
        }
    }

    fn available_levels(&self) -> Result<Vec<Level>, TileError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT LevelX, LevelY FROM Tiles ORDER BY LevelX, LevelY ASC")?;
        let levels = stmt
            .query_map([], |row| Ok(Level::new(row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(levels)
    }

    fn start(&self) -> Result<(), TileError> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn end(&self) -> Result<(), TileError> {
        if self.conn.is_autocommit() {
            return Err(TileError::Io("no transaction in progress".into()));
        }
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&self) -> Result<(), TileError> {
        if self.conn.is_autocommit() {
            return Ok(());
        }
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn clear(&self) -> Result<(), TileError> {
        self.conn
            .execute_batch("DELETE FROM Tiles; DELETE FROM TilesPart;")?;
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

        let blob = tile::serialize(data, BLOB_FORMAT);
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO TilesPart(LevelX, LevelY, PosX, PosY, WriteOrder, Data)
             VALUES (?1, ?2, ?3, ?4,
                     (SELECT COALESCE(MAX(WriteOrder) + 1, 0) FROM TilesPart
                      WHERE LevelX = ?1 AND LevelY = ?2 AND PosX = ?3 AND PosY = ?4),
                     ?5)",
        )?;
        stmt.execute(params![key.level.x, key.level.y, key.pos.x, key.pos.y, &blob[..]])?;
        Ok(())
    }

    fn finalize_tile_parts(&self) -> Result<usize, TileError> {
        // Join the caller's transaction when one is open.
        if !self.conn.is_autocommit() {
            return self.merge_parts();
        }

        self.start()?;
        match self.merge_parts() {
            Ok(stored) => {
                self.end()?;
                debug!(stored, "Finalized tile parts");
                Ok(stored)
            }
            Err(e) => {
                self.rollback()?;
                Err(e)
            }
        }
    }

    fn pending_tile_parts(&self) -> Result<usize, TileError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM (SELECT DISTINCT LevelX, LevelY, PosX, PosY FROM TilesPart)",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
