//! SQLite persistence integration tests.
//!
//! Tests verify:
//! - Tiles and ranges survive closing and reopening the file
//! - Saving never overwrites an existing tile
//! - Transactions roll back when abandoned
//! - Tile parts merge into full tiles across handles

use mz_tiles::{
    Level, MemoryStore, Point, Rect, SerializeFormat, SqliteStore, Tile, TileError, TileKey,
    TileManager, TileStore, TransactionGuard, TILE_SAMPLES,
};
use tempfile::TempDir;

use super::test_utils::{put_filled, unit_range};

fn temp_db() -> (TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("tiles.db3");
    (dir, path)
}

// =============================================================================
// Persistence
// =============================================================================

#[test]
fn test_tiles_survive_reopen() {
    let (_dir, path) = temp_db();
    let data: Vec<f64> = (0..TILE_SAMPLES).map(|i| i as f64 * 0.5).collect();
    let tile = Tile::at(Level::new(2, 1), Point::new(128, -64), data);

    {
        let store = SqliteStore::open(&path).unwrap();
        assert!(store.save_tile(&tile).unwrap());
    }

    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.load_tile(Level::new(2, 1), Point::new(128, -64)).unwrap(), tile);
    assert_eq!(store.available_levels().unwrap(), vec![Level::new(2, 1)]);
    assert_eq!(store.boundary(Level::new(2, 1)).unwrap(), Rect::new(128, -64, 64, 64));
    assert_eq!(store.path(), Some(path.as_path()));
}

#[test]
fn test_memory_store_round_trip_through_both_formats() {
    let data: Vec<f64> = (0..TILE_SAMPLES).map(|i| (i as f64).sin() * 1e6).collect();
    let source = Tile::at(Level::new(1, 3), Point::new(-128, 64), data);

    for format in [SerializeFormat::Raw, SerializeFormat::Compressed] {
        let bytes = source.serialize(format);
        if format == SerializeFormat::Raw {
            assert_eq!(bytes.len(), TILE_SAMPLES * 8);
        }

        let decoded = Tile::try_new(source.key(), Tile::deserialize(&bytes, format)).unwrap();
        let store = MemoryStore::new();
        assert!(store.save_tile(&decoded).unwrap());

        let loaded = store.load_tile(Level::new(1, 3), Point::new(-128, 64)).unwrap();
        assert_eq!(loaded, source, "{:?}", format);
    }
}

#[test]
fn test_range_survives_reopen() {
    let (_dir, path) = temp_db();
    let mut range = unit_range(300, 90);
    range.min_intensity = -1.5;
    range.max_intensity = 42.0;

    SqliteStore::open(&path).unwrap().save_range(&range).unwrap();
    let loaded = SqliteStore::open(&path).unwrap().load_range().unwrap();
    assert_eq!(loaded, range);
}

#[test]
fn test_missing_range_is_schema_error() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert!(matches!(store.load_range(), Err(TileError::Schema(_))));
}

#[test]
fn test_no_overwrite_matches_memory_store() {
    let key = TileKey::new(Level::ONE, Point::new(0, 0));
    let first = Tile::filled(key, 1.0);
    let second = Tile::filled(key, 2.0);

    let sqlite = SqliteStore::open_in_memory().unwrap();
    let memory = MemoryStore::new();
    for store in [&sqlite as &dyn TileStore, &memory as &dyn TileStore] {
        assert!(store.save_tile(&first).unwrap());
        assert!(!store.save_tile(&second).unwrap());
        assert_eq!(store.load_tile(Level::ONE, Point::new(0, 0)).unwrap(), first);
        assert!(store.load_tile(Level::ONE, Point::new(64, 0)).unwrap().is_null());
    }
}

#[test]
fn test_boundary_matches_memory_store() {
    let sqlite = SqliteStore::open_in_memory().unwrap();
    let memory = MemoryStore::new();
    for store in [&sqlite as &dyn TileStore, &memory as &dyn TileStore] {
        put_filled(store, Level::ONE, -64, 0, 1.0);
        put_filled(store, Level::ONE, 128, 192, 1.0);
        put_filled(store, Level::new(2, 2), 0, 0, 1.0);

        assert_eq!(store.boundary(Level::ONE).unwrap(), Rect::new(-64, 0, 256, 256));
        assert_eq!(store.boundary(Level::new(2, 2)).unwrap(), Rect::new(0, 0, 64, 64));
        assert!(store.boundary(Level::new(3, 3)).unwrap().is_empty());
    }
}

// =============================================================================
// Transactions
// =============================================================================

#[test]
fn test_abandoned_transaction_rolls_back() {
    let (_dir, path) = temp_db();
    let store = SqliteStore::open(&path).unwrap();

    {
        let _guard = TransactionGuard::begin(&store).unwrap();
        put_filled(&store, Level::ONE, 0, 0, 3.0);
        assert!(store.contains(Level::ONE, Point::new(0, 0)).unwrap());
    }
    assert!(!store.contains(Level::ONE, Point::new(0, 0)).unwrap());

    let guard = TransactionGuard::begin(&store).unwrap();
    put_filled(&store, Level::ONE, 0, 0, 3.0);
    guard.commit().unwrap();

    let reopened = SqliteStore::open(&path).unwrap();
    assert!(reopened.contains(Level::ONE, Point::new(0, 0)).unwrap());
}

#[test]
fn test_end_without_start_fails() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert!(store.end().is_err());
    assert!(store.rollback().is_ok());
}

#[test]
fn test_clear_tiles() {
    let store = SqliteStore::open_in_memory().unwrap();
    put_filled(&store, Level::ONE, 0, 0, 1.0);
    put_filled(&store, Level::ONE, 64, 0, 1.0);

    let manager = TileManager::new(&store);
    manager.clear_tiles().unwrap();
    assert!(store.available_levels().unwrap().is_empty());
    assert_eq!(store.tile_count(Level::ONE).unwrap(), 0);
}

// =============================================================================
// Tile Parts
// =============================================================================

#[test]
fn test_parts_survive_reopen_and_merge() {
    let (_dir, path) = temp_db();
    let key = TileKey::new(Level::ONE, Point::new(64, 64));

    {
        let store = SqliteStore::open(&path).unwrap();
        store.save_tile_part(key, &vec![1.0; TILE_SAMPLES]).unwrap();
        store.save_tile_part(key, &vec![2.5; TILE_SAMPLES]).unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.pending_tile_parts().unwrap(), 1);
    assert_eq!(store.finalize_tile_parts().unwrap(), 1);
    assert_eq!(store.pending_tile_parts().unwrap(), 0);

    let tile = store.load_tile(Level::ONE, Point::new(64, 64)).unwrap();
    assert!(tile.data().iter().all(|v| *v == 3.5));
}

#[test]
fn test_parts_do_not_replace_existing_tile() {
    let store = SqliteStore::open_in_memory().unwrap();
    let key = TileKey::new(Level::ONE, Point::new(0, 0));
    put_filled(&store, Level::ONE, 0, 0, 9.0);

    store.save_tile_part(key, &vec![1.0; TILE_SAMPLES]).unwrap();
    assert_eq!(store.finalize_tile_parts().unwrap(), 0);
    assert_eq!(store.load_tile(Level::ONE, Point::new(0, 0)).unwrap().value(0, 0), 9.0);
    assert_eq!(store.pending_tile_parts().unwrap(), 0);
}

#[test]
fn test_short_part_is_rejected() {
    let store = SqliteStore::open_in_memory().unwrap();
    let key = TileKey::new(Level::ONE, Point::new(0, 0));
    assert!(matches!(
        store.save_tile_part(key, &[1.0, 2.0]),
        Err(TileError::CorruptData(_))
    ));
}
