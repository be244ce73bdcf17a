//! Iterator and tile cache integration tests.
//!
//! Tests verify:
//! - Sequential scans fetch each tile once
//! - Random access reuses cached tiles, including missing ones
//! - Anchor-based eviction keeps the neighborhood of the main tile
//! - Buffer materialization agrees with the iterators

use std::sync::Arc;

use mz_tiles::{
    Level, Point, RandomBilinearTileIterator, RandomTileIterator, Rect, SequentialTileIterator,
    SqliteStore, TileAccessLog, TileKey, TileManager, TileRaster,
};

use super::test_utils::{build_gradient_level1, gradient, put_filled, unit_range, TrackingStore};

fn key(col: i32, row: i32) -> TileKey {
    TileKey::new(Level::ONE, Point::new(col * 64, row * 64))
}

// =============================================================================
// Fetch Counts
// =============================================================================

#[test]
fn test_sequential_scan_fetches_each_tile_once() {
    let store = TrackingStore::new();
    build_gradient_level1(&store, unit_range(130, 70));
    let manager = TileManager::new(&store);

    let area = Rect::new(10, 20, 170, 100);
    let values: Vec<f64> = SequentialTileIterator::new(&manager, area, Level::ONE).collect();

    assert_eq!(values.len(), 170 * 100);
    // Columns 0..=2, rows 0..=1.
    assert_eq!(store.load_count(), 6);
}

#[test]
fn test_sequential_scan_visits_every_cell() {
    let store = TrackingStore::new();
    build_gradient_level1(&store, unit_range(130, 70));
    let manager = TileManager::new(&store);

    let area = Rect::new(60, 60, 10, 8);
    let mut it = SequentialTileIterator::new(&manager, area, Level::ONE);
    let mut seen = Vec::new();
    while it.has_next() {
        it.advance();
        assert_eq!(it.value(), gradient(it.x(), it.y()));
        seen.push((it.x(), it.y()));
    }

    assert_eq!((it.x(), it.y()), (69, 67));
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 80);
}

#[test]
fn test_random_access_reuses_cached_tiles() {
    let store = TrackingStore::new();
    put_filled(&store, Level::ONE, 0, 0, 4.0);
    let manager = TileManager::new(&store);
    let mut it = RandomTileIterator::new(&manager);

    for (x, y) in [(0, 0), (63, 63), (10, 5), (0, 0)] {
        it.move_to(Level::ONE, x, y);
        assert_eq!(it.value(), 4.0);
    }
    assert_eq!(store.load_count(), 1);

    // A missing tile is cached too.
    it.move_to(Level::ONE, 500, 500);
    it.move_to(Level::ONE, 501, 502);
    assert_eq!(it.value(), 0.0);
    assert_eq!(store.load_count(), 2);
}

// =============================================================================
// Eviction
// =============================================================================

#[test]
fn test_eviction_wipes_all_but_anchor_when_nothing_is_distant() {
    let store = TrackingStore::new();
    let manager = TileManager::new(&store);
    let mut it = RandomTileIterator::new(&manager);
    it.set_main_tile(key(1, 1));

    for row in 0..3 {
        for col in 0..3 {
            it.move_to(Level::ONE, col * 64, row * 64);
        }
    }
    assert_eq!(it.cache_len(), 9);
    assert_eq!(store.load_count(), 9);

    it.move_to(Level::ONE, 10 * 64, 0);
    assert_eq!(it.cache_len(), 2);
    assert!(it.is_cached(&key(1, 1)));
    assert!(it.is_cached(&key(10, 0)));

    store.reset_tracking();
    it.move_to(Level::ONE, 64, 64);
    assert_eq!(store.load_count(), 0);
    it.move_to(Level::ONE, 0, 0);
    assert_eq!(store.load_count(), 1);
}

#[test]
fn test_eviction_drops_distant_tiles_first() {
    let store = TrackingStore::new();
    let manager = TileManager::new(&store);
    let mut it = RandomTileIterator::with_capacity(&manager, 3);
    it.set_main_tile(key(0, 0));

    it.move_to(Level::ONE, 0, 0);
    it.move_to(Level::ONE, 64, 0);
    it.move_to(Level::ONE, 640, 0);
    assert_eq!(it.cache_len(), 3);

    it.move_to(Level::ONE, 0, 64);
    assert_eq!(it.cache_len(), 3);
    assert!(!it.is_cached(&key(10, 0)));
    for k in [key(0, 0), key(1, 0), key(0, 1)] {
        assert!(it.is_cached(&k));
    }

    // Tiles on another level than the anchor count as distant.
    it.move_to(Level::new(2, 2), 0, 0);
    assert!(it.is_cached(&TileKey::new(Level::new(2, 2), Point::new(0, 0))));
    assert!(it.cache_len() <= 3);
}

// =============================================================================
// Materialization
// =============================================================================

#[test]
fn test_raster_matches_point_queries_on_sqlite() {
    let store = SqliteStore::open_in_memory().unwrap();
    build_gradient_level1(&store, unit_range(130, 70));
    let manager = TileManager::new(&store);

    let area = Rect::new(50, 30, 100, 60);
    let mut raster = TileRaster::new(area, unit_range(130, 70));
    raster.allocate_tile_area().unwrap();
    manager.write_raster(Level::ONE, &mut raster).unwrap();

    let mut it = RandomTileIterator::new(&manager);
    for (x, y) in [(50, 30), (63, 63), (64, 64), (149, 89), (100, 40)] {
        it.move_to(Level::ONE, x, y);
        assert_eq!(raster.value(x, y), it.value());
        assert_eq!(raster.value(x, y), gradient(x, y));
    }
}

#[test]
fn test_write_covers_missing_tiles_with_default() {
    let store = TrackingStore::new();
    put_filled(&store, Level::ONE, 0, 0, 2.0);
    let manager = TileManager::new(&store);

    let area = Rect::new(62, -2, 4, 4);
    let mut buffer = vec![f64::NAN; 16];
    manager.write(Level::ONE, &area, &mut buffer).unwrap();

    let expected = [
        0.0, 0.0, 0.0, 0.0, //
        0.0, 0.0, 0.0, 0.0, //
        2.0, 2.0, 0.0, 0.0, //
        2.0, 2.0, 0.0, 0.0,
    ];
    assert_eq!(buffer, expected);
}

#[test]
fn test_bilinear_on_linear_data() {
    let store = SqliteStore::open_in_memory().unwrap();
    build_gradient_level1(&store, unit_range(130, 70));
    let manager = TileManager::new(&store);
    let mut it = RandomBilinearTileIterator::new(&manager);

    it.move_to(Level::ONE, 10.5, 3.25);
    assert!((it.value() - (10.5 + 3250.0)).abs() < 1e-9);

    // Across a tile seam.
    it.move_to(Level::ONE, 63.5, 63.5);
    assert!((it.value() - (63.5 + 63_500.0)).abs() < 1e-9);
}

#[test]
fn test_access_log_counts_fetches() {
    let store = TrackingStore::new();
    put_filled(&store, Level::ONE, 0, 0, 1.0);
    let log = Arc::new(TileAccessLog::new());
    let manager = TileManager::new(&store).with_access_log(Arc::clone(&log));

    let tiles = manager.fetch_tiles(Level::ONE, &Rect::new(0, 0, 128, 64)).unwrap();
    assert_eq!(tiles.len(), 2);
    assert!(!tiles[0].is_null());
    assert!(tiles[1].is_null());

    manager.fetch_tile(Level::ONE, 5, 5).unwrap();
    assert_eq!(log.count(&key(0, 0)), 2);
    assert_eq!(log.count(&key(1, 0)), 1);
    assert_eq!(log.total(), 3);
    assert_eq!(store.load_count(), 3);
}
