//! Pyramid build integration tests.
//!
//! Tests verify:
//! - A full build on disk can be reopened and read at every level
//! - Interrupted builds resume without touching existing tiles
//! - Progress events cover every tile of every level
//! - Parallel intensity scans agree with a single-threaded scan

use std::sync::mpsc;

use mz_tiles::{
    scan_area, scan_partitioned, BuildProgress, CheckerDataProvider, IntensityRange, Level, Point,
    RandomTileIterator, Rect, SqliteStore, TileBuilder, TileLevelSelector, TileManager, TileStore,
};

use super::test_utils::{build_gradient_level1, gradient, unit_range};

#[test]
fn test_checker_pyramid_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("checker.db3");
    let range = unit_range(256, 128);

    {
        let store = SqliteStore::open(&path).unwrap();
        let mut builder = TileBuilder::new(range);
        let level1 = builder
            .build_level1_tiles(&store, &mut CheckerDataProvider::new(1.0, 1.0))
            .unwrap();
        assert_eq!(level1.written, 8);
        assert_eq!(level1.intensity, IntensityRange::new(0.0, 1.0));

        builder.build_tile_pyramid(3, &store).unwrap();
        store.save_range(&range).unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.load_range().unwrap(), range);
    assert_eq!(
        store.available_levels().unwrap(),
        vec![Level::ONE, Level::new(2, 2), Level::new(3, 3)]
    );
    assert_eq!(store.tile_count(Level::new(2, 2)).unwrap(), 2);

    // A 1x1 checker averages to one half at every coarser level.
    let manager = TileManager::new(&store);
    let mut it = RandomTileIterator::new(&manager);
    for level in [Level::new(2, 2), Level::new(3, 3)] {
        it.move_to(level, 7, 9);
        assert_eq!(it.value(), 0.5);
    }
}

#[test]
fn test_resumed_build_keeps_existing_tiles() {
    let store = SqliteStore::open_in_memory().unwrap();
    let range = unit_range(256, 64);
    build_gradient_level1(&store, range);

    let mut builder = TileBuilder::new(range);
    builder
        .build_level(Level::ONE, Level::new(2, 1), &store)
        .unwrap();
    let before = store.load_tile(Level::new(2, 1), Point::new(64, 0)).unwrap();

    let stats = builder.build_rip_tile_pyramid(Level::new(3, 2), &store).unwrap();
    // (2, 1) is already complete.
    assert_eq!(store.load_tile(Level::new(2, 1), Point::new(64, 0)).unwrap(), before);
    assert!(stats.skipped >= 2);
    assert_eq!(stats.failed, 0);

    let levels = store.available_levels().unwrap();
    for level in [Level::new(1, 2), Level::new(2, 2), Level::new(3, 1), Level::new(3, 2)] {
        assert!(levels.contains(&level), "missing {}", level);
    }

    // (3, 1) halves X twice: four level-1 columns per sample.
    let tile = store.load_tile(Level::new(3, 1), Point::new(0, 0)).unwrap();
    let expected = (0..4).map(|dx| gradient(4 * 5 + dx, 7)).sum::<f64>() / 4.0;
    assert!((tile.value(5, 7) - expected).abs() < 1e-9);
}

#[test]
fn test_progress_covers_every_level() {
    let store = SqliteStore::open_in_memory().unwrap();
    let range = unit_range(300, 200);
    let (tx, rx) = mpsc::channel();

    let mut builder = TileBuilder::new(range)
        .with_report_intervals(5, 2)
        .with_progress_sender(tx);
    builder
        .build_level1_tiles(&store, &mut CheckerDataProvider::new(16.0, 16.0))
        .unwrap();
    builder.build_tile_pyramid(3, &store).unwrap();
    drop(builder);

    let events: Vec<BuildProgress> = rx.iter().collect();
    for level in [Level::ONE, Level::new(2, 2), Level::new(3, 3)] {
        let level_events: Vec<&BuildProgress> = events.iter().filter(|e| e.level == level).collect();
        let processed: usize = level_events.iter().map(|e| e.processed_tiles).sum();
        let total = range.level_tile_count(level).area();
        assert_eq!(processed, total, "level {}", level);
        assert!(level_events.iter().all(|e| e.total_tile_count == total));
    }
}

#[test]
fn test_partitioned_scan_matches_single_scan() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.db3");
    let range = unit_range(200, 150);
    {
        let store = SqliteStore::open(&path).unwrap();
        build_gradient_level1(&store, range);
    }

    let area = Rect::new(0, 0, 200, 150);
    let parallel = scan_partitioned(|| SqliteStore::open(&path), Level::ONE, &area, 4).unwrap();

    let store = SqliteStore::open(&path).unwrap();
    let manager = TileManager::new(&store);
    let single = scan_area(&manager, Level::ONE, &area);

    assert_eq!(parallel, single);
    assert_eq!(parallel, IntensityRange::new(0.0, gradient(199, 149)));
}

#[test]
fn test_level_selector_uses_built_levels() {
    let store = SqliteStore::open_in_memory().unwrap();
    let range = unit_range(256, 256);
    build_gradient_level1(&store, range);
    TileBuilder::new(range).build_tile_pyramid(3, &store).unwrap();

    let selector = TileLevelSelector::new(&store.available_levels().unwrap());
    assert_eq!(selector.select_level(1.0, 1.0), Some(Level::ONE));
    assert_eq!(selector.select_level(0.3, 0.6), Some(Level::new(3, 2)));

    let empty = TileLevelSelector::new(&[]);
    assert_eq!(empty.select_level(1.0, 1.0), None);
}
