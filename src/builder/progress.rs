use tracing::info;

use crate::tile::{Level, TILE_SAMPLES};

/// One progress event from a level build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildProgress {
    pub level: Level,
    /// Tiles the level needs in total.
    pub total_tile_count: usize,
    /// Tiles processed since the previous event.
    pub processed_tiles: usize,
    /// Time spent on those tiles.
    pub elapsed_ms: u64,
}

/// Running totals over [`BuildProgress`] events of one level at a time.
#[derive(Debug, Clone, Default)]
pub struct ProgressCalculator {
    level: Option<Level>,
    level_total: u64,
    processed_total: u64,
    processed: u64,
    elapsed_ms: u64,
}

impl ProgressCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes held by `tile_count` tiles of doubles.
    pub fn tile_bytes(tile_count: u64) -> u64 {
        tile_count * TILE_SAMPLES as u64 * std::mem::size_of::<f64>() as u64
    }

    /// Decimal megabytes, rounded down.
    pub fn bytes_to_megabytes(bytes: u64) -> u64 {
        bytes / 1_000_000
    }

    /// Switch to `level`; totals reset only when the level changes.
    pub fn update_level_info(&mut self, level: Level, total_tile_count: u64) {
        if self.level != Some(level) {
            self.level = Some(level);
            self.level_total = total_tile_count;
            self.processed_total = 0;
        }
    }

    pub fn add_processed_tiles(&mut self, processed: u64, elapsed_ms: u64) {
        self.processed = processed;
        self.elapsed_ms = elapsed_ms;
        self.processed_total += processed;
    }

    /// Percent of the level done, rounded.
    pub fn level_progress(&self) -> u32 {
        if self.level_total == 0 {
            return 100;
        }
        (self.processed_total as f64 / self.level_total as f64 * 100.0).round() as u32
    }

    /// Speed over the last event.
    pub fn tiles_per_second(&self) -> f64 {
        if self.elapsed_ms == 0 {
            return 0.0;
        }
        self.processed as f64 / self.elapsed_ms as f64 * 1000.0
    }

    pub fn remaining_tiles(&self) -> u64 {
        self.level_total.saturating_sub(self.processed_total)
    }

    pub fn processed_total(&self) -> u64 {
        self.processed_total
    }

    /// Estimated seconds left at the current speed.
    pub fn remaining_seconds(&self) -> Option<u64> {
        let speed = self.tiles_per_second();
        if speed <= 0.0 {
            return None;
        }
        Some((self.remaining_tiles() as f64 / speed) as u64)
    }
}

/// Logs every progress event with speed and time estimates.
#[derive(Debug, Default)]
pub struct ProgressReporter {
    calc: ProgressCalculator,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, progress: &BuildProgress) {
        self.calc
            .update_level_info(progress.level, progress.total_tile_count as u64);
        self.calc
            .add_processed_tiles(progress.processed_tiles as u64, progress.elapsed_ms);

        let tiles_per_second = self.calc.tiles_per_second();
        let mb_per_second = ProgressCalculator::bytes_to_megabytes(ProgressCalculator::tile_bytes(
            tiles_per_second.round() as u64,
        ));
        let (minutes, seconds) = self
            .calc
            .remaining_seconds()
            .map(|s| (s / 60, s % 60))
            .unwrap_or((0, 0));

        info!(
            level = %progress.level,
            done = self.calc.processed_total(),
            total = progress.total_tile_count,
            percent = self.calc.level_progress(),
            tiles_per_second = %format!("{:.1}", tiles_per_second),
            mb_per_second,
            "Building level, about {}m {}s left",
            minutes,
            seconds
        );
    }

    pub fn calculator(&self) -> &ProgressCalculator {
        &self.calc
    }
}
