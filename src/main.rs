//! mz-tiles - build and inspect intensity-map tile pyramids.
//!
//! This binary wires the library into three subcommands: `build`, `info`
//! and `dump`.

use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mz_tiles::{
    config::{BuildConfig, Cli, Command, DumpConfig, InfoConfig},
    scan_partitioned, BuildStats, CheckerDataProvider, Level, ProgressReporter, Rect,
    SqliteStore, TileBuilder, TileError, TileStore,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Build(config) => run_build(config),
        Command::Info(config) => run_info(config),
        Command::Dump(config) => run_dump(config),
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose { "mz_tiles=debug" } else { "mz_tiles=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

// =============================================================================
// Build Command
// =============================================================================

fn run_build(config: BuildConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    match build(&config) {
        Ok(stats) => {
            info!(
                written = stats.written,
                skipped = stats.skipped,
                failed = stats.failed,
                "Build finished"
            );
            if stats.failed > 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!("Build failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn build(config: &BuildConfig) -> Result<BuildStats, TileError> {
    let mut range = config.tile_range()?;
    let store = SqliteStore::open(&config.output)?;
    let started = Instant::now();

    info!("Configuration:");
    info!("  Output: {}", config.output.display());
    info!(
        "  Range: m/z [{}, {}] step {}, scans [{}, {}] step {}",
        range.min_x, range.max_x, range.step_x, range.min_y, range.max_y, range.step_y
    );
    info!(
        "  Level 1: {}x{} samples, {}x{} tiles",
        range.size.width,
        range.size.height,
        range.tile_count_x(),
        range.tile_count_y()
    );

    let mut reporter = ProgressReporter::new();
    let mut builder = TileBuilder::new(range).with_progress(move |p| reporter.report(p));
    let mut provider = CheckerDataProvider::new(config.checker_width, config.checker_height);

    let mut stats = builder.build_level1_tiles(&store, &mut provider)?;
    let derived = match config.rip_levels {
        Some(last) => builder.build_rip_tile_pyramid(last, &store)?,
        None => builder.build_tile_pyramid(config.levels, &store)?,
    };
    stats.merge(&derived);

    let area = Rect::new(0, 0, range.size.width, range.size.height);
    let partitions = rayon::current_num_threads();
    let intensity = scan_partitioned(|| SqliteStore::open(&config.output), Level::ONE, &area, partitions)?;
    intensity.apply_to(&mut range);
    store.save_range(&range)?;

    info!(
        min = range.min_intensity,
        max = range.max_intensity,
        seconds = started.elapsed().as_secs(),
        "Range saved"
    );
    Ok(stats)
}

// =============================================================================
// Info Command
// =============================================================================

fn run_info(config: InfoConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    match print_info(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed to read {}: {}", config.input.display(), e);
            ExitCode::FAILURE
        }
    }
}

fn print_info(config: &InfoConfig) -> Result<(), TileError> {
    let store = SqliteStore::open(&config.input)?;
    let range = store.load_range()?;

    let mut levels = Vec::new();
    for level in store.available_levels()? {
        levels.push((level, store.boundary(level)?, store.tile_count(level)?));
    }

    if config.json {
        let json = serde_json::json!({
            "range": range,
            "levels": levels
                .iter()
                .map(|(level, boundary, tiles)| serde_json::json!({
                    "level": level,
                    "boundary": boundary,
                    "tiles": tiles,
                }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!("Range");
    println!("─────");
    println!("  m/z:       [{}, {}] step {}", range.min_x, range.max_x, range.step_x);
    println!("  scans:     [{}, {}] step {}", range.min_y, range.max_y, range.step_y);
    println!("  size:      {} x {}", range.size.width, range.size.height);
    println!("  intensity: [{}, {}]", range.min_intensity, range.max_intensity);
    println!();
    println!("Levels");
    println!("──────");
    if levels.is_empty() {
        println!("  (no tiles stored)");
    }
    for (level, boundary, tiles) in &levels {
        println!(
            "  {:<8} {:>8} tiles   {} x {} at ({}, {})",
            level.to_string(),
            tiles,
            boundary.width,
            boundary.height,
            boundary.x,
            boundary.y
        );
    }
    Ok(())
}

// =============================================================================
// Dump Command
// =============================================================================

fn run_dump(config: DumpConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    match dump(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Dump failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn dump(config: &DumpConfig) -> Result<(), TileError> {
    let store = SqliteStore::open(&config.input)?;
    let tile = store.load_tile(config.level, config.pos)?;
    if tile.is_null() {
        return Err(TileError::Io(format!(
            "no tile at level {} pos ({}, {})",
            config.level, config.pos.x, config.pos.y
        )));
    }

    match config.output {
        Some(ref path) => {
            tile.write_csv(BufWriter::new(File::create(path)?))?;
            info!(path = %path.display(), "Tile written");
        }
        None => tile.write_csv(io::stdout().lock())?,
    }
    Ok(())
}
