//! Command-line configuration for the `mz-tiles` binary.
//!
//! Every option can also be set through an environment variable with the
//! `MZT_` prefix:
//!
//! - `MZT_OUTPUT` - SQLite file to build into
//! - `MZT_RANGE` - JSON range preset (alternative to the bound options)
//! - `MZT_CHECKER_WIDTH` / `MZT_CHECKER_HEIGHT` - checker cell size in samples
//! - `MZT_LEVELS` - deepest diagonal level to build (default: 1)
//! - `MZT_RIP_LEVELS` - deepest rip-map level, as `X,Y`
//! - `MZT_INPUT` - SQLite file to inspect
//!
//! # Example
//!
//! ```text
//! mz-tiles build --output map.db --min-x 400 --max-x 1600 --step-x 0.5 \
//!     --min-y 0 --max-y 2999 --levels 4
//! mz-tiles info --input map.db
//! mz-tiles dump --input map.db --level 2,2 --pos 64,0 --output tile.csv
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::error::TileError;
use crate::geometry::Point;
use crate::range::TileRange;
use crate::tile::{Level, TILE_HEIGHT, TILE_WIDTH};

// =============================================================================
// Default Values
// =============================================================================

/// Default checker cell edge, in level-1 samples.
pub const DEFAULT_CHECKER_SIZE: f64 = 64.0;

/// Default number of diagonal levels.
pub const DEFAULT_LEVELS: i32 = 1;

// =============================================================================
// CLI Arguments
// =============================================================================

/// mz-tiles - multi-resolution tile pyramids for intensity maps.
#[derive(Parser, Debug, Clone)]
#[command(name = "mz-tiles")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build a checkerboard pyramid into a SQLite store.
    Build(BuildConfig),
    /// Print the range and levels of a store.
    Info(InfoConfig),
    /// Write one tile's samples as `;`-separated text.
    Dump(DumpConfig),
}

#[derive(Args, Debug, Clone)]
pub struct BuildConfig {
    /// SQLite file to build into. Created when missing.
    #[arg(short, long, env = "MZT_OUTPUT")]
    pub output: PathBuf,

    // =========================================================================
    // Range
    // =========================================================================
    /// JSON range preset. Overrides the bound options below.
    #[arg(long, env = "MZT_RANGE")]
    pub range: Option<PathBuf>,

    /// Lowest m/z value.
    #[arg(long, env = "MZT_MIN_X")]
    pub min_x: Option<f64>,

    /// Highest m/z value.
    #[arg(long, env = "MZT_MAX_X")]
    pub max_x: Option<f64>,

    /// m/z distance between samples.
    #[arg(long, env = "MZT_STEP_X")]
    pub step_x: Option<f64>,

    /// First scan index.
    #[arg(long, env = "MZT_MIN_Y")]
    pub min_y: Option<i64>,

    /// Last scan index.
    #[arg(long, env = "MZT_MAX_Y")]
    pub max_y: Option<i64>,

    /// Scan indices between samples.
    #[arg(long, default_value_t = 1, env = "MZT_STEP_Y")]
    pub step_y: i64,

    // =========================================================================
    // Data
    // =========================================================================
    /// Checker cell width, in level-1 samples.
    #[arg(long, default_value_t = DEFAULT_CHECKER_SIZE, env = "MZT_CHECKER_WIDTH")]
    pub checker_width: f64,

    /// Checker cell height, in level-1 samples.
    #[arg(long, default_value_t = DEFAULT_CHECKER_SIZE, env = "MZT_CHECKER_HEIGHT")]
    pub checker_height: f64,

    // =========================================================================
    // Pyramid
    // =========================================================================
    /// Deepest diagonal level; 1 builds level 1 only.
    #[arg(long, default_value_t = DEFAULT_LEVELS, env = "MZT_LEVELS")]
    pub levels: i32,

    /// Deepest rip-map level as `X,Y`. Replaces `--levels`.
    #[arg(long, env = "MZT_RIP_LEVELS")]
    pub rip_levels: Option<Level>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl BuildConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.range.is_none() {
            let missing: Vec<&str> = [
                ("--min-x", self.min_x.is_none()),
                ("--max-x", self.max_x.is_none()),
                ("--step-x", self.step_x.is_none()),
                ("--min-y", self.min_y.is_none()),
                ("--max-y", self.max_y.is_none()),
            ]
            .into_iter()
            .filter_map(|(name, absent)| absent.then_some(name))
            .collect();
            if !missing.is_empty() {
                return Err(format!(
                    "Either --range or all range bounds are required; missing {}",
                    missing.join(", ")
                ));
            }
        }

        if !(self.checker_width > 0.0 && self.checker_height > 0.0) {
            return Err("checker width and height must be greater than 0".to_string());
        }

        if self.levels < 1 {
            return Err("levels must be at least 1".to_string());
        }

        Ok(())
    }

    /// Range from the preset file or the bound options.
    pub fn tile_range(&self) -> Result<TileRange, TileError> {
        if let Some(ref path) = self.range {
            let range = TileRange::load_from_file(path)?;
            range.validate()?;
            return Ok(range);
        }

        let missing = || TileError::InvalidRange("range bounds are incomplete".to_string());
        TileRange::with_steps(
            self.min_x.ok_or_else(missing)?,
            self.max_x.ok_or_else(missing)?,
            self.step_x.ok_or_else(missing)?,
            self.min_y.ok_or_else(missing)?,
            self.max_y.ok_or_else(missing)?,
            self.step_y,
        )
    }
}

#[derive(Args, Debug, Clone)]
pub struct InfoConfig {
    /// SQLite file to inspect.
    #[arg(short, long, env = "MZT_INPUT")]
    pub input: PathBuf,

    /// Print JSON instead of text.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl InfoConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.input.exists() {
            return Err(format!("{} does not exist", self.input.display()));
        }
        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
pub struct DumpConfig {
    /// SQLite file to read from.
    #[arg(short, long, env = "MZT_INPUT")]
    pub input: PathBuf,

    /// Tile level as `X,Y` or `N`.
    #[arg(long, default_value = "1")]
    pub level: Level,

    /// Tile top-left corner as `X,Y`, in grid coordinates.
    #[arg(long, value_parser = parse_point)]
    pub pos: Point,

    /// Output file. Defaults to standard output.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl DumpConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.input.exists() {
            return Err(format!("{} does not exist", self.input.display()));
        }
        if self.pos.x.rem_euclid(TILE_WIDTH) != 0 || self.pos.y.rem_euclid(TILE_HEIGHT) != 0 {
            return Err(format!(
                "pos ({}, {}) is not a multiple of the {}x{} tile size",
                self.pos.x, self.pos.y, TILE_WIDTH, TILE_HEIGHT
            ));
        }
        Ok(())
    }
}

/// Parse `"X,Y"` into a grid point.
pub fn parse_point(s: &str) -> Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{}'", s))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<i32>()
            .map_err(|e| format!("invalid coordinate '{}': {}", part.trim(), e))
    };
    Ok(Point::new(parse(x)?, parse(y)?))
}

// =============================================================================
// Tests
// =============================================================================
