//! Pyramid construction.
//!
//! Level 1 is filled from a [`TileDataProvider`]. Every other level is a
//! box filter of a finer level that is already stored:
//!
//! ```text
//!   (1,1) ──► (2,1) ──► (3,1)        X run
//!     │
//!     ├────► (1,2) ──► (1,3)         Y run
//!     ▼
//!   (2,2) ──► (3,2)
//!     │
//!     ├────► (2,3)
//!     ▼
//!   (3,3)
//! ```
//!
//! [`TileBuilder::build_tile_pyramid`] walks the diagonal only.
//! [`TileBuilder::build_rip_tile_pyramid`] also walks the X and Y runs
//! off every diagonal level.
//!
//! Progress is delivered as [`BuildProgress`] events; [`ProgressReporter`]
//! turns them into log lines with speed and time estimates.

mod progress;
mod provider;
mod pyramid;

pub use progress::{BuildProgress, ProgressCalculator, ProgressReporter};
pub use provider::{sample_tile_area, CheckerDataProvider, FnDataProvider, TileDataProvider};
pub use pyramid::{BuildStats, TileBuilder, LEVEL1_REPORT_INTERVAL, LEVEL_REPORT_INTERVAL};
