use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::TileError;
use crate::geometry::{RectF, Size};
use crate::tile::{Level, TILE_HEIGHT, TILE_WIDTH};

/// World-coordinate domain of a pyramid and its size at level 1.
///
/// The X axis is continuous (m/z), the Y axis is discrete (scan index).
/// A range is valid when `size.width == ceil((max_x - min_x) / step_x) + 1`
/// and likewise for the height. Use the `init_*` methods to keep bounds,
/// step and size consistent; the fields stay public so persisted ranges can
/// be inspected even when they are not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "TileRangeRecord", into = "TileRangeRecord")]
pub struct TileRange {
    pub min_x: f64,
    pub max_x: f64,
    pub step_x: f64,
    pub min_y: i64,
    pub max_y: i64,
    pub step_y: i64,
    pub size: Size,
    pub min_intensity: f64,
    pub max_intensity: f64,
}

impl TileRange {
    /// Range from explicit X and Y steps.
    pub fn with_steps(
        min_x: f64,
        max_x: f64,
        step_x: f64,
        min_y: i64,
        max_y: i64,
        step_y: i64,
    ) -> Result<Self, TileError> {
        let mut range = TileRange::default();
        range.init_x_range(min_x, max_x, step_x)?;
        range.init_y_range(min_y, max_y, step_y)?;
        Ok(range)
    }

    /// Set the X bounds and step; the width is derived.
    pub fn init_x_range(&mut self, min_x: f64, max_x: f64, step_x: f64) -> Result<(), TileError> {
        if !(min_x.is_finite() && max_x.is_finite() && step_x.is_finite()) {
            return Err(TileError::InvalidRange(format!(
                "non-finite X range [{}, {}] step {}",
                min_x, max_x, step_x
            )));
        }
        if max_x <= min_x {
            return Err(TileError::InvalidRange(format!(
                "X range [{}, {}] is empty",
                min_x, max_x
            )));
        }
        if step_x <= 0.0 {
            return Err(TileError::InvalidRange(format!(
                "X step must be positive, got {}",
                step_x
            )));
        }

        self.min_x = min_x;
        self.max_x = max_x;
        self.step_x = step_x;
        self.size.width = compute_size(max_x - min_x, step_x);
        Ok(())
    }

    /// Set the Y bounds and step; the height is derived.
    pub fn init_y_range(&mut self, min_y: i64, max_y: i64, step_y: i64) -> Result<(), TileError> {
        if max_y < min_y {
            return Err(TileError::InvalidRange(format!(
                "Y range [{}, {}] is reversed",
                min_y, max_y
            )));
        }
        if step_y <= 0 {
            return Err(TileError::InvalidRange(format!(
                "Y step must be positive, got {}",
                step_y
            )));
        }

        self.min_y = min_y;
        self.max_y = max_y;
        self.step_y = step_y;
        self.size.height = compute_size((max_y - min_y) as f64, step_y as f64);
        Ok(())
    }

    /// Set the X bounds and width; the step is derived.
    pub fn init_x_range_by_size(&mut self, min_x: f64, max_x: f64, size_x: i32) -> Result<(), TileError> {
        if max_x <= min_x {
            return Err(TileError::InvalidRange(format!(
                "X range [{}, {}] is empty",
                min_x, max_x
            )));
        }
        if size_x < 2 {
            return Err(TileError::InvalidRange(format!(
                "X size must be at least 2 to span [{}, {}], got {}",
                min_x, max_x, size_x
            )));
        }

        self.min_x = min_x;
        self.max_x = max_x;
        self.size.width = size_x;
        self.step_x = Self::compute_step(min_x, max_x, size_x);
        Ok(())
    }

    /// Set the Y bounds and height; the step is derived with integer
    /// division.
    ///
    /// A single scan (`min_y == max_y`) takes size 1 and step 1, like
    /// [`init_y_range`](Self::init_y_range) produces for it.
    pub fn init_y_range_by_size(&mut self, min_y: i64, max_y: i64, size_y: i32) -> Result<(), TileError> {
        if max_y < min_y {
            return Err(TileError::InvalidRange(format!(
                "Y range [{}, {}] is reversed",
                min_y, max_y
            )));
        }

        let step_y = if max_y == min_y {
            if size_y != 1 {
                return Err(TileError::InvalidRange(format!(
                    "a single scan needs size 1, got {}",
                    size_y
                )));
            }
            1
        } else {
            if size_y < 2 {
                return Err(TileError::InvalidRange(format!(
                    "Y size must be at least 2 to span [{}, {}], got {}",
                    min_y, max_y, size_y
                )));
            }
            (max_y - min_y) / (size_y as i64 - 1)
        };
        if step_y == 0 {
            return Err(TileError::InvalidRange(format!(
                "{} scans do not fit in [{}, {}]",
                size_y, min_y, max_y
            )));
        }

        self.min_y = min_y;
        self.max_y = max_y;
        self.size.height = size_y;
        self.step_y = step_y;
        Ok(())
    }

    /// Step between samples when `size` samples span `[min, max]`.
    pub fn compute_step(min: f64, max: f64, size: i32) -> f64 {
        if size == 1 {
            0.0
        } else {
            (max - min) / (size as f64 - 1.0)
        }
    }

    /// True when size agrees with bounds and step on both axes.
    pub fn is_valid(&self) -> bool {
        self.size.width == compute_size(self.max_x - self.min_x, self.step_x)
            && self.size.height == compute_size((self.max_y - self.min_y) as f64, self.step_y as f64)
    }

    /// Like [`is_valid`](Self::is_valid), with the reason on failure.
    pub fn validate(&self) -> Result<(), TileError> {
        let width = compute_size(self.max_x - self.min_x, self.step_x);
        if self.size.width != width {
            return Err(TileError::InvalidRange(format!(
                "width {} does not match X bounds/step (expected {})",
                self.size.width, width
            )));
        }
        let height = compute_size((self.max_y - self.min_y) as f64, self.step_y as f64);
        if self.size.height != height {
            return Err(TileError::InvalidRange(format!(
                "height {} does not match Y bounds/step (expected {})",
                self.size.height, height
            )));
        }
        Ok(())
    }

    /// True for the all-zero default range.
    pub fn is_null(&self) -> bool {
        self.min_x == 0.0
            && self.max_x == 0.0
            && self.step_x == 0.0
            && self.min_y == 0
            && self.max_y == 0
            && self.step_y == 0
            && self.size.is_null()
    }

    /// Number of level-1 tile columns.
    pub fn tile_count_x(&self) -> i32 {
        ceil_div(self.size.width, TILE_WIDTH)
    }

    /// Number of level-1 tile rows.
    pub fn tile_count_y(&self) -> i32 {
        ceil_div(self.size.height, TILE_HEIGHT)
    }

    /// Width in samples at `level`.
    pub fn level_width(&self, level: Level) -> i32 {
        down_scale(level.x, self.size.width)
    }

    /// Height in samples at `level`.
    pub fn level_height(&self, level: Level) -> i32 {
        down_scale(level.y, self.size.height)
    }

    pub fn level_size(&self, level: Level) -> Size {
        Size::new(self.level_width(level), self.level_height(level))
    }

    /// Tile columns and rows needed to cover `level`.
    pub fn level_tile_count(&self, level: Level) -> Size {
        Size::new(
            ceil_div(self.level_width(level), TILE_WIDTH),
            ceil_div(self.level_height(level), TILE_HEIGHT),
        )
    }

    /// X step at `level`: `step_x * 2^(level.x - 1)`.
    pub fn level_step_x(&self, level: Level) -> f64 {
        self.step_x * level.scale_x()
    }

    /// Y step at `level`: `step_y * 2^(level.y - 1)`.
    pub fn level_step_y(&self, level: Level) -> f64 {
        self.step_y as f64 * level.scale_y()
    }

    /// The domain as a world rect; both right and bottom edges are inside.
    pub fn area(&self) -> RectF {
        RectF::from_edges(self.min_x, self.min_y as f64, self.max_x, self.max_y as f64)
    }

    pub fn to_json(&self) -> Result<String, TileError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, TileError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a range from a JSON preset file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, TileError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), TileError> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        Ok(())
    }
}

fn compute_size(span: f64, step: f64) -> i32 {
    if step == 0.0 {
        return 1;
    }
    (span / step).ceil() as i32 + 1
}

fn down_scale(level: i32, value: i32) -> i32 {
    (value as f64 / 2f64.powi(level - 1)).ceil() as i32
}

fn ceil_div(value: i32, divisor: i32) -> i32 {
    (value + divisor - 1).div_euclid(divisor)
}

/// Flat persisted form, shared by the JSON document and the `TilesRange`
/// table.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct TileRangeRecord {
    pub min_x: f64,
    pub max_x: f64,
    pub step_x: f64,
    pub size_x: i32,
    pub min_y: i64,
    pub max_y: i64,
    pub step_y: i64,
    pub size_y: i32,
    pub min_intensity: f64,
    pub max_intensity: f64,
}

impl From<TileRangeRecord> for TileRange {
    fn from(r: TileRangeRecord) -> Self {
        TileRange {
            min_x: r.min_x,
            max_x: r.max_x,
            step_x: r.step_x,
            min_y: r.min_y,
            max_y: r.max_y,
            step_y: r.step_y,
            size: Size::new(r.size_x, r.size_y),
            min_intensity: r.min_intensity,
            max_intensity: r.max_intensity,
        }
    }
}

impl From<TileRange> for TileRangeRecord {
    fn from(r: TileRange) -> Self {
        TileRangeRecord {
            min_x: r.min_x,
            max_x: r.max_x,
            step_x: r.step_x,
            size_x: r.size.width,
            min_y: r.min_y,
            max_y: r.max_y,
            step_y: r.step_y,
            size_y: r.size.height,
            min_intensity: r.min_intensity,
            max_intensity: r.max_intensity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_init_range() {
        let mut range = TileRange::default();

        range.init_x_range(0.0, 2.0, 0.5).unwrap();
        assert_eq!(range.size.width, 5);

        range.init_x_range_by_size(0.0, 2.0, 5).unwrap();
        assert_eq!(range.step_x, 0.5);

        range.init_y_range(0, 2, 1).unwrap();
        assert_eq!(range.size.height, 3);

        range.init_y_range_by_size(0, 2, 3).unwrap();
        assert_eq!(range.step_y, 1);

        assert!(range.is_valid());
    }

    #[test]
    fn test_height() {
        for (min_y, max_y, step_y, expected) in [(0, 9, 1, 10), (0, 2752, 1, 2753), (0, 10, 3, 5)] {
            let mut range = TileRange::default();
            range.init_y_range(min_y, max_y, step_y).unwrap();
            assert_eq!(range.size.height, expected);
        }
    }

    #[test]
    fn test_invalid_inputs() {
        let mut range = TileRange::default();
        assert!(range.init_x_range(2.0, 1.0, 0.5).is_err());
        assert!(range.init_x_range(0.0, 1.0, 0.0).is_err());
        assert!(range.init_x_range(0.0, f64::NAN, 0.1).is_err());
        assert!(range.init_y_range(0, 10, 0).is_err());
        assert!(range.init_x_range_by_size(0.0, 1.0, 0).is_err());
        assert!(range.init_y_range_by_size(5, 5, 3).is_err());
    }

    #[test]
    fn test_by_size_never_derives_zero_step() {
        let mut range = TileRange::default();
        assert!(range.init_x_range_by_size(0.0, 1.0, 1).is_err());
        assert!(range.init_y_range_by_size(0, 10, 1).is_err());
        assert!(range.init_y_range_by_size(0, 1, 5).is_err());
        assert!(range.init_y_range_by_size(9, 3, 2).is_err());

        range.init_y_range_by_size(5, 5, 1).unwrap();
        assert_eq!((range.step_y, range.size.height), (1, 1));

        let mut by_step = TileRange::default();
        by_step.init_y_range(5, 5, 1).unwrap();
        assert_eq!(by_step.size.height, range.size.height);
        assert_eq!(by_step.step_y, range.step_y);
    }

    #[test]
    fn test_mismatched_size_is_invalid() {
        let mut range = TileRange::with_steps(0.0, 2.0, 0.5, 0, 9, 1).unwrap();
        assert!(range.validate().is_ok());

        range.size.width = 7;
        assert!(!range.is_valid());
        assert!(matches!(range.validate(), Err(TileError::InvalidRange(_))));
    }

    #[test]
    fn test_level_width() {
        let range = TileRange {
            size: Size::new(10000, 2752),
            ..Default::default()
        };
        let expected = [10000, 5000, 2500, 1250, 625, 313];
        for (i, width) in expected.iter().enumerate() {
            let level = Level::uniform(i as i32 + 1);
            assert_eq!(range.level_width(level), *width);
        }
        assert_eq!(range.level_height(Level::new(1, 3)), 688);
    }

    #[test]
    fn test_level_step() {
        let range = TileRange::with_steps(100.0, 200.0, 0.25, 0, 100, 2).unwrap();
        assert_eq!(range.level_step_x(Level::ONE), 0.25);
        assert_eq!(range.level_step_x(Level::new(3, 1)), 1.0);
        assert_eq!(range.level_step_y(Level::new(3, 1)), 2.0);
        assert_eq!(range.level_step_y(Level::new(1, 4)), 16.0);
    }

    proptest! {
        #[test]
        fn test_level_step_doubles_per_level(
            step_x in 1e-6f64..100.0,
            step_y in 1i64..1000,
            x in 1i32..=16,
            y in 1i32..=16,
        ) {
            let range = TileRange {
                step_x,
                step_y,
                ..Default::default()
            };
            let level = Level::new(x, y);

            prop_assert_eq!(range.level_step_x(level), step_x * 2f64.powi(x - 1));
            prop_assert_eq!(range.level_step_y(level), step_y as f64 * 2f64.powi(y - 1));
            prop_assert_eq!(range.level_step_x(Level::new(x + 1, y)), 2.0 * range.level_step_x(level));
            prop_assert_eq!(range.level_step_y(Level::new(x, y + 1)), 2.0 * range.level_step_y(level));
        }
    }

    #[test]
    fn test_tile_count() {
        let mut range = TileRange::default();
        for (width, expected) in [(7, 1), (64, 1), (65, 2), (128, 2)] {
            range.size = Size::new(width, 0);
            assert_eq!(range.tile_count_x(), expected);
        }
    }

    #[test]
    fn test_level_tile_count() {
        let range = TileRange {
            size: Size::new(300, 129),
            ..Default::default()
        };
        assert_eq!(range.level_tile_count(Level::ONE), Size::new(5, 3));
        assert_eq!(range.level_tile_count(Level::new(2, 2)), Size::new(3, 2));
        assert_eq!(range.level_tile_count(Level::new(4, 1)), Size::new(1, 3));
    }

    #[test]
    fn test_json_field_names() {
        let mut range = TileRange::with_steps(380.0, 780.0, 0.5, 0, 2751, 1).unwrap();
        range.max_intensity = 1024.5;

        let json = range.to_json().unwrap();
        for field in ["MinX", "MaxX", "StepX", "SizeX", "MinY", "MaxY", "StepY", "SizeY", "MinIntensity", "MaxIntensity"] {
            assert!(json.contains(field), "missing {}", field);
        }

        let back = TileRange::from_json(&json).unwrap();
        assert_eq!(back, range);
    }

    #[test]
    fn test_json_missing_intensity_defaults() {
        let json = r#"{"MinX":0.0,"MaxX":2.0,"StepX":0.5,"SizeX":5,"MinY":0,"MaxY":2,"StepY":1,"SizeY":3}"#;
        let range = TileRange::from_json(json).unwrap();
        assert_eq!(range.size, Size::new(5, 3));
        assert_eq!(range.max_intensity, 0.0);
        assert!(range.is_valid());
    }

    #[test]
    fn test_area_and_null() {
        assert!(TileRange::default().is_null());
        let range = TileRange::with_steps(1.0, 3.0, 0.5, 10, 20, 1).unwrap();
        assert!(!range.is_null());
        assert_eq!(range.area(), RectF::new(1.0, 10.0, 2.0, 10.0));
    }
}
