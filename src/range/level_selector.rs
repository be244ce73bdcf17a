use tracing::debug;

use crate::tile::Level;

/// Picks the stored pyramid level that best matches a display scale.
///
/// Level `n` corresponds to the zoom factor `1 / 2^(n - 1)`. Each axis is
/// resolved independently against the highest level present on that axis,
/// choosing the nearest zoom factor.
#[derive(Debug, Clone)]
pub struct TileLevelSelector {
    lookup_x: Vec<f64>,
    lookup_y: Vec<f64>,
}

impl TileLevelSelector {
    pub fn new(levels: &[Level]) -> Self {
        let max_x = levels.iter().map(|l| l.x).max().unwrap_or(0);
        let max_y = levels.iter().map(|l| l.y).max().unwrap_or(0);
        Self {
            lookup_x: zoom_lookup(max_x),
            lookup_y: zoom_lookup(max_y),
        }
    }

    /// Zoom factor of a single-axis level.
    pub fn level_to_zoom(level: i32) -> f64 {
        1.0 / 2f64.powi(level - 1)
    }

    /// Level whose zoom is closest to the given scale factors, or `None`
    /// when no levels are known.
    pub fn select_level(&self, scale_x: f64, scale_y: f64) -> Option<Level> {
        let x = zoom_to_level(scale_x, &self.lookup_x)?;
        let y = zoom_to_level(scale_y, &self.lookup_y)?;
        debug!(scale_x, scale_y, level = %Level::new(x, y), "Selected tile level");
        Some(Level::new(x, y))
    }
}

/// Ascending zoom factors, from the coarsest level down to level 1.
fn zoom_lookup(max_level: i32) -> Vec<f64> {
    (1..=max_level)
        .rev()
        .map(TileLevelSelector::level_to_zoom)
        .collect()
}

fn zoom_to_level(zoom: f64, lookup: &[f64]) -> Option<i32> {
    if lookup.is_empty() {
        return None;
    }

    let last = lookup.len() - 1;
    let pos = lookup.partition_point(|z| *z < zoom).min(last);

    let index = if pos > 0 {
        let here = (zoom - lookup[pos]).abs();
        let before = (zoom - lookup[pos - 1]).abs();
        if here < before {
            pos
        } else {
            pos - 1
        }
    } else {
        0
    };

    Some((last - index) as i32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector() -> TileLevelSelector {
        let levels: Vec<Level> = (1..=4).map(Level::uniform).collect();
        TileLevelSelector::new(&levels)
    }

    #[test]
    fn test_exact_zoom() {
        let selector = selector();
        assert_eq!(selector.select_level(1.0, 1.0), Some(Level::ONE));
        assert_eq!(selector.select_level(0.5, 0.25), Some(Level::new(2, 3)));
        assert_eq!(selector.select_level(0.125, 0.125), Some(Level::uniform(4)));
    }

    #[test]
    fn test_nearest_zoom() {
        let selector = selector();
        assert_eq!(selector.select_level(0.3, 0.45), Some(Level::new(3, 2)));
    }

    #[test]
    fn test_out_of_range_zoom_clamps() {
        let selector = selector();
        assert_eq!(selector.select_level(5.0, 5.0), Some(Level::ONE));
        assert_eq!(selector.select_level(0.001, 0.001), Some(Level::uniform(4)));
    }

    #[test]
    fn test_rip_levels() {
        let levels = [Level::ONE, Level::new(2, 1), Level::new(3, 1)];
        let selector = TileLevelSelector::new(&levels);
        assert_eq!(selector.select_level(0.25, 0.25), Some(Level::new(3, 1)));
    }

    #[test]
    fn test_no_levels() {
        let selector = TileLevelSelector::new(&[]);
        assert_eq!(selector.select_level(1.0, 1.0), None);
    }

    #[test]
    fn test_level_to_zoom() {
        assert_eq!(TileLevelSelector::level_to_zoom(1), 1.0);
        assert_eq!(TileLevelSelector::level_to_zoom(3), 0.25);
    }
}
