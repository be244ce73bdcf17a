use crate::manager::TileManager;
use crate::tile::Level;

use super::RandomTileIterator;

/// Bilinear interpolation between the four grid cells around a fractional
/// position.
pub struct RandomBilinearTileIterator<'a> {
    iterator: RandomTileIterator<'a>,
    last_value: f64,
}

impl<'a> RandomBilinearTileIterator<'a> {
    pub fn new(manager: &'a TileManager<'a>) -> Self {
        Self {
            iterator: RandomTileIterator::new(manager),
            last_value: 0.0,
        }
    }

    /// Interpolate at grid position `(x, y)` on `level`.
    pub fn move_to(&mut self, level: Level, x: f64, y: f64) {
        let ix = x.floor();
        let iy = y.floor();
        let dx = x - ix;
        let dy = y - iy;
        let (ix, iy) = (ix as i32, iy as i32);

        let corners = [
            (ix, iy, (1.0 - dx) * (1.0 - dy)),
            (ix + 1, iy, dx * (1.0 - dy)),
            (ix, iy + 1, (1.0 - dx) * dy),
            (ix + 1, iy + 1, dx * dy),
        ];

        self.last_value = 0.0;
        for (cx, cy, weight) in corners {
            self.iterator.move_to(level, cx, cy);
            self.last_value += self.iterator.value() * weight;
        }
    }

    /// Interpolated value from the last [`move_to`](Self::move_to).
    pub fn value(&self) -> f64 {
        self.last_value
    }
}
