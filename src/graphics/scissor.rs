use super::image::CoordinateIterator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scissor {
    pub x: usize,
    pub y: usize,

    pub width: usize,
    pub height: usize,
}

impl Scissor {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Scissor {
        Scissor {
            x,
            y,
            width,
            height,
        }
    }

    /// Covers a whole render target.
    pub fn full(width: usize, height: usize) -> Scissor {
        Scissor::new(0, 0, width, height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn coordinates(&self) -> CoordinateIterator {
        CoordinateIterator::new(self.x, self.y, self.width, self.height)
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        let x1 = self.x + self.width;
        let y1 = self.y + self.height;

        x >= self.x && x < x1 && y >= self.y && y < y1
    }

    pub fn intersect_with(&self, other: &Scissor) -> Option<Scissor> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);

        let x1 = (self.x + self.width).min(other.x + other.width);
        let y1 = (self.y + self.height).min(other.y + other.height);

        if x1 <= x0 || y1 <= y0 {
            None
        } else {
            Some(Scissor {
                x: x0,
                y: y0,

                width: x1 - x0,
                height: y1 - y0,
            })
        }
    }

    /// Splits into row-major tiles of at most `size` x `size` pixels.
    pub fn tiles(&self, size: usize) -> Vec<Scissor> {
        let size = size.max(1);
        let mut tiles = Vec::new();

        for ty in (self.y..self.y + self.height).step_by(size) {
            for tx in (self.x..self.x + self.width).step_by(size) {
                tiles.push(Scissor {
                    x: tx,
                    y: ty,
                    width: size.min(self.x + self.width - tx),
                    height: size.min(self.y + self.height - ty),
                });
            }
        }

        tiles
    }
}
