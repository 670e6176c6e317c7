use std::iter::{self, Iterator};
use std::mem;

/// Row-major 2D storage. Row 0 is the bottom of the image, matching window
/// coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Image<T: Sized> {
    data: Vec<T>,
    width: usize,
    height: usize,
}

impl<T: Sized + Default> Image<T> {
    pub fn new(width: usize, height: usize) -> Image<T> {
        let total_pixels = width * height;

        Image {
            data: Vec::from_iter(iter::repeat_with(|| T::default()).take(total_pixels)),
            width,
            height,
        }
    }
}

impl<T: Sized> Image<T> {
    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> Image<T>
    where
        F: FnMut(usize, usize) -> T,
    {
        Image {
            data: CoordinateIterator::new(0, 0, width, height)
                .map(|(x, y)| f(x, y))
                .collect(),
            width,
            height,
        }
    }

    /// Wraps existing row-major data. Returns `None` if the length does not
    /// match the dimensions.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Option<Image<T>> {
        if data.len() != width * height {
            return None;
        }

        Some(Image {
            data,
            width,
            height,
        })
    }

    fn index_of(&self, x: usize, y: usize) -> Option<usize> {
        if x >= self.width || y >= self.height {
            None
        } else {
            Some(y * self.width + x)
        }
    }

    pub fn at(&self, x: usize, y: usize) -> Option<&T> {
        self.index_of(x, y).map(|index| &self.data[index])
    }

    pub fn at_mut(&mut self, x: usize, y: usize) -> Option<&mut T> {
        self.index_of(x, y).map(|index| &mut self.data[index])
    }

    pub fn exchange(&mut self, x: usize, y: usize, value: T) -> Option<T> {
        self.index_of(x, y).map(|index| {
            let mut other = value;
            mem::swap(&mut other, &mut self.data[index]);

            other
        })
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn coordinates(&self) -> CoordinateIterator {
        CoordinateIterator::new(0, 0, self.width, self.height)
    }
}

impl<T: Sized + Copy> Image<T> {
    pub fn fill(&mut self, value: T) {
        self.data.iter_mut().for_each(|texel| *texel = value);
    }
}

/// Walks a rectangle row by row, yielding absolute `(x, y)` pairs.
#[derive(Debug, Clone)]
pub struct CoordinateIterator {
    pixel_index: usize,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
}

impl CoordinateIterator {
    pub(crate) fn new(x: usize, y: usize, width: usize, height: usize) -> CoordinateIterator {
        CoordinateIterator {
            pixel_index: 0,
            x,
            y,
            width,
            height,
        }
    }
}

impl Iterator for CoordinateIterator {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let total_pixels = self.width * self.height;
        if self.pixel_index >= total_pixels {
            return None;
        }

        let x = self.x + self.pixel_index % self.width;
        let y = self.y + self.pixel_index / self.width;
        self.pixel_index += 1;

        Some((x, y))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.width * self.height).saturating_sub(self.pixel_index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CoordinateIterator {}
