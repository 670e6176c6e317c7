use std::iter;

use nalgebra::Vector4;

use super::image::Image;

/// Linear float color, one per color attachment texel.
pub type Rgba = Vector4<f32>;

pub struct Framebuffer {
    width: usize,
    height: usize,

    color: Vec<Image<Rgba>>,
    depth: Option<Image<f32>>,
}

#[derive(Debug, Clone, Copy)]
pub struct ClearValue {
    pub color: Rgba,
    pub depth: f32,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize, num_color: usize, has_depth: bool) -> Framebuffer {
        Framebuffer {
            width,
            height,

            color: Vec::from_iter(iter::repeat_with(|| Image::new(width, height)).take(num_color)),
            depth: match has_depth {
                true => Some(Image::new(width, height)),
                false => None,
            },
        }
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn color_attachments(&self) -> &[Image<Rgba>] {
        &self.color
    }

    pub fn depth_attachment(&self) -> Option<&Image<f32>> {
        self.depth.as_ref()
    }

    pub fn clear(&mut self, value: &ClearValue) {
        for attachment in &mut self.color {
            attachment.fill(value.color);
        }

        if let Some(depth) = &mut self.depth {
            depth.fill(value.depth);
        }
    }

    pub fn set_color(&mut self, attachment: usize, x: usize, y: usize, color: Rgba) {
        if let Some(image) = self.color.get_mut(attachment) {
            image.exchange(x, y, color);
        }
    }

    /// Less-than depth test against the depth attachment. Passes when there
    /// is no depth attachment. Writes the new depth on success if `write`.
    pub fn depth_test(&mut self, x: usize, y: usize, depth: f32, write: bool) -> bool {
        let Some(attachment) = &mut self.depth else {
            return true;
        };

        match attachment.at_mut(x, y) {
            Some(stored) if depth < *stored => {
                if write {
                    *stored = depth;
                }

                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_fills_every_attachment() {
        let mut fb = Framebuffer::new(4, 4, 2, true);
        fb.clear(&ClearValue {
            color: Rgba::new(0.25, 0.5, 0.75, 1.0),
            depth: 1.0,
        });

        for attachment in fb.color_attachments() {
            assert!(attachment.data().iter().all(|c| *c == Rgba::new(0.25, 0.5, 0.75, 1.0)));
        }

        let depth = fb.depth_attachment().expect("depth attachment");
        assert!(depth.data().iter().all(|d| *d == 1.0));
    }

    #[test]
    fn depth_test_keeps_nearest() {
        let mut fb = Framebuffer::new(1, 1, 0, true);
        fb.clear(&ClearValue {
            color: Rgba::zeros(),
            depth: 1.0,
        });

        assert!(fb.depth_test(0, 0, 0.5, true));
        assert!(!fb.depth_test(0, 0, 0.75, true));
        assert!(!fb.depth_test(0, 0, 0.5, true));
        assert!(fb.depth_test(0, 0, 0.25, false));
        assert_eq!(fb.depth_attachment().and_then(|d| d.at(0, 0)), Some(&0.5));
    }

    #[test]
    fn depth_test_without_attachment_passes() {
        let mut fb = Framebuffer::new(2, 2, 1, false);
        assert!(fb.depth_test(1, 1, 42.0, true));
    }
}
