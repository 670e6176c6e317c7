use nalgebra::Point2;

use super::framebuffer::Framebuffer;
use super::image::Image;

const TEXEL_LIMIT: f32 = 1e9;

/// What happens to texel indices outside the image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WrapMode {
    #[default]
    ClampToEdge,
    Repeat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sampler {
    pub wrap: WrapMode,
    pub filter: FilterMode,
}

/// Single-channel float texture, sampled with normalized coordinates.
#[derive(Debug, Clone)]
pub struct Texture2D {
    image: Image<f32>,
    sampler: Sampler,
}

impl Texture2D {
    pub fn new(image: Image<f32>, sampler: Sampler) -> Texture2D {
        Texture2D { image, sampler }
    }

    /// Copies the depth attachment of a finished pass.
    pub fn from_depth_attachment(framebuffer: &Framebuffer, sampler: Sampler) -> Option<Texture2D> {
        framebuffer
            .depth_attachment()
            .map(|depth| Texture2D::new(depth.clone(), sampler))
    }

    pub fn size(&self) -> (usize, usize) {
        self.image.size()
    }

    pub fn sampler(&self) -> Sampler {
        self.sampler
    }

    pub fn image(&self) -> &Image<f32> {
        &self.image
    }

    pub fn sample(&self, uv: Point2<f32>) -> f32 {
        let (width, height) = self.image.size();
        if width == 0 || height == 0 {
            return 0.0;
        }

        // far off the image f32 has no fractional texel left; the bound keeps
        // the integer indices and their neighbours in range
        let u = (uv.x * width as f32).clamp(-TEXEL_LIMIT, TEXEL_LIMIT);
        let v = (uv.y * height as f32).clamp(-TEXEL_LIMIT, TEXEL_LIMIT);

        match self.sampler.filter {
            FilterMode::Nearest => self.fetch(u.floor() as i64, v.floor() as i64),
            FilterMode::Linear => {
                let u = u - 0.5;
                let v = v - 0.5;

                let x0 = u.floor();
                let y0 = v.floor();
                let fx = u - x0;
                let fy = v - y0;

                let (x0, y0) = (x0 as i64, y0 as i64);

                let bottom = lerp(self.fetch(x0, y0), self.fetch(x0 + 1, y0), fx);
                let top = lerp(self.fetch(x0, y0 + 1), self.fetch(x0 + 1, y0 + 1), fx);
                lerp(bottom, top, fy)
            }
        }
    }

    fn fetch(&self, x: i64, y: i64) -> f32 {
        let (width, height) = self.image.size();
        let x = wrap(x, width, self.sampler.wrap);
        let y = wrap(y, height, self.sampler.wrap);

        self.image.at(x, y).copied().unwrap_or(0.0)
    }
}

// equal endpoints must give the endpoint back exactly
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn wrap(index: i64, size: usize, mode: WrapMode) -> usize {
    let size = size as i64;
    match mode {
        WrapMode::ClampToEdge => index.clamp(0, size - 1) as usize,
        WrapMode::Repeat => index.rem_euclid(size) as usize,
    }
}
