use std::sync::Arc;

use nalgebra::{Matrix4, Point2};

use super::program::{Program, ProgramId, ProgramObject, UniformValue, Uniforms};
use super::texture::Texture2D;

pub const MAX_TEXTURE_UNITS: usize = 8;

/// Textures bound to sampler units.
#[derive(Debug, Clone, Default)]
pub struct TextureUnits {
    units: [Option<Arc<Texture2D>>; MAX_TEXTURE_UNITS],
}

impl TextureUnits {
    pub fn get(&self, unit: usize) -> Option<&Texture2D> {
        self.units.get(unit).and_then(|texture| texture.as_deref())
    }

    /// Unbound units sample as zero.
    pub fn sample(&self, unit: usize, uv: Point2<f32>) -> f32 {
        self.get(unit).map_or(0.0, |texture| texture.sample(uv))
    }
}

/// The current pipeline state: which program draws use and which textures
/// they can sample. Uploads always target the bound program.
#[derive(Debug, Default)]
pub struct Context {
    current: Option<Arc<ProgramObject>>,
    textures: TextureUnits,
}

impl Context {
    pub fn new() -> Context {
        Context::default()
    }

    pub fn use_program<V, F>(&mut self, program: &Program<V, F>) {
        self.current = Some(Arc::clone(program.object()));
    }

    pub fn unbind_program(&mut self) {
        self.current = None;
    }

    pub fn current_program(&self) -> Option<ProgramId> {
        self.current.as_ref().map(|program| program.id())
    }

    pub fn bind_texture(&mut self, unit: usize, texture: Arc<Texture2D>) {
        match self.textures.units.get_mut(unit) {
            Some(slot) => *slot = Some(texture),
            None => tracing::warn!(unit, limit = MAX_TEXTURE_UNITS, "texture unit out of range"),
        }
    }

    pub fn unbind_texture(&mut self, unit: usize) {
        if let Some(slot) = self.textures.units.get_mut(unit) {
            *slot = None;
        }
    }

    pub fn textures(&self) -> &TextureUnits {
        &self.textures
    }

    /// Column-major 4x4 upload to the bound program. Dropped when nothing is
    /// bound.
    pub fn uniform_matrix4(&mut self, location: u32, matrix: &Matrix4<f32>) {
        self.upload(location, UniformValue::Mat4(*matrix));
    }

    pub fn uniform_float(&mut self, location: u32, value: f32) {
        self.upload(location, UniformValue::Float(value));
    }

    fn upload(&mut self, location: u32, value: UniformValue) {
        match &self.current {
            Some(program) => program.store(location, value),
            None => tracing::debug!(location, "no program bound, upload dropped"),
        }
    }

    pub(crate) fn current_uniforms(&self) -> Option<Uniforms> {
        self.current.as_ref().map(|program| program.uniforms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::{Image, Sampler};

    fn constant(value: f32) -> Arc<Texture2D> {
        Arc::new(Texture2D::new(Image::from_fn(2, 2, |_, _| value), Sampler::default()))
    }

    #[test]
    fn unbound_units_sample_zero() {
        let context = Context::new();

        assert!(context.textures().get(0).is_none());
        assert_eq!(context.textures().sample(0, Point2::new(0.5, 0.5)), 0.0);
    }

    #[test]
    fn bound_texture_is_sampled() {
        let mut context = Context::new();
        context.bind_texture(3, constant(0.25));

        assert_eq!(context.textures().sample(3, Point2::new(0.1, 0.9)), 0.25);

        context.unbind_texture(3);
        assert_eq!(context.textures().sample(3, Point2::new(0.1, 0.9)), 0.0);
    }

    #[test]
    fn out_of_range_unit_is_ignored() {
        let mut context = Context::new();
        context.bind_texture(MAX_TEXTURE_UNITS, constant(1.0));

        assert!((0..MAX_TEXTURE_UNITS).all(|unit| context.textures().get(unit).is_none()));
        assert_eq!(context.textures().sample(MAX_TEXTURE_UNITS, Point2::new(0.5, 0.5)), 0.0);
    }

    #[test]
    fn starts_without_program() {
        let mut context = Context::new();
        assert_eq!(context.current_program(), None);

        context.uniform_float(0, 1.0);
        assert!(context.current_uniforms().is_none());
    }
}
