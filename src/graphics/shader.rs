use nalgebra::{Point3, SVector, Vector4};

use super::context::TextureUnits;
use super::framebuffer::Rgba;
use super::program::{ProgramId, StageInterface, Uniforms};

pub struct VertexContext<'a, A> {
    pub vertex_id: usize,
    pub instance_id: usize,

    pub attributes: &'a A,
    pub uniforms: &'a Uniforms,
}

pub struct FragmentContext<'a, W> {
    pub instance_id: usize,

    /// Window coordinates of the pixel center (`x + 0.5`, `y + 0.5`) and the
    /// fragment depth in `[0, 1]`.
    pub frag_coord: Point3<f32>,
    pub front_facing: bool,

    pub uniforms: &'a Uniforms,
    pub textures: &'a TextureUnits,
    pub working: W,
}

pub struct VertexOutput<W> {
    /// Clip-space position.
    pub position: Vector4<f32>,
    pub data: W,
}

/// Interpolation of per-vertex outputs across a face. Weights sum to one.
pub trait Blendable: Sized {
    fn blend(data: &[&Self], weights: &[f32]) -> Self;
}

impl Blendable for () {
    fn blend(_data: &[&Self], _weights: &[f32]) -> Self {}
}

impl Blendable for f32 {
    fn blend(data: &[&Self], weights: &[f32]) -> Self {
        data.iter()
            .zip(weights)
            .fold(0.0, |acc, (value, weight)| acc + **value * weight)
    }
}

impl<const D: usize> Blendable for SVector<f32, D> {
    fn blend(data: &[&Self], weights: &[f32]) -> Self {
        data.iter()
            .zip(weights)
            .fold(Self::zeros(), |acc, (value, weight)| acc + value.scale(*weight))
    }
}

pub trait VertexStage: Send + Sync {
    type Attributes: Sync;
    type Varyings: Blendable + Send + Sync;

    fn interface(&self) -> StageInterface;
    fn execute(&self, context: &VertexContext<Self::Attributes>) -> VertexOutput<Self::Varyings>;
}

pub trait FragmentStage: Send + Sync {
    type Varyings;

    fn interface(&self) -> StageInterface;
    fn execute(&self, context: &FragmentContext<Self::Varyings>) -> Rgba;
}

/// A linked program as seen by the rasterizer.
pub trait Shader: Sync {
    type Attributes: Sync;
    type Working: Blendable + Send + Sync;

    fn id(&self) -> ProgramId;

    fn vertex_stage(&self, context: &VertexContext<Self::Attributes>) -> VertexOutput<Self::Working>;
    fn fragment_stage(&self, context: &FragmentContext<Self::Working>) -> Rgba;
}
