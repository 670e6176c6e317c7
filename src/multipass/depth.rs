//! Depth-only pass producing the map the shading stage samples.

use nalgebra::Matrix4;

use crate::graphics::{
    Context, Declaration, FragmentContext, FragmentStage, Program, ProgramBuilder, Rgba,
    ShaderCompileError, StageInterface, ValueKind, VertexContext, VertexOutput, VertexStage,
};

use super::vertex::Vertex;
use super::{MODEL_MATRIX, POSITION_ATTRIBUTE, PROJECTION_MATRIX, VIEW_MATRIX};

pub struct DepthVertex;
pub struct DepthFragment;

impl VertexStage for DepthVertex {
    type Attributes = Vertex;
    type Varyings = ();

    fn interface(&self) -> StageInterface {
        StageInterface {
            inputs: vec![Declaration::at(POSITION_ATTRIBUTE, "position", ValueKind::Vec3)],
            outputs: vec![],
            uniforms: vec![
                Declaration::at(MODEL_MATRIX, "model_mat", ValueKind::Mat4),
                Declaration::at(VIEW_MATRIX, "view_mat", ValueKind::Mat4),
                Declaration::at(PROJECTION_MATRIX, "projection_mat", ValueKind::Mat4),
            ],
            samplers: vec![],
        }
    }

    fn execute(&self, context: &VertexContext<Vertex>) -> VertexOutput<()> {
        let uniforms = context.uniforms;
        let transform =
            uniforms.mat4(PROJECTION_MATRIX) * uniforms.mat4(VIEW_MATRIX) * uniforms.mat4(MODEL_MATRIX);

        VertexOutput {
            position: transform * context.attributes.position.to_homogeneous(),
            data: (),
        }
    }
}

impl FragmentStage for DepthFragment {
    type Varyings = ();

    fn interface(&self) -> StageInterface {
        StageInterface {
            outputs: vec![Declaration::at(0, "frag_depth", ValueKind::Vec4)],
            ..StageInterface::default()
        }
    }

    /// Writes the window depth as gray so color attachments can be inspected.
    fn execute(&self, context: &FragmentContext<()>) -> Rgba {
        let depth = context.frag_coord.z;
        Rgba::new(depth, depth, depth, 1.0)
    }
}

/// Renders geometry with the shading stage's slot layout into a depth
/// attachment.
pub struct DepthPrepass {
    program: Program<DepthVertex, DepthFragment>,
}

impl DepthPrepass {
    pub fn new() -> Result<DepthPrepass, ShaderCompileError> {
        let program = ProgramBuilder::new(DepthVertex, DepthFragment)
            .label("depth prepass")
            .build()?;

        Ok(DepthPrepass { program })
    }

    pub fn activate(&self, context: &mut Context) {
        context.use_program(&self.program);
    }

    /// Uploads the three transforms to the current program.
    pub fn set_transforms(
        &self,
        context: &mut Context,
        model: &Matrix4<f32>,
        view: &Matrix4<f32>,
        projection: &Matrix4<f32>,
    ) {
        context.uniform_matrix4(MODEL_MATRIX, model);
        context.uniform_matrix4(VIEW_MATRIX, view);
        context.uniform_matrix4(PROJECTION_MATRIX, projection);
    }

    pub fn program(&self) -> &Program<DepthVertex, DepthFragment> {
        &self.program
    }
}
