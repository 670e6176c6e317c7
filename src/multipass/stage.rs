//! The shading stage as drivers see it: construction, activation and
//! parameter uploads.

use nalgebra::Matrix4;

use crate::graphics::{Context, Program, ProgramBuilder, ShaderCompileError};

use super::config::{ConfigError, ShadingConfig};
use super::fragment::MainFragment;
use super::vertex::MainVertex;

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Compile(#[from] ShaderCompileError),
}

/// The compiled shading program and its parameter slots.
///
/// Typical frame:
///
/// ```ignore
/// stage.activate(&mut context);
/// stage.set_matrix_parameter(&mut context, MODEL_MATRIX, &model);
/// stage.set_matrix_parameter(&mut context, VIEW_MATRIX, &view);
/// stage.set_matrix_parameter(&mut context, PROJECTION_MATRIX, &projection);
/// stage.set_scalar_parameter(&mut context, SMOOTHNESS, 0.5);
/// context.bind_texture(DEPTH_MAP_UNIT, depth_map);
/// rasterizer.render_indexed(&context, &call)?;
/// ```
pub struct ShadingStage {
    program: Program<MainVertex, MainFragment>,
}

impl ShadingStage {
    pub fn new() -> Result<ShadingStage, StageError> {
        ShadingStage::with_config(ShadingConfig::default())
    }

    /// Validates `config` before building the program.
    pub fn with_config(config: ShadingConfig) -> Result<ShadingStage, StageError> {
        config.validate()?;

        let vertex = MainVertex::new(config.light_position());
        let program = ProgramBuilder::new(vertex, MainFragment::new(config))
            .label("multipass shading")
            .build()?;

        Ok(ShadingStage { program })
    }

    /// Makes this program current on `context`. Calling it again is a no-op.
    pub fn activate(&self, context: &mut Context) {
        context.use_program(&self.program);
    }

    /// Uploads to `slot` of whichever program is current on `context`, which
    /// need not be this one.
    pub fn set_matrix_parameter(&self, context: &mut Context, slot: u32, matrix: &Matrix4<f32>) {
        context.uniform_matrix4(slot, matrix);
    }

    /// Same as [`ShadingStage::set_matrix_parameter`] for float slots.
    pub fn set_scalar_parameter(&self, context: &mut Context, slot: u32, value: f32) {
        context.uniform_float(slot, value);
    }

    pub fn program(&self) -> &Program<MainVertex, MainFragment> {
        &self.program
    }

    pub fn config(&self) -> &ShadingConfig {
        self.program.fragment().config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::UniformValue;
    use crate::multipass::{OcclusionConfig, MODEL_MATRIX, PROJECTION_MATRIX, SMOOTHNESS};

    fn counting_matrix() -> Matrix4<f32> {
        let values: Vec<f32> = (1..=16).map(|i| i as f32).collect();
        Matrix4::from_column_slice(&values)
    }

    #[test]
    fn builds_with_defaults() {
        let stage = ShadingStage::new().expect("stage builds");

        assert_eq!(stage.config(), &ShadingConfig::default());
        assert_eq!(stage.program().object().label(), Some("multipass shading"));
    }

    #[test]
    fn rejects_invalid_config() {
        for reference_width in [0.0, -640.0, f32::NAN, f32::INFINITY] {
            let config = ShadingConfig {
                reference_width,
                split_screen: false,
                ..ShadingConfig::default()
            };

            assert!(
                matches!(ShadingStage::with_config(config), Err(StageError::Config(_))),
                "reference_width = {reference_width}"
            );
        }

        let config = ShadingConfig {
            occlusion: OcclusionConfig {
                rings: 0,
                ..Default::default()
            },
            ..ShadingConfig::default()
        };
        assert!(matches!(ShadingStage::with_config(config), Err(StageError::Config(_))));
    }

    #[test]
    fn activate_is_idempotent() {
        let stage = ShadingStage::new().unwrap();
        let mut context = Context::new();

        stage.activate(&mut context);
        stage.activate(&mut context);

        assert_eq!(context.current_program(), Some(stage.program().id()));
    }

    #[test]
    fn matrix_reads_back_column_major() {
        let stage = ShadingStage::new().unwrap();
        let mut context = Context::new();
        let matrix = counting_matrix();

        stage.activate(&mut context);
        stage.set_matrix_parameter(&mut context, MODEL_MATRIX, &matrix);

        let stored = stage.program().uniform(MODEL_MATRIX).unwrap();
        let expected: Vec<f32> = (1..=16).map(|i| i as f32).collect();

        assert_eq!(stored.as_slice(), expected.as_slice());
        // second column starts at element 4
        assert_eq!(matrix[(0, 1)], 5.0);
    }

    #[test]
    fn scalar_upload() {
        let stage = ShadingStage::new().unwrap();
        let mut context = Context::new();

        stage.activate(&mut context);
        stage.set_scalar_parameter(&mut context, SMOOTHNESS, 0.25);

        assert_eq!(stage.program().uniform(SMOOTHNESS), Some(UniformValue::Float(0.25)));
    }

    #[test]
    fn upload_without_bound_program_is_dropped() {
        let stage = ShadingStage::new().unwrap();
        let mut context = Context::new();

        stage.set_matrix_parameter(&mut context, MODEL_MATRIX, &counting_matrix());
        stage.activate(&mut context);

        assert_eq!(stage.program().uniform(MODEL_MATRIX), Some(UniformValue::Unset));
    }

    #[test]
    fn upload_targets_the_current_program() {
        let first = ShadingStage::new().unwrap();
        let second = ShadingStage::new().unwrap();
        let mut context = Context::new();

        second.activate(&mut context);
        first.set_matrix_parameter(&mut context, PROJECTION_MATRIX, &counting_matrix());

        assert_eq!(first.program().uniform(PROJECTION_MATRIX), Some(UniformValue::Unset));
        assert_eq!(
            second.program().uniform(PROJECTION_MATRIX),
            Some(UniformValue::Mat4(counting_matrix()))
        );
    }

    #[test]
    fn mismatched_uploads_are_ignored() {
        let stage = ShadingStage::new().unwrap();
        let mut context = Context::new();
        stage.activate(&mut context);

        stage.set_scalar_parameter(&mut context, MODEL_MATRIX, 1.0);
        stage.set_matrix_parameter(&mut context, SMOOTHNESS, &Matrix4::identity());
        stage.set_scalar_parameter(&mut context, 9, 1.0);

        assert_eq!(stage.program().uniform(MODEL_MATRIX), Some(UniformValue::Unset));
        assert_eq!(stage.program().uniform(SMOOTHNESS), Some(UniformValue::Unset));
        assert_eq!(stage.program().uniform(9), Some(UniformValue::Unset));
    }

    #[test]
    fn unbinding_keeps_values() {
        let stage = ShadingStage::new().unwrap();
        let mut context = Context::new();

        stage.activate(&mut context);
        stage.set_scalar_parameter(&mut context, SMOOTHNESS, 1.0);
        context.unbind_program();
        stage.set_scalar_parameter(&mut context, SMOOTHNESS, 0.0);

        assert_eq!(context.current_program(), None);
        assert_eq!(stage.program().uniform(SMOOTHNESS), Some(UniformValue::Float(1.0)));
    }
}
