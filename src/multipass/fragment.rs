//! Per-pixel shading: occlusion from the depth map, local lighting and the
//! output selection with its split-screen view.

use nalgebra::Point2;

use crate::graphics::{Declaration, FragmentContext, FragmentStage, Rgba, StageInterface, ValueKind};

use super::config::{OutputMode, ShadingConfig};
use super::lighting::LocalLighting;
use super::occlusion::horizon_occlusion;
use super::vertex::Varyings;
use super::DEPTH_MAP_UNIT;

pub struct MainFragment {
    config: ShadingConfig,
}

impl MainFragment {
    pub fn new(config: ShadingConfig) -> MainFragment {
        MainFragment { config }
    }

    pub fn config(&self) -> &ShadingConfig {
        &self.config
    }

    /// Shades one pixel. `frag_coord` is the window position of the pixel
    /// center; `depth_map` reads the bound depth texture at a texture
    /// coordinate.
    pub fn shade<S>(&self, frag_coord: Point2<f32>, varyings: &Varyings, depth_map: S) -> Rgba
    where
        S: Fn(Point2<f32>) -> f32,
    {
        let config = &self.config;

        // right of the split only the unoccluded value is shown
        let occluded = config
            .split_threshold()
            .is_none_or(|threshold| frag_coord.x <= threshold);

        let occlusion = if occluded {
            let center = frag_coord / config.reference_width;
            horizon_occlusion(&config.occlusion, center, depth_map).factor
        } else {
            1.0
        };

        let lighting = LocalLighting::evaluate(
            &config.attenuation,
            &varyings.smooth_normal,
            &varyings.light_direction,
            &varyings.position,
        );

        match config.output {
            OutputMode::Observed => {
                let value = lighting.attenuation * occlusion;
                Rgba::new(value, value, value, 1.0)
            }
            OutputMode::Composite => lighting
                .composite(&varyings.object_color.xyz(), occlusion)
                .push(1.0),
        }
    }
}

impl FragmentStage for MainFragment {
    type Varyings = Varyings;

    fn interface(&self) -> StageInterface {
        StageInterface {
            inputs: Varyings::declarations(),
            outputs: vec![Declaration::at(0, "frag_color", ValueKind::Vec4)],
            uniforms: vec![],
            samplers: vec![Declaration::at(
                DEPTH_MAP_UNIT as u32,
                "depth_map",
                ValueKind::Sampler2D,
            )],
        }
    }

    fn execute(&self, context: &FragmentContext<Varyings>) -> Rgba {
        self.shade(context.frag_coord.xy(), &context.working, |uv| {
            context.textures.sample(DEPTH_MAP_UNIT, uv)
        })
    }
}
