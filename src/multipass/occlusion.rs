//! Horizon-based occlusion estimate from a depth map.
//!
//! Around the pixel's texture coordinate the search walks `rings` circles of
//! growing radius. On each ring, `samples` angles spread over a half turn
//! each place two sample pairs: a short arm at the angle against a long arm
//! on the opposite side, and a long, vertically stretched arm at the angle
//! against a short arm opposite. A pair counts only when both samples lie in
//! front of the center by no more than the depth margin; it then darkens the
//! pixel by the normalized sum of both horizon angles.

use std::f32::consts::PI;

use nalgebra::{Point2, Vector2};

use super::config::OcclusionConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Occlusion {
    /// 1 is fully open, 0 fully occluded.
    pub factor: f32,
    /// Center depth accumulated over contributing pairs, divided by six.
    pub average_depth: f32,
}

impl Occlusion {
    pub const OPEN: Occlusion = Occlusion {
        factor: 1.0,
        average_depth: 0.0,
    };
}

/// Estimates occlusion at `center` (texture space). `sample` reads the depth
/// map; smaller values are closer to the viewer.
pub fn horizon_occlusion<S>(config: &OcclusionConfig, center: Point2<f32>, sample: S) -> Occlusion
where
    S: Fn(Point2<f32>) -> f32,
{
    let center_depth = sample(center);
    let weight = config.term_count() as f32;

    let mut radius = config.initial_radius;
    let mut factor = 1.0f32;
    let mut depth = 0.0f32;

    for _ in 0..config.rings {
        for i in 0..config.samples {
            let angle = PI * i as f32 / config.samples as f32;
            let (sin, cos) = angle.sin_cos();
            let (sin_opposite, cos_opposite) = (angle + PI).sin_cos();

            let short = Vector2::new(cos, sin) * radius;
            let short_opposite = Vector2::new(cos_opposite, sin_opposite) * radius;

            let patterns = [
                (short, short_opposite * config.far_scale),
                (
                    Vector2::new(
                        config.far_scale * radius * cos,
                        config.vertical_stretch * radius * sin,
                    ),
                    short_opposite,
                ),
            ];

            for (first, second) in patterns {
                let Some(near) = horizon(config, center_depth, sample(center + first), radius)
                else {
                    continue;
                };
                let Some(far) = horizon(config, center_depth, sample(center + second), radius)
                else {
                    continue;
                };

                factor -= ((near + far) / PI).clamp(0.0, 1.0) / weight;
                depth += center_depth;
            }
        }

        radius += config.radius_step;
    }

    Occlusion {
        factor: factor.clamp(0.0, 1.0),
        average_depth: (depth / 6.0).clamp(0.0, 1.0),
    }
}

/// Horizon angle towards one sample, or `None` when the sample is not in
/// front of the center or belongs to a surface beyond the depth margin.
fn horizon(config: &OcclusionConfig, center_depth: f32, sample_depth: f32, radius: f32) -> Option<f32> {
    if sample_depth >= center_depth || sample_depth + config.depth_margin < center_depth {
        return None;
    }

    Some((radius / (center_depth - sample_depth)).atan())
}
