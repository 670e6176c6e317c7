//! Local lighting terms and the screen-blend composite.

use nalgebra::{Vector3, Vector4};

use super::config::AttenuationConfig;

/// Weight of both layers of the screen blend.
pub const SCREEN_WEIGHT: f32 = 0.5;
pub const SPECULAR_WEIGHT: f32 = 0.08;

/// Local lighting terms of one fragment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalLighting {
    pub attenuation: f32,
    /// `n . l`, not clamped; negative when the light is behind the surface.
    pub diffuse: f32,
    pub specular: f32,
    /// Whether the reflected light leaves on the normal's side.
    pub front_facing: bool,
}

impl LocalLighting {
    /// `position` is the view-space position; the eye sits at the origin.
    pub fn evaluate(
        config: &AttenuationConfig,
        smooth_normal: &Vector3<f32>,
        light_direction: &Vector3<f32>,
        position: &Vector4<f32>,
    ) -> LocalLighting {
        let normal = normalize_or_zero(smooth_normal);
        let light = normalize_or_zero(light_direction);
        let eye = normalize_or_zero(&-position.xyz());

        let reflected = normalize_or_zero(&(normal * (2.0 * light.dot(&normal)) - light));
        let front_facing = reflected.dot(&normal) >= 0.0;

        let highlight = if front_facing {
            reflected.dot(&eye).clamp(0.0, 1.0)
        } else {
            0.0
        };

        LocalLighting {
            attenuation: attenuation(config, light_direction.norm()),
            diffuse: normal.dot(&light),
            specular: highlight * highlight,
            front_facing,
        }
    }

    /// Screen blend of the diffuse layer over the ambient layer, both taken
    /// at half strength, scaled by `occlusion` and topped with the specular
    /// highlight.
    pub fn composite(&self, color: &Vector3<f32>, occlusion: f32) -> Vector3<f32> {
        let diffuse = color * (SCREEN_WEIGHT * self.diffuse);
        let ambient = color * SCREEN_WEIGHT;

        (screen(&diffuse, &ambient) * occlusion).add_scalar(SPECULAR_WEIGHT * self.specular)
    }
}

/// `clamp(1 / (constant + linear * d + quadratic * d^2), 0, 1)`.
pub fn attenuation(config: &AttenuationConfig, distance: f32) -> f32 {
    let falloff = config.constant + config.linear * distance + config.quadratic * distance * distance;
    (1.0 / falloff).clamp(0.0, 1.0)
}

/// `1 - (1 - a) * (1 - b)` per channel.
pub fn screen(a: &Vector3<f32>, b: &Vector3<f32>) -> Vector3<f32> {
    Vector3::repeat(1.0) - (Vector3::repeat(1.0) - a).component_mul(&(Vector3::repeat(1.0) - b))
}

/// Zero-length input stays zero.
pub fn normalize_or_zero(v: &Vector3<f32>) -> Vector3<f32> {
    v.try_normalize(0.0).unwrap_or_else(Vector3::zeros)
}
