//! Shading parameters, their TOML form and validation.

use std::fs;
use std::path::Path;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which color the fragment stage writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// `attenuation * occlusion` as gray. The screen-blend composite is
    /// computed and overwritten.
    #[default]
    Observed,
    /// The screen-blend composite with specular highlight.
    Composite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcclusionConfig {
    pub rings: u32,
    pub samples: u32,
    /// Search radius of the first ring, in texture space.
    pub initial_radius: f32,
    pub radius_step: f32,
    /// Samples further in front of the center than this are treated as a
    /// different surface.
    pub depth_margin: f32,
    /// Radius multiplier of the long arm of each sample pair.
    pub far_scale: f32,
    /// Vertical radius multiplier of the long arm in the second pattern.
    pub vertical_stretch: f32,
}

impl Default for OcclusionConfig {
    fn default() -> Self {
        OcclusionConfig {
            rings: 6,
            samples: 6,
            initial_radius: 0.0001,
            radius_step: 0.0001,
            depth_margin: 0.0001,
            far_scale: 3.0,
            vertical_stretch: 32.0,
        }
    }
}

impl OcclusionConfig {
    /// One term per sample pair of both patterns over every ring.
    pub fn term_count(&self) -> u32 {
        self.rings * self.samples * 2
    }
}

/// `1 / (constant + linear * d + quadratic * d^2)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttenuationConfig {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for AttenuationConfig {
    fn default() -> Self {
        AttenuationConfig {
            constant: 1.0,
            linear: 0.1,
            quadratic: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadingConfig {
    /// Screen width the depth map lookup is normalized against. Both axes are
    /// divided by it.
    pub reference_width: f32,
    /// World-space light position.
    pub light_position: [f32; 3],
    pub output: OutputMode,
    /// Drop the occlusion term right of `reference_width / 2`.
    pub split_screen: bool,
    pub occlusion: OcclusionConfig,
    pub attenuation: AttenuationConfig,
}

impl Default for ShadingConfig {
    fn default() -> Self {
        ShadingConfig {
            reference_width: 640.0,
            light_position: [0.0, 1.0, 1.0],
            output: OutputMode::Observed,
            split_screen: true,
            occlusion: OcclusionConfig::default(),
            attenuation: AttenuationConfig::default(),
        }
    }
}

impl ShadingConfig {
    pub fn from_toml_str(source: &str) -> Result<ShadingConfig, ConfigError> {
        let config: ShadingConfig = toml::from_str(source)?;
        config.validate()?;

        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<ShadingConfig, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)?;
        let config = ShadingConfig::from_toml_str(&source)?;

        tracing::debug!(path = %path.display(), ?config, "loaded shading configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.reference_width.is_finite() && self.reference_width > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "reference_width must be a positive number, got {}",
                self.reference_width
            )));
        }

        if self.light_position.iter().any(|c| !c.is_finite()) {
            return Err(ConfigError::Invalid("light_position must be finite".into()));
        }

        let occlusion = &self.occlusion;
        if occlusion.rings == 0 || occlusion.samples == 0 {
            return Err(ConfigError::Invalid(
                "occlusion.rings and occlusion.samples must be at least 1".into(),
            ));
        }

        let lengths = [
            ("occlusion.initial_radius", occlusion.initial_radius),
            ("occlusion.radius_step", occlusion.radius_step),
            ("occlusion.depth_margin", occlusion.depth_margin),
            ("occlusion.far_scale", occlusion.far_scale),
            ("occlusion.vertical_stretch", occlusion.vertical_stretch),
            ("attenuation.constant", self.attenuation.constant),
            ("attenuation.linear", self.attenuation.linear),
            ("attenuation.quadratic", self.attenuation.quadratic),
        ];

        for (name, value) in lengths {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be finite and not negative, got {value}"
                )));
            }
        }

        Ok(())
    }

    pub fn light_position(&self) -> Point3<f32> {
        Point3::from(self.light_position)
    }

    pub fn split_threshold(&self) -> Option<f32> {
        self.split_screen.then_some(self.reference_width / 2.0)
    }
}
