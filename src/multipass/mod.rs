//! Final shading pass of a depth-driven renderer: horizon-based ambient
//! occlusion read from an earlier pass's depth map, combined with local
//! lighting.
//!
//! Parameter slots and attribute locations are fixed; drivers upload through
//! [`ShadingStage`] and bind the depth map at [`DEPTH_MAP_UNIT`].

pub mod config;
pub mod depth;
pub mod fragment;
pub mod lighting;
pub mod occlusion;
pub mod stage;
pub mod vertex;

pub use config::*;
pub use depth::*;
pub use fragment::*;
pub use lighting::*;
pub use occlusion::*;
pub use stage::*;
pub use vertex::*;

pub const MODEL_MATRIX: u32 = 0;
pub const VIEW_MATRIX: u32 = 1;
pub const PROJECTION_MATRIX: u32 = 2;
pub const SMOOTHNESS: u32 = 3;

pub const DEPTH_MAP_UNIT: usize = 0;

pub const POSITION_ATTRIBUTE: u32 = 0;
pub const FACE_NORMAL_ATTRIBUTE: u32 = 1;
pub const VERTEX_NORMAL_ATTRIBUTE: u32 = 2;
pub const COLOR_ATTRIBUTE: u32 = 3;
