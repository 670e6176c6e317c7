//! Vertex attribute layout and the vertex stage of the shading program.

use nalgebra::{Point3, Vector3, Vector4};

use crate::graphics::{
    Blendable, Declaration, StageInterface, ValueKind, VertexContext, VertexOutput, VertexStage,
};

use super::{
    COLOR_ATTRIBUTE, FACE_NORMAL_ATTRIBUTE, MODEL_MATRIX, POSITION_ATTRIBUTE, PROJECTION_MATRIX,
    SMOOTHNESS, VERTEX_NORMAL_ATTRIBUTE, VIEW_MATRIX,
};

/// Per-vertex attributes supplied by the geometry provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Point3<f32>,
    pub face_normal: Vector3<f32>,
    pub vertex_normal: Vector3<f32>,
    pub color: Vector4<f32>,
}

/// Values handed from the vertex stage to the fragment stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Varyings {
    pub object_color: Vector4<f32>,
    pub smooth_normal: Vector3<f32>,
    pub vertex_normal: Vector3<f32>,
    /// Light position minus model-space position, not normalized.
    pub light_direction: Vector3<f32>,
    /// View-space position.
    pub position: Vector4<f32>,
}

impl Varyings {
    pub(crate) fn declarations() -> Vec<Declaration> {
        vec![
            Declaration::named("frag_object_color", ValueKind::Vec4),
            Declaration::named("frag_smooth_normal_vector", ValueKind::Vec3),
            Declaration::named("frag_vertex_normal_vector", ValueKind::Vec3),
            Declaration::named("frag_light_direction", ValueKind::Vec3),
            Declaration::named("frag_position", ValueKind::Vec4),
        ]
    }
}

impl Blendable for Varyings {
    fn blend(data: &[&Self], weights: &[f32]) -> Self {
        let zero = Varyings {
            object_color: Vector4::zeros(),
            smooth_normal: Vector3::zeros(),
            vertex_normal: Vector3::zeros(),
            light_direction: Vector3::zeros(),
            position: Vector4::zeros(),
        };

        data.iter().zip(weights).fold(zero, |acc, (v, w)| Varyings {
            object_color: acc.object_color + v.object_color * *w,
            smooth_normal: acc.smooth_normal + v.smooth_normal * *w,
            vertex_normal: acc.vertex_normal + v.vertex_normal * *w,
            light_direction: acc.light_direction + v.light_direction * *w,
            position: acc.position + v.position * *w,
        })
    }
}

/// `smoothness * vertex + (1 - smoothness) * face`. The endpoints reproduce
/// their input exactly.
pub fn blend_normals(
    face_normal: &Vector3<f32>,
    vertex_normal: &Vector3<f32>,
    smoothness: f32,
) -> Vector3<f32> {
    vertex_normal * smoothness + face_normal * (1.0 - smoothness)
}

pub struct MainVertex {
    light_position: Point3<f32>,
}

impl MainVertex {
    pub fn new(light_position: Point3<f32>) -> MainVertex {
        MainVertex { light_position }
    }
}

impl VertexStage for MainVertex {
    type Attributes = Vertex;
    type Varyings = Varyings;

    fn interface(&self) -> StageInterface {
        StageInterface {
            inputs: vec![
                Declaration::at(POSITION_ATTRIBUTE, "position", ValueKind::Vec3),
                Declaration::at(FACE_NORMAL_ATTRIBUTE, "face_normal_vector", ValueKind::Vec3),
                Declaration::at(VERTEX_NORMAL_ATTRIBUTE, "vertex_normal_vector", ValueKind::Vec3),
                Declaration::at(COLOR_ATTRIBUTE, "vertex_color", ValueKind::Vec4),
            ],
            outputs: Varyings::declarations(),
            uniforms: vec![
                Declaration::at(MODEL_MATRIX, "model_mat", ValueKind::Mat4),
                Declaration::at(VIEW_MATRIX, "view_mat", ValueKind::Mat4),
                Declaration::at(PROJECTION_MATRIX, "projection_mat", ValueKind::Mat4),
                Declaration::at(SMOOTHNESS, "smoothness", ValueKind::Float),
            ],
            samplers: vec![],
        }
    }

    fn execute(&self, context: &VertexContext<Vertex>) -> VertexOutput<Varyings> {
        let vertex = context.attributes;
        let uniforms = context.uniforms;

        let model = uniforms.mat4(MODEL_MATRIX);
        let view = uniforms.mat4(VIEW_MATRIX);
        let projection = uniforms.mat4(PROJECTION_MATRIX);

        let model_position = model * vertex.position.to_homogeneous();
        let view_position = view * model_position;

        VertexOutput {
            position: projection * view_position,
            data: Varyings {
                object_color: vertex.color,
                smooth_normal: blend_normals(
                    &vertex.face_normal,
                    &vertex.vertex_normal,
                    uniforms.float(SMOOTHNESS),
                ),
                vertex_normal: vertex.vertex_normal,
                light_direction: self.light_position.coords - model_position.xyz(),
                position: view_position,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normals() -> (Vector3<f32>, Vector3<f32>) {
        (
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.3, -0.4, 0.866_025_4),
        )
    }

    #[test]
    fn smoothness_zero_is_face_normal() {
        let (face, vertex) = normals();
        assert_eq!(blend_normals(&face, &vertex, 0.0), face);
    }

    #[test]
    fn smoothness_one_is_vertex_normal() {
        let (face, vertex) = normals();
        assert_eq!(blend_normals(&face, &vertex, 1.0), vertex);
    }

    #[test]
    fn intermediate_smoothness_interpolates() {
        let (face, vertex) = normals();

        for s in [0.25f32, 0.5, 0.8] {
            let blended = blend_normals(&face, &vertex, s);
            let expected = face + (vertex - face) * s;
            assert!((blended - expected).norm() < 1e-6, "smoothness {s}");
        }
    }

    #[test]
    fn varyings_blend_per_field() {
        let a = Varyings {
            object_color: Vector4::new(1.0, 0.0, 0.0, 1.0),
            smooth_normal: Vector3::new(0.0, 0.0, 1.0),
            vertex_normal: Vector3::new(0.0, 1.0, 0.0),
            light_direction: Vector3::new(2.0, 0.0, 0.0),
            position: Vector4::new(0.0, 0.0, -1.0, 1.0),
        };
        let b = Varyings {
            object_color: Vector4::new(0.0, 0.0, 1.0, 1.0),
            smooth_normal: Vector3::new(0.0, 0.0, 3.0),
            vertex_normal: Vector3::new(1.0, 0.0, 0.0),
            light_direction: Vector3::new(0.0, 2.0, 0.0),
            position: Vector4::new(0.0, 0.0, -3.0, 1.0),
        };

        let mid = Varyings::blend(&[&a, &b], &[0.5, 0.5]);

        assert_eq!(mid.object_color, Vector4::new(0.5, 0.0, 0.5, 1.0));
        assert_eq!(mid.smooth_normal, Vector3::new(0.0, 0.0, 2.0));
        assert_eq!(mid.vertex_normal, Vector3::new(0.5, 0.5, 0.0));
        assert_eq!(mid.light_direction, Vector3::new(1.0, 1.0, 0.0));
        assert_eq!(mid.position, Vector4::new(0.0, 0.0, -2.0, 1.0));
    }
}
