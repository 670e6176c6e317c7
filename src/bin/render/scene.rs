use nalgebra::{Matrix4, Perspective3, Point3, Vector3, Vector4};
use rast::multipass::Vertex;

pub struct Mesh {
    pub name: &'static str,
    pub model: Matrix4<f32>,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    fn new(name: &'static str, model: Matrix4<f32>) -> Mesh {
        Mesh {
            name,
            model,
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    /// Adds a square facing `normal`, centered `distance` along it. Corner
    /// normals point away from `origin`.
    fn push_face(&mut self, normal: Vector3<f32>, distance: f32, half_size: f32, color: Vector4<f32>) {
        let u = Vector3::new(normal.z.abs(), normal.x.abs(), normal.y.abs());
        let v = normal.cross(&u);
        let center = normal * distance;

        let base = self.vertices.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let position = center + (u * su + v * sv) * half_size;

            self.vertices.push(Vertex {
                position: Point3::from(position),
                face_normal: normal,
                vertex_normal: position.normalize(),
                color,
            });
        }

        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}

pub struct Camera {
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
}

impl Camera {
    pub fn new(width: usize, height: usize) -> Camera {
        let eye = Point3::new(2.2, 1.8, 2.6);
        let target = Point3::new(0.0, 0.4, 0.0);
        let aspect = width as f32 / height.max(1) as f32;

        Camera {
            view: Matrix4::look_at_rh(&eye, &target, &Vector3::y()),
            projection: Perspective3::new(aspect, 50f32.to_radians(), 0.1, 20.0).to_homogeneous(),
        }
    }
}

/// A floor with a cube resting on it and a smaller one leaning against it.
pub fn build() -> Vec<Mesh> {
    let mut floor = Mesh::new("floor", Matrix4::identity());
    floor.push_face(Vector3::y(), 0.0, 3.0, Vector4::new(0.8, 0.8, 0.75, 1.0));
    for vertex in &mut floor.vertices {
        vertex.vertex_normal = vertex.face_normal;
    }

    let faces = [
        Vector3::x(),
        -Vector3::x(),
        Vector3::y(),
        -Vector3::y(),
        Vector3::z(),
        -Vector3::z(),
    ];

    let mut cube = Mesh::new("cube", Matrix4::new_translation(&Vector3::new(0.0, 0.5, 0.0)));
    let mut small = Mesh::new(
        "small cube",
        Matrix4::new_translation(&Vector3::new(0.9, 0.25, 0.4))
            * Matrix4::from_euler_angles(0.0, 0.5, 0.0),
    );

    for normal in faces {
        cube.push_face(normal, 0.5, 0.5, Vector4::new(0.9, 0.35, 0.3, 1.0));
        small.push_face(normal, 0.25, 0.25, Vector4::new(0.3, 0.5, 0.9, 1.0));
    }

    vec![floor, cube, small]
}
