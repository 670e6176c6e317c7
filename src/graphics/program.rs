use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use nalgebra::Matrix4;

use super::context::MAX_TEXTURE_UNITS;
use super::framebuffer::Rgba;
use super::shader::{
    FragmentContext, FragmentStage, Shader, VertexContext, VertexOutput, VertexStage,
};

pub const MAX_UNIFORM_LOCATIONS: usize = 16;
pub const MAX_VERTEX_ATTRIBUTES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Vertex => f.write_str("vertex"),
            StageKind::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Float,
    Vec3,
    Vec4,
    Mat4,
    Sampler2D,
}

/// One named input, output, uniform or sampler of a stage. `location` is the
/// attribute index, uniform location or texture unit; varyings are matched
/// by name and may leave it unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Declaration {
    pub name: &'static str,
    pub location: Option<u32>,
    pub kind: ValueKind,
}

impl Declaration {
    pub const fn at(location: u32, name: &'static str, kind: ValueKind) -> Declaration {
        Declaration {
            name,
            location: Some(location),
            kind,
        }
    }

    pub const fn named(name: &'static str, kind: ValueKind) -> Declaration {
        Declaration {
            name,
            location: None,
            kind,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageInterface {
    pub inputs: Vec<Declaration>,
    pub outputs: Vec<Declaration>,
    pub uniforms: Vec<Declaration>,
    pub samplers: Vec<Declaration>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ShaderCompileError {
    #[error("{stage} stage: `{name}` is declared more than once")]
    DuplicateName { stage: StageKind, name: &'static str },
    #[error("{stage} stage: location {location} is used by both `{first}` and `{second}`")]
    LocationConflict {
        stage: StageKind,
        location: u32,
        first: &'static str,
        second: &'static str,
    },
    #[error("{stage} stage: `{name}` uses location {location}, limit is {limit}")]
    LocationOutOfRange {
        stage: StageKind,
        name: &'static str,
        location: u32,
        limit: usize,
    },
    #[error("{stage} stage: `{name}` has kind {kind:?}, which is not allowed here")]
    InvalidKind {
        stage: StageKind,
        name: &'static str,
        kind: ValueKind,
    },
    #[error("{stage} stage: `{name}` needs an explicit location")]
    MissingLocation { stage: StageKind, name: &'static str },
    #[error("fragment stage declares no outputs")]
    MissingOutput,
    #[error("fragment input `{name}` has no matching vertex output")]
    UnmatchedVarying { name: &'static str },
    #[error("varying `{name}` is {vertex:?} in the vertex stage but {fragment:?} in the fragment stage")]
    VaryingKindMismatch {
        name: &'static str,
        vertex: ValueKind,
        fragment: ValueKind,
    },
    #[error("uniform `{name}` is declared differently by the two stages")]
    UniformConflict { name: &'static str },
}

/// Non-zero program name, unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(NonZeroU32);

impl ProgramId {
    fn next() -> ProgramId {
        static NEXT: AtomicU32 = AtomicU32::new(1);

        let raw = NEXT.fetch_add(1, Ordering::Relaxed);
        ProgramId(NonZeroU32::new(raw).unwrap_or(NonZeroU32::MIN))
    }

    pub fn get(&self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum UniformValue {
    #[default]
    Unset,
    Float(f32),
    Mat4(Matrix4<f32>),
}

impl UniformValue {
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            UniformValue::Unset => None,
            UniformValue::Float(_) => Some(ValueKind::Float),
            UniformValue::Mat4(_) => Some(ValueKind::Mat4),
        }
    }

    /// Raw stored floats; matrices come back column-major.
    pub fn as_slice(&self) -> &[f32] {
        match self {
            UniformValue::Unset => &[],
            UniformValue::Float(value) => std::slice::from_ref(value),
            UniformValue::Mat4(matrix) => matrix.as_slice(),
        }
    }
}

/// Uniform values of a program, indexed by location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Uniforms {
    values: [UniformValue; MAX_UNIFORM_LOCATIONS],
}

impl Uniforms {
    pub fn get(&self, location: u32) -> Option<&UniformValue> {
        self.values.get(location as usize)
    }

    /// Unset or mismatched locations read as the zero matrix.
    pub fn mat4(&self, location: u32) -> Matrix4<f32> {
        match self.get(location) {
            Some(UniformValue::Mat4(matrix)) => *matrix,
            _ => Matrix4::zeros(),
        }
    }

    pub fn float(&self, location: u32) -> f32 {
        match self.get(location) {
            Some(UniformValue::Float(value)) => *value,
            _ => 0.0,
        }
    }
}

/// Linked program state shared between its owner and the context it is
/// bound on.
#[derive(Debug)]
pub struct ProgramObject {
    id: ProgramId,
    label: Option<String>,
    layout: HashMap<u32, Declaration>,
    uniforms: RwLock<Uniforms>,
}

impl ProgramObject {
    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn uniforms(&self) -> Uniforms {
        self.uniforms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stores a value if the location is active with the same kind; anything
    /// else is dropped, like `glUniform*` on a mismatched location.
    pub(crate) fn store(&self, location: u32, value: UniformValue) {
        let accepted = self
            .layout
            .get(&location)
            .is_some_and(|declaration| Some(declaration.kind) == value.kind());

        if !accepted {
            tracing::debug!(
                program = %self.id,
                location,
                kind = ?value.kind(),
                "ignoring upload to inactive or mismatched uniform location"
            );
            return;
        }

        let mut uniforms = self.uniforms.write().unwrap_or_else(PoisonError::into_inner);
        uniforms.values[location as usize] = value;
    }
}

impl Drop for ProgramObject {
    fn drop(&mut self) {
        tracing::debug!(program = %self.id, label = ?self.label, "released program");
    }
}

pub struct Program<V, F> {
    vertex: V,
    fragment: F,
    object: Arc<ProgramObject>,
}

impl<V, F> Program<V, F> {
    pub fn id(&self) -> ProgramId {
        self.object.id
    }

    pub fn vertex(&self) -> &V {
        &self.vertex
    }

    pub fn fragment(&self) -> &F {
        &self.fragment
    }

    /// Reads back the stored value of a uniform location.
    pub fn uniform(&self, location: u32) -> Option<UniformValue> {
        self.object.uniforms().get(location).copied()
    }

    pub fn object(&self) -> &Arc<ProgramObject> {
        &self.object
    }
}

impl<V, F> Shader for Program<V, F>
where
    V: VertexStage,
    F: FragmentStage<Varyings = V::Varyings>,
{
    type Attributes = V::Attributes;
    type Working = V::Varyings;

    fn id(&self) -> ProgramId {
        self.object.id
    }

    fn vertex_stage(&self, context: &VertexContext<Self::Attributes>) -> VertexOutput<Self::Working> {
        self.vertex.execute(context)
    }

    fn fragment_stage(&self, context: &FragmentContext<Self::Working>) -> Rgba {
        self.fragment.execute(context)
    }
}

pub struct ProgramBuilder<V, F> {
    vertex: V,
    fragment: F,
    label: Option<String>,
}

impl<V, F> ProgramBuilder<V, F>
where
    V: VertexStage,
    F: FragmentStage<Varyings = V::Varyings>,
{
    pub fn new(vertex: V, fragment: F) -> ProgramBuilder<V, F> {
        ProgramBuilder {
            vertex,
            fragment,
            label: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> ProgramBuilder<V, F> {
        self.label = Some(label.into());
        self
    }

    /// Validates both stage interfaces and links them into one program.
    pub fn build(self) -> Result<Program<V, F>, ShaderCompileError> {
        let vertex = self.vertex.interface();
        let fragment = self.fragment.interface();

        compile(StageKind::Vertex, &vertex)?;
        compile(StageKind::Fragment, &fragment)?;

        let layout = link(&vertex, &fragment)?;

        let object = ProgramObject {
            id: ProgramId::next(),
            label: self.label,
            layout,
            uniforms: RwLock::new(Uniforms::default()),
        };

        tracing::debug!(
            program = %object.id,
            label = ?object.label,
            uniforms = object.layout.len(),
            varyings = fragment.inputs.len(),
            "linked program"
        );

        Ok(Program {
            vertex: self.vertex,
            fragment: self.fragment,
            object: Arc::new(object),
        })
    }
}

fn compile(stage: StageKind, interface: &StageInterface) -> Result<(), ShaderCompileError> {
    let all = interface
        .inputs
        .iter()
        .chain(&interface.outputs)
        .chain(&interface.uniforms)
        .chain(&interface.samplers);

    let mut names: Vec<&'static str> = Vec::new();
    for declaration in all {
        if names.contains(&declaration.name) {
            return Err(ShaderCompileError::DuplicateName {
                stage,
                name: declaration.name,
            });
        }

        names.push(declaration.name);
    }

    for uniform in &interface.uniforms {
        if uniform.kind == ValueKind::Sampler2D {
            return Err(ShaderCompileError::InvalidKind {
                stage,
                name: uniform.name,
                kind: uniform.kind,
            });
        }
    }

    for sampler in &interface.samplers {
        if sampler.kind != ValueKind::Sampler2D {
            return Err(ShaderCompileError::InvalidKind {
                stage,
                name: sampler.name,
                kind: sampler.kind,
            });
        }
    }

    check_locations(stage, &interface.uniforms, MAX_UNIFORM_LOCATIONS)?;
    check_locations(stage, &interface.samplers, MAX_TEXTURE_UNITS)?;

    if stage == StageKind::Vertex {
        check_locations(stage, &interface.inputs, MAX_VERTEX_ATTRIBUTES)?;
    }

    if stage == StageKind::Fragment && interface.outputs.is_empty() {
        return Err(ShaderCompileError::MissingOutput);
    }

    Ok(())
}

fn check_locations(
    stage: StageKind,
    declarations: &[Declaration],
    limit: usize,
) -> Result<(), ShaderCompileError> {
    let mut seen: HashMap<u32, &'static str> = HashMap::new();

    for declaration in declarations {
        let Some(location) = declaration.location else {
            return Err(ShaderCompileError::MissingLocation {
                stage,
                name: declaration.name,
            });
        };

        if location as usize >= limit {
            return Err(ShaderCompileError::LocationOutOfRange {
                stage,
                name: declaration.name,
                location,
                limit,
            });
        }

        if let Some(first) = seen.insert(location, declaration.name) {
            return Err(ShaderCompileError::LocationConflict {
                stage,
                location,
                first,
                second: declaration.name,
            });
        }
    }

    Ok(())
}

fn link(
    vertex: &StageInterface,
    fragment: &StageInterface,
) -> Result<HashMap<u32, Declaration>, ShaderCompileError> {
    for input in &fragment.inputs {
        let Some(output) = vertex.outputs.iter().find(|output| output.name == input.name) else {
            return Err(ShaderCompileError::UnmatchedVarying { name: input.name });
        };

        if output.kind != input.kind {
            return Err(ShaderCompileError::VaryingKindMismatch {
                name: input.name,
                vertex: output.kind,
                fragment: input.kind,
            });
        }
    }

    let mut layout: HashMap<u32, Declaration> = HashMap::new();
    for uniform in vertex.uniforms.iter().chain(&fragment.uniforms) {
        // compile() already rejected uniforms without a location
        let Some(location) = uniform.location else {
            continue;
        };

        let renamed = layout
            .values()
            .any(|existing| existing.name == uniform.name && existing.location != uniform.location);

        match layout.get(&location) {
            Some(existing) if existing != uniform => {
                return Err(ShaderCompileError::UniformConflict { name: uniform.name });
            }
            _ if renamed => {
                return Err(ShaderCompileError::UniformConflict { name: uniform.name });
            }
            _ => {
                layout.insert(location, *uniform);
            }
        }
    }

    Ok(layout)
}
