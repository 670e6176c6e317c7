use std::array;
use std::sync::{Arc, Mutex, PoisonError};

use nalgebra::{Matrix2, Point2, Point3, Vector4};
use rayon::prelude::*;

use super::context::Context;
use super::framebuffer::{Framebuffer, Rgba};
use super::program::{ProgramId, Uniforms};
use super::scissor::Scissor;
use super::shader::{Blendable, FragmentContext, Shader, VertexContext, VertexOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthMode {
    Disabled,
    Test,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindingOrder {
    Clockwise,
    CounterClockwise,
}

/// Fixed-function state of a draw.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub depth: DepthMode,

    pub cull_back: bool,
    pub winding_order: WindingOrder,
}

pub struct IndexedRenderCall<'a, T: Shader> {
    pub pipeline: &'a Pipeline,
    pub shader: &'a T,

    pub vertex_offset: usize,
    pub first_instance: usize,
    pub instance_count: usize,

    pub scissor: Option<Scissor>,

    pub indices: &'a [u32],
    pub vertices: &'a [T::Attributes],
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("no render target is bound")]
    NoRenderTarget,
    #[error("program {submitted} is not the current program (current: {current:?})")]
    ProgramNotActive {
        submitted: ProgramId,
        current: Option<ProgramId>,
    },
    #[error("index {index} is out of range for {count} vertices")]
    IndexOutOfRange { index: usize, count: usize },
    #[error("{0} render target(s) still bound at frame start")]
    TargetsStillBound(usize),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub calls: usize,
    pub instances: usize,
    pub faces_processed: usize,
    pub faces_rendered: usize,
    pub fragments_shaded: usize,
}

pub const VERTICES_PER_FACE: usize = 3;
pub const DEFAULT_TILE_SIZE: usize = 32;

pub struct Rasterizer {
    targets: Vec<Arc<Mutex<Framebuffer>>>,
    stats: RenderStats,
    tile_size: usize,
}

impl Default for Rasterizer {
    fn default() -> Self {
        Rasterizer::new()
    }
}

pub fn gen_scissor(uv: &[Point2<f32>], max_width: usize, max_height: usize) -> Scissor {
    let mut x0 = max_width;
    let mut y0 = max_height;

    let mut x1: usize = 0;
    let mut y1: usize = 0;

    for point in uv {
        let x = point.x.clamp(0.0, 1.0) * max_width as f32;
        let y = point.y.clamp(0.0, 1.0) * max_height as f32;

        x0 = (x.floor() as usize).min(x0);
        y0 = (y.floor() as usize).min(y0);

        x1 = (x.ceil() as usize).max(x1);
        y1 = (y.ceil() as usize).max(y1);
    }

    Scissor {
        x: x0,
        y: y0,
        width: x1.saturating_sub(x0),
        height: y1.saturating_sub(y0),
    }
}

/// Positive when `points` follow `winding` in window coordinates (y up).
fn signed_triangle_area(points: [&Point2<f32>; 3], winding: WindingOrder) -> f32 {
    let a = points[0];
    let b = points[1];
    let c = points[2];

    let mat = match winding {
        // rotate counterclockwise 90 deg
        WindingOrder::CounterClockwise => Matrix2::new(0.0, -1.0, 1.0, 0.0),

        // rotate clockwise 90 deg
        WindingOrder::Clockwise => Matrix2::new(0.0, 1.0, -1.0, 0.0),
    };

    let ab = b - a;
    let ac = c - a;

    let normal = mat * ab;
    ac.dot(&normal) / 2.0
}

/// A face after the vertex stage, in window coordinates.
struct ScreenTriangle<W> {
    window: [Point3<f32>; VERTICES_PER_FACE],
    inverse_w: [f32; VERTICES_PER_FACE],
    front_facing: bool,
    outputs: [VertexOutput<W>; VERTICES_PER_FACE],
}

struct FragmentInfo {
    depth: f32,
    weights: [f32; VERTICES_PER_FACE],
}

struct ShadedFragment {
    x: usize,
    y: usize,
    depth: f32,
    color: Rgba,
}

fn process_fragment_geometry<W>(
    triangle: &ScreenTriangle<W>,
    point: &Point2<f32>,
    winding: WindingOrder,
    cull_back: bool,
) -> Option<FragmentInfo> {
    let screen_points = triangle.window.each_ref().map(|p| p.xy());
    let areas = array::from_fn::<_, VERTICES_PER_FACE, _>(|i| {
        let a = &screen_points[(i + 1) % VERTICES_PER_FACE];
        let b = &screen_points[(i + 2) % VERTICES_PER_FACE];

        signed_triangle_area([a, b, point], winding)
    });

    let front = areas.iter().all(|area| *area >= 0.0);
    let back = areas.iter().all(|area| *area <= 0.0);

    if !(front || (back && !cull_back)) {
        return None;
    }

    let area_sum = areas.iter().sum::<f32>();
    if area_sum == 0.0 {
        return None;
    }

    let screen_weights = areas.map(|area| area / area_sum);

    // screen-linear depth, written relative to the first vertex so a face of
    // constant depth stays exactly constant
    let z = triangle.window.each_ref().map(|p| p.z);
    let depth = z[0] + screen_weights[1] * (z[1] - z[0]) + screen_weights[2] * (z[2] - z[0]);

    let perspective = array::from_fn::<_, VERTICES_PER_FACE, _>(|i| {
        screen_weights[i] * triangle.inverse_w[i]
    });
    let perspective_sum = perspective.iter().sum::<f32>();

    Some(FragmentInfo {
        depth,
        weights: perspective.map(|w| w / perspective_sum),
    })
}

impl Rasterizer {
    pub fn new() -> Rasterizer {
        Rasterizer {
            targets: Vec::new(),
            stats: RenderStats::default(),
            tile_size: DEFAULT_TILE_SIZE,
        }
    }

    pub fn with_tile_size(tile_size: usize) -> Rasterizer {
        Rasterizer {
            tile_size: tile_size.max(1),
            ..Rasterizer::new()
        }
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Resets the counters. Every pushed target must have been popped.
    pub fn new_frame(&mut self) -> Result<(), RenderError> {
        if !self.targets.is_empty() {
            return Err(RenderError::TargetsStillBound(self.targets.len()));
        }

        self.stats = RenderStats::default();
        Ok(())
    }

    pub fn push_render_target(&mut self, target: Arc<Mutex<Framebuffer>>) {
        self.targets.push(target);
    }

    pub fn pop_render_target(&mut self) -> Result<Arc<Mutex<Framebuffer>>, RenderError> {
        self.targets.pop().ok_or(RenderError::NoRenderTarget)
    }

    fn shade_tile<T: Shader>(
        &self,
        tile: &Scissor,
        instance_id: usize,
        call: &IndexedRenderCall<T>,
        draw: &DrawState,
        triangle: &ScreenTriangle<T::Working>,
    ) -> Vec<ShadedFragment> {
        let mut fragments = Vec::new();

        for (x, y) in tile.coordinates() {
            let point = Point2::new(x as f32 + 0.5, y as f32 + 0.5);

            let Some(frag) = process_fragment_geometry(
                triangle,
                &point,
                call.pipeline.winding_order,
                call.pipeline.cull_back,
            ) else {
                continue;
            };

            if !(0.0..=1.0).contains(&frag.depth) {
                continue;
            }

            let working = T::Working::blend(
                &triangle.outputs.each_ref().map(|output| &output.data),
                &frag.weights,
            );

            let color = call.shader.fragment_stage(&FragmentContext {
                instance_id,
                frag_coord: Point3::new(point.x, point.y, frag.depth),
                front_facing: triangle.front_facing,
                uniforms: &draw.uniforms,
                textures: draw.context.textures(),
                working,
            });

            fragments.push(ShadedFragment {
                x,
                y,
                depth: frag.depth,
                color,
            });
        }

        fragments
    }

    fn render_face<T: Shader>(
        &self,
        instance_id: usize,
        face_index: usize,
        call: &IndexedRenderCall<T>,
        draw: &DrawState,
    ) -> Result<Option<usize>, RenderError> {
        let index_offset = face_index * VERTICES_PER_FACE;
        let mut vertex_ids = [0usize; VERTICES_PER_FACE];
        for (i, vertex_id) in vertex_ids.iter_mut().enumerate() {
            let index = call.indices[index_offset + i] as usize + call.vertex_offset;
            if index >= call.vertices.len() {
                return Err(RenderError::IndexOutOfRange {
                    index,
                    count: call.vertices.len(),
                });
            }

            *vertex_id = index;
        }

        let outputs = vertex_ids.map(|vertex_id| {
            call.shader.vertex_stage(&VertexContext {
                vertex_id,
                instance_id,
                attributes: &call.vertices[vertex_id],
                uniforms: &draw.uniforms,
            })
        });

        // no near-plane clipping; faces reaching behind the eye are dropped
        if outputs.iter().any(|output| output.position.w <= 0.0) {
            tracing::trace!(face_index, instance_id, "face crosses the eye plane, skipped");
            return Ok(None);
        }

        let (fb_width, fb_height) = draw.size;
        let ndc = outputs.each_ref().map(|output| to_ndc(&output.position));
        let window = ndc.map(|p| {
            Point3::new(
                (p.x + 1.0) / 2.0 * fb_width as f32,
                (p.y + 1.0) / 2.0 * fb_height as f32,
                (p.z + 1.0) / 2.0,
            )
        });

        let screen_points = window.each_ref().map(|p| p.xy());
        let front_facing = signed_triangle_area(
            [&screen_points[0], &screen_points[1], &screen_points[2]],
            call.pipeline.winding_order,
        ) >= 0.0;

        if call.pipeline.cull_back && !front_facing {
            return Ok(None);
        }

        let uv = ndc.map(|p| Point2::new((p.x + 1.0) / 2.0, (p.y + 1.0) / 2.0));
        let generated_scissor = gen_scissor(&uv, fb_width, fb_height);

        let final_scissor = match &call.scissor {
            Some(user_scissor) => generated_scissor.intersect_with(user_scissor),
            None => Some(generated_scissor),
        };

        let Some(scissor) = final_scissor.filter(|scissor| !scissor.is_empty()) else {
            return Ok(None);
        };

        let triangle = ScreenTriangle {
            window,
            inverse_w: outputs.each_ref().map(|output| 1.0 / output.position.w),
            front_facing,
            outputs,
        };

        let shaded: Vec<Vec<ShadedFragment>> = scissor
            .tiles(self.tile_size)
            .par_iter()
            .map(|tile| self.shade_tile(tile, instance_id, call, draw, &triangle))
            .collect();

        let mut fb = draw.target.lock().unwrap_or_else(PoisonError::into_inner);
        let num_attachments = fb.color_attachments().len();
        let mut count = 0;

        for fragment in shaded.iter().flatten() {
            count += 1;

            let passed = match call.pipeline.depth {
                DepthMode::Disabled => true,
                DepthMode::Test => fb.depth_test(fragment.x, fragment.y, fragment.depth, false),
                DepthMode::Write => fb.depth_test(fragment.x, fragment.y, fragment.depth, true),
            };

            if passed {
                for i in 0..num_attachments {
                    fb.set_color(i, fragment.x, fragment.y, fragment.color);
                }
            }
        }

        Ok(Some(count))
    }

    /// Draws indexed triangles with the context's current program into the
    /// top render target. The submitted shader must be that program.
    pub fn render_indexed<T: Shader>(
        &mut self,
        context: &Context,
        call: &IndexedRenderCall<T>,
    ) -> Result<(), RenderError> {
        let target = self.targets.last().cloned().ok_or(RenderError::NoRenderTarget)?;

        let submitted = call.shader.id();
        let current = context.current_program();
        let uniforms = match context.current_uniforms() {
            Some(uniforms) if current == Some(submitted) => uniforms,
            _ => return Err(RenderError::ProgramNotActive { submitted, current }),
        };

        let size = target.lock().unwrap_or_else(PoisonError::into_inner).size();
        let draw = DrawState {
            context,
            uniforms,
            target,
            size,
        };

        let face_count = call.indices.len() / VERTICES_PER_FACE;

        self.stats.calls += 1;
        for i in 0..call.instance_count {
            self.stats.instances += 1;

            for j in 0..face_count {
                self.stats.faces_processed += 1;

                if let Some(fragments) = self.render_face(call.first_instance + i, j, call, &draw)? {
                    self.stats.faces_rendered += 1;
                    self.stats.fragments_shaded += fragments;
                }
            }
        }

        tracing::trace!(
            program = %submitted,
            faces = face_count,
            instances = call.instance_count,
            "draw submitted"
        );

        Ok(())
    }
}

/// Per-draw snapshot of the context.
struct DrawState<'a> {
    context: &'a Context,
    uniforms: Uniforms,
    target: Arc<Mutex<Framebuffer>>,
    size: (usize, usize),
}

fn to_ndc(clip: &Vector4<f32>) -> Point3<f32> {
    Point3::new(clip.x / clip.w, clip.y / clip.w, clip.z / clip.w)
}

#[cfg(test)]
mod tests {
    use nalgebra::Point3;

    use super::*;
    use crate::graphics::{
        ClearValue, Declaration, FragmentStage, Program, ProgramBuilder, StageInterface,
        ValueKind, VertexStage,
    };

    struct Vertex {
        position: Point3<f32>,
        shade: f32,
    }

    struct FlatVertex;
    struct FlatFragment;

    impl VertexStage for FlatVertex {
        type Attributes = Vertex;
        type Varyings = f32;

        fn interface(&self) -> StageInterface {
            StageInterface {
                inputs: vec![
                    Declaration::at(0, "position", ValueKind::Vec3),
                    Declaration::at(1, "shade", ValueKind::Float),
                ],
                outputs: vec![Declaration::named("frag_shade", ValueKind::Float)],
                uniforms: vec![],
                samplers: vec![],
            }
        }

        fn execute(&self, context: &VertexContext<Vertex>) -> VertexOutput<f32> {
            VertexOutput {
                position: context.attributes.position.to_homogeneous(),
                data: context.attributes.shade,
            }
        }
    }

    impl FragmentStage for FlatFragment {
        type Varyings = f32;

        fn interface(&self) -> StageInterface {
            StageInterface {
                inputs: vec![Declaration::named("frag_shade", ValueKind::Float)],
                outputs: vec![Declaration::at(0, "color", ValueKind::Vec4)],
                uniforms: vec![],
                samplers: vec![],
            }
        }

        fn execute(&self, context: &FragmentContext<f32>) -> Rgba {
            let v = context.working;
            Rgba::new(v, v, v, 1.0)
        }
    }

    fn program() -> Program<FlatVertex, FlatFragment> {
        ProgramBuilder::new(FlatVertex, FlatFragment)
            .build()
            .expect("flat program links")
    }

    fn quad(z: f32, shade: f32) -> Vec<Vertex> {
        [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
            .into_iter()
            .map(|(x, y)| Vertex {
                position: Point3::new(x, y, z),
                shade,
            })
            .collect()
    }

    const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

    fn pipeline(depth: DepthMode, cull_back: bool) -> Pipeline {
        Pipeline {
            depth,
            cull_back,
            winding_order: WindingOrder::CounterClockwise,
        }
    }

    fn target(width: usize, height: usize) -> Arc<Mutex<Framebuffer>> {
        let mut fb = Framebuffer::new(width, height, 1, true);
        fb.clear(&ClearValue {
            color: Rgba::new(0.0, 0.0, 0.0, 0.0),
            depth: 1.0,
        });

        Arc::new(Mutex::new(fb))
    }

    fn color_at(target: &Arc<Mutex<Framebuffer>>, x: usize, y: usize) -> Rgba {
        let fb = target.lock().unwrap();
        *fb.color_attachments()[0].at(x, y).unwrap()
    }

    #[test]
    fn fullscreen_quad_covers_every_pixel() {
        let program = program();
        let mut context = Context::new();
        context.use_program(&program);

        let fb = target(16, 8);
        let mut rast = Rasterizer::with_tile_size(4);
        rast.push_render_target(fb.clone());

        let vertices = quad(0.0, 0.5);
        rast.render_indexed(
            &context,
            &IndexedRenderCall {
                pipeline: &pipeline(DepthMode::Write, true),
                shader: &program,
                vertex_offset: 0,
                first_instance: 0,
                instance_count: 1,
                scissor: None,
                indices: &QUAD_INDICES,
                vertices: &vertices,
            },
        )
        .unwrap();

        let guard = fb.lock().unwrap();
        assert!(guard.color_attachments()[0]
            .data()
            .iter()
            .all(|c| (c.x - 0.5).abs() < 1e-6 && c.w == 1.0));
        assert!(guard.depth_attachment().unwrap().data().iter().all(|d| *d == 0.5));
        drop(guard);

        let stats = rast.stats();
        assert_eq!(stats.calls, 1);
        assert_eq!(stats.instances, 1);
        assert_eq!(stats.faces_processed, 2);
        assert_eq!(stats.faces_rendered, 2);
        assert!(stats.fragments_shaded >= 16 * 8);
    }

    #[test]
    fn requires_render_target() {
        let program = program();
        let mut context = Context::new();
        context.use_program(&program);

        let vertices = quad(0.0, 1.0);
        let result = Rasterizer::new().render_indexed(
            &context,
            &IndexedRenderCall {
                pipeline: &pipeline(DepthMode::Disabled, false),
                shader: &program,
                vertex_offset: 0,
                first_instance: 0,
                instance_count: 1,
                scissor: None,
                indices: &QUAD_INDICES,
                vertices: &vertices,
            },
        );

        assert!(matches!(result, Err(RenderError::NoRenderTarget)));
    }

    #[test]
    fn requires_active_program() {
        let program = program();
        let other = self::program();
        let mut context = Context::new();
        context.use_program(&other);

        let mut rast = Rasterizer::new();
        rast.push_render_target(target(4, 4));

        let vertices = quad(0.0, 1.0);
        let result = rast.render_indexed(
            &context,
            &IndexedRenderCall {
                pipeline: &pipeline(DepthMode::Disabled, false),
                shader: &program,
                vertex_offset: 0,
                first_instance: 0,
                instance_count: 1,
                scissor: None,
                indices: &QUAD_INDICES,
                vertices: &vertices,
            },
        );

        match result {
            Err(RenderError::ProgramNotActive { submitted, current }) => {
                assert_eq!(submitted, program.id());
                assert_eq!(current, Some(other.id()));
            }
            unexpected => panic!("unexpected result {unexpected:?}"),
        }
    }

    #[test]
    fn back_faces_are_culled() {
        let program = program();
        let mut context = Context::new();
        context.use_program(&program);

        let fb = target(8, 8);
        let mut rast = Rasterizer::new();
        rast.push_render_target(fb.clone());

        let vertices = quad(0.0, 1.0);
        let reversed: [u32; 6] = [0, 2, 1, 0, 3, 2];

        for cull_back in [true, false] {
            rast.render_indexed(
                &context,
                &IndexedRenderCall {
                    pipeline: &pipeline(DepthMode::Disabled, cull_back),
                    shader: &program,
                    vertex_offset: 0,
                    first_instance: 0,
                    instance_count: 1,
                    scissor: None,
                    indices: &reversed,
                    vertices: &vertices,
                },
            )
            .unwrap();

            let expected = if cull_back { 0.0 } else { 1.0 };
            let actual = color_at(&fb, 3, 3).x;
            assert!((actual - expected).abs() < 1e-6, "cull_back = {cull_back}");
        }

        assert_eq!(rast.stats().faces_rendered, 2);
    }

    #[test]
    fn nearer_fragments_win_depth_test() {
        let program = program();
        let mut context = Context::new();
        context.use_program(&program);

        let fb = target(8, 8);
        let mut rast = Rasterizer::new();
        rast.push_render_target(fb.clone());

        let near = quad(-0.5, 0.25);
        let far = quad(0.5, 0.75);

        for vertices in [&near, &far] {
            rast.render_indexed(
                &context,
                &IndexedRenderCall {
                    pipeline: &pipeline(DepthMode::Write, true),
                    shader: &program,
                    vertex_offset: 0,
                    first_instance: 0,
                    instance_count: 1,
                    scissor: None,
                    indices: &QUAD_INDICES,
                    vertices,
                },
            )
            .unwrap();
        }

        assert!((color_at(&fb, 4, 4).x - 0.25).abs() < 1e-6);
    }

    #[test]
    fn scissor_limits_coverage() {
        let program = program();
        let mut context = Context::new();
        context.use_program(&program);

        let fb = target(8, 8);
        let mut rast = Rasterizer::new();
        rast.push_render_target(fb.clone());

        let vertices = quad(0.0, 1.0);
        rast.render_indexed(
            &context,
            &IndexedRenderCall {
                pipeline: &pipeline(DepthMode::Disabled, true),
                shader: &program,
                vertex_offset: 0,
                first_instance: 0,
                instance_count: 1,
                scissor: Some(Scissor::new(0, 0, 4, 8)),
                indices: &QUAD_INDICES,
                vertices: &vertices,
            },
        )
        .unwrap();

        assert!((color_at(&fb, 3, 5).x - 1.0).abs() < 1e-6);
        assert_eq!(color_at(&fb, 4, 5).x, 0.0);
    }

    #[test]
    fn varyings_are_interpolated() {
        let program = program();
        let mut context = Context::new();
        context.use_program(&program);

        let fb = target(8, 1);
        let mut rast = Rasterizer::new();
        rast.push_render_target(fb.clone());

        let mut vertices = quad(0.0, 0.0);
        vertices[1].shade = 1.0;
        vertices[2].shade = 1.0;

        rast.render_indexed(
            &context,
            &IndexedRenderCall {
                pipeline: &pipeline(DepthMode::Disabled, true),
                shader: &program,
                vertex_offset: 0,
                first_instance: 0,
                instance_count: 1,
                scissor: None,
                indices: &QUAD_INDICES,
                vertices: &vertices,
            },
        )
        .unwrap();

        for x in 0..8 {
            let expected = (x as f32 + 0.5) / 8.0;
            assert!((color_at(&fb, x, 0).x - expected).abs() < 1e-5, "pixel {x}");
        }
    }

    #[test]
    fn index_out_of_range_is_reported() {
        let program = program();
        let mut context = Context::new();
        context.use_program(&program);

        let mut rast = Rasterizer::new();
        rast.push_render_target(target(4, 4));

        let vertices = quad(0.0, 1.0);
        let result = rast.render_indexed(
            &context,
            &IndexedRenderCall {
                pipeline: &pipeline(DepthMode::Disabled, false),
                shader: &program,
                vertex_offset: 2,
                first_instance: 0,
                instance_count: 1,
                scissor: None,
                indices: &QUAD_INDICES,
                vertices: &vertices,
            },
        );

        assert!(matches!(
            result,
            Err(RenderError::IndexOutOfRange { index: 4, count: 4 })
        ));
    }

    #[test]
    fn new_frame_requires_popped_targets() {
        let mut rast = Rasterizer::new();
        rast.push_render_target(target(1, 1));

        assert!(matches!(rast.new_frame(), Err(RenderError::TargetsStillBound(1))));

        rast.pop_render_target().unwrap();
        assert!(rast.new_frame().is_ok());
        assert!(matches!(rast.pop_render_target(), Err(RenderError::NoRenderTarget)));
    }
}
