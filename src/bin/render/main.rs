mod cli;
mod scene;

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context as _, Result};
use rast::graphics::{
    ClearValue, Context, DepthMode, Framebuffer, Image, IndexedRenderCall, Pipeline, Rasterizer,
    Rgba, Sampler, Texture2D, WindingOrder,
};
use rast::multipass::{
    DepthPrepass, ShadingConfig, ShadingStage, DEPTH_MAP_UNIT, MODEL_MATRIX, PROJECTION_MATRIX,
    SMOOTHNESS, VIEW_MATRIX,
};
use tracing_subscriber::EnvFilter;

use scene::{Camera, Mesh};

fn main() -> Result<()> {
    let cli = cli::parse();
    initialise_tracing();

    let mut config = match &cli.config {
        Some(path) => ShadingConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => ShadingConfig::default(),
    };

    if let Some(mode) = cli.mode {
        config.output = mode;
    }
    if cli.no_split {
        config.split_screen = false;
    }

    if config.reference_width != cli.width as f32 {
        tracing::warn!(
            reference_width = config.reference_width,
            width = cli.width,
            "reference width differs from the output width, depth lookups will be scaled"
        );
    }

    let meshes = scene::build();
    let camera = Camera::new(cli.width, cli.height);
    let pipeline = Pipeline {
        depth: DepthMode::Write,
        cull_back: true,
        winding_order: WindingOrder::CounterClockwise,
    };

    let mut rast = Rasterizer::new();
    let mut context = Context::new();

    let depth_map = render_depth(&mut rast, &mut context, &pipeline, &camera, &meshes, &cli)?;
    context.bind_texture(DEPTH_MAP_UNIT, Arc::new(depth_map));

    let stage = ShadingStage::with_config(config).context("failed to build the shading stage")?;
    let image = render_shading(&mut rast, &mut context, &pipeline, &camera, &meshes, &stage, &cli)?;

    let stats = rast.stats();
    tracing::info!(
        calls = stats.calls,
        faces = stats.faces_rendered,
        fragments = stats.fragments_shaded,
        "frame rendered"
    );

    save_bmp(&image, &cli.output)?;
    tracing::info!(path = %cli.output.display(), "image written");

    Ok(())
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn draw_meshes<F>(
    rast: &mut Rasterizer,
    context: &mut Context,
    pipeline: &Pipeline,
    meshes: &[Mesh],
    mut render: F,
) -> Result<()>
where
    F: FnMut(&mut Rasterizer, &Context, &Pipeline, &Mesh) -> Result<()>,
{
    for mesh in meshes {
        context.uniform_matrix4(MODEL_MATRIX, &mesh.model);
        render(rast, context, pipeline, mesh).with_context(|| format!("failed to draw {}", mesh.name))?;
    }

    Ok(())
}

fn render_depth(
    rast: &mut Rasterizer,
    context: &mut Context,
    pipeline: &Pipeline,
    camera: &Camera,
    meshes: &[Mesh],
    cli: &cli::Cli,
) -> Result<Texture2D> {
    let prepass = DepthPrepass::new().context("failed to build the depth prepass")?;

    let mut fb = Framebuffer::new(cli.width, cli.height, 0, true);
    fb.clear(&ClearValue {
        color: Rgba::zeros(),
        depth: 1.0,
    });

    let target = Arc::new(Mutex::new(fb));
    rast.new_frame()?;
    rast.push_render_target(target.clone());

    prepass.activate(context);
    context.uniform_matrix4(VIEW_MATRIX, &camera.view);
    context.uniform_matrix4(PROJECTION_MATRIX, &camera.projection);

    draw_meshes(rast, context, pipeline, meshes, |rast, context, pipeline, mesh| {
        rast.render_indexed(
            context,
            &IndexedRenderCall {
                pipeline,
                shader: prepass.program(),
                vertex_offset: 0,
                first_instance: 0,
                instance_count: 1,
                scissor: None,
                indices: &mesh.indices,
                vertices: &mesh.vertices,
            },
        )?;

        Ok(())
    })?;

    rast.pop_render_target()?;

    let fb = target.lock().unwrap_or_else(PoisonError::into_inner);
    Texture2D::from_depth_attachment(&fb, Sampler::default())
        .context("depth prepass target has no depth attachment")
}

fn render_shading(
    rast: &mut Rasterizer,
    context: &mut Context,
    pipeline: &Pipeline,
    camera: &Camera,
    meshes: &[Mesh],
    stage: &ShadingStage,
    cli: &cli::Cli,
) -> Result<Image<Rgba>> {
    let mut fb = Framebuffer::new(cli.width, cli.height, 1, true);
    fb.clear(&ClearValue {
        color: Rgba::new(0.05, 0.05, 0.08, 1.0),
        depth: 1.0,
    });

    let target = Arc::new(Mutex::new(fb));
    rast.push_render_target(target.clone());

    stage.activate(context);
    stage.set_matrix_parameter(context, VIEW_MATRIX, &camera.view);
    stage.set_matrix_parameter(context, PROJECTION_MATRIX, &camera.projection);
    stage.set_scalar_parameter(context, SMOOTHNESS, cli.smoothness);

    draw_meshes(rast, context, pipeline, meshes, |rast, context, pipeline, mesh| {
        rast.render_indexed(
            context,
            &IndexedRenderCall {
                pipeline,
                shader: stage.program(),
                vertex_offset: 0,
                first_instance: 0,
                instance_count: 1,
                scissor: None,
                indices: &mesh.indices,
                vertices: &mesh.vertices,
            },
        )?;

        Ok(())
    })?;

    rast.pop_render_target()?;

    let fb = target.lock().unwrap_or_else(PoisonError::into_inner);
    fb.color_attachments()
        .first()
        .cloned()
        .context("shading target has no color attachment")
}

fn to_channel(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Window row 0 is the bottom of the image; BMP rows start at the top.
fn save_bmp(image: &Image<Rgba>, path: &Path) -> Result<()> {
    let (width, height) = image.size();
    let mut bmp = bmp::Image::new(width as u32, height as u32);

    for (x, y) in image.coordinates() {
        let color = image.at(x, y).copied().unwrap_or_else(Rgba::zeros);

        bmp.set_pixel(
            x as u32,
            (height - 1 - y) as u32,
            bmp::Pixel {
                r: to_channel(color.x),
                g: to_channel(color.y),
                b: to_channel(color.z),
            },
        );
    }

    bmp.save(path)
        .with_context(|| format!("failed to write {}", path.display()))
}
