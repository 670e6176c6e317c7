use std::path::PathBuf;

use clap::Parser;
use rast::multipass::OutputMode;

#[derive(Parser, Debug)]
#[command(
    name = "render",
    author,
    version,
    about = "Renders a test scene through the depth prepass and the shading stage"
)]
pub struct Cli {
    /// Output width in pixels.
    #[arg(long, default_value_t = 640)]
    pub width: usize,

    /// Output height in pixels.
    #[arg(long, default_value_t = 480)]
    pub height: usize,

    /// Blend between face normals (0) and vertex normals (1).
    #[arg(long, default_value_t = 0.5)]
    pub smoothness: f32,

    /// Shading configuration TOML file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override the configured output (`observed` or `composite`).
    #[arg(long, value_name = "MODE", value_parser = parse_output_mode)]
    pub mode: Option<OutputMode>,

    /// Apply occlusion across the whole image.
    #[arg(long)]
    pub no_split: bool,

    /// Where to write the BMP image.
    #[arg(long, short, value_name = "PATH", default_value = "shading.bmp")]
    pub output: PathBuf,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_output_mode(value: &str) -> Result<OutputMode, String> {
    match value.to_ascii_lowercase().as_str() {
        "observed" => Ok(OutputMode::Observed),
        "composite" => Ok(OutputMode::Composite),
        other => Err(format!(
            "unknown output mode '{other}', expected 'observed' or 'composite'"
        )),
    }
}
