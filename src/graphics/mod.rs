mod image;
mod framebuffer;
mod scissor;
mod texture;

mod shader;
mod program;
mod context;
mod rasterizer;

pub use image::*;
pub use framebuffer::*;
pub use scissor::*;
pub use texture::*;

pub use shader::*;
pub use program::*;
pub use context::*;
pub use rasterizer::*;
