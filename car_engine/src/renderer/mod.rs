/// Renderer module - device resource traits, graphics context and the Renderer facade

pub mod buffer;
pub mod color;
pub mod compiled_shader;
pub mod context;
pub mod layout;
pub mod renderer;
pub mod shader;
pub mod texture;
pub mod vertex_array;

#[cfg(test)]
pub(crate) mod mock_backend;

pub use buffer::*;
pub use color::*;
pub use compiled_shader::*;
pub use context::*;
pub use layout::*;
pub use renderer::*;
pub use shader::*;
pub use texture::*;
pub use vertex_array::*;
