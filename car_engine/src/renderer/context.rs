/// Graphics context: the backend's device owner and resource factory

use std::path::Path;
use std::rc::Rc;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::error::Result;
use crate::renderer::buffer::{BufferType, BufferUsage, IndexBuffer, IndexData, Ssbo, UniformBuffer, VertexBuffer};
use crate::renderer::layout::BufferLayout;
use crate::renderer::renderer::RendererApi;
use crate::renderer::shader::{Shader, ShaderDesc};
use crate::renderer::texture::{ImageData, Texture2D};
use crate::renderer::vertex_array::VertexArray;
use crate::resource_paths::ResourcePaths;

/// Which graphics API a context drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    OpenGl,
    Vulkan,
}

/// What a context needs from the platform window
pub trait NativeWindow: HasWindowHandle + HasDisplayHandle {
    /// Drawable size in physical pixels
    fn framebuffer_size(&self) -> (u32, u32);
}

impl NativeWindow for winit::window::Window {
    fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.inner_size();
        (size.width, size.height)
    }
}

/// Context creation settings shared by all backends
#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub app_name: String,
    pub app_version: (u32, u32, u32),
    /// Request API validation (Vulkan: needs the `vulkan-validation` feature)
    pub enable_validation: bool,
    pub vsync: bool,
    pub max_frames_in_flight: usize,
    pub resources: ResourcePaths,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            app_name: "Car Application".to_string(),
            app_version: (0, 1, 0),
            enable_validation: cfg!(debug_assertions),
            vsync: true,
            max_frames_in_flight: 2,
            resources: ResourcePaths::default(),
        }
    }
}

/// Backend device owner and the only way to create device resources
///
/// Exactly one context exists per window. Every resource it hands out is
/// reference counted and releases its native handles when the last
/// reference drops.
pub trait GraphicsContext {
    fn backend(&self) -> Backend;

    /// Create a vertex buffer of `size` bytes, optionally filled with `data`
    fn create_vertex_buffer(
        &self,
        data: Option<&[u8]>,
        size: usize,
        usage: BufferUsage,
        layout: BufferLayout,
    ) -> Result<Rc<dyn VertexBuffer>>;

    /// Create an index buffer holding `count` indices of `index_type`
    ///
    /// `index_type` must be one of the unsigned integer types and match `data`.
    fn create_index_buffer(
        &self,
        data: Option<IndexData<'_>>,
        count: u32,
        index_type: BufferType,
        usage: BufferUsage,
    ) -> Result<Rc<dyn IndexBuffer>>;

    fn create_uniform_buffer(&self, size: usize, binding: u32, usage: BufferUsage) -> Result<Rc<dyn UniformBuffer>>;

    fn create_ssbo(&self, data: Option<&[u8]>, size: usize, usage: BufferUsage) -> Result<Rc<dyn Ssbo>>;

    fn create_texture(&self, image: &ImageData) -> Result<Rc<dyn Texture2D>>;

    /// Decode an image file and upload it
    fn create_texture_from_file(&self, path: &Path, flip_vertically: bool) -> Result<Rc<dyn Texture2D>> {
        let image = ImageData::load(path, flip_vertically)?;
        self.create_texture(&image)
    }

    fn create_shader(&self, desc: &ShaderDesc) -> Result<Rc<dyn Shader>>;

    fn create_vertex_array(
        &self,
        vertex_buffer: Rc<dyn VertexBuffer>,
        index_buffer: Rc<dyn IndexBuffer>,
        shader: Rc<dyn Shader>,
    ) -> Result<Rc<dyn VertexArray>>;

    /// Command interface used by the [`Renderer`](crate::renderer::renderer::Renderer) facade
    fn create_renderer_api(self: Rc<Self>) -> Result<Box<dyn RendererApi>>;

    /// Sources of the built-in 2D batch shader for this backend
    fn renderer2d_shader(&self) -> Result<ShaderDesc>;

    /// Submit the recorded frame and present it
    fn swap_buffers(&self) -> Result<()>;

    /// Rebuild size-dependent objects after the window changed size
    fn resize(&self, width: u32, height: u32) -> Result<()>;

    fn framebuffer_size(&self) -> (u32, u32);

    fn max_frames_in_flight(&self) -> usize;

    /// Frame slot in use, always `frames presented % max_frames_in_flight`
    fn current_frame_index(&self) -> usize;

    fn resource_paths(&self) -> &ResourcePaths;
}
