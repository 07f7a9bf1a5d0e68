/// OpenGlContext - GL context, window surface and resource factory
///
/// One context per window, created current on the calling thread. OpenGL
/// has no explicit recording phase: commands run as they are issued and
/// `swap_buffers` presents the back buffer.
///
/// The frame slot still cycles through `max_frames_in_flight` so callers
/// that keep per-frame resources (the 2D batcher) behave the same on both
/// backends.

use car_engine::car::render::{
    Backend, BufferLayout, BufferType, BufferUsage, ContextConfig, GraphicsContext, ImageData, IndexBuffer,
    IndexData, NativeWindow, RendererApi, Shader, ShaderDesc, ShaderSource, Ssbo, Texture2D, UniformBuffer,
    VertexArray, VertexBuffer,
};
use car_engine::car::{Error, ResourcePaths, Result};
use car_engine::{engine_bail_warn, engine_debug, engine_err, engine_error, engine_info, engine_warn};
use glow::HasContext;
use glutin::config::{ConfigTemplateBuilder, GlConfig};
use glutin::context::{
    ContextApi, ContextAttributesBuilder, GlProfile, NotCurrentGlContext, PossiblyCurrentContext, Version,
};
use glutin::display::{Display, DisplayApiPreference, GlDisplay};
use glutin::surface::{GlSurface, Surface, SurfaceAttributesBuilder, SwapInterval, WindowSurface};
use raw_window_handle::RawWindowHandle;
use std::cell::Cell;
use std::ffi::CString;
use std::num::NonZeroU32;
use std::rc::Rc;

use crate::debug::log_gl_message;
use crate::opengl_buffer::{OpenGlIndexBuffer, OpenGlVertexBuffer};
use crate::opengl_renderer_api::OpenGlRendererApi;
use crate::opengl_shader::OpenGlShader;
use crate::opengl_texture::OpenGlTexture2D;
use crate::opengl_uniform_buffer::{OpenGlSsbo, OpenGlUniformBuffer};
use crate::opengl_vertex_array::OpenGlVertexArray;

/// Context version requested from the driver
pub const GL_VERSION: (u8, u8) = (4, 5);

/// Built-in 2D batch shader, GLSL 4.50 core
pub const RENDERER2D_VERTEX_GLSL: &str = include_str!("../shaders/renderer2d.vert");
pub const RENDERER2D_FRAGMENT_GLSL: &str = include_str!("../shaders/renderer2d.frag");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramePhase {
    Idle,
    Recording,
    Recorded,
}

pub struct OpenGlContext {
    gl: Rc<glow::Context>,
    surface: Surface<WindowSurface>,
    context: PossiblyCurrentContext,

    frame: Cell<usize>,
    frames_presented: Cell<u64>,
    phase: Cell<FramePhase>,
    framebuffer_size: Cell<(u32, u32)>,

    config: ContextConfig,
}

fn init_err(message: String) -> Error {
    engine_error!("car::opengl", "{}", message);
    Error::InitializationFailed(message)
}

fn non_zero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
}

/// Platform GL display API
fn display_preference(window: RawWindowHandle) -> DisplayApiPreference {
    #[cfg(target_os = "windows")]
    {
        DisplayApiPreference::Wgl(Some(window))
    }
    #[cfg(target_os = "macos")]
    {
        let _ = window;
        DisplayApiPreference::Cgl
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let _ = window;
        DisplayApiPreference::Egl
    }
}

/// Stage source for a built-in shader: `<root>/shaders/<name>` if present, else the embedded text
pub fn glsl_stage(paths: &ResourcePaths, name: &str, embedded: &str) -> ShaderSource {
    let path = paths.shader(name);
    if path.is_file() {
        ShaderSource::File(path)
    } else {
        ShaderSource::Bytes(embedded.as_bytes().to_vec())
    }
}

impl OpenGlContext {
    /// Create a GL 4.5 core context for `window` and make it current
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` when the window exposes no native
    /// handles or the driver cannot provide a matching context.
    pub fn new<W: NativeWindow + ?Sized>(window: &W, config: ContextConfig) -> Result<Self> {
        let (width, height) = window.framebuffer_size();
        let raw_display = window
            .display_handle()
            .map_err(|e| init_err(format!("Window has no display handle: {}", e)))?
            .as_raw();
        let raw_window = window
            .window_handle()
            .map_err(|e| init_err(format!("Window has no window handle: {}", e)))?
            .as_raw();

        let display = unsafe { Display::new(raw_display, display_preference(raw_window)) }
            .map_err(|e| init_err(format!("Failed to open GL display: {}", e)))?;

        let template = ConfigTemplateBuilder::new()
            .with_alpha_size(8)
            .with_depth_size(24)
            .compatible_with_native_window(raw_window)
            .build();
        // Fewest samples: the renderer does not rely on multisampling
        let gl_config = unsafe { display.find_configs(template) }
            .map_err(|e| init_err(format!("Failed to query GL configs: {}", e)))?
            .reduce(|best, candidate| {
                if candidate.num_samples() < best.num_samples() {
                    candidate
                } else {
                    best
                }
            })
            .ok_or_else(|| init_err("No GL config matches the window".to_string()))?;

        let (major, minor) = GL_VERSION;
        let context_attributes = ContextAttributesBuilder::new()
            .with_context_api(ContextApi::OpenGl(Some(Version::new(major, minor))))
            .with_profile(GlProfile::Core)
            .with_debug(config.enable_validation)
            .build(Some(raw_window));
        let not_current = unsafe { display.create_context(&gl_config, &context_attributes) }
            .map_err(|e| init_err(format!("Failed to create OpenGL {}.{} core context: {}", major, minor, e)))?;

        let surface_attributes = SurfaceAttributesBuilder::<WindowSurface>::new().build(
            raw_window,
            non_zero(width),
            non_zero(height),
        );
        let surface = unsafe { display.create_window_surface(&gl_config, &surface_attributes) }
            .map_err(|e| init_err(format!("Failed to create window surface: {}", e)))?;
        let context = not_current
            .make_current(&surface)
            .map_err(|e| init_err(format!("Failed to make GL context current: {}", e)))?;

        let interval = if config.vsync {
            SwapInterval::Wait(NonZeroU32::MIN)
        } else {
            SwapInterval::DontWait
        };
        if let Err(e) = surface.set_swap_interval(&context, interval) {
            engine_warn!("car::opengl", "Could not set swap interval {:?}: {}", interval, e);
        }

        let mut gl = unsafe {
            glow::Context::from_loader_function(|name| match CString::new(name) {
                Ok(name) => display.get_proc_address(&name),
                Err(_) => std::ptr::null(),
            })
        };

        if config.enable_validation {
            if gl.supports_debug() {
                unsafe {
                    gl.enable(glow::DEBUG_OUTPUT);
                    gl.enable(glow::DEBUG_OUTPUT_SYNCHRONOUS);
                    gl.debug_message_callback(log_gl_message);
                }
                engine_info!("car::opengl", "OpenGL debug output enabled");
            } else {
                engine_warn!("car::opengl", "Validation requested but the driver has no debug output");
            }
        }

        unsafe {
            engine_info!(
                "car::opengl",
                "OpenGL context: {} ({})",
                gl.get_parameter_string(glow::VERSION),
                gl.get_parameter_string(glow::RENDERER)
            );
            gl.viewport(0, 0, width as i32, height as i32);
        }

        let max_frames = config.max_frames_in_flight.max(1);
        let config = ContextConfig { max_frames_in_flight: max_frames, ..config };

        Ok(Self {
            gl: Rc::new(gl),
            surface,
            context,
            frame: Cell::new(0),
            frames_presented: Cell::new(0),
            phase: Cell::new(FramePhase::Idle),
            framebuffer_size: Cell::new((width, height)),
            config,
        })
    }

    pub fn gl(&self) -> &Rc<glow::Context> {
        &self.gl
    }

    /// Frames handed to `swap_buffers` that were actually presented
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented.get()
    }

    /// Open a frame; `Ok(false)` while the framebuffer has no area
    pub(crate) fn begin_frame(&self) -> Result<bool> {
        if self.phase.get() != FramePhase::Idle {
            engine_bail_warn!("car::opengl", "begin_frame called with a frame already open");
        }
        let (width, height) = self.framebuffer_size.get();
        if width == 0 || height == 0 {
            return Ok(false);
        }
        unsafe {
            self.gl.viewport(0, 0, width as i32, height as i32);
            self.gl.disable(glow::SCISSOR_TEST);
        }
        self.phase.set(FramePhase::Recording);
        Ok(true)
    }

    pub(crate) fn end_frame(&self) -> Result<()> {
        if self.phase.get() != FramePhase::Recording {
            engine_bail_warn!("car::opengl", "end_frame called with no frame open");
        }
        self.phase.set(FramePhase::Recorded);
        Ok(())
    }

    pub(crate) fn abandon_frame(&self) {
        self.phase.set(FramePhase::Idle);
    }

    pub(crate) fn is_recording(&self) -> bool {
        self.phase.get() == FramePhase::Recording
    }
}

impl GraphicsContext for OpenGlContext {
    fn backend(&self) -> Backend {
        Backend::OpenGl
    }

    fn create_vertex_buffer(
        &self,
        data: Option<&[u8]>,
        size: usize,
        usage: BufferUsage,
        layout: BufferLayout,
    ) -> Result<Rc<dyn VertexBuffer>> {
        Ok(Rc::new(OpenGlVertexBuffer::new(&self.gl, data, size, usage, layout)?))
    }

    fn create_index_buffer(
        &self,
        data: Option<IndexData<'_>>,
        count: u32,
        index_type: BufferType,
        usage: BufferUsage,
    ) -> Result<Rc<dyn IndexBuffer>> {
        Ok(Rc::new(OpenGlIndexBuffer::new(&self.gl, data, count, index_type, usage)?))
    }

    fn create_uniform_buffer(&self, size: usize, binding: u32, usage: BufferUsage) -> Result<Rc<dyn UniformBuffer>> {
        Ok(Rc::new(OpenGlUniformBuffer::new(&self.gl, size, binding, usage)?))
    }

    fn create_ssbo(&self, data: Option<&[u8]>, size: usize, usage: BufferUsage) -> Result<Rc<dyn Ssbo>> {
        Ok(Rc::new(OpenGlSsbo::new(&self.gl, data, size, usage)?))
    }

    fn create_texture(&self, image: &ImageData) -> Result<Rc<dyn Texture2D>> {
        Ok(Rc::new(OpenGlTexture2D::new(&self.gl, image)?))
    }

    fn create_shader(&self, desc: &ShaderDesc) -> Result<Rc<dyn Shader>> {
        Ok(Rc::new(OpenGlShader::new(
            &self.gl,
            &desc.vertex,
            &desc.fragment,
            desc.spec.clone(),
        )?))
    }

    fn create_vertex_array(
        &self,
        vertex_buffer: Rc<dyn VertexBuffer>,
        index_buffer: Rc<dyn IndexBuffer>,
        shader: Rc<dyn Shader>,
    ) -> Result<Rc<dyn VertexArray>> {
        Ok(Rc::new(OpenGlVertexArray::new(&self.gl, vertex_buffer, index_buffer, shader)?))
    }

    fn create_renderer_api(self: Rc<Self>) -> Result<Box<dyn RendererApi>> {
        Ok(Box::new(OpenGlRendererApi::new(self)))
    }

    fn renderer2d_shader(&self) -> Result<ShaderDesc> {
        let paths = &self.config.resources;
        Ok(ShaderDesc::new(
            glsl_stage(paths, "renderer2d.vert", RENDERER2D_VERTEX_GLSL),
            glsl_stage(paths, "renderer2d.frag", RENDERER2D_FRAGMENT_GLSL),
        ))
    }

    fn swap_buffers(&self) -> Result<()> {
        match self.phase.get() {
            FramePhase::Recorded => {}
            // Skipped frame: nothing to present, the slot does not advance
            FramePhase::Idle => return Ok(()),
            FramePhase::Recording => {
                engine_bail_warn!("car::opengl", "swap_buffers called before end_recording");
            }
        }
        self.phase.set(FramePhase::Idle);
        self.surface
            .swap_buffers(&self.context)
            .map_err(|e| engine_err!("car::opengl", "Failed to swap buffers: {}", e))?;

        self.frames_presented.set(self.frames_presented.get() + 1);
        self.frame.set((self.frame.get() + 1) % self.config.max_frames_in_flight);
        Ok(())
    }

    fn resize(&self, width: u32, height: u32) -> Result<()> {
        self.framebuffer_size.set((width, height));
        if width == 0 || height == 0 {
            engine_debug!("car::opengl", "Framebuffer is {}x{}; frames are skipped until it grows", width, height);
            return Ok(());
        }
        self.surface.resize(&self.context, non_zero(width), non_zero(height));
        if self.phase.get() == FramePhase::Idle {
            unsafe {
                self.gl.viewport(0, 0, width as i32, height as i32);
            }
        }
        Ok(())
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.framebuffer_size.get()
    }

    fn max_frames_in_flight(&self) -> usize {
        self.config.max_frames_in_flight
    }

    fn current_frame_index(&self) -> usize {
        self.frame.get()
    }

    fn resource_paths(&self) -> &ResourcePaths {
        &self.config.resources
    }
}

impl Drop for OpenGlContext {
    fn drop(&mut self) {
        if self.phase.get() != FramePhase::Idle {
            engine_warn!("car::opengl", "Context dropped with a frame still open");
        }
        unsafe {
            self.gl.finish();
        }
    }
}
