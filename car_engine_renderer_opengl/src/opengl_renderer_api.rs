/// OpenGL implementation of the renderer command interface
///
/// Commands execute immediately. Fixed-function state comes from two
/// places: the shader's pipeline spec and the renderer's blending and
/// depth-test toggles, combined at every draw.

use car_engine::car::render::{
    ClipSpace, Color, GraphicsContext, IndexBuffer, PipelineSpec, RendererApi, Scissor, Shader, ShaderStages,
    VertexArray, Viewport,
};
use car_engine::car::Result;
use car_engine::{engine_debug, engine_info, engine_trace, engine_warn, engine_warn_err};
use glow::HasContext;
use std::cell::Cell;
use std::rc::Rc;

use crate::opengl_context::OpenGlContext;
use crate::opengl_format::{cull_mode_to_gl, front_face_to_gl, index_type_to_gl, polygon_mode_to_gl, topology_to_gl};
use crate::opengl_vertex_array::OpenGlVertexArray;

/// Window-space rectangle `(x, y, width, height)` with a bottom-left origin
pub type GlRect = (i32, i32, i32, i32);

/// Convert a top-left origin viewport to OpenGL's bottom-left window space
pub fn gl_viewport_rect(viewport: Viewport, framebuffer_height: u32) -> GlRect {
    let y = framebuffer_height as f32 - viewport.y - viewport.height;
    (
        viewport.x.round() as i32,
        y.round() as i32,
        viewport.width.round() as i32,
        viewport.height.round() as i32,
    )
}

/// Convert a top-left origin scissor to OpenGL's bottom-left window space
pub fn gl_scissor_rect(scissor: Scissor, framebuffer_height: u32) -> GlRect {
    let y = framebuffer_height as i64 - scissor.y as i64 - scissor.height as i64;
    (scissor.x, y as i32, scissor.width as i32, scissor.height as i32)
}

/// Blending is on only when the renderer allows it and the shader asks for it
pub fn blending_enabled(renderer_toggle: bool, spec: &PipelineSpec) -> bool {
    renderer_toggle && spec.alpha_blending
}

pub struct OpenGlRendererApi {
    context: Rc<OpenGlContext>,
    clear_color: Cell<Color>,
    blending: Cell<bool>,
    depth_test: Cell<bool>,
}

impl OpenGlRendererApi {
    pub(crate) fn new(context: Rc<OpenGlContext>) -> Self {
        Self {
            context,
            clear_color: Cell::new(Color::BLACK),
            blending: Cell::new(true),
            depth_test: Cell::new(false),
        }
    }

    fn opengl_vertex_array<'a>(&self, vertex_array: &'a Rc<dyn VertexArray>) -> Result<&'a OpenGlVertexArray> {
        vertex_array
            .as_any()
            .downcast_ref::<OpenGlVertexArray>()
            .ok_or_else(|| engine_warn_err!("car::opengl", "Vertex array was not created by the OpenGL backend"))
    }

    fn apply_pipeline_state(&self, spec: &PipelineSpec) {
        let gl = self.context.gl();
        unsafe {
            match cull_mode_to_gl(spec.cull_mode) {
                Some(face) => {
                    gl.enable(glow::CULL_FACE);
                    gl.cull_face(face);
                }
                None => gl.disable(glow::CULL_FACE),
            }
            gl.front_face(front_face_to_gl(spec.front_face));
            gl.polygon_mode(glow::FRONT_AND_BACK, polygon_mode_to_gl(spec.polygon_mode));
            if spec.primitive_restart {
                gl.enable(glow::PRIMITIVE_RESTART_FIXED_INDEX);
            } else {
                gl.disable(glow::PRIMITIVE_RESTART_FIXED_INDEX);
            }
            if blending_enabled(self.blending.get(), spec) {
                gl.enable(glow::BLEND);
                gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
            } else {
                gl.disable(glow::BLEND);
            }
            if self.depth_test.get() {
                gl.enable(glow::DEPTH_TEST);
                gl.depth_func(glow::LESS);
            } else {
                gl.disable(glow::DEPTH_TEST);
            }
            gl.depth_range_f32(spec.min_depth, spec.max_depth);
        }
    }
}

impl RendererApi for OpenGlRendererApi {
    fn init(&self) -> Result<()> {
        let (width, height) = self.context.framebuffer_size();
        engine_info!("car::opengl", "OpenGL renderer initialized ({}x{})", width, height);
        Ok(())
    }

    fn shutdown(&self) {
        self.context.abandon_frame();
        unsafe {
            self.context.gl().finish();
        }
        engine_debug!("car::opengl", "OpenGL renderer shut down");
    }

    fn begin_recording(&self) -> Result<bool> {
        self.context.begin_frame()
    }

    fn end_recording(&self) -> Result<()> {
        self.context.end_frame()
    }

    fn set_clear_color(&self, color: Color) {
        self.clear_color.set(color);
    }

    fn clear(&self) {
        if !self.context.is_recording() {
            engine_warn!("car::opengl", "clear issued with no frame recording");
            return;
        }
        let color = self.clear_color.get();
        let gl = self.context.gl();
        unsafe {
            gl.clear_color(color.r, color.g, color.b, color.a);
            gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }
    }

    fn set_viewport(&self, viewport: Viewport) {
        let (_, height) = self.context.framebuffer_size();
        let (x, y, w, h) = gl_viewport_rect(viewport, height);
        unsafe {
            self.context.gl().viewport(x, y, w, h);
        }
    }

    fn set_scissor(&self, scissor: Scissor) {
        let (_, height) = self.context.framebuffer_size();
        let (x, y, w, h) = gl_scissor_rect(scissor, height);
        let gl = self.context.gl();
        unsafe {
            gl.enable(glow::SCISSOR_TEST);
            gl.scissor(x, y, w, h);
        }
    }

    fn draw_indexed(&self, vertex_array: &Rc<dyn VertexArray>, index_count: u32) -> Result<()> {
        if !self.context.is_recording() {
            return Err(engine_warn_err!("car::opengl", "draw_indexed issued with no frame recording"));
        }
        let vertex_array_gl = self.opengl_vertex_array(vertex_array)?;
        let (_, index_buffer, shader) = vertex_array_gl.parts()?;
        let index_type = index_type_to_gl(index_buffer.index_type())?;
        let spec = shader.pipeline_spec();

        shader.bind();
        vertex_array_gl.bind()?;
        self.apply_pipeline_state(spec);
        unsafe {
            self.context
                .gl()
                .draw_elements(topology_to_gl(spec.topology), index_count as i32, index_type, 0);
        }
        vertex_array_gl.unbind();
        engine_trace!(
            "car::opengl",
            "draw_indexed({}) in frame slot {}",
            index_count,
            self.context.current_frame_index()
        );
        Ok(())
    }

    fn push_constant(
        &self,
        vertex_array: &Rc<dyn VertexArray>,
        _stages: ShaderStages,
        data: &[u8],
        offset: u32,
    ) -> Result<()> {
        let (_, _, shader) = self.opengl_vertex_array(vertex_array)?.parts()?;
        // One uniform block serves every stage that declares it
        shader.push_constants(data, offset)
    }

    fn set_blending(&self, enabled: bool) {
        self.blending.set(enabled);
    }

    fn set_depth_test(&self, enabled: bool) {
        self.depth_test.set(enabled);
    }

    fn clip_space(&self) -> ClipSpace {
        ClipSpace::YUp
    }
}
