/// OpenGL vertex array object over one vertex buffer, index buffer and shader

use car_engine::car::render::{IndexBuffer, Shader, VertexArray, VertexBuffer, VertexInputRate};
use car_engine::car::Result;
use car_engine::{engine_err, engine_warn_err};
use glow::HasContext;
use std::any::Any;
use std::rc::Rc;

use crate::opengl_buffer::{OpenGlIndexBuffer, OpenGlVertexBuffer};
use crate::opengl_format::{attribute_pointers, AttributePointer};
use crate::opengl_shader::OpenGlShader;

pub struct OpenGlVertexArray {
    gl: Rc<glow::Context>,
    vao: glow::VertexArray,
    pointers: Vec<AttributePointer>,
    vertex_buffer: Rc<dyn VertexBuffer>,
    index_buffer: Rc<dyn IndexBuffer>,
    shader: Rc<dyn Shader>,
}

impl OpenGlVertexArray {
    pub(crate) fn new(
        gl: &Rc<glow::Context>,
        vertex_buffer: Rc<dyn VertexBuffer>,
        index_buffer: Rc<dyn IndexBuffer>,
        shader: Rc<dyn Shader>,
    ) -> Result<Self> {
        if vertex_buffer.as_any().downcast_ref::<OpenGlVertexBuffer>().is_none() {
            return Err(engine_warn_err!("car::opengl", "Vertex buffer was not created by the OpenGL backend"));
        }
        if index_buffer.as_any().downcast_ref::<OpenGlIndexBuffer>().is_none() {
            return Err(engine_warn_err!("car::opengl", "Index buffer was not created by the OpenGL backend"));
        }
        if shader.as_any().downcast_ref::<OpenGlShader>().is_none() {
            return Err(engine_warn_err!("car::opengl", "Shader was not created by the OpenGL backend"));
        }
        vertex_buffer.layout().check_vertex_inputs(shader.vertex_inputs())?;
        let pointers = attribute_pointers(vertex_buffer.layout())?;
        let vao = unsafe { gl.create_vertex_array() }
            .map_err(|e| engine_err!("car::opengl", "Failed to create vertex array object: {}", e))?;

        Ok(Self {
            gl: Rc::clone(gl),
            vao,
            pointers,
            vertex_buffer,
            index_buffer,
            shader,
        })
    }

    pub(crate) fn parts(&self) -> Result<(&OpenGlVertexBuffer, &OpenGlIndexBuffer, &OpenGlShader)> {
        let vertex_buffer = self.vertex_buffer.as_any().downcast_ref::<OpenGlVertexBuffer>();
        let index_buffer = self.index_buffer.as_any().downcast_ref::<OpenGlIndexBuffer>();
        let shader = self.shader.as_any().downcast_ref::<OpenGlShader>();
        match (vertex_buffer, index_buffer, shader) {
            (Some(vb), Some(ib), Some(shader)) => Ok((vb, ib, shader)),
            _ => Err(engine_err!("car::opengl", "Vertex array holds a non-OpenGL resource")),
        }
    }

    /// Bind the VAO and re-apply the vertex layout and index buffer
    ///
    /// The layout is specified at every bind, so the VAO always matches the
    /// buffers it wraps even after they were reallocated.
    pub(crate) fn bind(&self) -> Result<()> {
        let (vertex_buffer, index_buffer, shader) = self.parts()?;
        let divisor = match shader.pipeline_spec().input_rate {
            VertexInputRate::Vertex => 0,
            VertexInputRate::Instance => 1,
        };
        let stride = vertex_buffer.layout().stride() as i32;
        let gl = &self.gl;
        unsafe {
            gl.bind_vertex_array(Some(self.vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vertex_buffer.handle()));
            for pointer in &self.pointers {
                gl.enable_vertex_attrib_array(pointer.location);
                if pointer.integer {
                    gl.vertex_attrib_pointer_i32(
                        pointer.location,
                        pointer.components,
                        pointer.gl_type,
                        stride,
                        pointer.offset,
                    );
                } else {
                    gl.vertex_attrib_pointer_f32(
                        pointer.location,
                        pointer.components,
                        pointer.gl_type,
                        pointer.normalized,
                        stride,
                        pointer.offset,
                    );
                }
                gl.vertex_attrib_divisor(pointer.location, divisor);
            }
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(index_buffer.handle()));
        }
        Ok(())
    }

    pub(crate) fn unbind(&self) {
        unsafe {
            self.gl.bind_vertex_array(None);
        }
    }
}

impl VertexArray for OpenGlVertexArray {
    fn vertex_buffer(&self) -> &Rc<dyn VertexBuffer> {
        &self.vertex_buffer
    }

    fn index_buffer(&self) -> &Rc<dyn IndexBuffer> {
        &self.index_buffer
    }

    fn shader(&self) -> &Rc<dyn Shader> {
        &self.shader
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for OpenGlVertexArray {
    fn drop(&mut self) {
        unsafe {
            self.gl.delete_vertex_array(self.vao);
        }
    }
}
