/// Uniform and shader storage buffers
///
/// OpenGL synchronizes buffer writes against pending draws itself, so a
/// uniform buffer is a single buffer object regardless of frames in flight.

use car_engine::car::render::{BufferUsage, Ssbo, UniformBuffer};
use car_engine::car::Result;
use car_engine::{engine_bail_warn, engine_trace};
use glow::HasContext;
use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;

use crate::opengl_buffer::GlBuffer;

// ============================================================================
// UniformBuffer
// ============================================================================

pub struct OpenGlUniformBuffer {
    gl: Rc<glow::Context>,
    buffer: GlBuffer,
    binding: u32,
}

impl OpenGlUniformBuffer {
    pub(crate) fn new(gl: &Rc<glow::Context>, size: usize, binding: u32, usage: BufferUsage) -> Result<Self> {
        Ok(Self {
            gl: Rc::clone(gl),
            buffer: GlBuffer::new(gl, size, usage)?,
            binding,
        })
    }

    /// Attach to an indexed uniform binding point
    pub(crate) fn bind_at(&self, binding: u32) {
        unsafe {
            self.gl
                .bind_buffer_base(glow::UNIFORM_BUFFER, binding, Some(self.buffer.handle()));
        }
    }
}

impl UniformBuffer for OpenGlUniformBuffer {
    fn set_data(&self, data: &[u8], offset: usize) -> Result<()> {
        let size = self.buffer.capacity();
        if offset + data.len() > size {
            engine_bail_warn!(
                "car::opengl",
                "uniform write of {} bytes at {} exceeds {} byte buffer (binding {})",
                data.len(),
                offset,
                size,
                self.binding
            );
        }
        self.buffer.write(offset, data)
    }

    fn read_data(&self) -> Result<Vec<u8>> {
        self.buffer.read()
    }

    fn size(&self) -> usize {
        self.buffer.capacity()
    }

    fn binding(&self) -> u32 {
        self.binding
    }

    fn usage(&self) -> BufferUsage {
        self.buffer.usage()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Ssbo
// ============================================================================

pub struct OpenGlSsbo {
    gl: Rc<glow::Context>,
    buffer: GlBuffer,
    /// Storage binding point set by the last `bind`
    bound_at: Cell<Option<u32>>,
}

impl OpenGlSsbo {
    pub(crate) fn new(gl: &Rc<glow::Context>, data: Option<&[u8]>, size: usize, usage: BufferUsage) -> Result<Self> {
        let ssbo = Self {
            gl: Rc::clone(gl),
            buffer: GlBuffer::new(gl, size, usage)?,
            bound_at: Cell::new(None),
        };
        if let Some(data) = data {
            ssbo.update_buffer(data)?;
        }
        Ok(ssbo)
    }
}

impl Ssbo for OpenGlSsbo {
    fn update_buffer(&self, data: &[u8]) -> Result<()> {
        self.buffer.update(data, 0)
    }

    fn read_data(&self) -> Result<Vec<u8>> {
        self.buffer.read()
    }

    fn size(&self) -> usize {
        self.buffer.capacity()
    }

    fn bind(&self, binding: u32) {
        unsafe {
            self.gl
                .bind_buffer_base(glow::SHADER_STORAGE_BUFFER, binding, Some(self.buffer.handle()));
        }
        self.bound_at.set(Some(binding));
        engine_trace!("car::opengl", "Storage buffer bound at {}", binding);
    }

    fn unbind(&self) {
        if let Some(binding) = self.bound_at.take() {
            unsafe {
                self.gl.bind_buffer_base(glow::SHADER_STORAGE_BUFFER, binding, None);
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
