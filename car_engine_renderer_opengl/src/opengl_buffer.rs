/// OpenGL buffer objects - the shared GlBuffer plus vertex and index buffers
///
/// Uploads and readback go through the COPY_WRITE / COPY_READ targets so
/// they never disturb the element buffer of a bound vertex array object.
/// Growing a buffer respecifies the storage of the same buffer name, so
/// vertex arrays that reference it stay valid.

use car_engine::car::render::{
    compose_grown, plan_update, BufferLayout, BufferType, BufferUsage, IndexBuffer, IndexData, UpdatePlan,
    VertexBuffer,
};
use car_engine::car::{Error, Result};
use car_engine::{engine_bail, engine_bail_warn, engine_err};
use glow::HasContext;
use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;

use crate::opengl_format::usage_to_gl;

// ============================================================================
// GlBuffer
// ============================================================================

pub(crate) struct GlBuffer {
    gl: Rc<glow::Context>,
    handle: glow::Buffer,
    capacity: Cell<usize>,
    usage: BufferUsage,
}

impl GlBuffer {
    pub(crate) fn new(gl: &Rc<glow::Context>, size: usize, usage: BufferUsage) -> Result<Self> {
        let handle = unsafe { gl.create_buffer() }
            .map_err(|e| engine_err!("car::opengl", "Failed to create buffer object: {}", e))?;
        let buffer = Self {
            gl: Rc::clone(gl),
            handle,
            capacity: Cell::new(0),
            usage,
        };
        buffer.respecify_zeroed(size);
        Ok(buffer)
    }

    pub(crate) fn handle(&self) -> glow::Buffer {
        self.handle
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub(crate) fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn respecify_zeroed(&self, size: usize) {
        unsafe {
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(self.handle));
            self.gl
                .buffer_data_u8_slice(glow::COPY_WRITE_BUFFER, &vec![0u8; size], usage_to_gl(self.usage));
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
        }
        self.capacity.set(size);
    }

    /// Replace storage and contents in one call
    pub(crate) fn respecify(&self, bytes: &[u8]) {
        unsafe {
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(self.handle));
            self.gl
                .buffer_data_u8_slice(glow::COPY_WRITE_BUFFER, bytes, usage_to_gl(self.usage));
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
        }
        self.capacity.set(bytes.len());
    }

    /// Write inside the current storage
    pub(crate) fn write(&self, offset: usize, data: &[u8]) -> Result<()> {
        if offset + data.len() > self.capacity.get() {
            return Err(engine_err!(
                "car::opengl",
                "Write of {} bytes at offset {} overflows buffer of {} bytes",
                data.len(),
                offset,
                self.capacity.get()
            ));
        }
        if data.is_empty() {
            return Ok(());
        }
        unsafe {
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(self.handle));
            self.gl
                .buffer_sub_data_u8_slice(glow::COPY_WRITE_BUFFER, offset as i32, data);
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
        }
        Ok(())
    }

    /// Copy the whole buffer back through a read-mapped range
    pub(crate) fn read(&self) -> Result<Vec<u8>> {
        let len = self.capacity.get();
        if len == 0 {
            return Ok(Vec::new());
        }
        unsafe {
            self.gl.bind_buffer(glow::COPY_READ_BUFFER, Some(self.handle));
            let ptr = self
                .gl
                .map_buffer_range(glow::COPY_READ_BUFFER, 0, len as i32, glow::MAP_READ_BIT);
            if ptr.is_null() {
                self.gl.bind_buffer(glow::COPY_READ_BUFFER, None);
                engine_bail!("car::opengl", "Failed to map {} bytes for readback", len);
            }
            let bytes = std::slice::from_raw_parts(ptr, len).to_vec();
            self.gl.unmap_buffer(glow::COPY_READ_BUFFER);
            self.gl.bind_buffer(glow::COPY_READ_BUFFER, None);
            Ok(bytes)
        }
    }

    /// Apply a [`plan_update`] decision
    pub(crate) fn update(&self, data: &[u8], offset: usize) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        match plan_update(self.capacity.get(), offset, data.len(), self.usage)? {
            UpdatePlan::InPlace => self.write(offset, data),
            UpdatePlan::Recreate { .. } => {
                self.respecify(data);
                Ok(())
            }
            UpdatePlan::Grow { capacity, preserved } => {
                let old = self.read()?;
                self.respecify(&compose_grown(&old, preserved, offset, data, capacity));
                Ok(())
            }
        }
    }
}

impl Drop for GlBuffer {
    fn drop(&mut self) {
        unsafe {
            self.gl.delete_buffer(self.handle);
        }
    }
}

// ============================================================================
// VertexBuffer
// ============================================================================

pub struct OpenGlVertexBuffer {
    buffer: GlBuffer,
    layout: BufferLayout,
}

impl OpenGlVertexBuffer {
    pub(crate) fn new(
        gl: &Rc<glow::Context>,
        data: Option<&[u8]>,
        size: usize,
        usage: BufferUsage,
        layout: BufferLayout,
    ) -> Result<Self> {
        let vertex_buffer = Self {
            buffer: GlBuffer::new(gl, size, usage)?,
            layout,
        };
        if let Some(data) = data {
            vertex_buffer.update_data(data, 0)?;
        }
        Ok(vertex_buffer)
    }

    pub(crate) fn handle(&self) -> glow::Buffer {
        self.buffer.handle()
    }
}

impl VertexBuffer for OpenGlVertexBuffer {
    fn update_data(&self, data: &[u8], offset: usize) -> Result<()> {
        self.buffer.update(data, offset)
    }

    fn read_data(&self) -> Result<Vec<u8>> {
        self.buffer.read()
    }

    fn size(&self) -> usize {
        self.buffer.capacity()
    }

    fn usage(&self) -> BufferUsage {
        self.buffer.usage
    }

    fn layout(&self) -> &BufferLayout {
        &self.layout
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// IndexBuffer
// ============================================================================

/// Indices are stored at their own width; OpenGL draws from u8, u16 and u32
pub struct OpenGlIndexBuffer {
    buffer: GlBuffer,
    index_type: BufferType,
}

impl OpenGlIndexBuffer {
    pub(crate) fn new(
        gl: &Rc<glow::Context>,
        data: Option<IndexData<'_>>,
        count: u32,
        index_type: BufferType,
        usage: BufferUsage,
    ) -> Result<Self> {
        if !index_type.is_index_type() {
            return Err(Error::InvalidResource(format!("{:?} is not an index type", index_type)));
        }
        let index_buffer = Self {
            buffer: GlBuffer::new(gl, count as usize * index_type.size(), usage)?,
            index_type,
        };
        if let Some(data) = data {
            index_buffer.update_data(data, 0)?;
        }
        Ok(index_buffer)
    }

    pub(crate) fn handle(&self) -> glow::Buffer {
        self.buffer.handle()
    }
}

impl IndexBuffer for OpenGlIndexBuffer {
    fn update_data(&self, data: IndexData<'_>, offset: usize) -> Result<()> {
        if data.index_type() != self.index_type {
            engine_bail_warn!(
                "car::opengl",
                "index data {:?} written to {:?} buffer",
                data.index_type(),
                self.index_type
            );
        }
        self.buffer.update(data.as_bytes(), offset * self.index_type.size())
    }

    fn read_data(&self) -> Result<Vec<u8>> {
        self.buffer.read()
    }

    fn count(&self) -> u32 {
        (self.buffer.capacity() / self.index_type.size()) as u32
    }

    fn index_type(&self) -> BufferType {
        self.index_type
    }

    fn usage(&self) -> BufferUsage {
        self.buffer.usage
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
