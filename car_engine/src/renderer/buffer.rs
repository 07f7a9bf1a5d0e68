/// Buffer descriptors and the device buffer traits (vertex, index, uniform, storage)

use std::any::Any;

use crate::error::Result;
use crate::renderer::layout::BufferLayout;

/// Memory strategy hint for a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Device-local, uploaded once through a staging copy
    StaticDraw,
    /// Host-visible, rewritten frequently
    DynamicDraw,
}

/// Raw element type of buffer data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferType {
    Float,
    Double,
    UnsignedInt,
    UnsignedShort,
    Byte,
}

impl BufferType {
    /// Size of one element in bytes
    pub const fn size(self) -> usize {
        match self {
            BufferType::Float => 4,
            BufferType::Double => 8,
            BufferType::UnsignedInt => 4,
            BufferType::UnsignedShort => 2,
            BufferType::Byte => 1,
        }
    }

    /// Only unsigned integer types can index vertices
    pub const fn is_index_type(self) -> bool {
        matches!(
            self,
            BufferType::UnsignedInt | BufferType::UnsignedShort | BufferType::Byte
        )
    }
}

/// Borrowed index data, tagged with its element type
#[derive(Debug, Clone, Copy)]
pub enum IndexData<'a> {
    U32(&'a [u32]),
    U16(&'a [u16]),
    U8(&'a [u8]),
}

impl<'a> IndexData<'a> {
    pub fn index_type(&self) -> BufferType {
        match self {
            IndexData::U32(_) => BufferType::UnsignedInt,
            IndexData::U16(_) => BufferType::UnsignedShort,
            IndexData::U8(_) => BufferType::Byte,
        }
    }

    /// Number of indices
    pub fn len(&self) -> usize {
        match self {
            IndexData::U32(d) => d.len(),
            IndexData::U16(d) => d.len(),
            IndexData::U8(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        match *self {
            IndexData::U32(d) => bytemuck::cast_slice(d),
            IndexData::U16(d) => bytemuck::cast_slice(d),
            IndexData::U8(d) => d,
        }
    }
}

// ===== UPDATE PLANNING =====

/// What a buffer must do to accept a write of `size` bytes at `offset`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePlan {
    /// The write fits: sub-update in place
    InPlace,
    /// Offset 0 past capacity: drop old contents, reallocate at `capacity`
    Recreate { capacity: usize },
    /// Offset > 0 past capacity: reallocate at `capacity`, keep the first
    /// `preserved` bytes, zero the gap up to the write offset
    Grow { capacity: usize, preserved: usize },
}

/// Decide how a buffer of `capacity` bytes handles a write
///
/// # Errors
///
/// Growing a `StaticDraw` buffer with a nonzero offset is a usage error:
/// static buffers have to be allocated at their final size.
pub fn plan_update(
    capacity: usize,
    offset: usize,
    size: usize,
    usage: BufferUsage,
) -> Result<UpdatePlan> {
    let end = offset + size;
    if end <= capacity {
        return Ok(UpdatePlan::InPlace);
    }
    if offset == 0 {
        return Ok(UpdatePlan::Recreate { capacity: size });
    }
    if usage == BufferUsage::StaticDraw {
        crate::engine_bail_warn!(
            "car::Buffer",
            "cannot grow a StaticDraw buffer from {} to {} bytes with offset {}; allocate it at full size",
            capacity,
            end,
            offset
        );
    }
    Ok(UpdatePlan::Grow {
        capacity: end,
        preserved: offset.min(capacity),
    })
}

/// Build the contents of a grown buffer
///
/// `old` holds the previous contents; only its first `preserved` bytes are
/// kept. Bytes between `preserved` and `offset` are zero.
pub fn compose_grown(old: &[u8], preserved: usize, offset: usize, data: &[u8], capacity: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; capacity];
    let keep = preserved.min(old.len()).min(capacity);
    bytes[..keep].copy_from_slice(&old[..keep]);
    bytes[offset..offset + data.len()].copy_from_slice(data);
    bytes
}

// ===== BUFFER TRAITS =====

/// Vertex data on the device
///
/// Writes follow the [`plan_update`] contract. Mutation is not
/// double-buffered: updating a buffer that an earlier in-flight frame
/// still reads is the caller's hazard.
pub trait VertexBuffer {
    /// Write `data` at byte `offset`
    fn update_data(&self, data: &[u8], offset: usize) -> Result<()>;

    /// Copy the current contents back to the host
    fn read_data(&self) -> Result<Vec<u8>>;

    /// Capacity in bytes
    fn size(&self) -> usize;

    fn usage(&self) -> BufferUsage;

    fn layout(&self) -> &BufferLayout;

    fn as_any(&self) -> &dyn Any;
}

/// Index data on the device
pub trait IndexBuffer {
    /// Write indices starting at element `offset`
    ///
    /// The index type must match the buffer's type.
    fn update_data(&self, data: IndexData<'_>, offset: usize) -> Result<()>;

    fn read_data(&self) -> Result<Vec<u8>>;

    /// Number of indices the buffer holds
    fn count(&self) -> u32;

    fn index_type(&self) -> BufferType;

    fn usage(&self) -> BufferUsage;

    fn as_any(&self) -> &dyn Any;
}

/// Uniform block data bound at a fixed binding
///
/// On backends with frames in flight each uniform buffer owns one backing
/// buffer per frame and `set_data` only touches the current frame's copy.
pub trait UniformBuffer {
    fn set_data(&self, data: &[u8], offset: usize) -> Result<()>;

    /// Contents of the copy the current frame reads
    fn read_data(&self) -> Result<Vec<u8>>;

    fn size(&self) -> usize;

    fn binding(&self) -> u32;

    fn usage(&self) -> BufferUsage;

    fn as_any(&self) -> &dyn Any;
}

/// Shader storage buffer
pub trait Ssbo {
    /// Replace the whole contents, resizing as needed
    fn update_buffer(&self, data: &[u8]) -> Result<()>;

    fn read_data(&self) -> Result<Vec<u8>>;

    fn size(&self) -> usize;

    /// Attach to an indexed storage binding point where the backend has one
    fn bind(&self, binding: u32);

    fn unbind(&self);

    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
