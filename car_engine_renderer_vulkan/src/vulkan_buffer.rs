/// Vulkan buffers - vertex and index buffers over gpu-allocator memory
///
/// `StaticDraw` buffers live in device-local memory and are written through
/// a staging copy; `DynamicDraw` buffers are persistently mapped host-visible
/// memory written with a plain memcpy.

use ash::vk;
use car_engine::car::render::{
    compose_grown, plan_update, BufferLayout, BufferType, BufferUsage, IndexBuffer, IndexData,
    UpdatePlan, VertexBuffer,
};
use car_engine::car::{Error, Result};
use car_engine::{engine_bail_warn, engine_err};
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use std::any::Any;
use std::cell::RefCell;
use std::sync::Arc;

use crate::vulkan_context::{GpuContext, Retired};

// ============================================================================
// GpuBuffer
// ============================================================================

/// One native buffer and its memory
pub(crate) struct GpuBuffer {
    gpu: Arc<GpuContext>,
    pub(crate) buffer: vk::Buffer,
    allocation: Option<Allocation>,
    /// Capacity in bytes as requested (the allocation may be larger)
    pub(crate) size: usize,
    name: &'static str,
    /// Staging buffers are never referenced by a frame and are destroyed at once
    deferred: bool,
}

impl GpuBuffer {
    /// Buffer for `usage`: device-local for static data, mapped for dynamic data
    pub(crate) fn new(
        gpu: &Arc<GpuContext>,
        name: &'static str,
        size: usize,
        flags: vk::BufferUsageFlags,
        usage: BufferUsage,
    ) -> Result<Self> {
        let (location, flags) = match usage {
            BufferUsage::StaticDraw => (
                MemoryLocation::GpuOnly,
                flags | vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::TRANSFER_SRC,
            ),
            BufferUsage::DynamicDraw => (MemoryLocation::CpuToGpu, flags),
        };
        Self::with_location(gpu, name, size, flags, location, true)
    }

    pub(crate) fn staging(gpu: &Arc<GpuContext>, size: usize, location: MemoryLocation) -> Result<Self> {
        let flags = match location {
            MemoryLocation::GpuToCpu => vk::BufferUsageFlags::TRANSFER_DST,
            _ => vk::BufferUsageFlags::TRANSFER_SRC,
        };
        Self::with_location(gpu, "staging", size, flags, location, false)
    }

    fn with_location(
        gpu: &Arc<GpuContext>,
        name: &'static str,
        size: usize,
        flags: vk::BufferUsageFlags,
        location: MemoryLocation,
        deferred: bool,
    ) -> Result<Self> {
        let (buffer, allocation) = gpu.create_buffer(name, size as u64, flags, location)?;
        Ok(Self {
            gpu: Arc::clone(gpu),
            buffer,
            allocation: Some(allocation),
            size,
            name,
            deferred,
        })
    }

    fn allocation(&self) -> Result<&Allocation> {
        self.allocation
            .as_ref()
            .ok_or_else(|| engine_err!("car::vulkan", "Buffer '{}' has no memory", self.name))
    }

    fn is_mapped(&self) -> bool {
        self.allocation
            .as_ref()
            .map(|a| a.mapped_ptr().is_some())
            .unwrap_or(false)
    }

    /// Write `data` at `offset`; the range must fit the capacity
    pub(crate) fn write(&self, offset: usize, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if offset + data.len() > self.size {
            return Err(engine_err!(
                "car::vulkan",
                "Write of {} bytes at {} overflows buffer '{}' of {} bytes",
                data.len(),
                offset,
                self.name,
                self.size
            ));
        }
        if self.is_mapped() {
            return GpuContext::write_mapped(self.allocation()?, offset, data);
        }
        let staging = GpuBuffer::staging(&self.gpu, data.len(), MemoryLocation::CpuToGpu)?;
        GpuContext::write_mapped(staging.allocation()?, 0, data)?;
        self.gpu
            .copy_buffer(staging.buffer, self.buffer, 0, offset as u64, data.len() as u64)
    }

    /// Read the first `len` bytes back to the host
    pub(crate) fn read(&self, len: usize) -> Result<Vec<u8>> {
        let len = len.min(self.size);
        if len == 0 {
            return Ok(Vec::new());
        }
        if self.is_mapped() {
            return GpuContext::read_mapped(self.allocation()?, len);
        }
        let staging = GpuBuffer::staging(&self.gpu, len, MemoryLocation::GpuToCpu)?;
        self.gpu.copy_buffer(self.buffer, staging.buffer, 0, 0, len as u64)?;
        GpuContext::read_mapped(staging.allocation()?, len)
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            let item = Retired::Buffer { buffer: self.buffer, allocation };
            if self.deferred {
                self.gpu.retire(item);
            } else {
                self.gpu.destroy_now(item);
            }
        }
    }
}

/// Apply a [`plan_update`] decision to a buffer slot
///
/// `recreate(capacity)` builds a replacement buffer of the given size.
pub(crate) fn update_buffer(
    slot: &RefCell<GpuBuffer>,
    data: &[u8],
    offset: usize,
    usage: BufferUsage,
    recreate: impl Fn(usize) -> Result<GpuBuffer>,
) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    let capacity = slot.borrow().size;
    match plan_update(capacity, offset, data.len(), usage)? {
        UpdatePlan::InPlace => slot.borrow().write(offset, data),
        UpdatePlan::Recreate { capacity } => {
            let replacement = recreate(capacity)?;
            replacement.write(0, data)?;
            *slot.borrow_mut() = replacement;
            Ok(())
        }
        UpdatePlan::Grow { capacity, preserved } => {
            let old = slot.borrow().read(preserved)?;
            let bytes = compose_grown(&old, preserved, offset, data, capacity);
            let replacement = recreate(capacity)?;
            replacement.write(0, &bytes)?;
            *slot.borrow_mut() = replacement;
            Ok(())
        }
    }
}

// ============================================================================
// VertexBuffer
// ============================================================================

pub struct VulkanVertexBuffer {
    gpu: Arc<GpuContext>,
    buffer: RefCell<GpuBuffer>,
    usage: BufferUsage,
    layout: BufferLayout,
}

impl VulkanVertexBuffer {
    pub(crate) fn new(
        gpu: &Arc<GpuContext>,
        data: Option<&[u8]>,
        size: usize,
        usage: BufferUsage,
        layout: BufferLayout,
    ) -> Result<Self> {
        let buffer = Self::allocate(gpu, size, usage)?;
        let vertex_buffer = Self {
            gpu: Arc::clone(gpu),
            buffer: RefCell::new(buffer),
            usage,
            layout,
        };
        if let Some(data) = data {
            vertex_buffer.update_data(data, 0)?;
        }
        Ok(vertex_buffer)
    }

    fn allocate(gpu: &Arc<GpuContext>, size: usize, usage: BufferUsage) -> Result<GpuBuffer> {
        GpuBuffer::new(gpu, "vertex buffer", size, vk::BufferUsageFlags::VERTEX_BUFFER, usage)
    }

    pub(crate) fn handle(&self) -> vk::Buffer {
        self.buffer.borrow().buffer
    }
}

impl VertexBuffer for VulkanVertexBuffer {
    fn update_data(&self, data: &[u8], offset: usize) -> Result<()> {
        update_buffer(&self.buffer, data, offset, self.usage, |capacity| {
            Self::allocate(&self.gpu, capacity, self.usage)
        })
    }

    fn read_data(&self) -> Result<Vec<u8>> {
        let buffer = self.buffer.borrow();
        buffer.read(buffer.size)
    }

    fn size(&self) -> usize {
        self.buffer.borrow().size
    }

    fn usage(&self) -> BufferUsage {
        self.usage
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

/// Bytes as stored on the device: u8 indices become u16
pub(crate) fn widen_indices(data: IndexData<'_>) -> Vec<u8> {
    match data {
        IndexData::U8(indices) => {
            let widened: Vec<u16> = indices.iter().map(|&i| i as u16).collect();
            bytemuck::cast_slice(&widened).to_vec()
        }
        other => other.as_bytes().to_vec(),
    }
}

/// Inverse of [`widen_indices`] for readback
pub(crate) fn narrow_indices(stored: &[u8], index_type: BufferType) -> Vec<u8> {
    match index_type {
        BufferType::Byte => stored
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]) as u8)
            .collect(),
        _ => stored.to_vec(),
    }
}

/// Size of one index as stored on the device
pub(crate) fn stored_index_size(index_type: BufferType) -> usize {
    match index_type {
        BufferType::Byte => 2,
        other => other.size(),
    }
}

pub struct VulkanIndexBuffer {
    gpu: Arc<GpuContext>,
    buffer: RefCell<GpuBuffer>,
    index_type: BufferType,
    usage: BufferUsage,
}

impl VulkanIndexBuffer {
    pub(crate) fn new(
        gpu: &Arc<GpuContext>,
        data: Option<IndexData<'_>>,
        count: u32,
        index_type: BufferType,
        usage: BufferUsage,
    ) -> Result<Self> {
        if !index_type.is_index_type() {
            return Err(Error::InvalidResource(format!("{:?} is not an index type", index_type)));
        }
        let size = count as usize * stored_index_size(index_type);
        let buffer = Self::allocate(gpu, size, usage)?;
        let index_buffer = Self {
            gpu: Arc::clone(gpu),
            buffer: RefCell::new(buffer),
            index_type,
            usage,
        };
        if let Some(data) = data {
            index_buffer.update_data(data, 0)?;
        }
        Ok(index_buffer)
    }

    fn allocate(gpu: &Arc<GpuContext>, size: usize, usage: BufferUsage) -> Result<GpuBuffer> {
        GpuBuffer::new(gpu, "index buffer", size, vk::BufferUsageFlags::INDEX_BUFFER, usage)
    }

    pub(crate) fn handle(&self) -> vk::Buffer {
        self.buffer.borrow().buffer
    }
}

impl IndexBuffer for VulkanIndexBuffer {
    fn update_data(&self, data: IndexData<'_>, offset: usize) -> Result<()> {
        if data.index_type() != self.index_type {
            engine_bail_warn!(
                "car::vulkan",
                "index data {:?} written to {:?} buffer",
                data.index_type(),
                self.index_type
            );
        }
        let bytes = widen_indices(data);
        let element = stored_index_size(self.index_type);
        update_buffer(&self.buffer, &bytes, offset * element, self.usage, |capacity| {
            Self::allocate(&self.gpu, capacity, self.usage)
        })
    }

    fn read_data(&self) -> Result<Vec<u8>> {
        let buffer = self.buffer.borrow();
        let stored = buffer.read(buffer.size)?;
        Ok(narrow_indices(&stored, self.index_type))
    }

    fn count(&self) -> u32 {
        (self.buffer.borrow().size / stored_index_size(self.index_type)) as u32
    }

    fn index_type(&self) -> BufferType {
        self.index_type
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
