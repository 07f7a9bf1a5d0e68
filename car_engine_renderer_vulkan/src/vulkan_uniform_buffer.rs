/// Uniform and storage buffers
///
/// A uniform buffer keeps one mapped copy per frame in flight. Writes land in
/// the copy of the frame being recorded, never in a copy an earlier frame may
/// still read. A host-side shadow holds the latest contents so a copy that
/// missed writes is brought up to date before a draw binds it.

use ash::vk;
use car_engine::car::render::{BufferUsage, Ssbo, UniformBuffer};
use car_engine::car::Result;
use car_engine::{engine_bail_warn, engine_trace};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::sync::Arc;

use crate::vulkan_buffer::{update_buffer, GpuBuffer};
use crate::vulkan_context::GpuContext;

// ============================================================================
// UniformBuffer
// ============================================================================

pub struct VulkanUniformBuffer {
    gpu: Arc<GpuContext>,
    copies: Vec<GpuBuffer>,
    /// Version of the shadow each copy holds
    copy_versions: Vec<Cell<u64>>,
    shadow: RefCell<Vec<u8>>,
    version: Cell<u64>,
    binding: u32,
    usage: BufferUsage,
}

impl VulkanUniformBuffer {
    pub(crate) fn new(gpu: &Arc<GpuContext>, size: usize, binding: u32, usage: BufferUsage) -> Result<Self> {
        let copies = (0..gpu.frames_in_flight())
            .map(|_| {
                GpuBuffer::new(
                    gpu,
                    "uniform buffer",
                    size,
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                    BufferUsage::DynamicDraw,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        let copy_versions = copies.iter().map(|_| Cell::new(0)).collect();

        Ok(Self {
            gpu: Arc::clone(gpu),
            copies,
            copy_versions,
            shadow: RefCell::new(vec![0; size]),
            version: Cell::new(0),
            binding,
            usage,
        })
    }

    /// Bring the copy of `frame` up to date
    fn sync_copy(&self, frame: usize) -> Result<()> {
        if self.copy_versions[frame].get() != self.version.get() {
            self.copies[frame].write(0, &self.shadow.borrow())?;
            self.copy_versions[frame].set(self.version.get());
        }
        Ok(())
    }

    /// Buffer and range a descriptor for `frame` should point at
    pub(crate) fn descriptor_info(&self, frame: usize) -> Result<vk::DescriptorBufferInfo> {
        let frame = frame % self.copies.len();
        self.sync_copy(frame)?;
        Ok(vk::DescriptorBufferInfo::default()
            .buffer(self.copies[frame].buffer)
            .offset(0)
            .range(self.copies[frame].size.max(1) as u64))
    }
}

impl UniformBuffer for VulkanUniformBuffer {
    fn set_data(&self, data: &[u8], offset: usize) -> Result<()> {
        let size = self.shadow.borrow().len();
        if offset + data.len() > size {
            engine_bail_warn!(
                "car::vulkan",
                "uniform write of {} bytes at {} exceeds {} byte buffer (binding {})",
                data.len(),
                offset,
                size,
                self.binding
            );
        }
        let frame = self.gpu.frame_index() % self.copies.len();
        // A stale copy gets the whole shadow, not just this range
        let stale = self.copy_versions[frame].get() != self.version.get();

        self.shadow.borrow_mut()[offset..offset + data.len()].copy_from_slice(data);
        self.version.set(self.version.get() + 1);

        if stale {
            self.copies[frame].write(0, &self.shadow.borrow())?;
        } else {
            self.copies[frame].write(offset, data)?;
        }
        self.copy_versions[frame].set(self.version.get());
        Ok(())
    }

    fn read_data(&self) -> Result<Vec<u8>> {
        let frame = self.gpu.frame_index() % self.copies.len();
        self.sync_copy(frame)?;
        let copy = &self.copies[frame];
        copy.read(copy.size)
    }

    fn size(&self) -> usize {
        self.shadow.borrow().len()
    }

    fn binding(&self) -> u32 {
        self.binding
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Ssbo
// ============================================================================

/// Storage buffer; bound to shaders through descriptor sets only
pub struct VulkanSsbo {
    gpu: Arc<GpuContext>,
    buffer: RefCell<GpuBuffer>,
    usage: BufferUsage,
}

impl VulkanSsbo {
    pub(crate) fn new(gpu: &Arc<GpuContext>, data: Option<&[u8]>, size: usize, usage: BufferUsage) -> Result<Self> {
        let buffer = Self::allocate(gpu, size, usage)?;
        let ssbo = Self {
            gpu: Arc::clone(gpu),
            buffer: RefCell::new(buffer),
            usage,
        };
        if let Some(data) = data {
            ssbo.update_buffer(data)?;
        }
        Ok(ssbo)
    }

    fn allocate(gpu: &Arc<GpuContext>, size: usize, usage: BufferUsage) -> Result<GpuBuffer> {
        GpuBuffer::new(gpu, "storage buffer", size, vk::BufferUsageFlags::STORAGE_BUFFER, usage)
    }

    pub(crate) fn descriptor_info(&self) -> vk::DescriptorBufferInfo {
        let buffer = self.buffer.borrow();
        vk::DescriptorBufferInfo::default()
            .buffer(buffer.buffer)
            .offset(0)
            .range(buffer.size.max(1) as u64)
    }
}

impl Ssbo for VulkanSsbo {
    fn update_buffer(&self, data: &[u8]) -> Result<()> {
        update_buffer(&self.buffer, data, 0, self.usage, |capacity| {
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

    fn bind(&self, binding: u32) {
        engine_trace!(
            "car::vulkan",
            "Storage buffer bind({}) ignored: Vulkan binds storage buffers through shader descriptor sets",
            binding
        );
    }

    fn unbind(&self) {}

    fn as_any(&self) -> &dyn Any {
        self
    }
}
