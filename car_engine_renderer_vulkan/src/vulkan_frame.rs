/// Per-frame-in-flight objects: command buffer, sync primitives and descriptor pools

use ash::vk;
use car_engine::car::{Error, Result};
use car_engine::{engine_err, engine_error, engine_trace};
use std::cell::{Cell, RefCell};

const SETS_PER_POOL: u32 = 1024;

fn create_descriptor_pool(device: &ash::Device) -> Result<vk::DescriptorPool> {
    let pool_sizes = [
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: SETS_PER_POOL * car_engine::car::render::MAX_TEXTURE_SLOTS as u32,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: SETS_PER_POOL,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::STORAGE_BUFFER,
            descriptor_count: SETS_PER_POOL,
        },
    ];
    let info = vk::DescriptorPoolCreateInfo::default()
        .pool_sizes(&pool_sizes)
        .max_sets(SETS_PER_POOL);

    unsafe {
        device
            .create_descriptor_pool(&info, None)
            .map_err(|e| engine_err!("car::vulkan", "Failed to create descriptor pool: {:?}", e))
    }
}

/// Descriptor sets for one frame slot
///
/// Sets are allocated per draw and all freed at once by [`reset`](Self::reset)
/// after the slot's fence wait. A full pool is followed by a fresh one.
pub(crate) struct DescriptorAllocator {
    pools: RefCell<Vec<vk::DescriptorPool>>,
    current: Cell<usize>,
}

impl DescriptorAllocator {
    fn new(device: &ash::Device) -> Result<Self> {
        Ok(Self {
            pools: RefCell::new(vec![create_descriptor_pool(device)?]),
            current: Cell::new(0),
        })
    }

    pub(crate) fn allocate(
        &self,
        device: &ash::Device,
        layouts: &[vk::DescriptorSetLayout],
    ) -> Result<Vec<vk::DescriptorSet>> {
        if layouts.is_empty() {
            return Ok(Vec::new());
        }
        loop {
            let pool = self.pools.borrow()[self.current.get()];
            let info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(pool)
                .set_layouts(layouts);
            match unsafe { device.allocate_descriptor_sets(&info) } {
                Ok(sets) => return Ok(sets),
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {
                    let next = self.current.get() + 1;
                    if next == self.pools.borrow().len() {
                        let pool = create_descriptor_pool(device)?;
                        self.pools.borrow_mut().push(pool);
                        engine_trace!("car::vulkan", "Descriptor pool {} added to frame slot", next);
                    }
                    self.current.set(next);
                }
                Err(e) => {
                    return Err(engine_err!("car::vulkan", "Failed to allocate descriptor sets: {:?}", e));
                }
            }
        }
    }

    /// Return every set of this slot to its pool
    pub(crate) fn reset(&self, device: &ash::Device) -> Result<()> {
        for &pool in self.pools.borrow().iter() {
            unsafe {
                device
                    .reset_descriptor_pool(pool, vk::DescriptorPoolResetFlags::empty())
                    .map_err(|e| engine_err!("car::vulkan", "Failed to reset descriptor pool: {:?}", e))?;
            }
        }
        self.current.set(0);
        Ok(())
    }

    fn destroy(&self, device: &ash::Device) {
        for pool in self.pools.borrow_mut().drain(..) {
            unsafe {
                device.destroy_descriptor_pool(pool, None);
            }
        }
    }
}

/// Everything one frame in flight owns
pub(crate) struct FrameSync {
    pub command_buffer: vk::CommandBuffer,
    /// Signaled by acquire, waited on by the submit
    pub image_available: vk::Semaphore,
    /// Signaled when the frame's submission completes
    pub in_flight: vk::Fence,
    pub descriptors: DescriptorAllocator,
}

impl FrameSync {
    /// `count` frames sharing `command_pool`; fences start signaled
    pub(crate) fn create_all(device: &ash::Device, command_pool: vk::CommandPool, count: usize) -> Result<Vec<Self>> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count as u32);

        let command_buffers = unsafe { device.allocate_command_buffers(&alloc_info) }.map_err(|e| {
            engine_error!("car::vulkan", "Failed to allocate frame command buffers: {:?}", e);
            Error::InitializationFailed(format!("Failed to allocate command buffers: {:?}", e))
        })?;

        command_buffers
            .into_iter()
            .map(|command_buffer| {
                Ok(Self {
                    command_buffer,
                    image_available: create_semaphore(device)?,
                    in_flight: create_fence(device)?,
                    descriptors: DescriptorAllocator::new(device)?,
                })
            })
            .collect()
    }

    /// Swap in a fresh image-available semaphore
    ///
    /// A stale acquire may leave the old one with a pending signal; it is
    /// destroyed after an idle wait.
    pub(crate) fn recreate_image_available(&mut self, device: &ash::Device) -> Result<()> {
        unsafe {
            device
                .device_wait_idle()
                .map_err(|e| engine_err!("car::vulkan", "Failed to wait idle: {:?}", e))?;
            device.destroy_semaphore(self.image_available, None);
        }
        self.image_available = create_semaphore(device)?;
        Ok(())
    }

    pub(crate) fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.image_available, None);
            device.destroy_fence(self.in_flight, None);
        }
        self.descriptors.destroy(device);
    }
}

fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    unsafe { device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None) }
        .map_err(|e| engine_err!("car::vulkan", "Failed to create semaphore: {:?}", e))
}

fn create_fence(device: &ash::Device) -> Result<vk::Fence> {
    let info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
    unsafe { device.create_fence(&info, None) }
        .map_err(|e| engine_err!("car::vulkan", "Failed to create fence: {:?}", e))
}
