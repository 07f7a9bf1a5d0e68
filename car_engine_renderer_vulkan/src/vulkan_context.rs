/// GpuContext - device state shared by every Vulkan resource
///
/// Holds the logical device, the allocator, the queues and the one-shot
/// transfer pool. Buffers, textures, shaders and the swapchain all keep an
/// `Arc<GpuContext>`, so the device outlives every object created from it.
///
/// Native handles released while frames may still be in flight are not
/// destroyed immediately: they are queued on the current frame slot and
/// destroyed once that slot's fence has signaled again.

use ash::vk;
use car_engine::car::{Error, Result};
use car_engine::{engine_err, engine_error, engine_trace};
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::MemoryLocation;
use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A native object waiting for the GPU to finish with it
pub(crate) enum Retired {
    Buffer { buffer: vk::Buffer, allocation: Allocation },
    Image { image: vk::Image, view: vk::ImageView, allocation: Allocation },
    Sampler(vk::Sampler),
}

/// Shared device state
pub struct GpuContext {
    pub device: ash::Device,

    /// Dropped by hand before the device is destroyed
    pub(crate) allocator: ManuallyDrop<Mutex<Allocator>>,

    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,

    /// Transfers run on a queue of the graphics family, so uploaded images
    /// need no queue family ownership transfer
    pub transfer_queue: vk::Queue,

    /// TRANSIENT | RESET_COMMAND_BUFFER pool for one-shot uploads
    pub(crate) upload_command_pool: Mutex<vk::CommandPool>,

    /// Single color render pass every pipeline is built against
    pub render_pass: vk::RenderPass,

    frames_in_flight: usize,
    frame_index: AtomicUsize,
    retired: Mutex<Vec<Vec<Retired>>>,

    instance: ash::Instance,
    _entry: ash::Entry,

    pub(crate) debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
    pub(crate) debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

/// Everything [`GpuContext::new`] takes ownership of
pub(crate) struct GpuContextDesc {
    pub entry: ash::Entry,
    pub instance: ash::Instance,
    pub device: ash::Device,
    pub allocator: Allocator,
    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,
    pub transfer_queue: vk::Queue,
    pub upload_command_pool: vk::CommandPool,
    pub render_pass: vk::RenderPass,
    pub frames_in_flight: usize,
    pub debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
    pub debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl GpuContext {
    pub(crate) fn new(desc: GpuContextDesc) -> Self {
        let frames_in_flight = desc.frames_in_flight.max(1);
        Self {
            device: desc.device,
            allocator: ManuallyDrop::new(Mutex::new(desc.allocator)),
            graphics_queue: desc.graphics_queue,
            graphics_queue_family: desc.graphics_queue_family,
            transfer_queue: desc.transfer_queue,
            upload_command_pool: Mutex::new(desc.upload_command_pool),
            render_pass: desc.render_pass,
            frames_in_flight,
            frame_index: AtomicUsize::new(0),
            retired: Mutex::new((0..frames_in_flight).map(|_| Vec::new()).collect()),
            instance: desc.instance,
            _entry: desc.entry,
            debug_utils_loader: desc.debug_utils_loader,
            debug_messenger: desc.debug_messenger,
        }
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Frame slot currently being recorded, in `0..frames_in_flight`
    pub fn frame_index(&self) -> usize {
        self.frame_index.load(Ordering::Relaxed)
    }

    pub(crate) fn set_frame_index(&self, index: usize) {
        self.frame_index.store(index % self.frames_in_flight, Ordering::Relaxed);
    }

    // ===== MEMORY =====

    /// Create a buffer and bind freshly allocated memory to it
    pub(crate) fn create_buffer(
        &self,
        name: &str,
        size: u64,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
    ) -> Result<(vk::Buffer, Allocation)> {
        unsafe {
            let buffer_info = vk::BufferCreateInfo::default()
                .size(size.max(1))
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = self
                .device
                .create_buffer(&buffer_info, None)
                .map_err(|e| engine_err!("car::vulkan", "Failed to create buffer '{}': {:?}", name, e))?;

            let requirements = self.device.get_buffer_memory_requirements(buffer);

            let allocation = {
                let mut allocator = self.lock_allocator()?;
                allocator.allocate(&AllocationCreateDesc {
                    name,
                    requirements,
                    location,
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
            };
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.device.destroy_buffer(buffer, None);
                    engine_error!(
                        "car::vulkan",
                        "Out of GPU memory allocating buffer '{}' ({:.2} MB): {:?}",
                        name,
                        requirements.size as f64 / (1024.0 * 1024.0),
                        e
                    );
                    return Err(Error::OutOfMemory);
                }
            };

            if let Err(e) = self
                .device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
            {
                self.free_allocation(allocation);
                self.device.destroy_buffer(buffer, None);
                return Err(engine_err!("car::vulkan", "Failed to bind buffer memory '{}': {:?}", name, e));
            }

            Ok((buffer, allocation))
        }
    }

    /// Create an image and bind freshly allocated device-local memory to it
    pub(crate) fn create_image(
        &self,
        name: &str,
        info: &vk::ImageCreateInfo,
    ) -> Result<(vk::Image, Allocation)> {
        unsafe {
            let image = self
                .device
                .create_image(info, None)
                .map_err(|e| engine_err!("car::vulkan", "Failed to create image '{}': {:?}", name, e))?;

            let requirements = self.device.get_image_memory_requirements(image);

            let allocation = {
                let mut allocator = self.lock_allocator()?;
                allocator.allocate(&AllocationCreateDesc {
                    name,
                    requirements,
                    location: MemoryLocation::GpuOnly,
                    linear: false,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
            };
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.device.destroy_image(image, None);
                    engine_error!(
                        "car::vulkan",
                        "Out of GPU memory allocating image '{}' ({:.2} MB): {:?}",
                        name,
                        requirements.size as f64 / (1024.0 * 1024.0),
                        e
                    );
                    return Err(Error::OutOfMemory);
                }
            };

            if let Err(e) = self
                .device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
            {
                self.free_allocation(allocation);
                self.device.destroy_image(image, None);
                return Err(engine_err!("car::vulkan", "Failed to bind image memory '{}': {:?}", name, e));
            }

            Ok((image, allocation))
        }
    }

    fn lock_allocator(&self) -> Result<std::sync::MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| engine_err!("car::vulkan", "GPU allocator mutex poisoned"))
    }

    fn free_allocation(&self, allocation: Allocation) {
        match self.allocator.lock() {
            Ok(mut allocator) => {
                if let Err(e) = allocator.free(allocation) {
                    engine_error!("car::vulkan", "Failed to free GPU allocation: {:?}", e);
                }
            }
            Err(_) => engine_error!("car::vulkan", "GPU allocator mutex poisoned while freeing"),
        }
    }

    // ===== DEFERRED DESTRUCTION =====

    /// Queue `item` for destruction once the current frame slot comes around again
    pub(crate) fn retire(&self, item: Retired) {
        match self.retired.lock() {
            Ok(mut slots) => {
                let slot = self.frame_index();
                slots[slot].push(item);
            }
            Err(_) => {
                // Nobody can drain the queue any more; destroy after an idle wait
                unsafe {
                    let _ = self.device.device_wait_idle();
                }
                self.destroy_now(item);
            }
        }
    }

    /// Destroy everything retired on `slot`; its fence must have signaled
    pub(crate) fn collect_retired(&self, slot: usize) {
        let items = match self.retired.lock() {
            Ok(mut slots) => match slots.get_mut(slot) {
                Some(items) => std::mem::take(items),
                None => return,
            },
            Err(_) => return,
        };
        if !items.is_empty() {
            engine_trace!("car::vulkan", "Destroying {} retired object(s) of frame slot {}", items.len(), slot);
        }
        for item in items {
            self.destroy_now(item);
        }
    }

    pub(crate) fn destroy_now(&self, item: Retired) {
        unsafe {
            match item {
                Retired::Buffer { buffer, allocation } => {
                    self.free_allocation(allocation);
                    self.device.destroy_buffer(buffer, None);
                }
                Retired::Image { image, view, allocation } => {
                    self.device.destroy_image_view(view, None);
                    self.free_allocation(allocation);
                    self.device.destroy_image(image, None);
                }
                Retired::Sampler(sampler) => {
                    self.device.destroy_sampler(sampler, None);
                }
            }
        }
    }

    // ===== ONE-SHOT TRANSFERS =====

    /// Record commands into a temporary command buffer, submit them on the
    /// transfer queue and wait for completion
    pub(crate) fn one_shot<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer),
    {
        let pool = self
            .upload_command_pool
            .lock()
            .map_err(|_| engine_err!("car::vulkan", "Upload command pool mutex poisoned"))?;

        unsafe {
            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(*pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffer = self
                .device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| engine_err!("car::vulkan", "Failed to allocate upload command buffer: {:?}", e))?[0];

            let result = self.submit_one_shot(command_buffer, record);
            self.device.free_command_buffers(*pool, &[command_buffer]);
            result
        }
    }

    unsafe fn submit_one_shot<F>(&self, command_buffer: vk::CommandBuffer, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer),
    {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        self.device
            .begin_command_buffer(command_buffer, &begin_info)
            .map_err(|e| engine_err!("car::vulkan", "Failed to begin upload command buffer: {:?}", e))?;

        record(command_buffer);

        self.device
            .end_command_buffer(command_buffer)
            .map_err(|e| engine_err!("car::vulkan", "Failed to end upload command buffer: {:?}", e))?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        self.device
            .queue_submit(self.transfer_queue, &[submit_info], vk::Fence::null())
            .map_err(|e| engine_err!("car::vulkan", "Failed to submit upload commands: {:?}", e))?;
        self.device
            .queue_wait_idle(self.transfer_queue)
            .map_err(|e| engine_err!("car::vulkan", "Failed to wait for upload: {:?}", e))?;
        Ok(())
    }

    /// Copy `size` bytes between two buffers on the device
    pub(crate) fn copy_buffer(&self, src: vk::Buffer, dst: vk::Buffer, src_offset: u64, dst_offset: u64, size: u64) -> Result<()> {
        if size == 0 {
            return Ok(());
        }
        self.one_shot(|cmd| unsafe {
            let region = vk::BufferCopy::default()
                .src_offset(src_offset)
                .dst_offset(dst_offset)
                .size(size);
            self.device.cmd_copy_buffer(cmd, src, dst, &[region]);
        })
    }

    /// Write bytes into host-visible memory
    pub(crate) fn write_mapped(allocation: &Allocation, offset: usize, data: &[u8]) -> Result<()> {
        let ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| engine_err!("car::vulkan", "Buffer memory is not host visible"))?;
        if offset + data.len() > allocation.size() as usize {
            return Err(engine_err!(
                "car::vulkan",
                "Mapped write of {} bytes at {} overflows {} byte allocation",
                data.len(),
                offset,
                allocation.size()
            ));
        }
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                (ptr.as_ptr() as *mut u8).add(offset),
                data.len(),
            );
        }
        Ok(())
    }

    /// Read bytes back from host-visible memory
    pub(crate) fn read_mapped(allocation: &Allocation, size: usize) -> Result<Vec<u8>> {
        let ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| engine_err!("car::vulkan", "Buffer memory is not host visible"))?;
        let size = size.min(allocation.size() as usize);
        let mut bytes = vec![0u8; size];
        unsafe {
            std::ptr::copy_nonoverlapping(ptr.as_ptr() as *const u8, bytes.as_mut_ptr(), size);
        }
        Ok(bytes)
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            let pending: Vec<Retired> = match self.retired.get_mut() {
                Ok(slots) => slots.iter_mut().flat_map(std::mem::take).collect(),
                Err(_) => Vec::new(),
            };
            for item in pending {
                self.destroy_now(item);
            }

            if let Ok(pool) = self.upload_command_pool.get_mut() {
                self.device.destroy_command_pool(*pool, None);
            }
            self.device.destroy_render_pass(self.render_pass, None);

            // Allocator first: it frees its device memory blocks
            ManuallyDrop::drop(&mut self.allocator);

            if let (Some(loader), Some(messenger)) = (&self.debug_utils_loader, self.debug_messenger) {
                crate::debug::cleanup_debug_config();
                loader.destroy_debug_utils_messenger(messenger, None);
            }

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
