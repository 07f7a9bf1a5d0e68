/// VulkanContext - device, swapchain and frame-in-flight owner
///
/// One context per window. It creates every resource, records each frame
/// into the command buffer of the current frame slot and presents it.
///
/// Frame lifecycle:
///
/// ```text
/// begin_frame   wait slot fence -> free retired handles -> acquire image
///               -> reset fence + descriptor pools -> begin render pass
/// end_frame     end render pass + command buffer
/// swap_buffers  submit (wait image-available, signal render-finished)
///               -> present -> advance slot
/// ```

use ash::vk;
use car_engine::car::render::{
    Backend, BufferLayout, BufferType, BufferUsage, Color, ContextConfig, GraphicsContext, ImageData,
    IndexBuffer, IndexData, NativeWindow, RendererApi, Shader, ShaderDesc, ShaderSource, Ssbo,
    Texture2D, UniformBuffer, VertexArray, VertexBuffer,
};
use car_engine::car::{Error, Result};
use car_engine::car::ResourcePaths;
use car_engine::{engine_bail, engine_bail_warn, engine_debug, engine_err, engine_error, engine_info, engine_trace, engine_warn};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use std::cell::{Cell, Ref, RefCell};
use std::mem::ManuallyDrop;
use std::rc::Rc;
use std::sync::Arc;

use crate::vulkan_buffer::{VulkanIndexBuffer, VulkanVertexBuffer};
use crate::vulkan_context::{GpuContext, GpuContextDesc};
use crate::vulkan_device::bootstrap;
use crate::vulkan_frame::FrameSync;
use crate::vulkan_renderer_api::VulkanRendererApi;
use crate::vulkan_shader::{load_stage, VulkanShader};
use crate::vulkan_swapchain::{choose_surface_format, Acquire, Swapchain};
use crate::vulkan_texture::VulkanTexture2D;
use crate::vulkan_uniform_buffer::{VulkanSsbo, VulkanUniformBuffer};
use crate::vulkan_vertex_array::VulkanVertexArray;

/// Rebuild-and-retry attempts for a stale swapchain before giving up
pub const MAX_ACQUIRE_ATTEMPTS: u32 = 3;

/// Where the current frame slot is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramePhase {
    Idle,
    Recording(u32),
    Recorded(u32),
}

pub struct VulkanContext {
    gpu: Arc<GpuContext>,
    surface_loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    swapchain: RefCell<ManuallyDrop<Swapchain>>,
    command_pool: vk::CommandPool,
    frames: RefCell<Vec<FrameSync>>,

    /// Frame slot in use, `frames presented % frames in flight`
    frame: Cell<usize>,
    phase: Cell<FramePhase>,
    framebuffer_size: Cell<(u32, u32)>,
    /// Size changed while a frame was open; rebuilt at the next begin
    swapchain_dirty: Cell<bool>,

    config: ContextConfig,
}

impl VulkanContext {
    /// Bring up Vulkan for `window`
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` when no suitable GPU exists, when
    /// validation is requested but the layer is missing, or when any
    /// creation call fails.
    pub fn new<W: NativeWindow + ?Sized>(window: &W, config: ContextConfig) -> Result<Self> {
        let boot = bootstrap(window, &config)?;
        let framebuffer_size = window.framebuffer_size();

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: boot.instance.clone(),
            device: boot.device.clone(),
            physical_device: boot.physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| init_err(format!("Failed to create GPU allocator: {:?}", e)))?;

        let surface_format = unsafe {
            boot.surface_loader
                .get_physical_device_surface_formats(boot.physical_device, boot.surface)
                .map_err(|e| init_err(format!("Failed to get surface formats: {:?}", e)))?
        };
        let surface_format = choose_surface_format(&surface_format)
            .ok_or_else(|| init_err("Surface reports no formats".to_string()))?;

        let render_pass = create_render_pass(&boot.device, surface_format.format)?;

        let upload_pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(boot.families.transfer)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let upload_command_pool = unsafe { boot.device.create_command_pool(&upload_pool_info, None) }
            .map_err(|e| init_err(format!("Failed to create upload command pool: {:?}", e)))?;

        let transfer_queue = unsafe { boot.device.get_device_queue(boot.families.transfer, 0) };

        // From here on GpuContext's Drop releases the device
        let gpu = Arc::new(GpuContext::new(GpuContextDesc {
            entry: boot.entry,
            instance: boot.instance.clone(),
            device: boot.device,
            allocator,
            graphics_queue: boot.graphics_queue,
            graphics_queue_family: boot.families.graphics,
            transfer_queue,
            upload_command_pool,
            render_pass,
            frames_in_flight: config.max_frames_in_flight,
            debug_utils_loader: boot.debug_utils_loader,
            debug_messenger: boot.debug_messenger,
        }));

        let swapchain = Swapchain::new(
            Arc::clone(&gpu),
            &boot.instance,
            boot.physical_device,
            boot.surface,
            boot.surface_loader.clone(),
            boot.present_queue,
            &boot.families,
            surface_format,
            framebuffer_size,
            config.vsync,
        )?;

        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(boot.families.graphics)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = unsafe { gpu.device.create_command_pool(&pool_info, None) }
            .map_err(|e| init_err(format!("Failed to create command pool: {:?}", e)))?;

        let frames = FrameSync::create_all(&gpu.device, command_pool, gpu.frames_in_flight())?;

        engine_info!(
            "car::vulkan",
            "Vulkan context ready: {}x{} {:?}, {} swapchain images, {} frames in flight",
            swapchain.extent().width,
            swapchain.extent().height,
            swapchain.format(),
            swapchain.image_count(),
            frames.len()
        );

        Ok(Self {
            gpu,
            surface_loader: boot.surface_loader,
            surface: boot.surface,
            swapchain: RefCell::new(ManuallyDrop::new(swapchain)),
            command_pool,
            frames: RefCell::new(frames),
            frame: Cell::new(0),
            phase: Cell::new(FramePhase::Idle),
            framebuffer_size: Cell::new(framebuffer_size),
            swapchain_dirty: Cell::new(false),
            config,
        })
    }

    pub(crate) fn gpu(&self) -> &Arc<GpuContext> {
        &self.gpu
    }

    pub fn swapchain_extent(&self) -> vk::Extent2D {
        self.swapchain.borrow().extent()
    }

    pub(crate) fn frames(&self) -> Ref<'_, Vec<FrameSync>> {
        self.frames.borrow()
    }

    /// Command buffer and slot of the frame being recorded
    pub(crate) fn recording(&self) -> Option<(vk::CommandBuffer, usize)> {
        match self.phase.get() {
            FramePhase::Recording(_) => {
                let slot = self.frame.get();
                Some((self.frames.borrow()[slot].command_buffer, slot))
            }
            _ => None,
        }
    }

    // ===== FRAME LIFECYCLE =====

    /// Start recording the next frame
    ///
    /// Returns `Ok(false)` without touching the GPU while the framebuffer
    /// has zero area (minimized window).
    pub(crate) fn begin_frame(&self, clear_color: Color) -> Result<bool> {
        if self.phase.get() != FramePhase::Idle {
            engine_bail_warn!("car::vulkan", "begin_frame called while a frame is open ({:?})", self.phase.get());
        }
        let framebuffer_size = self.framebuffer_size.get();
        if framebuffer_size.0 == 0 || framebuffer_size.1 == 0 {
            engine_trace!("car::vulkan", "Skipping frame: framebuffer is {}x{}", framebuffer_size.0, framebuffer_size.1);
            return Ok(false);
        }

        let device = &self.gpu.device;
        let slot = self.frame.get();
        let mut frames = self.frames.borrow_mut();
        let frame = &mut frames[slot];

        unsafe {
            device
                .wait_for_fences(&[frame.in_flight], true, u64::MAX)
                .map_err(|e| engine_err!("car::vulkan", "Failed to wait for frame fence: {:?}", e))?;
        }
        self.gpu.collect_retired(slot);

        if self.swapchain_dirty.replace(false) {
            self.swapchain.borrow_mut().recreate(framebuffer_size)?;
        }

        let image_index = self.acquire(frame)?;

        unsafe {
            device
                .reset_fences(&[frame.in_flight])
                .map_err(|e| engine_err!("car::vulkan", "Failed to reset frame fence: {:?}", e))?;
        }
        frame.descriptors.reset(device)?;

        let swapchain = self.swapchain.borrow();
        let extent = swapchain.extent();
        let cmd = frame.command_buffer;

        unsafe {
            device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .map_err(|e| engine_err!("car::vulkan", "Failed to reset command buffer: {:?}", e))?;

            let begin_info =
                vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device
                .begin_command_buffer(cmd, &begin_info)
                .map_err(|e| engine_err!("car::vulkan", "Failed to begin command buffer: {:?}", e))?;

            let clear_values = [vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [clear_color.r, clear_color.g, clear_color.b, clear_color.a],
                },
            }];
            let render_pass_begin = vk::RenderPassBeginInfo::default()
                .render_pass(self.gpu.render_pass)
                .framebuffer(swapchain.framebuffer(image_index))
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                })
                .clear_values(&clear_values);
            device.cmd_begin_render_pass(cmd, &render_pass_begin, vk::SubpassContents::INLINE);

            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            device.cmd_set_viewport(cmd, 0, &[viewport]);
            device.cmd_set_scissor(
                cmd,
                0,
                &[vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                }],
            );
        }

        self.phase.set(FramePhase::Recording(image_index));
        Ok(true)
    }

    /// Acquire an image, rebuilding a stale swapchain a bounded number of times
    fn acquire(&self, frame: &mut FrameSync) -> Result<u32> {
        let device = &self.gpu.device;
        for attempt in 1..=MAX_ACQUIRE_ATTEMPTS {
            let acquired = self.swapchain.borrow().acquire(frame.image_available)?;
            match acquired {
                Acquire::Image(index) => return Ok(index),
                Acquire::Stale => {
                    engine_debug!(
                        "car::vulkan",
                        "Swapchain stale at acquire (attempt {}/{}), rebuilding",
                        attempt,
                        MAX_ACQUIRE_ATTEMPTS
                    );
                    frame.recreate_image_available(device)?;
                    self.swapchain.borrow_mut().recreate(self.framebuffer_size.get())?;
                }
            }
        }
        engine_bail!(
            "car::vulkan",
            "Swapchain still stale after {} rebuilds",
            MAX_ACQUIRE_ATTEMPTS
        );
    }

    /// Close the render pass and the command buffer of the current frame
    pub(crate) fn end_frame(&self) -> Result<()> {
        let FramePhase::Recording(image_index) = self.phase.get() else {
            engine_bail_warn!("car::vulkan", "end_frame called with no frame recording ({:?})", self.phase.get());
        };
        let cmd = self.frames.borrow()[self.frame.get()].command_buffer;
        unsafe {
            self.gpu.device.cmd_end_render_pass(cmd);
            self.gpu
                .device
                .end_command_buffer(cmd)
                .map_err(|e| engine_err!("car::vulkan", "Failed to end command buffer: {:?}", e))?;
        }
        self.phase.set(FramePhase::Recorded(image_index));
        Ok(())
    }

    /// Leave the frame state clean after a failed recording
    pub(crate) fn abandon_frame(&self) {
        if let FramePhase::Recording(_) = self.phase.get() {
            if let Err(e) = self.end_frame() {
                engine_error!("car::vulkan", "Failed to close abandoned frame: {}", e);
            }
        }
    }
}

fn init_err(message: String) -> Error {
    engine_error!("car::vulkan", "{}", message);
    Error::InitializationFailed(message)
}

/// Single subpass, one color attachment cleared on load and presented
fn create_render_pass(device: &ash::Device, format: vk::Format) -> Result<vk::RenderPass> {
    let attachments = [vk::AttachmentDescription::default()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)];

    let color_attachment_refs = [vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];

    let subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_attachment_refs);

    let dependency = vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE);

    let render_pass_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(std::slice::from_ref(&subpass))
        .dependencies(std::slice::from_ref(&dependency));

    unsafe { device.create_render_pass(&render_pass_info, None) }
        .map_err(|e| init_err(format!("Failed to create render pass: {:?}", e)))
}

/// Cached stage for `name`: the `.crss` container if present, else raw SPIR-V
pub fn cached_stage(paths: &ResourcePaths, name: &str) -> Result<ShaderSource> {
    let crss = paths.compiled_shader(name);
    if crss.exists() {
        return Ok(ShaderSource::File(crss));
    }
    ResourcePaths::require(paths.shader_cache(name)).map(ShaderSource::File)
}

impl GraphicsContext for VulkanContext {
    fn backend(&self) -> Backend {
        Backend::Vulkan
    }

    fn create_vertex_buffer(
        &self,
        data: Option<&[u8]>,
        size: usize,
        usage: BufferUsage,
        layout: BufferLayout,
    ) -> Result<Rc<dyn VertexBuffer>> {
        Ok(Rc::new(VulkanVertexBuffer::new(&self.gpu, data, size, usage, layout)?))
    }

    fn create_index_buffer(
        &self,
        data: Option<IndexData<'_>>,
        count: u32,
        index_type: BufferType,
        usage: BufferUsage,
    ) -> Result<Rc<dyn IndexBuffer>> {
        Ok(Rc::new(VulkanIndexBuffer::new(&self.gpu, data, count, index_type, usage)?))
    }

    fn create_uniform_buffer(&self, size: usize, binding: u32, usage: BufferUsage) -> Result<Rc<dyn UniformBuffer>> {
        Ok(Rc::new(VulkanUniformBuffer::new(&self.gpu, size, binding, usage)?))
    }

    fn create_ssbo(&self, data: Option<&[u8]>, size: usize, usage: BufferUsage) -> Result<Rc<dyn Ssbo>> {
        Ok(Rc::new(VulkanSsbo::new(&self.gpu, data, size, usage)?))
    }

    fn create_texture(&self, image: &ImageData) -> Result<Rc<dyn Texture2D>> {
        Ok(Rc::new(VulkanTexture2D::new(&self.gpu, image)?))
    }

    fn create_shader(&self, desc: &ShaderDesc) -> Result<Rc<dyn Shader>> {
        let vertex = load_stage(&desc.vertex)?;
        let fragment = load_stage(&desc.fragment)?;
        Ok(Rc::new(VulkanShader::new(&self.gpu, &vertex, &fragment, desc.spec.clone())?))
    }

    fn create_vertex_array(
        &self,
        vertex_buffer: Rc<dyn VertexBuffer>,
        index_buffer: Rc<dyn IndexBuffer>,
        shader: Rc<dyn Shader>,
    ) -> Result<Rc<dyn VertexArray>> {
        Ok(Rc::new(VulkanVertexArray::new(vertex_buffer, index_buffer, shader)?))
    }

    fn create_renderer_api(self: Rc<Self>) -> Result<Box<dyn RendererApi>> {
        Ok(Box::new(VulkanRendererApi::new(self)))
    }

    fn renderer2d_shader(&self) -> Result<ShaderDesc> {
        let paths = &self.config.resources;
        Ok(ShaderDesc::new(
            cached_stage(paths, "renderer2d.vert")?,
            cached_stage(paths, "renderer2d.frag")?,
        ))
    }

    fn swap_buffers(&self) -> Result<()> {
        let image_index = match self.phase.get() {
            FramePhase::Recorded(index) => index,
            // Skipped frame: nothing to submit, the slot does not advance
            FramePhase::Idle => return Ok(()),
            FramePhase::Recording(_) => {
                engine_bail_warn!("car::vulkan", "swap_buffers called before end_recording");
            }
        };

        let slot = self.frame.get();
        {
            let frames = self.frames.borrow();
            let frame = &frames[slot];
            let swapchain = self.swapchain.borrow();

            let wait_semaphores = [frame.image_available];
            let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
            let command_buffers = [frame.command_buffer];
            let signal_semaphores = [swapchain.render_finished(image_index)];

            let submit_info = vk::SubmitInfo::default()
                .wait_semaphores(&wait_semaphores)
                .wait_dst_stage_mask(&wait_stages)
                .command_buffers(&command_buffers)
                .signal_semaphores(&signal_semaphores);

            // The slot goes idle even if the submit fails so the next frame can start
            self.phase.set(FramePhase::Idle);
            unsafe {
                self.gpu
                    .device
                    .queue_submit(self.gpu.graphics_queue, &[submit_info], frame.in_flight)
                    .map_err(|e| engine_err!("car::vulkan", "Failed to submit frame: {:?}", e))?;
            }
            swapchain.present(image_index)?;
        }

        let next = (slot + 1) % self.gpu.frames_in_flight();
        self.frame.set(next);
        self.gpu.set_frame_index(next);
        Ok(())
    }

    fn resize(&self, width: u32, height: u32) -> Result<()> {
        self.framebuffer_size.set((width, height));
        if width == 0 || height == 0 {
            engine_debug!("car::vulkan", "Framebuffer is {}x{}; frames are skipped until it grows", width, height);
            self.swapchain_dirty.set(true);
            return Ok(());
        }
        if self.phase.get() != FramePhase::Idle {
            self.swapchain_dirty.set(true);
            return Ok(());
        }
        self.swapchain_dirty.set(false);
        self.swapchain.borrow_mut().recreate((width, height))
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.framebuffer_size.get()
    }

    fn max_frames_in_flight(&self) -> usize {
        self.gpu.frames_in_flight()
    }

    fn current_frame_index(&self) -> usize {
        self.frame.get()
    }

    fn resource_paths(&self) -> &ResourcePaths {
        &self.config.resources
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        let device = &self.gpu.device;
        unsafe {
            device.device_wait_idle().ok();
            for frame in self.frames.get_mut().drain(..) {
                frame.destroy(device);
            }
            device.destroy_command_pool(self.command_pool, None);
            ManuallyDrop::drop(self.swapchain.get_mut());
            self.surface_loader.destroy_surface(self.surface, None);
        }
        if self.phase.get() != FramePhase::Idle {
            engine_warn!("car::vulkan", "Context dropped with a frame still open");
        }
    }
}
