/// Swapchain - presentable images, their views and framebuffers
///
/// Owns everything derived from the surface size: the swapchain itself, one
/// image view and one framebuffer per image, and one render-finished
/// semaphore per image. The surface, the render pass and the per-frame sync
/// objects belong to the graphics context and survive a rebuild.

use ash::vk;
use car_engine::car::{Error, Result};
use car_engine::{engine_err, engine_error, engine_info};
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_device::QueueFamilies;

// ============================================================================
// Surface choices
// ============================================================================

/// BGRA8 sRGB with the sRGB nonlinear color space when offered, else the first format
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    let preferred = vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_SRGB,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };
    // A lone UNDEFINED entry means the surface has no preference
    if formats.len() == 1 && formats[0].format == vk::Format::UNDEFINED {
        return Some(preferred);
    }
    formats
        .iter()
        .find(|f| f.format == preferred.format && f.color_space == preferred.color_space)
        .or_else(|| formats.first())
        .copied()
}

/// FIFO when vsync is on; otherwise MAILBOX if offered, else FIFO (always supported)
pub fn choose_present_mode(modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if !vsync && modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Surface extent, or the framebuffer size clamped to the surface limits
/// when the surface leaves the choice to us
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, framebuffer: (u32, u32)) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: framebuffer.0.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: framebuffer.1.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One image more than the minimum, capped by the maximum (0 = no maximum)
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

/// Image sharing for the swapchain images
///
/// Rendering happens on the graphics family and presentation on the
/// present family. When those differ the images are shared concurrently
/// between both, so no ownership transfer is needed.
pub fn image_sharing(families: &QueueFamilies) -> (vk::SharingMode, Vec<u32>) {
    if families.graphics == families.present {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (vk::SharingMode::CONCURRENT, vec![families.graphics, families.present])
    }
}

/// Outcome of an acquire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Acquire {
    Image(u32),
    /// Out of date or suboptimal: rebuild and try again
    Stale,
}

// ============================================================================
// Swapchain
// ============================================================================

pub struct Swapchain {
    gpu: Arc<GpuContext>,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    loader: ash::khr::swapchain::Device,
    present_queue: vk::Queue,
    sharing_mode: vk::SharingMode,
    queue_family_indices: Vec<u32>,

    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    framebuffers: Vec<vk::Framebuffer>,
    render_finished: Vec<vk::Semaphore>,

    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    vsync: bool,
}

impl Swapchain {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        gpu: Arc<GpuContext>,
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: ash::khr::surface::Instance,
        present_queue: vk::Queue,
        families: &QueueFamilies,
        format: vk::SurfaceFormatKHR,
        framebuffer: (u32, u32),
        vsync: bool,
    ) -> Result<Self> {
        let loader = ash::khr::swapchain::Device::new(instance, &gpu.device);
        let (sharing_mode, queue_family_indices) = image_sharing(families);
        let mut swapchain = Self {
            gpu,
            physical_device,
            surface,
            surface_loader,
            loader,
            present_queue,
            sharing_mode,
            queue_family_indices,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            image_views: Vec::new(),
            framebuffers: Vec::new(),
            render_finished: Vec::new(),
            format,
            extent: vk::Extent2D { width: 0, height: 0 },
            vsync,
        };
        swapchain.build(framebuffer).map_err(|e| match e {
            Error::BackendError(message) => Error::InitializationFailed(message),
            other => other,
        })?;
        Ok(swapchain)
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn format(&self) -> vk::Format {
        self.format.format
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub(crate) fn framebuffer(&self, image_index: u32) -> vk::Framebuffer {
        self.framebuffers[image_index as usize]
    }

    pub(crate) fn render_finished(&self, image_index: u32) -> vk::Semaphore {
        self.render_finished[image_index as usize]
    }

    /// Ask for the next image, signaling `semaphore` when it is ready
    pub(crate) fn acquire(&self, semaphore: vk::Semaphore) -> Result<Acquire> {
        unsafe {
            match self
                .loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
            {
                Ok((index, false)) => Ok(Acquire::Image(index)),
                Ok((_, true)) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquire::Stale),
                Err(e) => Err(engine_err!("car::vulkan", "Failed to acquire swapchain image: {:?}", e)),
            }
        }
    }

    /// Present `image_index` once its render-finished semaphore signals
    ///
    /// Out-of-date and suboptimal results are not errors; the next acquire
    /// sees the same condition and rebuilds.
    pub(crate) fn present(&self, image_index: u32) -> Result<()> {
        unsafe {
            let swapchains = [self.swapchain];
            let image_indices = [image_index];
            let wait_semaphores = [self.render_finished(image_index)];

            let present_info = vk::PresentInfoKHR::default()
                .wait_semaphores(&wait_semaphores)
                .swapchains(&swapchains)
                .image_indices(&image_indices);

            match self.loader.queue_present(self.present_queue, &present_info) {
                Ok(_) | Err(vk::Result::SUBOPTIMAL_KHR) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(()),
                Err(e) => Err(engine_err!("car::vulkan", "Failed to present swapchain image: {:?}", e)),
            }
        }
    }

    /// Tear down and rebuild every size-dependent object
    pub(crate) fn recreate(&mut self, framebuffer: (u32, u32)) -> Result<()> {
        unsafe {
            self.gpu
                .device
                .device_wait_idle()
                .map_err(|e| engine_err!("car::vulkan", "Failed to wait idle before swapchain recreate: {:?}", e))?;
        }
        self.destroy_views();
        self.build(framebuffer)?;
        engine_info!(
            "car::vulkan",
            "Swapchain recreated at {}x{} ({} images)",
            self.extent.width,
            self.extent.height,
            self.images.len()
        );
        Ok(())
    }

    fn build(&mut self, framebuffer: (u32, u32)) -> Result<()> {
        let device = &self.gpu.device;
        unsafe {
            let capabilities = self
                .surface_loader
                .get_physical_device_surface_capabilities(self.physical_device, self.surface)
                .map_err(|e| engine_err!("car::vulkan", "Failed to get surface capabilities: {:?}", e))?;
            let present_modes = self
                .surface_loader
                .get_physical_device_surface_present_modes(self.physical_device, self.surface)
                .map_err(|e| engine_err!("car::vulkan", "Failed to get present modes: {:?}", e))?;

            let extent = choose_extent(&capabilities, framebuffer);
            let present_mode = choose_present_mode(&present_modes, self.vsync);
            let old_swapchain = self.swapchain;

            let create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(self.surface)
                .min_image_count(choose_image_count(&capabilities))
                .image_format(self.format.format)
                .image_color_space(self.format.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
                .image_sharing_mode(self.sharing_mode)
                .queue_family_indices(&self.queue_family_indices)
                .pre_transform(capabilities.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(present_mode)
                .clipped(true)
                .old_swapchain(old_swapchain);

            let swapchain = self.loader.create_swapchain(&create_info, None).map_err(|e| {
                engine_error!("car::vulkan", "Failed to create swapchain: {:?}", e);
                Error::BackendError(format!("Failed to create swapchain: {:?}", e))
            })?;
            if old_swapchain != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(old_swapchain, None);
            }
            self.swapchain = swapchain;
            self.extent = extent;

            self.images = self
                .loader
                .get_swapchain_images(swapchain)
                .map_err(|e| engine_err!("car::vulkan", "Failed to get swapchain images: {:?}", e))?;

            for &image in &self.images {
                let create_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(self.format.format)
                    .components(vk::ComponentMapping {
                        r: vk::ComponentSwizzle::IDENTITY,
                        g: vk::ComponentSwizzle::IDENTITY,
                        b: vk::ComponentSwizzle::IDENTITY,
                        a: vk::ComponentSwizzle::IDENTITY,
                    })
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });
                let view = device
                    .create_image_view(&create_info, None)
                    .map_err(|e| engine_err!("car::vulkan", "Failed to create swapchain image view: {:?}", e))?;
                self.image_views.push(view);

                let attachments = [view];
                let framebuffer_info = vk::FramebufferCreateInfo::default()
                    .render_pass(self.gpu.render_pass)
                    .attachments(&attachments)
                    .width(extent.width)
                    .height(extent.height)
                    .layers(1);
                let framebuffer = device
                    .create_framebuffer(&framebuffer_info, None)
                    .map_err(|e| engine_err!("car::vulkan", "Failed to create framebuffer: {:?}", e))?;
                self.framebuffers.push(framebuffer);

                let semaphore = device
                    .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
                    .map_err(|e| engine_err!("car::vulkan", "Failed to create render-finished semaphore: {:?}", e))?;
                self.render_finished.push(semaphore);
            }
        }
        Ok(())
    }

    fn destroy_views(&mut self) {
        let device = &self.gpu.device;
        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                device.destroy_framebuffer(framebuffer, None);
            }
            for view in self.image_views.drain(..) {
                device.destroy_image_view(view, None);
            }
            for semaphore in self.render_finished.drain(..) {
                device.destroy_semaphore(semaphore, None);
            }
        }
        self.images.clear();
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.gpu.device.device_wait_idle().ok();
        }
        self.destroy_views();
        unsafe {
            if self.swapchain != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(self.swapchain, None);
            }
        }
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
