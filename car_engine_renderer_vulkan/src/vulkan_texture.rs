/// Vulkan 2D texture - sampled RGBA8 image with its own sampler

use ash::vk;
use car_engine::car::render::{ImageData, Texture2D, TextureFilter};
use car_engine::car::Result;
use car_engine::{engine_bail_warn, engine_err, engine_trace};
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::sync::Arc;

use crate::vulkan_buffer::GpuBuffer;
use crate::vulkan_context::{GpuContext, Retired};
use crate::vulkan_format::{address_mode_to_vk, filter_to_vk};

/// Texel format of every texture; sampling returns linear values
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

const COLOR_RANGE: vk::ImageSubresourceRange = vk::ImageSubresourceRange {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    base_mip_level: 0,
    level_count: 1,
    base_array_layer: 0,
    layer_count: 1,
};

/// Image, view and memory; retired as a unit
struct TextureImage {
    gpu: Arc<GpuContext>,
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
    width: u32,
    height: u32,
}

impl TextureImage {
    fn new(gpu: &Arc<GpuContext>, width: u32, height: u32) -> Result<Self> {
        let info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(TEXTURE_FORMAT)
            .extent(vk::Extent3D { width, height, depth: 1 })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let (image, allocation) = gpu.create_image("texture", &info)?;

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(TEXTURE_FORMAT)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(COLOR_RANGE);

        let view = match unsafe { gpu.device.create_image_view(&view_info, None) } {
            Ok(view) => view,
            Err(e) => {
                gpu.destroy_now(Retired::Image { image, view: vk::ImageView::null(), allocation });
                return Err(engine_err!("car::vulkan", "Failed to create texture image view: {:?}", e));
            }
        };

        Ok(Self {
            gpu: Arc::clone(gpu),
            image,
            view,
            allocation: Some(allocation),
            width,
            height,
        })
    }

    /// Copy `pixels` into the whole image and leave it shader-readable
    fn upload(&self, pixels: &[u8]) -> Result<()> {
        let staging = GpuBuffer::staging(&self.gpu, pixels.len(), MemoryLocation::CpuToGpu)?;
        staging.write(0, pixels)?;

        let device = &self.gpu.device;
        let image = self.image;
        let (width, height) = (self.width, self.height);
        self.gpu.one_shot(|cmd| unsafe {
            let to_transfer = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(COLOR_RANGE)
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE);
            device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_transfer],
            );

            let region = vk::BufferImageCopy::default()
                .buffer_offset(0)
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                .image_extent(vk::Extent3D { width, height, depth: 1 });
            device.cmd_copy_buffer_to_image(
                cmd,
                staging.buffer,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );

            let to_shader = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(COLOR_RANGE)
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::SHADER_READ);
            device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_shader],
            );
        })
    }
}

impl Drop for TextureImage {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            self.gpu.retire(Retired::Image {
                image: self.image,
                view: self.view,
                allocation,
            });
        }
    }
}

/// Sampled texture; image and sampler can each be replaced after creation
pub struct VulkanTexture2D {
    gpu: Arc<GpuContext>,
    image: RefCell<TextureImage>,
    sampler: Cell<vk::Sampler>,
    min_filter: Cell<TextureFilter>,
    mag_filter: Cell<TextureFilter>,
    repeat_x: Cell<bool>,
    repeat_y: Cell<bool>,
}

impl VulkanTexture2D {
    pub(crate) fn new(gpu: &Arc<GpuContext>, data: &ImageData) -> Result<Self> {
        validate_image(data)?;
        let image = TextureImage::new(gpu, data.width, data.height)?;
        image.upload(&data.pixels)?;

        let sampler = create_sampler(gpu, TextureFilter::Linear, TextureFilter::Linear, false, false)?;
        engine_trace!("car::vulkan", "Created {}x{} texture", data.width, data.height);

        Ok(Self {
            gpu: Arc::clone(gpu),
            image: RefCell::new(image),
            sampler: Cell::new(sampler),
            min_filter: Cell::new(TextureFilter::Linear),
            mag_filter: Cell::new(TextureFilter::Linear),
            repeat_x: Cell::new(false),
            repeat_y: Cell::new(false),
        })
    }

    pub(crate) fn descriptor_info(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo::default()
            .sampler(self.sampler.get())
            .image_view(self.image.borrow().view)
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
    }

    fn rebuild_sampler(&self) -> Result<()> {
        let sampler = create_sampler(
            &self.gpu,
            self.min_filter.get(),
            self.mag_filter.get(),
            self.repeat_x.get(),
            self.repeat_y.get(),
        )?;
        let old = self.sampler.replace(sampler);
        self.gpu.retire(Retired::Sampler(old));
        Ok(())
    }
}

fn validate_image(data: &ImageData) -> Result<()> {
    if data.width == 0 || data.height == 0 {
        engine_bail_warn!("car::vulkan", "Texture size {}x{} is empty", data.width, data.height);
    }
    let expected = data.width as usize * data.height as usize * 4;
    if data.pixels.len() != expected {
        engine_bail_warn!(
            "car::vulkan",
            "Texture {}x{} needs {} RGBA bytes, got {}",
            data.width,
            data.height,
            expected,
            data.pixels.len()
        );
    }
    Ok(())
}

fn create_sampler(
    gpu: &GpuContext,
    min: TextureFilter,
    mag: TextureFilter,
    repeat_x: bool,
    repeat_y: bool,
) -> Result<vk::Sampler> {
    let info = vk::SamplerCreateInfo::default()
        .min_filter(filter_to_vk(min))
        .mag_filter(filter_to_vk(mag))
        .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
        .address_mode_u(address_mode_to_vk(repeat_x))
        .address_mode_v(address_mode_to_vk(repeat_y))
        .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
        .anisotropy_enable(false)
        .max_anisotropy(1.0)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .min_lod(0.0)
        .max_lod(0.0);

    unsafe {
        gpu.device
            .create_sampler(&info, None)
            .map_err(|e| engine_err!("car::vulkan", "Failed to create sampler: {:?}", e))
    }
}

impl Texture2D for VulkanTexture2D {
    fn width(&self) -> u32 {
        self.image.borrow().width
    }

    fn height(&self) -> u32 {
        self.image.borrow().height
    }

    fn update_data(&self, data: &ImageData) -> Result<()> {
        validate_image(data)?;
        let same_size = {
            let image = self.image.borrow();
            image.width == data.width && image.height == data.height
        };
        if same_size {
            return self.image.borrow().upload(&data.pixels);
        }
        let image = TextureImage::new(&self.gpu, data.width, data.height)?;
        image.upload(&data.pixels)?;
        *self.image.borrow_mut() = image;
        Ok(())
    }

    fn set_filters(&self, min: TextureFilter, mag: TextureFilter) -> Result<()> {
        self.min_filter.set(min);
        self.mag_filter.set(mag);
        self.rebuild_sampler()
    }

    fn set_repeat_x(&self, repeat: bool) -> Result<()> {
        self.repeat_x.set(repeat);
        self.rebuild_sampler()
    }

    fn set_repeat_y(&self, repeat: bool) -> Result<()> {
        self.repeat_y.set(repeat);
        self.rebuild_sampler()
    }

    fn bind(&self, slot: u32) {
        engine_trace!(
            "car::vulkan",
            "Texture bind({}) ignored: Vulkan samples textures through shader descriptor sets",
            slot
        );
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanTexture2D {
    fn drop(&mut self) {
        self.gpu.retire(Retired::Sampler(self.sampler.get()));
    }
}
