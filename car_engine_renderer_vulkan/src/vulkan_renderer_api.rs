/// Vulkan implementation of the renderer command interface
///
/// Every command is recorded into the command buffer of the current frame
/// slot. Blending and depth state are baked into each shader's pipeline, so
/// the runtime toggles only log.

use ash::vk;
use car_engine::car::render::{
    ClipSpace, Color, PipelineSpec, RendererApi, Scissor, ShaderStages, VertexArray, Viewport,
};
use car_engine::car::Result;
use car_engine::{engine_debug, engine_info, engine_trace, engine_warn, engine_warn_err};
use std::cell::Cell;
use std::rc::Rc;

use crate::vulkan_format::index_type_to_vk;
use crate::vulkan_graphics_context::VulkanContext;
use crate::vulkan_vertex_array::VulkanVertexArray;

pub struct VulkanRendererApi {
    context: Rc<VulkanContext>,
    clear_color: Cell<Color>,
    /// Viewport set during the current frame; `None` means the full extent
    viewport: Cell<Option<Viewport>>,
}

impl VulkanRendererApi {
    pub(crate) fn new(context: Rc<VulkanContext>) -> Self {
        Self {
            context,
            clear_color: Cell::new(Color::BLACK),
            viewport: Cell::new(None),
        }
    }

    fn vulkan_vertex_array<'a>(&self, vertex_array: &'a Rc<dyn VertexArray>) -> Result<&'a VulkanVertexArray> {
        vertex_array
            .as_any()
            .downcast_ref::<VulkanVertexArray>()
            .ok_or_else(|| engine_warn_err!("car::vulkan", "Vertex array was not created by the Vulkan backend"))
    }

    fn command_buffer(&self, what: &str) -> Result<(vk::CommandBuffer, usize)> {
        self.context
            .recording()
            .ok_or_else(|| engine_warn_err!("car::vulkan", "{} issued with no frame recording", what))
    }
}

/// Dynamic viewport for a draw: the frame's viewport rectangle with the
/// depth range of the shader's pipeline spec
pub fn draw_viewport(viewport: Option<Viewport>, extent: vk::Extent2D, spec: &PipelineSpec) -> vk::Viewport {
    let (x, y, width, height) = match viewport {
        Some(v) => (v.x, v.y, v.width, v.height),
        None => (0.0, 0.0, extent.width as f32, extent.height as f32),
    };
    vk::Viewport {
        x,
        y,
        width,
        height,
        min_depth: spec.min_depth,
        max_depth: spec.max_depth,
    }
}

/// Scissor rectangle with negative offsets clipped to the framebuffer edge
pub fn scissor_rect(scissor: Scissor) -> vk::Rect2D {
    let clip = |origin: i32, size: u32| -> (i32, u32) {
        if origin < 0 {
            (0, size.saturating_sub(origin.unsigned_abs()))
        } else {
            (origin, size)
        }
    };
    let (x, width) = clip(scissor.x, scissor.width);
    let (y, height) = clip(scissor.y, scissor.height);
    vk::Rect2D {
        offset: vk::Offset2D { x, y },
        extent: vk::Extent2D { width, height },
    }
}

impl RendererApi for VulkanRendererApi {
    fn init(&self) -> Result<()> {
        let extent = self.context.swapchain_extent();
        engine_info!(
            "car::vulkan",
            "Vulkan renderer initialized ({}x{})",
            extent.width,
            extent.height
        );
        Ok(())
    }

    fn shutdown(&self) {
        self.context.abandon_frame();
        unsafe {
            self.context.gpu().device.device_wait_idle().ok();
        }
        engine_debug!("car::vulkan", "Vulkan renderer shut down");
    }

    fn begin_recording(&self) -> Result<bool> {
        self.viewport.set(None);
        self.context.begin_frame(self.clear_color.get())
    }

    fn end_recording(&self) -> Result<()> {
        self.context.end_frame()
    }

    fn set_clear_color(&self, color: Color) {
        self.clear_color.set(color);
    }

    fn clear(&self) {
        let Some((cmd, _)) = self.context.recording() else {
            engine_warn!("car::vulkan", "clear issued with no frame recording");
            return;
        };
        let color = self.clear_color.get();
        let extent = self.context.swapchain_extent();
        let attachments = [vk::ClearAttachment {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            color_attachment: 0,
            clear_value: vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [color.r, color.g, color.b, color.a],
                },
            },
        }];
        let rects = [vk::ClearRect {
            rect: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            },
            base_array_layer: 0,
            layer_count: 1,
        }];
        unsafe {
            self.context
                .gpu()
                .device
                .cmd_clear_attachments(cmd, &attachments, &rects);
        }
    }

    fn set_viewport(&self, viewport: Viewport) {
        self.viewport.set(Some(viewport));
        if let Some((cmd, _)) = self.context.recording() {
            let vk_viewport = vk::Viewport {
                x: viewport.x,
                y: viewport.y,
                width: viewport.width,
                height: viewport.height,
                min_depth: viewport.min_depth,
                max_depth: viewport.max_depth,
            };
            unsafe {
                self.context.gpu().device.cmd_set_viewport(cmd, 0, &[vk_viewport]);
            }
        }
    }

    fn set_scissor(&self, scissor: Scissor) {
        let Some((cmd, _)) = self.context.recording() else {
            engine_warn!("car::vulkan", "set_scissor issued with no frame recording");
            return;
        };
        unsafe {
            self.context
                .gpu()
                .device
                .cmd_set_scissor(cmd, 0, &[scissor_rect(scissor)]);
        }
    }

    fn draw_indexed(&self, vertex_array: &Rc<dyn VertexArray>, index_count: u32) -> Result<()> {
        let (cmd, slot) = self.command_buffer("draw_indexed")?;
        let (vertex_buffer, index_buffer, shader) = self.vulkan_vertex_array(vertex_array)?.parts()?;
        let index_type = index_type_to_vk(vertex_array.index_buffer().index_type())?;

        {
            let frames = self.context.frames();
            shader.bind(cmd, slot, &frames[slot].descriptors)?;
        }

        let viewport = draw_viewport(
            self.viewport.get(),
            self.context.swapchain_extent(),
            shader_spec(vertex_array),
        );
        let device = &self.context.gpu().device;
        unsafe {
            device.cmd_set_viewport(cmd, 0, &[viewport]);
            device.cmd_bind_vertex_buffers(cmd, 0, &[vertex_buffer.handle()], &[0]);
            device.cmd_bind_index_buffer(cmd, index_buffer.handle(), 0, index_type);
            device.cmd_draw_indexed(cmd, index_count, 1, 0, 0, 0);
        }
        engine_trace!("car::vulkan", "draw_indexed({}) in frame slot {}", index_count, slot);
        Ok(())
    }

    fn push_constant(
        &self,
        vertex_array: &Rc<dyn VertexArray>,
        _stages: ShaderStages,
        data: &[u8],
        offset: u32,
    ) -> Result<()> {
        let (cmd, _) = self.command_buffer("push_constant")?;
        let (_, _, shader) = self.vulkan_vertex_array(vertex_array)?.parts()?;
        // The range is declared for both stages, so pushes always name both
        shader.push_constants(cmd, data, offset)
    }

    fn set_blending(&self, enabled: bool) {
        engine_debug!(
            "car::vulkan",
            "set_blending({}) has no effect: blending is part of each shader's pipeline spec",
            enabled
        );
    }

    fn set_depth_test(&self, enabled: bool) {
        engine_debug!(
            "car::vulkan",
            "set_depth_test({}) has no effect: the render pass has no depth attachment",
            enabled
        );
    }

    fn clip_space(&self) -> ClipSpace {
        ClipSpace::YDown
    }
}

fn shader_spec(vertex_array: &Rc<dyn VertexArray>) -> &PipelineSpec {
    vertex_array.shader().pipeline_spec()
}
