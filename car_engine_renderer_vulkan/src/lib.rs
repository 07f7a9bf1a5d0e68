/*!
# Car Engine - Vulkan Backend

Vulkan implementation of the car_engine resource and renderer traits,
using the Ash bindings and gpu-allocator for memory management.

The application creates a [`VulkanContext`] for its window and hands it to
`Engine::new`:

```no_run
use std::rc::Rc;
use car_engine::car::Engine;
use car_engine::car::render::ContextConfig;
use car_engine_renderer_vulkan::VulkanContext;
# fn window() -> winit::window::Window { unimplemented!() }

let window = window();
let context = Rc::new(VulkanContext::new(&window, ContextConfig::default())?);
let mut engine = Engine::new(context)?;
engine.init_renderer2d()?;
# Ok::<(), car_engine::car::Error>(())
```

Shaders are loaded from `.crss` containers or raw SPIR-V. The built-in 2D
shader sources live in `shaders/` and must be compiled into the resource
cache (`<root>/shaders/__CACHE__/renderer2d.vert.spv` and
`renderer2d.frag.spv`), e.g. with `glslc`.
*/

mod debug;
mod vulkan_buffer;
mod vulkan_context;
mod vulkan_device;
mod vulkan_format;
mod vulkan_frame;
mod vulkan_graphics_context;
mod vulkan_renderer_api;
mod vulkan_shader;
mod vulkan_swapchain;
mod vulkan_texture;
mod vulkan_uniform_buffer;
mod vulkan_vertex_array;

pub use vulkan_buffer::{VulkanIndexBuffer, VulkanVertexBuffer};
pub use vulkan_graphics_context::{cached_stage, VulkanContext, MAX_ACQUIRE_ATTEMPTS};
pub use vulkan_renderer_api::VulkanRendererApi;
pub use vulkan_shader::{
    load_stage, merge_set_layouts, reflect_descriptor_sets, LayoutBinding, VulkanShader, PUSH_CONSTANT_SIZE,
};
pub use vulkan_swapchain::{choose_extent, choose_image_count, choose_present_mode, choose_surface_format};
pub use vulkan_texture::{VulkanTexture2D, TEXTURE_FORMAT};
pub use vulkan_uniform_buffer::{VulkanSsbo, VulkanUniformBuffer};
pub use vulkan_vertex_array::VulkanVertexArray;

// Re-export debug utilities
pub use debug::{get_validation_stats, print_validation_stats_report, DebugSeverity, ValidationStats};
