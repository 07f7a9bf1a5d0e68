/*!
# Car Engine - OpenGL Backend

OpenGL 4.5 core implementation of the car_engine resource and renderer
traits, using glow for the GL bindings and glutin for context creation.

```no_run
use std::rc::Rc;
use car_engine::car::Engine;
use car_engine::car::render::ContextConfig;
use car_engine_renderer_opengl::OpenGlContext;
# fn window() -> winit::window::Window { unimplemented!() }

let window = window();
let context = Rc::new(OpenGlContext::new(&window, ContextConfig::default())?);
let mut engine = Engine::new(context)?;
engine.init_renderer2d()?;
# Ok::<(), car_engine::car::Error>(())
```

Shaders are GLSL text. The built-in 2D shader is compiled into the crate;
a `renderer2d.vert` / `renderer2d.frag` under `<root>/shaders/` overrides it.
*/

mod debug;
mod opengl_buffer;
mod opengl_context;
mod opengl_format;
mod opengl_renderer_api;
mod opengl_shader;
mod opengl_texture;
mod opengl_uniform_buffer;
mod opengl_vertex_array;

pub use debug::{debug_message_counts, message_severity};
pub use opengl_buffer::{OpenGlIndexBuffer, OpenGlVertexBuffer};
pub use opengl_context::{glsl_stage, OpenGlContext, GL_VERSION, RENDERER2D_FRAGMENT_GLSL, RENDERER2D_VERTEX_GLSL};
pub use opengl_format::{attribute_pointers, AttributePointer};
pub use opengl_renderer_api::{blending_enabled, gl_scissor_rect, gl_viewport_rect, OpenGlRendererApi};
pub use opengl_shader::{
    check_uniform_binding, glsl_text, texture_units, OpenGlShader, PUSH_CONSTANT_BINDING, PUSH_CONSTANT_BLOCK,
    PUSH_CONSTANT_SIZE,
};
pub use opengl_texture::{OpenGlTexture2D, TEXTURE_INTERNAL_FORMAT};
pub use opengl_uniform_buffer::{OpenGlSsbo, OpenGlUniformBuffer};
pub use opengl_vertex_array::OpenGlVertexArray;
