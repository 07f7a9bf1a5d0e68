/*!
# Car Engine

Core traits and types for the Car 2D/3D rendering engine.

This crate is backend agnostic. A backend crate (OpenGL or Vulkan)
implements [`GraphicsContext`](car::render::GraphicsContext) and the
resource traits; the application hands that context to
[`Engine::new`](car::Engine::new) and draws through the `Renderer`
facade or the batched `Renderer2D`.

## Architecture

- **GraphicsContext**: device owner and factory for every GPU resource
- **VertexBuffer / IndexBuffer / UniformBuffer / Ssbo**: buffer resource traits
- **Texture2D**: sampled RGBA8 image trait
- **Shader**: compiled program plus its sticky (set, binding) inputs
- **VertexArray**: vertex buffer + index buffer + shader bundle, ready to draw
- **Renderer**: frame lifecycle and draw submission facade over `RendererApi`
- **Renderer2D**: quad batcher for sprites, rectangles, lines and text
- **CompiledShader**: the `.crss` shader container codec

Backend implementations provide concrete types that implement these traits.
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod renderer;
pub mod renderer2d;
pub mod resource_paths;

// Main car namespace module
pub mod car {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine context object
    pub use crate::engine::Engine;

    // Renderer facade
    pub use crate::renderer::Renderer;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    // Render sub-module with all device resource types
    pub mod render {
        pub use crate::renderer::*;
    }

    // Batched 2D drawing
    pub mod render2d {
        pub use crate::renderer2d::*;
    }

    // Asset locations
    pub use crate::resource_paths::ResourcePaths;
}

// Re-export math library at crate root
pub use glam;
