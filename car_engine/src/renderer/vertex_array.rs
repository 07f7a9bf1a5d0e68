/// Draw-ready composite of vertex buffer, index buffer and shader

use std::any::Any;
use std::rc::Rc;

use crate::renderer::buffer::{IndexBuffer, VertexBuffer};
use crate::renderer::shader::Shader;

/// One vertex buffer, one index buffer and one shader, bound together
///
/// Backends that bake pipelines from shader + vertex layout (Vulkan) do so
/// when the vertex array is created, so the shader must exist first and
/// must not be shared with vertex arrays of an incompatible layout.
pub trait VertexArray {
    fn vertex_buffer(&self) -> &Rc<dyn VertexBuffer>;

    fn index_buffer(&self) -> &Rc<dyn IndexBuffer>;

    fn shader(&self) -> &Rc<dyn Shader>;

    fn as_any(&self) -> &dyn Any;
}
