/// Vulkan vertex array - binds the shader's pipeline to a vertex layout

use car_engine::car::render::{IndexBuffer, Shader, VertexArray, VertexBuffer};
use car_engine::car::Result;
use car_engine::engine_warn_err;
use std::any::Any;
use std::rc::Rc;

use crate::vulkan_buffer::{VulkanIndexBuffer, VulkanVertexBuffer};
use crate::vulkan_shader::VulkanShader;

pub struct VulkanVertexArray {
    vertex_buffer: Rc<dyn VertexBuffer>,
    index_buffer: Rc<dyn IndexBuffer>,
    shader: Rc<dyn Shader>,
}

impl VulkanVertexArray {
    /// Check the parts belong to this backend and bake the shader's pipeline
    pub(crate) fn new(
        vertex_buffer: Rc<dyn VertexBuffer>,
        index_buffer: Rc<dyn IndexBuffer>,
        shader: Rc<dyn Shader>,
    ) -> Result<Self> {
        if vertex_buffer.as_any().downcast_ref::<VulkanVertexBuffer>().is_none() {
            return Err(engine_warn_err!("car::vulkan", "Vertex buffer was not created by the Vulkan backend"));
        }
        if index_buffer.as_any().downcast_ref::<VulkanIndexBuffer>().is_none() {
            return Err(engine_warn_err!("car::vulkan", "Index buffer was not created by the Vulkan backend"));
        }
        let vulkan_shader = shader
            .as_any()
            .downcast_ref::<VulkanShader>()
            .ok_or_else(|| engine_warn_err!("car::vulkan", "Shader was not created by the Vulkan backend"))?;

        vulkan_shader.ensure_pipeline(vertex_buffer.layout())?;

        Ok(Self { vertex_buffer, index_buffer, shader })
    }

    pub(crate) fn parts(&self) -> Result<(&VulkanVertexBuffer, &VulkanIndexBuffer, &VulkanShader)> {
        let vb = self.vertex_buffer.as_any().downcast_ref::<VulkanVertexBuffer>();
        let ib = self.index_buffer.as_any().downcast_ref::<VulkanIndexBuffer>();
        let shader = self.shader.as_any().downcast_ref::<VulkanShader>();
        match (vb, ib, shader) {
            (Some(vb), Some(ib), Some(shader)) => Ok((vb, ib, shader)),
            _ => Err(engine_warn_err!("car::vulkan", "Vertex array holds non-Vulkan resources")),
        }
    }
}

impl VertexArray for VulkanVertexArray {
    fn vertex_buffer(&self) -> &Rc<dyn VertexBuffer> {
        &self.vertex_buffer
    }

    fn index_buffer(&self) -> &Rc<dyn IndexBuffer> {
        &self.index_buffer
    }

    fn shader(&self) -> &Rc<dyn Shader> {
        &self.shader
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
