/// Engine enum -> Vulkan enum conversions

use ash::vk;
use car_engine::car::render::{
    BufferLayout, BufferType, CullMode, DataType, DescriptorType, FrontFace, PolygonMode,
    PrimitiveTopology, ShaderStages, TextureFilter, VertexInputRate,
};
use car_engine::car::Result;
use car_engine::engine_warn_err;

/// Attribute format of one location; matrices use their column format
pub fn data_type_to_vk(data_type: DataType) -> vk::Format {
    match data_type {
        DataType::Float => vk::Format::R32_SFLOAT,
        DataType::Float2 => vk::Format::R32G32_SFLOAT,
        DataType::Float3 | DataType::Mat3 => vk::Format::R32G32B32_SFLOAT,
        DataType::Float4 | DataType::Mat4 => vk::Format::R32G32B32A32_SFLOAT,
        DataType::Int => vk::Format::R32_SINT,
        DataType::Int2 => vk::Format::R32G32_SINT,
        DataType::Int3 => vk::Format::R32G32B32_SINT,
        DataType::Int4 => vk::Format::R32G32B32A32_SINT,
        DataType::UInt => vk::Format::R32_UINT,
        DataType::UInt2 => vk::Format::R32G32_UINT,
        DataType::UInt3 => vk::Format::R32G32B32_UINT,
        DataType::UInt4 => vk::Format::R32G32B32A32_UINT,
    }
}

/// Number of shader locations an element occupies
pub fn location_count(data_type: DataType) -> u32 {
    match data_type {
        DataType::Mat3 => 3,
        DataType::Mat4 => 4,
        _ => 1,
    }
}

/// Attribute descriptions for `layout` on vertex binding `binding`
///
/// Locations are assigned in declaration order; a `Mat3`/`Mat4` element
/// takes one location per column.
pub fn vertex_attributes(layout: &BufferLayout, binding: u32) -> Result<Vec<vk::VertexInputAttributeDescription>> {
    if layout.is_empty() {
        return Err(engine_warn_err!("car::vulkan", "Vertex buffer layout has no elements"));
    }
    let mut attributes = Vec::new();
    let mut location = 0;
    for element in layout.elements() {
        let format = data_type_to_vk(element.data_type);
        let columns = location_count(element.data_type);
        let column_size = element.size / columns;
        for column in 0..columns {
            attributes.push(
                vk::VertexInputAttributeDescription::default()
                    .location(location)
                    .binding(binding)
                    .format(format)
                    .offset(element.offset + column * column_size),
            );
            location += 1;
        }
    }
    Ok(attributes)
}

pub fn input_rate_to_vk(rate: VertexInputRate) -> vk::VertexInputRate {
    match rate {
        VertexInputRate::Vertex => vk::VertexInputRate::VERTEX,
        VertexInputRate::Instance => vk::VertexInputRate::INSTANCE,
    }
}

pub fn topology_to_vk(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        PrimitiveTopology::TriangleFan => vk::PrimitiveTopology::TRIANGLE_FAN,
    }
}

pub fn polygon_mode_to_vk(mode: PolygonMode) -> vk::PolygonMode {
    match mode {
        PolygonMode::Fill => vk::PolygonMode::FILL,
        PolygonMode::Line => vk::PolygonMode::LINE,
        PolygonMode::Point => vk::PolygonMode::POINT,
    }
}

pub fn cull_mode_to_vk(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
        CullMode::FrontAndBack => vk::CullModeFlags::FRONT_AND_BACK,
    }
}

pub fn front_face_to_vk(face: FrontFace) -> vk::FrontFace {
    match face {
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
    }
}

pub fn stages_to_vk(stages: ShaderStages) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    if stages.contains(ShaderStages::VERTEX) {
        flags |= vk::ShaderStageFlags::VERTEX;
    }
    if stages.contains(ShaderStages::FRAGMENT) {
        flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    flags
}

/// `None` descriptors reserve a binding number without a resource
pub fn descriptor_type_to_vk(descriptor_type: DescriptorType) -> Option<vk::DescriptorType> {
    match descriptor_type {
        DescriptorType::None => None,
        DescriptorType::UniformBuffer => Some(vk::DescriptorType::UNIFORM_BUFFER),
        DescriptorType::Sampler2D => Some(vk::DescriptorType::COMBINED_IMAGE_SAMPLER),
        DescriptorType::StorageBuffer => Some(vk::DescriptorType::STORAGE_BUFFER),
    }
}

/// Index type used on the device; 8-bit indices are stored widened to 16 bits
pub fn index_type_to_vk(index_type: BufferType) -> Result<vk::IndexType> {
    match index_type {
        BufferType::UnsignedInt => Ok(vk::IndexType::UINT32),
        BufferType::UnsignedShort | BufferType::Byte => Ok(vk::IndexType::UINT16),
        other => Err(engine_warn_err!("car::vulkan", "{:?} cannot be used as an index type", other)),
    }
}

pub fn filter_to_vk(filter: TextureFilter) -> vk::Filter {
    match filter {
        TextureFilter::Nearest => vk::Filter::NEAREST,
        TextureFilter::Linear => vk::Filter::LINEAR,
    }
}

pub fn address_mode_to_vk(repeat: bool) -> vk::SamplerAddressMode {
    if repeat {
        vk::SamplerAddressMode::REPEAT
    } else {
        vk::SamplerAddressMode::CLAMP_TO_EDGE
    }
}

#[cfg(test)]
#[path = "vulkan_format_tests.rs"]
mod tests;
