//! Unit tests for Vulkan format conversion functions
//!
//! Pure conversions only, no GPU required.

use super::*;
use car_engine::car::render::Element;

// ============================================================================
// VERTEX FORMAT CONVERSION TESTS
// ============================================================================

#[test]
fn test_float_formats() {
    assert_eq!(data_type_to_vk(DataType::Float), vk::Format::R32_SFLOAT);
    assert_eq!(data_type_to_vk(DataType::Float2), vk::Format::R32G32_SFLOAT);
    assert_eq!(data_type_to_vk(DataType::Float3), vk::Format::R32G32B32_SFLOAT);
    assert_eq!(data_type_to_vk(DataType::Float4), vk::Format::R32G32B32A32_SFLOAT);
}

#[test]
fn test_integer_formats() {
    assert_eq!(data_type_to_vk(DataType::Int), vk::Format::R32_SINT);
    assert_eq!(data_type_to_vk(DataType::Int4), vk::Format::R32G32B32A32_SINT);
    assert_eq!(data_type_to_vk(DataType::UInt), vk::Format::R32_UINT);
    assert_eq!(data_type_to_vk(DataType::UInt3), vk::Format::R32G32B32_UINT);
}

#[test]
fn test_matrix_columns() {
    assert_eq!(data_type_to_vk(DataType::Mat3), vk::Format::R32G32B32_SFLOAT);
    assert_eq!(data_type_to_vk(DataType::Mat4), vk::Format::R32G32B32A32_SFLOAT);
    assert_eq!(location_count(DataType::Mat3), 3);
    assert_eq!(location_count(DataType::Mat4), 4);
    assert_eq!(location_count(DataType::Float4), 1);
}

// ============================================================================
// VERTEX ATTRIBUTE TESTS
// ============================================================================

#[test]
fn test_renderer2d_layout_attributes() {
    let layout = BufferLayout::new(vec![
        Element::new("aPosition", DataType::Float2),
        Element::new("aSourceUV", DataType::Float2),
        Element::new("aTint", DataType::Float3),
        Element::new("aTextureSlot", DataType::UInt),
    ]);
    let attributes = vertex_attributes(&layout, 0).unwrap();

    let summary: Vec<(u32, vk::Format, u32)> = attributes
        .iter()
        .map(|a| (a.location, a.format, a.offset))
        .collect();
    assert_eq!(
        summary,
        vec![
            (0, vk::Format::R32G32_SFLOAT, 0),
            (1, vk::Format::R32G32_SFLOAT, 8),
            (2, vk::Format::R32G32B32_SFLOAT, 16),
            (3, vk::Format::R32_UINT, 28),
        ]
    );
    assert!(attributes.iter().all(|a| a.binding == 0));
}

#[test]
fn test_matrix_attribute_expands_to_columns() {
    let layout = BufferLayout::new(vec![
        Element::new("aModel", DataType::Mat4),
        Element::new("aColor", DataType::Float4),
    ]);
    let attributes = vertex_attributes(&layout, 1).unwrap();

    assert_eq!(attributes.len(), 5);
    let offsets: Vec<u32> = attributes.iter().map(|a| a.offset).collect();
    assert_eq!(offsets, vec![0, 16, 32, 48, 64]);
    let locations: Vec<u32> = attributes.iter().map(|a| a.location).collect();
    assert_eq!(locations, vec![0, 1, 2, 3, 4]);
    assert_eq!(attributes[4].binding, 1);
}

#[test]
fn test_empty_layout_rejected() {
    assert!(vertex_attributes(&BufferLayout::default(), 0).is_err());
}

// ============================================================================
// PIPELINE STATE CONVERSION TESTS
// ============================================================================

#[test]
fn test_pipeline_state_mapping() {
    assert_eq!(topology_to_vk(PrimitiveTopology::TriangleList), vk::PrimitiveTopology::TRIANGLE_LIST);
    assert_eq!(topology_to_vk(PrimitiveTopology::LineStrip), vk::PrimitiveTopology::LINE_STRIP);
    assert_eq!(polygon_mode_to_vk(PolygonMode::Line), vk::PolygonMode::LINE);
    assert_eq!(cull_mode_to_vk(CullMode::None), vk::CullModeFlags::NONE);
    assert_eq!(cull_mode_to_vk(CullMode::Back), vk::CullModeFlags::BACK);
    assert_eq!(front_face_to_vk(FrontFace::Clockwise), vk::FrontFace::CLOCKWISE);
    assert_eq!(input_rate_to_vk(VertexInputRate::Instance), vk::VertexInputRate::INSTANCE);
}

#[test]
fn test_stage_flags() {
    assert_eq!(stages_to_vk(ShaderStages::VERTEX), vk::ShaderStageFlags::VERTEX);
    assert_eq!(
        stages_to_vk(ShaderStages::VERTEX | ShaderStages::FRAGMENT),
        vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
    );
    assert_eq!(stages_to_vk(ShaderStages::empty()), vk::ShaderStageFlags::empty());
}

#[test]
fn test_descriptor_types() {
    assert_eq!(descriptor_type_to_vk(DescriptorType::None), None);
    assert_eq!(descriptor_type_to_vk(DescriptorType::UniformBuffer), Some(vk::DescriptorType::UNIFORM_BUFFER));
    assert_eq!(
        descriptor_type_to_vk(DescriptorType::Sampler2D),
        Some(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
    );
    assert_eq!(descriptor_type_to_vk(DescriptorType::StorageBuffer), Some(vk::DescriptorType::STORAGE_BUFFER));
}

#[test]
fn test_index_types() {
    assert_eq!(index_type_to_vk(BufferType::UnsignedInt).unwrap(), vk::IndexType::UINT32);
    assert_eq!(index_type_to_vk(BufferType::UnsignedShort).unwrap(), vk::IndexType::UINT16);
    assert_eq!(index_type_to_vk(BufferType::Byte).unwrap(), vk::IndexType::UINT16, "u8 indices are widened");
    assert!(index_type_to_vk(BufferType::Float).is_err());
}

#[test]
fn test_sampler_mapping() {
    assert_eq!(filter_to_vk(TextureFilter::Nearest), vk::Filter::NEAREST);
    assert_eq!(filter_to_vk(TextureFilter::Linear), vk::Filter::LINEAR);
    assert_eq!(address_mode_to_vk(true), vk::SamplerAddressMode::REPEAT);
    assert_eq!(address_mode_to_vk(false), vk::SamplerAddressMode::CLAMP_TO_EDGE);
}
