/// Engine enum -> OpenGL enum conversions

use car_engine::car::render::{
    BufferLayout, BufferType, BufferUsage, CullMode, DataType, FrontFace, PolygonMode, PrimitiveTopology,
    ScalarKind, TextureFilter,
};
use car_engine::car::Result;
use car_engine::engine_warn_err;

pub fn usage_to_gl(usage: BufferUsage) -> u32 {
    match usage {
        BufferUsage::StaticDraw => glow::STATIC_DRAW,
        BufferUsage::DynamicDraw => glow::DYNAMIC_DRAW,
    }
}

/// Element type of `glDrawElements`; OpenGL indexes with all three unsigned widths
pub fn index_type_to_gl(index_type: BufferType) -> Result<u32> {
    match index_type {
        BufferType::UnsignedInt => Ok(glow::UNSIGNED_INT),
        BufferType::UnsignedShort => Ok(glow::UNSIGNED_SHORT),
        BufferType::Byte => Ok(glow::UNSIGNED_BYTE),
        other => Err(engine_warn_err!(
            "car::opengl",
            "{:?} cannot be used as an index type",
            other
        )),
    }
}

pub fn topology_to_gl(topology: PrimitiveTopology) -> u32 {
    match topology {
        PrimitiveTopology::PointList => glow::POINTS,
        PrimitiveTopology::LineList => glow::LINES,
        PrimitiveTopology::LineStrip => glow::LINE_STRIP,
        PrimitiveTopology::TriangleList => glow::TRIANGLES,
        PrimitiveTopology::TriangleStrip => glow::TRIANGLE_STRIP,
        PrimitiveTopology::TriangleFan => glow::TRIANGLE_FAN,
    }
}

/// Face to cull, `None` when culling is off
pub fn cull_mode_to_gl(mode: CullMode) -> Option<u32> {
    match mode {
        CullMode::None => None,
        CullMode::Front => Some(glow::FRONT),
        CullMode::Back => Some(glow::BACK),
        CullMode::FrontAndBack => Some(glow::FRONT_AND_BACK),
    }
}

pub fn front_face_to_gl(face: FrontFace) -> u32 {
    match face {
        FrontFace::CounterClockwise => glow::CCW,
        FrontFace::Clockwise => glow::CW,
    }
}

pub fn polygon_mode_to_gl(mode: PolygonMode) -> u32 {
    match mode {
        PolygonMode::Fill => glow::FILL,
        PolygonMode::Line => glow::LINE,
        PolygonMode::Point => glow::POINT,
    }
}

pub fn filter_to_gl(filter: TextureFilter) -> i32 {
    match filter {
        TextureFilter::Nearest => glow::NEAREST as i32,
        TextureFilter::Linear => glow::LINEAR as i32,
    }
}

pub fn wrap_to_gl(repeat: bool) -> i32 {
    if repeat {
        glow::REPEAT as i32
    } else {
        glow::CLAMP_TO_EDGE as i32
    }
}

/// How one generic vertex attribute location is fed from the vertex buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributePointer {
    pub location: u32,
    pub components: i32,
    pub gl_type: u32,
    /// Integer attributes go through `glVertexAttribIPointer` and stay unconverted
    pub integer: bool,
    pub normalized: bool,
    pub offset: i32,
}

fn columns(data_type: DataType) -> u32 {
    match data_type {
        DataType::Mat3 => 3,
        DataType::Mat4 => 4,
        _ => 1,
    }
}

/// Attribute pointers for `layout`
///
/// Locations follow declaration order; a `Mat3`/`Mat4` element takes one
/// location per column, the same numbering the Vulkan backend uses.
pub fn attribute_pointers(layout: &BufferLayout) -> Result<Vec<AttributePointer>> {
    if layout.is_empty() {
        return Err(engine_warn_err!("car::opengl", "Vertex buffer layout has no elements"));
    }
    let mut pointers = Vec::new();
    let mut location = 0;
    for element in layout.elements() {
        let columns = columns(element.data_type);
        let components = element.data_type.component_count() / columns;
        let column_size = element.size / columns;
        let (gl_type, integer) = match element.data_type.scalar_kind() {
            ScalarKind::Float => (glow::FLOAT, false),
            ScalarKind::Int => (glow::INT, true),
            ScalarKind::UInt => (glow::UNSIGNED_INT, true),
        };
        for column in 0..columns {
            pointers.push(AttributePointer {
                location,
                components: components as i32,
                gl_type,
                integer,
                normalized: element.normalized,
                offset: (element.offset + column * column_size) as i32,
            });
            location += 1;
        }
    }
    Ok(pointers)
}
