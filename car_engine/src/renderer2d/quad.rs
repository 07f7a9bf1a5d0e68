/// Quad geometry for the 2D batcher: vertex format, rectangles, index pattern

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use crate::renderer::color::Color;
use crate::renderer::layout::{BufferLayout, DataType};

/// Axis-aligned rectangle in pixels, origin at the top-left
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    /// Corners in emission order: top-left, top-right, bottom-right, bottom-left
    pub fn corners(&self) -> [Vec2; 4] {
        [
            Vec2::new(self.x, self.y),
            Vec2::new(self.right(), self.y),
            Vec2::new(self.right(), self.bottom()),
            Vec2::new(self.x, self.bottom()),
        ]
    }
}

/// One vertex of a batched quad, 32 bytes
///
/// Must match the 2D batch shader inputs: location 0 position (vec2),
/// 1 source UV (vec2), 2 tint (vec3), 3 texture slot (uint).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub tint: [f32; 3],
    pub texture_slot: u32,
}

pub const VERTICES_PER_QUAD: usize = 4;
pub const INDICES_PER_QUAD: usize = 6;

impl QuadVertex {
    /// Vertex layout declared to the backend
    pub fn layout() -> BufferLayout {
        [
            ("aPosition", DataType::Float2),
            ("aSourceUV", DataType::Float2),
            ("aTint", DataType::Float3),
            ("aTextureSlot", DataType::UInt),
        ]
        .into_iter()
        .collect()
    }
}

/// Build the four vertices of a quad
///
/// `corners` and `uvs` are in top-left, top-right, bottom-right, bottom-left order.
pub fn quad_vertices(corners: [Vec2; 4], uvs: [Vec2; 4], tint: Color, slot: u32) -> [QuadVertex; 4] {
    let tint = [tint.r, tint.g, tint.b];
    let mut out = [QuadVertex::default(); 4];
    for (vertex, (corner, uv)) in out.iter_mut().zip(corners.iter().zip(uvs.iter())) {
        *vertex = QuadVertex {
            position: corner.to_array(),
            uv: uv.to_array(),
            tint,
            texture_slot: slot,
        };
    }
    out
}

/// UVs covering the whole texture
pub fn full_uvs() -> [Vec2; 4] {
    [
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(0.0, 1.0),
    ]
}

/// UVs of a source rectangle inside a `width` x `height` texture
pub fn sub_uvs(source: Rect, width: u32, height: u32) -> [Vec2; 4] {
    let w = width.max(1) as f32;
    let h = height.max(1) as f32;
    [
        Vec2::new(source.x / w, source.y / h),
        Vec2::new(source.right() / w, source.y / h),
        Vec2::new(source.right() / w, source.bottom() / h),
        Vec2::new(source.x / w, source.bottom() / h),
    ]
}

/// Index pattern for `quad_count` quads: `{4i, 4i+1, 4i+2, 4i+2, 4i+3, 4i}` per quad
pub fn quad_indices(quad_count: u32) -> Vec<u32> {
    (0..quad_count)
        .flat_map(|i| {
            let base = i * 4;
            [base, base + 1, base + 2, base + 2, base + 3, base]
        })
        .collect()
}
