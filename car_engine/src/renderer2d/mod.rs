/// Renderer2D - batched textured quads, rectangles, lines and bitmap text
///
/// Every primitive becomes a quad appended to a CPU-side vertex array.
/// Up to [`MAX_TEXTURE_SLOTS`] distinct textures share one batch; the
/// batch is uploaded and drawn with a single indexed draw when it fills
/// up, when a ninth texture is needed, or when the frame ends.

pub mod font;
pub mod line;
pub mod quad;

pub use font::*;
pub use line::*;
pub use quad::*;

use std::rc::Rc;

use glam::{Mat4, Vec2};

use crate::error::Result;
use crate::renderer::buffer::{BufferType, BufferUsage, IndexBuffer, IndexData};
use crate::renderer::color::Color;
use crate::renderer::context::GraphicsContext;
use crate::renderer::renderer::{ClipSpace, Renderer};
use crate::renderer::shader::{Shader, ShaderDesc, ShaderStages, MAX_TEXTURE_SLOTS};
use crate::renderer::texture::{same_texture, ImageData, Texture2D};
use crate::renderer::vertex_array::VertexArray;

/// Default number of quads per batch
pub const MAX_BATCH_SIZE: u32 = 20_000;

/// Descriptor set and binding of the sampler array in the batch shader
pub const TEXTURE_SET: u32 = 0;
pub const TEXTURE_BINDING: u32 = 0;

pub struct Renderer2D {
    context: Rc<dyn GraphicsContext>,
    renderer: Rc<Renderer>,
    shader: Rc<dyn Shader>,
    index_buffer: Rc<dyn IndexBuffer>,
    white_texture: Rc<dyn Texture2D>,

    /// Vertex arrays per frame slot, one per flush issued in that frame
    ///
    /// A flush never rewrites a vertex buffer an earlier draw of the same
    /// frame still reads from. The slot and cursor follow the renderer's
    /// recorded frames, whether or not `begin` is called.
    frame_arrays: Vec<Vec<Rc<dyn VertexArray>>>,
    frame_slot: usize,
    flush_cursor: usize,
    synced_frame: Option<u64>,

    vertices: Vec<QuadVertex>,
    textures: Vec<Rc<dyn Texture2D>>,
    current_batch_size: u32,
    max_batch_size: u32,
}

impl Renderer2D {
    /// Create a batcher using the backend's built-in 2D shader
    pub fn new(context: Rc<dyn GraphicsContext>, renderer: Rc<Renderer>) -> Result<Self> {
        let desc = context.renderer2d_shader()?;
        Self::with_batch_size(context, renderer, &desc, MAX_BATCH_SIZE)
    }

    /// Create a batcher with a custom shader and batch capacity
    ///
    /// The shader must consume [`QuadVertex`] and declare a sampler array
    /// of [`MAX_TEXTURE_SLOTS`] at (`TEXTURE_SET`, `TEXTURE_BINDING`).
    pub fn with_batch_size(
        context: Rc<dyn GraphicsContext>,
        renderer: Rc<Renderer>,
        shader_desc: &ShaderDesc,
        max_batch_size: u32,
    ) -> Result<Self> {
        if max_batch_size == 0 {
            crate::engine_bail_warn!("car::Renderer2D", "batch size must be at least one quad");
        }

        let shader = context.create_shader(shader_desc)?;

        let indices = quad_indices(max_batch_size);
        let index_buffer = context.create_index_buffer(
            Some(IndexData::U32(&indices)),
            indices.len() as u32,
            BufferType::UnsignedInt,
            BufferUsage::StaticDraw,
        )?;

        let white_texture = context.create_texture(&ImageData::solid(1, 1, [255, 255, 255, 255]))?;

        let mut renderer2d = Self {
            context,
            renderer,
            shader,
            index_buffer,
            white_texture,
            frame_arrays: Vec::new(),
            frame_slot: 0,
            flush_cursor: 0,
            synced_frame: None,
            vertices: Vec::with_capacity(max_batch_size as usize * VERTICES_PER_QUAD),
            textures: Vec::with_capacity(MAX_TEXTURE_SLOTS),
            current_batch_size: 0,
            max_batch_size,
        };

        let slots = renderer2d.context.max_frames_in_flight().max(1);
        for _ in 0..slots {
            let first = renderer2d.create_vertex_array()?;
            renderer2d.frame_arrays.push(vec![first]);
        }

        crate::engine_debug!(
            "car::Renderer2D",
            "Renderer2D created: {} quads per batch, {} frame slot(s)",
            max_batch_size,
            slots
        );
        Ok(renderer2d)
    }

    fn create_vertex_array(&self) -> Result<Rc<dyn VertexArray>> {
        let size = self.max_batch_size as usize * VERTICES_PER_QUAD * std::mem::size_of::<QuadVertex>();
        let vertex_buffer =
            self.context
                .create_vertex_buffer(None, size, BufferUsage::DynamicDraw, QuadVertex::layout())?;
        self.context
            .create_vertex_array(vertex_buffer, self.index_buffer.clone(), self.shader.clone())
    }

    // ===== FRAME =====

    /// Start a 2D scene
    ///
    /// Clears the texture table. Quads still pending from a scene that
    /// was never ended reference the old table and are discarded.
    pub fn begin(&mut self) {
        if self.current_batch_size > 0 {
            crate::engine_warn!(
                "car::Renderer2D",
                "begin called with {} unflushed quads, discarding them",
                self.current_batch_size
            );
            self.reset_batch();
        }
        self.textures.clear();
        self.sync_frame();
    }

    /// Move to the current frame's slot the first time a new frame is seen
    fn sync_frame(&mut self) {
        let frame = self.renderer.frames_recorded();
        if self.synced_frame != Some(frame) {
            self.synced_frame = Some(frame);
            self.frame_slot = self.context.current_frame_index() % self.frame_arrays.len().max(1);
            self.flush_cursor = 0;
        }
    }

    /// End the scene, submitting pending quads
    pub fn end(&mut self) -> Result<()> {
        self.flush()
    }

    /// Upload and draw pending quads
    ///
    /// Keeps the texture table so later quads can reuse their slots.
    pub fn flush(&mut self) -> Result<()> {
        if self.current_batch_size == 0 {
            return Ok(());
        }

        let vertex_array = self.next_vertex_array()?;

        let projection = self.projection();
        self.renderer.set_push_constant(
            &vertex_array,
            ShaderStages::VERTEX,
            bytemuck::bytes_of(&projection),
            0,
        )?;
        self.shader
            .set_textures(TEXTURE_SET, TEXTURE_BINDING, &self.textures)?;

        vertex_array
            .vertex_buffer()
            .update_data(bytemuck::cast_slice(&self.vertices), 0)?;

        let index_count = self.current_batch_size * INDICES_PER_QUAD as u32;
        self.renderer.draw_command_count(&vertex_array, index_count)?;

        crate::engine_trace!(
            "car::Renderer2D",
            "Flushed {} quads with {} texture(s)",
            self.current_batch_size,
            self.textures.len()
        );
        self.reset_batch();
        Ok(())
    }

    fn next_vertex_array(&mut self) -> Result<Rc<dyn VertexArray>> {
        self.sync_frame();
        let cursor = self.flush_cursor;
        let slot = self.frame_slot;
        if self.frame_arrays[slot].len() <= cursor {
            let created = self.create_vertex_array()?;
            self.frame_arrays[slot].push(created);
        }
        self.flush_cursor += 1;
        Ok(self.frame_arrays[slot][cursor].clone())
    }

    fn reset_batch(&mut self) {
        self.current_batch_size = 0;
        self.vertices.clear();
    }

    /// Pixel-space orthographic projection, origin at the top-left corner
    pub fn projection(&self) -> Mat4 {
        let (width, height) = self.context.framebuffer_size();
        let (width, height) = (width.max(1) as f32, height.max(1) as f32);
        match self.renderer.clip_space() {
            ClipSpace::YUp => Mat4::orthographic_rh_gl(0.0, width, height, 0.0, -1.0, 1.0),
            ClipSpace::YDown => Mat4::orthographic_rh(0.0, width, 0.0, height, -1.0, 1.0),
        }
    }

    // ===== TEXTURE TABLE =====

    /// Slot of `texture` in the current batch, registering it if needed
    ///
    /// Returns `None` when all slots hold other textures; the pending
    /// batch is dropped in that case and the caller is expected to flush
    /// and retry. The draw methods do this automatically.
    pub fn texture_id(&mut self, texture: &Rc<dyn Texture2D>) -> Option<u32> {
        if let Some(slot) = self.textures.iter().position(|t| same_texture(t, texture)) {
            return Some(slot as u32);
        }
        if self.textures.len() >= MAX_TEXTURE_SLOTS {
            self.reset_batch();
            return None;
        }
        self.textures.push(texture.clone());
        Some((self.textures.len() - 1) as u32)
    }

    fn slot_for(&mut self, texture: &Rc<dyn Texture2D>) -> Result<u32> {
        let known = self.textures.iter().any(|t| same_texture(t, texture));
        if !known && self.textures.len() >= MAX_TEXTURE_SLOTS {
            self.flush()?;
            self.textures.clear();
        }
        match self.texture_id(texture) {
            Some(slot) => Ok(slot),
            None => crate::engine_bail!("car::Renderer2D", "no texture slot available after flush"),
        }
    }

    // ===== PRIMITIVES =====

    fn push_quad(&mut self, vertices: [QuadVertex; 4]) -> Result<()> {
        self.vertices.extend_from_slice(&vertices);
        self.current_batch_size += 1;
        if self.current_batch_size >= self.max_batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn draw_textured_quad(
        &mut self,
        texture: &Rc<dyn Texture2D>,
        corners: [Vec2; 4],
        uvs: [Vec2; 4],
        tint: Color,
    ) -> Result<()> {
        let slot = self.slot_for(texture)?;
        self.push_quad(quad_vertices(corners, uvs, tint, slot))
    }

    /// Draw a whole texture into `dest`
    pub fn draw_texture(&mut self, texture: &Rc<dyn Texture2D>, dest: Rect) -> Result<()> {
        self.draw_texture_tinted(texture, dest, Color::WHITE)
    }

    pub fn draw_texture_tinted(
        &mut self,
        texture: &Rc<dyn Texture2D>,
        dest: Rect,
        tint: impl Into<Color>,
    ) -> Result<()> {
        self.draw_textured_quad(texture, dest.corners(), full_uvs(), tint.into())
    }

    /// Draw the `source` pixels of a texture into `dest`
    pub fn draw_sub_texture(&mut self, texture: &Rc<dyn Texture2D>, source: Rect, dest: Rect) -> Result<()> {
        self.draw_sub_texture_tinted(texture, source, dest, Color::WHITE)
    }

    pub fn draw_sub_texture_tinted(
        &mut self,
        texture: &Rc<dyn Texture2D>,
        source: Rect,
        dest: Rect,
        tint: impl Into<Color>,
    ) -> Result<()> {
        let uvs = sub_uvs(source, texture.width(), texture.height());
        self.draw_textured_quad(texture, dest.corners(), uvs, tint.into())
    }

    /// Fill a rectangle with a flat color
    pub fn draw_rect(&mut self, dest: Rect, color: impl Into<Color>) -> Result<()> {
        let white = self.white_texture.clone();
        self.draw_textured_quad(&white, dest.corners(), full_uvs(), color.into())
    }

    /// Stroke a line `width` pixels wide
    pub fn draw_line(&mut self, from: Vec2, to: Vec2, width: f32, color: impl Into<Color>) -> Result<()> {
        let color = color.into();
        match line_shape(from, to, width) {
            LineShape::Rect(rect) => self.draw_rect(rect, color),
            LineShape::Quad(corners) => {
                let white = self.white_texture.clone();
                self.draw_textured_quad(&white, corners, full_uvs(), color)
            }
        }
    }

    /// Draw text with its top-left corner at `position`
    ///
    /// `'\n'` returns to `position.x` and moves down one line. Characters
    /// missing from the font are skipped.
    pub fn draw_text(&mut self, font: &Font, text: &str, position: Vec2, tint: impl Into<Color>) -> Result<()> {
        let tint = tint.into();
        let height = font.height() as f32;
        let mut pen = position;
        for c in text.chars() {
            if c == '\n' {
                pen.x = position.x;
                pen.y += font.line_height();
                continue;
            }
            let Some(glyph) = font.glyph(c).copied() else {
                crate::engine_trace!("car::Renderer2D", "no glyph for {:?}", c);
                continue;
            };
            let source = Rect::new(glyph.rect.x, glyph.rect.y, glyph.rect.w, height);
            let dest = Rect::new(pen.x, pen.y, glyph.rect.w, height);
            self.draw_sub_texture_tinted(font.texture(), source, dest, tint)?;
            pen.x += glyph.advance;
        }
        Ok(())
    }

    // ===== ACCESSORS =====

    pub fn current_batch_size(&self) -> u32 {
        self.current_batch_size
    }

    pub fn max_batch_size(&self) -> u32 {
        self.max_batch_size
    }

    /// Textures referenced by the current batch, indexed by slot
    pub fn textures(&self) -> &[Rc<dyn Texture2D>] {
        &self.textures
    }

    /// Vertices of the pending quads
    pub fn batch_vertices(&self) -> &[QuadVertex] {
        &self.vertices
    }

    /// First vertex array of the current frame slot
    pub fn vertex_array(&self) -> &Rc<dyn VertexArray> {
        &self.frame_arrays[self.frame_slot][0]
    }

    /// Vertex arrays used by flushes of the current frame slot so far
    pub fn frame_vertex_arrays(&self) -> &[Rc<dyn VertexArray>] {
        &self.frame_arrays[self.frame_slot]
    }

    pub fn shader(&self) -> &Rc<dyn Shader> {
        &self.shader
    }

    pub fn white_texture(&self) -> &Rc<dyn Texture2D> {
        &self.white_texture
    }
}

#[cfg(test)]
#[path = "renderer2d_tests.rs"]
mod tests;
