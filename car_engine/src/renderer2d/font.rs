/// Bitmap fonts: a glyph atlas texture plus per-character rectangles

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::renderer::texture::Texture2D;
use crate::renderer2d::quad::Rect;

/// Printable ASCII range loaded by default
pub const DEFAULT_CHARS: &str =
    " !\"#$%&'()*+,-./0123456789:;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_`abcdefghijklmnopqrstuvwxyz{|}~";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    /// Source rectangle in the atlas
    pub rect: Rect,
    /// Horizontal pen advance in pixels
    pub advance: f32,
}

/// A rasterized font
///
/// Rasterization happens elsewhere; this holds the result: one atlas and
/// the placement of each glyph in it.
pub struct Font {
    texture: Rc<dyn Texture2D>,
    height: u32,
    glyphs: FxHashMap<char, Glyph>,
}

impl Font {
    pub fn new(texture: Rc<dyn Texture2D>, height: u32, glyphs: FxHashMap<char, Glyph>) -> Self {
        Self { texture, height, glyphs }
    }

    /// Fixed-cell font laid out left to right, top to bottom in `columns` columns
    pub fn monospace_grid(
        texture: Rc<dyn Texture2D>,
        cell_width: u32,
        cell_height: u32,
        columns: u32,
        chars: &str,
    ) -> Self {
        let columns = columns.max(1);
        let glyphs = chars
            .chars()
            .enumerate()
            .map(|(i, c)| {
                let i = i as u32;
                let rect = Rect::new(
                    ((i % columns) * cell_width) as f32,
                    ((i / columns) * cell_height) as f32,
                    cell_width as f32,
                    cell_height as f32,
                );
                (c, Glyph { rect, advance: cell_width as f32 })
            })
            .collect();
        Self::new(texture, cell_height, glyphs)
    }

    pub fn texture(&self) -> &Rc<dyn Texture2D> {
        &self.texture
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn glyph(&self, c: char) -> Option<&Glyph> {
        self.glyphs.get(&c)
    }

    /// Line advance used by text layout
    pub fn line_height(&self) -> f32 {
        self.height as f32 + 1.0
    }

    /// Size of the box `text` occupies when drawn
    pub fn measure_text(&self, text: &str) -> (f32, f32) {
        let mut width: f32 = 0.0;
        let mut lines = 1u32;
        let mut line_width = 0.0;
        for c in text.chars() {
            if c == '\n' {
                width = width.max(line_width);
                line_width = 0.0;
                lines += 1;
                continue;
            }
            if let Some(glyph) = self.glyph(c) {
                line_width += glyph.advance;
            }
        }
        width = width.max(line_width);
        let height = self.height as f32 + (lines - 1) as f32 * self.line_height();
        (width, height)
    }
}
