/// 2D textures: pixel data loading and the device texture trait

use std::any::Any;
use std::path::Path;
use std::rc::Rc;

use crate::error::{Error, Result};

/// Texel format; all textures are stored as 8-bit RGBA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8,
}

impl TextureFormat {
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::Rgba8 => 4,
        }
    }
}

/// Minification / magnification filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    Nearest,
    Linear,
}

/// Decoded RGBA8 pixels, rows top to bottom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    /// Wrap raw RGBA8 pixels, checking their length
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(Error::InvalidResource(format!(
                "{}x{} RGBA8 image needs {} bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        Ok(Self { width, height, pixels })
    }

    /// Single-color image
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self { width, height, pixels }
    }

    /// Decode an encoded image (PNG, JPEG, BMP, TGA) to RGBA8
    pub fn decode(bytes: &[u8], flip_vertically: bool) -> Result<Self> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| Error::Format(format!("image decode failed: {}", e)))?;
        let image = if flip_vertically { image.flipv() } else { image };
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self { width, height, pixels: rgba.into_raw() })
    }

    /// Read and decode an image file
    pub fn load(path: impl AsRef<Path>, flip_vertically: bool) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
        Self::decode(&bytes, flip_vertically)
    }
}

/// A sampled 2D texture on the device
///
/// Identity is the resource itself: two handles are the same texture only
/// if they point at the same object (see [`same_texture`]).
pub trait Texture2D {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Bytes per pixel
    fn bpp(&self) -> u32 {
        TextureFormat::Rgba8.bytes_per_pixel()
    }

    /// Replace the pixels; the new image may have a different size
    fn update_data(&self, image: &ImageData) -> Result<()>;

    fn update_from_file(&self, path: &Path, flip_vertically: bool) -> Result<()> {
        let image = ImageData::load(path, flip_vertically)?;
        self.update_data(&image)
    }

    fn set_filters(&self, min: TextureFilter, mag: TextureFilter) -> Result<()>;

    fn set_repeat_x(&self, repeat: bool) -> Result<()>;

    fn set_repeat_y(&self, repeat: bool) -> Result<()>;

    /// Bind to a texture unit where the backend has them
    fn bind(&self, slot: u32);

    fn as_any(&self) -> &dyn Any;
}

/// Resource identity: both handles refer to the same texture object
pub fn same_texture(a: &Rc<dyn Texture2D>, b: &Rc<dyn Texture2D>) -> bool {
    std::ptr::eq(
        Rc::as_ptr(a) as *const (),
        Rc::as_ptr(b) as *const (),
    )
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
