/// OpenGL 2D textures - immutable RGBA8 storage, uploaded through a pixel unpack buffer

use car_engine::car::render::{ImageData, Texture2D, TextureFilter};
use car_engine::car::Result;
use car_engine::{engine_bail_warn, engine_err, engine_trace};
use glow::HasContext;
use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;

use crate::opengl_format::{filter_to_gl, wrap_to_gl};

/// Sized internal format of every texture
pub const TEXTURE_INTERNAL_FORMAT: u32 = glow::RGBA8;

pub struct OpenGlTexture2D {
    gl: Rc<glow::Context>,
    /// Replaced when an update changes the size
    texture: Cell<glow::Texture>,
    width: Cell<u32>,
    height: Cell<u32>,
    min_filter: Cell<TextureFilter>,
    mag_filter: Cell<TextureFilter>,
    repeat_x: Cell<bool>,
    repeat_y: Cell<bool>,
}

impl OpenGlTexture2D {
    pub(crate) fn new(gl: &Rc<glow::Context>, data: &ImageData) -> Result<Self> {
        validate_image(data)?;
        let texture = Self {
            gl: Rc::clone(gl),
            texture: Cell::new(allocate(gl, data.width, data.height)?),
            width: Cell::new(data.width),
            height: Cell::new(data.height),
            min_filter: Cell::new(TextureFilter::Linear),
            mag_filter: Cell::new(TextureFilter::Linear),
            repeat_x: Cell::new(false),
            repeat_y: Cell::new(false),
        };
        texture.upload(&data.pixels)?;
        texture.apply_sampler_state();
        engine_trace!("car::opengl", "Created {}x{} texture", data.width, data.height);
        Ok(texture)
    }

    fn upload(&self, pixels: &[u8]) -> Result<()> {
        let gl = &self.gl;
        unsafe {
            let staging = gl
                .create_buffer()
                .map_err(|e| engine_err!("car::opengl", "Failed to create pixel unpack buffer: {}", e))?;
            gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, Some(staging));
            gl.buffer_data_u8_slice(glow::PIXEL_UNPACK_BUFFER, pixels, glow::STREAM_DRAW);

            gl.bind_texture(glow::TEXTURE_2D, Some(self.texture.get()));
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                0,
                0,
                self.width.get() as i32,
                self.height.get() as i32,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::BufferOffset(0),
            );
            gl.bind_texture(glow::TEXTURE_2D, None);

            gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, None);
            gl.delete_buffer(staging);
        }
        Ok(())
    }

    fn apply_sampler_state(&self) {
        let gl = &self.gl;
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(self.texture.get()));
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, filter_to_gl(self.min_filter.get()));
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, filter_to_gl(self.mag_filter.get()));
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, wrap_to_gl(self.repeat_x.get()));
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, wrap_to_gl(self.repeat_y.get()));
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
    }
}

fn allocate(gl: &glow::Context, width: u32, height: u32) -> Result<glow::Texture> {
    unsafe {
        let texture = gl
            .create_texture()
            .map_err(|e| engine_err!("car::opengl", "Failed to create texture: {}", e))?;
        gl.bind_texture(glow::TEXTURE_2D, Some(texture));
        gl.tex_storage_2d(glow::TEXTURE_2D, 1, TEXTURE_INTERNAL_FORMAT, width as i32, height as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAX_LEVEL, 0);
        gl.bind_texture(glow::TEXTURE_2D, None);
        Ok(texture)
    }
}

fn validate_image(data: &ImageData) -> Result<()> {
    if data.width == 0 || data.height == 0 {
        engine_bail_warn!("car::opengl", "Texture size {}x{} is empty", data.width, data.height);
    }
    let expected = data.width as usize * data.height as usize * 4;
    if data.pixels.len() != expected {
        engine_bail_warn!(
            "car::opengl",
            "Texture {}x{} needs {} RGBA bytes, got {}",
            data.width,
            data.height,
            expected,
            data.pixels.len()
        );
    }
    Ok(())
}

impl Texture2D for OpenGlTexture2D {
    fn width(&self) -> u32 {
        self.width.get()
    }

    fn height(&self) -> u32 {
        self.height.get()
    }

    fn update_data(&self, data: &ImageData) -> Result<()> {
        validate_image(data)?;
        if (data.width, data.height) != (self.width.get(), self.height.get()) {
            // Immutable storage cannot change size: swap in a new texture name
            let texture = allocate(&self.gl, data.width, data.height)?;
            let old = self.texture.replace(texture);
            unsafe {
                self.gl.delete_texture(old);
            }
            self.width.set(data.width);
            self.height.set(data.height);
            self.apply_sampler_state();
        }
        self.upload(&data.pixels)
    }

    fn set_filters(&self, min: TextureFilter, mag: TextureFilter) -> Result<()> {
        self.min_filter.set(min);
        self.mag_filter.set(mag);
        self.apply_sampler_state();
        Ok(())
    }

    fn set_repeat_x(&self, repeat: bool) -> Result<()> {
        self.repeat_x.set(repeat);
        self.apply_sampler_state();
        Ok(())
    }

    fn set_repeat_y(&self, repeat: bool) -> Result<()> {
        self.repeat_y.set(repeat);
        self.apply_sampler_state();
        Ok(())
    }

    fn bind(&self, slot: u32) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + slot);
            self.gl.bind_texture(glow::TEXTURE_2D, Some(self.texture.get()));
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for OpenGlTexture2D {
    fn drop(&mut self) {
        unsafe {
            self.gl.delete_texture(self.texture.get());
        }
    }
}
