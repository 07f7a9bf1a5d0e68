/// OpenGL shader programs
///
/// Stages are GLSL text, compiled and linked when the shader is created.
/// OpenGL has no descriptor sets: the set index of an input is accepted
/// and ignored, and the binding number is the OpenGL binding point.
///
/// - uniform buffer at `binding` -> indexed UNIFORM_BUFFER point `binding`
/// - texture array at `binding` -> texture units `binding .. binding + n`
/// - storage buffer at `binding` -> indexed SHADER_STORAGE_BUFFER point `binding`
///
/// Push constants are emulated with a uniform block named `PushConstants`
/// that the program may declare; it is wired to [`PUSH_CONSTANT_BINDING`].

use car_engine::car::render::{
    validate_texture_array, BufferUsage, PipelineSpec, ScalarKind, Shader, ShaderInput, ShaderInputs,
    ShaderSource, Ssbo, Texture2D, UniformBuffer, VertexInput,
};
use car_engine::car::{Error, Result};
use car_engine::{engine_bail_warn, engine_debug, engine_err, engine_error, engine_warn, engine_warn_err};
use glow::HasContext;
use std::any::Any;
use std::cell::RefCell;
use std::ops::Range;
use std::rc::Rc;

use crate::opengl_buffer::GlBuffer;
use crate::opengl_texture::OpenGlTexture2D;
use crate::opengl_uniform_buffer::{OpenGlSsbo, OpenGlUniformBuffer};

/// Uniform binding point reserved for the `PushConstants` block
pub const PUSH_CONSTANT_BINDING: u32 = 15;

/// Size of the emulated push constant range, same as the Vulkan backend
pub const PUSH_CONSTANT_SIZE: u32 = 128;

/// Name of the uniform block that receives push constants
pub const PUSH_CONSTANT_BLOCK: &str = "PushConstants";

/// Texture units used by a texture array at `binding`
pub fn texture_units(binding: u32, count: usize, max_units: u32) -> Result<Range<u32>> {
    let end = binding as u64 + count as u64;
    if end > max_units as u64 {
        return Err(engine_warn_err!(
            "car::opengl",
            "{} textures at binding {} exceed the {} texture units",
            count,
            binding,
            max_units
        ));
    }
    Ok(binding..end as u32)
}

/// User uniform buffers cannot take the push constant binding point
pub fn check_uniform_binding(binding: u32) -> Result<()> {
    if binding == PUSH_CONSTANT_BINDING {
        return Err(engine_warn_err!(
            "car::opengl",
            "Uniform binding {} is reserved for the {} block",
            binding,
            PUSH_CONSTANT_BLOCK
        ));
    }
    Ok(())
}

/// Inputs taken by one active attribute of GL type `gl_type`
///
/// Matrices take one location per column, array elements one location
/// (or one run of columns) each.
pub fn gl_attribute_inputs(location: u32, gl_type: u32, array_size: u32) -> Result<Vec<VertexInput>> {
    let (kind, components, columns) = match gl_type {
        glow::FLOAT => (ScalarKind::Float, 1, 1),
        glow::FLOAT_VEC2 => (ScalarKind::Float, 2, 1),
        glow::FLOAT_VEC3 => (ScalarKind::Float, 3, 1),
        glow::FLOAT_VEC4 => (ScalarKind::Float, 4, 1),
        glow::INT => (ScalarKind::Int, 1, 1),
        glow::INT_VEC2 => (ScalarKind::Int, 2, 1),
        glow::INT_VEC3 => (ScalarKind::Int, 3, 1),
        glow::INT_VEC4 => (ScalarKind::Int, 4, 1),
        glow::UNSIGNED_INT => (ScalarKind::UInt, 1, 1),
        glow::UNSIGNED_INT_VEC2 => (ScalarKind::UInt, 2, 1),
        glow::UNSIGNED_INT_VEC3 => (ScalarKind::UInt, 3, 1),
        glow::UNSIGNED_INT_VEC4 => (ScalarKind::UInt, 4, 1),
        glow::FLOAT_MAT3 => (ScalarKind::Float, 3, 3),
        glow::FLOAT_MAT4 => (ScalarKind::Float, 4, 4),
        other => {
            return Err(engine_warn_err!(
                "car::opengl",
                "Unsupported vertex attribute type 0x{:x} at location {}",
                other,
                location
            ))
        }
    };
    let span = columns * array_size.max(1);
    Ok(VertexInput::columns(location, kind, components, span).collect())
}

/// Active vertex attributes of a linked program, sorted by location
unsafe fn active_vertex_inputs(gl: &glow::Context, program: glow::Program) -> Result<Vec<VertexInput>> {
    let mut inputs = Vec::new();
    for index in 0..gl.get_active_attributes(program) {
        let Some(attribute) = gl.get_active_attribute(program, index) else {
            continue;
        };
        // Built-ins such as gl_VertexID have no location
        if attribute.name.starts_with("gl_") {
            continue;
        }
        let Some(location) = gl.get_attrib_location(program, &attribute.name) else {
            continue;
        };
        inputs.extend(gl_attribute_inputs(location, attribute.atype, attribute.size.max(1) as u32)?);
    }
    inputs.sort_by_key(|input| input.location);
    Ok(inputs)
}

/// Stage bytes as GLSL text
pub fn glsl_text(source: &ShaderSource) -> Result<String> {
    let bytes = source.read()?;
    String::from_utf8(bytes)
        .map_err(|_| Error::Format(format!("{} is not GLSL text (invalid UTF-8)", source.describe())))
}

pub struct OpenGlShader {
    gl: Rc<glow::Context>,
    program: glow::Program,
    spec: PipelineSpec,
    inputs: RefCell<ShaderInputs>,
    vertex_inputs: Vec<VertexInput>,
    /// Backing store of the `PushConstants` block, if the program declares one
    push_constants: Option<GlBuffer>,
    max_texture_units: u32,
}

impl OpenGlShader {
    pub(crate) fn new(
        gl: &Rc<glow::Context>,
        vertex: &ShaderSource,
        fragment: &ShaderSource,
        spec: PipelineSpec,
    ) -> Result<Self> {
        for (stage, entry) in [("vertex", &spec.vertex_entry), ("fragment", &spec.fragment_entry)] {
            if entry != "main" {
                engine_warn!(
                    "car::opengl",
                    "GLSL {} stage always enters at main(); entry point '{}' is ignored",
                    stage,
                    entry
                );
            }
        }

        let vertex_text = glsl_text(vertex)?;
        let fragment_text = glsl_text(fragment)?;

        let program = unsafe {
            let vs = compile_stage(gl, glow::VERTEX_SHADER, &vertex_text, vertex)?;
            let fs = match compile_stage(gl, glow::FRAGMENT_SHADER, &fragment_text, fragment) {
                Ok(fs) => fs,
                Err(e) => {
                    gl.delete_shader(vs);
                    return Err(e);
                }
            };
            let linked = link_program(gl, vs, fs);
            gl.delete_shader(vs);
            gl.delete_shader(fs);
            linked?
        };

        let vertex_inputs = match unsafe { active_vertex_inputs(gl, program) } {
            Ok(vertex_inputs) => vertex_inputs,
            Err(e) => {
                unsafe {
                    gl.delete_program(program);
                }
                return Err(e);
            }
        };

        let push_constants = match unsafe { gl.get_uniform_block_index(program, PUSH_CONSTANT_BLOCK) } {
            Some(index) => {
                unsafe {
                    gl.uniform_block_binding(program, index, PUSH_CONSTANT_BINDING);
                }
                Some(GlBuffer::new(gl, PUSH_CONSTANT_SIZE as usize, BufferUsage::DynamicDraw)?)
            }
            None => None,
        };

        let max_texture_units =
            unsafe { gl.get_parameter_i32(glow::MAX_COMBINED_TEXTURE_IMAGE_UNITS) }.max(16) as u32;

        engine_debug!(
            "car::opengl",
            "Linked program from {} + {}{}",
            vertex.describe(),
            fragment.describe(),
            if push_constants.is_some() { " (push constants)" } else { "" }
        );

        Ok(Self {
            gl: Rc::clone(gl),
            program,
            spec,
            inputs: RefCell::new(ShaderInputs::default()),
            vertex_inputs,
            push_constants,
            max_texture_units,
        })
    }

    /// Make the program current and attach every input to its binding point
    pub(crate) fn bind(&self) {
        let gl = &self.gl;
        unsafe {
            gl.use_program(Some(self.program));
        }
        for (&(_, binding), input) in self.inputs.borrow().iter_sorted() {
            match input {
                ShaderInput::UniformBuffer(buffer) => {
                    if let Some(buffer) = buffer.as_any().downcast_ref::<OpenGlUniformBuffer>() {
                        buffer.bind_at(binding);
                    }
                }
                ShaderInput::Textures(textures) => {
                    for (unit, texture) in (binding..).zip(textures) {
                        texture.bind(unit);
                    }
                }
                ShaderInput::StorageBuffer(buffer) => buffer.bind(binding),
            }
        }
        if let Some(block) = &self.push_constants {
            unsafe {
                gl.bind_buffer_base(glow::UNIFORM_BUFFER, PUSH_CONSTANT_BINDING, Some(block.handle()));
            }
        }
        unsafe {
            gl.active_texture(glow::TEXTURE0);
        }
    }

    /// Write into the `PushConstants` block
    pub(crate) fn push_constants(&self, data: &[u8], offset: u32) -> Result<()> {
        if offset as usize + data.len() > PUSH_CONSTANT_SIZE as usize {
            engine_bail_warn!(
                "car::opengl",
                "Push constant write of {} bytes at {} exceeds the {} byte range",
                data.len(),
                offset,
                PUSH_CONSTANT_SIZE
            );
        }
        let Some(block) = &self.push_constants else {
            engine_bail_warn!("car::opengl", "Shader declares no {} uniform block", PUSH_CONSTANT_BLOCK);
        };
        block.write(offset as usize, data)
    }
}

unsafe fn compile_stage(gl: &glow::Context, stage: u32, text: &str, source: &ShaderSource) -> Result<glow::Shader> {
    let shader = gl
        .create_shader(stage)
        .map_err(|e| engine_err!("car::opengl", "Failed to create shader object: {}", e))?;
    gl.shader_source(shader, text);
    gl.compile_shader(shader);
    if !gl.get_shader_compile_status(shader) {
        let log = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        engine_error!("car::opengl", "Failed to compile {}:\n{}", source.describe(), log);
        return Err(Error::InvalidResource(format!(
            "GLSL compile failed for {}: {}",
            source.describe(),
            log.trim()
        )));
    }
    Ok(shader)
}

unsafe fn link_program(gl: &glow::Context, vs: glow::Shader, fs: glow::Shader) -> Result<glow::Program> {
    let program = gl
        .create_program()
        .map_err(|e| engine_err!("car::opengl", "Failed to create program object: {}", e))?;
    gl.attach_shader(program, vs);
    gl.attach_shader(program, fs);
    gl.link_program(program);
    gl.detach_shader(program, vs);
    gl.detach_shader(program, fs);
    if !gl.get_program_link_status(program) {
        let log = gl.get_program_info_log(program);
        gl.delete_program(program);
        engine_error!("car::opengl", "Failed to link program:\n{}", log);
        return Err(Error::InvalidResource(format!("GLSL link failed: {}", log.trim())));
    }
    Ok(program)
}

impl Shader for OpenGlShader {
    fn pipeline_spec(&self) -> &PipelineSpec {
        &self.spec
    }

    fn vertex_inputs(&self) -> &[VertexInput] {
        &self.vertex_inputs
    }

    fn set_uniform_buffer(&self, set: u32, binding: u32, buffer: Rc<dyn UniformBuffer>) -> Result<()> {
        check_uniform_binding(binding)?;
        if buffer.as_any().downcast_ref::<OpenGlUniformBuffer>().is_none() {
            engine_bail_warn!("car::opengl", "Uniform buffer was not created by the OpenGL backend");
        }
        self.inputs
            .borrow_mut()
            .set(set, binding, ShaderInput::UniformBuffer(buffer));
        Ok(())
    }

    fn set_textures(&self, set: u32, binding: u32, textures: &[Rc<dyn Texture2D>]) -> Result<()> {
        validate_texture_array(textures)?;
        texture_units(binding, textures.len(), self.max_texture_units)?;
        if textures
            .iter()
            .any(|t| t.as_any().downcast_ref::<OpenGlTexture2D>().is_none())
        {
            engine_bail_warn!("car::opengl", "Texture was not created by the OpenGL backend");
        }
        self.inputs
            .borrow_mut()
            .set(set, binding, ShaderInput::Textures(textures.to_vec()));
        Ok(())
    }

    fn set_storage_buffer(&self, set: u32, binding: u32, buffer: Rc<dyn Ssbo>) -> Result<()> {
        if buffer.as_any().downcast_ref::<OpenGlSsbo>().is_none() {
            engine_bail_warn!("car::opengl", "Storage buffer was not created by the OpenGL backend");
        }
        self.inputs
            .borrow_mut()
            .set(set, binding, ShaderInput::StorageBuffer(buffer));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for OpenGlShader {
    fn drop(&mut self) {
        unsafe {
            self.gl.delete_program(self.program);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_units_follow_binding() {
        assert_eq!(texture_units(0, 8, 16).unwrap(), 0..8);
        assert_eq!(texture_units(4, 2, 16).unwrap(), 4..6);
        assert_eq!(texture_units(8, 8, 16).unwrap(), 8..16, "last unit is usable");
    }

    #[test]
    fn test_texture_units_overflow() {
        assert!(matches!(texture_units(10, 8, 16), Err(Error::UsageError(_))));
    }

    #[test]
    fn test_push_constant_binding_is_reserved() {
        assert!(check_uniform_binding(0).is_ok());
        assert!(check_uniform_binding(PUSH_CONSTANT_BINDING - 1).is_ok());
        assert!(matches!(check_uniform_binding(PUSH_CONSTANT_BINDING), Err(Error::UsageError(_))));
    }

    #[test]
    fn test_attribute_inputs_vectors() {
        assert_eq!(
            gl_attribute_inputs(1, glow::FLOAT_VEC2, 1).unwrap(),
            vec![VertexInput::new(1, ScalarKind::Float, 2)]
        );
        assert_eq!(
            gl_attribute_inputs(3, glow::UNSIGNED_INT, 1).unwrap(),
            vec![VertexInput::new(3, ScalarKind::UInt, 1)]
        );
        assert_eq!(
            gl_attribute_inputs(0, glow::INT_VEC4, 1).unwrap(),
            vec![VertexInput::new(0, ScalarKind::Int, 4)]
        );
    }

    #[test]
    fn test_attribute_inputs_matrix_takes_a_location_per_column() {
        let inputs = gl_attribute_inputs(4, glow::FLOAT_MAT4, 1).unwrap();
        let locations: Vec<u32> = inputs.iter().map(|input| input.location).collect();
        assert_eq!(locations, vec![4, 5, 6, 7]);
        assert!(inputs.iter().all(|input| input.components == 4));
    }

    #[test]
    fn test_attribute_inputs_array() {
        let inputs = gl_attribute_inputs(2, glow::FLOAT_VEC3, 2).unwrap();
        assert_eq!(
            inputs,
            vec![VertexInput::new(2, ScalarKind::Float, 3), VertexInput::new(3, ScalarKind::Float, 3)]
        );
    }

    #[test]
    fn test_attribute_inputs_unsupported_type() {
        assert!(matches!(gl_attribute_inputs(0, glow::DOUBLE, 1), Err(Error::UsageError(_))));
    }

    #[test]
    fn test_glsl_text_from_bytes() {
        let source = ShaderSource::Bytes(b"#version 450 core\nvoid main() {}\n".to_vec());
        assert!(glsl_text(&source).unwrap().starts_with("#version 450"));
    }

    #[test]
    fn test_glsl_text_rejects_binary() {
        // SPIR-V magic, little endian
        let source = ShaderSource::Bytes(vec![0x03, 0x02, 0x23, 0x07, 0xff, 0xfe, 0x00, 0x00]);
        assert!(matches!(glsl_text(&source), Err(Error::Format(_))));
    }

    #[test]
    fn test_glsl_text_missing_file() {
        let source = ShaderSource::File("definitely/not/here.vert".into());
        assert!(matches!(glsl_text(&source), Err(Error::Io(_))));
    }
}
