/// Shader programs: creation descriptors, fixed pipeline state and bound inputs

use std::any::Any;
use std::path::PathBuf;
use std::rc::Rc;

use bitflags::bitflags;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::renderer::buffer::{Ssbo, UniformBuffer};
use crate::renderer::layout::VertexInput;
use crate::renderer::texture::Texture2D;

/// Maximum number of textures bound to one sampler array
pub const MAX_TEXTURE_SLOTS: usize = 8;

bitflags! {
    /// Shader stages a push constant or descriptor is visible to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
    }
}

/// Where a stage's code comes from
///
/// The OpenGL backend expects GLSL text. The Vulkan backend expects a
/// `.crss` container or raw SPIR-V.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderSource {
    File(PathBuf),
    Bytes(Vec<u8>),
}

impl ShaderSource {
    pub fn read(&self) -> Result<Vec<u8>> {
        match self {
            ShaderSource::File(path) => std::fs::read(path)
                .map_err(|e| Error::Io(format!("{}: {}", path.display(), e))),
            ShaderSource::Bytes(bytes) => Ok(bytes.clone()),
        }
    }

    /// Human-readable origin for log messages
    pub fn describe(&self) -> String {
        match self {
            ShaderSource::File(path) => path.display().to_string(),
            ShaderSource::Bytes(bytes) => format!("<{} bytes in memory>", bytes.len()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    TriangleFan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolygonMode {
    Fill,
    Line,
    Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
    FrontAndBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexInputRate {
    Vertex,
    Instance,
}

/// Fixed-function state baked into a shader's pipeline
///
/// Immutable for the life of the shader; different state means a new shader.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSpec {
    pub vertex_entry: String,
    pub fragment_entry: String,
    pub input_rate: VertexInputRate,
    pub topology: PrimitiveTopology,
    pub primitive_restart: bool,
    pub polygon_mode: PolygonMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub min_depth: f32,
    pub max_depth: f32,
    pub alpha_blending: bool,
}

impl Default for PipelineSpec {
    fn default() -> Self {
        Self {
            vertex_entry: "main".to_string(),
            fragment_entry: "main".to_string(),
            input_rate: VertexInputRate::Vertex,
            topology: PrimitiveTopology::TriangleList,
            primitive_restart: false,
            polygon_mode: PolygonMode::Fill,
            cull_mode: CullMode::None,
            front_face: FrontFace::CounterClockwise,
            min_depth: 0.0,
            max_depth: 1.0,
            alpha_blending: true,
        }
    }
}

/// Everything needed to create a shader
#[derive(Debug, Clone)]
pub struct ShaderDesc {
    pub vertex: ShaderSource,
    pub fragment: ShaderSource,
    pub spec: PipelineSpec,
}

impl ShaderDesc {
    pub fn new(vertex: ShaderSource, fragment: ShaderSource) -> Self {
        Self { vertex, fragment, spec: PipelineSpec::default() }
    }

    pub fn with_spec(mut self, spec: PipelineSpec) -> Self {
        self.spec = spec;
        self
    }
}

/// A resource attached to a shader binding
#[derive(Clone)]
pub enum ShaderInput {
    UniformBuffer(Rc<dyn UniformBuffer>),
    Textures(Vec<Rc<dyn Texture2D>>),
    StorageBuffer(Rc<dyn Ssbo>),
}

/// Sticky (set, binding) -> resource table kept by every shader
///
/// Inputs stay attached until replaced and are read when the shader is
/// bound for a draw, so each draw sees the inputs current at that moment.
#[derive(Clone, Default)]
pub struct ShaderInputs {
    inputs: FxHashMap<(u32, u32), ShaderInput>,
}

impl ShaderInputs {
    pub fn set(&mut self, set: u32, binding: u32, input: ShaderInput) {
        self.inputs.insert((set, binding), input);
    }

    pub fn get(&self, set: u32, binding: u32) -> Option<&ShaderInput> {
        self.inputs.get(&(set, binding))
    }

    /// Inputs sorted by (set, binding)
    pub fn iter_sorted(&self) -> Vec<(&(u32, u32), &ShaderInput)> {
        let mut entries: Vec<_> = self.inputs.iter().collect();
        entries.sort_by_key(|(key, _)| **key);
        entries
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// Check a texture array before it is attached
pub fn validate_texture_array(textures: &[Rc<dyn Texture2D>]) -> Result<()> {
    if textures.is_empty() {
        crate::engine_bail_warn!("car::Shader", "set_textures called with no textures");
    }
    if textures.len() > MAX_TEXTURE_SLOTS {
        crate::engine_bail_warn!(
            "car::Shader",
            "{} textures exceed the {} sampler slots",
            textures.len(),
            MAX_TEXTURE_SLOTS
        );
    }
    Ok(())
}

/// A compiled shader program with fixed pipeline state
pub trait Shader {
    fn pipeline_spec(&self) -> &PipelineSpec;

    /// Attribute locations the vertex stage reads, checked against the
    /// vertex buffer layout when a vertex array is created
    fn vertex_inputs(&self) -> &[VertexInput];

    fn set_uniform_buffer(&self, set: u32, binding: u32, buffer: Rc<dyn UniformBuffer>) -> Result<()>;

    /// Attach up to [`MAX_TEXTURE_SLOTS`] textures to a sampler array, slot `i` = `textures[i]`
    fn set_textures(&self, set: u32, binding: u32, textures: &[Rc<dyn Texture2D>]) -> Result<()>;

    fn set_storage_buffer(&self, set: u32, binding: u32, buffer: Rc<dyn Ssbo>) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
#[path = "shader_tests.rs"]
mod tests;
