/// In-memory backend for tests
///
/// Implements every resource trait, `GraphicsContext` and `RendererApi`
/// without a GPU. Commands are appended to a shared [`CommandLog`] so
/// tests can assert on what the renderer issued.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::renderer::buffer::{
    compose_grown, plan_update, BufferType, BufferUsage, IndexBuffer, IndexData, Ssbo, UniformBuffer, UpdatePlan,
    VertexBuffer,
};
use crate::renderer::color::Color;
use crate::renderer::context::{Backend, GraphicsContext};
use crate::renderer::layout::{BufferLayout, ScalarKind, VertexInput};
use crate::renderer::renderer::{ClipSpace, RendererApi, Scissor, Viewport};
use crate::renderer::shader::{
    validate_texture_array, PipelineSpec, Shader, ShaderDesc, ShaderInput, ShaderInputs, ShaderSource, ShaderStages,
};
use crate::renderer::texture::{ImageData, Texture2D, TextureFilter};
use crate::renderer::vertex_array::VertexArray;
use crate::resource_paths::ResourcePaths;

pub type CommandLog = Rc<RefCell<Vec<String>>>;

fn apply_update(bytes: &RefCell<Vec<u8>>, data: &[u8], offset: usize, usage: BufferUsage) -> Result<()> {
    let mut bytes = bytes.borrow_mut();
    match plan_update(bytes.len(), offset, data.len(), usage)? {
        UpdatePlan::InPlace => bytes[offset..offset + data.len()].copy_from_slice(data),
        UpdatePlan::Recreate { capacity } => {
            *bytes = vec![0; capacity];
            bytes[..data.len()].copy_from_slice(data);
        }
        UpdatePlan::Grow { capacity, preserved } => {
            *bytes = compose_grown(&bytes, preserved, offset, data, capacity);
        }
    }
    Ok(())
}

// ============================================================================
// BUFFERS
// ============================================================================

pub struct MockVertexBuffer {
    bytes: RefCell<Vec<u8>>,
    usage: BufferUsage,
    layout: BufferLayout,
    pub uploads: Cell<u32>,
}

impl MockVertexBuffer {
    pub fn new(size: usize, usage: BufferUsage, layout: BufferLayout) -> Self {
        Self { bytes: RefCell::new(vec![0; size]), usage, layout, uploads: Cell::new(0) }
    }
}

impl VertexBuffer for MockVertexBuffer {
    fn update_data(&self, data: &[u8], offset: usize) -> Result<()> {
        apply_update(&self.bytes, data, offset, self.usage)?;
        self.uploads.set(self.uploads.get() + 1);
        Ok(())
    }

    fn read_data(&self) -> Result<Vec<u8>> {
        Ok(self.bytes.borrow().clone())
    }

    fn size(&self) -> usize {
        self.bytes.borrow().len()
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn layout(&self) -> &BufferLayout {
        &self.layout
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockIndexBuffer {
    bytes: RefCell<Vec<u8>>,
    index_type: BufferType,
    usage: BufferUsage,
}

impl MockIndexBuffer {
    pub fn new(count: u32, index_type: BufferType, usage: BufferUsage) -> Self {
        Self {
            bytes: RefCell::new(vec![0; count as usize * index_type.size()]),
            index_type,
            usage,
        }
    }
}

impl IndexBuffer for MockIndexBuffer {
    fn update_data(&self, data: IndexData<'_>, offset: usize) -> Result<()> {
        if data.index_type() != self.index_type {
            return Err(Error::UsageError(format!(
                "index data {:?} written to {:?} buffer",
                data.index_type(),
                self.index_type
            )));
        }
        apply_update(&self.bytes, data.as_bytes(), offset * self.index_type.size(), self.usage)
    }

    fn read_data(&self) -> Result<Vec<u8>> {
        Ok(self.bytes.borrow().clone())
    }

    fn count(&self) -> u32 {
        (self.bytes.borrow().len() / self.index_type.size()) as u32
    }

    fn index_type(&self) -> BufferType {
        self.index_type
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockUniformBuffer {
    bytes: RefCell<Vec<u8>>,
    binding: u32,
}

impl MockUniformBuffer {
    pub fn new(size: usize, binding: u32) -> Self {
        Self { bytes: RefCell::new(vec![0; size]), binding }
    }
}

impl UniformBuffer for MockUniformBuffer {
    fn set_data(&self, data: &[u8], offset: usize) -> Result<()> {
        let mut bytes = self.bytes.borrow_mut();
        if offset + data.len() > bytes.len() {
            return Err(Error::UsageError("uniform write out of range".to_string()));
        }
        bytes[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read_data(&self) -> Result<Vec<u8>> {
        Ok(self.bytes.borrow().clone())
    }

    fn size(&self) -> usize {
        self.bytes.borrow().len()
    }

    fn binding(&self) -> u32 {
        self.binding
    }

    fn usage(&self) -> BufferUsage {
        BufferUsage::DynamicDraw
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockSsbo {
    bytes: RefCell<Vec<u8>>,
    pub bound: Cell<Option<u32>>,
}

impl MockSsbo {
    pub fn new(size: usize) -> Self {
        Self { bytes: RefCell::new(vec![0; size]), bound: Cell::new(None) }
    }
}

impl Ssbo for MockSsbo {
    fn update_buffer(&self, data: &[u8]) -> Result<()> {
        apply_update(&self.bytes, data, 0, BufferUsage::DynamicDraw)
    }

    fn read_data(&self) -> Result<Vec<u8>> {
        Ok(self.bytes.borrow().clone())
    }

    fn size(&self) -> usize {
        self.bytes.borrow().len()
    }

    fn bind(&self, binding: u32) {
        self.bound.set(Some(binding));
    }

    fn unbind(&self) {
        self.bound.set(None);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// TEXTURE
// ============================================================================

pub struct MockTexture {
    width: Cell<u32>,
    height: Cell<u32>,
    pub filters: Cell<(TextureFilter, TextureFilter)>,
    pub repeat: Cell<(bool, bool)>,
}

impl MockTexture {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: Cell::new(width),
            height: Cell::new(height),
            filters: Cell::new((TextureFilter::Linear, TextureFilter::Linear)),
            repeat: Cell::new((false, false)),
        }
    }
}

impl Texture2D for MockTexture {
    fn width(&self) -> u32 {
        self.width.get()
    }

    fn height(&self) -> u32 {
        self.height.get()
    }

    fn update_data(&self, image: &ImageData) -> Result<()> {
        self.width.set(image.width);
        self.height.set(image.height);
        Ok(())
    }

    fn set_filters(&self, min: TextureFilter, mag: TextureFilter) -> Result<()> {
        self.filters.set((min, mag));
        Ok(())
    }

    fn set_repeat_x(&self, repeat: bool) -> Result<()> {
        self.repeat.set((repeat, self.repeat.get().1));
        Ok(())
    }

    fn set_repeat_y(&self, repeat: bool) -> Result<()> {
        self.repeat.set((self.repeat.get().0, repeat));
        Ok(())
    }

    fn bind(&self, _slot: u32) {}

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// SHADER AND VERTEX ARRAY
// ============================================================================

/// Vertex inputs declared in a mock shader's text
///
/// Tokens of the form `in<location>:<f|i|u><components>` declare an input,
/// e.g. `in2:f3` is a vec3 at location 2. Anything else is ignored.
pub fn mock_vertex_inputs(source: &[u8]) -> Vec<VertexInput> {
    let text = String::from_utf8_lossy(source);
    text.split_whitespace()
        .filter_map(|token| {
            let (location, ty) = token.strip_prefix("in")?.split_once(':')?;
            let kind = match ty.chars().next()? {
                'f' => ScalarKind::Float,
                'i' => ScalarKind::Int,
                'u' => ScalarKind::UInt,
                _ => return None,
            };
            Some(VertexInput::new(location.parse().ok()?, kind, ty[1..].parse().ok()?))
        })
        .collect()
}

pub struct MockShader {
    spec: PipelineSpec,
    vertex_inputs: Vec<VertexInput>,
    pub inputs: RefCell<ShaderInputs>,
    log: CommandLog,
}

impl MockShader {
    pub fn new(spec: PipelineSpec, log: CommandLog) -> Self {
        Self::with_vertex_inputs(spec, Vec::new(), log)
    }

    pub fn with_vertex_inputs(spec: PipelineSpec, vertex_inputs: Vec<VertexInput>, log: CommandLog) -> Self {
        Self { spec, vertex_inputs, inputs: RefCell::new(ShaderInputs::default()), log }
    }
}

impl Shader for MockShader {
    fn pipeline_spec(&self) -> &PipelineSpec {
        &self.spec
    }

    fn vertex_inputs(&self) -> &[VertexInput] {
        &self.vertex_inputs
    }

    fn set_uniform_buffer(&self, set: u32, binding: u32, buffer: Rc<dyn UniformBuffer>) -> Result<()> {
        self.log.borrow_mut().push(format!("uniform {}:{}", set, binding));
        self.inputs.borrow_mut().set(set, binding, ShaderInput::UniformBuffer(buffer));
        Ok(())
    }

    fn set_textures(&self, set: u32, binding: u32, textures: &[Rc<dyn Texture2D>]) -> Result<()> {
        validate_texture_array(textures)?;
        self.log
            .borrow_mut()
            .push(format!("textures {}:{} x{}", set, binding, textures.len()));
        self.inputs
            .borrow_mut()
            .set(set, binding, ShaderInput::Textures(textures.to_vec()));
        Ok(())
    }

    fn set_storage_buffer(&self, set: u32, binding: u32, buffer: Rc<dyn Ssbo>) -> Result<()> {
        self.log.borrow_mut().push(format!("storage {}:{}", set, binding));
        self.inputs.borrow_mut().set(set, binding, ShaderInput::StorageBuffer(buffer));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockVertexArray {
    vertex_buffer: Rc<dyn VertexBuffer>,
    index_buffer: Rc<dyn IndexBuffer>,
    shader: Rc<dyn Shader>,
}

impl VertexArray for MockVertexArray {
    fn vertex_buffer(&self) -> &Rc<dyn VertexBuffer> {
        &self.vertex_buffer
    }

    fn index_buffer(&self) -> &Rc<dyn IndexBuffer> {
        &self.index_buffer
    }

    fn shader(&self) -> &Rc<dyn Shader> {
        &self.shader
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// RENDERER API
// ============================================================================

pub struct MockRendererApi {
    log: CommandLog,
    clip_space: ClipSpace,
    /// Number of upcoming frames to report as skipped
    pub skip_frames: Cell<u32>,
}

impl MockRendererApi {
    pub fn new(log: CommandLog, clip_space: ClipSpace) -> Self {
        Self { log, clip_space, skip_frames: Cell::new(0) }
    }

    fn push(&self, entry: String) {
        self.log.borrow_mut().push(entry);
    }
}

impl RendererApi for MockRendererApi {
    fn init(&self) -> Result<()> {
        self.push("init".to_string());
        Ok(())
    }

    fn shutdown(&self) {
        self.push("shutdown".to_string());
    }

    fn begin_recording(&self) -> Result<bool> {
        if self.skip_frames.get() > 0 {
            self.skip_frames.set(self.skip_frames.get() - 1);
            self.push("skip".to_string());
            return Ok(false);
        }
        self.push("begin".to_string());
        Ok(true)
    }

    fn end_recording(&self) -> Result<()> {
        self.push("end".to_string());
        Ok(())
    }

    fn set_clear_color(&self, color: Color) {
        self.push(format!("clear_color {} {} {} {}", color.r, color.g, color.b, color.a));
    }

    fn clear(&self) {
        self.push("clear".to_string());
    }

    fn set_viewport(&self, viewport: Viewport) {
        self.push(format!("viewport {} {} {} {}", viewport.x, viewport.y, viewport.width, viewport.height));
    }

    fn set_scissor(&self, scissor: Scissor) {
        self.push(format!("scissor {} {} {} {}", scissor.x, scissor.y, scissor.width, scissor.height));
    }

    fn draw_indexed(&self, _vertex_array: &Rc<dyn VertexArray>, index_count: u32) -> Result<()> {
        self.push(format!("draw {}", index_count));
        Ok(())
    }

    fn push_constant(
        &self,
        _vertex_array: &Rc<dyn VertexArray>,
        stages: ShaderStages,
        data: &[u8],
        offset: u32,
    ) -> Result<()> {
        self.push(format!("push {:?} {}@{}", stages, data.len(), offset));
        Ok(())
    }

    fn set_blending(&self, enabled: bool) {
        self.push(format!("blending {}", enabled));
    }

    fn set_depth_test(&self, enabled: bool) {
        self.push(format!("depth {}", enabled));
    }

    fn clip_space(&self) -> ClipSpace {
        self.clip_space
    }
}

// ============================================================================
// CONTEXT
// ============================================================================

pub struct MockContext {
    pub log: CommandLog,
    pub clip_space: ClipSpace,
    size: Cell<(u32, u32)>,
    frame: Cell<usize>,
    frames_in_flight: usize,
    paths: ResourcePaths,
}

impl MockContext {
    pub fn new(width: u32, height: u32) -> Rc<Self> {
        Self::with_clip_space(width, height, ClipSpace::YUp)
    }

    pub fn with_clip_space(width: u32, height: u32, clip_space: ClipSpace) -> Rc<Self> {
        Rc::new(Self {
            log: Rc::new(RefCell::new(Vec::new())),
            clip_space,
            size: Cell::new((width, height)),
            frame: Cell::new(0),
            frames_in_flight: 2,
            paths: ResourcePaths::new("mock"),
        })
    }

    /// Log entries starting with `prefix`
    pub fn entries(&self, prefix: &str) -> Vec<String> {
        self.log
            .borrow()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }
}

impl GraphicsContext for MockContext {
    fn backend(&self) -> Backend {
        match self.clip_space {
            ClipSpace::YUp => Backend::OpenGl,
            ClipSpace::YDown => Backend::Vulkan,
        }
    }

    fn create_vertex_buffer(
        &self,
        data: Option<&[u8]>,
        size: usize,
        usage: BufferUsage,
        layout: BufferLayout,
    ) -> Result<Rc<dyn VertexBuffer>> {
        let buffer = MockVertexBuffer::new(size, usage, layout);
        if let Some(data) = data {
            buffer.update_data(data, 0)?;
        }
        Ok(Rc::new(buffer))
    }

    fn create_index_buffer(
        &self,
        data: Option<IndexData<'_>>,
        count: u32,
        index_type: BufferType,
        usage: BufferUsage,
    ) -> Result<Rc<dyn IndexBuffer>> {
        if !index_type.is_index_type() {
            return Err(Error::InvalidResource(format!("{:?} is not an index type", index_type)));
        }
        let buffer = MockIndexBuffer::new(count, index_type, usage);
        if let Some(data) = data {
            buffer.update_data(data, 0)?;
        }
        Ok(Rc::new(buffer))
    }

    fn create_uniform_buffer(&self, size: usize, binding: u32, _usage: BufferUsage) -> Result<Rc<dyn UniformBuffer>> {
        Ok(Rc::new(MockUniformBuffer::new(size, binding)))
    }

    fn create_ssbo(&self, data: Option<&[u8]>, size: usize, _usage: BufferUsage) -> Result<Rc<dyn Ssbo>> {
        let ssbo = MockSsbo::new(size);
        if let Some(data) = data {
            ssbo.update_buffer(data)?;
        }
        Ok(Rc::new(ssbo))
    }

    fn create_texture(&self, image: &ImageData) -> Result<Rc<dyn Texture2D>> {
        Ok(Rc::new(MockTexture::new(image.width, image.height)))
    }

    fn create_shader(&self, desc: &ShaderDesc) -> Result<Rc<dyn Shader>> {
        self.log
            .borrow_mut()
            .push(format!("shader {}", desc.vertex.describe()));
        let vertex_inputs = match &desc.vertex {
            ShaderSource::Bytes(bytes) => mock_vertex_inputs(bytes),
            ShaderSource::File(_) => Vec::new(),
        };
        Ok(Rc::new(MockShader::with_vertex_inputs(desc.spec.clone(), vertex_inputs, self.log.clone())))
    }

    fn create_vertex_array(
        &self,
        vertex_buffer: Rc<dyn VertexBuffer>,
        index_buffer: Rc<dyn IndexBuffer>,
        shader: Rc<dyn Shader>,
    ) -> Result<Rc<dyn VertexArray>> {
        vertex_buffer.layout().check_vertex_inputs(shader.vertex_inputs())?;
        Ok(Rc::new(MockVertexArray { vertex_buffer, index_buffer, shader }))
    }

    fn create_renderer_api(self: Rc<Self>) -> Result<Box<dyn RendererApi>> {
        Ok(Box::new(MockRendererApi::new(self.log.clone(), self.clip_space)))
    }

    fn renderer2d_shader(&self) -> Result<ShaderDesc> {
        Ok(ShaderDesc::new(
            ShaderSource::Bytes(b"mock vertex in0:f2 in1:f2 in2:f3 in3:u1".to_vec()),
            ShaderSource::Bytes(b"mock fragment".to_vec()),
        ))
    }

    fn swap_buffers(&self) -> Result<()> {
        self.log.borrow_mut().push("swap".to_string());
        self.frame.set((self.frame.get() + 1) % self.frames_in_flight);
        Ok(())
    }

    fn resize(&self, width: u32, height: u32) -> Result<()> {
        self.size.set((width, height));
        Ok(())
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.size.get()
    }

    fn max_frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    fn current_frame_index(&self) -> usize {
        self.frame.get()
    }

    fn resource_paths(&self) -> &ResourcePaths {
        &self.paths
    }
}

#[path = "mock_backend_tests.rs"]
mod tests;
