/// Vulkan shader - SPIR-V modules, descriptor layout and the baked pipeline
///
/// Each stage is loaded from a `.crss` container or from raw SPIR-V, whose
/// descriptor sets are reflected with spirq. The two stages' sets are merged
/// into one pipeline layout with a single 128-byte push constant range.
///
/// The graphics pipeline itself needs the vertex layout, so it is built when
/// the first vertex array is created with this shader. Later vertex arrays
/// must use a compatible layout.

use ash::vk;
use car_engine::car::render::{
    validate_texture_array, BufferLayout, CompiledShader, Descriptor, DescriptorType, PipelineSpec, ScalarKind,
    Shader, ShaderInput, ShaderInputs, ShaderSource, ShaderStages, Ssbo, Texture2D, UniformBuffer, VertexInput,
    MAX_TEXTURE_SLOTS,
};
use car_engine::car::{Error, Result};
use car_engine::{engine_bail, engine_bail_warn, engine_debug, engine_err, engine_warn_err};
use std::any::Any;
use std::cell::RefCell;
use std::ffi::CString;
use std::rc::Rc;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{
    cull_mode_to_vk, descriptor_type_to_vk, front_face_to_vk, input_rate_to_vk, polygon_mode_to_vk,
    stages_to_vk, topology_to_vk, vertex_attributes,
};
use crate::vulkan_frame::DescriptorAllocator;
use crate::vulkan_texture::VulkanTexture2D;
use crate::vulkan_uniform_buffer::{VulkanSsbo, VulkanUniformBuffer};

/// Size of the push constant range every pipeline declares
pub const PUSH_CONSTANT_SIZE: u32 = 128;

/// Stages the push constant range is visible to; pushes must use the same flags
pub const PUSH_CONSTANT_STAGES: vk::ShaderStageFlags =
    vk::ShaderStageFlags::from_raw(vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw());

// ============================================================================
// Stage loading and reflection
// ============================================================================

/// Load one stage: raw SPIR-V is reflected, anything else must be `.crss`
pub fn load_stage(source: &ShaderSource) -> Result<CompiledShader> {
    let bytes = source.read()?;
    if car_engine::car::render::is_spirv(&bytes) {
        let sets = reflect_descriptor_sets(&bytes)?;
        return Ok(CompiledShader { sets, code: bytes });
    }
    CompiledShader::from_bytes(&bytes).map_err(|e| match e {
        Error::Format(message) => Error::Format(format!("{}: {}", source.describe(), message)),
        other => other,
    })
}

/// Visit every variable of every entry point as `(entry point name, variable)`
fn reflect_variables(
    spirv: &[u8],
    mut visit: impl FnMut(&str, &spirq::var::Variable) -> Result<()>,
) -> Result<()> {
    if spirv.len() % 4 != 0 {
        return Err(Error::Format(format!("SPIR-V length {} is not a multiple of 4", spirv.len())));
    }
    let words: Vec<u32> = spirv
        .chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .collect();

    let entry_points = spirq::ReflectConfig::new()
        .spv(words.as_slice())
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| engine_err!("car::vulkan", "SPIR-V reflection failed: {:?}", e))?;
    for entry_point in &entry_points {
        for var in entry_point.vars.iter() {
            visit(&entry_point.name, var)?;
        }
    }
    Ok(())
}

/// Descriptor sets declared by a SPIR-V module, indexed by set number
pub fn reflect_descriptor_sets(spirv: &[u8]) -> Result<Vec<Vec<Descriptor>>> {
    let mut sets: Vec<Vec<Descriptor>> = Vec::new();
    reflect_variables(spirv, |_, var| {
        if let spirq::var::Variable::Descriptor { desc_bind, desc_ty, .. } = var {
            let descriptor_type = spirq_desc_type_to_descriptor_type(desc_ty.clone())?;
            let set = desc_bind.set() as usize;
            let binding = u8::try_from(desc_bind.bind())
                .map_err(|_| engine_err!("car::vulkan", "Binding {} does not fit a u8", desc_bind.bind()))?;
            if sets.len() <= set {
                sets.resize(set + 1, Vec::new());
            }
            if !sets[set].iter().any(|d| d.binding == binding) {
                sets[set].push(Descriptor { binding, descriptor_type });
            }
        }
        Ok(())
    })?;
    for set in &mut sets {
        set.sort_by_key(|d| d.binding);
    }
    Ok(sets)
}

/// Vertex attribute inputs of entry point `entry`, sorted by location
pub fn reflect_vertex_inputs(spirv: &[u8], entry: &str) -> Result<Vec<VertexInput>> {
    let mut inputs = Vec::new();
    reflect_variables(spirv, |name, var| {
        if let spirq::var::Variable::Input { location, ty, .. } = var {
            if name == entry {
                inputs.extend(spirq_type_to_vertex_inputs(location.loc(), ty)?);
            }
        }
        Ok(())
    })?;
    inputs.sort_by_key(|input| input.location);
    Ok(inputs)
}

fn spirq_scalar_to_kind(scalar_ty: &spirq::ty::ScalarType) -> Result<ScalarKind> {
    use spirq::ty::ScalarType;
    match scalar_ty {
        ScalarType::Float { .. } => Ok(ScalarKind::Float),
        ScalarType::Integer { is_signed: true, .. } => Ok(ScalarKind::Int),
        ScalarType::Integer { is_signed: false, .. } => Ok(ScalarKind::UInt),
        other => Err(engine_warn_err!("car::vulkan", "Unsupported vertex input scalar type: {:?}", other)),
    }
}

/// One input per location; a matrix input spans one location per column
fn spirq_type_to_vertex_inputs(location: u32, ty: &spirq::ty::Type) -> Result<Vec<VertexInput>> {
    use spirq::ty::Type;
    match ty {
        Type::Scalar(scalar) => Ok(vec![VertexInput::new(location, spirq_scalar_to_kind(scalar)?, 1)]),
        Type::Vector(vector) => Ok(vec![VertexInput::new(
            location,
            spirq_scalar_to_kind(&vector.scalar_ty)?,
            vector.nscalar,
        )]),
        Type::Matrix(matrix) => Ok(VertexInput::columns(
            location,
            spirq_scalar_to_kind(&matrix.vector_ty.scalar_ty)?,
            matrix.vector_ty.nscalar,
            matrix.nvector,
        )
        .collect()),
        other => Err(engine_warn_err!("car::vulkan", "Unsupported vertex input type at location {}: {:?}", location, other)),
    }
}

fn spirq_desc_type_to_descriptor_type(desc_ty: spirq::ty::DescriptorType) -> Result<DescriptorType> {
    use spirq::ty::DescriptorType as SpirqType;
    match desc_ty {
        SpirqType::UniformBuffer() => Ok(DescriptorType::UniformBuffer),
        SpirqType::StorageBuffer(..) => Ok(DescriptorType::StorageBuffer),
        SpirqType::CombinedImageSampler() => Ok(DescriptorType::Sampler2D),
        SpirqType::SampledImage() => Ok(DescriptorType::Sampler2D),
        SpirqType::Sampler() => Ok(DescriptorType::Sampler2D),
        other => {
            engine_bail!("car::vulkan", "Unsupported SPIR-V descriptor type: {:?}", other);
        }
    }
}

// ============================================================================
// Merged layout
// ============================================================================

/// One binding of the merged pipeline layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutBinding {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub stages: ShaderStages,
}

impl LayoutBinding {
    /// Sampler bindings are always arrays of [`MAX_TEXTURE_SLOTS`]
    pub fn descriptor_count(&self) -> u32 {
        match self.descriptor_type {
            DescriptorType::Sampler2D => MAX_TEXTURE_SLOTS as u32,
            _ => 1,
        }
    }
}

/// Union of the vertex and fragment descriptor sets
///
/// `None` descriptors only reserve a binding number and are dropped. A
/// binding declared by both stages with different types is an error.
pub fn merge_set_layouts(vertex: &[Vec<Descriptor>], fragment: &[Vec<Descriptor>]) -> Result<Vec<Vec<LayoutBinding>>> {
    let set_count = vertex.len().max(fragment.len());
    let mut merged: Vec<Vec<LayoutBinding>> = vec![Vec::new(); set_count];

    let stages = [(vertex, ShaderStages::VERTEX), (fragment, ShaderStages::FRAGMENT)];
    for (sets, stage) in stages {
        for (set_index, set) in sets.iter().enumerate() {
            for descriptor in set {
                if descriptor.descriptor_type == DescriptorType::None {
                    continue;
                }
                let binding = descriptor.binding as u32;
                let bindings = &mut merged[set_index];
                match bindings.iter_mut().find(|b| b.binding == binding) {
                    Some(existing) if existing.descriptor_type == descriptor.descriptor_type => {
                        existing.stages |= stage;
                    }
                    Some(existing) => {
                        return Err(engine_warn_err!(
                            "car::vulkan",
                            "Set {} binding {} is {:?} in one stage and {:?} in the other",
                            set_index,
                            binding,
                            existing.descriptor_type,
                            descriptor.descriptor_type
                        ));
                    }
                    None => bindings.push(LayoutBinding {
                        binding,
                        descriptor_type: descriptor.descriptor_type,
                        stages: stage,
                    }),
                }
            }
        }
    }
    for bindings in &mut merged {
        bindings.sort_by_key(|b| b.binding);
    }
    Ok(merged)
}

// ============================================================================
// VulkanShader
// ============================================================================

struct BakedPipeline {
    layout: BufferLayout,
    pipeline: vk::Pipeline,
}

pub struct VulkanShader {
    gpu: Arc<GpuContext>,
    spec: PipelineSpec,
    vertex_module: vk::ShaderModule,
    fragment_module: vk::ShaderModule,
    vertex_entry: CString,
    fragment_entry: CString,
    vertex_inputs: Vec<VertexInput>,
    set_bindings: Vec<Vec<LayoutBinding>>,
    set_layouts: Vec<vk::DescriptorSetLayout>,
    pipeline_layout: vk::PipelineLayout,
    pipeline: RefCell<Option<BakedPipeline>>,
    inputs: RefCell<ShaderInputs>,
}

impl VulkanShader {
    pub(crate) fn new(
        gpu: &Arc<GpuContext>,
        vertex: &CompiledShader,
        fragment: &CompiledShader,
        spec: PipelineSpec,
    ) -> Result<Self> {
        let set_bindings = merge_set_layouts(&vertex.sets, &fragment.sets)?;
        let vertex_inputs = reflect_vertex_inputs(&vertex.code, &spec.vertex_entry)?;
        let vertex_entry = CString::new(spec.vertex_entry.as_str())
            .map_err(|_| engine_warn_err!("car::vulkan", "Vertex entry point contains a NUL byte"))?;
        let fragment_entry = CString::new(spec.fragment_entry.as_str())
            .map_err(|_| engine_warn_err!("car::vulkan", "Fragment entry point contains a NUL byte"))?;

        // Built field by field so a failure part way drops what exists
        let mut shader = Self {
            gpu: Arc::clone(gpu),
            spec,
            vertex_module: vk::ShaderModule::null(),
            fragment_module: vk::ShaderModule::null(),
            vertex_entry,
            fragment_entry,
            vertex_inputs,
            set_bindings,
            set_layouts: Vec::new(),
            pipeline_layout: vk::PipelineLayout::null(),
            pipeline: RefCell::new(None),
            inputs: RefCell::new(ShaderInputs::default()),
        };

        shader.vertex_module = create_module(&gpu.device, vertex, "vertex")?;
        shader.fragment_module = create_module(&gpu.device, fragment, "fragment")?;

        for bindings in &shader.set_bindings {
            let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
                .iter()
                .filter_map(|b| {
                    descriptor_type_to_vk(b.descriptor_type).map(|ty| {
                        vk::DescriptorSetLayoutBinding::default()
                            .binding(b.binding)
                            .descriptor_type(ty)
                            .descriptor_count(b.descriptor_count())
                            .stage_flags(stages_to_vk(b.stages))
                    })
                })
                .collect();
            let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);
            let layout = unsafe { gpu.device.create_descriptor_set_layout(&info, None) }
                .map_err(|e| engine_err!("car::vulkan", "Failed to create descriptor set layout: {:?}", e))?;
            shader.set_layouts.push(layout);
        }

        let push_constant_ranges = [vk::PushConstantRange {
            stage_flags: PUSH_CONSTANT_STAGES,
            offset: 0,
            size: PUSH_CONSTANT_SIZE,
        }];
        let layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&shader.set_layouts)
            .push_constant_ranges(&push_constant_ranges);
        shader.pipeline_layout = unsafe { gpu.device.create_pipeline_layout(&layout_info, None) }
            .map_err(|e| engine_err!("car::vulkan", "Failed to create pipeline layout: {:?}", e))?;

        engine_debug!(
            "car::vulkan",
            "Created shader with {} descriptor set(s)",
            shader.set_layouts.len()
        );
        Ok(shader)
    }

    fn layout_binding(&self, set: u32, binding: u32) -> Option<&LayoutBinding> {
        self.set_bindings
            .get(set as usize)?
            .iter()
            .find(|b| b.binding == binding)
    }

    /// Check that (`set`, `binding`) exists and has the expected type
    fn expect_binding(&self, set: u32, binding: u32, expected: DescriptorType) -> Result<()> {
        match self.layout_binding(set, binding) {
            Some(b) if b.descriptor_type == expected => Ok(()),
            Some(b) => Err(engine_warn_err!(
                "car::vulkan",
                "Set {} binding {} is {:?}, not {:?}",
                set,
                binding,
                b.descriptor_type,
                expected
            )),
            None => Err(engine_warn_err!(
                "car::vulkan",
                "Shader declares no descriptor at set {} binding {}",
                set,
                binding
            )),
        }
    }

    // ===== PIPELINE =====

    /// Check `layout` feeds the vertex stage, then build the pipeline for
    /// it or check an existing one accepts it
    pub(crate) fn ensure_pipeline(&self, layout: &BufferLayout) -> Result<()> {
        layout.check_vertex_inputs(&self.vertex_inputs)?;
        if let Some(baked) = self.pipeline.borrow().as_ref() {
            if baked.layout.is_compatible_with(layout) {
                return Ok(());
            }
            engine_bail_warn!(
                "car::vulkan",
                "Shader pipeline was built for a {} byte vertex layout; a vertex array with an incompatible {} byte layout needs its own shader",
                baked.layout.stride(),
                layout.stride()
            );
        }
        let pipeline = self.build_pipeline(layout)?;
        *self.pipeline.borrow_mut() = Some(BakedPipeline { layout: layout.clone(), pipeline });
        Ok(())
    }

    pub(crate) fn pipeline(&self) -> Option<vk::Pipeline> {
        self.pipeline.borrow().as_ref().map(|baked| baked.pipeline)
    }

    fn build_pipeline(&self, layout: &BufferLayout) -> Result<vk::Pipeline> {
        let spec = &self.spec;

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(self.vertex_module)
                .name(&self.vertex_entry),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(self.fragment_module)
                .name(&self.fragment_entry),
        ];

        let vertex_bindings = [vk::VertexInputBindingDescription {
            binding: 0,
            stride: layout.stride(),
            input_rate: input_rate_to_vk(spec.input_rate),
        }];
        let attributes = vertex_attributes(layout, 0)?;
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_to_vk(spec.topology))
            .primitive_restart_enable(spec.primitive_restart);

        // Viewport and scissor are dynamic
        let viewports = [vk::Viewport::default()];
        let scissors = [vk::Rect2D::default()];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(polygon_mode_to_vk(spec.polygon_mode))
            .line_width(1.0)
            .cull_mode(cull_mode_to_vk(spec.cull_mode))
            .front_face(front_face_to_vk(spec.front_face))
            .depth_bias_enable(false);

        // The render pass has no depth attachment
        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(false)
            .depth_write_enable(false)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let color_blend_attachment = {
            let attachment = vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(spec.alpha_blending);
            if spec.alpha_blending {
                attachment
                    .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                    .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                    .color_blend_op(vk::BlendOp::ADD)
                    .src_alpha_blend_factor(vk::BlendFactor::ONE)
                    .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                    .alpha_blend_op(vk::BlendOp::ADD)
            } else {
                attachment
            }
        };
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(std::slice::from_ref(&color_blend_attachment));

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .depth_stencil_state(&depth_stencil_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(self.pipeline_layout)
            .render_pass(self.gpu.render_pass)
            .subpass(0);

        let pipelines = unsafe {
            self.gpu
                .device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_create_info], None)
        }
        .map_err(|e| engine_err!("car::vulkan", "Failed to create graphics pipeline: {:?}", e.1))?;

        engine_debug!(
            "car::vulkan",
            "Built pipeline for {} attribute(s), stride {}",
            attributes.len(),
            layout.stride()
        );
        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| engine_err!("car::vulkan", "Pipeline creation returned no pipeline"))
    }

    // ===== DRAW-TIME BINDING =====

    /// Bind the pipeline and a fresh snapshot of the current inputs
    pub(crate) fn bind(
        &self,
        cmd: vk::CommandBuffer,
        frame: usize,
        descriptors: &DescriptorAllocator,
    ) -> Result<()> {
        let pipeline = self.pipeline().ok_or_else(|| {
            engine_warn_err!("car::vulkan", "Shader has no pipeline yet; create a vertex array with it first")
        })?;
        let device = &self.gpu.device;

        unsafe {
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline);
        }

        if self.set_layouts.is_empty() {
            return Ok(());
        }

        let sets = descriptors.allocate(device, &self.set_layouts)?;
        let pending = self.collect_writes(&sets, frame)?;

        let writes: Vec<vk::WriteDescriptorSet> = pending
            .iter()
            .map(|write| {
                let base = vk::WriteDescriptorSet::default()
                    .dst_set(write.set)
                    .dst_binding(write.binding)
                    .dst_array_element(0);
                match &write.info {
                    WriteInfo::Buffer(ty, info) => base.descriptor_type(*ty).buffer_info(info),
                    WriteInfo::Images(infos) => base
                        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                        .image_info(infos),
                }
            })
            .collect();

        unsafe {
            device.update_descriptor_sets(&writes, &[]);
            device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout,
                0,
                &sets,
                &[],
            );
        }
        Ok(())
    }

    fn collect_writes(&self, sets: &[vk::DescriptorSet], frame: usize) -> Result<Vec<PendingWrite>> {
        let inputs = self.inputs.borrow();
        let mut pending = Vec::new();

        for (set_index, bindings) in self.set_bindings.iter().enumerate() {
            for layout_binding in bindings {
                let set = set_index as u32;
                let input = inputs.get(set, layout_binding.binding).ok_or_else(|| {
                    engine_warn_err!(
                        "car::vulkan",
                        "Nothing attached to set {} binding {} ({:?})",
                        set,
                        layout_binding.binding,
                        layout_binding.descriptor_type
                    )
                })?;

                let info = match input {
                    ShaderInput::UniformBuffer(buffer) => {
                        let buffer = buffer
                            .as_any()
                            .downcast_ref::<VulkanUniformBuffer>()
                            .ok_or_else(|| foreign_resource("uniform buffer"))?;
                        WriteInfo::Buffer(vk::DescriptorType::UNIFORM_BUFFER, [buffer.descriptor_info(frame)?])
                    }
                    ShaderInput::StorageBuffer(buffer) => {
                        let buffer = buffer
                            .as_any()
                            .downcast_ref::<VulkanSsbo>()
                            .ok_or_else(|| foreign_resource("storage buffer"))?;
                        WriteInfo::Buffer(vk::DescriptorType::STORAGE_BUFFER, [buffer.descriptor_info()])
                    }
                    ShaderInput::Textures(textures) => WriteInfo::Images(texture_infos(textures)?),
                };

                pending.push(PendingWrite {
                    set: sets[set_index],
                    binding: layout_binding.binding,
                    info,
                });
            }
        }
        Ok(pending)
    }

    /// Push `data` at byte `offset` of the push constant range
    pub(crate) fn push_constants(&self, cmd: vk::CommandBuffer, data: &[u8], offset: u32) -> Result<()> {
        if offset as usize + data.len() > PUSH_CONSTANT_SIZE as usize {
            engine_bail_warn!(
                "car::vulkan",
                "Push constant write of {} bytes at {} exceeds the {} byte range",
                data.len(),
                offset,
                PUSH_CONSTANT_SIZE
            );
        }
        unsafe {
            self.gpu
                .device
                .cmd_push_constants(cmd, self.pipeline_layout, PUSH_CONSTANT_STAGES, offset, data);
        }
        Ok(())
    }
}

enum WriteInfo {
    Buffer(vk::DescriptorType, [vk::DescriptorBufferInfo; 1]),
    Images(Vec<vk::DescriptorImageInfo>),
}

struct PendingWrite {
    set: vk::DescriptorSet,
    binding: u32,
    info: WriteInfo,
}

fn foreign_resource(kind: &str) -> Error {
    engine_warn_err!("car::vulkan", "The bound {} was not created by the Vulkan backend", kind)
}

/// Image infos for a sampler array; unused slots repeat the first texture
fn texture_infos(textures: &[Rc<dyn Texture2D>]) -> Result<Vec<vk::DescriptorImageInfo>> {
    let mut infos = textures
        .iter()
        .map(|texture| {
            texture
                .as_any()
                .downcast_ref::<VulkanTexture2D>()
                .map(|t| t.descriptor_info())
                .ok_or_else(|| foreign_resource("texture"))
        })
        .collect::<Result<Vec<_>>>()?;
    let first = *infos
        .first()
        .ok_or_else(|| engine_warn_err!("car::vulkan", "Empty texture array attached"))?;
    infos.resize(MAX_TEXTURE_SLOTS, first);
    Ok(infos)
}

fn create_module(device: &ash::Device, stage: &CompiledShader, name: &str) -> Result<vk::ShaderModule> {
    let words = stage.spirv_words()?;
    let info = vk::ShaderModuleCreateInfo::default().code(&words);
    unsafe { device.create_shader_module(&info, None) }
        .map_err(|e| engine_err!("car::vulkan", "Failed to create {} shader module: {:?}", name, e))
}

impl Shader for VulkanShader {
    fn pipeline_spec(&self) -> &PipelineSpec {
        &self.spec
    }

    fn vertex_inputs(&self) -> &[VertexInput] {
        &self.vertex_inputs
    }

    fn set_uniform_buffer(&self, set: u32, binding: u32, buffer: Rc<dyn UniformBuffer>) -> Result<()> {
        self.expect_binding(set, binding, DescriptorType::UniformBuffer)?;
        self.inputs
            .borrow_mut()
            .set(set, binding, ShaderInput::UniformBuffer(buffer));
        Ok(())
    }

    fn set_textures(&self, set: u32, binding: u32, textures: &[Rc<dyn Texture2D>]) -> Result<()> {
        validate_texture_array(textures)?;
        self.expect_binding(set, binding, DescriptorType::Sampler2D)?;
        self.inputs
            .borrow_mut()
            .set(set, binding, ShaderInput::Textures(textures.to_vec()));
        Ok(())
    }

    fn set_storage_buffer(&self, set: u32, binding: u32, buffer: Rc<dyn Ssbo>) -> Result<()> {
        self.expect_binding(set, binding, DescriptorType::StorageBuffer)?;
        self.inputs
            .borrow_mut()
            .set(set, binding, ShaderInput::StorageBuffer(buffer));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanShader {
    fn drop(&mut self) {
        let device = &self.gpu.device;
        unsafe {
            device.device_wait_idle().ok();
            if let Some(baked) = self.pipeline.get_mut().take() {
                device.destroy_pipeline(baked.pipeline, None);
            }
            device.destroy_pipeline_layout(self.pipeline_layout, None);
            for &layout in &self.set_layouts {
                device.destroy_descriptor_set_layout(layout, None);
            }
            device.destroy_shader_module(self.vertex_module, None);
            device.destroy_shader_module(self.fragment_module, None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_shader_tests.rs"]
mod tests;
