//! Shader modules and graphics pipeline creation
//!
//! Every pass builds its pipelines through [`GraphicsPipelineBuilder`]:
//! triangle lists, counter-clockwise front faces, dynamic viewport and
//! scissor, no blending.

use std::ffi::CStr;
use std::mem::{offset_of, size_of};
use std::path::Path;

use ash::{vk, Device};

use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use crate::render::primitives::mesh::Vertex;

const ENTRY_POINT: &CStr = c"main";

/// SPIR-V shader module
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create a module from SPIR-V bytes
    pub fn from_bytes(device: &Device, bytes: &[u8]) -> VulkanResult<Self> {
        let code = ash::util::read_spv(&mut std::io::Cursor::new(bytes)).map_err(|_| {
            VulkanError::InitializationFailed("SPIR-V bytecode is not a whole number of words".to_string())
        })?;

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);
        let module = unsafe { device.create_shader_module(&create_info, None).map_err(VulkanError::Api)? };

        Ok(Self {
            device: device.clone(),
            module,
        })
    }

    /// Read and create a module from a `.spv` file
    pub fn from_file(device: &Device, path: impl AsRef<Path>) -> VulkanResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| VulkanError::ShaderLoad {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loaded shader {:?} ({} bytes)", path, bytes.len());
        Self::from_bytes(device, &bytes)
    }

    /// Get the module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    fn stage_info(
        &self,
        stage: vk::ShaderStageFlags,
        specialization: &vk::SpecializationInfo,
    ) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(ENTRY_POINT)
            .specialization_info(specialization)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Pipeline and its layout, destroyed together
pub struct GraphicsPipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// Get the pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Get the pipeline layout
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Configurable fixed-function state for one pipeline
pub struct GraphicsPipelineBuilder<'a> {
    vertex_shader: &'a ShaderModule,
    fragment_shader: Option<&'a ShaderModule>,
    vertex_input: bool,
    cull_mode: vk::CullModeFlags,
    depth_test: bool,
    depth_write: bool,
    dynamic_depth_bias: bool,
    color_attachments: u32,
    push_constant_size: u32,
    set_layouts: Vec<vk::DescriptorSetLayout>,
    specialization: Vec<u32>,
}

impl<'a> GraphicsPipelineBuilder<'a> {
    /// Start from back-face culling, depth test and write, one color output
    pub fn new(vertex_shader: &'a ShaderModule) -> Self {
        Self {
            vertex_shader,
            fragment_shader: None,
            vertex_input: true,
            cull_mode: vk::CullModeFlags::BACK,
            depth_test: true,
            depth_write: true,
            dynamic_depth_bias: false,
            color_attachments: 1,
            push_constant_size: 0,
            set_layouts: Vec::new(),
            specialization: Vec::new(),
        }
    }

    /// Fragment stage; depth-only pipelines leave it unset
    pub fn fragment(mut self, shader: &'a ShaderModule) -> Self {
        self.fragment_shader = Some(shader);
        self
    }

    /// Fullscreen passes generate their vertices in the shader
    pub fn without_vertex_input(mut self) -> Self {
        self.vertex_input = false;
        self
    }

    /// Face culling mode
    pub fn cull_mode(mut self, cull_mode: vk::CullModeFlags) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    /// Depth test and depth write switches
    pub fn depth(mut self, test: bool, write: bool) -> Self {
        self.depth_test = test;
        self.depth_write = write;
        self
    }

    /// Depth bias set per draw with `vkCmdSetDepthBias`
    pub fn dynamic_depth_bias(mut self) -> Self {
        self.dynamic_depth_bias = true;
        self
    }

    /// Number of color attachments written
    pub fn color_attachments(mut self, count: u32) -> Self {
        self.color_attachments = count;
        self
    }

    /// Push constant block visible to vertex and fragment stages
    pub fn push_constants(mut self, size: u32) -> Self {
        self.push_constant_size = size;
        self
    }

    /// Descriptor set layouts in set order
    pub fn set_layouts(mut self, layouts: &[vk::DescriptorSetLayout]) -> Self {
        self.set_layouts = layouts.to_vec();
        self
    }

    /// `u32` specialization constants; `values[i]` feeds `constant_id = i`
    /// in every stage
    pub fn specialization(mut self, values: &[u32]) -> Self {
        self.specialization = values.to_vec();
        self
    }

    /// Create the pipeline for subpass 0 of `render_pass`
    pub fn build(self, device: &Device, render_pass: vk::RenderPass) -> VulkanResult<GraphicsPipeline> {
        let map_entries: Vec<vk::SpecializationMapEntry> = (0..self.specialization.len())
            .map(|i| vk::SpecializationMapEntry {
                constant_id: i as u32,
                offset: (i * size_of::<u32>()) as u32,
                size: size_of::<u32>(),
            })
            .collect();
        let specialization = vk::SpecializationInfo::builder()
            .map_entries(&map_entries)
            .data(bytemuck::cast_slice(&self.specialization))
            .build();

        let mut shader_stages = vec![self
            .vertex_shader
            .stage_info(vk::ShaderStageFlags::VERTEX, &specialization)];
        if let Some(fragment) = self.fragment_shader {
            shader_stages.push(fragment.stage_info(vk::ShaderStageFlags::FRAGMENT, &specialization));
        }

        let bindings = [vertex_binding()];
        let attributes = vertex_attributes();
        let vertex_input_info = if self.vertex_input {
            vk::PipelineVertexInputStateCreateInfo::builder()
                .vertex_binding_descriptions(&bindings)
                .vertex_attribute_descriptions(&attributes)
                .build()
        } else {
            vk::PipelineVertexInputStateCreateInfo::builder().build()
        };

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let mut dynamic_states = vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        if self.dynamic_depth_bias {
            dynamic_states.push(vk::DynamicState::DEPTH_BIAS);
        }
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(self.cull_mode)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(self.dynamic_depth_bias);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(self.depth_test)
            .depth_write_enable(self.depth_write)
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachments: Vec<_> = (0..self.color_attachments)
            .map(|_| {
                vk::PipelineColorBlendAttachmentState::builder()
                    .color_write_mask(vk::ColorComponentFlags::RGBA)
                    .blend_enable(false)
                    .build()
            })
            .collect();
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let push_constant_ranges = [vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            offset: 0,
            size: self.push_constant_size,
        }];
        let ranges: &[vk::PushConstantRange] = if self.push_constant_size > 0 {
            &push_constant_ranges
        } else {
            &[]
        };
        let layout_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(&self.set_layouts)
            .push_constant_ranges(ranges);
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None).map_err(VulkanError::Api)? };

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_info)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipelines = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info.build()], None)
        };
        let pipeline = match pipelines {
            Ok(pipelines) => pipelines[0],
            Err((_, err)) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(VulkanError::Api(err));
            }
        };

        Ok(GraphicsPipeline {
            device: device.clone(),
            pipeline,
            layout,
        })
    }
}

fn vertex_binding() -> vk::VertexInputBindingDescription {
    vk::VertexInputBindingDescription {
        binding: 0,
        stride: size_of::<Vertex>() as u32,
        input_rate: vk::VertexInputRate::VERTEX,
    }
}

fn vertex_attributes() -> [vk::VertexInputAttributeDescription; 4] {
    let attribute = |location, format, offset: usize| vk::VertexInputAttributeDescription {
        location,
        binding: 0,
        format,
        offset: offset as u32,
    };
    [
        attribute(0, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, position)),
        attribute(1, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, normal)),
        attribute(2, vk::Format::R32G32_SFLOAT, offset_of!(Vertex, uv)),
        attribute(3, vk::Format::R32G32B32A32_SFLOAT, offset_of!(Vertex, tangent)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout_matches_struct() {
        let binding = vertex_binding();
        assert_eq!(binding.stride, 48);

        let offsets: Vec<u32> = vertex_attributes().iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24, 32]);
    }
}
