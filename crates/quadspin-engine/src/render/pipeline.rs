use crate::device::{DEPTH_FORMAT, RenderSurface};
use crate::error::PipelineError;

use super::geometry::{COLOR_COMPONENTS, GeometryBuffers, POSITION_COMPONENTS};
use super::program::{
    AttributeLocations, COLOR, MODEL_VIEW, POSITION, PROJECTION, Program, ResourceKind,
    UniformLocations, type_name,
};
use super::shader::{ShaderStage, StageKind};
use super::transform::Transform;

const MAT4_SIZE: u64 = std::mem::size_of::<[f32; 16]>() as u64;

const POSITION_SLOT: u32 = 0;
const COLOR_SLOT: u32 = 1;

/// Linked program plus the GPU objects needed to draw with it.
///
/// Built once; never re-linked.
pub struct ShaderPipeline {
    program: Program,
    attributes: AttributeLocations,
    uniforms: UniformLocations,

    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    projection_ubo: wgpu::Buffer,
    model_view_ubo: Option<wgpu::Buffer>,
}

impl ShaderPipeline {
    /// Compiles both stages, links them and creates the render pipeline.
    ///
    /// Fails on the first compile error, on any link error, and when
    /// `position` or `projection` is not referenced. A failed build leaves
    /// nothing usable behind.
    pub fn build(
        surface: &RenderSurface<'_>,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, PipelineError> {
        let vertex = ShaderStage::new(StageKind::Vertex, vertex_source).compile()?;
        let fragment = ShaderStage::new(StageKind::Fragment, fragment_source).compile()?;
        let program = Program::link(vertex, fragment)?;

        let attributes = program.attribute_locations();
        let uniforms = program.uniform_locations();
        let position = attributes
            .position
            .ok_or(PipelineError::MissingLocation { name: POSITION })?;
        let projection = uniforms
            .projection
            .ok_or(PipelineError::MissingLocation { name: PROJECTION })?;

        check_bindable(&program)?;

        log::debug!(
            "program linked: position@{position} color@{:?} projection@{}:{} modelView@{:?}",
            attributes.color,
            projection.group,
            projection.binding,
            uniforms.model_view.map(|s| (s.group, s.binding)),
        );

        let device = surface.device();

        // Whatever the CPU link missed surfaces here as a validation error.
        let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("quadspin vertex stage"),
            source: wgpu::ShaderSource::Wgsl(program.vertex().source().into()),
        });
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("quadspin fragment stage"),
            source: wgpu::ShaderSource::Wgsl(program.fragment().source().into()),
        });

        let uniform_entry = |name: &str| {
            program.resource(name).map(|r| wgpu::BindGroupLayoutEntry {
                binding: r.slot.binding,
                visibility: r.visibility,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(MAT4_SIZE),
                },
                count: None,
            })
        };
        let layout_entries: Vec<_> = [PROJECTION, MODEL_VIEW]
            .into_iter()
            .filter_map(uniform_entry)
            .collect();

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("quadspin uniforms bgl"),
            entries: &layout_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("quadspin pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let projection_ubo = create_uniform_buffer(device, "quadspin projection ubo");
        let model_view_ubo = uniforms
            .model_view
            .map(|_| create_uniform_buffer(device, "quadspin modelView ubo"));

        let mut group_entries = vec![wgpu::BindGroupEntry {
            binding: projection.binding,
            resource: projection_ubo.as_entire_binding(),
        }];
        if let (Some(slot), Some(ubo)) = (uniforms.model_view, model_view_ubo.as_ref()) {
            group_entries.push(wgpu::BindGroupEntry {
                binding: slot.binding,
                resource: ubo.as_entire_binding(),
            });
        }

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("quadspin uniforms bind group"),
            layout: &bind_group_layout,
            entries: &group_entries,
        });

        let position_attrs = [wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 0,
            shader_location: position,
        }];
        let color_attrs = attributes.color.map(|location| {
            [wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x4,
                offset: 0,
                shader_location: location,
            }]
        });

        let mut buffers = vec![wgpu::VertexBufferLayout {
            array_stride: (POSITION_COMPONENTS * std::mem::size_of::<f32>()) as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &position_attrs,
        }];
        if let Some(color_attrs) = color_attrs.as_ref() {
            buffers.push(wgpu::VertexBufferLayout {
                array_stride: (COLOR_COMPONENTS * std::mem::size_of::<f32>()) as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: color_attrs,
            });
        }

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("quadspin pipeline"),
            layout: Some(&pipeline_layout),

            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some(program.vertex().entry_point_name()),
                compilation_options: Default::default(),
                buffers: &buffers,
            },

            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some(program.fragment().entry_point_name()),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface.format(),
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            // Near things obscure far things.
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),

            multiview_mask: None,
            cache: None,
        });

        if let Some(err) = pollster::block_on(scope.pop()) {
            log::debug!("pipeline creation rejected by the device: {err}");
            return Err(PipelineError::Link {
                log: err.to_string(),
            });
        }

        Ok(Self {
            program,
            attributes,
            uniforms,
            pipeline,
            bind_group,
            projection_ubo,
            model_view_ubo,
        })
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn attribute_locations(&self) -> AttributeLocations {
        self.attributes
    }

    pub fn uniform_locations(&self) -> UniformLocations {
        self.uniforms
    }

    /// Binds the geometry buffers to the attribute slots the program uses.
    pub fn bind_attributes(&self, pass: &mut wgpu::RenderPass<'_>, geometry: &GeometryBuffers) {
        pass.set_vertex_buffer(POSITION_SLOT, geometry.positions().slice(..));
        if self.attributes.color.is_some() {
            pass.set_vertex_buffer(COLOR_SLOT, geometry.colors().slice(..));
        }
    }

    /// Makes this program the active one for subsequent draws.
    pub fn activate(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
    }

    /// Writes both matrices and binds the uniform group.
    pub fn upload_uniforms(
        &self,
        queue: &wgpu::Queue,
        pass: &mut wgpu::RenderPass<'_>,
        transform: &Transform,
    ) {
        queue.write_buffer(
            &self.projection_ubo,
            0,
            bytemuck::bytes_of(transform.projection()),
        );
        if let Some(ubo) = self.model_view_ubo.as_ref() {
            queue.write_buffer(ubo, 0, bytemuck::bytes_of(transform.model_view()));
        }
        pass.set_bind_group(0, &self.bind_group, &[]);
    }
}

fn create_uniform_buffer(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: MAT4_SIZE,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Rejects programs whose interface the renderer cannot feed.
///
/// Only `position`/`color` have vertex buffers and only `projection`/`modelView`
/// have uniform buffers; the renderer also draws into a single colour target.
fn check_bindable(program: &Program) -> Result<(), PipelineError> {
    let mut log = Vec::new();

    for attribute in program.attributes() {
        match attribute.name.as_str() {
            POSITION | COLOR if !attribute.is_float() => log.push(format!(
                "vertex input `{}` must be a float scalar or vector, found {}",
                attribute.name,
                type_name(&attribute.ty)
            )),
            POSITION | COLOR => {}
            other => log.push(format!(
                "vertex input `{other}` at @location({}) has no vertex buffer",
                attribute.location
            )),
        }
    }

    for resource in program.resources() {
        let known = resource.name == PROJECTION || resource.name == MODEL_VIEW;
        if !known {
            log.push(format!("unsupported resource binding `{}`", resource.name));
            continue;
        }
        if resource.kind != ResourceKind::Uniform || !resource.is_mat4() {
            log.push(format!(
                "`{}` must be a `var<uniform>` of type mat4x4<f32>, found {}",
                resource.name,
                type_name(&resource.ty)
            ));
        }
        if resource.slot.group != 0 {
            log.push(format!(
                "`{}` must be bound in @group(0), found @group({})",
                resource.name, resource.slot.group
            ));
        }
    }

    let uniforms = program.uniform_locations();
    if uniforms.projection.is_some() && uniforms.projection == uniforms.model_view {
        log.push("`projection` and `modelView` share a binding".to_string());
    }

    if program.fragment_outputs().iter().any(|&location| location != 0) {
        log.push("fragment stage may only write @location(0)".to_string());
    }

    if log.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Link { log: log.join("\n") })
    }
}
