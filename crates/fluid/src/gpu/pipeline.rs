use std::borrow::Cow;
use std::collections::HashMap;

use wgpu::naga::ShaderStage;

use crate::backend::{Blend, MAX_SLOTS};
use crate::error::ProgramError;
use crate::program::{Material, ProgramKey};
use crate::shaders::{fragment_source, VERTEX_SHADER};

/// Kind of attachment a pipeline renders into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum TargetKind {
    Field,
    Surface,
}

/// Bind group layouts and the vertex stage shared by every program.
pub(crate) struct PipelineLayouts {
    pub uniform_layout: wgpu::BindGroupLayout,
    pub slot_layout: wgpu::BindGroupLayout,
    pub pipeline_layout: wgpu::PipelineLayout,
    pub vertex_module: wgpu::ShaderModule,
}

impl PipelineLayouts {
    pub fn new(device: &wgpu::Device, filterable: bool) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pass uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let slot_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sampling slot layout"),
            entries: &build_slot_layout_entries(filterable),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pass pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &slot_layout],
            push_constant_ranges: &[],
        });
        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("fullscreen triangle vertex"),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Borrowed(VERTEX_SHADER),
                stage: ShaderStage::Vertex,
                defines: &[],
            },
        });

        Self {
            uniform_layout,
            slot_layout,
            pipeline_layout,
            vertex_module,
        }
    }
}

/// A compiled material: one render pipeline per target/blend combination it is drawn with.
pub struct GpuProgram {
    pipelines: HashMap<(TargetKind, Blend), wgpu::RenderPipeline>,
}

impl GpuProgram {
    pub(crate) fn pipeline(&self, target: TargetKind, blend: Blend) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(&(target, blend))
    }
}

/// Compiles `key` into pipelines, reporting naga/wgpu validation failures as [`ProgramError`].
pub(crate) fn compile_program(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    key: &ProgramKey,
    field_format: wgpu::TextureFormat,
    surface_format: wgpu::TextureFormat,
) -> Result<GpuProgram, ProgramError> {
    let source = fragment_source(key.material, &key.keywords);
    let label = format!("{} fragment", key.material.name());

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(source),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    });

    let mut variants = vec![(TargetKind::Field, Blend::Replace, field_format)];
    if key.material == Material::Display {
        variants.extend([
            (TargetKind::Field, Blend::PremultipliedOver, field_format),
            (TargetKind::Surface, Blend::Replace, surface_format),
            (TargetKind::Surface, Blend::PremultipliedOver, surface_format),
        ]);
    }

    let mut pipelines = HashMap::with_capacity(variants.len());
    for (target, blend, format) in variants {
        let pipeline = build_pipeline(device, layouts, &fragment_module, &label, format, blend);
        pipelines.insert((target, blend), pipeline);
    }

    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(ProgramError::Compile {
            material: key.material,
            keywords: key.keywords.to_string(),
            message: err.to_string(),
        });
    }
    Ok(GpuProgram { pipelines })
}

fn build_pipeline(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    fragment_module: &wgpu::ShaderModule,
    label: &str,
    format: wgpu::TextureFormat,
    blend: Blend,
) -> wgpu::RenderPipeline {
    let blend = match blend {
        Blend::Replace => None,
        Blend::PremultipliedOver => Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
    };
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layouts.pipeline_layout),
        vertex: wgpu::VertexState {
            module: &layouts.vertex_module,
            entry_point: Some("main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: fragment_module,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    })
}

pub(crate) fn build_slot_entries<'a>(
    slots: &[(&'a wgpu::TextureView, &'a wgpu::Sampler); MAX_SLOTS],
) -> Vec<wgpu::BindGroupEntry<'a>> {
    let mut entries = Vec::with_capacity(MAX_SLOTS * 2);
    for (index, (view, sampler)) in slots.iter().enumerate() {
        entries.push(wgpu::BindGroupEntry {
            binding: (index as u32) * 2,
            resource: wgpu::BindingResource::TextureView(view),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: (index as u32) * 2 + 1,
            resource: wgpu::BindingResource::Sampler(sampler),
        });
    }
    entries
}

pub(crate) fn build_slot_layout_entries(filterable: bool) -> Vec<wgpu::BindGroupLayoutEntry> {
    let sampler = if filterable {
        wgpu::SamplerBindingType::Filtering
    } else {
        wgpu::SamplerBindingType::NonFiltering
    };
    let mut entries = Vec::with_capacity(MAX_SLOTS * 2);
    for index in 0..MAX_SLOTS as u32 {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: index * 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: index * 2 + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(sampler),
            count: None,
        });
    }
    entries
}
