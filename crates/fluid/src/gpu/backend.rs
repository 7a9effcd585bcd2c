use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use wgpu::util::DeviceExt;

use crate::backend::{validate_draw, Backend, DrawCall, Target, MAX_SLOTS};
use crate::error::{BackendError, FluidError, ProgramError};
use crate::field::{Field, FieldDescriptor};
use crate::program::ProgramKey;
use crate::types::{Capabilities, FilterMode};
use crate::uniforms::PassUniforms;

use super::context::{texture_format, GpuContext};
use super::pipeline::{build_slot_entries, compile_program, GpuProgram, PipelineLayouts, TargetKind};

/// Storage behind a GPU field.
pub struct GpuTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

struct Placeholder {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

struct AcquiredFrame {
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

/// Renders fluid passes with wgpu into a window surface.
///
/// Draws are recorded into one command encoder per frame and submitted by
/// [`Backend::present`]. The surface texture is acquired lazily by the first
/// draw that targets it.
pub struct GpuBackend {
    context: GpuContext,
    layouts: PipelineLayouts,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    placeholder: Placeholder,
    encoder: Option<wgpu::CommandEncoder>,
    frame: Option<AcquiredFrame>,
}

impl GpuBackend {
    pub fn new<W>(window: W, size: (u32, u32), transparent: bool) -> Result<Self, FluidError>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + Clone + 'static,
    {
        let context = GpuContext::new(window, size, transparent)?;
        let layouts = PipelineLayouts::new(&context.device, context.capabilities.linear_filtering);

        let uniform_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pass uniforms"),
            size: std::mem::size_of::<PassUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pass uniform bind group"),
            layout: &layouts.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        let placeholder = create_placeholder(&context);

        Ok(Self {
            context,
            layouts,
            uniform_buffer,
            uniform_bind_group,
            placeholder,
            encoder: None,
            frame: None,
        })
    }

    fn field_format(&self) -> wgpu::TextureFormat {
        texture_format(self.context.capabilities.format)
    }

    fn acquire_frame(&mut self) -> Result<(), BackendError> {
        if self.frame.is_some() {
            return Ok(());
        }
        let texture = match self.context.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(err @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                tracing::debug!(error = %err, "reconfiguring surface");
                self.context.reconfigure();
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };
        let view = texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.frame = Some(AcquiredFrame { texture, view });
        Ok(())
    }
}

impl Backend for GpuBackend {
    type Texture = GpuTexture;
    type Program = GpuProgram;

    fn capabilities(&self) -> Capabilities {
        self.context.capabilities
    }

    fn surface_size(&self) -> (u32, u32) {
        self.context.size()
    }

    fn resize_surface(&mut self, width: u32, height: u32) -> Result<(), BackendError> {
        self.frame = None;
        self.context.resize(width, height);
        Ok(())
    }

    fn create_field(&mut self, descriptor: FieldDescriptor) -> Result<Field<GpuTexture>, BackendError> {
        descriptor.check_limit(self.context.capabilities.max_texture_dimension)?;
        let device = &self.context.device;
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(descriptor.label),
            size: wgpu::Extent3d {
                width: descriptor.size.width,
                height: descriptor.size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(descriptor.format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = create_sampler(device, descriptor.label, descriptor.filter);
        Ok(Field::new(
            GpuTexture {
                _texture: texture,
                view,
                sampler,
            },
            descriptor,
        ))
    }

    fn compile(&mut self, key: &ProgramKey) -> Result<GpuProgram, ProgramError> {
        compile_program(
            &self.context.device,
            &self.layouts,
            key,
            self.field_format(),
            self.context.surface_format,
        )
    }

    fn draw(&mut self, program: &GpuProgram, call: &DrawCall<'_, GpuTexture>) -> Result<(), BackendError> {
        validate_draw(call)?;

        let kind = match call.target {
            Target::Field(_) => TargetKind::Field,
            Target::Surface => {
                self.acquire_frame()?;
                TargetKind::Surface
            }
        };
        let pipeline = program
            .pipeline(kind, call.blend)
            .ok_or(BackendError::Unsupported("this target and blend combination"))?;

        let mut slots = [(&self.placeholder.view, &self.placeholder.sampler); MAX_SLOTS];
        for (index, slot) in slots.iter_mut().enumerate() {
            if let Some(field) = call.slot(index) {
                let texture = field.texture();
                *slot = (&texture.view, &texture.sampler);
            }
        }
        let device = &self.context.device;
        let slot_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sampling slots"),
            layout: &self.layouts.slot_layout,
            entries: &build_slot_entries(&slots),
        });

        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("fluid frame encoder"),
            })
        });

        // Every pass gets its own copy so queued passes never see a later pass's values.
        let staging = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("pass uniform staging"),
            contents: bytemuck::bytes_of(&call.uniforms),
            usage: wgpu::BufferUsages::COPY_SRC,
        });
        encoder.copy_buffer_to_buffer(
            &staging,
            0,
            &self.uniform_buffer,
            0,
            std::mem::size_of::<PassUniforms>() as u64,
        );

        let view = match call.target {
            Target::Field(field) => &field.texture().view,
            Target::Surface => match self.frame.as_ref() {
                Some(frame) => &frame.view,
                None => return Err(BackendError::Unsupported("drawing without a surface frame")),
            },
        };
        let load = match call.clear {
            Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: a as f64,
            }),
            None => wgpu::LoadOp::Load,
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("fluid pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        render_pass.set_bind_group(1, &slot_bind_group, &[]);
        render_pass.draw(0..3, 0..1);
        Ok(())
    }

    fn present(&mut self) -> Result<(), BackendError> {
        if let Some(encoder) = self.encoder.take() {
            self.context.queue.submit(Some(encoder.finish()));
        }
        if let Some(frame) = self.frame.take() {
            frame.texture.present();
        }
        Ok(())
    }

    fn read_field(&mut self, _field: &Field<GpuTexture>) -> Result<Vec<[f32; 4]>, BackendError> {
        Err(BackendError::Unsupported("reading GPU fields back"))
    }
}

fn create_sampler(device: &wgpu::Device, label: &str, filter: FilterMode) -> wgpu::Sampler {
    let filter = match filter {
        FilterMode::Linear => wgpu::FilterMode::Linear,
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
    };
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

/// Bound to slots a pass does not sample.
fn create_placeholder(context: &GpuContext) -> Placeholder {
    let texture = context.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("empty slot"),
        size: wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: texture_format(context.capabilities.format),
        usage: wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = create_sampler(&context.device, "empty slot", FilterMode::Nearest);
    Placeholder {
        _texture: texture,
        view,
        sampler,
    }
}
