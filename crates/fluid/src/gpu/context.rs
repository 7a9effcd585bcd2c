use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::error::FluidError;
use crate::types::{ApiTier, Capabilities, FieldFormat};

/// Backends tried in order; the first tier with a usable adapter wins.
const TIERS: [(ApiTier, wgpu::Backends); 2] = [
    (ApiTier::Modern, wgpu::Backends::PRIMARY),
    (ApiTier::Legacy, wgpu::Backends::GL),
];

/// Field formats in order of preference.
const FIELD_FORMATS: [FieldFormat; 3] = [
    FieldFormat::Rgba16Float,
    FieldFormat::Rgba32Float,
    FieldFormat::Rgba8Unorm,
];

pub(crate) fn texture_format(format: FieldFormat) -> wgpu::TextureFormat {
    match format {
        FieldFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        FieldFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        FieldFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
    }
}

pub(crate) struct GpuContext {
    pub _instance: wgpu::Instance,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub surface_format: wgpu::TextureFormat,
    pub capabilities: Capabilities,
}

impl GpuContext {
    /// Creates a surface for `window` and a device that can render into it.
    ///
    /// Modern backends are tried first, then GL. Failing both is fatal.
    pub(crate) fn new<W>(window: W, size: (u32, u32), transparent: bool) -> Result<Self, FluidError>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + Clone + 'static,
    {
        let mut failures = Vec::new();
        for (tier, backends) in TIERS {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends,
                flags: wgpu::InstanceFlags::default(),
                memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
                backend_options: wgpu::BackendOptions::default(),
            });
            let surface = match instance.create_surface(window.clone()) {
                Ok(surface) => surface,
                Err(err) => {
                    tracing::debug!(?tier, error = %err, "surface creation failed");
                    failures.push(format!("{tier:?}: {err}"));
                    continue;
                }
            };
            let adapter = match pollster::block_on(instance.request_adapter(
                &wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::LowPower,
                    compatible_surface: Some(&surface),
                    force_fallback_adapter: false,
                },
            )) {
                Ok(adapter) => adapter,
                Err(err) => {
                    tracing::debug!(?tier, error = %err, "no adapter for tier");
                    failures.push(format!("{tier:?}: {err}"));
                    continue;
                }
            };
            return Self::from_adapter(instance, surface, adapter, tier, size, transparent);
        }

        Err(FluidError::NoContext(failures.join("; ")))
    }

    fn from_adapter(
        instance: wgpu::Instance,
        surface: wgpu::Surface<'static>,
        adapter: wgpu::Adapter,
        tier: ApiTier,
        size: (u32, u32),
        transparent: bool,
    ) -> Result<Self, FluidError> {
        let info = adapter.get_info();
        let (capabilities, required_features) = detect_capabilities(&adapter, tier);
        tracing::info!(
            name = %info.name,
            backend = ?info.backend,
            device_type = ?info.device_type,
            format = ?capabilities.format,
            linear_filtering = capabilities.linear_filtering,
            "selected GPU adapter"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("herofluid device"),
            required_features,
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| FluidError::NoContext("surface reports no formats".into()))?;

        let alpha_mode = if transparent {
            [
                wgpu::CompositeAlphaMode::PreMultiplied,
                wgpu::CompositeAlphaMode::PostMultiplied,
            ]
            .into_iter()
            .find(|mode| surface_caps.alpha_modes.contains(mode))
            .unwrap_or_else(|| {
                tracing::warn!("surface cannot be composited with alpha; output will be opaque");
                wgpu::CompositeAlphaMode::Auto
            })
        } else {
            wgpu::CompositeAlphaMode::Auto
        };

        let present_mode = if surface_caps.present_modes.contains(&wgpu::PresentMode::Fifo) {
            wgpu::PresentMode::Fifo
        } else {
            wgpu::PresentMode::AutoVsync
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.0.max(1),
            height: size.1.max(1),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        tracing::debug!(?surface_format, ?alpha_mode, ?present_mode, "configured surface");

        Ok(Self {
            _instance: instance,
            surface,
            device,
            queue,
            config,
            surface_format,
            capabilities,
        })
    }

    pub(crate) fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub(crate) fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let max = self.capabilities.max_texture_dimension;
        self.config.width = width.min(max);
        self.config.height = height.min(max);
        self.surface.configure(&self.device, &self.config);
    }

    /// Reapplies the current configuration after the surface was lost or went stale.
    pub(crate) fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }
}

/// Picks the best renderable field format and whether it can be filtered.
fn detect_capabilities(adapter: &wgpu::Adapter, tier: ApiTier) -> (Capabilities, wgpu::Features) {
    let required = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
    for format in FIELD_FORMATS {
        let features = adapter.get_texture_format_features(texture_format(format));
        if !features.allowed_usages.contains(required) {
            continue;
        }

        let mut linear_filtering = features
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE);
        let mut required_features = wgpu::Features::empty();
        let max_texture_dimension = adapter.limits().max_texture_dimension_2d;
        if format == FieldFormat::Rgba32Float {
            linear_filtering = adapter
                .features()
                .contains(wgpu::Features::FLOAT32_FILTERABLE);
            if linear_filtering {
                required_features |= wgpu::Features::FLOAT32_FILTERABLE;
            }
        }

        return (
            Capabilities {
                tier,
                format,
                linear_filtering,
                max_texture_dimension,
            },
            required_features,
        );
    }

    // Rgba8Unorm is renderable everywhere wgpu runs; keep a sane answer regardless.
    (
        Capabilities {
            tier,
            format: FieldFormat::Rgba8Unorm,
            linear_filtering: true,
            max_texture_dimension: adapter.limits().max_texture_dimension_2d,
        },
        wgpu::Features::empty(),
    )
}
