use std::time::Duration;

/// Nominal step used by [`TimeStep::Fixed`] when no override is supplied.
pub const FIXED_TIME_STEP: f32 = 1.0 / 60.0;

/// Dye resolution applied when the device cannot filter float textures.
pub const DEGRADED_DYE_RESOLUTION: u32 = 256;

/// Largest texture edge a backend guarantees when it reports nothing better.
pub const DEFAULT_MAX_TEXTURE_DIMENSION: u32 = 8192;

/// Linear RGB colour with unbounded channels.
///
/// Splat colours routinely exceed 1.0 (ignition bursts are scaled by ten),
/// so the type does not clamp.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self::new(self.r * factor, self.g * factor, self.b * factor)
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<[f32; 3]> for Color {
    fn from(rgb: [f32; 3]) -> Self {
        Self::new(rgb[0], rgb[1], rgb[2])
    }
}

/// How the frame loop derives `dt` for each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeStep {
    /// Always advance by the same amount, independent of the real frame interval.
    Fixed { dt: f32 },
    /// Advance by the measured frame interval, clamped to `max`.
    Measured { max: Duration },
}

impl Default for TimeStep {
    fn default() -> Self {
        Self::Fixed {
            dt: FIXED_TIME_STEP,
        }
    }
}

/// Tunables for the simulation, compositor and pointer handling.
///
/// The defaults reproduce the hero canvas: a 128 cell velocity grid, a 512
/// texel dye grid, twenty Jacobi iterations and shaded, transparent output.
#[derive(Debug, Clone, PartialEq)]
pub struct FluidConfig {
    /// Target resolution of the shorter axis of the velocity/pressure grid.
    pub sim_resolution: u32,
    /// Target resolution of the shorter axis of the dye grid.
    pub dye_resolution: u32,
    pub density_dissipation: f32,
    pub velocity_dissipation: f32,
    /// Factor applied to the previous pressure before each solve (0 clears it).
    pub pressure_dissipation: f32,
    pub pressure_iterations: u32,
    /// Vorticity confinement strength.
    pub curl: f32,
    /// Splat radius in percent of the canvas.
    pub splat_radius: f32,
    /// Upper bound on the velocity magnitude a single pointer splat may inject.
    pub splat_force: f32,
    /// Multiplier from pointer travel in canvas pixels to splat velocity.
    pub pointer_force: f32,
    pub shading: bool,
    /// Pick a random colour on every press instead of `hover_color`.
    pub colorful: bool,
    /// Splat on plain pointer motion, not only while pressed.
    pub hover_splats: bool,
    pub hover_color: Color,
    pub back_color: Color,
    /// Clear to transparent and skip blending instead of compositing over `back_color`.
    pub transparent: bool,
    /// Number of random splats injected on the first frame; `None` picks 5..25.
    pub ignition_splats: Option<u32>,
    pub time_step: TimeStep,
}

impl Default for FluidConfig {
    fn default() -> Self {
        Self {
            sim_resolution: 128,
            dye_resolution: 512,
            density_dissipation: 0.98,
            velocity_dissipation: 0.99,
            pressure_dissipation: 0.8,
            pressure_iterations: 20,
            curl: 30.0,
            splat_radius: 0.5,
            splat_force: 6000.0,
            pointer_force: 5.0,
            shading: true,
            colorful: true,
            hover_splats: true,
            hover_color: Color::new(0.0, 0.56, 0.65),
            back_color: Color::BLACK,
            transparent: true,
            ignition_splats: None,
            time_step: TimeStep::default(),
        }
    }
}

impl FluidConfig {
    /// Returns the configuration that is actually run on a device with `caps`.
    ///
    /// Devices without linear float filtering get a smaller dye grid and no
    /// shading; every other field is left untouched.
    pub fn effective_for(&self, caps: &Capabilities) -> FluidConfig {
        let mut config = self.clone();
        if !caps.linear_filtering {
            config.dye_resolution = config.dye_resolution.min(DEGRADED_DYE_RESOLUTION);
            config.shading = false;
        }
        config
    }
}

/// Generation of the graphics API the context was created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiTier {
    /// Vulkan, Metal or DX12.
    Modern,
    /// OpenGL / GLES through the legacy backend.
    Legacy,
    /// CPU rasterizer.
    Software,
}

/// Texel format every simulation field is allocated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldFormat {
    Rgba16Float,
    Rgba32Float,
    Rgba8Unorm,
}

impl FieldFormat {
    /// Unorm fields clamp every written channel into 0..=1.
    pub fn is_normalized(self) -> bool {
        matches!(self, FieldFormat::Rgba8Unorm)
    }
}

/// Texture sampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// What the active backend can do; drives degraded mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub tier: ApiTier,
    pub format: FieldFormat,
    pub linear_filtering: bool,
    /// Longest edge, in texels, of any field the backend can allocate.
    pub max_texture_dimension: u32,
}

impl Capabilities {
    /// Filter for fields that want interpolation (velocity, dye).
    pub fn smooth_filter(&self) -> FilterMode {
        if self.linear_filtering {
            FilterMode::Linear
        } else {
            FilterMode::Nearest
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.linear_filtering
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(linear_filtering: bool) -> Capabilities {
        Capabilities {
            tier: ApiTier::Legacy,
            format: FieldFormat::Rgba8Unorm,
            linear_filtering,
            max_texture_dimension: DEFAULT_MAX_TEXTURE_DIMENSION,
        }
    }

    #[test]
    fn defaults_match_hero_canvas() {
        let config = FluidConfig::default();
        assert_eq!(config.sim_resolution, 128);
        assert_eq!(config.dye_resolution, 512);
        assert_eq!(config.pressure_iterations, 20);
        assert!(config.transparent);
        assert_eq!(config.time_step, TimeStep::Fixed { dt: FIXED_TIME_STEP });
    }

    #[test]
    fn degraded_devices_drop_dye_resolution_and_shading() {
        let config = FluidConfig::default().effective_for(&caps(false));
        assert_eq!(config.dye_resolution, DEGRADED_DYE_RESOLUTION);
        assert!(!config.shading);
        assert_eq!(config.sim_resolution, 128);
    }

    #[test]
    fn filtering_devices_keep_configuration() {
        let config = FluidConfig::default();
        assert_eq!(config.effective_for(&caps(true)), config);
        assert_eq!(caps(true).smooth_filter(), FilterMode::Linear);
        assert_eq!(caps(false).smooth_filter(), FilterMode::Nearest);
    }
}
