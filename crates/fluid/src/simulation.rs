//! The stable-fluids solver and compositor.
//!
//! One tick runs these full-screen passes in order:
//!
//! ```text
//!   advect velocity ─▶ advect dye ─▶ curl ─▶ vorticity ─▶ divergence
//!        ─▶ pressure warm start ─▶ N × Jacobi ─▶ gradient subtract
//! ```
//!
//! Every pass reads from the read side of a double buffer (or a single
//! field) and writes into the write side, which is swapped afterwards. A
//! pass whose program failed to compile is skipped and does not swap.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::backend::{Backend, Blend, DrawCall, Target};
use crate::error::{BackendError, FluidError};
use crate::field::{DoubleBuffer, Field, FieldDescriptor};
use crate::pointer::{generate_color, PointerEvent, Pointers};
use crate::program::{KeywordSet, Material, ProgramCache, ProgramKey, SHADING};
use crate::resolution::{aspect_ratio, correct_radius, derive_resolution, GridSize};
use crate::types::{Capabilities, Color, FilterMode, FluidConfig};
use crate::uniforms::PassUniforms;

/// Splat count for unconfigured ignition and keyboard bursts.
const RANDOM_BURST: std::ops::Range<u32> = 5..25;

/// Every field the solver owns, sized for the current canvas.
#[derive(Debug)]
pub struct FieldSet<T> {
    pub velocity: DoubleBuffer<T>,
    pub dye: DoubleBuffer<T>,
    pub pressure: DoubleBuffer<T>,
    pub divergence: Field<T>,
    pub curl: Field<T>,
}

/// Names a field for read-back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Velocity,
    Dye,
    Pressure,
    Divergence,
    Curl,
}

impl<T> FieldSet<T> {
    pub fn get(&self, kind: FieldKind) -> &Field<T> {
        match kind {
            FieldKind::Velocity => self.velocity.read(),
            FieldKind::Dye => self.dye.read(),
            FieldKind::Pressure => self.pressure.read(),
            FieldKind::Divergence => &self.divergence,
            FieldKind::Curl => &self.curl,
        }
    }
}

/// Result of one frame of the loop body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// The surface was unavailable; simulation work was still submitted.
    Skipped,
}

/// Runs compiled passes against a backend.
struct Passes<'s, B: Backend> {
    backend: &'s mut B,
    programs: &'s mut ProgramCache<B::Program>,
}

impl<B: Backend> Passes<'_, B> {
    /// Draws `call` with the program for `key`. Returns `false` when the
    /// program is unavailable and the pass was skipped.
    fn run(&mut self, key: &ProgramKey, call: DrawCall<'_, B::Texture>) -> Result<bool, BackendError> {
        let program = match self.programs.get_or_compile(key, |key| self.backend.compile(key)) {
            Ok(program) => program,
            Err(_) => return Ok(false),
        };
        self.programs.bind(key);
        self.backend.draw(&program, &call)?;
        Ok(true)
    }
}

/// An owned fluid simulation bound to one backend.
pub struct FluidSimulation<B: Backend> {
    backend: B,
    requested: FluidConfig,
    config: FluidConfig,
    capabilities: Capabilities,
    programs: ProgramCache<B::Program>,
    fields: Option<FieldSet<B::Texture>>,
    canvas: (u32, u32),
    pending_resize: Option<(u32, u32)>,
    pointers: Pointers,
    splat_stack: Vec<u32>,
    rng: StdRng,
}

impl<B: Backend> FluidSimulation<B> {
    pub fn new(backend: B, config: FluidConfig) -> Self {
        Self::with_rng(backend, config, StdRng::from_entropy())
    }

    /// Deterministic splat positions and colours.
    pub fn with_seed(backend: B, config: FluidConfig, seed: u64) -> Self {
        Self::with_rng(backend, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(backend: B, requested: FluidConfig, rng: StdRng) -> Self {
        let capabilities = backend.capabilities();
        let config = requested.effective_for(&capabilities);
        if capabilities.is_degraded() {
            tracing::info!(
                dye_resolution = config.dye_resolution,
                format = ?capabilities.format,
                "linear filtering unavailable; running in degraded mode"
            );
        }
        Self {
            backend,
            requested,
            config,
            capabilities,
            programs: ProgramCache::new(),
            fields: None,
            canvas: (0, 0),
            pending_resize: None,
            pointers: Pointers::new(),
            splat_stack: Vec::new(),
            rng,
        }
    }

    /// Allocates every field for the backend's current surface and queues
    /// the ignition burst.
    pub fn initialize(&mut self) -> Result<(), FluidError> {
        let (width, height) = self.backend.surface_size();
        if width == 0 || height == 0 {
            return Err(FluidError::Config(format!(
                "cannot initialise a {width}x{height} canvas"
            )));
        }
        self.canvas = (width, height);
        self.allocate_fields()?;

        let ignition = match self.config.ignition_splats {
            Some(count) => count,
            None => self.rng.gen_range(RANDOM_BURST),
        };
        if ignition > 0 {
            self.splat_stack.push(ignition);
        }
        tracing::info!(
            tier = ?self.capabilities.tier,
            format = ?self.capabilities.format,
            width,
            height,
            ignition,
            "fluid simulation initialised"
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.fields.is_some()
    }

    /// Defers a canvas resize to the start of the next frame.
    pub fn request_resize(&mut self, width: u32, height: u32) {
        self.pending_resize = Some((width, height));
    }

    /// Reallocates every field for a `width`x`height` canvas.
    ///
    /// Returns `false` when nothing changed. Zero-sized canvases (minimised
    /// windows) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<bool, FluidError> {
        if width == 0 || height == 0 {
            tracing::debug!(width, height, "ignoring zero-sized canvas");
            return Ok(false);
        }
        if self.canvas == (width, height) && self.fields.is_some() {
            return Ok(false);
        }
        self.backend.resize_surface(width, height)?;
        self.canvas = (width, height);
        if self.fields.is_some() {
            self.allocate_fields()?;
        }
        Ok(true)
    }

    fn allocate_fields(&mut self) -> Result<(), FluidError> {
        let max = self.capabilities.max_texture_dimension;
        let sim = fitted_grid("velocity", self.config.sim_resolution, self.canvas, max);
        let dye = fitted_grid("dye", self.config.dye_resolution, self.canvas, max);
        let smooth = self.capabilities.smooth_filter();
        let format = self.capabilities.format;
        let backend = &mut self.backend;
        let mut field = |label: &'static str, size: GridSize, filter: FilterMode| {
            backend.create_field(FieldDescriptor {
                label,
                size,
                format,
                filter,
            })
        };

        let fields = FieldSet {
            velocity: DoubleBuffer::new(
                field("velocity", sim, smooth)?,
                field("velocity", sim, smooth)?,
            )?,
            dye: DoubleBuffer::new(field("dye", dye, smooth)?, field("dye", dye, smooth)?)?,
            pressure: DoubleBuffer::new(
                field("pressure", sim, FilterMode::Nearest)?,
                field("pressure", sim, FilterMode::Nearest)?,
            )?,
            divergence: field("divergence", sim, FilterMode::Nearest)?,
            curl: field("curl", sim, FilterMode::Nearest)?,
        };
        tracing::debug!(
            sim_width = sim.width,
            sim_height = sim.height,
            dye_width = dye.width,
            dye_height = dye.height,
            "allocated simulation fields"
        );
        self.fields = Some(fields);
        Ok(())
    }

    fn parts(&mut self) -> Option<(Passes<'_, B>, &mut FieldSet<B::Texture>, &FluidConfig)> {
        let fields = self.fields.as_mut()?;
        let passes = Passes {
            backend: &mut self.backend,
            programs: &mut self.programs,
        };
        Some((passes, fields, &self.config))
    }

    /// Runs one full tick of the solver.
    pub fn step(&mut self, dt: f32) -> Result<(), FluidError> {
        self.advect(dt)?;
        self.apply_vorticity(dt)?;
        self.compute_divergence()?;
        let iterations = self.config.pressure_iterations;
        self.solve_pressure(iterations)?;
        self.subtract_gradient()?;
        Ok(())
    }

    /// Moves velocity through itself, then dye through the new velocity.
    pub fn advect(&mut self, dt: f32) -> Result<(), FluidError> {
        let Some((mut passes, fields, config)) = self.parts() else {
            return Ok(());
        };
        let key = ProgramKey::plain(Material::Advection);
        let texel_size = fields.velocity.texel_size();

        let velocity = &fields.velocity;
        let swapped = passes.run(
            &key,
            DrawCall::new(
                PassUniforms::advection(texel_size, dt, config.velocity_dissipation),
                Target::Field(velocity.write()),
            )
            .input(velocity.read().attach(0)?)
            .input(velocity.read().attach(1)?),
        )?;
        if swapped {
            fields.velocity.swap();
        }

        let swapped = passes.run(
            &key,
            DrawCall::new(
                PassUniforms::advection(texel_size, dt, config.density_dissipation),
                Target::Field(fields.dye.write()),
            )
            .input(fields.velocity.read().attach(0)?)
            .input(fields.dye.read().attach(1)?),
        )?;
        if swapped {
            fields.dye.swap();
        }
        Ok(())
    }

    /// Computes curl and applies vorticity confinement.
    pub fn apply_vorticity(&mut self, dt: f32) -> Result<(), FluidError> {
        let Some((mut passes, fields, config)) = self.parts() else {
            return Ok(());
        };
        let texel_size = fields.velocity.texel_size();

        passes.run(
            &ProgramKey::plain(Material::Curl),
            DrawCall::new(PassUniforms::stencil(texel_size), Target::Field(&fields.curl))
                .input(fields.velocity.read().attach(0)?),
        )?;

        let swapped = passes.run(
            &ProgramKey::plain(Material::Vorticity),
            DrawCall::new(
                PassUniforms::vorticity(texel_size, config.curl, dt),
                Target::Field(fields.velocity.write()),
            )
            .input(fields.velocity.read().attach(0)?)
            .input(fields.curl.attach(1)?),
        )?;
        if swapped {
            fields.velocity.swap();
        }
        Ok(())
    }

    /// Writes the velocity divergence, reflecting velocity at the walls.
    pub fn compute_divergence(&mut self) -> Result<(), FluidError> {
        let Some((mut passes, fields, _)) = self.parts() else {
            return Ok(());
        };
        passes.run(
            &ProgramKey::plain(Material::Divergence),
            DrawCall::new(
                PassUniforms::stencil(fields.velocity.texel_size()),
                Target::Field(&fields.divergence),
            )
            .input(fields.velocity.read().attach(0)?),
        )?;
        Ok(())
    }

    /// Decays the previous pressure by `pressure_dissipation`, then relaxes
    /// it against the divergence with `iterations` Jacobi sweeps.
    pub fn solve_pressure(&mut self, iterations: u32) -> Result<(), FluidError> {
        let Some((mut passes, fields, config)) = self.parts() else {
            return Ok(());
        };
        let texel_size = fields.pressure.texel_size();

        let swapped = passes.run(
            &ProgramKey::plain(Material::Clear),
            DrawCall::new(
                PassUniforms::clear(config.pressure_dissipation),
                Target::Field(fields.pressure.write()),
            )
            .input(fields.pressure.read().attach(0)?),
        )?;
        if swapped {
            fields.pressure.swap();
        }

        let key = ProgramKey::plain(Material::Pressure);
        for _ in 0..iterations {
            let swapped = passes.run(
                &key,
                DrawCall::new(
                    PassUniforms::stencil(texel_size),
                    Target::Field(fields.pressure.write()),
                )
                .input(fields.pressure.read().attach(0)?)
                .input(fields.divergence.attach(1)?),
            )?;
            if !swapped {
                break;
            }
            fields.pressure.swap();
        }
        Ok(())
    }

    /// Projects velocity onto its divergence-free part.
    pub fn subtract_gradient(&mut self) -> Result<(), FluidError> {
        let Some((mut passes, fields, _)) = self.parts() else {
            return Ok(());
        };
        let swapped = passes.run(
            &ProgramKey::plain(Material::GradientSubtract),
            DrawCall::new(
                PassUniforms::stencil(fields.velocity.texel_size()),
                Target::Field(fields.velocity.write()),
            )
            .input(fields.pressure.read().attach(0)?)
            .input(fields.velocity.read().attach(1)?),
        )?;
        if swapped {
            fields.velocity.swap();
        }
        Ok(())
    }

    /// Adds a Gaussian impulse of velocity `(dx, dy)` and dye `color` at
    /// `(x, y)`, both normalized with the origin at the bottom-left.
    pub fn splat(&mut self, x: f32, y: f32, dx: f32, dy: f32, color: Color) -> Result<(), FluidError> {
        let aspect = aspect_ratio(self.canvas);
        let radius = correct_radius(self.config.splat_radius / 100.0, self.canvas);
        let Some((mut passes, fields, _)) = self.parts() else {
            return Ok(());
        };
        // Fields store row 0 at the top.
        let point = [x, 1.0 - y];
        let key = ProgramKey::plain(Material::Splat);

        let swapped = passes.run(
            &key,
            DrawCall::new(
                PassUniforms::splat(point, aspect, radius, [dx, -dy, 0.0]),
                Target::Field(fields.velocity.write()),
            )
            .input(fields.velocity.read().attach(0)?),
        )?;
        if swapped {
            fields.velocity.swap();
        }

        let swapped = passes.run(
            &key,
            DrawCall::new(
                PassUniforms::splat(point, aspect, radius, color.to_array()),
                Target::Field(fields.dye.write()),
            )
            .input(fields.dye.read().attach(0)?),
        )?;
        if swapped {
            fields.dye.swap();
        }
        Ok(())
    }

    /// Fires `amount` splats at random positions with random colours and velocities.
    pub fn multiple_splats(&mut self, amount: u32) -> Result<(), FluidError> {
        for _ in 0..amount {
            let color = generate_color(&mut self.rng).scaled(10.0);
            let x: f32 = self.rng.gen();
            let y: f32 = self.rng.gen();
            let dx = 1000.0 * (self.rng.gen::<f32>() - 0.5);
            let dy = 1000.0 * (self.rng.gen::<f32>() - 0.5);
            self.splat(x, y, dx, dy, color)?;
        }
        Ok(())
    }

    /// Schedules a burst of `amount` random splats for the next input phase.
    pub fn queue_splats(&mut self, amount: u32) {
        self.splat_stack.push(amount);
    }

    /// Schedules a burst whose size is drawn from the simulation's own RNG.
    pub fn queue_random_splats(&mut self) -> u32 {
        let amount = self.rng.gen_range(RANDOM_BURST);
        self.queue_splats(amount);
        amount
    }

    pub fn pending_bursts(&self) -> usize {
        self.splat_stack.len()
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        self.pointers.handle(event, &self.config, &mut self.rng);
    }

    pub fn pointers(&self) -> &Pointers {
        &self.pointers
    }

    /// Consumes one queued burst and every pending pointer splat.
    pub fn apply_inputs(&mut self) -> Result<(), FluidError> {
        if let Some(amount) = self.splat_stack.pop() {
            tracing::debug!(amount, "firing queued splats");
            self.multiple_splats(amount)?;
        }
        for splat in self.pointers.take_splats(self.canvas) {
            self.splat(splat.x, splat.y, splat.dx, splat.dy, splat.color)?;
        }
        Ok(())
    }

    /// Composites the dye field onto `target`.
    pub fn render(&mut self, target: Target<'_, B::Texture>) -> Result<(), FluidError> {
        let Some((mut passes, fields, config)) = self.parts() else {
            return Ok(());
        };
        let keywords = if config.shading {
            KeywordSet::new().with(SHADING)
        } else {
            KeywordSet::new()
        };
        let call = DrawCall::new(PassUniforms::display(fields.dye.texel_size()), target)
            .input(fields.dye.read().attach(0)?);
        let call = if config.transparent {
            call.clear([0.0; 4]).blend(Blend::Replace)
        } else {
            let back = config.back_color;
            call.clear([back.r, back.g, back.b, 1.0])
                .blend(Blend::PremultipliedOver)
        };
        passes.run(&ProgramKey::new(Material::Display, keywords), call)?;
        Ok(())
    }

    /// The per-frame body: resize check, inputs, one tick, composite, present.
    pub fn frame(&mut self, dt: f32) -> Result<FrameOutcome, FluidError> {
        if let Some((width, height)) = self.pending_resize.take() {
            if self.resize(width, height)? {
                tracing::info!(width, height, "canvas resized");
            }
        }
        self.apply_inputs()?;
        self.step(dt)?;

        let outcome = match self.render(Target::Surface) {
            Ok(()) => FrameOutcome::Presented,
            Err(FluidError::Backend(err)) if err.is_transient() => {
                tracing::debug!(error = %err, "surface unavailable; skipping frame");
                FrameOutcome::Skipped
            }
            Err(err) => return Err(err),
        };
        self.backend.present()?;
        Ok(outcome)
    }

    /// Copies the read side of `kind` back to the host, row 0 first.
    pub fn read(&mut self, kind: FieldKind) -> Result<Vec<[f32; 4]>, FluidError> {
        let Some(fields) = self.fields.as_ref() else {
            return Err(FluidError::Backend(BackendError::Unsupported(
                "reading fields before initialisation",
            )));
        };
        Ok(self.backend.read_field(fields.get(kind))?)
    }

    /// Sum of squared dye intensity over the whole grid.
    pub fn dye_energy(&mut self) -> Result<f64, FluidError> {
        let texels = self.read(FieldKind::Dye)?;
        Ok(texels
            .iter()
            .map(|texel| texel[..3].iter().map(|c| (*c as f64).powi(2)).sum::<f64>())
            .sum())
    }

    /// Mean absolute divergence of the current velocity.
    pub fn mean_abs_divergence(&mut self) -> Result<f64, FluidError> {
        self.compute_divergence()?;
        let texels = self.read(FieldKind::Divergence)?;
        let total: f64 = texels.iter().map(|texel| (texel[0] as f64).abs()).sum();
        Ok(total / texels.len().max(1) as f64)
    }

    pub fn fields(&self) -> Option<&FieldSet<B::Texture>> {
        self.fields.as_ref()
    }

    /// Configuration in effect after capability degradation.
    pub fn config(&self) -> &FluidConfig {
        &self.config
    }

    /// Configuration as supplied by the caller.
    pub fn requested_config(&self) -> &FluidConfig {
        &self.requested
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn canvas(&self) -> (u32, u32) {
        self.canvas
    }

    pub fn programs(&self) -> &ProgramCache<B::Program> {
        &self.programs
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

fn fitted_grid(label: &'static str, resolution: u32, canvas: (u32, u32), max: u32) -> GridSize {
    let wanted = derive_resolution(resolution, canvas);
    let grid = wanted.fit_within(max);
    if grid != wanted {
        tracing::warn!(
            field = label,
            wanted_width = wanted.width,
            wanted_height = wanted.height,
            width = grid.width,
            height = grid.height,
            "grid exceeds the texture limit; shrinking"
        );
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::SoftwareBackend;

    fn simulation(width: u32, height: u32) -> FluidSimulation<SoftwareBackend> {
        let config = FluidConfig {
            sim_resolution: 16,
            dye_resolution: 32,
            ignition_splats: Some(0),
            ..FluidConfig::default()
        };
        let mut sim = FluidSimulation::with_seed(SoftwareBackend::new(width, height), config, 3);
        sim.initialize().unwrap();
        sim
    }

    #[test]
    fn initialise_allocates_aspect_consistent_grids() {
        let sim = simulation(200, 100);
        let fields = sim.fields().unwrap();
        assert_eq!(fields.velocity.size(), GridSize::new(32, 16));
        assert_eq!(fields.dye.size(), GridSize::new(64, 32));
        assert_eq!(fields.divergence.size(), fields.velocity.size());
        assert_eq!(fields.velocity.read().filter(), FilterMode::Linear);
        assert_eq!(fields.pressure.read().filter(), FilterMode::Nearest);
    }

    #[test]
    fn resize_reallocates_with_new_texel_size() {
        let mut sim = simulation(100, 100);
        assert!(sim.resize(100, 300).unwrap());
        let fields = sim.fields().unwrap();
        assert_eq!(fields.velocity.size(), GridSize::new(16, 48));
        assert_eq!(fields.velocity.texel_size(), [1.0 / 16.0, 1.0 / 48.0]);
        assert_eq!(fields.dye.texel_size(), [1.0 / 32.0, 1.0 / 96.0]);
    }

    #[test]
    fn resize_ignores_zero_and_unchanged_canvases() {
        let mut sim = simulation(100, 100);
        assert!(!sim.resize(0, 100).unwrap());
        assert!(!sim.resize(100, 100).unwrap());
        assert_eq!(sim.canvas(), (100, 100));
    }

    #[test]
    fn pending_resize_applies_at_frame_start() {
        let mut sim = simulation(100, 100);
        sim.request_resize(50, 100);
        sim.frame(1.0 / 60.0).unwrap();
        assert_eq!(sim.canvas(), (50, 100));
        assert_eq!(sim.backend().surface_size(), (50, 100));
    }

    #[test]
    fn uninitialised_simulation_does_nothing() {
        let mut sim = FluidSimulation::new(SoftwareBackend::new(8, 8), FluidConfig::default());
        sim.step(0.016).unwrap();
        sim.splat(0.5, 0.5, 1.0, 1.0, Color::new(1.0, 1.0, 1.0)).unwrap();
        assert!(!sim.is_initialized());
        assert!(sim.programs().is_empty());
    }

    #[test]
    fn failed_pass_is_skipped_and_others_still_run() {
        let mut backend = SoftwareBackend::new(64, 64);
        backend.reject_material(Material::Vorticity);
        let config = FluidConfig {
            sim_resolution: 16,
            dye_resolution: 16,
            ignition_splats: Some(0),
            ..FluidConfig::default()
        };
        let mut sim = FluidSimulation::with_seed(backend, config, 1);
        sim.initialize().unwrap();
        sim.splat(0.5, 0.5, 50.0, 0.0, Color::new(1.0, 0.0, 0.0)).unwrap();

        for _ in 0..3 {
            sim.step(1.0 / 60.0).unwrap();
        }
        assert!(sim.dye_energy().unwrap() > 0.0);
        let vorticity = ProgramKey::plain(Material::Vorticity);
        assert!(matches!(
            sim.programs().slot(&vorticity),
            Some(crate::program::ProgramSlot::Failed(_))
        ));
        assert_eq!(
            sim.programs().compilations(),
            sim.programs().len(),
            "failed programs must not be recompiled"
        );
    }

    #[test]
    fn degraded_backend_lowers_dye_resolution() {
        let caps = Capabilities {
            tier: crate::types::ApiTier::Legacy,
            format: crate::types::FieldFormat::Rgba8Unorm,
            linear_filtering: false,
            max_texture_dimension: crate::types::DEFAULT_MAX_TEXTURE_DIMENSION,
        };
        let backend = SoftwareBackend::with_capabilities(400, 400, caps);
        let mut sim = FluidSimulation::new(backend, FluidConfig::default());
        sim.initialize().unwrap();
        assert_eq!(sim.config().dye_resolution, 256);
        assert!(!sim.config().shading);
        assert_eq!(sim.requested_config().dye_resolution, 512);
        let fields = sim.fields().unwrap();
        assert_eq!(fields.dye.size(), GridSize::new(256, 256));
        assert_eq!(fields.dye.read().filter(), FilterMode::Nearest);
    }

    #[test]
    fn extreme_canvases_stay_within_the_texture_limit() {
        let caps = Capabilities {
            max_texture_dimension: 64,
            ..SoftwareBackend::new(1, 1).capabilities()
        };
        let config = FluidConfig {
            sim_resolution: 16,
            dye_resolution: 20_000,
            ignition_splats: Some(2),
            ..FluidConfig::default()
        };
        let backend = SoftwareBackend::with_capabilities(400, 10, caps);
        let mut sim = FluidSimulation::with_seed(backend, config, 9);
        sim.initialize().unwrap();

        let fields = sim.fields().unwrap();
        assert_eq!(fields.velocity.size(), GridSize::new(64, 2));
        assert_eq!(fields.dye.size(), GridSize::new(64, 2));

        assert!(sim.resize(4000, 100).unwrap());
        let fields = sim.fields().unwrap();
        let dye = fields.dye.size();
        assert!(dye.width <= 64 && dye.height <= 64);
        assert!(fields.velocity.size().width <= 64);
        sim.frame(1.0 / 60.0).unwrap();
    }

    #[test]
    fn oversized_fields_are_rejected_by_the_backend() {
        let caps = Capabilities {
            max_texture_dimension: 32,
            ..SoftwareBackend::new(1, 1).capabilities()
        };
        let mut backend = SoftwareBackend::with_capabilities(8, 8, caps);
        let err = backend
            .create_field(FieldDescriptor {
                label: "dye",
                size: GridSize::new(33, 8),
                format: caps.format,
                filter: FilterMode::Linear,
            })
            .unwrap_err();
        assert!(matches!(err, BackendError::FieldTooLarge { max: 32, .. }));
    }

    #[test]
    fn seeded_random_bursts_repeat() {
        let sizes = |seed| {
            let backend = SoftwareBackend::new(8, 8);
            let mut sim = FluidSimulation::with_seed(backend, FluidConfig::default(), seed);
            (0..4).map(|_| sim.queue_random_splats()).collect::<Vec<_>>()
        };
        let first = sizes(11);
        assert_eq!(first, sizes(11));
        assert!(first.iter().all(|amount| RANDOM_BURST.contains(amount)));

        let mut sim = simulation(16, 16);
        let amount = sim.queue_random_splats();
        assert_eq!(sim.pending_bursts(), 1);
        assert!(amount >= 5);
    }

    #[test]
    fn ignition_burst_is_consumed_by_the_first_frame() {
        let config = FluidConfig {
            sim_resolution: 8,
            dye_resolution: 8,
            ignition_splats: Some(3),
            ..FluidConfig::default()
        };
        let mut sim = FluidSimulation::with_seed(SoftwareBackend::new(32, 32), config, 5);
        sim.initialize().unwrap();
        assert_eq!(sim.pending_bursts(), 1);
        sim.frame(1.0 / 60.0).unwrap();
        assert_eq!(sim.pending_bursts(), 0);
        assert!(sim.dye_energy().unwrap() > 0.0);
        assert_eq!(sim.backend().frames_presented(), 1);
    }
}
