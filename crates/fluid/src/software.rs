//! CPU rasterizer that runs the same passes as the GPU programs.
//!
//! Every draw evaluates its pass once per target texel centre, sampling its
//! inputs with the same rules a GPU sampler applies: clamp-to-edge
//! addressing and either nearest or bilinear filtering. The test suite runs
//! the whole simulation on this backend; it also works as a headless
//! renderer.

use std::cell::{Ref, RefCell};
use std::collections::HashSet;

use crate::backend::{validate_draw, Backend, Blend, DrawCall, Target};
use crate::error::{BackendError, ProgramError};
use crate::field::{Field, FieldDescriptor};
use crate::program::{Material, ProgramKey, SHADING};
use crate::types::{ApiTier, Capabilities, FieldFormat, FilterMode, DEFAULT_MAX_TEXTURE_DIMENSION};
use crate::uniforms::PassUniforms;

type Texel = [f32; 4];

/// Host memory behind a software field.
#[derive(Debug)]
pub struct SoftTexture {
    texels: RefCell<Vec<Texel>>,
}

impl SoftTexture {
    fn zeroed(count: usize) -> Self {
        Self {
            texels: RefCell::new(vec![[0.0; 4]; count]),
        }
    }
}

/// A "compiled" software program: the pass plus its keyword switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftProgram {
    material: Material,
    shading: bool,
}

#[derive(Debug)]
pub struct SoftwareBackend {
    capabilities: Capabilities,
    size: (u32, u32),
    frame: Vec<Texel>,
    rejected: HashSet<Material>,
    frames_presented: u64,
}

impl SoftwareBackend {
    /// Full-quality backend: 32-bit float fields with bilinear filtering.
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_capabilities(
            width,
            height,
            Capabilities {
                tier: ApiTier::Software,
                format: FieldFormat::Rgba32Float,
                linear_filtering: true,
                max_texture_dimension: DEFAULT_MAX_TEXTURE_DIMENSION,
            },
        )
    }

    pub fn with_capabilities(width: u32, height: u32, capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            size: (width, height),
            frame: vec![[0.0; 4]; width as usize * height as usize],
            rejected: HashSet::new(),
            frames_presented: 0,
        }
    }

    /// Makes every later compile of `material` fail, as a broken driver would.
    pub fn reject_material(&mut self, material: Material) {
        self.rejected.insert(material);
    }

    /// The surface contents, row 0 first.
    pub fn frame(&self) -> &[Texel] {
        &self.frame
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }
}

impl Backend for SoftwareBackend {
    type Texture = SoftTexture;
    type Program = SoftProgram;

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn surface_size(&self) -> (u32, u32) {
        self.size
    }

    fn resize_surface(&mut self, width: u32, height: u32) -> Result<(), BackendError> {
        self.size = (width, height);
        self.frame = vec![[0.0; 4]; width as usize * height as usize];
        Ok(())
    }

    fn create_field(
        &mut self,
        descriptor: FieldDescriptor,
    ) -> Result<Field<SoftTexture>, BackendError> {
        descriptor.check_limit(self.capabilities.max_texture_dimension)?;
        let texture = SoftTexture::zeroed(descriptor.size.texel_count());
        Ok(Field::new(texture, descriptor))
    }

    fn compile(&mut self, key: &ProgramKey) -> Result<SoftProgram, ProgramError> {
        if self.rejected.contains(&key.material) {
            return Err(ProgramError::Compile {
                material: key.material,
                keywords: key.keywords.to_string(),
                message: "program rejected by the software backend".into(),
            });
        }
        Ok(SoftProgram {
            material: key.material,
            shading: key.keywords.contains(SHADING),
        })
    }

    fn draw(&mut self, program: &SoftProgram, call: &DrawCall<'_, SoftTexture>) -> Result<(), BackendError> {
        validate_draw(call)?;

        let slot0 = call.slot(0).map(Sampler::new);
        let slot1 = call.slot(1).map(Sampler::new);
        let inputs = Inputs {
            slot0: slot0.as_ref(),
            slot1: slot1.as_ref(),
        };
        let fragment = |uv: [f32; 2]| shade(program, &call.uniforms, &inputs, uv);

        match call.target {
            Target::Field(field) => {
                let mut texels = field.texture().texels.borrow_mut();
                let output = Output {
                    width: field.width(),
                    height: field.height(),
                    normalized: field.format().is_normalized(),
                };
                output.rasterize(&mut texels, call.clear, call.blend, fragment);
            }
            Target::Surface => {
                let output = Output {
                    width: self.size.0,
                    height: self.size.1,
                    normalized: true,
                };
                output.rasterize(&mut self.frame, call.clear, call.blend, fragment);
            }
        }
        Ok(())
    }

    fn present(&mut self) -> Result<(), BackendError> {
        self.frames_presented += 1;
        Ok(())
    }

    fn read_field(&mut self, field: &Field<SoftTexture>) -> Result<Vec<Texel>, BackendError> {
        Ok(field.texture().texels.borrow().clone())
    }
}

struct Output {
    width: u32,
    height: u32,
    normalized: bool,
}

impl Output {
    fn rasterize<F>(&self, texels: &mut [Texel], clear: Option<Texel>, blend: Blend, shade: F)
    where
        F: Fn([f32; 2]) -> Texel,
    {
        if let Some(color) = clear {
            texels.fill(color);
        }
        let (width, height) = (self.width as f32, self.height as f32);
        for y in 0..self.height {
            for x in 0..self.width {
                let uv = [(x as f32 + 0.5) / width, (y as f32 + 0.5) / height];
                let src = shade(uv);
                let dst = &mut texels[(y * self.width + x) as usize];
                let mut color = match blend {
                    Blend::Replace => src,
                    Blend::PremultipliedOver => {
                        let keep = 1.0 - src[3];
                        std::array::from_fn(|i| src[i] + dst[i] * keep)
                    }
                };
                if self.normalized {
                    for channel in &mut color {
                        *channel = channel.clamp(0.0, 1.0);
                    }
                }
                *dst = color;
            }
        }
    }
}

struct Sampler<'a> {
    texels: Ref<'a, Vec<Texel>>,
    width: u32,
    height: u32,
    filter: FilterMode,
}

impl<'a> Sampler<'a> {
    fn new(field: &'a Field<SoftTexture>) -> Self {
        Self {
            texels: field.texture().texels.borrow(),
            width: field.width(),
            height: field.height(),
            filter: field.filter(),
        }
    }

    fn fetch(&self, x: i64, y: i64) -> Texel {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.texels[y * self.width as usize + x]
    }

    fn sample(&self, uv: [f32; 2]) -> Texel {
        let (width, height) = (self.width as f32, self.height as f32);
        match self.filter {
            FilterMode::Nearest => {
                self.fetch((uv[0] * width).floor() as i64, (uv[1] * height).floor() as i64)
            }
            FilterMode::Linear => {
                let fx = uv[0] * width - 0.5;
                let fy = uv[1] * height - 0.5;
                let x0 = fx.floor();
                let y0 = fy.floor();
                let tx = fx - x0;
                let ty = fy - y0;
                let (x0, y0) = (x0 as i64, y0 as i64);
                let a = self.fetch(x0, y0);
                let b = self.fetch(x0 + 1, y0);
                let c = self.fetch(x0, y0 + 1);
                let d = self.fetch(x0 + 1, y0 + 1);
                std::array::from_fn(|i| {
                    let top = a[i] + (b[i] - a[i]) * tx;
                    let bottom = c[i] + (d[i] - c[i]) * tx;
                    top + (bottom - top) * ty
                })
            }
        }
    }
}

struct Inputs<'s, 'a> {
    slot0: Option<&'s Sampler<'a>>,
    slot1: Option<&'s Sampler<'a>>,
}

impl Inputs<'_, '_> {
    fn slot0(&self, uv: [f32; 2]) -> Texel {
        self.slot0.map_or([0.0; 4], |sampler| sampler.sample(uv))
    }

    fn slot1(&self, uv: [f32; 2]) -> Texel {
        self.slot1.map_or([0.0; 4], |sampler| sampler.sample(uv))
    }
}

/// Evaluates one fragment of `program` at `uv`.
fn shade(program: &SoftProgram, params: &PassUniforms, inputs: &Inputs<'_, '_>, uv: [f32; 2]) -> Texel {
    let [tx, ty] = params.texel_size;
    let l = [uv[0] - tx, uv[1]];
    let r = [uv[0] + tx, uv[1]];
    let t = [uv[0], uv[1] + ty];
    let b = [uv[0], uv[1] - ty];

    match program.material {
        Material::Clear => inputs.slot0(uv).map(|channel| params.value * channel),
        Material::Splat => {
            let px = (uv[0] - params.point[0]) * params.aspect_ratio;
            let py = uv[1] - params.point[1];
            let falloff = (-(px * px + py * py) / params.radius).exp();
            let base = inputs.slot0(uv);
            [
                base[0] + falloff * params.color[0],
                base[1] + falloff * params.color[1],
                base[2] + falloff * params.color[2],
                1.0,
            ]
        }
        Material::Advection => {
            let velocity = inputs.slot0(uv);
            let coord = [
                uv[0] - params.dt * velocity[0] * tx,
                uv[1] - params.dt * velocity[1] * ty,
            ];
            let decay = 1.0 + params.dissipation * params.dt;
            inputs.slot1(coord).map(|channel| channel / decay)
        }
        Material::Curl => {
            let vorticity = inputs.slot0(r)[1] - inputs.slot0(l)[1] - inputs.slot0(t)[0]
                + inputs.slot0(b)[0];
            [0.5 * vorticity, 0.0, 0.0, 1.0]
        }
        Material::Vorticity => {
            let left = inputs.slot1(l)[0];
            let right = inputs.slot1(r)[0];
            let top = inputs.slot1(t)[0];
            let bottom = inputs.slot1(b)[0];
            let centre = inputs.slot1(uv)[0];

            let mut force = [
                0.5 * (top.abs() - bottom.abs()),
                0.5 * (right.abs() - left.abs()),
            ];
            let length = (force[0] * force[0] + force[1] * force[1]).sqrt() + 0.0001;
            force = [force[0] / length, force[1] / length];
            force = [force[0] * params.curl * centre, force[1] * params.curl * centre];
            force[1] *= -1.0;

            let velocity = inputs.slot0(uv);
            [
                velocity[0] + force[0] * params.dt,
                velocity[1] + force[1] * params.dt,
                0.0,
                1.0,
            ]
        }
        Material::Divergence => {
            let centre = inputs.slot0(uv);
            let left = if l[0] < 0.0 { -centre[0] } else { inputs.slot0(l)[0] };
            let right = if r[0] > 1.0 { -centre[0] } else { inputs.slot0(r)[0] };
            let top = if t[1] > 1.0 { -centre[1] } else { inputs.slot0(t)[1] };
            let bottom = if b[1] < 0.0 { -centre[1] } else { inputs.slot0(b)[1] };
            [0.5 * (right - left + top - bottom), 0.0, 0.0, 1.0]
        }
        Material::Pressure => {
            let sum = inputs.slot0(l)[0] + inputs.slot0(r)[0] + inputs.slot0(b)[0] + inputs.slot0(t)[0];
            let divergence = inputs.slot1(uv)[0];
            [(sum - divergence) * 0.25, 0.0, 0.0, 1.0]
        }
        Material::GradientSubtract => {
            let left = inputs.slot0(l)[0];
            let right = inputs.slot0(r)[0];
            let top = inputs.slot0(t)[0];
            let bottom = inputs.slot0(b)[0];
            let velocity = inputs.slot1(uv);
            [
                velocity[0] - 0.5 * (right - left),
                velocity[1] - 0.5 * (top - bottom),
                0.0,
                1.0,
            ]
        }
        Material::Display => {
            let mut color = inputs.slot0(uv);
            if program.shading {
                let luminance = |texel: Texel| {
                    (texel[0] * texel[0] + texel[1] * texel[1] + texel[2] * texel[2]).sqrt()
                };
                let dx = luminance(inputs.slot0(r)) - luminance(inputs.slot0(l));
                let dy = luminance(inputs.slot0(t)) - luminance(inputs.slot0(b));
                let dz = (tx * tx + ty * ty).sqrt();
                let normal_z = dz / (dx * dx + dy * dy + dz * dz).sqrt();
                let diffuse = (normal_z + 0.7).clamp(0.7, 1.0);
                for channel in &mut color[..3] {
                    *channel *= diffuse;
                }
            }
            color[3] = color[0].max(color[1]).max(color[2]);
            color
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::KeywordSet;
    use crate::resolution::GridSize;

    fn descriptor(label: &'static str, width: u32, height: u32, filter: FilterMode) -> FieldDescriptor {
        FieldDescriptor {
            label,
            size: GridSize::new(width, height),
            format: FieldFormat::Rgba32Float,
            filter,
        }
    }

    fn fill(field: &Field<SoftTexture>, texels: &[Texel]) {
        field.texture().texels.borrow_mut().copy_from_slice(texels);
    }

    #[test]
    fn new_fields_are_zeroed() {
        let mut backend = SoftwareBackend::new(4, 4);
        let field = backend
            .create_field(descriptor("dye", 3, 2, FilterMode::Linear))
            .unwrap();
        let texels = backend.read_field(&field).unwrap();
        assert_eq!(texels.len(), 6);
        assert!(texels.iter().all(|texel| *texel == [0.0; 4]));
    }

    #[test]
    fn bilinear_sampling_at_texel_centres_is_exact() {
        let mut backend = SoftwareBackend::new(4, 4);
        let field = backend
            .create_field(descriptor("source", 2, 1, FilterMode::Linear))
            .unwrap();
        fill(&field, &[[1.0, 0.0, 0.0, 1.0], [3.0, 0.0, 0.0, 1.0]]);
        let sampler = Sampler::new(&field);
        assert_eq!(sampler.sample([0.25, 0.5])[0], 1.0);
        assert_eq!(sampler.sample([0.75, 0.5])[0], 3.0);
        assert_eq!(sampler.sample([0.5, 0.5])[0], 2.0);
        // Clamp to edge.
        assert_eq!(sampler.sample([-1.0, 0.5])[0], 1.0);
        assert_eq!(sampler.sample([2.0, 0.5])[0], 3.0);
    }

    #[test]
    fn clear_pass_scales_the_source() {
        let mut backend = SoftwareBackend::new(4, 4);
        let source = backend
            .create_field(descriptor("pressure", 2, 2, FilterMode::Nearest))
            .unwrap();
        let target = backend
            .create_field(descriptor("pressure", 2, 2, FilterMode::Nearest))
            .unwrap();
        fill(&source, &[[2.0, 0.0, 0.0, 1.0]; 4]);

        let program = backend.compile(&ProgramKey::plain(Material::Clear)).unwrap();
        let call = DrawCall::new(PassUniforms::clear(0.5), Target::Field(&target))
            .input(source.attach(0).unwrap());
        backend.draw(&program, &call).unwrap();

        let texels = backend.read_field(&target).unwrap();
        assert!(texels.iter().all(|texel| texel[0] == 1.0 && texel[3] == 0.5));
    }

    #[test]
    fn opaque_display_blends_over_the_clear_colour() {
        let mut backend = SoftwareBackend::new(2, 2);
        let dye = backend
            .create_field(descriptor("dye", 2, 2, FilterMode::Linear))
            .unwrap();
        fill(&dye, &[[0.5, 0.25, 0.0, 1.0]; 4]);

        let program = backend.compile(&ProgramKey::plain(Material::Display)).unwrap();
        let call = DrawCall::new(PassUniforms::display(dye.texel_size()), Target::Surface)
            .input(dye.attach(0).unwrap())
            .clear([0.0, 0.0, 1.0, 1.0])
            .blend(Blend::PremultipliedOver);
        backend.draw(&program, &call).unwrap();

        let pixel = backend.frame()[0];
        assert_eq!(pixel, [0.5, 0.25, 0.5, 1.0]);
    }

    #[test]
    fn rejected_materials_fail_to_compile() {
        let mut backend = SoftwareBackend::new(2, 2);
        backend.reject_material(Material::Curl);
        let key = ProgramKey::new(Material::Curl, KeywordSet::new());
        assert!(backend.compile(&key).is_err());
        assert!(backend.compile(&ProgramKey::plain(Material::Splat)).is_ok());
    }
}
