use bytemuck::{Pod, Zeroable};

/// Per-pass parameters, laid out as the std140 `PassParams` block.
///
/// Every program reads the same block; each constructor fills in only the
/// members its pass consumes and leaves the rest zeroed.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PassUniforms {
    pub texel_size: [f32; 2],
    pub dt: f32,
    pub dissipation: f32,
    pub point: [f32; 2],
    pub aspect_ratio: f32,
    pub radius: f32,
    pub color: [f32; 4],
    pub curl: f32,
    pub value: f32,
    pub padding: [f32; 2],
}

unsafe impl Zeroable for PassUniforms {}
unsafe impl Pod for PassUniforms {}

impl PassUniforms {
    /// Neighbour offsets only; used by curl, divergence, pressure and gradient passes.
    pub fn stencil(texel_size: [f32; 2]) -> Self {
        Self {
            texel_size,
            ..Self::default()
        }
    }

    pub fn advection(texel_size: [f32; 2], dt: f32, dissipation: f32) -> Self {
        Self {
            texel_size,
            dt,
            dissipation,
            ..Self::default()
        }
    }

    pub fn vorticity(texel_size: [f32; 2], curl: f32, dt: f32) -> Self {
        Self {
            texel_size,
            dt,
            curl,
            ..Self::default()
        }
    }

    /// Scales the sampled field by `value`.
    pub fn clear(value: f32) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    pub fn splat(point: [f32; 2], aspect_ratio: f32, radius: f32, color: [f32; 3]) -> Self {
        Self {
            point,
            aspect_ratio,
            radius,
            color: [color[0], color[1], color[2], 1.0],
            ..Self::default()
        }
    }

    pub fn display(texel_size: [f32; 2]) -> Self {
        Self::stencil(texel_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_matches_std140_layout() {
        assert_eq!(std::mem::size_of::<PassUniforms>(), 64);
        assert_eq!(std::mem::align_of::<PassUniforms>(), 16);
        assert_eq!(std::mem::offset_of!(PassUniforms, point), 16);
        assert_eq!(std::mem::offset_of!(PassUniforms, color), 32);
        assert_eq!(std::mem::offset_of!(PassUniforms, curl), 48);
    }

    #[test]
    fn constructors_only_touch_their_members() {
        let uniforms = PassUniforms::advection([0.5, 0.25], 0.016, 0.98);
        assert_eq!(uniforms.texel_size, [0.5, 0.25]);
        assert_eq!(uniforms.curl, 0.0);
        assert_eq!(uniforms.radius, 0.0);

        let clear = PassUniforms::clear(0.8);
        let bytes = bytemuck::bytes_of(&clear);
        assert_eq!(bytes.len(), 64);
    }
}
