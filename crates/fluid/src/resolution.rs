//! Grid sizing derived from the canvas shape.

/// Width and height of a simulation grid in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSize {
    pub width: u32,
    pub height: u32,
}

impl GridSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn texel_size(&self) -> [f32; 2] {
        [1.0 / self.width as f32, 1.0 / self.height as f32]
    }

    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Shrinks both axes by the same factor until neither exceeds `max`.
    pub fn fit_within(self, max: u32) -> GridSize {
        let longest = self.width.max(self.height);
        if longest <= max {
            return self;
        }
        let scale = max as f32 / longest as f32;
        let shrink = |edge: u32| ((edge as f32 * scale).round() as u32).clamp(1, max);
        GridSize::new(shrink(self.width), shrink(self.height))
    }
}

/// Canvas width divided by canvas height.
pub fn aspect_ratio(canvas: (u32, u32)) -> f32 {
    canvas.0 as f32 / canvas.1.max(1) as f32
}

/// Derives a grid whose shorter axis is `resolution` texels and whose longer
/// axis follows the canvas aspect ratio.
pub fn derive_resolution(resolution: u32, canvas: (u32, u32)) -> GridSize {
    let mut aspect = aspect_ratio(canvas);
    if aspect < 1.0 {
        aspect = 1.0 / aspect;
    }

    let min = (resolution as f32).round().max(1.0) as u32;
    let max = (resolution as f32 * aspect).round().max(1.0) as u32;

    if canvas.0 > canvas.1 {
        GridSize::new(max, min)
    } else {
        GridSize::new(min, max)
    }
}

/// Stretches a splat radius on landscape canvases so splats stay round on screen.
pub fn correct_radius(radius: f32, canvas: (u32, u32)) -> f32 {
    let aspect = aspect_ratio(canvas);
    if aspect > 1.0 {
        radius * aspect
    } else {
        radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_canvas_yields_square_grid() {
        assert_eq!(derive_resolution(128, (800, 800)), GridSize::new(128, 128));
    }

    #[test]
    fn landscape_canvas_stretches_width() {
        assert_eq!(derive_resolution(128, (1920, 1080)), GridSize::new(228, 128));
        assert_eq!(derive_resolution(512, (1920, 1080)), GridSize::new(910, 512));
    }

    #[test]
    fn portrait_canvas_stretches_height() {
        assert_eq!(derive_resolution(128, (1080, 1920)), GridSize::new(128, 228));
    }

    #[test]
    fn sim_and_dye_grids_share_the_canvas_aspect() {
        let canvas = (1600, 900);
        let sim = derive_resolution(128, canvas);
        let dye = derive_resolution(512, canvas);
        let sim_aspect = sim.width as f32 / sim.height as f32;
        let dye_aspect = dye.width as f32 / dye.height as f32;
        assert!((sim_aspect - dye_aspect).abs() < 0.01);
    }

    #[test]
    fn fit_within_keeps_aspect_under_the_limit() {
        let wide = derive_resolution(512, (4000, 100));
        assert_eq!(wide, GridSize::new(20480, 512));
        assert_eq!(wide.fit_within(8192), GridSize::new(8192, 205));
        assert_eq!(GridSize::new(20000, 20000).fit_within(4096), GridSize::new(4096, 4096));
        assert_eq!(GridSize::new(100, 30000).fit_within(64), GridSize::new(1, 64));
        assert_eq!(GridSize::new(910, 512).fit_within(8192), GridSize::new(910, 512));
    }

    #[test]
    fn texel_size_is_reciprocal_of_dimensions() {
        let grid = GridSize::new(228, 128);
        assert_eq!(grid.texel_size(), [1.0 / 228.0, 1.0 / 128.0]);
    }

    #[test]
    fn correct_radius_scales_only_wide_canvases() {
        assert_eq!(correct_radius(0.005, (1000, 500)), 0.01);
        assert_eq!(correct_radius(0.005, (500, 500)), 0.005);
        assert_eq!(correct_radius(0.005, (500, 1000)), 0.005);
    }
}
