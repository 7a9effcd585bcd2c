//! Pointer and touch tracking.
//!
//! Hosts feed raw events in canvas pixels (origin top-left). Each tracked
//! pointer turns its travel into a pending splat that the frame loop
//! consumes in its input phase.

use rand::Rng;

use crate::types::{Color, FluidConfig};

/// Pointer id used for the mouse; touches use their own ids.
pub const MOUSE_POINTER: u64 = u64::MAX;

/// A raw input event in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Moved { id: u64, x: f32, y: f32 },
    Pressed { id: u64, x: f32, y: f32 },
    Released { id: u64 },
    /// The pointer left the canvas or the touch was cancelled.
    Left { id: u64 },
}

/// A splat produced by pointer motion, in normalized coordinates with y up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSplat {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pointer {
    pub id: u64,
    /// Last position in canvas pixels, origin top-left.
    pub x: f32,
    pub y: f32,
    /// Velocity to inject, y up.
    pub dx: f32,
    pub dy: f32,
    pub color: Color,
    pub down: bool,
    pub moved: bool,
    tracking: bool,
}

impl Pointer {
    fn new(id: u64, color: Color) -> Self {
        Self {
            id,
            x: 0.0,
            y: 0.0,
            dx: 0.0,
            dy: 0.0,
            color,
            down: false,
            moved: false,
            tracking: false,
        }
    }

    fn reset(&mut self) {
        self.dx = 0.0;
        self.dy = 0.0;
        self.down = false;
        self.moved = false;
        self.tracking = false;
    }
}

/// All pointers currently known to the canvas.
#[derive(Debug, Default)]
pub struct Pointers {
    pointers: Vec<Pointer>,
}

impl Pointers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: u64) -> Option<&Pointer> {
        self.pointers.iter().find(|pointer| pointer.id == id)
    }

    pub fn len(&self) -> usize {
        self.pointers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty()
    }

    fn entry(&mut self, id: u64, config: &FluidConfig) -> &mut Pointer {
        let index = match self.pointers.iter().position(|pointer| pointer.id == id) {
            Some(index) => index,
            None => {
                self.pointers.push(Pointer::new(id, config.hover_color));
                self.pointers.len() - 1
            }
        };
        &mut self.pointers[index]
    }

    /// Applies `event` and records any motion that should splat.
    pub fn handle<R: Rng>(
        &mut self,
        event: PointerEvent,
        config: &FluidConfig,
        rng: &mut R,
    ) {
        match event {
            PointerEvent::Moved { id, x, y } => {
                let pointer = self.entry(id, config);
                if pointer.tracking {
                    let (dx, dy) = clamp_force(
                        (x - pointer.x) * config.pointer_force,
                        (pointer.y - y) * config.pointer_force,
                        config.splat_force,
                    );
                    pointer.dx = dx;
                    pointer.dy = dy;
                    pointer.moved = pointer.down || config.hover_splats;
                    if !pointer.down {
                        pointer.color = config.hover_color;
                    }
                }
                pointer.x = x;
                pointer.y = y;
                pointer.tracking = true;
            }
            PointerEvent::Pressed { id, x, y } => {
                let pointer = self.entry(id, config);
                pointer.x = x;
                pointer.y = y;
                pointer.dx = 0.0;
                pointer.dy = 0.0;
                pointer.down = true;
                pointer.moved = false;
                pointer.tracking = true;
                pointer.color = if config.colorful {
                    generate_color(rng)
                } else {
                    config.hover_color
                };
            }
            PointerEvent::Released { id } => {
                if let Some(pointer) = self.pointers.iter_mut().find(|p| p.id == id) {
                    pointer.down = false;
                }
            }
            PointerEvent::Left { id } => {
                if let Some(pointer) = self.pointers.iter_mut().find(|p| p.id == id) {
                    pointer.reset();
                }
            }
        }
    }

    /// Drains pending motion into splats for a canvas of `canvas` pixels.
    pub fn take_splats(&mut self, canvas: (u32, u32)) -> Vec<PointerSplat> {
        let (width, height) = (canvas.0.max(1) as f32, canvas.1.max(1) as f32);
        let mut splats = Vec::new();
        for pointer in &mut self.pointers {
            if !pointer.moved {
                continue;
            }
            pointer.moved = false;
            splats.push(PointerSplat {
                x: pointer.x / width,
                y: 1.0 - pointer.y / height,
                dx: pointer.dx,
                dy: pointer.dy,
                color: pointer.color,
            });
        }
        splats
    }
}

fn clamp_force(dx: f32, dy: f32, limit: f32) -> (f32, f32) {
    let magnitude = (dx * dx + dy * dy).sqrt();
    if magnitude > limit && magnitude > 0.0 {
        let scale = limit / magnitude;
        (dx * scale, dy * scale)
    } else {
        (dx, dy)
    }
}

/// A random saturated hue, dimmed so repeated splats do not blow out.
pub fn generate_color<R: Rng>(rng: &mut R) -> Color {
    hsv_to_rgb(rng.gen::<f32>(), 1.0, 1.0).scaled(0.15)
}

pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Color {
    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    match (sector as i64).rem_euclid(6) {
        0 => Color::new(v, t, p),
        1 => Color::new(q, v, p),
        2 => Color::new(p, v, t),
        3 => Color::new(p, q, v),
        4 => Color::new(t, p, v),
        _ => Color::new(v, p, q),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn approx(a: Color, b: Color) -> bool {
        (a.r - b.r).abs() < 1e-6 && (a.g - b.g).abs() < 1e-6 && (a.b - b.b).abs() < 1e-6
    }

    #[test]
    fn hsv_primaries() {
        assert!(approx(hsv_to_rgb(0.0, 1.0, 1.0), Color::new(1.0, 0.0, 0.0)));
        assert!(approx(hsv_to_rgb(1.0 / 3.0, 1.0, 1.0), Color::new(0.0, 1.0, 0.0)));
        assert!(approx(hsv_to_rgb(2.0 / 3.0, 1.0, 1.0), Color::new(0.0, 0.0, 1.0)));
        assert!(approx(hsv_to_rgb(0.5, 0.0, 0.4), Color::new(0.4, 0.4, 0.4)));
    }

    #[test]
    fn generated_colors_are_dimmed() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..32 {
            let color = generate_color(&mut rng);
            let max = color.r.max(color.g).max(color.b);
            assert!((max - 0.15).abs() < 1e-6);
        }
    }

    #[test]
    fn drag_produces_scaled_delta_with_y_up() {
        let config = FluidConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut pointers = Pointers::new();

        pointers.handle(PointerEvent::Pressed { id: 1, x: 100.0, y: 100.0 }, &config, &mut rng);
        pointers.handle(PointerEvent::Moved { id: 1, x: 110.0, y: 96.0 }, &config, &mut rng);

        let splats = pointers.take_splats((200, 200));
        assert_eq!(splats.len(), 1);
        let splat = splats[0];
        assert_eq!(splat.dx, 10.0 * config.pointer_force);
        assert_eq!(splat.dy, 4.0 * config.pointer_force);
        assert!((splat.x - 0.55).abs() < 1e-6);
        assert!((splat.y - 0.52).abs() < 1e-6);
        assert!(pointers.take_splats((200, 200)).is_empty());
    }

    #[test]
    fn first_hover_sample_only_tracks_position() {
        let config = FluidConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut pointers = Pointers::new();

        pointers.handle(PointerEvent::Moved { id: MOUSE_POINTER, x: 50.0, y: 50.0 }, &config, &mut rng);
        assert!(pointers.take_splats((100, 100)).is_empty());

        pointers.handle(PointerEvent::Moved { id: MOUSE_POINTER, x: 60.0, y: 50.0 }, &config, &mut rng);
        let splats = pointers.take_splats((100, 100));
        assert_eq!(splats.len(), 1);
        assert_eq!(splats[0].color, config.hover_color);
    }

    #[test]
    fn hover_is_ignored_without_hover_splats() {
        let config = FluidConfig {
            hover_splats: false,
            ..FluidConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let mut pointers = Pointers::new();

        pointers.handle(PointerEvent::Moved { id: 3, x: 0.0, y: 0.0 }, &config, &mut rng);
        pointers.handle(PointerEvent::Moved { id: 3, x: 5.0, y: 5.0 }, &config, &mut rng);
        assert!(pointers.take_splats((10, 10)).is_empty());
    }

    #[test]
    fn leaving_resets_the_pointer() {
        let config = FluidConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut pointers = Pointers::new();

        pointers.handle(PointerEvent::Pressed { id: 9, x: 1.0, y: 1.0 }, &config, &mut rng);
        pointers.handle(PointerEvent::Moved { id: 9, x: 4.0, y: 1.0 }, &config, &mut rng);
        pointers.handle(PointerEvent::Left { id: 9 }, &config, &mut rng);

        let pointer = pointers.get(9).unwrap();
        assert!(!pointer.down);
        assert!(!pointer.moved);
        assert_eq!((pointer.dx, pointer.dy), (0.0, 0.0));
        assert!(pointers.take_splats((10, 10)).is_empty());
    }

    #[test]
    fn pointer_force_is_capped_by_splat_force() {
        let config = FluidConfig {
            splat_force: 10.0,
            ..FluidConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let mut pointers = Pointers::new();

        pointers.handle(PointerEvent::Pressed { id: 2, x: 0.0, y: 0.0 }, &config, &mut rng);
        pointers.handle(PointerEvent::Moved { id: 2, x: 300.0, y: 400.0 }, &config, &mut rng);
        let splat = pointers.take_splats((1000, 1000))[0];
        assert!((splat.dx - 6.0).abs() < 1e-4);
        assert!((splat.dy + 8.0).abs() < 1e-4);
    }
}
