//! Desktop host: a winit window driving a [`FrameLoop`] over a [`GpuBackend`].

use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use crossbeam_channel::bounded;
use tracing::{debug, error, info, warn};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event, MouseButton, Touch, TouchPhase, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowBuilder;

use crate::error::FluidError;
use crate::frame::{FrameLoop, FrameStatus, LoopState};
use crate::gpu::GpuBackend;
use crate::pointer::{PointerEvent, MOUSE_POINTER};
use crate::simulation::FluidSimulation;
use crate::types::FluidConfig;

/// Everything needed to open the fluid window.
#[derive(Debug, Clone)]
pub struct WindowOptions {
    pub title: String,
    pub size: (u32, u32),
    pub config: FluidConfig,
    /// Fixed seed for splat positions and colours.
    pub seed: Option<u64>,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: "herofluid".to_string(),
            size: (1280, 720),
            config: FluidConfig::default(),
            seed: None,
        }
    }
}

/// Opens a window and runs the simulation until it is closed.
///
/// A machine without any usable graphics context is not an error: the
/// window is closed again and `Ok(())` is returned.
pub fn run_window(options: WindowOptions) -> Result<()> {
    let event_loop = EventLoopBuilder::new()
        .build()
        .map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window = WindowBuilder::new()
        .with_title(options.title.as_str())
        .with_inner_size(PhysicalSize::new(options.size.0, options.size.1))
        .with_transparent(options.config.transparent)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create fluid window: {err}"))?;
    let window = Arc::new(window);

    let size = window.inner_size();
    let backend = match GpuBackend::new(
        window.clone(),
        (size.width, size.height),
        options.config.transparent,
    ) {
        Ok(backend) => backend,
        Err(FluidError::NoContext(reason)) => {
            warn!(%reason, "no graphics context; the fluid background is disabled");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let time_step = options.config.time_step;
    let mut simulation = match options.seed {
        Some(seed) => FluidSimulation::with_seed(backend, options.config, seed),
        None => FluidSimulation::new(backend, options.config),
    };
    let mut frame_loop = FrameLoop::new(time_step);
    let handle = frame_loop.start(&mut simulation)?;
    info!(
        width = size.width,
        height = size.height,
        "fluid window running"
    );
    window.request_redraw();

    let (failure_tx, failure_rx) = bounded::<FluidError>(1);
    let mut cursor: Option<PhysicalPosition<f64>> = None;

    let run_result = event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                handle.stop();
                elwt.exit();
            }
            WindowEvent::Resized(new_size) => {
                simulation.request_resize(new_size.width, new_size.height);
            }
            WindowEvent::Occluded(occluded) => {
                if occluded {
                    handle.suspend();
                } else {
                    handle.resume();
                    window.request_redraw();
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                cursor = Some(position);
                simulation.handle_pointer(PointerEvent::Moved {
                    id: MOUSE_POINTER,
                    x: position.x as f32,
                    y: position.y as f32,
                });
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                let event = match (state, cursor) {
                    (ElementState::Pressed, Some(position)) => PointerEvent::Pressed {
                        id: MOUSE_POINTER,
                        x: position.x as f32,
                        y: position.y as f32,
                    },
                    (ElementState::Pressed, None) => return,
                    (ElementState::Released, _) => PointerEvent::Released { id: MOUSE_POINTER },
                };
                simulation.handle_pointer(event);
            }
            WindowEvent::CursorLeft { .. } => {
                cursor = None;
                simulation.handle_pointer(PointerEvent::Left { id: MOUSE_POINTER });
            }
            WindowEvent::Touch(touch) => {
                simulation.handle_pointer(touch_event(&touch));
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                match event.logical_key {
                    Key::Named(NamedKey::Space) => {
                        let amount = simulation.queue_random_splats();
                        debug!(amount, "queued keyboard burst");
                    }
                    Key::Named(NamedKey::Escape) => {
                        handle.stop();
                        elwt.exit();
                    }
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => match frame_loop.tick(&mut simulation, Instant::now()) {
                Ok(FrameStatus::Stopped) => elwt.exit(),
                Ok(_) => {}
                Err(err) => {
                    error!(error = %err, "fluid frame failed");
                    let _ = failure_tx.try_send(err);
                    elwt.exit();
                }
            },
            _ => {}
        },
        Event::AboutToWait => {
            if frame_loop.state() == LoopState::Running {
                window.request_redraw();
            }
            elwt.set_control_flow(ControlFlow::Wait);
        }
        _ => {}
    });

    if let Ok(err) = failure_rx.try_recv() {
        return Err(err.into());
    }
    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}

/// Maps a touch to the pointer keyed by its id.
fn touch_event(touch: &Touch) -> PointerEvent {
    touch_to_pointer(touch.id, touch.phase, touch.location)
}

fn touch_to_pointer(id: u64, phase: TouchPhase, location: PhysicalPosition<f64>) -> PointerEvent {
    let (x, y) = (location.x as f32, location.y as f32);
    match phase {
        TouchPhase::Started => PointerEvent::Pressed { id, x, y },
        TouchPhase::Moved => PointerEvent::Moved { id, x, y },
        TouchPhase::Ended => PointerEvent::Released { id },
        TouchPhase::Cancelled => PointerEvent::Left { id },
    }
}
