//! Stable-fluids hero background.
//!
//! A Navier-Stokes solver that lives entirely in textures: velocity, dye,
//! pressure, divergence and curl fields are advanced by full-screen passes
//! and the dye is composited onto a drawable surface. Pointer motion and
//! queued bursts inject Gaussian "splats" of force and colour.
//!
//! ```text
//!   pointer / touch ─▶ Pointers ─┐
//!   queued bursts ───────────────┤
//!                                ▼
//!   FrameLoop::tick ──▶ FluidSimulation::frame ──▶ step ──▶ render ──▶ present
//!                                │
//!                                └──▶ Backend (GpuBackend | SoftwareBackend)
//! ```
//!
//! `FluidSimulation` owns its backend, its fields and its program cache; there
//! is no global state. The [`software`] backend runs the same passes on the
//! CPU and is what the test suite exercises.

pub mod backend;
pub mod error;
pub mod field;
pub mod frame;
pub mod gpu;
pub mod pointer;
pub mod program;
pub mod resolution;
pub mod shaders;
pub mod simulation;
pub mod software;
pub mod types;
pub mod uniforms;
pub mod window;

pub use backend::{Backend, Blend, DrawCall, Target};
pub use error::{BackendError, FluidError, ProgramError};
pub use field::{DoubleBuffer, Field};
pub use frame::{FrameLoop, FrameStatus, LoopHandle, LoopState};
pub use gpu::GpuBackend;
pub use pointer::{PointerEvent, MOUSE_POINTER};
pub use simulation::{FieldKind, FluidSimulation, FrameOutcome};
pub use software::SoftwareBackend;
pub use types::{Color, FluidConfig, TimeStep};
pub use window::{run_window, WindowOptions};
