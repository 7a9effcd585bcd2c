//! wgpu implementation of [`Backend`](crate::backend::Backend).
//!
//! ```text
//!   GpuContext ── adapter/device/surface, tier + format detection
//!   pipeline   ── GLSL → naga → one RenderPipeline per target/blend
//!   GpuBackend ── per-frame encoder, uniform staging, surface present
//! ```
//!
//! Fields are render-attachment textures in the best float format the
//! adapter can render to. Compilation runs inside a validation error
//! scope so a bad shader variant surfaces as a [`ProgramError`](crate::error::ProgramError)
//! instead of a device panic.

mod backend;
mod context;
mod pipeline;

pub use backend::{GpuBackend, GpuTexture};
pub use pipeline::GpuProgram;
