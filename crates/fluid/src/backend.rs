//! The seam between the simulation and a rendering API.
//!
//! ```text
//!   FluidSimulation ── DrawCall { program, uniforms, inputs, target } ──▶ Backend
//!                                                                       ├─ GpuBackend (wgpu)
//!                                                                       └─ SoftwareBackend (CPU)
//! ```
//!
//! A draw is always a full-screen pass over its target. Inputs are fields
//! bound to numbered sampling slots; the target is a field or the surface.

use crate::error::{BackendError, ProgramError};
use crate::field::{Attachment, Field, FieldDescriptor};
use crate::program::ProgramKey;
use crate::types::Capabilities;
use crate::uniforms::PassUniforms;

/// Number of textures a single pass can sample.
pub const MAX_SLOTS: usize = 2;

/// How fragment output combines with what is already in the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Blend {
    /// Overwrite the target.
    Replace,
    /// `src + dst * (1 - src.a)`.
    PremultipliedOver,
}

/// Where a draw writes.
#[derive(Debug)]
pub enum Target<'a, T> {
    Field(&'a Field<T>),
    Surface,
}

impl<T> Clone for Target<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Target<'_, T> {}

/// One full-screen pass.
#[derive(Debug)]
pub struct DrawCall<'a, T> {
    pub uniforms: PassUniforms,
    pub inputs: Vec<Attachment<'a, T>>,
    pub target: Target<'a, T>,
    /// Clear colour applied to the target before drawing.
    pub clear: Option<[f32; 4]>,
    pub blend: Blend,
}

impl<'a, T> DrawCall<'a, T> {
    pub fn new(uniforms: PassUniforms, target: Target<'a, T>) -> Self {
        Self {
            uniforms,
            inputs: Vec::with_capacity(MAX_SLOTS),
            target,
            clear: None,
            blend: Blend::Replace,
        }
    }

    pub fn input(mut self, attachment: Attachment<'a, T>) -> Self {
        self.inputs.push(attachment);
        self
    }

    pub fn clear(mut self, color: [f32; 4]) -> Self {
        self.clear = Some(color);
        self
    }

    pub fn blend(mut self, blend: Blend) -> Self {
        self.blend = blend;
        self
    }

    /// Field bound to `slot`, if any. Later attachments win.
    pub fn slot(&self, slot: usize) -> Option<&'a Field<T>> {
        self.inputs
            .iter()
            .rev()
            .find(|attachment| attachment.slot() == slot)
            .map(|attachment| attachment.field())
    }
}

/// Rejects draws that sample the field they render to.
///
/// Backends compare fields by address: every field owns its own texture.
pub fn validate_draw<T>(call: &DrawCall<'_, T>) -> Result<(), BackendError> {
    if let Target::Field(target) = call.target {
        for attachment in &call.inputs {
            if std::ptr::eq(attachment.field(), target) {
                return Err(BackendError::FeedbackLoop {
                    label: target.label(),
                });
            }
        }
    }
    for attachment in &call.inputs {
        if attachment.slot() >= MAX_SLOTS {
            return Err(BackendError::SlotOutOfRange {
                slot: attachment.slot(),
                max: MAX_SLOTS,
            });
        }
    }
    Ok(())
}

/// A rendering API the simulation can run on.
pub trait Backend {
    /// Storage behind a [`Field`].
    type Texture;
    /// A compiled program variant.
    type Program;

    fn capabilities(&self) -> Capabilities;

    /// Current drawable size in pixels.
    fn surface_size(&self) -> (u32, u32);

    /// Adapts the drawable to a new canvas size.
    fn resize_surface(&mut self, width: u32, height: u32) -> Result<(), BackendError>;

    /// Allocates a zero-initialised field.
    fn create_field(
        &mut self,
        descriptor: FieldDescriptor,
    ) -> Result<Field<Self::Texture>, BackendError>;

    fn compile(&mut self, key: &ProgramKey) -> Result<Self::Program, ProgramError>;

    fn draw(
        &mut self,
        program: &Self::Program,
        call: &DrawCall<'_, Self::Texture>,
    ) -> Result<(), BackendError>;

    /// Submits the recorded passes and shows the surface, if one was drawn.
    fn present(&mut self) -> Result<(), BackendError>;

    /// Copies a field back to the host, row 0 first.
    fn read_field(&mut self, field: &Field<Self::Texture>) -> Result<Vec<[f32; 4]>, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolution::GridSize;
    use crate::types::{FieldFormat, FilterMode};

    fn field(label: &'static str) -> Field<()> {
        Field::new(
            (),
            FieldDescriptor {
                label,
                size: GridSize::new(2, 2),
                format: FieldFormat::Rgba16Float,
                filter: FilterMode::Nearest,
            },
        )
    }

    #[test]
    fn sampling_the_target_is_a_feedback_loop() {
        let velocity = field("velocity");
        let call = DrawCall::new(PassUniforms::default(), Target::Field(&velocity))
            .input(velocity.attach(0).unwrap());
        assert!(matches!(
            validate_draw(&call),
            Err(BackendError::FeedbackLoop { label: "velocity" })
        ));
    }

    #[test]
    fn distinct_fields_validate() {
        let read = field("read");
        let write = field("write");
        let call = DrawCall::new(PassUniforms::default(), Target::Field(&write))
            .input(read.attach(0).unwrap());
        assert!(validate_draw(&call).is_ok());
        assert!(call.slot(0).is_some());
        assert!(call.slot(1).is_none());
    }
}
