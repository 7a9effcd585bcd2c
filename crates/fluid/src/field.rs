//! Texture-backed simulation fields.

use crate::backend::MAX_SLOTS;
use crate::error::BackendError;
use crate::resolution::GridSize;
use crate::types::{FieldFormat, FilterMode};

/// Everything a backend needs to allocate a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub label: &'static str,
    pub size: GridSize,
    pub format: FieldFormat,
    pub filter: FilterMode,
}

impl FieldDescriptor {
    /// Rejects sizes no texture of the backend can hold.
    pub fn check_limit(&self, max: u32) -> Result<(), BackendError> {
        if self.size.width > max || self.size.height > max {
            return Err(BackendError::FieldTooLarge {
                label: self.label,
                size: (self.size.width, self.size.height),
                max,
            });
        }
        Ok(())
    }
}

/// A 2D texture the simulation samples from or renders into.
///
/// `T` is the backend's texture handle. Fields are only created by the
/// resize path, so the texel size can never drift from the dimensions.
#[derive(Debug)]
pub struct Field<T> {
    texture: T,
    descriptor: FieldDescriptor,
}

impl<T> Field<T> {
    pub fn new(texture: T, descriptor: FieldDescriptor) -> Self {
        Self {
            texture,
            descriptor,
        }
    }

    pub fn texture(&self) -> &T {
        &self.texture
    }

    pub fn label(&self) -> &'static str {
        self.descriptor.label
    }

    pub fn width(&self) -> u32 {
        self.descriptor.size.width
    }

    pub fn height(&self) -> u32 {
        self.descriptor.size.height
    }

    pub fn size(&self) -> GridSize {
        self.descriptor.size
    }

    pub fn texel_size(&self) -> [f32; 2] {
        self.descriptor.size.texel_size()
    }

    pub fn format(&self) -> FieldFormat {
        self.descriptor.format
    }

    pub fn filter(&self) -> FilterMode {
        self.descriptor.filter
    }

    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    /// Binds the field to sampling slot `slot` of the next draw.
    pub fn attach(&self, slot: usize) -> Result<Attachment<'_, T>, BackendError> {
        if slot >= MAX_SLOTS {
            return Err(BackendError::SlotOutOfRange {
                slot,
                max: MAX_SLOTS,
            });
        }
        Ok(Attachment { slot, field: self })
    }
}

/// A field bound to a numbered sampling slot.
#[derive(Debug)]
pub struct Attachment<'a, T> {
    slot: usize,
    field: &'a Field<T>,
}

impl<'a, T> Attachment<'a, T> {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn field(&self) -> &'a Field<T> {
        self.field
    }
}

impl<T> Clone for Attachment<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Attachment<'_, T> {}

/// A read/write pair of identically shaped fields.
#[derive(Debug)]
pub struct DoubleBuffer<T> {
    fields: [Field<T>; 2],
    read: usize,
}

impl<T> DoubleBuffer<T> {
    /// Pairs two fields; both must share the same shape and format.
    pub fn new(first: Field<T>, second: Field<T>) -> Result<Self, BackendError> {
        if first.size() != second.size() || first.format() != second.format() {
            return Err(BackendError::ShapeMismatch {
                label: second.label(),
                expected: (first.width(), first.height()),
                actual: (second.width(), second.height()),
            });
        }
        Ok(Self {
            fields: [first, second],
            read: 0,
        })
    }

    pub fn read(&self) -> &Field<T> {
        &self.fields[self.read]
    }

    pub fn write(&self) -> &Field<T> {
        &self.fields[1 - self.read]
    }

    /// Exchanges the read and write roles.
    pub fn swap(&mut self) {
        self.read = 1 - self.read;
    }

    pub fn size(&self) -> GridSize {
        self.fields[0].size()
    }

    pub fn texel_size(&self) -> [f32; 2] {
        self.fields[0].texel_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(id: u32, width: u32, height: u32) -> Field<u32> {
        Field::new(
            id,
            FieldDescriptor {
                label: "test",
                size: GridSize::new(width, height),
                format: FieldFormat::Rgba16Float,
                filter: FilterMode::Linear,
            },
        )
    }

    #[test]
    fn swap_twice_restores_roles() {
        let mut buffer = DoubleBuffer::new(field(1, 4, 4), field(2, 4, 4)).unwrap();
        assert_eq!(*buffer.read().texture(), 1);
        assert_eq!(*buffer.write().texture(), 2);

        buffer.swap();
        assert_eq!(*buffer.read().texture(), 2);
        assert_eq!(*buffer.write().texture(), 1);

        buffer.swap();
        assert_eq!(*buffer.read().texture(), 1);
        assert_eq!(*buffer.write().texture(), 2);
    }

    #[test]
    fn mismatched_pairs_are_rejected() {
        let err = DoubleBuffer::new(field(1, 4, 4), field(2, 8, 4)).unwrap_err();
        assert!(matches!(err, BackendError::ShapeMismatch { .. }));
    }

    #[test]
    fn texel_size_follows_dimensions() {
        let field = field(1, 200, 50);
        assert_eq!(field.texel_size(), [1.0 / 200.0, 1.0 / 50.0]);
    }

    #[test]
    fn attach_rejects_slots_past_the_limit() {
        let field = field(1, 2, 2);
        assert_eq!(field.attach(1).unwrap().slot(), 1);
        assert!(matches!(
            field.attach(MAX_SLOTS),
            Err(BackendError::SlotOutOfRange { .. })
        ));
    }
}
