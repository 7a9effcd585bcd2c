use crate::program::Material;

/// Top-level failure of the fluid background.
#[derive(Debug, thiserror::Error)]
pub enum FluidError {
    /// No adapter of any API tier could drive the target surface.
    #[error("no graphics context available: {0}")]
    NoContext(String),
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error(transparent)]
    Program(#[from] ProgramError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// A shader variant that could not be turned into a program.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProgramError {
    #[error("failed to compile {material:?} program (keywords: {keywords}): {message}")]
    Compile {
        material: Material,
        keywords: String,
        message: String,
    },
}

/// Misuse of, or failure inside, a rendering backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{label} is both sampled and rendered to in the same draw")]
    FeedbackLoop { label: &'static str },
    #[error("{label} is {actual:?} but {expected:?} was expected")]
    ShapeMismatch {
        label: &'static str,
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("{label} of {size:?} exceeds the largest texture edge ({max})")]
    FieldTooLarge {
        label: &'static str,
        size: (u32, u32),
        max: u32,
    },
    #[error("sampling slot {slot} exceeds the supported slot count ({max})")]
    SlotOutOfRange { slot: usize, max: usize },
    #[error("{0} is not supported by this backend")]
    Unsupported(&'static str),
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("device reported an error: {0}")]
    Device(String),
}

impl BackendError {
    /// Whether the frame can simply be skipped and retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::Surface(
                wgpu::SurfaceError::Lost
                    | wgpu::SurfaceError::Outdated
                    | wgpu::SurfaceError::Timeout
                    | wgpu::SurfaceError::Other
            )
        )
    }
}
