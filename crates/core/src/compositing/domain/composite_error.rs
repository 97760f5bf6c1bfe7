use thiserror::Error;

/// Failure of a compositing stage. No output frame is produced on error.
#[derive(Error, Debug)]
pub enum CompositeError {
    #[error("mask has {channels} channel(s); an alpha channel (4th) is required")]
    MissingAlpha { channels: u8 },

    #[error("mask is {}x{} but frame is {}x{}", mask.0, mask.1, input.0, input.1)]
    DimensionMismatch { input: (u32, u32), mask: (u32, u32) },

    #[error("unsupported input format with {channels} channel(s); expected 3 or 4")]
    UnsupportedFormat { channels: u8 },

    #[error("background {name:?} unavailable: {reason}")]
    AssetUnavailable { name: String, reason: String },

    #[error("could not allocate {bytes} bytes for output frame")]
    Allocation { bytes: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("unknown stage {0:?}")]
    UnknownStage(String),
}

impl CompositeError {
    /// True for errors caused by the frames handed to a call, as opposed to
    /// stage configuration or resources.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            CompositeError::MissingAlpha { .. }
                | CompositeError::DimensionMismatch { .. }
                | CompositeError::UnsupportedFormat { .. }
        )
    }
}
