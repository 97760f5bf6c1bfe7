use crate::compositing::domain::composite_error::CompositeError;
use crate::shared::frame::Frame;

/// Domain interface for a stage that combines a frame with its segmentation mask.
///
/// Implementations never modify their inputs; each call returns a freshly
/// allocated frame with the input's dimensions, format and timestamp.
/// `&self` plus `Sync` lets a pipeline share one instance across workers.
pub trait FrameCompositor: Send + Sync {
    fn composite(&self, input: &Frame, mask: &Frame) -> Result<Frame, CompositeError>;

    /// Stage name used in logs.
    fn name(&self) -> &str;
}

/// Validates the input/mask pair shared by every compositing stage.
pub fn check_inputs(input: &Frame, mask: &Frame) -> Result<(), CompositeError> {
    if !matches!(input.channels(), 3 | 4) {
        return Err(CompositeError::UnsupportedFormat {
            channels: input.channels(),
        });
    }
    if !mask.format().has_alpha() {
        return Err(CompositeError::MissingAlpha {
            channels: mask.channels(),
        });
    }
    if input.dimensions() != mask.dimensions() {
        return Err(CompositeError::DimensionMismatch {
            input: input.dimensions(),
            mask: mask.dimensions(),
        });
    }
    Ok(())
}

/// Reserves an output buffer without aborting on allocation failure.
pub fn allocate_output(len: usize) -> Result<Vec<u8>, CompositeError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| CompositeError::Allocation { bytes: len })?;
    Ok(buf)
}
