use crate::compositing::domain::composite_error::CompositeError;
use crate::compositing::domain::frame_compositor::{allocate_output, check_inputs, FrameCompositor};
use crate::compositing::domain::weight_map::{complement, extract_alpha};
use crate::shared::constants::MATTE_PREVIEW_STAGE;
use crate::shared::frame::{Frame, PixelFormat};

/// Visualizes a mask as a grey silhouette: foreground white, background black.
///
/// Output takes the input's format and timestamp; the input's pixels are
/// otherwise ignored. Useful for checking mask alignment before compositing.
#[derive(Default)]
pub struct MattePreviewCompositor;

impl MattePreviewCompositor {
    pub fn new() -> Self {
        Self
    }
}

impl FrameCompositor for MattePreviewCompositor {
    fn composite(&self, input: &Frame, mask: &Frame) -> Result<Frame, CompositeError> {
        check_inputs(input, mask)?;

        let foreground = complement(&extract_alpha(mask)?);
        let channels = input.channels() as usize;
        let len = foreground.len() * channels;
        let mut data = allocate_output(len)?;
        for &v in foreground.iter() {
            match input.format() {
                PixelFormat::Rgba => data.extend_from_slice(&[v, v, v, 255]),
                _ => data.extend_from_slice(&[v, v, v]),
            }
        }

        Ok(Frame::new(
            data,
            input.width(),
            input.height(),
            input.format(),
            input.timestamp(),
        ))
    }

    fn name(&self) -> &str {
        MATTE_PREVIEW_STAGE
    }
}
