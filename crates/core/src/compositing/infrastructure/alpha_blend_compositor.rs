use std::sync::Arc;

use ndarray::{s, ArrayViewMut3, Axis, Zip};

use crate::compositing::domain::composite_error::CompositeError;
use crate::compositing::domain::frame_compositor::{allocate_output, check_inputs, FrameCompositor};
use crate::compositing::domain::weight_map::WeightMaps;
use crate::shared::constants::{
    BACKGROUND_MASKING_STAGE, DEFAULT_BLUR_KERNEL_SIZE, DEFAULT_BLUR_SIGMA,
};
use crate::shared::frame::Frame;

use super::background::Background;
use super::gaussian;

/// Replaces the background of a frame using its segmentation mask.
///
/// Per call: the mask alpha becomes the background weight and its complement
/// the foreground weight; both are normalized and Gaussian-blurred
/// independently so the cutout edge is soft, then
/// `out = frame * fg + background * bg`, saturated to `u8`.
///
/// Blurred weights are not renormalized, so near an edge they may sum to
/// slightly more or less than one.
pub struct AlphaBlendCompositor {
    background: Arc<Background>,
    kernel: Vec<f32>,
}

impl AlphaBlendCompositor {
    pub fn new(
        background: Arc<Background>,
        kernel_size: usize,
        sigma: f32,
    ) -> Result<Self, CompositeError> {
        if kernel_size == 0 || kernel_size % 2 == 0 {
            return Err(CompositeError::InvalidParameter(format!(
                "blur kernel size must be odd and positive, got {kernel_size}"
            )));
        }
        if !(sigma > 0.0 && sigma.is_finite()) {
            return Err(CompositeError::InvalidParameter(format!(
                "blur sigma must be positive, got {sigma}"
            )));
        }
        Ok(Self {
            background,
            kernel: gaussian::gaussian_kernel_1d(kernel_size, sigma),
        })
    }

    pub fn with_default_blur(background: Arc<Background>) -> Self {
        Self {
            background,
            kernel: gaussian::gaussian_kernel_1d(DEFAULT_BLUR_KERNEL_SIZE, DEFAULT_BLUR_SIGMA),
        }
    }

    pub fn background(&self) -> &Background {
        &self.background
    }
}

impl FrameCompositor for AlphaBlendCompositor {
    fn composite(&self, input: &Frame, mask: &Frame) -> Result<Frame, CompositeError> {
        check_inputs(input, mask)?;

        let (width, height) = input.dimensions();
        let channels = input.channels() as usize;
        let shape = (height as usize, width as usize, channels);

        let background = self.background.resized(width, height);
        let weights = WeightMaps::from_mask(mask)?
            .blurred(|plane| gaussian::separable_gaussian_blur(plane, &self.kernel));

        let len = shape.0 * shape.1 * shape.2;
        let mut data = allocate_output(len)?;
        data.resize(len, 0);

        {
            let mut out = ArrayViewMut3::from_shape(shape, &mut data)
                .map_err(|e| CompositeError::InvalidParameter(e.to_string()))?;
            let bg_pixels = background.as_ndarray();
            let bg_pixels = bg_pixels.slice(s![.., .., ..channels]);
            let fg_weight = weights.foreground.view().insert_axis(Axis(2));
            let bg_weight = weights.background.view().insert_axis(Axis(2));
            let (Some(fg_weight), Some(bg_weight)) =
                (fg_weight.broadcast(shape), bg_weight.broadcast(shape))
            else {
                return Err(CompositeError::DimensionMismatch {
                    input: (width, height),
                    mask: mask.dimensions(),
                });
            };

            Zip::from(&mut out)
                .and(&input.as_ndarray())
                .and(&bg_pixels)
                .and(&fg_weight)
                .and(&bg_weight)
                .for_each(|o, &fg, &bg, &fw, &bw| {
                    let v = fg as f32 * fw + bg as f32 * bw;
                    *o = v.round().clamp(0.0, 255.0) as u8;
                });
        }

        Ok(Frame::new(
            data,
            width,
            height,
            input.format(),
            input.timestamp(),
        ))
    }

    fn name(&self) -> &str {
        BACKGROUND_MASKING_STAGE
    }
}
