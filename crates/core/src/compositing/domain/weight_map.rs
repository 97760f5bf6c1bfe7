use ndarray::{Array2, Axis};

use crate::compositing::domain::composite_error::CompositeError;
use crate::shared::frame::Frame;

const ALPHA_CHANNEL: usize = 3;

/// Extracts the 4th channel of a mask frame as a `(height, width)` plane.
pub fn extract_alpha(mask: &Frame) -> Result<Array2<u8>, CompositeError> {
    if !mask.format().has_alpha() {
        return Err(CompositeError::MissingAlpha {
            channels: mask.channels(),
        });
    }
    Ok(mask.as_ndarray().index_axis(Axis(2), ALPHA_CHANNEL).to_owned())
}

/// Per-pixel `255 - v`.
pub fn complement(plane: &Array2<u8>) -> Array2<u8> {
    plane.mapv(|v| 255 - v)
}

/// Maps `[0, 255]` to `[0.0, 1.0]`.
pub fn normalize(plane: &Array2<u8>) -> Array2<f32> {
    plane.mapv(|v| v as f32 / 255.0)
}

/// Background and foreground blend weights derived from one mask.
///
/// The alpha value is the same for every colour channel of a pixel, so each
/// map is stored once per pixel and broadcast across channels when applied.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightMaps {
    pub background: Array2<f32>,
    pub foreground: Array2<f32>,
}

impl WeightMaps {
    /// Alpha is the "keep background" weight; its complement keeps the frame.
    pub fn from_mask(mask: &Frame) -> Result<Self, CompositeError> {
        let bg_mask = extract_alpha(mask)?;
        let fg_mask = complement(&bg_mask);
        Ok(Self {
            background: normalize(&bg_mask),
            foreground: normalize(&fg_mask),
        })
    }

    /// Applies `blur` to each map independently.
    pub fn blurred<F>(&self, blur: F) -> Self
    where
        F: Fn(&Array2<f32>) -> Array2<f32>,
    {
        Self {
            background: blur(&self.background),
            foreground: blur(&self.foreground),
        }
    }

    /// `(height, width)` of the maps.
    pub fn dim(&self) -> (usize, usize) {
        self.background.dim()
    }
}
