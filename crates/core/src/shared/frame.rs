use ndarray::{ArrayView3, ArrayViewMut3};
use thiserror::Error;

/// Channel layout of a [`Frame`]. Channels are interleaved, R first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Gray,
    Rgb,
    Rgba,
}

impl PixelFormat {
    pub fn channels(self) -> u8 {
        match self {
            PixelFormat::Gray => 1,
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }

    pub fn from_channels(channels: u8) -> Option<Self> {
        match channels {
            1 => Some(PixelFormat::Gray),
            3 => Some(PixelFormat::Rgb),
            4 => Some(PixelFormat::Rgba),
            _ => None,
        }
    }

    pub fn has_alpha(self) -> bool {
        self == PixelFormat::Rgba
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame dimensions must be positive, got {width}x{height}")]
    EmptyDimensions { width: u32, height: u32 },
    #[error("expected {expected} bytes for frame data, got {actual}")]
    DataLength { expected: usize, actual: usize },
}

/// A single video/image frame: contiguous interleaved bytes in row-major order.
///
/// Format conversion happens at I/O boundaries only; the compositing layer
/// reads pixel data through [`Frame::as_ndarray`].
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    timestamp: u64,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat, timestamp: u64) -> Self {
        debug_assert_eq!(
            data.len(),
            byte_len(width, height, format),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            format,
            timestamp,
        }
    }

    /// Checked constructor for data coming from outside the crate.
    pub fn try_new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        timestamp: u64,
    ) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::EmptyDimensions { width, height });
        }
        let expected = byte_len(width, height, format);
        if data.len() != expected {
            return Err(FrameError::DataLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self::new(data, width, height, format, timestamp))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn channels(&self) -> u8 {
        self.format.channels()
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.format.channels() as usize,
        )
    }
}

pub(crate) fn byte_len(width: u32, height: u32, format: PixelFormat) -> usize {
    (width as usize) * (height as usize) * (format.channels() as usize)
}
