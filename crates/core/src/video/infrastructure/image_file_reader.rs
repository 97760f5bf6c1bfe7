use std::path::Path;

use image::DynamicImage;

use crate::shared::frame::{Frame, PixelFormat};
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::image_decoder::ImageDecoder;
use crate::video::domain::video_reader::VideoReader;

/// Decodes images with the `image` crate.
///
/// Images carrying alpha decode to `Rgba`, luma-only images to `Gray`,
/// everything else to `Rgb`.
#[derive(Default)]
pub struct ImageCrateDecoder;

impl ImageCrateDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Frame, Box<dyn std::error::Error>> {
        let img = image::load_from_memory(bytes)?;
        Ok(dynamic_to_frame(img, 0)?)
    }
}

pub(crate) fn dynamic_to_frame(
    img: DynamicImage,
    timestamp: u64,
) -> Result<Frame, crate::shared::frame::FrameError> {
    let (width, height) = (img.width(), img.height());
    let color = img.color();
    let (format, data) = if color.has_alpha() {
        (PixelFormat::Rgba, img.into_rgba8().into_raw())
    } else if !color.has_color() {
        (PixelFormat::Gray, img.into_luma8().into_raw())
    } else {
        (PixelFormat::Rgb, img.into_rgb8().into_raw())
    };
    Frame::try_new(data, width, height, format, timestamp)
}

/// Reads one image file into a frame stamped with `timestamp`.
pub fn read_frame(path: &Path, timestamp: u64) -> Result<Frame, Box<dyn std::error::Error>> {
    let img = image::open(path).map_err(|e| format!("{}: {e}", path.display()))?;
    Ok(dynamic_to_frame(img, timestamp)?)
}

/// Adapts a single image file to the [`VideoReader`] interface.
///
/// Treats the image as a one-frame sequence with `total_frames=1`, allowing
/// the pipeline to process images and sequences uniformly.
pub struct ImageFileReader {
    frame: Option<Frame>,
}

impl ImageFileReader {
    pub fn new() -> Self {
        Self { frame: None }
    }
}

impl Default for ImageFileReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoReader for ImageFileReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        let frame = read_frame(path, 0)?;
        let metadata = VideoMetadata {
            width: frame.width(),
            height: frame.height(),
            total_frames: 1,
            source_path: Some(path.to_path_buf()),
        };
        self.frame = Some(frame);
        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        if self.frame.is_none() {
            return Box::new(std::iter::once(Err("ImageFileReader: not opened".into())));
        }
        Box::new(self.frame.take().into_iter().map(Ok))
    }

    fn close(&mut self) {
        self.frame = None;
    }
}
