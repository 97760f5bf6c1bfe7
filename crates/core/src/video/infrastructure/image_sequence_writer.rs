use std::path::{Path, PathBuf};

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::image_writer::ImageWriter;
use crate::video::domain::video_writer::VideoWriter;

use super::image_file_writer::ImageFileWriter;

/// Writes each frame as `frame_{timestamp:06}.png` inside an output directory.
pub struct ImageSequenceWriter {
    dir: Option<PathBuf>,
    image_writer: ImageFileWriter,
    written: usize,
}

impl ImageSequenceWriter {
    pub fn new() -> Self {
        Self {
            dir: None,
            image_writer: ImageFileWriter::new(),
            written: 0,
        }
    }

    pub fn frames_written(&self) -> usize {
        self.written
    }

    pub fn frame_path(dir: &Path, timestamp: u64) -> PathBuf {
        dir.join(format!("frame_{timestamp:06}.png"))
    }
}

impl Default for ImageSequenceWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoWriter for ImageSequenceWriter {
    fn open(
        &mut self,
        path: &Path,
        _metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>> {
        std::fs::create_dir_all(path)?;
        self.dir = Some(path.to_path_buf());
        self.written = 0;
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let dir = self.dir.as_ref().ok_or("ImageSequenceWriter: not opened")?;
        self.image_writer
            .write(&Self::frame_path(dir, frame.timestamp()), frame)?;
        self.written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(dir) = self.dir.take() {
            log::debug!("Wrote {} frames to {}", self.written, dir.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::PixelFormat;

    fn metadata() -> VideoMetadata {
        VideoMetadata {
            width: 2,
            height: 2,
            total_frames: 2,
            source_path: None,
        }
    }

    #[test]
    fn test_writes_numbered_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut writer = ImageSequenceWriter::new();
        writer.open(&out, &metadata()).unwrap();
        for ts in [0u64, 1] {
            let frame = Frame::new(vec![ts as u8 * 100; 12], 2, 2, PixelFormat::Rgb, ts);
            writer.write(&frame).unwrap();
        }
        assert_eq!(writer.frames_written(), 2);
        writer.close().unwrap();

        assert!(out.join("frame_000000.png").exists());
        let second = image::open(out.join("frame_000001.png")).unwrap().to_rgb8();
        assert_eq!(second.get_pixel(1, 1).0, [100, 100, 100]);
    }

    #[test]
    fn test_write_before_open_is_error() {
        let mut writer = ImageSequenceWriter::new();
        let frame = Frame::new(vec![0; 3], 1, 1, PixelFormat::Rgb, 0);
        assert!(writer.write(&frame).is_err());
    }

    #[test]
    fn test_close_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ImageSequenceWriter::new();
        writer.open(dir.path(), &metadata()).unwrap();
        writer.close().unwrap();
        writer.close().unwrap();
    }
}
