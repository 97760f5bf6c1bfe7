use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

use super::image_file_reader::read_frame;

/// Reads a directory of images as a frame sequence.
///
/// Files are ordered by name; each frame's timestamp is its position in
/// that order. Frames are decoded lazily while iterating.
pub struct ImageSequenceReader {
    paths: Vec<PathBuf>,
}

impl ImageSequenceReader {
    pub fn new() -> Self {
        Self { paths: Vec::new() }
    }
}

impl Default for ImageSequenceReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Lists image files directly inside `dir`, sorted by file name.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_image(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl VideoReader for ImageSequenceReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        let paths = list_images(path)?;
        let first = paths
            .first()
            .ok_or_else(|| format!("no images found in {}", path.display()))?;
        let probe = read_frame(first, 0)?;

        let metadata = VideoMetadata {
            width: probe.width(),
            height: probe.height(),
            total_frames: paths.len(),
            source_path: Some(path.to_path_buf()),
        };
        self.paths = paths;
        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let paths = std::mem::take(&mut self.paths);
        Box::new(
            paths
                .into_iter()
                .enumerate()
                .map(|(i, path)| read_frame(&path, i as u64)),
        )
    }

    fn close(&mut self) {
        self.paths.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_sequence(dir: &Path, values: &[u8]) {
        for (i, &v) in values.iter().enumerate() {
            let img = image::RgbImage::from_pixel(6, 4, image::Rgb([v, v, v]));
            img.save(dir.join(format!("frame_{i:03}.png"))).unwrap();
        }
    }

    #[test]
    fn test_open_counts_images_and_reads_size() {
        let dir = tempfile::tempdir().unwrap();
        write_sequence(dir.path(), &[10, 20, 30]);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut reader = ImageSequenceReader::new();
        let meta = reader.open(dir.path()).unwrap();
        assert_eq!(meta.total_frames, 3);
        assert_eq!((meta.width, meta.height), (6, 4));
    }

    #[test]
    fn test_frames_in_name_order_with_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        write_sequence(dir.path(), &[10, 20, 30]);

        let mut reader = ImageSequenceReader::new();
        reader.open(dir.path()).unwrap();
        let frames: Vec<Frame> = reader.frames().map(|f| f.unwrap()).collect();

        assert_eq!(frames.len(), 3);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.timestamp(), i as u64);
            assert_eq!(frame.data()[0], 10 * (i as u8 + 1));
        }
    }

    #[test]
    fn test_empty_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut reader = ImageSequenceReader::new();
        assert!(reader.open(dir.path()).is_err());
    }

    #[test]
    fn test_frames_before_open_is_empty() {
        let mut reader = ImageSequenceReader::new();
        assert_eq!(reader.frames().count(), 0);
    }

    #[test]
    fn test_is_image_case_insensitive() {
        assert!(is_image(Path::new("a/B.PNG")));
        assert!(is_image(Path::new("clip.jpeg")));
        assert!(!is_image(Path::new("clip.mp4")));
        assert!(!is_image(Path::new("README")));
    }
}
