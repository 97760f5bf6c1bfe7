use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::compositing::domain::composite_error::CompositeError;
use crate::compositing::domain::frame_compositor::FrameCompositor;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

use super::pipeline_executor::{PipelineConfig, PipelineExecutor};
use super::pipeline_logger::PipelineLogger;

/// Orchestrates compositing over a frame sequence and its mask sequence.
///
/// Opens both readers, checks they agree on frame size, then hands the
/// components to a `PipelineExecutor`. This is a single-use struct:
/// `execute` consumes the owned components, so calling it twice will fail.
pub struct CompositeSequenceUseCase {
    frames: Option<Box<dyn VideoReader>>,
    masks: Option<Box<dyn VideoReader>>,
    writer: Option<Box<dyn VideoWriter>>,
    logger: Option<Box<dyn PipelineLogger>>,
    compositor: Arc<dyn FrameCompositor>,
    executor: Box<dyn PipelineExecutor>,
    workers: usize,
    on_progress: Option<Box<dyn Fn(usize, usize) -> bool + Send>>,
    cancelled: Arc<AtomicBool>,
}

impl CompositeSequenceUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        frames: Box<dyn VideoReader>,
        masks: Box<dyn VideoReader>,
        writer: Box<dyn VideoWriter>,
        compositor: Arc<dyn FrameCompositor>,
        executor: Box<dyn PipelineExecutor>,
        logger: Box<dyn PipelineLogger>,
        workers: usize,
        on_progress: Option<Box<dyn Fn(usize, usize) -> bool + Send>>,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            frames: Some(frames),
            masks: Some(masks),
            writer: Some(writer),
            logger: Some(logger),
            compositor,
            executor,
            workers: workers.max(1),
            on_progress,
            cancelled: cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
        }
    }

    /// Composites every frame under `frames_path` with the mask at the same
    /// position under `masks_path`, writing results to `output_path`.
    ///
    /// Returns the frame sequence's metadata.
    pub fn execute(
        &mut self,
        frames_path: &Path,
        masks_path: &Path,
        output_path: &Path,
    ) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        let mut frames = self.frames.take().ok_or("Pipeline already executed")?;
        let mut masks = self.masks.take().ok_or("Pipeline already executed")?;
        let writer = self.writer.take().ok_or("Pipeline already executed")?;
        let logger = self.logger.take().ok_or("Pipeline already executed")?;

        let metadata = frames.open(frames_path)?;
        let mask_metadata = masks.open(masks_path)?;

        if (metadata.width, metadata.height) != (mask_metadata.width, mask_metadata.height) {
            frames.close();
            masks.close();
            return Err(Box::new(CompositeError::DimensionMismatch {
                input: (metadata.width, metadata.height),
                mask: (mask_metadata.width, mask_metadata.height),
            }));
        }
        if metadata.total_frames != mask_metadata.total_frames {
            log::warn!(
                "{} frames but {} masks; the run will stop at the shorter sequence",
                metadata.total_frames,
                mask_metadata.total_frames
            );
        }

        let config = PipelineConfig {
            workers: self.workers,
            on_progress: self.on_progress.take(),
            cancelled: self.cancelled.clone(),
            logger,
        };

        self.executor.execute(
            frames,
            masks,
            writer,
            self.compositor.clone(),
            &metadata,
            output_path,
            config,
        )?;
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::infrastructure::threaded_pipeline_executor::ThreadedPipelineExecutor;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::shared::frame::{Frame, PixelFormat};
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    struct StubReader {
        frames: Vec<Frame>,
        size: (u32, u32),
        closed: Arc<Mutex<bool>>,
    }

    impl StubReader {
        fn new(count: usize, format: PixelFormat) -> Self {
            Self::sized(count, format, (4, 4))
        }

        fn sized(count: usize, format: PixelFormat, size: (u32, u32)) -> Self {
            let len = (size.0 * size.1) as usize * format.channels() as usize;
            Self {
                frames: (0..count)
                    .map(|i| Frame::new(vec![i as u8; len], size.0, size.1, format, i as u64))
                    .collect(),
                size,
                closed: Arc::new(Mutex::new(false)),
            }
        }
    }

    impl VideoReader for StubReader {
        fn open(&mut self, _path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
            Ok(VideoMetadata {
                width: self.size.0,
                height: self.size.1,
                total_frames: self.frames.len(),
                source_path: None,
            })
        }

        fn frames(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
            Box::new(self.frames.drain(..).map(Ok))
        }

        fn close(&mut self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    struct StubWriter {
        written: Arc<Mutex<Vec<Frame>>>,
        closed: Arc<Mutex<bool>>,
    }

    impl StubWriter {
        fn new() -> Self {
            Self {
                written: Arc::new(Mutex::new(Vec::new())),
                closed: Arc::new(Mutex::new(false)),
            }
        }
    }

    impl VideoWriter for StubWriter {
        fn open(
            &mut self,
            _path: &Path,
            _metadata: &VideoMetadata,
        ) -> Result<(), Box<dyn std::error::Error>> {
            Ok(())
        }

        fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            self.written.lock().unwrap().push(frame.clone());
            Ok(())
        }

        fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    /// Writes the mask's alpha into the first byte so tests can check pairing.
    struct AlphaStampCompositor;

    impl FrameCompositor for AlphaStampCompositor {
        fn composite(
            &self,
            input: &Frame,
            mask: &Frame,
        ) -> Result<Frame, CompositeError> {
            let mut out = input.clone();
            out.data_mut()[0] = mask.data()[3];
            Ok(out)
        }

        fn name(&self) -> &str {
            "alpha_stamp"
        }
    }

    fn use_case(
        frames: StubReader,
        masks: StubReader,
        writer: StubWriter,
        workers: usize,
        on_progress: Option<Box<dyn Fn(usize, usize) -> bool + Send>>,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> CompositeSequenceUseCase {
        CompositeSequenceUseCase::new(
            Box::new(frames),
            Box::new(masks),
            Box::new(writer),
            Arc::new(AlphaStampCompositor),
            Box::new(ThreadedPipelineExecutor::new()),
            Box::new(NullPipelineLogger),
            workers,
            on_progress,
            cancelled,
        )
    }

    fn run(uc: &mut CompositeSequenceUseCase) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        uc.execute(Path::new("frames"), Path::new("masks"), Path::new("out"))
    }

    #[test]
    fn test_pairs_frames_with_masks_in_order() {
        let writer = StubWriter::new();
        let written = writer.written.clone();
        let mut uc = use_case(
            StubReader::new(10, PixelFormat::Rgb),
            StubReader::new(10, PixelFormat::Rgba),
            writer,
            4,
            None,
            None,
        );

        let meta = run(&mut uc).unwrap();
        assert_eq!(meta.total_frames, 10);

        let written = written.lock().unwrap();
        assert_eq!(written.len(), 10);
        for (i, frame) in written.iter().enumerate() {
            assert_eq!(frame.timestamp(), i as u64);
            assert_eq!(frame.data()[0], i as u8);
        }
    }

    #[test]
    fn test_closes_readers_and_writer() {
        let frames = StubReader::new(2, PixelFormat::Rgb);
        let frames_closed = frames.closed.clone();
        let masks = StubReader::new(2, PixelFormat::Rgba);
        let masks_closed = masks.closed.clone();
        let writer = StubWriter::new();
        let writer_closed = writer.closed.clone();

        let mut uc = use_case(frames, masks, writer, 1, None, None);
        run(&mut uc).unwrap();

        assert!(*frames_closed.lock().unwrap());
        assert!(*masks_closed.lock().unwrap());
        assert!(*writer_closed.lock().unwrap());
    }

    #[test]
    fn test_size_mismatch_fails_before_compositing() {
        let writer = StubWriter::new();
        let written = writer.written.clone();
        let mut uc = use_case(
            StubReader::sized(2, PixelFormat::Rgb, (4, 4)),
            StubReader::sized(2, PixelFormat::Rgba, (2, 2)),
            writer,
            1,
            None,
            None,
        );

        let err = run(&mut uc).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CompositeError>(),
            Some(CompositeError::DimensionMismatch {
                input: (4, 4),
                mask: (2, 2)
            })
        ));
        assert!(written.lock().unwrap().is_empty());
    }

    #[test]
    fn test_fewer_masks_than_frames_is_error() {
        let mut uc = use_case(
            StubReader::new(3, PixelFormat::Rgb),
            StubReader::new(2, PixelFormat::Rgba),
            StubWriter::new(),
            2,
            None,
            None,
        );
        assert!(run(&mut uc).is_err());
    }

    #[test]
    fn test_second_execute_fails() {
        let mut uc = use_case(
            StubReader::new(1, PixelFormat::Rgb),
            StubReader::new(1, PixelFormat::Rgba),
            StubWriter::new(),
            1,
            None,
            None,
        );
        run(&mut uc).unwrap();
        let err = run(&mut uc).unwrap_err();
        assert_eq!(err.to_string(), "Pipeline already executed");
    }

    #[test]
    fn test_cancel_via_on_progress() {
        let mut uc = use_case(
            StubReader::new(10, PixelFormat::Rgb),
            StubReader::new(10, PixelFormat::Rgba),
            StubWriter::new(),
            2,
            Some(Box::new(|current, _total| current < 3)),
            None,
        );
        assert!(run(&mut uc).is_err());
    }

    #[test]
    fn test_cancellation_via_atomic_bool() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let writer = StubWriter::new();
        let written = writer.written.clone();

        let mut uc = use_case(
            StubReader::new(10, PixelFormat::Rgb),
            StubReader::new(10, PixelFormat::Rgba),
            writer,
            1,
            Some(Box::new(move |current, _total| {
                if current >= 3 {
                    flag.store(true, Ordering::Relaxed);
                }
                true
            })),
            Some(cancelled),
        );

        run(&mut uc).unwrap();
        assert!(written.lock().unwrap().len() < 10);
    }
}
