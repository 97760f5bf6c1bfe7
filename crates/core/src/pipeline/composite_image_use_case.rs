use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::compositing::domain::frame_compositor::FrameCompositor;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::video::domain::image_writer::ImageWriter;
use crate::video::domain::video_reader::VideoReader;

/// Single-image pipeline: read frame and mask → composite → write.
pub struct CompositeImageUseCase {
    frame_reader: Box<dyn VideoReader>,
    mask_reader: Box<dyn VideoReader>,
    image_writer: Box<dyn ImageWriter>,
    compositor: Arc<dyn FrameCompositor>,
    logger: Box<dyn PipelineLogger>,
}

impl CompositeImageUseCase {
    pub fn new(
        frame_reader: Box<dyn VideoReader>,
        mask_reader: Box<dyn VideoReader>,
        image_writer: Box<dyn ImageWriter>,
        compositor: Arc<dyn FrameCompositor>,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            frame_reader,
            mask_reader,
            image_writer,
            compositor,
            logger,
        }
    }

    /// Composites the image at `input_path` using the mask at `mask_path`
    /// and writes the result to `output_path`. Nothing is written on error.
    pub fn execute(
        &mut self,
        input_path: &Path,
        mask_path: &Path,
        output_path: &Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.frame_reader.open(input_path)?;
        self.mask_reader.open(mask_path)?;

        let frame = self.frame_reader.frames().next().ok_or("No frames in image")??;
        let mask = self.mask_reader.frames().next().ok_or("No frames in mask")??;
        self.frame_reader.close();
        self.mask_reader.close();

        let start = Instant::now();
        let output = self.compositor.composite(&frame, &mask)?;
        self.logger
            .timing("composite", start.elapsed().as_secs_f64() * 1000.0);

        self.image_writer.write(output_path, &output)?;
        self.logger.progress(1, 1);
        self.logger.info(&format!(
            "Wrote {}x{} {} output to {}",
            output.width(),
            output.height(),
            self.compositor.name(),
            output_path.display()
        ));
        self.logger.summary();
        Ok(())
    }
}
