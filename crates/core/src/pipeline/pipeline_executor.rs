use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::compositing::domain::frame_compositor::FrameCompositor;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

use super::pipeline_logger::PipelineLogger;

/// Configuration for a pipeline execution run.
pub struct PipelineConfig {
    /// Compositing threads; values below 1 are treated as 1.
    pub workers: usize,
    pub on_progress: Option<Box<dyn Fn(usize, usize) -> bool + Send>>,
    pub cancelled: Arc<AtomicBool>,
    pub logger: Box<dyn PipelineLogger>,
}

/// Abstracts how the read → composite → write pipeline is executed.
///
/// This is a port (application-layer interface). Infrastructure provides
/// concrete implementations. Frames and masks are paired by position and
/// output frames are written in input order.
pub trait PipelineExecutor: Send {
    #[allow(clippy::too_many_arguments)]
    fn execute(
        &self,
        frames: Box<dyn VideoReader>,
        masks: Box<dyn VideoReader>,
        writer: Box<dyn VideoWriter>,
        compositor: Arc<dyn FrameCompositor>,
        metadata: &VideoMetadata,
        output_path: &Path,
        config: PipelineConfig,
    ) -> Result<(), Box<dyn std::error::Error>>;
}
