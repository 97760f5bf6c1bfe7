use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use crate::compositing::domain::frame_compositor::FrameCompositor;
use crate::pipeline::pipeline_executor::{PipelineConfig, PipelineExecutor};
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

const DEFAULT_CHANNEL_CAPACITY: usize = 8;

type SendError = Box<dyn std::error::Error + Send + Sync>;

struct Job {
    seq: usize,
    frame: Frame,
    mask: Frame,
}

struct Composited {
    seq: usize,
    frame: Frame,
    elapsed_ms: f64,
}

/// Runs compositing on a pool of worker threads.
///
/// Layout: `reader → workers × N → main [reorder] → writer`
///
/// The reader pairs frames with masks by position. Workers share one
/// compositor and finish out of order; the main thread holds results until
/// their predecessors arrive so the writer sees input order. The first error
/// stops the run.
pub struct ThreadedPipelineExecutor {
    channel_capacity: usize,
}

impl ThreadedPipelineExecutor {
    pub fn new() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl Default for ThreadedPipelineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineExecutor for ThreadedPipelineExecutor {
    fn execute(
        &self,
        frames: Box<dyn VideoReader>,
        masks: Box<dyn VideoReader>,
        mut writer: Box<dyn VideoWriter>,
        compositor: Arc<dyn FrameCompositor>,
        metadata: &VideoMetadata,
        output_path: &Path,
        mut config: PipelineConfig,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let workers = config.workers.max(1);
        let cap = self.channel_capacity.max(workers);

        writer.open(output_path, metadata)?;
        config.logger.info(&format!(
            "Compositing {} frames with {} on {workers} worker(s)",
            metadata.total_frames,
            compositor.name()
        ));

        let (job_tx, job_rx) = crossbeam_channel::bounded::<Result<Job, SendError>>(cap);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<Result<Composited, SendError>>(cap);
        let (write_tx, write_rx) = crossbeam_channel::bounded::<Frame>(cap);

        let reader_handle = spawn_reader(frames, masks, job_tx, config.cancelled.clone());
        let worker_handles: Vec<_> = (0..workers)
            .map(|_| {
                spawn_worker(
                    compositor.clone(),
                    job_rx.clone(),
                    done_tx.clone(),
                    config.cancelled.clone(),
                )
            })
            .collect();
        drop(job_rx);
        drop(done_tx);
        let writer_handle = spawn_writer(writer, write_rx);

        let main_error = run_main_loop(done_rx, &write_tx, metadata.total_frames, &mut config);
        drop(write_tx);

        let result = join_threads(reader_handle, worker_handles, writer_handle, main_error);
        config.logger.summary();
        result
    }
}

fn spawn_reader(
    mut frames: Box<dyn VideoReader>,
    mut masks: Box<dyn VideoReader>,
    job_tx: Sender<Result<Job, SendError>>,
    cancelled: Arc<AtomicBool>,
) -> JoinHandle<(Box<dyn VideoReader>, Box<dyn VideoReader>)> {
    std::thread::spawn(move || {
        {
            let mut frame_iter = frames.frames();
            let mut mask_iter = masks.frames();
            for seq in 0.. {
                if cancelled.load(Ordering::Relaxed) {
                    break;
                }
                let job = match (frame_iter.next(), mask_iter.next()) {
                    (None, None) => break,
                    (Some(Ok(frame)), Some(Ok(mask))) => Ok(Job { seq, frame, mask }),
                    (Some(Err(e)), _) | (_, Some(Err(e))) => {
                        Err(SendError::from(e.to_string()))
                    }
                    (Some(_), None) => Err(SendError::from(format!(
                        "mask sequence ended after {seq} masks but frames remain"
                    ))),
                    (None, Some(_)) => Err(SendError::from(format!(
                        "frame sequence ended after {seq} frames but masks remain"
                    ))),
                };
                let stop = job.is_err();
                if job_tx.send(job).is_err() || stop {
                    break;
                }
            }
        }
        frames.close();
        masks.close();
        (frames, masks)
    })
}

fn spawn_worker(
    compositor: Arc<dyn FrameCompositor>,
    job_rx: Receiver<Result<Job, SendError>>,
    done_tx: Sender<Result<Composited, SendError>>,
    cancelled: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for job in job_rx {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            let result = job.and_then(|job| {
                let start = Instant::now();
                let frame = compositor
                    .composite(&job.frame, &job.mask)
                    .map_err(|e| -> SendError { Box::new(e) })?;
                Ok(Composited {
                    seq: job.seq,
                    frame,
                    elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
                })
            });
            if done_tx.send(result).is_err() {
                break;
            }
        }
    })
}

fn spawn_writer(
    mut writer: Box<dyn VideoWriter>,
    write_rx: Receiver<Frame>,
) -> JoinHandle<Result<Box<dyn VideoWriter>, SendError>> {
    std::thread::spawn(move || {
        for frame in write_rx {
            writer
                .write(&frame)
                .map_err(|e| -> SendError { e.to_string().into() })?;
        }
        Ok(writer)
    })
}

/// Receives composited frames, restores input order, and forwards them to
/// the writer. Returns the error that stopped the run, if any.
fn run_main_loop(
    done_rx: Receiver<Result<Composited, SendError>>,
    write_tx: &Sender<Frame>,
    total_frames: usize,
    config: &mut PipelineConfig,
) -> Option<Box<dyn std::error::Error>> {
    let mut pending: BTreeMap<usize, Frame> = BTreeMap::new();
    let mut next_seq = 0usize;

    for result in done_rx {
        if config.cancelled.load(Ordering::Relaxed) {
            break;
        }

        let done = match result {
            Ok(done) => done,
            Err(e) => {
                let e: Box<dyn std::error::Error> = e;
                return Some(e);
            }
        };
        config.logger.timing("composite", done.elapsed_ms);
        pending.insert(done.seq, done.frame);
        config.logger.metric("reorder_depth", pending.len() as f64);

        while let Some(frame) = pending.remove(&next_seq) {
            if write_tx.send(frame).is_err() {
                // The writer thread stopped on its own error; join_threads reports it.
                return None;
            }
            next_seq += 1;
            config.logger.progress(next_seq, total_frames);

            if let Some(ref callback) = config.on_progress {
                if !callback(next_seq, total_frames) {
                    return Some("Cancelled".into());
                }
            }
        }
    }

    None
}

/// Joins all pipeline threads and coalesces the first error encountered.
fn join_threads(
    reader_handle: JoinHandle<(Box<dyn VideoReader>, Box<dyn VideoReader>)>,
    worker_handles: Vec<JoinHandle<()>>,
    writer_handle: JoinHandle<Result<Box<dyn VideoWriter>, SendError>>,
    mut first_error: Option<Box<dyn std::error::Error>>,
) -> Result<(), Box<dyn std::error::Error>> {
    fn set_if_none(slot: &mut Option<Box<dyn std::error::Error>>, err: Box<dyn std::error::Error>) {
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    if reader_handle.join().is_err() {
        set_if_none(&mut first_error, "Reader thread panicked".into());
    }

    for handle in worker_handles {
        if handle.join().is_err() {
            set_if_none(&mut first_error, "Compositing worker panicked".into());
        }
    }

    match writer_handle.join() {
        Ok(Ok(mut w)) => {
            if let Err(e) = w.close() {
                set_if_none(&mut first_error, e);
            }
        }
        Ok(Err(e)) => set_if_none(&mut first_error, e),
        Err(_) => set_if_none(&mut first_error, "Writer thread panicked".into()),
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
