use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;

use backdrop_core::compositing::domain::frame_compositor::FrameCompositor;
use backdrop_core::compositing::infrastructure::compositor_factory::{create_compositor, StageKind};
use backdrop_core::pipeline::composite_image_use_case::CompositeImageUseCase;
use backdrop_core::pipeline::composite_sequence_use_case::CompositeSequenceUseCase;
use backdrop_core::pipeline::infrastructure::threaded_pipeline_executor::ThreadedPipelineExecutor;
use backdrop_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use backdrop_core::shared::asset_resolver::SearchPathResolver;
use backdrop_core::shared::stage_config::StageConfig;
use backdrop_core::video::infrastructure::image_file_reader::{ImageCrateDecoder, ImageFileReader};
use backdrop_core::video::infrastructure::image_file_writer::ImageFileWriter;
use backdrop_core::video::infrastructure::image_sequence_reader::ImageSequenceReader;
use backdrop_core::video::infrastructure::image_sequence_writer::ImageSequenceWriter;

/// Composite video frames over a background image using per-pixel alpha masks.
#[derive(Parser)]
#[command(name = "backdrop")]
struct Cli {
    /// Input frame: an image file, or a directory of frames.
    frames: PathBuf,

    /// Mask with an alpha channel: an image file, or a directory of masks.
    masks: PathBuf,

    /// Output image file, or output directory in sequence mode.
    output: PathBuf,

    /// Background asset name or path.
    #[arg(long)]
    background: Option<String>,

    /// Extra directory to search for the background (repeatable).
    #[arg(long = "asset-dir")]
    asset_dirs: Vec<PathBuf>,

    /// URL to download the background from if it is not found locally.
    #[arg(long)]
    background_url: Option<String>,

    /// Stage to run: background_masking or matte_preview.
    #[arg(long)]
    stage: Option<String>,

    /// Gaussian kernel size for mask edge softening (must be odd).
    #[arg(long)]
    kernel_size: Option<usize>,

    /// Gaussian sigma for mask edge softening.
    #[arg(long)]
    sigma: Option<f32>,

    /// Worker threads in sequence mode (0 = one per core).
    #[arg(long)]
    workers: Option<usize>,

    /// JSON stage configuration; flags above override its values.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let config = stage_config(&cli)?;
    log::debug!("Stage config: {}", config.to_json());

    let compositor = build_compositor(&config)?;

    if cli.frames.is_dir() {
        run_sequence(&cli, compositor, config.worker_count())
    } else {
        run_image(&cli, compositor)
    }
}

/// Loads `--config` if given, then applies command-line overrides.
fn stage_config(cli: &Cli) -> Result<StageConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => StageConfig::load(path)?,
        None => StageConfig::default(),
    };
    if let Some(stage) = &cli.stage {
        config.stage = stage.clone();
    }
    if let Some(background) = &cli.background {
        config.background = background.clone();
    }
    if cli.background_url.is_some() {
        config.background_url = cli.background_url.clone();
    }
    config.asset_dirs.extend(cli.asset_dirs.iter().cloned());
    if let Some(kernel_size) = cli.kernel_size {
        config.blur.kernel_size = kernel_size;
    }
    if let Some(sigma) = cli.sigma {
        config.blur.sigma = sigma;
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    Ok(config)
}

fn build_compositor(
    config: &StageConfig,
) -> Result<Arc<dyn FrameCompositor>, Box<dyn std::error::Error>> {
    let kind: StageKind = config.stage.parse().map_err(|e| {
        let known: Vec<&str> = StageKind::ALL.iter().map(|k| k.name()).collect();
        format!("{e} (expected one of: {})", known.join(", "))
    })?;
    if kind.needs_background() {
        log::info!("Resolving background: {}", config.background);
    }
    let resolver = SearchPathResolver::new(config.asset_dirs.clone())
        .with_download_url(config.background_url.clone())
        .with_progress(Box::new(download_progress));
    let compositor = create_compositor(config, &resolver, &ImageCrateDecoder::new())?;
    Ok(compositor)
}

fn run_image(
    cli: &Cli,
    compositor: Arc<dyn FrameCompositor>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut use_case = CompositeImageUseCase::new(
        Box::new(ImageFileReader::new()),
        Box::new(ImageFileReader::new()),
        Box::new(ImageFileWriter::new()),
        compositor,
        Box::new(StdoutPipelineLogger::default()),
    );
    use_case.execute(&cli.frames, &cli.masks, &cli.output)?;
    log::info!("Output written to {}", cli.output.display());
    Ok(())
}

fn run_sequence(
    cli: &Cli,
    compositor: Arc<dyn FrameCompositor>,
    workers: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let progress: Box<dyn Fn(usize, usize) -> bool + Send> = Box::new(|current, total| {
        eprint!("\rCompositing frame {current}/{total}");
        true
    });

    let mut use_case = CompositeSequenceUseCase::new(
        Box::new(ImageSequenceReader::new()),
        Box::new(ImageSequenceReader::new()),
        Box::new(ImageSequenceWriter::new()),
        compositor,
        Box::new(ThreadedPipelineExecutor::new()),
        Box::new(StdoutPipelineLogger::default()),
        workers,
        Some(progress),
        None,
    );
    let metadata = use_case.execute(&cli.frames, &cli.masks, &cli.output)?;
    eprintln!();
    log::info!(
        "Wrote {} frames to {}",
        metadata.total_frames,
        cli.output.display()
    );
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    for (label, path) in [("Frames", &cli.frames), ("Masks", &cli.masks)] {
        if !path.exists() {
            return Err(format!("{label} input not found: {}", path.display()).into());
        }
    }
    if cli.frames.is_dir() != cli.masks.is_dir() {
        return Err("Frames and masks must both be files or both be directories".into());
    }
    if cli.frames.is_dir() && cli.output.is_file() {
        return Err(format!(
            "Output must be a directory in sequence mode, got file {}",
            cli.output.display()
        )
        .into());
    }
    if let Some(k) = cli.kernel_size {
        if k == 0 || k % 2 == 0 {
            return Err(format!("Kernel size must be a positive odd integer, got {k}").into());
        }
    }
    if let Some(sigma) = cli.sigma {
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(format!("Sigma must be a positive number, got {sigma}").into());
        }
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading background... {pct}%");
    } else {
        eprint!("\rDownloading background... {downloaded} bytes");
    }
}
