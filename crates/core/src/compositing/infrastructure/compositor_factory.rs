use std::str::FromStr;
use std::sync::Arc;

use crate::compositing::domain::composite_error::CompositeError;
use crate::compositing::domain::frame_compositor::FrameCompositor;
use crate::shared::asset_resolver::AssetResolver;
use crate::shared::constants::{BACKGROUND_MASKING_STAGE, MATTE_PREVIEW_STAGE};
use crate::shared::stage_config::StageConfig;
use crate::video::domain::image_decoder::ImageDecoder;

use super::alpha_blend_compositor::AlphaBlendCompositor;
use super::background::Background;
use super::matte_preview_compositor::MattePreviewCompositor;

/// The closed set of compositing stages this crate can build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageKind {
    BackgroundMasking,
    MattePreview,
}

impl StageKind {
    pub const ALL: &[StageKind] = &[StageKind::BackgroundMasking, StageKind::MattePreview];

    pub fn name(self) -> &'static str {
        match self {
            StageKind::BackgroundMasking => BACKGROUND_MASKING_STAGE,
            StageKind::MattePreview => MATTE_PREVIEW_STAGE,
        }
    }

    pub fn needs_background(self) -> bool {
        self == StageKind::BackgroundMasking
    }
}

impl FromStr for StageKind {
    type Err = CompositeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            BACKGROUND_MASKING_STAGE | "BackgroundMaskingCalculator" => {
                Ok(StageKind::BackgroundMasking)
            }
            MATTE_PREVIEW_STAGE => Ok(StageKind::MattePreview),
            other => Err(CompositeError::UnknownStage(other.to_string())),
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Builds the stage named in `config`.
///
/// The background is resolved and decoded here, once; a missing or
/// undecodable background fails construction with
/// [`CompositeError::AssetUnavailable`].
pub fn create_compositor(
    config: &StageConfig,
    resolver: &dyn AssetResolver,
    decoder: &dyn ImageDecoder,
) -> Result<Arc<dyn FrameCompositor>, CompositeError> {
    let kind: StageKind = config.stage.parse()?;
    let compositor: Arc<dyn FrameCompositor> = match kind {
        StageKind::BackgroundMasking => {
            let background = Background::load(&config.background, resolver, decoder)?;
            Arc::new(AlphaBlendCompositor::new(
                Arc::new(background),
                config.blur.kernel_size,
                config.blur.sigma,
            )?)
        }
        StageKind::MattePreview => Arc::new(MattePreviewCompositor::new()),
    };
    log::info!(
        "Using {kind} stage (blur kernel_size={}, sigma={})",
        config.blur.kernel_size,
        config.blur.sigma
    );
    Ok(compositor)
}
