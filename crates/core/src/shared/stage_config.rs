use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    BACKGROUND_MASKING_STAGE, DEFAULT_BACKGROUND_ASSET, DEFAULT_BLUR_KERNEL_SIZE,
    DEFAULT_BLUR_SIGMA,
};

#[derive(Error, Debug)]
pub enum StageConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurSettings {
    pub kernel_size: usize,
    pub sigma: f32,
}

impl Default for BlurSettings {
    fn default() -> Self {
        Self {
            kernel_size: DEFAULT_BLUR_KERNEL_SIZE,
            sigma: DEFAULT_BLUR_SIGMA,
        }
    }
}

/// Per-instance configuration of one compositing stage.
///
/// Every field is optional in JSON; missing fields take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub stage: String,
    pub background: String,
    pub background_url: Option<String>,
    pub asset_dirs: Vec<PathBuf>,
    pub blur: BlurSettings,
    /// Worker threads for sequence mode. 0 picks the available parallelism.
    pub workers: usize,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            stage: BACKGROUND_MASKING_STAGE.to_string(),
            background: DEFAULT_BACKGROUND_ASSET.to_string(),
            background_url: None,
            asset_dirs: Vec::new(),
            blur: BlurSettings::default(),
            workers: 0,
        }
    }
}

impl StageConfig {
    pub fn load(path: &Path) -> Result<Self, StageConfigError> {
        let json = fs::read_to_string(path).map_err(|source| StageConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| StageConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}
