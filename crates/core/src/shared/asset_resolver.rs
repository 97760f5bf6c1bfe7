use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::{ASSET_CACHE_APP_DIR, ASSET_CACHE_SUBDIR};

#[derive(Error, Debug)]
pub enum AssetResolveError {
    #[error("asset {name:?} not found in any search location")]
    NotFound { name: String },
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write asset to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Maps a logical asset name to a readable file.
pub trait AssetResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Result<PathBuf, AssetResolveError>;
}

/// Resolves assets from explicit directories, the user cache, and
/// optionally a download URL.
pub struct SearchPathResolver {
    search_dirs: Vec<PathBuf>,
    cache_dir: Option<PathBuf>,
    url: Option<String>,
    progress: Option<ProgressFn>,
}

impl SearchPathResolver {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self {
            search_dirs,
            cache_dir: asset_cache_dir().ok(),
            url: None,
            progress: None,
        }
    }

    pub fn with_cache_dir(mut self, cache_dir: Option<PathBuf>) -> Self {
        self.cache_dir = cache_dir;
        self
    }

    pub fn with_download_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl AssetResolver for SearchPathResolver {
    fn resolve(&self, name: &str) -> Result<PathBuf, AssetResolveError> {
        resolve(
            name,
            &self.search_dirs,
            self.cache_dir.as_deref(),
            self.url.as_deref(),
            self.progress.as_ref(),
        )
    }
}

/// Resolve an asset by name.
///
/// Resolution order:
/// 1. `name` itself, if it is an existing file
/// 2. Each search directory, in order
/// 3. The asset cache directory
/// 4. Download from `url` into the cache directory
pub fn resolve(
    name: &str,
    search_dirs: &[PathBuf],
    cache_dir: Option<&Path>,
    url: Option<&str>,
    progress: Option<&ProgressFn>,
) -> Result<PathBuf, AssetResolveError> {
    let direct = Path::new(name);
    if direct.is_file() {
        return Ok(direct.to_path_buf());
    }

    for dir in search_dirs {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    if let Some(dir) = cache_dir {
        let cached = dir.join(name);
        if cached.is_file() {
            return Ok(cached);
        }
    }

    let Some(url) = url else {
        return Err(AssetResolveError::NotFound {
            name: name.to_string(),
        });
    };
    let cache_dir = cache_dir.ok_or(AssetResolveError::NoCacheDir)?;
    fs::create_dir_all(cache_dir).map_err(AssetResolveError::CacheDir)?;
    let cached = cache_dir.join(name);
    log::info!("Downloading background {name} from {url}");
    download(url, &cached, progress)?;
    Ok(cached)
}

/// Platform-specific asset cache directory.
///
/// - macOS: `~/Library/Application Support/Backdrop/backgrounds/`
/// - Linux: `$XDG_CACHE_HOME/Backdrop/backgrounds/` or `~/.cache/Backdrop/backgrounds/`
/// - Windows: `%LOCALAPPDATA%/Backdrop/backgrounds/`
pub fn asset_cache_dir() -> Result<PathBuf, AssetResolveError> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();

    base.map(|d| d.join(ASSET_CACHE_APP_DIR).join(ASSET_CACHE_SUBDIR))
        .ok_or(AssetResolveError::NoCacheDir)
}

fn download(url: &str, dest: &Path, progress: Option<&ProgressFn>) -> Result<(), AssetResolveError> {
    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| AssetResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let bytes = response.bytes().map_err(|e| AssetResolveError::Download {
        url: url.to_string(),
        source: e,
    })?;

    // Write to a temp file first, then rename for atomicity
    let temp_path = dest.with_extension("part");
    let write_err = |source| AssetResolveError::Write {
        path: temp_path.clone(),
        source,
    };
    let mut file = fs::File::create(&temp_path).map_err(write_err)?;

    let mut downloaded: u64 = 0;
    for chunk in bytes.chunks(256 * 1024) {
        file.write_all(chunk).map_err(write_err)?;
        downloaded += chunk.len() as u64;
        if let Some(cb) = progress {
            cb(downloaded, total);
        }
    }
    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(&temp_path, dest).map_err(|e| AssetResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;

    Ok(())
}
