/// Side length of the square Gaussian kernel used to soften mask edges.
pub const DEFAULT_BLUR_KERNEL_SIZE: usize = 9;
pub const DEFAULT_BLUR_SIGMA: f32 = 7.0;

pub const DEFAULT_BACKGROUND_ASSET: &str = "buildings.jpg";

pub const BACKGROUND_MASKING_STAGE: &str = "background_masking";
pub const MATTE_PREVIEW_STAGE: &str = "matte_preview";

/// Directory under the platform cache dir where downloaded backgrounds live.
pub const ASSET_CACHE_APP_DIR: &str = "Backdrop";
pub const ASSET_CACHE_SUBDIR: &str = "backgrounds";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
