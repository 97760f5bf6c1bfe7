pub mod asset_resolver;
pub mod constants;
pub mod frame;
pub mod stage_config;
pub mod video_metadata;
