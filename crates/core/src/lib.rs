pub mod compositing;
pub mod pipeline;
pub mod shared;
pub mod video;
