pub mod alpha_blend_compositor;
pub mod background;
pub mod compositor_factory;
mod gaussian;
pub mod matte_preview_compositor;
