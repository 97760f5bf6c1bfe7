pub mod composite_error;
pub mod frame_compositor;
pub mod weight_map;
