use crate::shared::frame::Frame;

/// Decodes an encoded image (PNG, JPEG, ...) into a [`Frame`].
///
/// The returned frame's channel order is always RGB(A); implementations
/// convert from whatever order the codec produces.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Frame, Box<dyn std::error::Error>>;
}
