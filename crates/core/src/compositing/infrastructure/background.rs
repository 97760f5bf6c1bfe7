use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgba};

use crate::compositing::domain::composite_error::CompositeError;
use crate::shared::asset_resolver::AssetResolver;
use crate::shared::frame::{Frame, PixelFormat};
use crate::video::domain::image_decoder::ImageDecoder;

/// Distinct output sizes kept before the resize cache is reset.
const MAX_CACHED_SIZES: usize = 8;

/// A decoded, opaque RGBA background plus resized copies per frame size.
///
/// The source frame and every cached copy are immutable once published;
/// readers hold their own `Arc`, so a cache reset never affects a frame
/// already handed out.
pub struct Background {
    name: String,
    source: Arc<Frame>,
    resized: RwLock<HashMap<(u32, u32), Arc<Frame>>>,
}

impl Background {
    /// Resolves `name` to a file, decodes it, and converts it to opaque RGBA.
    pub fn load(
        name: &str,
        resolver: &dyn AssetResolver,
        decoder: &dyn ImageDecoder,
    ) -> Result<Self, CompositeError> {
        let unavailable = |reason: String| CompositeError::AssetUnavailable {
            name: name.to_string(),
            reason,
        };

        let path = resolver.resolve(name).map_err(|e| unavailable(e.to_string()))?;
        let bytes = std::fs::read(&path)
            .map_err(|e| unavailable(format!("{}: {e}", path.display())))?;
        let decoded = decoder
            .decode(&bytes)
            .map_err(|e| unavailable(format!("{}: {e}", path.display())))?;

        log::info!(
            "Loaded background {name} ({}x{}) from {}",
            decoded.width(),
            decoded.height(),
            path.display()
        );
        Ok(Self::from_frame(name, &decoded))
    }

    /// Builds a background from an already decoded frame. Any source alpha
    /// is replaced with 255.
    pub fn from_frame(name: &str, frame: &Frame) -> Self {
        Self {
            name: name.to_string(),
            source: Arc::new(to_opaque_rgba(frame)),
            resized: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Arc<Frame> {
        &self.source
    }

    /// Returns the background scaled to exactly `width` x `height`.
    pub fn resized(&self, width: u32, height: u32) -> Arc<Frame> {
        if self.source.dimensions() == (width, height) {
            return self.source.clone();
        }

        let key = (width, height);
        if let Some(hit) = self
            .resized
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return hit.clone();
        }

        let scaled = Arc::new(self.scale_source(width, height));

        let mut cache = self.resized.write().unwrap_or_else(PoisonError::into_inner);
        if cache.len() >= MAX_CACHED_SIZES && !cache.contains_key(&key) {
            cache.clear();
        }
        log::debug!("Cached background {} at {width}x{height}", self.name);
        // A concurrent fill may have won the race; keep whichever landed first.
        cache.entry(key).or_insert(scaled).clone()
    }

    fn scale_source(&self, width: u32, height: u32) -> Frame {
        let (sw, sh) = self.source.dimensions();
        let view = ImageBuffer::<Rgba<u8>, &[u8]>::from_raw(sw, sh, self.source.data())
            .expect("background frame is always RGBA with matching length");
        let scaled = imageops::resize(&view, width, height, FilterType::Triangle);
        Frame::new(scaled.into_raw(), width, height, PixelFormat::Rgba, 0)
    }

    #[cfg(test)]
    fn cached_sizes(&self) -> usize {
        self.resized.read().unwrap().len()
    }
}

fn to_opaque_rgba(frame: &Frame) -> Frame {
    let channels = frame.channels() as usize;
    let mut data = Vec::with_capacity(frame.width() as usize * frame.height() as usize * 4);
    for px in frame.data().chunks_exact(channels) {
        match frame.format() {
            PixelFormat::Gray => data.extend_from_slice(&[px[0], px[0], px[0], 255]),
            PixelFormat::Rgb | PixelFormat::Rgba => {
                data.extend_from_slice(&[px[0], px[1], px[2], 255])
            }
        }
    }
    Frame::new(
        data,
        frame.width(),
        frame.height(),
        PixelFormat::Rgba,
        frame.timestamp(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::asset_resolver::AssetResolveError;
    use std::path::PathBuf;

    struct FixedResolver(Option<PathBuf>);

    impl AssetResolver for FixedResolver {
        fn resolve(&self, name: &str) -> Result<PathBuf, AssetResolveError> {
            self.0.clone().ok_or(AssetResolveError::NotFound {
                name: name.to_string(),
            })
        }
    }

    struct StubDecoder {
        frame: Option<Frame>,
    }

    impl ImageDecoder for StubDecoder {
        fn decode(&self, _bytes: &[u8]) -> Result<Frame, Box<dyn std::error::Error>> {
            self.frame.clone().ok_or_else(|| "corrupt image".into())
        }
    }

    fn rgb(width: u32, height: u32, px: [u8; 3]) -> Frame {
        let data = px.repeat((width * height) as usize);
        Frame::new(data, width, height, PixelFormat::Rgb, 0)
    }

    #[test]
    fn test_from_frame_adds_opaque_alpha() {
        let bg = Background::from_frame("bg", &rgb(2, 2, [10, 20, 30]));
        assert_eq!(bg.source().format(), PixelFormat::Rgba);
        assert_eq!(&bg.source().data()[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_from_frame_discards_source_alpha() {
        let frame = Frame::new(vec![1, 2, 3, 0], 1, 1, PixelFormat::Rgba, 0);
        let bg = Background::from_frame("bg", &frame);
        assert_eq!(bg.source().data(), &[1, 2, 3, 255]);
    }

    #[test]
    fn test_from_frame_expands_gray() {
        let frame = Frame::new(vec![77], 1, 1, PixelFormat::Gray, 0);
        let bg = Background::from_frame("bg", &frame);
        assert_eq!(bg.source().data(), &[77, 77, 77, 255]);
    }

    #[test]
    fn test_resized_matches_requested_dimensions() {
        let bg = Background::from_frame("bg", &rgb(8, 6, [50, 60, 70]));
        let scaled = bg.resized(3, 5);
        assert_eq!(scaled.dimensions(), (3, 5));
        assert_eq!(scaled.format(), PixelFormat::Rgba);
        // Uniform colour survives interpolation
        for px in scaled.data().chunks_exact(4) {
            assert_eq!(px, &[50, 60, 70, 255]);
        }
    }

    #[test]
    fn test_same_size_returns_source() {
        let bg = Background::from_frame("bg", &rgb(4, 4, [1, 2, 3]));
        let same = bg.resized(4, 4);
        assert!(Arc::ptr_eq(&same, bg.source()));
        assert_eq!(bg.cached_sizes(), 0);
    }

    #[test]
    fn test_resized_is_cached_per_size() {
        let bg = Background::from_frame("bg", &rgb(8, 8, [9, 9, 9]));
        let a = bg.resized(4, 4);
        let b = bg.resized(4, 4);
        assert!(Arc::ptr_eq(&a, &b));
        let c = bg.resized(2, 2);
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(bg.cached_sizes(), 2);
    }

    #[test]
    fn test_cache_reset_keeps_handed_out_frames() {
        let bg = Background::from_frame("bg", &rgb(16, 16, [5, 5, 5]));
        let first = bg.resized(1, 1);
        for size in 2..=(MAX_CACHED_SIZES as u32 + 1) {
            bg.resized(size, size);
        }
        assert!(bg.cached_sizes() <= MAX_CACHED_SIZES);
        assert_eq!(first.data(), &[5, 5, 5, 255]);
    }

    #[test]
    fn test_load_missing_asset_is_unavailable() {
        let decoder = StubDecoder {
            frame: Some(rgb(1, 1, [0, 0, 0])),
        };
        let err = Background::load("stars.png", &FixedResolver(None), &decoder)
            .err()
            .unwrap();
        assert!(
            matches!(err, CompositeError::AssetUnavailable { ref name, .. } if name == "stars.png")
        );
    }

    #[test]
    fn test_load_undecodable_asset_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clouds2.png");
        std::fs::write(&path, b"not an image").unwrap();
        let err = Background::load(
            "clouds2.png",
            &FixedResolver(Some(path)),
            &StubDecoder { frame: None },
        )
        .err()
        .unwrap();
        assert!(matches!(err, CompositeError::AssetUnavailable { ref reason, .. } if reason.contains("corrupt image")));
    }

    #[test]
    fn test_load_decodes_resolved_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buildings.jpg");
        std::fs::write(&path, b"bytes").unwrap();
        let decoder = StubDecoder {
            frame: Some(rgb(3, 2, [100, 110, 120])),
        };
        let bg = Background::load("buildings.jpg", &FixedResolver(Some(path)), &decoder).unwrap();
        assert_eq!(bg.name(), "buildings.jpg");
        assert_eq!(bg.source().dimensions(), (3, 2));
    }

    #[test]
    fn test_shared_compositor_across_threads() {
        use crate::compositing::domain::frame_compositor::FrameCompositor;
        use crate::compositing::infrastructure::alpha_blend_compositor::AlphaBlendCompositor;

        let data: Vec<u8> = (0..16 * 16 * 3).map(|i| (i * 7 % 251) as u8).collect();
        let bg = Arc::new(Background::from_frame(
            "bg",
            &Frame::new(data, 16, 16, PixelFormat::Rgb, 0),
        ));
        let source_before = bg.source().data().to_vec();
        let compositor = Arc::new(AlphaBlendCompositor::with_default_blur(bg.clone()));

        let sizes = [(8u32, 8u32), (4, 6), (16, 16)];
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let compositor = compositor.clone();
                std::thread::spawn(move || {
                    let mut outputs = Vec::new();
                    let mut cached = Vec::new();
                    // Stagger the order so threads race on different sizes
                    for i in 0..sizes.len() {
                        let (w, h) = sizes[(i + t) % sizes.len()];
                        let input = rgb(w, h, [200, 100, 50]);
                        let alpha: Vec<u8> = (0..w * h)
                            .flat_map(|p| [0, 0, 0, if p % w < w / 2 { 255 } else { 0 }])
                            .collect();
                        let mask = Frame::new(alpha, w, h, PixelFormat::Rgba, 0);
                        let out = compositor.composite(&input, &mask).unwrap();
                        outputs.push(((w, h), out.data().to_vec()));
                        cached.push(((w, h), compositor.background().resized(w, h)));
                    }
                    outputs.sort_by_key(|(size, _)| *size);
                    cached.sort_by_key(|(size, _)| *size);
                    (outputs, cached)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let (first_outputs, first_cached) = &results[0];
        for (outputs, cached) in &results[1..] {
            assert_eq!(outputs, first_outputs);
            for ((size, a), (_, b)) in cached.iter().zip(first_cached) {
                assert!(Arc::ptr_eq(a, b), "distinct cached frames for {size:?}");
            }
        }
        // 16x16 is the source size and never enters the cache
        assert_eq!(bg.cached_sizes(), 2);
        assert_eq!(bg.source().data(), source_before.as_slice());
    }
}
