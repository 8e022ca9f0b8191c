//! Decoded images available to the rasterizer

use crate::{Error, Result};
use base64::Engine as _;
use image::RgbaImage;
use std::collections::HashMap;
use std::sync::Arc;

/// A fetched and decoded image, keyed by the URL it was loaded from
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub url: String,
    pub pixels: Arc<RgbaImage>,
}

impl LoadedImage {
    pub fn new(url: impl Into<String>, pixels: RgbaImage) -> Self {
        Self {
            url: url.into(),
            pixels: Arc::new(pixels),
        }
    }

    pub fn natural_width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn natural_height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Preloaded images the rasterizer may draw
#[derive(Debug, Default, Clone)]
pub struct ImageStore {
    images: HashMap<String, LoadedImage>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, image: LoadedImage) {
        self.images.insert(image.url.clone(), image);
    }

    pub fn get(&self, url: &str) -> Option<&LoadedImage> {
        self.images.get(url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.images.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }
}

/// Decode encoded image bytes (PNG, JPEG, BMP) to RGBA.
pub fn decode_bytes(data: &[u8]) -> std::result::Result<RgbaImage, String> {
    image::load_from_memory(data)
        .map(|img| img.to_rgba8())
        .map_err(|e| e.to_string())
}

pub fn is_data_uri(src: &str) -> bool {
    src.trim_start()
        .get(..5)
        .is_some_and(|p| p.eq_ignore_ascii_case("data:"))
}

/// Decode a base64 `data:image/...` URI.
pub fn decode_data_uri(uri: &str) -> Result<RgbaImage> {
    let fail = |message: String| Error::image_load(&preview(uri), message);
    let rest = uri.trim_start().get(5..).ok_or_else(|| fail("empty data URI".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| fail("data URI has no payload".into()))?;
    if !meta.to_ascii_lowercase().ends_with(";base64") {
        return Err(fail("only base64 data URIs are supported".into()));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| fail(format!("invalid base64: {}", e)))?;
    decode_bytes(&bytes).map_err(fail)
}

/// Data URIs can be huge; keep only the header in messages.
fn preview(uri: &str) -> String {
    match uri.find(',') {
        Some(idx) => format!("{},...", &uri[..idx]),
        None => uri.chars().take(32).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn tiny_png_data_uri() -> String {
        let img = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(buf.into_inner())
        )
    }

    #[test]
    fn decodes_base64_png_data_uri() {
        let img = decode_data_uri(&tiny_png_data_uri()).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn rejects_non_base64_data_uri() {
        let err = decode_data_uri("data:image/svg+xml,<svg/>").unwrap_err();
        match err {
            Error::ImageLoad { url, .. } => assert_eq!(url, "data:image/svg+xml,..."),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn store_keys_by_url() {
        let mut store = ImageStore::new();
        store.insert(LoadedImage::new("http://x/a.png", RgbaImage::new(4, 4)));
        assert!(store.contains("http://x/a.png"));
        assert_eq!(store.get("http://x/a.png").unwrap().natural_width(), 4);
        assert!(is_data_uri("DATA:image/png;base64,AA=="));
        assert!(!is_data_uri("http://x"));
    }
}
