//! Encoding rendered bitmaps and handing them to a save target

pub mod loader;

pub use loader::{ImageFetcher, ImageLoader};
#[cfg(feature = "http")]
pub use loader::HttpImageFetcher;

use crate::rendering::{Bitmap, Composition, RasterRequest, Rasterizer, RenderOptions, Target};
use crate::{Error, Result};
use base64::Engine as _;
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};

/// File name used when the caller gives none
pub const DEFAULT_FILE_NAME: &str = "image";
pub const DEFAULT_QUALITY: f32 = 0.9;

/// Output encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MimeType {
    #[default]
    Png,
    Jpeg,
    Bmp,
}

impl MimeType {
    /// Accepts full mime types (`image/png`) and bare subtypes (`png`, `jpg`).
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        let subtype = value.strip_prefix("image/").unwrap_or(&value);
        match subtype {
            "png" => Some(MimeType::Png),
            "jpeg" | "jpg" => Some(MimeType::Jpeg),
            "bmp" => Some(MimeType::Bmp),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MimeType::Png => "image/png",
            MimeType::Jpeg => "image/jpeg",
            MimeType::Bmp => "image/bmp",
        }
    }

    /// The mime subtype, used verbatim as the file extension.
    pub fn extension(self) -> &'static str {
        match self {
            MimeType::Png => "png",
            MimeType::Jpeg => "jpeg",
            MimeType::Bmp => "bmp",
        }
    }
}

impl std::fmt::Display for MimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoded image bytes with their mime type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime: MimeType,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn extension(&self) -> &'static str {
        self.mime.extension()
    }

    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime.as_str(),
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Where exported files end up
pub trait SaveTarget: Send {
    /// Store `bytes` as `file_name` and return the final location.
    fn save(&self, bytes: &[u8], file_name: &str) -> Result<PathBuf>;
}

/// Saves files under a directory, creating it on first use.
///
/// Bytes go to a hidden `.part` sibling first and are renamed into place;
/// a failed save leaves no file under the final name.
#[derive(Debug, Clone)]
pub struct DirectorySaver {
    dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SaveTarget for DirectorySaver {
    fn save(&self, bytes: &[u8], file_name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            Error::ExportFailed(format!("Failed to create {}: {}", self.dir.display(), e))
        })?;
        let target = self.dir.join(file_name);
        let partial = self.dir.join(format!(".{}.part", file_name));
        fs::write(&partial, bytes)
            .and_then(|_| fs::rename(&partial, &target))
            .map_err(|e| {
                let _ = fs::remove_file(&partial);
                Error::ExportFailed(format!("Failed to write {}: {}", target.display(), e))
            })?;
        log::debug!("saved {} bytes to {}", bytes.len(), target.display());
        Ok(target)
    }
}

/// Everything one export needs besides the source subtree
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub render: RenderOptions,
    pub mime: MimeType,
    /// 0.0 to 1.0, JPEG only
    pub quality: f32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            render: RenderOptions::default(),
            mime: MimeType::Png,
            quality: DEFAULT_QUALITY,
        }
    }
}

pub struct Exporter {
    saver: Box<dyn SaveTarget>,
}

impl Exporter {
    pub fn new(saver: impl SaveTarget + 'static) -> Self {
        Self {
            saver: Box::new(saver),
        }
    }

    /// Encode `bitmap`. JPEG drops alpha by compositing onto black.
    pub fn encode(bitmap: Bitmap, mime: MimeType, quality: f32) -> Result<EncodedImage> {
        if !quality.is_finite() {
            return Err(Error::ExportFailed(format!("invalid quality {}", quality)));
        }
        let rgba = bitmap.into_rgba();
        let (width, height) = rgba.dimensions();
        let mut bytes = Vec::new();
        let encoded = match mime {
            MimeType::Png => PngEncoder::new(&mut bytes).write_image(
                rgba.as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            ),
            MimeType::Bmp => BmpEncoder::new(&mut bytes).write_image(
                rgba.as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            ),
            MimeType::Jpeg => {
                let rgb = RgbImage::from_fn(width, height, |x, y| {
                    let p = rgba.get_pixel(x, y);
                    let a = p[3] as u16;
                    let over_black = |c: u8| ((c as u16 * a + 127) / 255) as u8;
                    image::Rgb([over_black(p[0]), over_black(p[1]), over_black(p[2])])
                });
                JpegEncoder::new_with_quality(&mut bytes, jpeg_quality(quality)).write_image(
                    rgb.as_raw(),
                    width,
                    height,
                    ExtendedColorType::Rgb8,
                )
            }
        };
        encoded.map_err(|e| Error::ExportFailed(format!("Failed to encode {}: {}", mime, e)))?;
        log::debug!("encoded {}x{} {} ({} bytes)", width, height, mime, bytes.len());
        Ok(EncodedImage { mime, bytes })
    }

    /// Save as `<file_name>.<extension>`; an empty name becomes
    /// [`DEFAULT_FILE_NAME`].
    pub fn persist(&self, encoded: &EncodedImage, file_name: &str) -> Result<PathBuf> {
        let stem = file_name_stem(file_name)?;
        let name = format!("{}.{}", stem, encoded.extension());
        self.saver.save(&encoded.bytes, &name)
    }

    /// Render → encode → persist. The first failure is returned as is and
    /// nothing is saved.
    pub fn render_and_export(
        &self,
        rasterizer: &Rasterizer,
        composition: &Composition,
        source: Target<'_>,
        file_name: &str,
        options: &ExportOptions,
    ) -> Result<PathBuf> {
        let request = RasterRequest::new(source).with_options(options.render.clone());
        let bitmap = rasterizer.render(composition, &request)?;
        let encoded = Self::encode(bitmap, options.mime, options.quality)?;
        self.persist(&encoded, file_name)
    }
}

impl std::fmt::Debug for Exporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter").finish_non_exhaustive()
    }
}

fn jpeg_quality(quality: f32) -> u8 {
    (quality.clamp(0.0, 1.0) * 100.0).round().clamp(1.0, 100.0) as u8
}

fn file_name_stem(file_name: &str) -> Result<&str> {
    let stem = file_name.trim();
    if stem.is_empty() {
        return Ok(DEFAULT_FILE_NAME);
    }
    if stem.contains(['/', '\\']) || stem == "." || stem == ".." {
        return Err(Error::ExportFailed(format!(
            "file name {:?} must not contain a path",
            file_name
        )));
    }
    Ok(stem)
}

/// Largest size not exceeding `max_width` x `max_height` that keeps the
/// aspect ratio of `width` x `height`. Images that already fit are returned
/// unchanged; edges are floored.
pub fn compute_fit_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }
    let width_ratio = max_width as f64 / width as f64;
    let height_ratio = max_height as f64 / height as f64;
    // The limiting edge lands exactly on its bound.
    if width_ratio <= height_ratio {
        let fit_height = ((height as f64 * width_ratio).floor() as u32).min(max_height);
        (max_width, fit_height)
    } else {
        let fit_width = ((width as f64 * height_ratio).floor() as u32).min(max_width);
        (fit_width, max_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use proptest::prelude::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingSaver {
        saved: Arc<Mutex<Vec<(String, usize)>>>,
    }

    impl SaveTarget for RecordingSaver {
        fn save(&self, bytes: &[u8], file_name: &str) -> Result<PathBuf> {
            self.saved.lock().unwrap().push((file_name.to_string(), bytes.len()));
            Ok(PathBuf::from(file_name))
        }
    }

    fn bitmap(w: u32, h: u32, px: Rgba<u8>) -> Bitmap {
        Bitmap::from_rgba(RgbaImage::from_pixel(w, h, px))
    }

    #[test]
    fn fit_examples() {
        assert_eq!(compute_fit_dimensions(1200, 900, 600, 800), (600, 450));
        assert_eq!(compute_fit_dimensions(300, 200, 600, 800), (300, 200));
        assert_eq!(compute_fit_dimensions(1000, 3000, 600, 800), (266, 800));
    }

    proptest! {
        #[test]
        fn fit_never_exceeds_bounds(w in 1u32..10_000, h in 1u32..10_000, mw in 1u32..4_000, mh in 1u32..4_000) {
            let (fw, fh) = compute_fit_dimensions(w, h, mw, mh);
            prop_assert!(fw <= mw && fh <= mh);
            if w <= mw && h <= mh {
                prop_assert_eq!((fw, fh), (w, h));
            } else {
                prop_assert!(fw <= w && fh <= h);
            }
        }
    }

    #[test]
    fn mime_parsing_and_extensions() {
        assert_eq!(MimeType::parse("image/png"), Some(MimeType::Png));
        assert_eq!(MimeType::parse("JPG"), Some(MimeType::Jpeg));
        assert_eq!(MimeType::parse("image/webp"), None);
        assert_eq!(MimeType::Jpeg.extension(), "jpeg");
    }

    #[test]
    fn png_round_trips_pixels() {
        let encoded = Exporter::encode(bitmap(4, 3, Rgba([1, 2, 3, 4])), MimeType::Png, 0.9).unwrap();
        let decoded = image::load_from_memory(&encoded.bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.get_pixel(2, 1), &Rgba([1, 2, 3, 4]));
        assert!(encoded.to_data_url().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn jpeg_flattens_transparency_onto_black() {
        let encoded = Exporter::encode(bitmap(16, 16, Rgba([255, 255, 255, 0])), MimeType::Jpeg, 1.0).unwrap();
        let decoded = image::load_from_memory(&encoded.bytes).unwrap().to_rgb8();
        assert!(decoded.pixels().all(|p| p[0] < 8 && p[1] < 8 && p[2] < 8));
    }

    #[test]
    fn bmp_is_encoded() {
        let encoded = Exporter::encode(bitmap(2, 2, Rgba([9, 9, 9, 255])), MimeType::Bmp, 0.5).unwrap();
        assert_eq!(&encoded.bytes[..2], b"BM");
    }

    #[test]
    fn quality_maps_to_jpeg_range() {
        assert_eq!(jpeg_quality(0.0), 1);
        assert_eq!(jpeg_quality(0.9), 90);
        assert_eq!(jpeg_quality(7.0), 100);
    }

    #[test]
    fn persist_names_file_after_subtype() {
        let saver = RecordingSaver::default();
        let exporter = Exporter::new(saver.clone());
        let encoded = EncodedImage {
            mime: MimeType::Jpeg,
            bytes: vec![1, 2, 3],
        };
        exporter.persist(&encoded, "card").unwrap();
        exporter.persist(&encoded, "  ").unwrap();
        assert!(exporter.persist(&encoded, "../escape").is_err());
        let saved = saver.saved.lock().unwrap();
        assert_eq!(
            *saved,
            vec![("card.jpeg".to_string(), 3), ("image.jpeg".to_string(), 3)]
        );
    }

    #[test]
    fn directory_saver_leaves_only_final_file() {
        let dir = tempfile::tempdir().unwrap();
        let saver = DirectorySaver::new(dir.path().join("out"));
        let path = saver.save(b"abc", "x.png").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"abc");
        let names: Vec<_> = fs::read_dir(saver.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["x.png"]);
    }

    #[test]
    fn missing_target_saves_nothing() {
        let saver = RecordingSaver::default();
        let exporter = Exporter::new(saver.clone());
        let composition = Composition::parse("<div id='other'></div>");
        let err = exporter
            .render_and_export(
                &Rasterizer::default(),
                &composition,
                Target::Id("card"),
                "card",
                &ExportOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::TargetNotFound(_)));
        assert!(saver.saved.lock().unwrap().is_empty());
    }
}
