//! TrueType font loading and glyph drawing for rendered text

use crate::{Error, Result};
use image::{Pixel, Rgba, RgbaImage};
use rusttype::{point, Font, Scale};
use std::path::{Path, PathBuf};

/// Fallback advance used to estimate text width when no font is loaded.
const ESTIMATED_ADVANCE_EM: f32 = 0.5;
const LINE_HEIGHT_EM: f32 = 1.2;

/// Holds the single font used to draw composition text.
///
/// A manager without a font still measures text (using an estimated
/// advance) so layout stays stable; drawing is then a no-op.
pub struct FontManager {
    font: Option<Font<'static>>,
    source: Option<PathBuf>,
}

impl FontManager {
    /// A manager that has no font and draws no text.
    pub fn empty() -> Self {
        Self {
            font: None,
            source: None,
        }
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let font = Font::try_from_vec(data)
            .ok_or_else(|| Error::ConfigError("font data is not a TrueType/OpenType font".into()))?;
        Ok(Self {
            font: Some(font),
            source: None,
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read font {}: {}", path.display(), e))
        })?;
        let mut manager = Self::from_bytes(data)?;
        manager.source = Some(path.to_path_buf());
        Ok(manager)
    }

    /// Use `path` when given, otherwise the first usable system sans-serif
    /// font. Falls back to an empty manager.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None => Ok(Self::system()),
        }
    }

    /// First usable system font, or an empty manager.
    pub fn system() -> Self {
        for candidate in system_font_candidates() {
            if !candidate.exists() {
                continue;
            }
            match Self::from_path(&candidate) {
                Ok(manager) => {
                    log::debug!("using system font {}", candidate.display());
                    return manager;
                }
                Err(e) => log::debug!("skipping font {}: {}", candidate.display(), e),
            }
        }
        log::warn!("no system font found; text will not be drawn");
        Self::empty()
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Advance width of `text` at `size` px.
    pub fn measure(&self, text: &str, size: f32) -> f32 {
        match &self.font {
            Some(font) => {
                let scale = Scale::uniform(size);
                font.layout(text, scale, point(0.0, 0.0))
                    .last()
                    .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
                    .unwrap_or(0.0)
            }
            None => text.chars().count() as f32 * size * ESTIMATED_ADVANCE_EM,
        }
    }

    pub fn line_height(&self, size: f32) -> f32 {
        size * LINE_HEIGHT_EM
    }

    /// Draw one line of text with its box top-left at (`x`, `y`).
    pub fn draw(&self, canvas: &mut RgbaImage, text: &str, x: f32, y: f32, size: f32, color: Rgba<u8>) {
        let Some(font) = &self.font else {
            return;
        };
        let scale = Scale::uniform(size);
        let v_metrics = font.v_metrics(scale);
        // Center the glyph box vertically inside the line box.
        let leading = (self.line_height(size) - (v_metrics.ascent - v_metrics.descent)) / 2.0;
        let baseline = y + leading.max(0.0) + v_metrics.ascent;
        let (width, height) = canvas.dimensions();

        for glyph in font.layout(text, scale, point(x, baseline)) {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, coverage| {
                let px = gx as i32 + bb.min.x;
                let py = gy as i32 + bb.min.y;
                if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
                    return;
                }
                let alpha = (color[3] as f32 * coverage).round() as u8;
                if alpha == 0 {
                    return;
                }
                let src = Rgba([color[0], color[1], color[2], alpha]);
                canvas.get_pixel_mut(px as u32, py as u32).blend(&src);
            });
        }
    }
}

impl Default for FontManager {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for FontManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontManager")
            .field("loaded", &self.font.is_some())
            .field("source", &self.source)
            .finish()
    }
}

fn system_font_candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(target_os = "linux")]
    {
        for p in [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/usr/share/fonts/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
            "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
            "/usr/share/fonts/noto/NotoSans-Regular.ttf",
            "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
        ] {
            paths.push(PathBuf::from(p));
        }
    }

    #[cfg(target_os = "macos")]
    {
        for p in [
            "/System/Library/Fonts/Supplemental/Arial.ttf",
            "/Library/Fonts/Arial.ttf",
            "/System/Library/Fonts/Supplemental/Verdana.ttf",
        ] {
            paths.push(PathBuf::from(p));
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(windir) = std::env::var("WINDIR") {
            let fonts = PathBuf::from(windir).join("Fonts");
            for name in ["arial.ttf", "segoeui.ttf", "verdana.ttf"] {
                paths.push(fonts.join(name));
            }
        }
    }

    paths
}
