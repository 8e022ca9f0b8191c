//! Rendering: composition subtree → layout → display list → bitmap

pub mod images;
pub mod layout;
pub mod paint;
pub mod raster;
pub mod style;

pub use images::{ImageStore, LoadedImage};

use crate::fonts::FontManager;
use crate::{Error, Result};
use image::{Rgba, RgbaImage};
use scraper::{ElementRef, Html};

/// Logical output width (3:4 portrait card)
pub const DEFAULT_WIDTH: u32 = 600;
/// Logical output height
pub const DEFAULT_HEIGHT: u32 = 800;
/// Device pixels per logical pixel
pub const DEFAULT_SCALE: f32 = 2.0;
/// Largest device-pixel edge a render may produce
pub const MAX_OUTPUT_EDGE: u32 = 16_384;

/// Which embedded images a render may read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrossOriginPolicy {
    /// Any preloaded image is readable regardless of origin
    #[default]
    Anonymous,
    /// Only images sharing the composition's base URL origin (and data
    /// URIs) are readable
    SameOrigin,
}

/// Output parameters of one render
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
    pub scale: f32,
    /// `None` leaves the canvas transparent
    pub background: Option<Rgba<u8>>,
    pub cross_origin: CrossOriginPolicy,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            scale: DEFAULT_SCALE,
            background: None,
            cross_origin: CrossOriginPolicy::Anonymous,
        }
    }
}

impl RenderOptions {
    /// Bitmap size in device pixels.
    pub fn output_size(&self) -> Result<(u32, u32)> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::ConfigError(format!(
                "render size {}x{} must be non-zero",
                self.width, self.height
            )));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(Error::ConfigError(format!(
                "render scale {} must be a positive number",
                self.scale
            )));
        }
        let width = (self.width as f64 * self.scale as f64).round();
        let height = (self.height as f64 * self.scale as f64).round();
        if width < 1.0 || height < 1.0 || width > MAX_OUTPUT_EDGE as f64 || height > MAX_OUTPUT_EDGE as f64 {
            return Err(Error::ConfigError(format!(
                "render output {}x{} is outside 1..={}",
                width, height, MAX_OUTPUT_EDGE
            )));
        }
        Ok((width as u32, height as u32))
    }
}

/// How a render names its source subtree
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// Element id, with or without a leading `#`
    Id(&'a str),
    /// First element matching a CSS selector
    Selector(&'a str),
    /// A node already resolved from the same composition
    Element(ElementRef<'a>),
}

impl<'a> From<&'a str> for Target<'a> {
    fn from(id: &'a str) -> Self {
        Target::Id(id)
    }
}

impl<'a> From<&'a String> for Target<'a> {
    fn from(id: &'a String) -> Self {
        Target::Id(id.as_str())
    }
}

impl<'a> From<ElementRef<'a>> for Target<'a> {
    fn from(el: ElementRef<'a>) -> Self {
        Target::Element(el)
    }
}

impl std::fmt::Display for Target<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Id(id) => write!(f, "#{}", id.trim_start_matches('#')),
            Target::Selector(sel) => f.write_str(sel),
            Target::Element(el) => write!(f, "<{}>", el.value().name()),
        }
    }
}

/// A parsed card layout whose elements can be rendered.
pub struct Composition {
    html: Html,
    base_url: Option<url::Url>,
}

impl Composition {
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
            base_url: None,
        }
    }

    /// Resolve relative `src` attributes (and same-origin checks) against
    /// `base`.
    pub fn with_base_url(mut self, base: &str) -> Result<Self> {
        let parsed = url::Url::parse(base)
            .map_err(|e| Error::ConfigError(format!("invalid base URL {}: {}", base, e)))?;
        self.base_url = Some(parsed);
        Ok(self)
    }

    pub fn base_url(&self) -> Option<&url::Url> {
        self.base_url.as_ref()
    }

    pub fn document(&self) -> &Html {
        &self.html
    }

    pub fn resolve<'a>(&'a self, target: &Target<'a>) -> Result<ElementRef<'a>> {
        let found = match target {
            Target::Element(el) => Some(*el),
            Target::Id(id) => {
                let id = id.trim_start_matches('#');
                self.html
                    .root_element()
                    .descendants()
                    .filter_map(ElementRef::wrap)
                    .find(|el| el.value().id() == Some(id))
            }
            Target::Selector(sel) => {
                let selector = scraper::Selector::parse(sel).map_err(|e| {
                    Error::TargetNotFound(format!("invalid selector {}: {:?}", sel, e))
                })?;
                self.html.select(&selector).next()
            }
        };
        found.ok_or_else(|| Error::TargetNotFound(target.to_string()))
    }

    /// Absolute `src` URLs of the images under `target`, in document order
    /// and without duplicates. Data URIs are skipped (they need no fetch).
    pub fn image_sources(&self, target: &Target<'_>) -> Result<Vec<String>> {
        let root = self.resolve(target)?;
        let mut sources: Vec<String> = Vec::new();
        for el in root.descendants().filter_map(ElementRef::wrap) {
            if el.value().name() != "img" {
                continue;
            }
            let Some(src) = el.value().attr("src").map(str::trim).filter(|s| !s.is_empty()) else {
                continue;
            };
            if images::is_data_uri(src) {
                continue;
            }
            let url = self.resolve_url(src);
            if !sources.contains(&url) {
                sources.push(url);
            }
        }
        Ok(sources)
    }

    pub fn resolve_url(&self, src: &str) -> String {
        if images::is_data_uri(src) {
            return src.to_string();
        }
        match &self.base_url {
            Some(base) => base
                .join(src)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| src.to_string()),
            None => src.to_string(),
        }
    }
}

impl std::fmt::Debug for Composition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Composition")
            .field("base_url", &self.base_url.as_ref().map(|u| u.as_str()))
            .finish_non_exhaustive()
    }
}

/// One render: which subtree, at what size
#[derive(Debug, Clone)]
pub struct RasterRequest<'a> {
    pub source: Target<'a>,
    pub options: RenderOptions,
}

impl<'a> RasterRequest<'a> {
    pub fn new(source: impl Into<Target<'a>>) -> Self {
        Self {
            source: source.into(),
            options: RenderOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }
}

/// Rendered pixels, handed to the exporter once.
#[derive(Debug)]
pub struct Bitmap {
    pixels: RgbaImage,
}

impl Bitmap {
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_rgba(self) -> RgbaImage {
        self.pixels
    }
}

/// Renders composition subtrees using preloaded images and one font.
#[derive(Debug, Default)]
pub struct Rasterizer {
    images: ImageStore,
    fonts: FontManager,
}

impl Rasterizer {
    pub fn new(fonts: FontManager) -> Self {
        Self {
            images: ImageStore::new(),
            fonts,
        }
    }

    /// Make a preloaded image available to subsequent renders.
    pub fn add_image(&mut self, image: LoadedImage) {
        self.images.insert(image);
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    pub fn images_mut(&mut self) -> &mut ImageStore {
        &mut self.images
    }

    pub fn fonts(&self) -> &FontManager {
        &self.fonts
    }

    pub fn render(&self, composition: &Composition, request: &RasterRequest<'_>) -> Result<Bitmap> {
        let options = &request.options;
        options.output_size()?;
        let root = composition.resolve(&request.source)?;
        log::debug!(
            "rendering {} at {}x{} (scale {})",
            request.source,
            options.width,
            options.height,
            options.scale
        );

        let tree = layout::layout_subtree(root, composition, &self.images, &self.fonts, options)?;
        let commands = paint::build_display_list(&tree.nodes);
        log::debug!("painting {} commands", commands.len());
        if !self.fonts.has_font() {
            let skipped = commands
                .iter()
                .filter(|cmd| matches!(cmd, paint::PaintCommand::Text { .. }))
                .count();
            if skipped > 0 {
                log::warn!("no font loaded; skipping {} text runs", skipped);
            }
        }
        let pixels = raster::rasterize(&commands, &tree.images, &self.fonts, options)?;
        Ok(Bitmap { pixels })
    }
}
