//! Stockframe
//!
//! Search free stock-photo providers through one interface and compose a
//! chosen image with overlaid text into a downloadable raster.
//!
//! # Features
//!
//! - **Unified search**: Unsplash, Pexels and Pixabay responses are
//!   normalized into [`ImageResult`] values
//! - **Card rendering**: an HTML fragment with inline styles is laid out and
//!   rasterized at a fixed 3:4 size and 2x density
//! - **Export**: PNG, JPEG or BMP, saved through a pluggable [`export::SaveTarget`]
//!
//! # Example
//!
//! ```no_run
//! use stockframe::export::{DirectorySaver, ExportOptions, Exporter, ImageLoader};
//! use stockframe::providers::{MemoryCredentialStore, ProviderRegistry};
//! use stockframe::rendering::{Composition, Rasterizer, Target};
//! use stockframe::{Config, SearchGateway};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let mut registry = ProviderRegistry::with_builtin_providers(MemoryCredentialStore::new());
//! registry.set_credential("pixabay", "my-key")?;
//!
//! let gateway = SearchGateway::http(&config)?;
//! let results = gateway.search(&registry, "mountains", "pixabay")?;
//!
//! let html = format!(r#"<div id="card"><img src="{}"><h1>Hello</h1></div>"#, results[0].full_url);
//! let composition = Composition::parse(&html);
//! let mut rasterizer = Rasterizer::default();
//! ImageLoader::http(&config)?.preload_composition(&mut rasterizer, &composition, &Target::Id("card"))?;
//!
//! let exporter = Exporter::new(DirectorySaver::new("out"));
//! let path = exporter.render_and_export(&rasterizer, &composition, Target::Id("card"), "card", &ExportOptions::default())?;
//! println!("saved {}", path.display());
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod error;
pub use error::{Error, Result};

pub mod export;
pub mod fonts;
pub mod providers;
pub mod rendering;
pub mod search;

// Async facade over a worker thread that owns the synchronous core
pub mod async_api;

pub use async_api::Studio;
pub use providers::{ProviderKind, ProviderRegistry};
pub use search::SearchGateway;

/// One search hit in the provider-independent shape
///
/// `full_url` is never empty; `thumb_url` falls back to it. Dimensions are
/// 0 when the provider did not report them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResult {
    pub id: String,
    pub full_url: String,
    pub thumb_url: String,
    pub alt_text: String,
    pub width: u32,
    pub height: u32,
}

/// Runtime configuration
///
/// Every field has a default, so a JSON file only needs the keys it changes.
///
/// # Examples
///
/// ```
/// let cfg = stockframe::Config::default();
/// assert_eq!(cfg.search_timeout_ms, 10_000);
/// assert_eq!(cfg.render_options().unwrap().output_size().unwrap(), (1200, 1600));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// User agent sent with search and image requests
    pub user_agent: String,
    /// Timeout for a single search or image request in milliseconds
    pub search_timeout_ms: u64,
    /// Largest image download accepted by the preloader
    pub max_image_bytes: u64,
    /// TrueType font for card text; a system font is used when unset
    pub font_path: Option<PathBuf>,
    /// Directory exported images are written to
    pub output_dir: PathBuf,
    /// JSON file credentials are persisted in
    pub credentials_path: PathBuf,
    pub render: RenderSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: format!("stockframe/{}", env!("CARGO_PKG_VERSION")),
            search_timeout_ms: search::SEARCH_TIMEOUT.as_millis() as u64,
            max_image_bytes: export::loader::DEFAULT_MAX_IMAGE_BYTES,
            font_path: None,
            output_dir: PathBuf::from("."),
            credentials_path: PathBuf::from("stockframe-credentials.json"),
            render: RenderSettings::default(),
        }
    }
}

/// Render defaults as written in a config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub scale: f32,
    /// CSS color; transparent when unset
    pub background: Option<String>,
    pub cross_origin: rendering::CrossOriginPolicy,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: rendering::DEFAULT_WIDTH,
            height: rendering::DEFAULT_HEIGHT,
            scale: rendering::DEFAULT_SCALE,
            background: None,
            cross_origin: rendering::CrossOriginPolicy::Anonymous,
        }
    }
}

impl Config {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::ConfigError(e.to_string()))
    }

    /// Validated [`rendering::RenderOptions`] for these settings.
    pub fn render_options(&self) -> Result<rendering::RenderOptions> {
        let settings = &self.render;
        let background = match settings.background.as_deref() {
            Some(css) => Some(rendering::style::parse_color(css).ok_or_else(|| {
                Error::ConfigError(format!("invalid background color {:?}", css))
            })?),
            None => None,
        };
        let options = rendering::RenderOptions {
            width: settings.width,
            height: settings.height,
            scale: settings.scale,
            background,
            cross_origin: settings.cross_origin,
        };
        options.output_size()?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.search_timeout_ms, 10_000);
        assert_eq!(config.max_image_bytes, 50 * 1024 * 1024);
        assert!(config.user_agent.starts_with("stockframe/"));
        assert_eq!(config.render.width, 600);
        assert_eq!(config.render.height, 800);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = Config::from_json_str(
            r##"{"output_dir": "/tmp/cards", "render": {"background": "#fff", "cross_origin": "same-origin"}}"##,
        )
        .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/tmp/cards"));
        assert_eq!(config.search_timeout_ms, 10_000);
        let options = config.render_options().unwrap();
        assert_eq!(options.background, Some(image::Rgba([255, 255, 255, 255])));
        assert_eq!(options.cross_origin, rendering::CrossOriginPolicy::SameOrigin);
        assert_eq!(options.scale, 2.0);
    }

    #[test]
    fn bad_render_settings_are_config_errors() {
        let mut config = Config::default();
        config.render.background = Some("not-a-color".into());
        assert!(matches!(config.render_options(), Err(Error::ConfigError(_))));
        assert!(Config::from_json_str("{\"search_timeout_ms\": \"soon\"}").is_err());
    }

    #[test]
    fn image_result_serializes_with_field_names() {
        let result = ImageResult {
            id: "1".into(),
            full_url: "http://x/a.jpg".into(),
            thumb_url: "http://x/a_t.jpg".into(),
            alt_text: "a".into(),
            width: 10,
            height: 20,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["full_url"], "http://x/a.jpg");
        assert_eq!(json["width"], 10);
        let back: ImageResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }
}
