//! Image preloading
//!
//! Images must be fetched and decoded before a render so that rasterization
//! never blocks on the network. Requests carry no cookies or credentials.

use crate::rendering::images::{self, LoadedImage};
use crate::rendering::{Composition, Rasterizer, Target};
use crate::{Error, Result};
use std::io::Read;

/// Default cap on a single downloaded image
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 50 * 1024 * 1024;

/// Fetches the encoded bytes behind a remote image URL
pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, url: &str, max_bytes: u64) -> std::result::Result<Vec<u8>, String>;
}

/// Resolves image URLs to decoded pixels.
///
/// `data:` URIs and `file:` URLs are handled locally; anything else goes to
/// the configured fetcher.
pub struct ImageLoader {
    fetcher: Option<Box<dyn ImageFetcher>>,
    max_bytes: u64,
}

impl ImageLoader {
    /// A loader that can only read `data:` URIs and local files.
    pub fn offline() -> Self {
        Self {
            fetcher: None,
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }

    pub fn with_fetcher(fetcher: impl ImageFetcher + 'static) -> Self {
        Self {
            fetcher: Some(Box::new(fetcher)),
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }

    #[cfg(feature = "http")]
    pub fn http(config: &crate::Config) -> Result<Self> {
        let fetcher = HttpImageFetcher::new(
            std::time::Duration::from_millis(config.search_timeout_ms),
            &config.user_agent,
        )?;
        Ok(Self::with_fetcher(fetcher).with_max_bytes(config.max_image_bytes))
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn preload_image(&self, url: &str) -> Result<LoadedImage> {
        if images::is_data_uri(url) {
            let pixels = images::decode_data_uri(url)?;
            return Ok(LoadedImage::new(url, pixels));
        }

        let bytes = match url::Url::parse(url) {
            Ok(parsed) if parsed.scheme() == "file" => {
                let path = parsed
                    .to_file_path()
                    .map_err(|_| Error::image_load(url, "not a local path"))?;
                let file = std::fs::File::open(&path)
                    .map_err(|e| Error::image_load(url, e.to_string()))?;
                read_limited(file, self.max_bytes).map_err(|e| Error::image_load(url, e))?
            }
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
                let fetcher = self
                    .fetcher
                    .as_ref()
                    .ok_or_else(|| Error::image_load(url, "no network fetcher configured"))?;
                fetcher
                    .fetch(url, self.max_bytes)
                    .map_err(|e| Error::image_load(url, e))?
            }
            Ok(parsed) => {
                return Err(Error::image_load(
                    url,
                    format!("unsupported scheme {}", parsed.scheme()),
                ))
            }
            Err(e) => return Err(Error::image_load(url, e.to_string())),
        };

        let pixels = images::decode_bytes(&bytes).map_err(|e| Error::image_load(url, e))?;
        log::debug!("preloaded {} ({}x{})", url, pixels.width(), pixels.height());
        Ok(LoadedImage::new(url, pixels))
    }

    /// Preload every image under `target` into `rasterizer`, skipping ones
    /// it already holds. Returns how many were loaded.
    pub fn preload_composition(
        &self,
        rasterizer: &mut Rasterizer,
        composition: &Composition,
        target: &Target<'_>,
    ) -> Result<usize> {
        let mut loaded = 0;
        for url in composition.image_sources(target)? {
            if rasterizer.images().contains(&url) {
                continue;
            }
            rasterizer.add_image(self.preload_image(&url)?);
            loaded += 1;
        }
        Ok(loaded)
    }
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("network", &self.fetcher.is_some())
            .field("max_bytes", &self.max_bytes)
            .finish()
    }
}

/// Read at most `max_bytes`; larger inputs are an error rather than a
/// truncated image.
pub(crate) fn read_limited(reader: impl Read, max_bytes: u64) -> std::result::Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    reader
        .take(max_bytes.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|e| e.to_string())?;
    if buf.len() as u64 > max_bytes {
        return Err(format!("image exceeds the {} byte limit", max_bytes));
    }
    Ok(buf)
}

#[cfg(feature = "http")]
pub use http::HttpImageFetcher;

#[cfg(feature = "http")]
mod http {
    use super::*;
    use reqwest::blocking::Client;
    use std::time::Duration;

    /// Anonymous `reqwest` fetcher: no cookie store, no auth headers
    pub struct HttpImageFetcher {
        client: Client,
    }

    impl HttpImageFetcher {
        pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
            let client = Client::builder()
                .timeout(timeout)
                .user_agent(user_agent)
                .build()
                .map_err(|e| {
                    Error::ConfigError(format!("Failed to build HTTP client: {}", e))
                })?;
            Ok(Self { client })
        }
    }

    impl ImageFetcher for HttpImageFetcher {
        fn fetch(&self, url: &str, max_bytes: u64) -> std::result::Result<Vec<u8>, String> {
            let resp = self.client.get(url).send().map_err(|e| e.to_string())?;
            let status = resp.status();
            if !status.is_success() {
                return Err(format!("HTTP status {}", status.as_u16()));
            }
            if resp.content_length().is_some_and(|len| len > max_bytes) {
                return Err(format!("image exceeds the {} byte limit", max_bytes));
            }
            read_limited(resp, max_bytes)
        }
    }
}
