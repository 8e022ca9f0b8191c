//! Error types for search, rendering and export

use thiserror::Error;

/// Result type alias for stockframe operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the registry, gateway, rasterizer and exporter
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid provider registration or configuration file
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Reference to a provider that was never registered
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Search attempted before a credential was set
    #[error("No credential set for provider {0}")]
    MissingCredential(String),

    /// Transport or mapping failure during a search
    #[error("Search failed ({provider}): {message}")]
    SearchFailed { provider: String, message: String },

    /// The rasterization target could not be resolved
    #[error("Render target not found: {0}")]
    TargetNotFound(String),

    /// Failure while laying out, decoding or painting the subtree
    #[error("Rendering failed: {0}")]
    RenderFailed(String),

    /// Image preload failed
    #[error("Failed to load image {url}: {message}")]
    ImageLoad { url: String, message: String },

    /// Encoding or saving the rendered image failed
    #[error("Export failed: {0}")]
    ExportFailed(String),

    /// The credential store rejected a read or write
    #[error("Credential persistence failed: {0}")]
    Persistence(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn search_failed(provider: &str, message: impl Into<String>) -> Self {
        Error::SearchFailed {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn image_load(url: &str, message: impl Into<String>) -> Self {
        Error::ImageLoad {
            url: url.to_string(),
            message: message.into(),
        }
    }
}
