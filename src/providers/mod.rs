//! Provider configuration and the credential-holding registry
//!
//! Each stock-photo backend is described by a [`ProviderConfig`] value that
//! carries its request builder and response mapper as plain function
//! pointers. The gateway looks a config up by id and calls through those
//! pointers, so no code downstream of the registry needs to know which
//! vendor produced a result.

pub mod pexels;
pub mod pixabay;
pub mod store;
pub mod unsplash;

pub use store::{CredentialStore, JsonFileCredentialStore, MemoryCredentialStore};

use crate::search::TransportRequest;
use crate::{Error, ImageResult, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Builds the transport request for one search call.
pub type RequestBuilder = fn(&ProviderConfig, &str, &Credential) -> TransportRequest;

/// Maps a raw JSON payload into canonical results.
pub type ResponseMapper =
    fn(&serde_json::Value) -> std::result::Result<Vec<ImageResult>, MappingError>;

/// Page size used by the built-in providers (3 pages of 9 thumbnails).
pub const DEFAULT_PAGE_SIZE: u32 = 27;
/// Page limit advertised by the built-in providers.
pub const DEFAULT_MAX_PAGES: u32 = 3;

/// How a provider expects its credential to be transmitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Credential travels in the `Authorization` header
    Header,
    /// Credential travels as a query parameter
    Query,
}

/// The payload could not be translated into canonical results
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed response: {0}")]
pub struct MappingError(pub String);

/// Static configuration of one provider
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Registry key, e.g. `"pixabay"`
    pub id: String,
    /// Search endpoint
    pub base_url: String,
    pub auth_mode: AuthMode,
    /// Results requested per call
    pub page_size: u32,
    /// Advertised page limit. Searches still issue exactly one call.
    pub max_pages: u32,
    pub build_request: RequestBuilder,
    pub map_response: ResponseMapper,
}

impl ProviderConfig {
    /// Point the provider at a different endpoint (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::ConfigError("provider id must not be empty".into()));
        }
        if self.page_size == 0 || self.max_pages == 0 {
            return Err(Error::ConfigError(format!(
                "provider {} must request at least one result per page",
                self.id
            )));
        }
        url::Url::parse(&self.base_url).map_err(|e| {
            Error::ConfigError(format!(
                "provider {} has an invalid base URL {}: {}",
                self.id, self.base_url, e
            ))
        })?;
        Ok(())
    }
}

/// The closed set of built-in providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Unsplash,
    Pexels,
    Pixabay,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::Unsplash,
        ProviderKind::Pexels,
        ProviderKind::Pixabay,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ProviderKind::Unsplash => "unsplash",
            ProviderKind::Pexels => "pexels",
            ProviderKind::Pixabay => "pixabay",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    /// The default configuration for this provider.
    pub fn config(self) -> ProviderConfig {
        match self {
            ProviderKind::Unsplash => unsplash::config(),
            ProviderKind::Pexels => pexels::config(),
            ProviderKind::Pixabay => pixabay::config(),
        }
    }
}

/// A provider access key. `Debug` never prints the secret.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Credential(<empty>)")
        } else {
            f.write_str("Credential(***)")
        }
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Credential {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Storage key under which a provider's credential is persisted
pub fn credential_key(provider_id: &str) -> String {
    format!("{}_api_key", provider_id)
}

/// Holds provider configs in registration order plus their credentials.
///
/// The registry is constructed explicitly and handed to whichever component
/// needs it. Credential writes go through the attached [`CredentialStore`]
/// before the in-memory map is touched.
pub struct ProviderRegistry {
    providers: Vec<ProviderConfig>,
    credentials: HashMap<String, Credential>,
    store: Box<dyn CredentialStore>,
}

impl ProviderRegistry {
    /// Empty registry persisting credentials into `store`.
    pub fn new(store: impl CredentialStore + 'static) -> Self {
        Self {
            providers: Vec::new(),
            credentials: HashMap::new(),
            store: Box::new(store),
        }
    }

    /// Registry preloaded with Unsplash, Pexels and Pixabay.
    pub fn with_builtin_providers(store: impl CredentialStore + 'static) -> Self {
        let mut registry = Self::new(store);
        for kind in ProviderKind::ALL {
            registry.providers.push(kind.config());
        }
        registry
    }

    /// Add or overwrite a provider's static configuration.
    pub fn register_provider(&mut self, config: ProviderConfig) -> Result<()> {
        config.validate()?;
        match self.providers.iter_mut().find(|p| p.id == config.id) {
            Some(existing) if existing.auth_mode != config.auth_mode => {
                Err(Error::ConfigError(format!(
                    "provider {} is already registered with {:?} authentication",
                    config.id, existing.auth_mode
                )))
            }
            Some(existing) => {
                log::debug!("replacing configuration for provider {}", config.id);
                *existing = config;
                Ok(())
            }
            None => {
                log::debug!("registered provider {}", config.id);
                self.providers.push(config);
                Ok(())
            }
        }
    }

    /// Persist and store a credential. An empty value clears the provider's
    /// credential.
    pub fn set_credential(
        &mut self,
        provider_id: &str,
        credential: impl Into<Credential>,
    ) -> Result<()> {
        if self.provider(provider_id).is_none() {
            return Err(Error::UnknownProvider(provider_id.to_string()));
        }
        let credential = credential.into();
        self.store
            .set(&credential_key(provider_id), credential.expose())?;
        self.credentials.insert(provider_id.to_string(), credential);
        Ok(())
    }

    /// Apply saved credentials from `source` to every registered provider.
    /// Missing or empty entries are skipped.
    pub fn load_credentials(&mut self, source: &dyn CredentialStore) {
        for provider in &self.providers {
            if let Some(saved) = source.get(&credential_key(&provider.id)) {
                if !saved.is_empty() {
                    log::debug!("restored credential for provider {}", provider.id);
                    self.credentials
                        .insert(provider.id.clone(), Credential::new(saved));
                }
            }
        }
    }

    /// Restore credentials from the registry's own store.
    pub fn load_saved_credentials(&mut self) {
        let mut restored = Vec::new();
        for provider in &self.providers {
            if let Some(saved) = self.store.get(&credential_key(&provider.id)) {
                if !saved.is_empty() {
                    restored.push((provider.id.clone(), Credential::new(saved)));
                }
            }
        }
        self.credentials.extend(restored);
    }

    pub fn has_credential(&self, provider_id: &str) -> bool {
        self.credential(provider_id).is_some()
    }

    /// The non-empty credential for a provider, if any.
    pub fn credential(&self, provider_id: &str) -> Option<&Credential> {
        self.credentials
            .get(provider_id)
            .filter(|credential| !credential.is_empty())
    }

    pub fn provider(&self, provider_id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == provider_id)
    }

    /// Registered provider ids in registration order.
    pub fn list_providers(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.id.clone()).collect()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.list_providers())
            .field("credentials", &self.credentials)
            .finish()
    }
}

/// Provider ids arrive as JSON strings (Unsplash) or numbers (Pexels, Pixabay).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawId {
    Number(u64),
    Text(String),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

/// Vendor fields of one hit before normalization
#[derive(Debug, Default)]
pub(crate) struct RawHit {
    pub id: Option<RawId>,
    pub full_url: Option<String>,
    pub thumb_url: Option<String>,
    pub alt_text: Option<String>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

/// Apply the canonical fallbacks. Hits without a full-size URL are dropped.
pub(crate) fn normalize_hits(
    provider: &str,
    alt_fallback: &str,
    hits: impl IntoIterator<Item = RawHit>,
) -> Vec<ImageResult> {
    hits.into_iter()
        .enumerate()
        .filter_map(|(index, hit)| {
            let full_url = match non_empty(hit.full_url) {
                Some(url) => url,
                None => {
                    log::warn!("{} hit #{} has no image URL; skipping", provider, index);
                    return None;
                }
            };
            Some(ImageResult {
                id: hit
                    .id
                    .map(RawId::into_string)
                    .unwrap_or_else(|| index.to_string()),
                thumb_url: non_empty(hit.thumb_url).unwrap_or_else(|| full_url.clone()),
                full_url,
                alt_text: non_empty(hit.alt_text).unwrap_or_else(|| alt_fallback.to_string()),
                width: dimension(hit.width),
                height: dimension(hit.height),
            })
        })
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn dimension(value: Option<f64>) -> u32 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v.min(u32::MAX as f64) as u32,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ProviderRegistry {
        ProviderRegistry::with_builtin_providers(MemoryCredentialStore::new())
    }

    #[test]
    fn builtin_providers_keep_registration_order() {
        let reg = registry();
        assert_eq!(reg.list_providers(), vec!["unsplash", "pexels", "pixabay"]);
    }

    #[test]
    fn reregistering_same_shape_overwrites_in_place() {
        let mut reg = registry();
        let cfg = ProviderKind::Unsplash
            .config()
            .with_base_url("http://localhost:9/search");
        reg.register_provider(cfg).unwrap();
        assert_eq!(reg.list_providers(), vec!["unsplash", "pexels", "pixabay"]);
        assert_eq!(
            reg.provider("unsplash").unwrap().base_url,
            "http://localhost:9/search"
        );
    }

    #[test]
    fn conflicting_shape_is_rejected() {
        let mut reg = registry();
        let mut cfg = ProviderKind::Pixabay.config();
        cfg.id = "unsplash".into();
        let err = reg.register_provider(cfg).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
        assert_eq!(reg.provider("unsplash").unwrap().auth_mode, AuthMode::Header);
    }

    #[test]
    fn empty_id_and_bad_url_are_config_errors() {
        let mut reg = registry();
        let mut cfg = ProviderKind::Pexels.config();
        cfg.id = "  ".into();
        assert!(matches!(reg.register_provider(cfg), Err(Error::ConfigError(_))));

        let cfg = ProviderKind::Pexels.config().with_base_url("not a url");
        assert!(matches!(reg.register_provider(cfg), Err(Error::ConfigError(_))));

        let cfg = ProviderKind::Pexels.config().with_page_size(0);
        assert!(matches!(reg.register_provider(cfg), Err(Error::ConfigError(_))));
    }

    #[test]
    fn empty_credential_counts_as_absent() {
        let mut reg = registry();
        reg.set_credential("unsplash", "").unwrap();
        assert!(!reg.has_credential("unsplash"));
        reg.set_credential("unsplash", "key").unwrap();
        assert!(reg.has_credential("unsplash"));
    }

    #[test]
    fn unknown_provider_credential_is_rejected() {
        let mut reg = registry();
        let err = reg.set_credential("flickr", "abc").unwrap_err();
        assert!(matches!(err, Error::UnknownProvider(ref id) if id == "flickr"));
    }

    #[test]
    fn load_credentials_skips_missing_entries() {
        let mut reg = registry();
        let mut source = MemoryCredentialStore::new();
        source.set("pexels_api_key", "px").unwrap();
        source.set("flickr_api_key", "ignored").unwrap();
        reg.load_credentials(&source);
        assert!(reg.has_credential("pexels"));
        assert!(!reg.has_credential("unsplash"));
        assert!(!reg.has_credential("pixabay"));
    }

    #[test]
    fn credential_debug_is_redacted() {
        let c = Credential::new("super-secret");
        assert_eq!(format!("{:?}", c), "Credential(***)");
    }

    #[test]
    fn normalize_applies_fallbacks_and_drops_urlless_hits() {
        let hits = vec![
            RawHit {
                full_url: Some("http://x/a.jpg".into()),
                ..Default::default()
            },
            RawHit {
                id: Some(RawId::Number(7)),
                full_url: None,
                ..Default::default()
            },
        ];
        let results = normalize_hits("test", "Test image", hits);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "0");
        assert_eq!(results[0].thumb_url, "http://x/a.jpg");
        assert_eq!(results[0].alt_text, "Test image");
        assert_eq!((results[0].width, results[0].height), (0, 0));
    }
}
