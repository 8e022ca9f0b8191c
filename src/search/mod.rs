//! Unified search over the registered providers

pub mod transport;

#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::{Transport, TransportError, TransportRequest, TransportResponse};

use crate::providers::ProviderRegistry;
use crate::{Error, ImageResult, Result};
use std::time::Duration;

/// Upper bound on a single provider call
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds provider requests, executes them and normalizes the payloads.
///
/// Each `search` issues exactly one transport call and returns one page of
/// results at the provider's configured page size. Nothing is cached.
pub struct SearchGateway {
    transport: Box<dyn Transport>,
}

impl SearchGateway {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
        }
    }

    /// Gateway over the default HTTP transport.
    #[cfg(feature = "http")]
    pub fn http(config: &crate::Config) -> Result<Self> {
        let transport = HttpTransport::new(
            Duration::from_millis(config.search_timeout_ms),
            &config.user_agent,
        )?;
        Ok(Self::new(transport))
    }

    pub fn search(
        &self,
        registry: &ProviderRegistry,
        query: &str,
        provider_id: &str,
    ) -> Result<Vec<ImageResult>> {
        let config = registry
            .provider(provider_id)
            .ok_or_else(|| Error::UnknownProvider(provider_id.to_string()))?;
        let credential = registry
            .credential(provider_id)
            .ok_or_else(|| Error::MissingCredential(provider_id.to_string()))?;

        let request = (config.build_request)(config, query, credential);
        log::debug!(
            "searching {} for {:?} ({} per page)",
            provider_id,
            query,
            config.page_size
        );

        let response = self.transport.get(&request).map_err(|e| {
            log::warn!("search on {} failed: {}", provider_id, e);
            Error::search_failed(provider_id, e.to_string())
        })?;
        if !(200..300).contains(&response.status) {
            return Err(Error::search_failed(
                provider_id,
                TransportError::Status {
                    status: response.status,
                    body: String::new(),
                }
                .to_string(),
            ));
        }

        let results = (config.map_response)(&response.data).map_err(|e| {
            log::warn!("search on {} returned an unexpected payload: {}", provider_id, e);
            Error::search_failed(provider_id, e.to_string())
        })?;
        log::debug!("{} returned {} results", provider_id, results.len());
        Ok(results)
    }
}
