//! Unsplash search API (`/search/photos`)

use super::{
    normalize_hits, AuthMode, Credential, MappingError, ProviderConfig, RawHit, RawId,
    DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE,
};
use crate::search::TransportRequest;
use crate::ImageResult;
use serde::Deserialize;

pub const BASE_URL: &str = "https://api.unsplash.com/search/photos";
const ALT_FALLBACK: &str = "Unsplash image";

pub fn config() -> ProviderConfig {
    ProviderConfig {
        id: "unsplash".into(),
        base_url: BASE_URL.into(),
        auth_mode: AuthMode::Header,
        page_size: DEFAULT_PAGE_SIZE,
        max_pages: DEFAULT_MAX_PAGES,
        build_request,
        map_response,
    }
}

fn build_request(config: &ProviderConfig, query: &str, credential: &Credential) -> TransportRequest {
    TransportRequest::get(&config.base_url)
        .param("query", query)
        .param("per_page", config.page_size)
        .header("Authorization", format!("Client-ID {}", credential.expose()))
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<Photo>,
}

#[derive(Deserialize)]
struct Photo {
    id: Option<RawId>,
    #[serde(default)]
    urls: Urls,
    alt_description: Option<String>,
    width: Option<f64>,
    height: Option<f64>,
}

#[derive(Deserialize, Default)]
struct Urls {
    regular: Option<String>,
    thumb: Option<String>,
}

fn map_response(payload: &serde_json::Value) -> Result<Vec<ImageResult>, MappingError> {
    let response = SearchResponse::deserialize(payload).map_err(|e| MappingError(e.to_string()))?;
    let hits = response.results.into_iter().map(|photo| RawHit {
        id: photo.id,
        full_url: photo.urls.regular,
        thumb_url: photo.urls.thumb,
        alt_text: photo.alt_description,
        width: photo.width,
        height: photo.height,
    });
    Ok(normalize_hits("unsplash", ALT_FALLBACK, hits))
}
