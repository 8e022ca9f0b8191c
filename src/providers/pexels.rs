//! Pexels search API (`/v1/search`)

use super::{
    normalize_hits, AuthMode, Credential, MappingError, ProviderConfig, RawHit, RawId,
    DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE,
};
use crate::search::TransportRequest;
use crate::ImageResult;
use serde::Deserialize;

pub const BASE_URL: &str = "https://api.pexels.com/v1/search";
const ALT_FALLBACK: &str = "Pexels image";

pub fn config() -> ProviderConfig {
    ProviderConfig {
        id: "pexels".into(),
        base_url: BASE_URL.into(),
        auth_mode: AuthMode::Header,
        page_size: DEFAULT_PAGE_SIZE,
        max_pages: DEFAULT_MAX_PAGES,
        build_request,
        map_response,
    }
}

// Pexels takes the bare key as the Authorization value.
fn build_request(config: &ProviderConfig, query: &str, credential: &Credential) -> TransportRequest {
    TransportRequest::get(&config.base_url)
        .param("query", query)
        .param("per_page", config.page_size)
        .header("Authorization", credential.expose())
}

#[derive(Deserialize)]
struct SearchResponse {
    photos: Vec<Photo>,
}

#[derive(Deserialize)]
struct Photo {
    id: Option<RawId>,
    #[serde(default)]
    src: Sources,
    alt: Option<String>,
    width: Option<f64>,
    height: Option<f64>,
}

#[derive(Deserialize, Default)]
struct Sources {
    large: Option<String>,
    medium: Option<String>,
}

fn map_response(payload: &serde_json::Value) -> Result<Vec<ImageResult>, MappingError> {
    let response = SearchResponse::deserialize(payload).map_err(|e| MappingError(e.to_string()))?;
    let hits = response.photos.into_iter().map(|photo| RawHit {
        id: photo.id,
        full_url: photo.src.large,
        thumb_url: photo.src.medium,
        alt_text: photo.alt,
        width: photo.width,
        height: photo.height,
    });
    Ok(normalize_hits("pexels", ALT_FALLBACK, hits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_sends_bare_key() {
        let req = build_request(&config(), "sea", &Credential::new("px-key"));
        assert_eq!(req.header_value("Authorization"), Some("px-key"));
        assert_eq!(req.param_value("key"), None);
    }

    #[test]
    fn numeric_ids_become_strings() {
        let payload = json!({
            "photos": [{
                "id": 2014422,
                "src": { "large": "http://p/l.jpg", "medium": "http://p/m.jpg" },
                "alt": "",
                "width": 3024,
                "height": 3024
            }]
        });
        let results = map_response(&payload).unwrap();
        assert_eq!(results[0].id, "2014422");
        assert_eq!(results[0].alt_text, "Pexels image");
        assert_eq!(results[0].thumb_url, "http://p/m.jpg");
    }
}
