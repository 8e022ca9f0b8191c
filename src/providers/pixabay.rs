//! Pixabay search API. The key travels as a query parameter.

use super::{
    normalize_hits, AuthMode, Credential, MappingError, ProviderConfig, RawHit, RawId,
    DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE,
};
use crate::search::TransportRequest;
use crate::ImageResult;
use serde::Deserialize;

pub const BASE_URL: &str = "https://pixabay.com/api/";
const ALT_FALLBACK: &str = "Pixabay image";

pub fn config() -> ProviderConfig {
    ProviderConfig {
        id: "pixabay".into(),
        base_url: BASE_URL.into(),
        auth_mode: AuthMode::Query,
        page_size: DEFAULT_PAGE_SIZE,
        max_pages: DEFAULT_MAX_PAGES,
        build_request,
        map_response,
    }
}

fn build_request(config: &ProviderConfig, query: &str, credential: &Credential) -> TransportRequest {
    TransportRequest::get(&config.base_url)
        .param("q", query)
        .param("per_page", config.page_size)
        .param("key", credential.expose())
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Hit {
    id: Option<RawId>,
    #[serde(rename = "largeImageURL")]
    large_image_url: Option<String>,
    #[serde(rename = "previewURL")]
    preview_url: Option<String>,
    tags: Option<String>,
    image_width: Option<f64>,
    image_height: Option<f64>,
}

fn map_response(payload: &serde_json::Value) -> Result<Vec<ImageResult>, MappingError> {
    let response = SearchResponse::deserialize(payload).map_err(|e| MappingError(e.to_string()))?;
    let hits = response.hits.into_iter().map(|hit| RawHit {
        id: hit.id,
        full_url: hit.large_image_url,
        thumb_url: hit.preview_url,
        alt_text: hit.tags,
        width: hit.image_width,
        height: hit.image_height,
    });
    Ok(normalize_hits("pixabay", ALT_FALLBACK, hits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_embeds_key_and_query() {
        let req = build_request(&config(), "cat", &Credential::new("abc"));
        assert_eq!(req.param_value("q"), Some("cat"));
        assert_eq!(req.param_value("key"), Some("abc"));
        assert_eq!(req.param_value("per_page"), Some("27"));
        assert!(req.headers.is_empty());
    }

    #[test]
    fn maps_single_hit() {
        let payload = json!({
            "total": 1,
            "hits": [{
                "id": 195893,
                "largeImageURL": "http://x/cat.jpg",
                "previewURL": "http://x/cat_150.jpg",
                "imageWidth": 800,
                "imageHeight": 600,
                "tags": "cat"
            }]
        });
        let results = map_response(&payload).unwrap();
        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert_eq!(r.id, "195893");
        assert_eq!(r.full_url, "http://x/cat.jpg");
        assert_eq!(r.alt_text, "cat");
        assert_eq!((r.width, r.height), (800, 600));
    }

    #[test]
    fn empty_tags_fall_back() {
        let payload = json!({ "hits": [{ "largeImageURL": "http://x/a.jpg", "tags": "" }] });
        let results = map_response(&payload).unwrap();
        assert_eq!(results[0].alt_text, "Pixabay image");
        assert_eq!(results[0].id, "0");
    }
}
