use reqwest::{Client, RequestBuilder};
use url::Url;

mod client;
mod error;

pub use client::{ApiClient, DEFAULT_RESOLVE_TIMEOUT};
pub use error::ApiError;

pub trait ApiRequest {
    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError>;
}

/// `base_url` with `id` appended as one percent-encoded path segment.
pub fn name_url(base_url: &Url, id: &str) -> Result<Url, ApiError> {
    let mut url = base_url.clone();
    url.path_segments_mut()
        .map_err(|_| ApiError::InvalidRemote(base_url.to_string()))?
        .pop_if_empty()
        .push(id);
    Ok(url)
}
