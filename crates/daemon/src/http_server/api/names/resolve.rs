use std::time::Duration;

use axum::extract::{Path, State};
use reqwest::{Client, RequestBuilder};
use url::Url;

use super::NameApiError;
use crate::http_server::api::client::{name_url, ApiError, ApiRequest};
use crate::ServiceState;

pub async fn handler(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<String, NameApiError> {
    Ok(state.names().resolve(&id).await?)
}

/// Look up the current pointer of a name
#[derive(Debug, Clone)]
pub struct ResolveName {
    pub id: String,
    pub timeout: Duration,
}

impl ApiRequest for ResolveName {
    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        Ok(client
            .get(name_url(base_url, &self.id)?)
            .timeout(self.timeout))
    }
}
