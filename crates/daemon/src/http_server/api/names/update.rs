use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use super::NameApiError;
use crate::http_server::api::client::{name_url, ApiError, ApiRequest};
use crate::ServiceState;

/// Body of `PUT /{id}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateRequest {
    /// New pointer
    pub address: String,
    /// `{"r": hex, "s": hex}` as a JSON string, signed over `id-address`
    pub signature: String,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
    body: Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<String, NameApiError> {
    let Json(req) = body?;
    let pointer = state
        .names()
        .update(&id, &req.address, &req.signature)
        .await?;
    Ok(pointer)
}

/// Move a name to a new pointer
#[derive(Debug, Clone)]
pub struct UpdateName {
    pub id: String,
    pub request: UpdateRequest,
}

impl ApiRequest for UpdateName {
    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        Ok(client.put(name_url(base_url, &self.id)?).json(&self.request))
    }
}
