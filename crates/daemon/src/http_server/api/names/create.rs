use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use super::NameApiError;
use crate::http_server::api::client::{name_url, ApiError, ApiRequest};
use crate::ServiceState;

/// Body of `POST /{id}`
///
/// Absent fields deserialize as empty strings and are rejected by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateRequest {
    /// First pointer for the name
    pub address: String,
    /// Owner key coordinates, unprefixed hex
    pub public_key_x: String,
    pub public_key_y: String,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
    body: Result<Json<CreateRequest>, JsonRejection>,
) -> Result<String, NameApiError> {
    let Json(req) = body?;
    let pointer = state
        .names()
        .create(&id, &req.address, &req.public_key_x, &req.public_key_y)
        .await?;
    Ok(pointer)
}

/// Register a new name
#[derive(Debug, Clone)]
pub struct CreateName {
    pub id: String,
    pub request: CreateRequest,
}

impl ApiRequest for CreateName {
    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        Ok(client.post(name_url(base_url, &self.id)?).json(&self.request))
    }
}
