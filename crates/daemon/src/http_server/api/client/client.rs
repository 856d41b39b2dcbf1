use std::time::Duration;

use reqwest::Client;
use url::Url;

use common::crypto::{sign, EcAccount};

use super::error::ApiError;
use super::ApiRequest;
use crate::http_server::api::names::{
    CreateName, CreateRequest, ResolveName, UpdateName, UpdateRequest,
};
use crate::naming::update_message;

pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Client for a naming server
#[derive(Debug, Clone)]
pub struct ApiClient {
    pub remote: Url,
    client: Client,
    resolve_timeout: Duration,
}

impl ApiClient {
    pub fn new(remote: &Url) -> Result<Self, ApiError> {
        let client = Client::builder().build()?;

        Ok(Self {
            remote: remote.clone(),
            client,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
        })
    }

    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    /// Send `request` and return the text/plain body of a successful response.
    pub async fn call<T: ApiRequest>(&self, request: T) -> Result<String, ApiError> {
        let request_builder = request.build_request(&self.remote, &self.client)?;
        let response = request_builder
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        let status = response.status();
        let body = response.text().await.map_err(ApiError::from_transport)?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(ApiError::from_status(status, body))
        }
    }

    /// Register `id` pointing at `pointer`, owned by `account`.
    pub async fn publish(
        &self,
        id: &str,
        pointer: &str,
        account: &EcAccount,
    ) -> Result<String, ApiError> {
        let request = CreateName {
            id: id.to_string(),
            request: CreateRequest {
                address: pointer.to_string(),
                public_key_x: account.public().x_hex(),
                public_key_y: account.public().y_hex(),
            },
        };
        let pointer = self.call(request).await?;
        tracing::info!("published name {} -> {}", id, pointer);
        Ok(pointer)
    }

    /// Move `id` to `pointer`, signing the change with `account`.
    pub async fn update(
        &self,
        id: &str,
        pointer: &str,
        account: &EcAccount,
    ) -> Result<String, ApiError> {
        let signature = sign(&update_message(id, pointer), account);
        let request = UpdateName {
            id: id.to_string(),
            request: UpdateRequest {
                address: pointer.to_string(),
                signature: signature.to_json(),
            },
        };
        let pointer = self.call(request).await?;
        tracing::info!("updated name {} -> {}", id, pointer);
        Ok(pointer)
    }

    /// Current pointer of `id`; gives up with [`ApiError::Timeout`] after the
    /// resolve timeout.
    pub async fn resolve(&self, id: &str) -> Result<String, ApiError> {
        self.call(ResolveName {
            id: id.to_string(),
            timeout: self.resolve_timeout,
        })
        .await
    }

    /// Get the base URL for API requests
    pub fn base_url(&self) -> &Url {
        &self.remote
    }

    /// Get the underlying HTTP client for custom requests
    pub fn http_client(&self) -> &Client {
        &self.client
    }
}
