use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;

use crate::naming::NameStoreError;
use crate::ServiceState;

pub mod create;
pub mod resolve;
pub mod update;

pub use create::{CreateName, CreateRequest};
pub use resolve::ResolveName;
pub use update::{UpdateName, UpdateRequest};

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/", any(missing_id_handler))
        .route(
            "/:id",
            get(resolve::handler)
                .post(create::handler)
                .put(update::handler),
        )
        .with_state(state)
}

/// Every name route needs a non-empty id.
async fn missing_id_handler() -> Response {
    NameApiError::Store(NameStoreError::Validation("Expected valid id".into())).into_response()
}

/// Failure of any name route, rendered as a text/plain body
#[derive(Debug, thiserror::Error)]
pub enum NameApiError {
    #[error("invalid request body: {0}")]
    Body(#[from] JsonRejection),
    #[error(transparent)]
    Store(#[from] NameStoreError),
}

impl IntoResponse for NameApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            NameApiError::Body(_) => StatusCode::BAD_REQUEST,
            NameApiError::Store(e) => match e {
                NameStoreError::Validation(_) => StatusCode::BAD_REQUEST,
                NameStoreError::Conflict(_) => StatusCode::CONFLICT,
                NameStoreError::NotFound(_) => StatusCode::NOT_FOUND,
                NameStoreError::Forbidden(_) => StatusCode::FORBIDDEN,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        };
        if status.is_server_error() {
            tracing::error!("name request failed: {}", self);
        } else {
            tracing::debug!("name request rejected ({}): {}", status, self);
        }
        (status, self.to_string()).into_response()
    }
}
