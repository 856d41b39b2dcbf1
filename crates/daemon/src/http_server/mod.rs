use axum::Router;
use http::header::{ACCEPT, CONTENT_TYPE, ORIGIN};
use http::Method;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse};
use tower_http::LatencyUnit;

pub mod api;
mod config;
mod handlers;
mod health;

pub use config::Config;

use crate::ServiceState;

const STATUS_PREFIX: &str = "/_status";

/// Name routes at the root, health checks under `/_status`.
pub fn router(config: &Config, state: ServiceState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .on_response(
            DefaultOnResponse::new()
                .include_headers(false)
                .level(config.log_level)
                .latency_unit(LatencyUnit::Micros),
        )
        .on_failure(DefaultOnFailure::new().latency_unit(LatencyUnit::Micros));

    let cors = CorsLayer::new()
        .allow_methods(vec![Method::GET, Method::POST, Method::PUT])
        .allow_headers(vec![ACCEPT, CONTENT_TYPE, ORIGIN])
        .allow_origin(Any)
        .allow_credentials(false);

    Router::new()
        .nest(STATUS_PREFIX, health::router(state.clone()))
        .merge(api::names::router(state.clone()))
        .fallback(handlers::not_found_handler)
        .with_state(state)
        .layer(cors)
        .layer(trace_layer)
}

/// Serve the naming API on an already bound listener until `shutdown_rx` fires.
pub async fn serve(
    listener: TcpListener,
    config: Config,
    state: ServiceState,
    mut shutdown_rx: watch::Receiver<()>,
) -> Result<(), HttpServerError> {
    let router = router(&config, state);
    let addr = listener.local_addr()?;

    tracing::info!(addr = ?addr, "naming server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await?;

    Ok(())
}

/// Bind `config.listen_addr` and serve the naming API.
pub async fn run(
    config: Config,
    state: ServiceState,
    shutdown_rx: watch::Receiver<()>,
) -> Result<(), HttpServerError> {
    let listener = TcpListener::bind(config.listen_addr).await?;
    serve(listener, config, state, shutdown_rx).await
}

#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    #[error("an error occurred running the HTTP server: {0}")]
    ServingFailed(#[from] std::io::Error),
}

#[cfg(test)]
mod test {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use common::crypto::{sign, EcAccount, SecretKey};

    use super::*;
    use crate::naming::{update_message, NameStore};

    struct Harness {
        router: Router,
        _dir: tempfile::TempDir,
        _shutdown_tx: watch::Sender<()>,
    }

    async fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let names = NameStore::open(dir.path().join("names.json")).await.unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let config = Config::new("127.0.0.1:0".parse().unwrap(), tracing::Level::DEBUG);
        Harness {
            router: router(&config, ServiceState::new(names, shutdown_rx)),
            _dir: dir,
            _shutdown_tx: shutdown_tx,
        }
    }

    async fn send(
        router: &Router,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, String) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_create_update_resolve() {
        let harness = harness().await;
        let router = &harness.router;
        let owner = EcAccount::from(SecretKey::generate().unwrap());
        let create = serde_json::json!({
            "address": "0x01",
            "publicKeyX": owner.public().x_hex(),
            "publicKeyY": owner.public().y_hex(),
        });

        assert_eq!(
            send(router, Method::POST, "/apt-42", Some(create.clone())).await,
            (StatusCode::OK, "0x01".to_string())
        );
        let (status, _) = send(router, Method::POST, "/apt-42", Some(create)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let update = serde_json::json!({
            "address": "0x02",
            "signature": sign(&update_message("apt-42", "0x02"), &owner).to_json(),
        });
        assert_eq!(
            send(router, Method::PUT, "/apt-42", Some(update)).await,
            (StatusCode::OK, "0x02".to_string())
        );
        assert_eq!(
            send(router, Method::GET, "/apt-42", None).await,
            (StatusCode::OK, "0x02".to_string())
        );
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let harness = harness().await;
        let router = &harness.router;

        let (status, body) = send(router, Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Expected valid id");

        let (status, _) = send(
            router,
            Method::POST,
            "/apt-42",
            Some(serde_json::json!({"address": "0x01"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(router, Method::PUT, "/apt-42", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(router, Method::GET, "/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(router, Method::GET, "/a/b", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_status_routes() {
        let harness = harness().await;
        let (status, body) = send(&harness.router, Method::GET, "/_status/livez", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("ok"));

        let (status, _) = send(&harness.router, Method::GET, "/_status/readyz", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) =
            send(&harness.router, Method::GET, "/_status/version", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(env!("CARGO_PKG_VERSION")));
    }
}
