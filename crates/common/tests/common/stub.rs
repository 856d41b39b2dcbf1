//! A recording HTTP server standing in for the pub/sub and IPFS APIs

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::Router;
use parking_lot::Mutex;
use url::Url;

/// One request as the stub received it
#[derive(Clone, Debug)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub authorization: Option<String>,
    pub body: Bytes,
}

impl Recorded {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

type Responder = Arc<dyn Fn(&Recorded) -> (StatusCode, String) + Send + Sync>;

#[derive(Clone)]
struct StubState {
    requests: Arc<Mutex<Vec<Recorded>>>,
    respond: Responder,
    /// Requests whose path ends with the given suffix wait this long
    stall: Option<(String, Duration)>,
}

pub struct StubServer {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl StubServer {
    /// Serve `respond` for every request on an ephemeral local port.
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(&Recorded) -> (StatusCode, String) + Send + Sync + 'static,
    {
        Self::start_stalling(respond, None).await
    }

    /// Like [`StubServer::start`] but requests for paths ending in
    /// `suffix` are answered only after `delay`.
    pub async fn start_stalling<F>(respond: F, stall: Option<(&str, Duration)>) -> Self
    where
        F: Fn(&Recorded) -> (StatusCode, String) + Send + Sync + 'static,
    {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = StubState {
            requests: requests.clone(),
            respond: Arc::new(respond),
            stall: stall.map(|(suffix, delay)| (suffix.to_string(), delay)),
        };
        let app = Router::new().fallback(record).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, requests }
    }

    /// Base url of the stub with a path prefix, e.g. `http://127.0.0.1:port/pubsub/`
    pub fn url(&self, prefix: &str) -> Url {
        Url::parse(&format!("http://{}/{}", self.addr, prefix)).unwrap()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().clone()
    }
}

async fn record(
    State(state): State<StubState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let query = uri
        .query()
        .map(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default();
    let recorded = Recorded {
        method,
        path: uri.path().to_string(),
        query,
        authorization: headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        body,
    };
    state.requests.lock().push(recorded.clone());

    if let Some((suffix, delay)) = &state.stall {
        if recorded.path.ends_with(suffix.as_str()) {
            tokio::time::sleep(*delay).await;
        }
    }
    (state.respond)(&recorded)
}
