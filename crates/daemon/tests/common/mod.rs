//! Shared helpers for naming server integration tests
#![allow(dead_code)]

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use url::Url;

use cairn_daemon::http_server::{self, api::client::ApiClient, Config, HttpServerError};
use cairn_daemon::naming::NameStore;
use cairn_daemon::ServiceState;
use ::common::crypto::{EcAccount, SecretKey};

/// A naming server on an ephemeral localhost port, backed by a temp dir
pub struct TestServer {
    pub url: Url,
    pub names: NameStore,
    pub dir: tempfile::TempDir,
    shutdown_tx: watch::Sender<()>,
    handle: JoinHandle<Result<(), HttpServerError>>,
}

impl TestServer {
    pub async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self::start_in(dir).await
    }

    /// Start on `dir`, reusing any names.json already in it.
    pub async fn start_in(dir: tempfile::TempDir) -> Self {
        let names = NameStore::open(dir.path().join("names.json")).await.unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let state = ServiceState::new(names.clone(), shutdown_rx.clone());
        let config = Config::new(addr, tracing::Level::DEBUG);
        let handle = tokio::spawn(http_server::serve(listener, config, state, shutdown_rx));

        Self {
            url: Url::parse(&format!("http://{}", addr)).unwrap(),
            names,
            dir,
            shutdown_tx,
            handle,
        }
    }

    pub fn client(&self) -> ApiClient {
        ApiClient::new(&self.url).unwrap()
    }

    /// Shut the server down and hand back its directory.
    pub async fn stop(self) -> tempfile::TempDir {
        self.shutdown_tx.send(()).unwrap();
        self.handle.await.unwrap().unwrap();
        self.dir
    }
}

pub fn account() -> EcAccount {
    EcAccount::from(SecretKey::generate().unwrap())
}
