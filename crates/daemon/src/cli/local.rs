//! Client-side state shared by the key, document and pub/sub commands

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use common::crypto::{Address, EcAccount};
use common::keystore::{KeyManager, KeyManagerError, StaticPassword};
use common::kv::{FileKv, KvError};
use common::pubsub::{BusConfig, HttpPubSubBackend, PubSubBus, StaticTokenProvider};

use cairn_daemon::state::{AppState, StateError};

#[derive(Debug, thiserror::Error)]
pub enum LocalError {
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("local store error: {0}")]
    Kv(#[from] KvError),
    #[error("key error: {0}")]
    Keys(#[from] KeyManagerError),
    #[error("no account {0} in the keystore")]
    UnknownAccount(Address),
    #[error("a keystore password is required (--password or CAIRN_PASSWORD)")]
    MissingPassword,
}

/// The opened `~/.cairn` directory with its local store and key manager
pub struct Local {
    pub state: AppState,
    pub kv: Arc<FileKv>,
    pub keys: Arc<KeyManager>,
}

impl Local {
    /// Open local state. Without a password any attempt to unlock the
    /// keystore fails with an authentication error.
    pub async fn open(
        config_path: Option<PathBuf>,
        password: Option<&str>,
    ) -> Result<Self, LocalError> {
        let state = AppState::load(config_path)?;
        let kv = Arc::new(FileKv::open(&state.local_path).await?);
        let prompt = Arc::new(StaticPassword::new(password.unwrap_or_default()));
        let keys = Arc::new(KeyManager::new(kv.clone(), prompt));
        Ok(Self { state, kv, keys })
    }

    /// Like [`Local::open`] but the command cannot run without the keystore.
    pub async fn open_unlocking(
        config_path: Option<PathBuf>,
        password: Option<&str>,
    ) -> Result<Self, LocalError> {
        let password = password
            .filter(|p| !p.is_empty())
            .ok_or(LocalError::MissingPassword)?;
        Self::open(config_path, Some(password)).await
    }

    pub async fn account(&self, address: &Address) -> Result<EcAccount, LocalError> {
        self.keys
            .ec_account(address)
            .await?
            .ok_or(LocalError::UnknownAccount(*address))
    }

    /// A bus over the configured Cloud Pub/Sub project.
    pub fn bus(&self, token: &str) -> PubSubBus {
        let pubsub = &self.state.config.pubsub;
        let backend = HttpPubSubBackend::new(
            pubsub.endpoint.clone(),
            pubsub.project.clone(),
            Arc::new(StaticTokenProvider::new(token)),
        );
        let config = BusConfig {
            pull_interval: Duration::from_millis(pubsub.pull_interval_ms),
            propagation_delay: Duration::from_millis(pubsub.propagation_delay_ms),
            ..BusConfig::default()
        };
        PubSubBus::new(
            Arc::new(backend),
            self.keys.clone(),
            self.kv.clone(),
            config,
        )
    }
}
