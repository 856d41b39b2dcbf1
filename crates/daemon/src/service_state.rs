use tokio::sync::watch;

use crate::naming::{NameStore, NameStoreError};
use crate::ServiceConfig;

/// Shared state handed to every request handler
#[derive(Debug, Clone)]
pub struct State {
    names: NameStore,
    shutdown_rx: watch::Receiver<()>,
}

impl State {
    pub fn new(names: NameStore, shutdown_rx: watch::Receiver<()>) -> Self {
        Self { names, shutdown_rx }
    }

    pub async fn from_config(
        config: &ServiceConfig,
        shutdown_rx: watch::Receiver<()>,
    ) -> Result<Self, StateSetupError> {
        let names = NameStore::open(config.names_path.clone()).await?;
        Ok(Self::new(names, shutdown_rx))
    }

    pub fn names(&self) -> &NameStore {
        &self.names
    }

    /// True once a shutdown has been signalled (or the signal sender is gone).
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_rx.has_changed().unwrap_or(true)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("failed to load names: {0}")]
    Names(#[from] NameStoreError),
}
