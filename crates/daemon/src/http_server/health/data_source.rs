use std::fmt::Debug;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use http::request::Parts;

use crate::ServiceState;

/// Something the readiness check can ask whether the service may take traffic.
#[async_trait]
pub trait DataSource {
    async fn is_ready(&self) -> Result<(), DataSourceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DataSourceError {
    #[error("names store is unavailable")]
    DependencyFailure,
    #[error("service is shutting down")]
    ShuttingDown,
}

pub type DynDataSource = Arc<dyn DataSource + Send + Sync>;

/// Extractor wrapping the readiness source for the current request.
pub struct StateDataSource(DynDataSource);

impl StateDataSource {
    #[cfg(test)]
    pub fn new(source: DynDataSource) -> Self {
        Self(source)
    }

    pub async fn check(&self) -> Result<(), DataSourceError> {
        self.0.is_ready().await
    }
}

impl Debug for StateDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StateDataSource")
    }
}

/// Ready while the names file can still be rewritten and no shutdown
/// has been signalled.
struct NamesSource {
    state: ServiceState,
}

#[async_trait]
impl DataSource for NamesSource {
    async fn is_ready(&self) -> Result<(), DataSourceError> {
        if self.state.is_shutting_down() {
            return Err(DataSourceError::ShuttingDown);
        }

        let path = self.state.names().path();
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => std::path::Path::new("."),
        };
        match tokio::fs::metadata(dir).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            _ => {
                tracing::warn!("names directory {} is unavailable", dir.display());
                Err(DataSourceError::DependencyFailure)
            }
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for StateDataSource
where
    ServiceState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ();

    async fn from_request_parts(_parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(StateDataSource(Arc::new(NamesSource {
            state: ServiceState::from_ref(state),
        })))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::naming::NameStore;

    #[derive(Clone)]
    pub(crate) enum MockReadiness {
        DependencyFailure,
        Ready,
        ShuttingDown,
    }

    #[async_trait]
    impl DataSource for MockReadiness {
        async fn is_ready(&self) -> Result<(), DataSourceError> {
            use MockReadiness::*;

            match self {
                DependencyFailure => Err(DataSourceError::DependencyFailure),
                Ready => Ok(()),
                ShuttingDown => Err(DataSourceError::ShuttingDown),
            }
        }
    }

    #[tokio::test]
    async fn test_names_source() {
        let dir = tempfile::tempdir().unwrap();
        let names = NameStore::open(dir.path().join("names.json")).await.unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(());
        let source = NamesSource {
            state: ServiceState::new(names, shutdown_rx),
        };
        assert!(source.is_ready().await.is_ok());

        shutdown_tx.send(()).unwrap();
        assert!(matches!(
            source.is_ready().await,
            Err(DataSourceError::ShuttingDown)
        ));
    }

    #[tokio::test]
    async fn test_names_source_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let names = NameStore::open(dir.path().join("gone").join("names.json"))
            .await
            .unwrap();
        let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(());
        let source = NamesSource {
            state: ServiceState::new(names, shutdown_rx),
        };
        assert!(matches!(
            source.is_ready().await,
            Err(DataSourceError::DependencyFailure)
        ));
    }
}
