use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use cairn_daemon::http_server::api::client::{ApiClient, ApiError, DEFAULT_RESOLVE_TIMEOUT};
use cairn_daemon::state::AppState;

const FALLBACK_REMOTE: &str = "http://localhost:8090";

/// Shared inputs for every command.
#[derive(Clone)]
pub struct OpContext {
    /// Naming client, pointed at the resolved remote
    pub client: ApiClient,
    /// State directory override; `None` means ~/.cairn
    pub config_path: Option<PathBuf>,
}

impl OpContext {
    pub fn new(remote: Url, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let resolve_timeout = match AppState::load(config_path.clone()) {
            Ok(state) => Duration::from_millis(state.config.resolve_timeout_ms),
            Err(_) => DEFAULT_RESOLVE_TIMEOUT,
        };
        let client = ApiClient::new(&remote)?.with_resolve_timeout(resolve_timeout);
        Ok(Self {
            client,
            config_path,
        })
    }
}

/// Naming server for this invocation: the `--remote` flag, else the
/// configured `naming_url`, else localhost:8090.
pub fn resolve_remote(explicit: Option<Url>, config_path: Option<PathBuf>) -> Url {
    explicit
        .or_else(|| {
            AppState::load(config_path)
                .ok()
                .map(|state| state.config.naming_url)
        })
        .unwrap_or_else(|| Url::parse(FALLBACK_REMOTE).expect("hardcoded URL must parse"))
}

#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: Error + Send + Sync + 'static;
    type Output;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

/// Build a clap `Command` enum from `(Variant, OpType)` pairs, with matching
/// `OpOutput` and `OpError` enums and an `Op` impl that dispatches to the
/// selected variant.
#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $op:ty)),* $(,)?) => {
        #[derive(Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($op),)*
        }

        impl Command {
            /// Variant name, used to prefix errors.
            #[allow(dead_code)]
            pub fn label(&self) -> &'static str {
                match self {
                    $(Command::$variant(_) => stringify!($variant),)*
                }
            }
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$op as $crate::cli::op::Op>::Output),)*
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(OpOutput::$variant(inner) => std::fmt::Display::fmt(inner, f),)*
                }
            }
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(#[error(transparent)] $variant(<$op as $crate::cli::op::Op>::Error),)*
        }

        #[async_trait::async_trait]
        impl $crate::cli::op::Op for Command {
            type Output = OpOutput;
            type Error = OpError;

            async fn execute(
                &self,
                ctx: &$crate::cli::op::OpContext,
            ) -> Result<Self::Output, Self::Error> {
                let output = match self {
                    $(Command::$variant(op) => {
                        OpOutput::$variant(op.execute(ctx).await.map_err(OpError::$variant)?)
                    })*
                };
                Ok(output)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_remote_wins() {
        let explicit = Url::parse("http://example.com:9999").unwrap();
        assert_eq!(resolve_remote(Some(explicit.clone()), None), explicit);
    }

    #[test]
    fn test_missing_state_uses_fallback() {
        let remote = resolve_remote(None, Some(PathBuf::from("/nonexistent")));
        assert_eq!(remote.as_str(), "http://localhost:8090/");
    }

    #[test]
    fn test_configured_remote() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("state");
        let mut config = cairn_daemon::AppConfig::default();
        config.naming_url = Url::parse("http://names.internal:7000").unwrap();
        AppState::init(Some(root.clone()), Some(config)).unwrap();

        assert_eq!(resolve_remote(None, Some(root)).port(), Some(7000));
    }
}
