use std::time::Duration;
use std::{fs, path::PathBuf};

use common::content::{IpfsHttpStore, DEFAULT_IPNS_RESOLVE_TIMEOUT};
use serde::{Deserialize, Serialize};
use url::Url;

pub const APP_NAME: &str = "cairn";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const NAMES_FILE_NAME: &str = "names.json";
pub const LOCAL_FILE_NAME: &str = "local.json";
pub const LOGS_DIR_NAME: &str = "logs";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Port the naming server listens on
    #[serde(default = "default_naming_port")]
    pub naming_port: u16,
    /// Naming server the client talks to
    #[serde(default = "default_naming_url")]
    pub naming_url: Url,
    /// Upper bound on a single resolve call
    #[serde(default = "default_resolve_timeout_ms")]
    pub resolve_timeout_ms: u64,
    /// Default log level, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub pubsub: PubSubConfig,
    #[serde(default)]
    pub ipfs: IpfsConfig,
}

fn default_naming_port() -> u16 {
    8090
}

fn default_naming_url() -> Url {
    Url::parse("http://localhost:8090").expect("hardcoded URL must parse")
}

fn default_resolve_timeout_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            naming_port: default_naming_port(),
            naming_url: default_naming_url(),
            resolve_timeout_ms: default_resolve_timeout_ms(),
            log_level: default_log_level(),
            pubsub: PubSubConfig::default(),
            ipfs: IpfsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parsed log level, falling back to INFO for anything unrecognised.
    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubSubConfig {
    #[serde(default = "default_pubsub_endpoint")]
    pub endpoint: Url,
    /// Cloud project owning the topics and subscriptions
    #[serde(default)]
    pub project: String,
    #[serde(default = "default_pull_interval_ms")]
    pub pull_interval_ms: u64,
    /// Pause after creating a subscription so the backend can propagate it
    #[serde(default = "default_propagation_delay_ms")]
    pub propagation_delay_ms: u64,
}

fn default_pubsub_endpoint() -> Url {
    Url::parse("https://pubsub.googleapis.com").expect("hardcoded URL must parse")
}

fn default_pull_interval_ms() -> u64 {
    2000
}

fn default_propagation_delay_ms() -> u64 {
    500
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            endpoint: default_pubsub_endpoint(),
            project: String::new(),
            pull_interval_ms: default_pull_interval_ms(),
            propagation_delay_ms: default_propagation_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpfsConfig {
    #[serde(default = "default_ipfs_api_url")]
    pub api_url: Url,
    /// How long an IPNS name may take to resolve
    #[serde(default = "default_ipns_resolve_timeout_ms")]
    pub ipns_resolve_timeout_ms: u64,
}

impl IpfsConfig {
    pub fn store(&self) -> IpfsHttpStore {
        IpfsHttpStore::new(self.api_url.clone())
            .with_resolve_timeout(Duration::from_millis(self.ipns_resolve_timeout_ms))
    }
}

fn default_ipfs_api_url() -> Url {
    Url::parse("http://localhost:5001").expect("hardcoded URL must parse")
}

fn default_ipns_resolve_timeout_ms() -> u64 {
    DEFAULT_IPNS_RESOLVE_TIMEOUT.as_millis() as u64
}

impl Default for IpfsConfig {
    fn default() -> Self {
        Self {
            api_url: default_ipfs_api_url(),
            ipns_resolve_timeout_ms: default_ipns_resolve_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the cairn directory (~/.cairn)
    pub cairn_dir: PathBuf,
    /// Records served by the naming server
    pub names_path: PathBuf,
    /// Client side key-value store (keystore, account mappings, subscriptions)
    pub local_path: PathBuf,
    pub logs_path: PathBuf,
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// `custom_path` if given, else `~/.cairn`.
    pub fn cairn_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        match custom_path {
            Some(path) => Ok(path),
            None => dirs::home_dir()
                .map(|home| home.join(format!(".{}", APP_NAME)))
                .ok_or(StateError::NoHomeDirectory),
        }
    }

    fn at(cairn_dir: PathBuf, config: AppConfig) -> Self {
        Self {
            names_path: cairn_dir.join(NAMES_FILE_NAME),
            local_path: cairn_dir.join(LOCAL_FILE_NAME),
            logs_path: cairn_dir.join(LOGS_DIR_NAME),
            config_path: cairn_dir.join(CONFIG_FILE_NAME),
            cairn_dir,
            config,
        }
    }

    /// Create the state directory with a config file, empty stores and a
    /// logs directory. Refuses to touch an existing directory.
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let cairn_dir = Self::cairn_dir(custom_path)?;
        if cairn_dir.exists() {
            return Err(StateError::AlreadyInitialized(cairn_dir));
        }

        let state = Self::at(cairn_dir, config.unwrap_or_default());
        fs::create_dir_all(&state.logs_path)?;
        fs::write(&state.config_path, toml::to_string_pretty(&state.config)?)?;
        // an empty object is a store with no entries
        fs::write(&state.names_path, "{}")?;
        fs::write(&state.local_path, "{}")?;

        Ok(state)
    }

    /// Open a directory previously created by [`AppState::init`].
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let cairn_dir = Self::cairn_dir(custom_path)?;
        if !cairn_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        for name in [CONFIG_FILE_NAME, NAMES_FILE_NAME, LOCAL_FILE_NAME] {
            if !cairn_dir.join(name).exists() {
                return Err(StateError::MissingFile(name));
            }
        }

        let config = toml::from_str(&fs::read_to_string(cairn_dir.join(CONFIG_FILE_NAME))?)?;
        Ok(Self::at(cairn_dir, config))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("no cairn state found; run 'cairn init' first")]
    NotInitialized,
    #[error("{} already exists", .0.display())]
    AlreadyInitialized(PathBuf),
    #[error("cannot locate the home directory")]
    NoHomeDirectory,
    #[error("state directory is missing {0}")]
    MissingFile(&'static str),
    #[error("state io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot write config: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("cannot read config: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_init_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("state");

        let created = AppState::init(Some(root.clone()), None).unwrap();
        assert!(created.logs_path.is_dir());

        let loaded = AppState::load(Some(root.clone())).unwrap();
        assert_eq!(loaded.config, AppConfig::default());
        assert_eq!(loaded.names_path, root.join(NAMES_FILE_NAME));

        assert!(matches!(
            AppState::init(Some(root), None),
            Err(StateError::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn test_load_uninitialized() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AppState::load(Some(dir.path().join("missing"))),
            Err(StateError::NotInitialized)
        ));
    }

    #[test]
    fn test_partial_config_gets_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            naming_port = 9000

            [pubsub]
            project = "rentals"
            "#,
        )
        .unwrap();
        assert_eq!(config.naming_port, 9000);
        assert_eq!(config.resolve_timeout_ms, 1000);
        assert_eq!(config.pubsub.project, "rentals");
        assert_eq!(config.pubsub.pull_interval_ms, 2000);
        assert_eq!(config.ipfs.api_url.as_str(), "http://localhost:5001/");
        assert_eq!(config.ipfs.ipns_resolve_timeout_ms, 1000);
        assert_eq!(config.tracing_level(), tracing::Level::INFO);
    }
}
