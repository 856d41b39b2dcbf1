//! Local key-value persistence
//!
//! A small string-to-string store holding the encrypted keystore, the
//! mapping from external addresses to EC account addresses and the durable
//! topic subscriptions. Arbitrary values can be kept sealed under a
//! [`Secret`](crate::crypto::Secret) with [`set_encrypted`].

mod encrypted;
mod file;
mod memory;

use async_trait::async_trait;

use crate::crypto::SecretError;

pub use encrypted::{get_encrypted, set_encrypted};
pub use file::{write_atomic, FileKv};
pub use memory::MemoryKv;

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("kv io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("kv file is not a json object of strings: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("kv persist error: {0}")]
    Persist(#[from] tempfile::PersistError),
    #[error("encrypted value is not base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error(transparent)]
    Secret(#[from] SecretError),
}

#[async_trait]
pub trait KvStore: Send + Sync + std::fmt::Debug + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Store `value` under `key`. Returns once the value is durable.
    async fn set(&self, key: &str, value: &str) -> Result<(), KvError>;

    async fn has(&self, key: &str) -> Result<bool, KvError> {
        Ok(self.get(key).await?.is_some())
    }
}
