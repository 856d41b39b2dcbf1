//! EC account management
//!
//! Accounts live in a password-encrypted keystore persisted in the local
//! [`KvStore`](crate::kv::KvStore). External accounts (a ledger address, for
//! example) are mapped to the EC account generated for them.

mod manager;
mod wallet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::crypto::{Address, EcAccount, KeyError, SecretError};
use crate::kv::KvError;

pub use manager::{KeyManager, KEYSTORE_KEY};
pub use wallet::{Keystore, KeystoreKey, SealedKeystore};

#[derive(Debug, thiserror::Error)]
pub enum KeyManagerError {
    #[error("wrong keystore password")]
    Authentication,
    #[error("keystore is corrupt: {0}")]
    CorruptKeystore(String),
    #[error("account mapping for {0} is corrupt: {1}")]
    CorruptMapping(Address, String),
    #[error("ec account {0} is mapped but missing from the keystore")]
    MissingAccount(Address),
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Secret(#[from] SecretError),
    #[error("keystore json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("key manager error: {0}")]
    Default(#[from] anyhow::Error),
}

/// Role of an external account, as known to the caller
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    /// Already registered with a counterparty, so a key should already exist
    Registered,
    Unregistered,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalAccount {
    pub address: Address,
    pub role: AccountRole,
}

/// Source of the keystore password
#[async_trait]
pub trait PasswordPrompt: Send + Sync + 'static {
    /// `purpose` is a short human-readable label such as "unlock keystore".
    async fn password(&self, purpose: &str) -> Result<String, KeyManagerError>;
}

/// A fixed password, typically read from a flag or the environment
#[derive(Clone)]
pub struct StaticPassword(String);

impl StaticPassword {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }
}

#[async_trait]
impl PasswordPrompt for StaticPassword {
    async fn password(&self, _purpose: &str) -> Result<String, KeyManagerError> {
        Ok(self.0.clone())
    }
}

/// Lookup of EC accounts by their own address
#[async_trait]
pub trait PrivateKeySource: Send + Sync + 'static {
    async fn ec_account(&self, address: &Address) -> Result<Option<EcAccount>, KeyManagerError>;
}
