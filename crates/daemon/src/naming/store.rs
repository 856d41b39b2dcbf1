use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

use common::crypto::{verify, PublicKey, Signature};
use common::kv::{write_atomic, KvError};

use super::{update_message, NameRecord};

#[derive(Debug, thiserror::Error)]
pub enum NameStoreError {
    #[error("{0}")]
    Validation(String),
    #[error("name already exists: {0}")]
    Conflict(String),
    #[error("name not found: {0}")]
    NotFound(String),
    #[error("signature does not match the owner of {0}")]
    Forbidden(String),
    #[error("names file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("names file io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to persist names: {0}")]
    Persist(#[from] KvError),
    #[error("default error: {0}")]
    Default(#[from] anyhow::Error),
}

type Records = BTreeMap<String, NameRecord>;

/// Name table served by the naming server
///
/// Reads share the lock. Every write holds it exclusively from the existence
/// check (and signature verification) until the file is flushed, and the
/// in-memory table is rolled back if the flush fails.
#[derive(Debug, Clone)]
pub struct NameStore {
    path: PathBuf,
    records: Arc<RwLock<Records>>,
}

fn require(field: &str, value: &str) -> Result<(), NameStoreError> {
    if value.is_empty() {
        return Err(NameStoreError::Validation(format!("missing {}", field)));
    }
    Ok(())
}

impl NameStore {
    /// Load the table at `path`; a missing file is an empty table.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, NameStoreError> {
        let path = path.into();
        let records: Records = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Records::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Records::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::info!("loaded {} names from {}", records.len(), path.display());
        Ok(Self {
            path,
            records: Arc::new(RwLock::new(records)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn get(&self, id: &str) -> Option<NameRecord> {
        self.records.read().await.get(id).cloned()
    }

    /// Current pointer for `id`.
    pub async fn resolve(&self, id: &str) -> Result<String, NameStoreError> {
        require("id", id)?;
        self.records
            .read()
            .await
            .get(id)
            .map(|record| record.address.clone())
            .ok_or_else(|| NameStoreError::NotFound(id.to_string()))
    }

    /// Register `id` with its first pointer and the owner's public key.
    pub async fn create(
        &self,
        id: &str,
        pointer: &str,
        public_key_x: &str,
        public_key_y: &str,
    ) -> Result<String, NameStoreError> {
        require("id", id)?;
        require("address", pointer)?;
        require("publicKeyX", public_key_x)?;
        require("publicKeyY", public_key_y)?;
        PublicKey::from_xy_hex(public_key_x, public_key_y)
            .map_err(|e| NameStoreError::Validation(format!("invalid public key: {}", e)))?;

        let mut records = self.records.write().await;
        if records.contains_key(id) {
            return Err(NameStoreError::Conflict(id.to_string()));
        }

        records.insert(
            id.to_string(),
            NameRecord {
                address: pointer.to_string(),
                public_key_x: public_key_x.to_string(),
                public_key_y: public_key_y.to_string(),
            },
        );
        if let Err(e) = self.flush(&records).await {
            records.remove(id);
            return Err(e);
        }

        tracing::info!("created name {} -> {}", id, pointer);
        Ok(pointer.to_string())
    }

    /// Move `id` to `pointer` if `signature` (the `{r,s}` JSON form) was made
    /// by the key registered with the name.
    pub async fn update(
        &self,
        id: &str,
        pointer: &str,
        signature: &str,
    ) -> Result<String, NameStoreError> {
        require("id", id)?;
        require("address", pointer)?;
        require("signature", signature)?;
        let signature = Signature::from_json(signature)
            .map_err(|e| NameStoreError::Validation(format!("invalid signature: {}", e)))?;

        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| NameStoreError::NotFound(id.to_string()))?;

        let owner = PublicKey::from_xy_hex(&record.public_key_x, &record.public_key_y)
            .map_err(|e| anyhow::anyhow!("stored key for {} is invalid: {}", id, e))?;
        if !verify(&update_message(id, pointer), &signature, &owner) {
            tracing::warn!("rejected update of {}: bad signature", id);
            return Err(NameStoreError::Forbidden(id.to_string()));
        }

        let previous = std::mem::replace(&mut record.address, pointer.to_string());
        if let Err(e) = self.flush(&records).await {
            if let Some(record) = records.get_mut(id) {
                record.address = previous;
            }
            return Err(e);
        }

        tracing::info!("updated name {} -> {}", id, pointer);
        Ok(pointer.to_string())
    }

    async fn flush(&self, records: &Records) -> Result<(), NameStoreError> {
        let bytes = serde_json::to_vec_pretty(records)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| anyhow::anyhow!("flush task failed: {}", e))??;
        Ok(())
    }
}
