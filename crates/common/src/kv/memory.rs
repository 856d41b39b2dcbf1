use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{KvError, KvStore};

/// In-memory key-value store, used in tests and ephemeral runs
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        Ok(self.inner.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        self.inner.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_get_set_has() {
        let kv = MemoryKv::new();
        assert!(!kv.has("keystore").await.unwrap());
        kv.set("keystore", "{}").await.unwrap();
        assert_eq!(kv.get("keystore").await.unwrap().as_deref(), Some("{}"));
        assert!(kv.has("keystore").await.unwrap());

        // clones share state
        let other = kv.clone();
        other.set("keystore", "[]").await.unwrap();
        assert_eq!(kv.get("keystore").await.unwrap().as_deref(), Some("[]"));
    }
}
