use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use super::{ContentError, ContentHash, ContentStore};

/// In-process blob store keyed by the IPFS-style native id of the content
#[derive(Debug, Clone, Default)]
pub struct MemoryContentStore {
    blobs: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, data: Bytes) -> Result<String, ContentError> {
        let id = ContentHash::digest(&data).to_native_id();
        self.blobs.write().insert(id.clone(), data);
        Ok(id)
    }

    async fn get(&self, native_id: &str) -> Result<Bytes, ContentError> {
        self.blobs
            .read()
            .get(native_id)
            .cloned()
            .ok_or_else(|| ContentError::NotFound(native_id.to_string()))
    }
}
