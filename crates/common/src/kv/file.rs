use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use super::{KvError, KvStore};

/// Key-value store backed by a single JSON object on disk
///
/// Every write rewrites the whole file through a temporary file in the same
/// directory followed by a rename, so a crash never leaves a torn file.
#[derive(Debug, Clone)]
pub struct FileKv {
    path: PathBuf,
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl FileKv {
    /// Open the store at `path`, starting empty when the file does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, KvError> {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!("opened kv store at {}", path.display());
        Ok(Self {
            path,
            entries: Arc::new(Mutex::new(entries)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Replace the file at `path` with `bytes` via a sibling temp file and a rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), KvError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

#[async_trait]
impl KvStore for FileKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        let mut entries = self.entries.lock().await;
        let previous = entries.insert(key.to_string(), value.to_string());
        let bytes = serde_json::to_vec_pretty(&*entries)?;
        if let Err(e) = write_atomic(&self.path, &bytes) {
            // keep memory in step with disk
            match previous {
                Some(previous) => entries.insert(key.to_string(), previous),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");

        let kv = FileKv::open(&path).await.unwrap();
        assert_eq!(kv.get("topic_subscriptions").await.unwrap(), None);
        kv.set("topic_subscriptions", r#"{"listings":{}}"#).await.unwrap();
        kv.set("ec_account.0xabc", "0xdef").await.unwrap();

        let reopened = FileKv::open(&path).await.unwrap();
        assert_eq!(
            reopened.get("ec_account.0xabc").await.unwrap().as_deref(),
            Some("0xdef")
        );
        assert!(reopened.has("topic_subscriptions").await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(FileKv::open(&path).await, Err(KvError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("local.json");
        let kv = FileKv::open(&path).await.unwrap();
        assert!(kv.set("k", "v").await.is_err());
        assert_eq!(kv.get("k").await.unwrap(), None);
    }
}
