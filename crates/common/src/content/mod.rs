//! Content-addressed blob storage
//!
//! Documents are stored by hash in an external blob store. The naming
//! service points at a [`ContentHash`]; the store itself speaks its own
//! "native id", which for IPFS is the base58 multihash of the same digest.

mod documents;
mod ipfs;
mod memory;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use bytes::Bytes;
use multihash::Multihash;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

pub use documents::{download_document, upload_document, DocumentError};
pub use ipfs::{IpfsHttpStore, IpnsKey, DEFAULT_IPNS_RESOLVE_TIMEOUT};
pub use memory::MemoryContentStore;

/// Multicodec code of sha2-256
pub const SHA2_256_CODE: u64 = 0x12;
/// Size of a sha2-256 digest in bytes
pub const HASH_SIZE: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("invalid content hash: {0}")]
    InvalidHash(String),
    #[error("invalid native id {0}: {1}")]
    InvalidNativeId(String, String),
    #[error("content not found: {0}")]
    NotFound(String),
    #[error("timed out resolving {0}")]
    Timeout(String),
    #[error("content store http error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("content store url error: {0}")]
    Url(#[from] url::ParseError),
    #[error("content store error: {0}")]
    Default(#[from] anyhow::Error),
}

/// Contract of the external blob store
#[async_trait]
pub trait ContentStore: Send + Sync + 'static {
    /// Store `data` and return its native id
    async fn put(&self, data: Bytes) -> Result<String, ContentError>;

    async fn get(&self, native_id: &str) -> Result<Bytes, ContentError>;
}

/// The sha2-256 digest carried by a store id, rendered as `0x` + 64 hex chars
///
/// For [`MemoryContentStore`] this is the digest of the bytes themselves;
/// an IPFS node hashes its own block encoding of them instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; HASH_SIZE]);

impl From<[u8; HASH_SIZE]> for ContentHash {
    fn from(digest: [u8; HASH_SIZE]) -> Self {
        ContentHash(digest)
    }
}

impl ContentHash {
    /// Hash `data` the way the blob store does
    pub fn digest(data: &[u8]) -> Self {
        ContentHash(Sha256::digest(data).into())
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Base58btc multihash (`0x12 0x20 || digest`), the form IPFS uses as an id
    pub fn to_native_id(&self) -> String {
        let mut bytes = Vec::with_capacity(2 + HASH_SIZE);
        bytes.push(SHA2_256_CODE as u8);
        bytes.push(HASH_SIZE as u8);
        bytes.extend_from_slice(&self.0);
        bs58::encode(bytes).into_string()
    }

    /// Inverse of [`ContentHash::to_native_id`]; only sha2-256 multihashes are accepted
    pub fn from_native_id(native_id: &str) -> Result<Self, ContentError> {
        let invalid = |reason: String| ContentError::InvalidNativeId(native_id.to_string(), reason);
        let bytes = bs58::decode(native_id)
            .into_vec()
            .map_err(|e| invalid(e.to_string()))?;
        let multihash = Multihash::<64>::from_bytes(&bytes).map_err(|e| invalid(e.to_string()))?;
        if multihash.code() != SHA2_256_CODE || multihash.size() as usize != HASH_SIZE {
            return Err(invalid(format!(
                "expected sha2-256 multihash, got code {:#x} of {} bytes",
                multihash.code(),
                multihash.size()
            )));
        }
        let mut digest = [0u8; HASH_SIZE];
        digest.copy_from_slice(multihash.digest());
        Ok(ContentHash(digest))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for ContentHash {
    type Err = ContentError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix("0x").unwrap_or(s);
        let mut digest = [0u8; HASH_SIZE];
        hex::decode_to_slice(hex, &mut digest).map_err(|e| ContentError::InvalidHash(e.to_string()))?;
        Ok(ContentHash(digest))
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_native_id_round_trip() {
        let hash = ContentHash::digest(b"hello world");
        let native = hash.to_native_id();
        assert!(native.starts_with("Qm"));
        assert_eq!(native.len(), 46);
        assert_eq!(ContentHash::from_native_id(&native).unwrap(), hash);
    }

    #[test]
    fn test_known_ipfs_id() {
        // sha2-256 of the empty string
        let hash: ContentHash = "0xe3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
            .parse()
            .unwrap();
        assert_eq!(
            hash.to_native_id(),
            "QmdfTbBqBPQ7VNxZEYEj14VmRuZBkqFbiwReogJgS1zR1n"
        );
    }

    #[test]
    fn test_rejects_other_multihash() {
        // identity multihash of 3 bytes
        let native = bs58::encode([0x00, 0x03, 1, 2, 3]).into_string();
        assert!(ContentHash::from_native_id(&native).is_err());
        assert!(ContentHash::from_native_id("0OIl").is_err());
    }

    #[test]
    fn test_display_is_prefixed_hex() {
        let hash = ContentHash::from([0xab; HASH_SIZE]);
        let text = hash.to_string();
        assert_eq!(text, format!("0x{}", "ab".repeat(32)));
        assert_eq!(text.parse::<ContentHash>().unwrap(), hash);
        assert!("0x1234".parse::<ContentHash>().is_err());
    }
}
