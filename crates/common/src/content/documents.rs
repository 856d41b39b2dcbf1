use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use crate::crypto::{decrypt_any, encrypt_multi, encrypt_single, EnvelopeError, PublicKey, SecretKey};

use super::{ContentError, ContentHash, ContentStore};

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    #[error("document json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document is not utf-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("none of the supplied keys can decrypt document {0}")]
    Undecryptable(ContentHash),
}

/// Serialize `value` to JSON, encrypt it for `recipients` (none: stored in
/// the clear; one: single envelope; several: multi envelope), store it and
/// return its content hash.
pub async fn upload_document<T: Serialize + ?Sized>(
    store: &dyn ContentStore,
    value: &T,
    recipients: &[PublicKey],
) -> Result<ContentHash, DocumentError> {
    let json = serde_json::to_string(value)?;
    let payload = match recipients {
        [] => json,
        [recipient] => encrypt_single(&json, recipient)?.to_json()?,
        many => encrypt_multi(&json, many)?.to_json()?,
    };
    let native_id = store.put(Bytes::from(payload)).await?;
    Ok(ContentHash::from_native_id(&native_id)?)
}

/// Fetch the document at `hash`, decrypting with the candidate `keys` when
/// any are given, and deserialize it.
pub async fn download_document<T: DeserializeOwned>(
    store: &dyn ContentStore,
    hash: &ContentHash,
    keys: &[SecretKey],
) -> Result<T, DocumentError> {
    let bytes = store.get(&hash.to_native_id()).await?;
    let text = String::from_utf8(bytes.to_vec())?;
    let json = if keys.is_empty() {
        text
    } else {
        decrypt_any(&text, keys).ok_or(DocumentError::Undecryptable(*hash))?
    };
    Ok(serde_json::from_str(&json)?)
}
