use base64::Engine;

use super::{KvError, KvStore};
use crate::crypto::Secret;

const ENGINE: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Store `value` under `key`, sealed with `secret` and base64 encoded.
pub async fn set_encrypted<K: KvStore + ?Sized>(
    kv: &K,
    key: &str,
    value: &[u8],
    secret: &Secret,
) -> Result<(), KvError> {
    let sealed = secret.encrypt(value)?;
    kv.set(key, &ENGINE.encode(sealed)).await
}

/// Read back a value written by [`set_encrypted`]. `None` if `key` is unset.
pub async fn get_encrypted<K: KvStore + ?Sized>(
    kv: &K,
    key: &str,
    secret: &Secret,
) -> Result<Option<Vec<u8>>, KvError> {
    let Some(stored) = kv.get(key).await? else {
        return Ok(None);
    };
    let sealed = ENGINE.decode(stored.trim())?;
    Ok(Some(secret.decrypt(&sealed)?))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::SecretError;
    use crate::kv::MemoryKv;

    #[tokio::test]
    async fn test_encrypted_value_is_opaque() {
        let kv = MemoryKv::new();
        let secret = Secret::generate().unwrap();
        set_encrypted(&kv, "draft-lease", b"tenant: 0xabc", &secret)
            .await
            .unwrap();

        let raw = kv.get("draft-lease").await.unwrap().unwrap();
        assert!(!raw.contains("tenant"));
        assert_eq!(
            get_encrypted(&kv, "draft-lease", &secret).await.unwrap().as_deref(),
            Some(&b"tenant: 0xabc"[..])
        );
        assert!(get_encrypted(&kv, "other", &secret).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_wrong_secret_fails() {
        let kv = MemoryKv::new();
        let secret = Secret::generate().unwrap();
        set_encrypted(&kv, "draft-lease", b"deposit 2", &secret)
            .await
            .unwrap();

        let other = Secret::generate().unwrap();
        assert!(matches!(
            get_encrypted(&kv, "draft-lease", &other).await,
            Err(KvError::Secret(SecretError::Cipher))
        ));

        kv.set("draft-lease", "not base64!").await.unwrap();
        assert!(matches!(
            get_encrypted(&kv, "draft-lease", &secret).await,
            Err(KvError::Encoding(_))
        ));
    }
}
