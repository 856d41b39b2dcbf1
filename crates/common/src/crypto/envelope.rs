//! Hybrid encryption for one or many recipients
//!
//! Serialized envelopes are tagged JSON:
//!
//! ```text
//! {"kind":"single","iv":..,"ephemeral_public_key":..,"ciphertext":..,"mac":..}
//! {"kind":"multi","ciphertext":..,"keys":[{"iv":..,...}, ...]}
//! ```
//!
//! The older untagged array forms, `[iv, ephem, ct, mac]` for a single
//! recipient and `[ct, [[iv, ephem, ct, mac], ...]]` for many, are still
//! accepted by [`Envelope::parse`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ecies::{SealedBox, SealedBoxError};
use super::hex_serde;
use super::keys::{PublicKey, SecretKey};
use super::secret::{Secret, SecretError};

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("envelope needs at least one recipient")]
    NoRecipients,
    #[error("unrecognized envelope: {0}")]
    Format(String),
    #[error(transparent)]
    SealedBox(#[from] SealedBoxError),
    #[error(transparent)]
    Secret(#[from] SecretError),
    #[error("decrypted payload is not utf-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("envelope json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Envelope {
    Single(SealedBox),
    Multi {
        #[serde(with = "hex_serde")]
        ciphertext: Vec<u8>,
        keys: Vec<SealedBox>,
    },
}

impl Envelope {
    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse either the tagged form or one of the legacy array forms.
    pub fn parse(serialized: &str) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_str(serialized)?;
        if value.is_object() {
            return Ok(serde_json::from_value(value)?);
        }

        let items = value
            .as_array()
            .ok_or_else(|| EnvelopeError::Format("expected object or array".into()))?;
        match items.len() {
            4 => Ok(Envelope::Single(legacy_box(&value)?)),
            2 => {
                let ciphertext = items[0]
                    .as_str()
                    .ok_or_else(|| EnvelopeError::Format("multi ciphertext must be hex".into()))?;
                let ciphertext = hex::decode(ciphertext.strip_prefix("0x").unwrap_or(ciphertext))
                    .map_err(|e| EnvelopeError::Format(e.to_string()))?;
                let keys = items[1]
                    .as_array()
                    .ok_or_else(|| EnvelopeError::Format("multi keys must be an array".into()))?
                    .iter()
                    .map(legacy_box)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Envelope::Multi { ciphertext, keys })
            }
            n => Err(EnvelopeError::Format(format!(
                "legacy envelope array of length {}",
                n
            ))),
        }
    }
}

fn legacy_box(value: &Value) -> Result<SealedBox, EnvelopeError> {
    let parts = value
        .as_array()
        .filter(|parts| parts.len() == 4)
        .ok_or_else(|| EnvelopeError::Format("sealed box must be a 4-array".into()))?;
    let mut fields = [""; 4];
    for (field, part) in fields.iter_mut().zip(parts) {
        *field = part
            .as_str()
            .ok_or_else(|| EnvelopeError::Format("sealed box fields must be hex strings".into()))?;
    }
    Ok(SealedBox::from_hex_parts(
        fields[0], fields[1], fields[2], fields[3],
    )?)
}

/// Encrypt for exactly one recipient.
pub fn encrypt_single(plaintext: &str, recipient: &PublicKey) -> Result<Envelope, EnvelopeError> {
    Ok(Envelope::Single(SealedBox::seal(
        plaintext.as_bytes(),
        recipient,
    )?))
}

/// Encrypt once under a random secret and seal that secret for every recipient.
///
/// `keys[i]` belongs to `recipients[i]`.
pub fn encrypt_multi(plaintext: &str, recipients: &[PublicKey]) -> Result<Envelope, EnvelopeError> {
    if recipients.is_empty() {
        return Err(EnvelopeError::NoRecipients);
    }
    let secret = Secret::generate()?;
    let ciphertext = secret.encrypt(plaintext.as_bytes())?;
    let secret_hex = secret.to_hex();
    let keys = recipients
        .iter()
        .map(|recipient| SealedBox::seal(secret_hex.as_bytes(), recipient))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Envelope::Multi { ciphertext, keys })
}

pub fn decrypt_single(sealed: &SealedBox, key: &SecretKey) -> Result<String, EnvelopeError> {
    let plaintext = sealed.open(key)?;
    Ok(String::from_utf8(plaintext)?)
}

fn open_slot(ciphertext: &[u8], slot: &SealedBox, key: &SecretKey) -> Result<String, EnvelopeError> {
    let secret_hex = decrypt_single(slot, key)?;
    let secret = Secret::from_hex(&secret_hex)?;
    Ok(String::from_utf8(secret.decrypt(ciphertext)?)?)
}

/// Try every key slot with `key`; the first slot that opens wins.
pub fn decrypt_multi(ciphertext: &[u8], slots: &[SealedBox], key: &SecretKey) -> Option<String> {
    for (index, slot) in slots.iter().enumerate() {
        match open_slot(ciphertext, slot, key) {
            Ok(plaintext) => return Some(plaintext),
            Err(e) => tracing::debug!("key slot {} did not open: {}", index, e),
        }
    }
    None
}

/// Parse a serialized envelope and try each candidate key in turn.
pub fn decrypt_any(serialized: &str, keys: &[SecretKey]) -> Option<String> {
    let envelope = match Envelope::parse(serialized) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!("not an envelope: {}", e);
            return None;
        }
    };
    keys.iter().find_map(|key| match &envelope {
        Envelope::Single(sealed) => decrypt_single(sealed, key)
            .map_err(|e| tracing::debug!("single envelope did not open: {}", e))
            .ok(),
        Envelope::Multi { ciphertext, keys } => decrypt_multi(ciphertext, keys, key),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn keys(n: usize) -> Vec<SecretKey> {
        (0..n).map(|_| SecretKey::generate().unwrap()).collect()
    }

    #[test]
    fn test_single_round_trip() {
        let key = SecretKey::generate().unwrap();
        let envelope = encrypt_single("hello", &key.public()).unwrap();
        let json = envelope.to_json().unwrap();
        assert!(json.contains(r#""kind":"single""#));
        assert_eq!(decrypt_any(&json, &[key]).as_deref(), Some("hello"));
    }

    #[test]
    fn test_multi_every_recipient_decrypts() {
        let recipients = keys(3);
        let publics: Vec<_> = recipients.iter().map(|k| k.public()).collect();
        let envelope = encrypt_multi(r#"{"rent":1200}"#, &publics).unwrap();
        let Envelope::Multi { keys, .. } = &envelope else {
            panic!("expected multi envelope");
        };
        assert_eq!(keys.len(), 3);

        let json = envelope.to_json().unwrap();
        for key in &recipients {
            assert_eq!(
                decrypt_any(&json, std::slice::from_ref(key)).as_deref(),
                Some(r#"{"rent":1200}"#)
            );
        }
    }

    #[test]
    fn test_non_recipient_gets_none() {
        let recipients = keys(2);
        let publics: Vec<_> = recipients.iter().map(|k| k.public()).collect();
        let json = encrypt_multi("secret", &publics).unwrap().to_json().unwrap();
        assert_eq!(decrypt_any(&json, &keys(2)), None);
        assert_eq!(decrypt_any(&json, &[]), None);
    }

    #[test]
    fn test_candidate_key_order_does_not_matter() {
        let recipient = SecretKey::generate().unwrap();
        let json = encrypt_single("x", &recipient.public())
            .unwrap()
            .to_json()
            .unwrap();
        let mut candidates = keys(2);
        candidates.push(recipient);
        assert_eq!(decrypt_any(&json, &candidates).as_deref(), Some("x"));
    }

    #[test]
    fn test_multi_requires_recipients() {
        assert!(matches!(
            encrypt_multi("x", &[]),
            Err(EnvelopeError::NoRecipients)
        ));
    }

    #[test]
    fn test_legacy_array_forms() {
        let key = SecretKey::generate().unwrap();
        let Envelope::Single(sealed) = encrypt_single("legacy", &key.public()).unwrap() else {
            panic!("expected single envelope");
        };
        let body = serde_json::to_value(&sealed).unwrap();
        let as_array = |b: &Value| {
            serde_json::json!([b["iv"], b["ephemeral_public_key"], b["ciphertext"], b["mac"]])
        };

        let single = as_array(&body).to_string();
        assert_eq!(
            decrypt_any(&single, std::slice::from_ref(&key)).as_deref(),
            Some("legacy")
        );

        let Envelope::Multi { ciphertext, keys } =
            encrypt_multi("legacy multi", &[key.public()]).unwrap()
        else {
            panic!("expected multi envelope");
        };
        let slots: Vec<Value> = keys
            .iter()
            .map(|slot| as_array(&serde_json::to_value(slot).unwrap()))
            .collect();
        let multi = serde_json::json!([hex::encode(ciphertext), slots]).to_string();
        assert_eq!(decrypt_any(&multi, &[key]).as_deref(), Some("legacy multi"));
    }

    #[test]
    fn test_parse_rejects_unknown_shapes() {
        assert!(Envelope::parse("[1, 2, 3]").is_err());
        assert!(Envelope::parse("\"plain\"").is_err());
        assert!(Envelope::parse(r#"{"kind":"triple"}"#).is_err());
        assert!(Envelope::parse("not json").is_err());
    }
}
