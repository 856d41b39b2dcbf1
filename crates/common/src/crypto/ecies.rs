//! Single-recipient ECIES over secp256k1
//!
//! A fresh ephemeral key pair is drawn for every seal. The x-coordinate of
//! the ECDH point is hashed with SHA-512: the first half keys a ChaCha20
//! stream, the second half keys an HMAC-SHA256 over
//! `iv || ephemeral_public_key || ciphertext`.

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

use super::hex_serde;
use super::keys::{PublicKey, SecretKey};

/// Size of the ChaCha20 IV in bytes
pub const IV_SIZE: usize = 12;
/// Size of the HMAC-SHA256 tag in bytes
pub const MAC_SIZE: usize = 32;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum SealedBoxError {
    #[error("malformed sealed box: {0}")]
    Malformed(String),
    #[error("mac mismatch")]
    MacMismatch,
    #[error("sealed box error: {0}")]
    Default(#[from] anyhow::Error),
}

/// A ciphertext readable only by the holder of one private key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBox {
    #[serde(with = "hex_serde")]
    iv: Vec<u8>,
    ephemeral_public_key: PublicKey,
    #[serde(with = "hex_serde")]
    ciphertext: Vec<u8>,
    #[serde(with = "hex_serde")]
    mac: Vec<u8>,
}

struct DerivedKeys {
    encryption: [u8; 32],
    mac: [u8; 32],
}

fn derive_keys(secret: &SecretKey, public: &PublicKey) -> DerivedKeys {
    let shared = k256::ecdh::diffie_hellman(
        secret.as_inner().to_nonzero_scalar(),
        public.as_inner().as_affine(),
    );
    let digest = Sha512::digest(shared.raw_secret_bytes());
    let mut encryption = [0u8; 32];
    let mut mac = [0u8; 32];
    encryption.copy_from_slice(&digest[..32]);
    mac.copy_from_slice(&digest[32..]);
    DerivedKeys { encryption, mac }
}

fn compute_mac(
    key: &[u8; 32],
    iv: &[u8],
    ephemeral: &PublicKey,
    ciphertext: &[u8],
) -> Result<HmacSha256, SealedBoxError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| anyhow::anyhow!("hmac key error: {}", e))?;
    mac.update(iv);
    mac.update(&ephemeral.to_bytes());
    mac.update(ciphertext);
    Ok(mac)
}

fn apply_keystream(key: &[u8; 32], iv: &[u8], data: &mut [u8]) -> Result<(), SealedBoxError> {
    let mut cipher = ChaCha20::new_from_slices(key, iv)
        .map_err(|_| SealedBoxError::Malformed(format!("iv must be {} bytes", IV_SIZE)))?;
    cipher.apply_keystream(data);
    Ok(())
}

impl SealedBox {
    /// Encrypt `plaintext` so that only `recipient` can open it.
    pub fn seal(plaintext: &[u8], recipient: &PublicKey) -> Result<Self, SealedBoxError> {
        let ephemeral = SecretKey::generate().map_err(|e| anyhow::anyhow!(e))?;
        let ephemeral_public_key = ephemeral.public();
        let keys = derive_keys(&ephemeral, recipient);

        let mut iv = [0u8; IV_SIZE];
        getrandom::getrandom(&mut iv)
            .map_err(|e| anyhow::anyhow!("failed to generate iv: {}", e))?;

        let mut ciphertext = plaintext.to_vec();
        apply_keystream(&keys.encryption, &iv, &mut ciphertext)?;

        let mac = compute_mac(&keys.mac, &iv, &ephemeral_public_key, &ciphertext)?
            .finalize()
            .into_bytes()
            .to_vec();

        Ok(Self {
            iv: iv.to_vec(),
            ephemeral_public_key,
            ciphertext,
            mac,
        })
    }

    /// Authenticate and decrypt with the recipient's private key.
    ///
    /// The MAC is checked in constant time before any decryption happens.
    pub fn open(&self, key: &SecretKey) -> Result<Vec<u8>, SealedBoxError> {
        if self.iv.len() != IV_SIZE {
            return Err(SealedBoxError::Malformed(format!(
                "iv must be {} bytes, got {}",
                IV_SIZE,
                self.iv.len()
            )));
        }
        if self.mac.len() != MAC_SIZE {
            return Err(SealedBoxError::Malformed(format!(
                "mac must be {} bytes, got {}",
                MAC_SIZE,
                self.mac.len()
            )));
        }

        let keys = derive_keys(key, &self.ephemeral_public_key);
        compute_mac(&keys.mac, &self.iv, &self.ephemeral_public_key, &self.ciphertext)?
            .verify_slice(&self.mac)
            .map_err(|_| SealedBoxError::MacMismatch)?;

        let mut plaintext = self.ciphertext.clone();
        apply_keystream(&keys.encryption, &self.iv, &mut plaintext)?;
        Ok(plaintext)
    }

    /// Build a box from the four hex fields of the legacy array form
    /// `[iv, ephemeral_public_key, ciphertext, mac]`.
    pub fn from_hex_parts(
        iv: &str,
        ephemeral_public_key: &str,
        ciphertext: &str,
        mac: &str,
    ) -> Result<Self, SealedBoxError> {
        let decode = |name: &str, value: &str| {
            hex::decode(value.strip_prefix("0x").unwrap_or(value))
                .map_err(|e| SealedBoxError::Malformed(format!("{}: {}", name, e)))
        };
        Ok(Self {
            iv: decode("iv", iv)?,
            ephemeral_public_key: PublicKey::from_hex(ephemeral_public_key)
                .map_err(|e| SealedBoxError::Malformed(e.to_string()))?,
            ciphertext: decode("ciphertext", ciphertext)?,
            mac: decode("mac", mac)?,
        })
    }

    pub fn ephemeral_public_key(&self) -> &PublicKey {
        &self.ephemeral_public_key
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_seal_open() {
        let recipient = SecretKey::generate().unwrap();
        let sealed = SealedBox::seal(b"hello", &recipient.public()).unwrap();
        assert_eq!(sealed.open(&recipient).unwrap(), b"hello");
    }

    #[test]
    fn test_fresh_ephemeral_key_per_seal() {
        let recipient = SecretKey::generate().unwrap().public();
        let a = SealedBox::seal(b"same", &recipient).unwrap();
        let b = SealedBox::seal(b"same", &recipient).unwrap();
        assert_ne!(a.ephemeral_public_key(), b.ephemeral_public_key());
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_wrong_key_is_mac_mismatch() {
        let recipient = SecretKey::generate().unwrap();
        let sealed = SealedBox::seal(b"hello", &recipient.public()).unwrap();
        let other = SecretKey::generate().unwrap();
        assert!(matches!(sealed.open(&other), Err(SealedBoxError::MacMismatch)));
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let recipient = SecretKey::generate().unwrap();
        let mut sealed = SealedBox::seal(b"hello", &recipient.public()).unwrap();
        sealed.ciphertext[0] ^= 0x01;
        assert!(matches!(sealed.open(&recipient), Err(SealedBoxError::MacMismatch)));
    }

    #[test]
    fn test_truncated_fields_are_malformed() {
        let recipient = SecretKey::generate().unwrap();
        let mut sealed = SealedBox::seal(b"hello", &recipient.public()).unwrap();
        sealed.mac.truncate(8);
        assert!(matches!(sealed.open(&recipient), Err(SealedBoxError::Malformed(_))));
    }

    #[test]
    fn test_json_fields_are_hex() {
        let recipient = SecretKey::generate().unwrap();
        let sealed = SealedBox::seal(b"", &recipient.public()).unwrap();
        let value = serde_json::to_value(&sealed).unwrap();
        assert_eq!(value["iv"].as_str().unwrap().len(), IV_SIZE * 2);
        assert_eq!(value["mac"].as_str().unwrap().len(), MAC_SIZE * 2);
        assert_eq!(value["ciphertext"].as_str().unwrap(), "");

        let parsed: SealedBox = serde_json::from_value(value).unwrap();
        assert!(parsed.open(&recipient).unwrap().is_empty());
    }
}
