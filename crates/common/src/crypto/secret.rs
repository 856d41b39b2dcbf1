//! ChaCha20-Poly1305 payload encryption. An envelope's payload is encrypted
//! once under a `Secret`, however many recipients it has.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const NONCE_SIZE: usize = 12;
pub const SECRET_SIZE: usize = 32;
/// Length of the plaintext digest carried inside the ciphertext
pub const BLAKE3_HASH_SIZE: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("system randomness unavailable: {0}")]
    Random(getrandom::Error),
    #[error("secret must be 32 bytes, got {0}")]
    InvalidLength(usize),
    #[error("secret is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("ciphertext is truncated")]
    Truncated,
    #[error("aead failure (wrong key or tampered ciphertext)")]
    Cipher,
    #[error("plaintext digest mismatch")]
    Integrity,
}

/// Symmetric key shared by the recipients of an envelope
///
/// `encrypt` output is `nonce || aead(blake3(plaintext) || plaintext)`; the
/// digest is re-checked after the tag on `decrypt`.
#[derive(Debug, PartialEq, Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret([u8; SECRET_SIZE]);

impl From<[u8; SECRET_SIZE]> for Secret {
    fn from(bytes: [u8; SECRET_SIZE]) -> Self {
        Secret(bytes)
    }
}

fn random<const N: usize>() -> Result<[u8; N], SecretError> {
    let mut out = [0u8; N];
    getrandom::getrandom(&mut out).map_err(SecretError::Random)?;
    Ok(out)
}

impl Secret {
    pub fn generate() -> Result<Self, SecretError> {
        random().map(Self)
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, SecretError> {
        let bytes: [u8; SECRET_SIZE] = data
            .try_into()
            .map_err(|_| SecretError::InvalidLength(data.len()))?;
        Ok(Self(bytes))
    }

    /// "0x"-prefixed lowercase hex, the form sealed for each recipient.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(text: &str) -> Result<Self, SecretError> {
        let digits = text.strip_prefix("0x").unwrap_or(text);
        Self::from_slice(&hex::decode(digits)?)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.0))
    }

    /// Encrypt under a fresh random nonce.
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, SecretError> {
        let nonce: [u8; NONCE_SIZE] = random()?;

        let mut framed = Vec::with_capacity(BLAKE3_HASH_SIZE + data.len());
        framed.extend_from_slice(blake3::hash(data).as_bytes());
        framed.extend_from_slice(data);

        let sealed = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce), framed.as_slice())
            .map_err(|_| SecretError::Cipher)?;

        let mut out = nonce.to_vec();
        out.extend(sealed);
        Ok(out)
    }

    /// Reverse [`Secret::encrypt`].
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, SecretError> {
        if data.len() < NONCE_SIZE {
            return Err(SecretError::Truncated);
        }
        let (nonce, sealed) = data.split_at(NONCE_SIZE);
        let framed = self
            .cipher()
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| SecretError::Cipher)?;

        if framed.len() < BLAKE3_HASH_SIZE {
            return Err(SecretError::Truncated);
        }
        let (digest, plaintext) = framed.split_at(BLAKE3_HASH_SIZE);
        if digest != blake3::hash(plaintext).as_bytes() {
            return Err(SecretError::Integrity);
        }
        Ok(plaintext.to_vec())
    }
}
