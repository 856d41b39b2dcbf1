//! Cryptographic primitives for Cairn
//!
//! - **Accounts**: secp256k1 key pairs with an Ethereum-style address
//!   ([`EcAccount`]). The same key pair signs naming-service updates and
//!   receives encrypted payloads.
//! - **Single recipient**: ECIES ([`SealedBox`]) with ChaCha20 and an
//!   HMAC-SHA256 tag.
//! - **Many recipients**: the payload is encrypted once with a random
//!   [`Secret`] (ChaCha20-Poly1305) and that secret is sealed per recipient.
//! - **Signatures**: ECDSA over SHA-256 with deterministic nonces.

mod ecies;
mod envelope;
mod keys;
mod secret;
mod signature;

pub use ecies::{SealedBox, SealedBoxError};
pub use envelope::{
    decrypt_any, decrypt_multi, decrypt_single, encrypt_multi, encrypt_single, Envelope,
    EnvelopeError,
};
pub use keys::{Address, EcAccount, KeyError, PublicKey, SecretKey};
pub use secret::{Secret, SecretError, BLAKE3_HASH_SIZE};
pub use signature::{sign, verify, Signature, SignatureError};

/// Serde adapter rendering byte vectors as unprefixed lowercase hex
pub(crate) mod hex_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}
