//! ECDSA signatures as they travel over the naming-service wire
//!
//! A signature is `(r, s)`, rendered as the JSON object `{"r": hex, "s": hex}`
//! with unprefixed lowercase hex. Parsing tolerates values whose leading
//! zeros were dropped by the signer.

use serde::{Deserialize, Serialize};

use super::keys::{EcAccount, PublicKey};

const SCALAR_SIZE: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("signature json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid signature component {0}: {1}")]
    Component(&'static str, String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature {
    r: [u8; SCALAR_SIZE],
    s: [u8; SCALAR_SIZE],
}

#[derive(Serialize, Deserialize)]
struct SignatureWire {
    r: String,
    s: String,
}

impl Signature {
    /// Build from the 64-byte `r || s` form
    pub fn from_bytes(bytes: [u8; 2 * SCALAR_SIZE]) -> Self {
        let mut r = [0u8; SCALAR_SIZE];
        let mut s = [0u8; SCALAR_SIZE];
        r.copy_from_slice(&bytes[..SCALAR_SIZE]);
        s.copy_from_slice(&bytes[SCALAR_SIZE..]);
        Self { r, s }
    }

    pub fn to_bytes(&self) -> [u8; 2 * SCALAR_SIZE] {
        let mut out = [0u8; 2 * SCALAR_SIZE];
        out[..SCALAR_SIZE].copy_from_slice(&self.r);
        out[SCALAR_SIZE..].copy_from_slice(&self.s);
        out
    }

    pub fn r_hex(&self) -> String {
        hex::encode(self.r)
    }

    pub fn s_hex(&self) -> String {
        hex::encode(self.s)
    }

    pub fn to_json(&self) -> String {
        let wire = SignatureWire {
            r: self.r_hex(),
            s: self.s_hex(),
        };
        // a struct of two strings always serializes
        serde_json::to_string(&wire).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Result<Self, SignatureError> {
        let wire: SignatureWire = serde_json::from_str(json)?;
        Ok(Self {
            r: parse_scalar("r", &wire.r)?,
            s: parse_scalar("s", &wire.s)?,
        })
    }
}

fn parse_scalar(name: &'static str, hex: &str) -> Result<[u8; SCALAR_SIZE], SignatureError> {
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    if hex.is_empty() || hex.len() > SCALAR_SIZE * 2 {
        return Err(SignatureError::Component(
            name,
            format!("expected 1..=64 hex chars, got {}", hex.len()),
        ));
    }
    let padded = format!("{:0>64}", hex);
    let mut out = [0u8; SCALAR_SIZE];
    hex::decode_to_slice(padded, &mut out)
        .map_err(|e| SignatureError::Component(name, e.to_string()))?;
    Ok(out)
}

/// Sign `message` with the account's private scalar.
pub fn sign(message: &str, account: &EcAccount) -> Signature {
    account.secret().sign(message.as_bytes())
}

/// Check `signature` over `message` against `public_key`.
pub fn verify(message: &str, signature: &Signature, public_key: &PublicKey) -> bool {
    public_key.verify(message.as_bytes(), signature).is_ok()
}
