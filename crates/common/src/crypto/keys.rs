use std::fmt;
use std::str::FromStr;

use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};

use super::signature::Signature;

/// Size of a secp256k1 private scalar in bytes
pub const PRIVATE_KEY_SIZE: usize = 32;
/// Size of an uncompressed SEC1 public key in bytes (0x04 || x || y)
pub const PUBLIC_KEY_SIZE: usize = 65;
/// Size of a single public key coordinate in bytes
pub const COORDINATE_SIZE: usize = 32;
/// Size of an account address in bytes
pub const ADDRESS_SIZE: usize = 20;

/// Errors that can occur during key operations
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("key error: {0}")]
    Default(#[from] anyhow::Error),
}

/// Public half of a secp256k1 key pair
///
/// Used as the recipient of sealed boxes and to verify naming-service
/// update signatures. The canonical text form is the lowercase hex of the
/// uncompressed SEC1 point; on the naming wire the point travels as two
/// unprefixed 64-char coordinates instead (see [`PublicKey::x_hex`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey(k256::PublicKey);

impl From<k256::PublicKey> for PublicKey {
    fn from(key: k256::PublicKey) -> Self {
        PublicKey(key)
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = KeyError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let key = k256::PublicKey::from_sec1_bytes(bytes)
            .map_err(|_| anyhow::anyhow!("invalid secp256k1 public key"))?;
        Ok(PublicKey(key))
    }
}

impl PublicKey {
    /// Parse a public key from hex encoded SEC1 bytes
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings, compressed
    /// or uncompressed.
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let bytes = hex::decode(hex).map_err(|_| anyhow::anyhow!("public key hex decode error"))?;
        Self::try_from(bytes.as_slice())
    }

    /// Build a public key from its affine coordinates, each given as hex
    pub fn from_xy_hex(x: &str, y: &str) -> Result<Self, KeyError> {
        let mut buff = [0u8; PUBLIC_KEY_SIZE];
        buff[0] = 0x04;
        decode_coordinate(x, &mut buff[1..1 + COORDINATE_SIZE])?;
        decode_coordinate(y, &mut buff[1 + COORDINATE_SIZE..])?;
        Self::try_from(&buff[..])
    }

    /// Uncompressed SEC1 encoding
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        let point = self.0.to_encoded_point(false);
        let mut buff = [0u8; PUBLIC_KEY_SIZE];
        buff.copy_from_slice(point.as_bytes());
        buff
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// x coordinate as 64 unprefixed lowercase hex chars
    pub fn x_hex(&self) -> String {
        hex::encode(&self.to_bytes()[1..1 + COORDINATE_SIZE])
    }

    /// y coordinate as 64 unprefixed lowercase hex chars
    pub fn y_hex(&self) -> String {
        hex::encode(&self.to_bytes()[1 + COORDINATE_SIZE..])
    }

    /// Derive the account address: last 20 bytes of keccak256(x || y)
    pub fn address(&self) -> Address {
        let bytes = self.to_bytes();
        let digest = Keccak256::digest(&bytes[1..]);
        let mut address = [0u8; ADDRESS_SIZE];
        address.copy_from_slice(&digest[digest.len() - ADDRESS_SIZE..]);
        Address(address)
    }

    pub(crate) fn as_inner(&self) -> &k256::PublicKey {
        &self.0
    }

    /// Verify an ECDSA signature over SHA-256(msg).
    ///
    /// Both `s` and `n - s` are accepted; signers that do not normalise to
    /// low-S produce either.
    pub fn verify(&self, msg: &[u8], signature: &Signature) -> Result<(), KeyError> {
        let signature = EcdsaSignature::from_slice(&signature.to_bytes())
            .map_err(|_| anyhow::anyhow!("malformed signature"))?;
        let signature = signature.normalize_s().unwrap_or(signature);
        VerifyingKey::from(&self.0)
            .verify(msg, &signature)
            .map_err(|_| anyhow::anyhow!("signature mismatch"))?;
        Ok(())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        PublicKey::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

fn decode_coordinate(hex: &str, out: &mut [u8]) -> Result<(), KeyError> {
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    if hex.len() > COORDINATE_SIZE * 2 {
        return Err(anyhow::anyhow!("coordinate too long: {} hex chars", hex.len()).into());
    }
    // coordinates rendered without padding lose their leading zeros
    let padded = format!("{:0>64}", hex);
    hex::decode_to_slice(padded, out).map_err(|_| anyhow::anyhow!("coordinate hex decode error"))?;
    Ok(())
}

/// Secret half of a secp256k1 key pair
#[derive(Clone)]
pub struct SecretKey(k256::SecretKey);

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretKey").field(&self.public().address()).finish()
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bytes() == other.0.to_bytes()
    }
}

impl Eq for SecretKey {}

impl TryFrom<&[u8]> for SecretKey {
    type Error = KeyError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != PRIVATE_KEY_SIZE {
            return Err(anyhow::anyhow!(
                "invalid private key size, expected {}, got {}",
                PRIVATE_KEY_SIZE,
                bytes.len()
            )
            .into());
        }
        let key = k256::SecretKey::from_slice(bytes)
            .map_err(|_| anyhow::anyhow!("private key is not a valid secp256k1 scalar"))?;
        Ok(SecretKey(key))
    }
}

impl SecretKey {
    /// Parse a secret key from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let mut buff = [0; PRIVATE_KEY_SIZE];
        hex::decode_to_slice(hex, &mut buff)
            .map_err(|_| anyhow::anyhow!("private key hex decode error"))?;
        Self::try_from(&buff[..])
    }

    /// Generate a new uniformly random secret key
    ///
    /// Candidates outside `[1, n)` are rejected and redrawn.
    pub fn generate() -> Result<Self, KeyError> {
        loop {
            let mut bytes = [0u8; PRIVATE_KEY_SIZE];
            getrandom::getrandom(&mut bytes)
                .map_err(|e| anyhow::anyhow!("failed to generate random bytes: {}", e))?;
            if let Ok(key) = k256::SecretKey::from_slice(&bytes) {
                return Ok(SecretKey(key));
            }
        }
    }

    pub fn public(&self) -> PublicKey {
        PublicKey(self.0.public_key())
    }

    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_SIZE] {
        self.0.to_bytes().into()
    }

    /// "0x"-prefixed lowercase hex
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    pub(crate) fn as_inner(&self) -> &k256::SecretKey {
        &self.0
    }

    /// Sign SHA-256(msg) with RFC 6979 deterministic nonces.
    ///
    /// The produced signature is always low-S normalized.
    pub fn sign(&self, msg: &[u8]) -> Signature {
        let signing_key = SigningKey::from(&self.0);
        let signature: EcdsaSignature = signing_key.sign(msg);
        let bytes: [u8; 64] = signature.to_bytes().into();
        Signature::from_bytes(bytes)
    }
}

/// A 20-byte account address derived from a public key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_SIZE]);

impl From<[u8; ADDRESS_SIZE]> for Address {
    fn from(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Address(bytes)
    }
}

impl Address {
    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = KeyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix("0x").unwrap_or(s);
        let mut buff = [0u8; ADDRESS_SIZE];
        hex::decode_to_slice(hex.to_ascii_lowercase(), &mut buff)
            .map_err(|_| anyhow::anyhow!("invalid address: {}", s))?;
        Ok(Address(buff))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// An elliptic-curve account: a key pair plus its derived address
///
/// `public` is always the point of `secret` and `address` is always
/// derived from `public`; the fields are private so neither can drift.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EcAccount {
    secret: SecretKey,
    public: PublicKey,
    address: Address,
}

impl From<SecretKey> for EcAccount {
    fn from(secret: SecretKey) -> Self {
        let public = secret.public();
        let address = public.address();
        Self {
            secret,
            public,
            address,
        }
    }
}

impl EcAccount {
    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let private_key = SecretKey::generate().unwrap();
        let public_key = private_key.public();

        let private_hex = private_key.to_hex();
        assert!(private_hex.starts_with("0x"));
        let recovered_private = SecretKey::from_hex(&private_hex).unwrap();
        assert_eq!(private_key.to_bytes(), recovered_private.to_bytes());

        let public_hex = public_key.to_hex();
        let recovered_public = PublicKey::from_hex(&public_hex).unwrap();
        assert_eq!(public_key, recovered_public);
    }

    #[test]
    fn test_public_key_coordinates() {
        let public_key = SecretKey::generate().unwrap().public();
        let x = public_key.x_hex();
        let y = public_key.y_hex();
        assert_eq!(x.len(), 64);
        assert_eq!(y.len(), 64);

        let recovered = PublicKey::from_xy_hex(&x, &y).unwrap();
        assert_eq!(public_key, recovered);

        // leading zeros stripped by a careless encoder still parse
        let trimmed_x = x.trim_start_matches('0');
        assert_eq!(PublicKey::from_xy_hex(trimmed_x, &y).unwrap(), public_key);
    }

    #[test]
    fn test_reject_point_off_curve() {
        let x = "01".repeat(32);
        let y = "02".repeat(32);
        assert!(PublicKey::from_xy_hex(&x, &y).is_err());
    }

    #[test]
    fn test_reject_zero_scalar() {
        assert!(SecretKey::from_hex(&"00".repeat(32)).is_err());
    }

    #[test]
    fn test_known_address() {
        // private key 1 => generator point, a well known address
        let key = SecretKey::from_hex(&format!("{:0>64}", "1")).unwrap();
        assert_eq!(
            key.public().address().to_string(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_address_parse() {
        let address = SecretKey::generate().unwrap().public().address();
        let text = address.to_string();
        assert_eq!(text.len(), 42);
        assert_eq!(text.parse::<Address>().unwrap(), address);
        assert_eq!(text.to_uppercase().replace("0X", "0x").parse::<Address>().unwrap(), address);
        assert!("0x1234".parse::<Address>().is_err());
    }

    #[test]
    fn test_sign_and_verify() {
        let secret_key = SecretKey::generate().unwrap();
        let public_key = secret_key.public();
        let message = b"apt-42-0xab";

        let signature = secret_key.sign(message);
        assert!(public_key.verify(message, &signature).is_ok());

        // deterministic nonce
        assert_eq!(signature, secret_key.sign(message));

        assert!(public_key.verify(b"apt-42-0xcd", &signature).is_err());

        let other_key = SecretKey::generate().unwrap().public();
        assert!(other_key.verify(message, &signature).is_err());
    }

    #[test]
    fn test_account_derivation() {
        let secret = SecretKey::generate().unwrap();
        let account = EcAccount::from(secret.clone());
        assert_eq!(account.public(), &secret.public());
        assert_eq!(account.address(), secret.public().address());
    }
}
