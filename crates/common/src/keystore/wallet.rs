use std::collections::BTreeMap;

use argon2::Argon2;
use serde::{Deserialize, Serialize};

use crate::crypto::hex_serde;
use crate::crypto::{Address, EcAccount, Secret, SecretError, SecretKey};

use super::KeyManagerError;

pub const KEYSTORE_VERSION: u32 = 1;
pub const KDF_ARGON2ID: &str = "argon2id";
const SALT_SIZE: usize = 16;

/// Unlocked set of EC accounts, indexed by their address
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Keystore {
    accounts: BTreeMap<Address, EcAccount>,
}

impl Keystore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, account: EcAccount) {
        self.accounts.insert(account.address(), account);
    }

    pub fn remove(&mut self, address: &Address) -> Option<EcAccount> {
        self.accounts.remove(address)
    }

    pub fn get(&self, address: &Address) -> Option<&EcAccount> {
        self.accounts.get(address)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &EcAccount> {
        self.accounts.values()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn to_plaintext(&self) -> Result<Vec<u8>, KeyManagerError> {
        let keys: Vec<String> = self
            .accounts
            .values()
            .map(|account| account.secret().to_hex())
            .collect();
        Ok(serde_json::to_vec(&keys)?)
    }

    fn from_plaintext(bytes: &[u8]) -> Result<Self, KeyManagerError> {
        let keys: Vec<String> = serde_json::from_slice(bytes)
            .map_err(|e| KeyManagerError::CorruptKeystore(e.to_string()))?;
        let mut keystore = Keystore::new();
        for key in keys {
            let secret = SecretKey::from_hex(&key)
                .map_err(|e| KeyManagerError::CorruptKeystore(e.to_string()))?;
            keystore.insert(EcAccount::from(secret));
        }
        Ok(keystore)
    }
}

/// Key material derived from the keystore password
#[derive(Clone)]
pub struct KeystoreKey {
    salt: Vec<u8>,
    secret: Secret,
}

impl KeystoreKey {
    /// Derive with a fresh random salt, for a keystore being created.
    pub fn generate(password: &str) -> Result<Self, KeyManagerError> {
        let mut salt = vec![0u8; SALT_SIZE];
        getrandom::getrandom(&mut salt)
            .map_err(|e| anyhow::anyhow!("failed to generate salt: {}", e))?;
        Self::derive(password, salt)
    }

    pub fn derive(password: &str, salt: Vec<u8>) -> Result<Self, KeyManagerError> {
        let mut key = [0u8; 32];
        Argon2::default()
            .hash_password_into(password.as_bytes(), &salt, &mut key)
            .map_err(|e| anyhow::anyhow!("argon2 error: {}", e))?;
        Ok(Self {
            salt,
            secret: Secret::from(key),
        })
    }
}

/// The persisted, password-encrypted form of a [`Keystore`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedKeystore {
    pub version: u32,
    pub kdf: String,
    #[serde(with = "hex_serde")]
    pub salt: Vec<u8>,
    #[serde(with = "hex_serde")]
    pub ciphertext: Vec<u8>,
}

impl SealedKeystore {
    pub fn seal(keystore: &Keystore, key: &KeystoreKey) -> Result<Self, KeyManagerError> {
        Ok(Self {
            version: KEYSTORE_VERSION,
            kdf: KDF_ARGON2ID.to_string(),
            salt: key.salt.clone(),
            ciphertext: key.secret.encrypt(&keystore.to_plaintext()?)?,
        })
    }

    /// Derive the key from `password` and decrypt. A failed AEAD check
    /// means the password is wrong; a blob too short to hold a nonce is
    /// corrupt whatever the password.
    pub fn open(&self, password: &str) -> Result<(Keystore, KeystoreKey), KeyManagerError> {
        if self.version != KEYSTORE_VERSION || self.kdf != KDF_ARGON2ID {
            return Err(KeyManagerError::CorruptKeystore(format!(
                "unsupported keystore version {} with kdf {}",
                self.version, self.kdf
            )));
        }
        let key = KeystoreKey::derive(password, self.salt.clone())?;
        let plaintext = key
            .secret
            .decrypt(&self.ciphertext)
            .map_err(|e| match e {
                SecretError::Cipher => KeyManagerError::Authentication,
                other => KeyManagerError::CorruptKeystore(other.to_string()),
            })?;
        Ok((Keystore::from_plaintext(&plaintext)?, key))
    }

    pub fn to_json(&self) -> Result<String, KeyManagerError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, KeyManagerError> {
        serde_json::from_str(json).map_err(|e| KeyManagerError::CorruptKeystore(e.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_seal_open_keystore() {
        let mut keystore = Keystore::new();
        let account = EcAccount::from(SecretKey::generate().unwrap());
        keystore.insert(account.clone());

        let key = KeystoreKey::generate("hunter2").unwrap();
        let sealed = SealedKeystore::seal(&keystore, &key).unwrap();
        let json = sealed.to_json().unwrap();
        assert!(json.contains(r#""kdf":"argon2id""#));

        let (opened, _) = SealedKeystore::from_json(&json)
            .unwrap()
            .open("hunter2")
            .unwrap();
        assert_eq!(opened.get(&account.address()), Some(&account));
    }

    #[test]
    fn test_truncated_keystore_is_corrupt() {
        let key = KeystoreKey::generate("right").unwrap();
        let mut sealed = SealedKeystore::seal(&Keystore::new(), &key).unwrap();
        sealed.ciphertext.truncate(4);
        assert!(matches!(
            sealed.open("right"),
            Err(KeyManagerError::CorruptKeystore(_))
        ));
    }

    #[test]
    fn test_wrong_password_is_authentication_error() {
        let key = KeystoreKey::generate("right").unwrap();
        let sealed = SealedKeystore::seal(&Keystore::new(), &key).unwrap();
        assert!(matches!(
            sealed.open("wrong"),
            Err(KeyManagerError::Authentication)
        ));
    }
}
