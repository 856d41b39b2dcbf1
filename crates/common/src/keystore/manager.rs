use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::crypto::{Address, EcAccount, SecretKey};
use crate::kv::KvStore;

use super::wallet::{Keystore, KeystoreKey, SealedKeystore};
use super::{AccountRole, ExternalAccount, KeyManagerError, PasswordPrompt, PrivateKeySource};

/// KV key holding the sealed keystore
pub const KEYSTORE_KEY: &str = "keystore";
const MAPPING_PREFIX: &str = "ec_account.";

struct Unlocked {
    keystore: Keystore,
    key: KeystoreKey,
}

/// Owns the unlocked keystore for the lifetime of the process
///
/// All operations run under one lock, so two callers racing to create an
/// account for the same external address end up with a single mapping.
pub struct KeyManager {
    kv: Arc<dyn KvStore>,
    prompt: Arc<dyn PasswordPrompt>,
    unlocked: Mutex<Option<Unlocked>>,
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager").field("kv", &self.kv).finish()
    }
}

fn mapping_key(external: &Address) -> String {
    format!("{}{}", MAPPING_PREFIX, external)
}

impl KeyManager {
    pub fn new(kv: Arc<dyn KvStore>, prompt: Arc<dyn PasswordPrompt>) -> Self {
        Self {
            kv,
            prompt,
            unlocked: Mutex::new(None),
        }
    }

    async fn load_or_create(&self) -> Result<Unlocked, KeyManagerError> {
        if let Some(json) = self.kv.get(KEYSTORE_KEY).await? {
            let sealed = SealedKeystore::from_json(&json)?;
            let password = self.prompt.password("unlock keystore").await?;
            let (keystore, key) = sealed.open(&password)?;
            tracing::info!("unlocked keystore with {} accounts", keystore.len());
            return Ok(Unlocked { keystore, key });
        }

        let password = self.prompt.password("new keystore password").await?;
        let unlocked = Unlocked {
            keystore: Keystore::new(),
            key: KeystoreKey::generate(&password)?,
        };
        self.persist(&unlocked).await?;
        tracing::info!("created new keystore");
        Ok(unlocked)
    }

    async fn persist(&self, unlocked: &Unlocked) -> Result<(), KeyManagerError> {
        let sealed = SealedKeystore::seal(&unlocked.keystore, &unlocked.key)?;
        self.kv.set(KEYSTORE_KEY, &sealed.to_json()?).await?;
        Ok(())
    }

    async fn unlock<'a>(
        &self,
        slot: &'a mut Option<Unlocked>,
    ) -> Result<&'a mut Unlocked, KeyManagerError> {
        let unlocked = match slot.take() {
            Some(unlocked) => unlocked,
            None => self.load_or_create().await?,
        };
        Ok(slot.insert(unlocked))
    }

    async fn generate_into(&self, unlocked: &mut Unlocked) -> Result<EcAccount, KeyManagerError> {
        let account = EcAccount::from(SecretKey::generate()?);
        unlocked.keystore.insert(account.clone());
        if let Err(e) = self.persist(unlocked).await {
            unlocked.keystore.remove(&account.address());
            return Err(e);
        }
        tracing::info!("generated ec account {}", account.address());
        Ok(account)
    }

    /// Return the unlocked keystore, unlocking or creating it first if needed.
    pub async fn wallet(&self) -> Result<Keystore, KeyManagerError> {
        let mut slot = self.unlocked.lock().await;
        Ok(self.unlock(&mut slot).await?.keystore.clone())
    }

    /// Generate a new EC account and persist the keystore before returning it.
    pub async fn generate_ec_account(&self) -> Result<EcAccount, KeyManagerError> {
        let mut slot = self.unlocked.lock().await;
        let unlocked = self.unlock(&mut slot).await?;
        self.generate_into(unlocked).await
    }

    /// Look up an EC account by its own address.
    pub async fn ec_account(&self, address: &Address) -> Result<Option<EcAccount>, KeyManagerError> {
        let mut slot = self.unlocked.lock().await;
        let unlocked = self.unlock(&mut slot).await?;
        Ok(unlocked.keystore.get(address).cloned())
    }

    /// Resolve the EC account mapped to an external account, creating one
    /// when the external account is not yet registered anywhere.
    ///
    /// Returns `Ok(None)` for a registered account with no mapping: minting a
    /// new key there would silently diverge from the key its counterparties
    /// already hold.
    pub async fn get_or_create_ec_account(
        &self,
        external: &ExternalAccount,
    ) -> Result<Option<EcAccount>, KeyManagerError> {
        let mut slot = self.unlocked.lock().await;
        let unlocked = self.unlock(&mut slot).await?;
        let key = mapping_key(&external.address);

        if let Some(mapped) = self.kv.get(&key).await? {
            let ec_address: Address = mapped
                .parse()
                .map_err(|_| KeyManagerError::CorruptMapping(external.address, mapped.clone()))?;
            return match unlocked.keystore.get(&ec_address) {
                Some(account) => Ok(Some(account.clone())),
                None => Err(KeyManagerError::MissingAccount(ec_address)),
            };
        }

        if external.role == AccountRole::Registered {
            tracing::warn!(
                "no ec account for registered account {}; refusing to create one",
                external.address
            );
            return Ok(None);
        }

        let account = self.generate_into(unlocked).await?;
        self.kv
            .set(&key, &account.address().to_string())
            .await?;
        tracing::info!(
            "mapped external account {} to ec account {}",
            external.address,
            account.address()
        );
        Ok(Some(account))
    }
}

#[async_trait]
impl PrivateKeySource for KeyManager {
    async fn ec_account(&self, address: &Address) -> Result<Option<EcAccount>, KeyManagerError> {
        KeyManager::ec_account(self, address).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::keystore::StaticPassword;
    use crate::kv::MemoryKv;

    fn manager(kv: &MemoryKv, password: &str) -> KeyManager {
        KeyManager::new(Arc::new(kv.clone()), Arc::new(StaticPassword::new(password)))
    }

    fn external(role: AccountRole) -> ExternalAccount {
        ExternalAccount {
            address: SecretKey::generate().unwrap().public().address(),
            role,
        }
    }

    #[tokio::test]
    async fn test_wallet_created_and_persisted() {
        let kv = MemoryKv::new();
        let manager = manager(&kv, "secret");
        assert!(manager.wallet().await.unwrap().is_empty());
        assert!(kv.has(KEYSTORE_KEY).await.unwrap());
    }

    #[tokio::test]
    async fn test_generated_account_survives_restart() {
        let kv = MemoryKv::new();
        let account = manager(&kv, "secret").generate_ec_account().await.unwrap();

        let restarted = manager(&kv, "secret");
        assert_eq!(
            restarted.ec_account(&account.address()).await.unwrap(),
            Some(account)
        );
    }

    #[tokio::test]
    async fn test_wrong_password_fails() {
        let kv = MemoryKv::new();
        manager(&kv, "secret").generate_ec_account().await.unwrap();
        assert!(matches!(
            manager(&kv, "guess").wallet().await,
            Err(KeyManagerError::Authentication)
        ));
    }

    #[tokio::test]
    async fn test_get_or_create_is_stable() {
        let kv = MemoryKv::new();
        let manager = manager(&kv, "secret");
        let owner = external(AccountRole::Unregistered);

        let first = manager.get_or_create_ec_account(&owner).await.unwrap().unwrap();
        let second = manager.get_or_create_ec_account(&owner).await.unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(manager.wallet().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_registered_without_mapping_returns_none() {
        let kv = MemoryKv::new();
        let manager = manager(&kv, "secret");
        let tenant = external(AccountRole::Registered);
        assert_eq!(manager.get_or_create_ec_account(&tenant).await.unwrap(), None);
        assert!(manager.wallet().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_mapping_fails_closed() {
        let kv = MemoryKv::new();
        let manager = manager(&kv, "secret");
        let owner = external(AccountRole::Unregistered);
        kv.set(&mapping_key(&owner.address), "garbage").await.unwrap();
        assert!(matches!(
            manager.get_or_create_ec_account(&owner).await,
            Err(KeyManagerError::CorruptMapping(..))
        ));

        let dangling = SecretKey::generate().unwrap().public().address();
        kv.set(&mapping_key(&owner.address), &dangling.to_string())
            .await
            .unwrap();
        assert!(matches!(
            manager.get_or_create_ec_account(&owner).await,
            Err(KeyManagerError::MissingAccount(a)) if a == dangling
        ));
        assert!(manager.wallet().await.unwrap().is_empty());
    }
}
