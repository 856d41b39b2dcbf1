/**
 * Content addressing: hashes, store ids and
 *  the blob store contract, plus helpers to
 *  store and fetch (encrypted) JSON documents.
 */
pub mod content;
/**
 * Cryptographic types and operations.
 *  - secp256k1 accounts and signatures
 *  - single and multi recipient envelopes
 */
pub mod crypto;
/**
 * Password-protected keystore and the mapping
 *  from external accounts to EC accounts.
 */
pub mod keystore;
/**
 * Local string key-value persistence.
 */
pub mod kv;
/**
 * Topic subscriptions, polling and
 *  encrypted message dispatch.
 */
pub mod pubsub;

pub mod prelude {
    pub use crate::content::{ContentHash, ContentStore};
    pub use crate::crypto::{Address, EcAccount, Envelope, PublicKey, SecretKey, Signature};
    pub use crate::keystore::{AccountRole, ExternalAccount, KeyManager};
    pub use crate::kv::KvStore;
    pub use crate::pubsub::PubSubBus;
}
