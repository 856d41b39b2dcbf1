use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::crypto::Address;
use crate::kv::KvStore;

use super::PubSubError;

/// KV key holding every subscription, as a JSON object keyed by topic
pub const SUBSCRIPTIONS_KEY: &str = "topic_subscriptions";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub topic: String,
    /// EC accounts whose keys are tried on every message, in insertion
    /// order and without duplicates. Empty means messages are plaintext.
    pub key_addresses: Vec<Address>,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, key_address: Option<Address>) -> Result<Self, PubSubError> {
        let mut suffix = [0u8; 8];
        getrandom::getrandom(&mut suffix)
            .map_err(|e| anyhow::anyhow!("failed to generate subscription id: {}", e))?;
        Ok(Self {
            id: format!("sub-{}", hex::encode(suffix)),
            topic: topic.into(),
            key_addresses: key_address.into_iter().collect(),
        })
    }

    /// Add `address` unless already present. Returns whether it was added.
    pub fn add_key_address(&mut self, address: Address) -> bool {
        if self.key_addresses.contains(&address) {
            return false;
        }
        self.key_addresses.push(address);
        true
    }

    pub fn is_plaintext(&self) -> bool {
        self.key_addresses.is_empty()
    }
}

/// Durable subscriptions, persisted in the local KV store
#[derive(Clone, Debug)]
pub struct SubscriptionStore {
    kv: Arc<dyn KvStore>,
}

impl SubscriptionStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub async fn load(&self) -> Result<BTreeMap<String, Subscription>, PubSubError> {
        match self.kv.get(SUBSCRIPTIONS_KEY).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(BTreeMap::new()),
        }
    }

    pub async fn get(&self, topic: &str) -> Result<Option<Subscription>, PubSubError> {
        Ok(self.load().await?.remove(topic))
    }

    /// Insert or replace the subscription for its topic
    pub async fn put(&self, subscription: Subscription) -> Result<(), PubSubError> {
        let mut all = self.load().await?;
        all.insert(subscription.topic.clone(), subscription);
        self.kv
            .set(SUBSCRIPTIONS_KEY, &serde_json::to_string(&all)?)
            .await?;
        Ok(())
    }
}
