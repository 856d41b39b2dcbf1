use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use parking_lot::Mutex;

use super::backend::{PubSubBackend, ReceivedMessage};
use super::PubSubError;

#[derive(Debug, Default)]
struct MemorySubscription {
    topic: String,
    pending: VecDeque<ReceivedMessage>,
    outstanding: HashMap<String, ReceivedMessage>,
}

#[derive(Debug, Default)]
struct Inner {
    subscriptions: HashMap<String, MemorySubscription>,
    next_id: u64,
    offline: bool,
    drop_acks: bool,
}

/// In-process bus: every publish fans out to each subscription of the topic
///
/// Pulled but unacknowledged messages stay outstanding until acked or
/// handed out again with [`MemoryPubSub::redeliver_unacked`].
#[derive(Debug, Clone, Default)]
pub struct MemoryPubSub {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryPubSub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an already-encoded payload, bypassing any encryption.
    pub fn deliver_raw(&self, topic: &str, payload: &str) {
        let data = base64::engine::general_purpose::STANDARD.encode(payload);
        self.fan_out(topic, data);
    }

    fn fan_out(&self, topic: &str, data: String) {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let message_id = inner.next_id.to_string();
        let mut delivered = 0;
        for (subscription_id, subscription) in inner.subscriptions.iter_mut() {
            if subscription.topic != topic {
                continue;
            }
            subscription.pending.push_back(ReceivedMessage {
                ack_id: format!("{}-{}", subscription_id, message_id),
                message_id: message_id.clone(),
                data: data.clone(),
            });
            delivered += 1;
        }
        tracing::debug!("message {} on {} fanned out to {} subscriptions", message_id, topic, delivered);
    }

    /// Move every outstanding message back to the front of its queue.
    pub fn redeliver_unacked(&self) {
        let mut inner = self.inner.lock();
        for subscription in inner.subscriptions.values_mut() {
            let mut outstanding: Vec<_> = subscription.outstanding.drain().map(|(_, m)| m).collect();
            outstanding.sort_by_key(|m| std::cmp::Reverse(m.message_id.parse::<u64>().unwrap_or(0)));
            for message in outstanding {
                subscription.pending.push_front(message);
            }
        }
    }

    /// While offline every call fails, as an unreachable backend would.
    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().offline = offline;
    }

    /// While set, acknowledgements succeed but are forgotten.
    pub fn set_drop_acks(&self, drop_acks: bool) {
        self.inner.lock().drop_acks = drop_acks;
    }

    pub fn outstanding(&self, subscription_id: &str) -> usize {
        self.inner
            .lock()
            .subscriptions
            .get(subscription_id)
            .map(|s| s.outstanding.len())
            .unwrap_or(0)
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.lock().subscriptions.len()
    }

    fn check_online(inner: &Inner) -> Result<(), PubSubError> {
        if inner.offline {
            return Err(PubSubError::Backend(503, "memory pubsub is offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl PubSubBackend for MemoryPubSub {
    async fn create_subscription(&self, subscription_id: &str, topic: &str) -> Result<(), PubSubError> {
        let mut inner = self.inner.lock();
        Self::check_online(&inner)?;
        let subscription = inner
            .subscriptions
            .entry(subscription_id.to_string())
            .or_insert_with(|| MemorySubscription {
                topic: topic.to_string(),
                ..Default::default()
            });
        if subscription.topic != topic {
            return Err(PubSubError::Backend(
                409,
                format!("subscription {} is bound to another topic", subscription_id),
            ));
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, data: String) -> Result<(), PubSubError> {
        Self::check_online(&self.inner.lock())?;
        self.fan_out(topic, data);
        Ok(())
    }

    async fn pull(
        &self,
        subscription_id: &str,
        max_messages: usize,
    ) -> Result<Vec<ReceivedMessage>, PubSubError> {
        let mut inner = self.inner.lock();
        Self::check_online(&inner)?;
        let subscription = inner
            .subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| PubSubError::UnknownSubscription(subscription_id.to_string()))?;
        let count = max_messages.min(subscription.pending.len());
        let pulled: Vec<_> = subscription.pending.drain(..count).collect();
        for message in &pulled {
            subscription
                .outstanding
                .insert(message.ack_id.clone(), message.clone());
        }
        Ok(pulled)
    }

    async fn acknowledge(&self, subscription_id: &str, ack_ids: Vec<String>) -> Result<(), PubSubError> {
        let mut inner = self.inner.lock();
        Self::check_online(&inner)?;
        if inner.drop_acks {
            return Ok(());
        }
        let subscription = inner
            .subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| PubSubError::UnknownSubscription(subscription_id.to_string()))?;
        for ack_id in ack_ids {
            subscription.outstanding.remove(&ack_id);
        }
        Ok(())
    }
}
