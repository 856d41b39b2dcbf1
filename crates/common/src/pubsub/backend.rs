use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::PubSubError;

/// A message as handed out by a pull
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedMessage {
    pub ack_id: String,
    pub message_id: String,
    /// Base64 of the published payload
    pub data: String,
}

/// Contract of the hosted message bus
#[async_trait]
pub trait PubSubBackend: Send + Sync + 'static {
    /// Create `subscription_id` on `topic`. Creating a subscription that
    /// already exists on the same topic succeeds.
    async fn create_subscription(&self, subscription_id: &str, topic: &str) -> Result<(), PubSubError>;

    /// Publish one base64 payload.
    async fn publish(&self, topic: &str, data: String) -> Result<(), PubSubError>;

    /// Return up to `max_messages` pending messages without waiting for more.
    async fn pull(
        &self,
        subscription_id: &str,
        max_messages: usize,
    ) -> Result<Vec<ReceivedMessage>, PubSubError>;

    async fn acknowledge(&self, subscription_id: &str, ack_ids: Vec<String>) -> Result<(), PubSubError>;
}
