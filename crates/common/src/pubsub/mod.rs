//! Topic-based message delivery
//!
//! Messages are published to a topic and pulled from per-client
//! subscriptions. A message meant for specific readers is encrypted and
//! carries a `"VALID "` prefix inside the ciphertext: a successful decryption
//! that does not start with it is treated as garbage and dropped.

mod backend;
mod bus;
mod http;
mod memory;
mod seen;
mod subscription;

use crate::crypto::EnvelopeError;
use crate::keystore::KeyManagerError;
use crate::kv::KvError;

pub use backend::{PubSubBackend, ReceivedMessage};
pub use bus::{BusConfig, PollOutcome, PubSubBus, TopicProcessor};
pub use http::{HttpPubSubBackend, StaticTokenProvider, TokenProvider};
pub use memory::MemoryPubSub;
pub use seen::SeenWindow;
pub use subscription::{Subscription, SubscriptionStore, SUBSCRIPTIONS_KEY};

/// Marker prepended to encrypted payloads
pub const SENTINEL: &str = "VALID ";
/// Messages fetched per pull
pub const MAX_MESSAGES: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum PubSubError {
    #[error("pubsub backend returned {0}: {1}")]
    Backend(u16, String),
    #[error("pubsub http error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("pubsub url error: {0}")]
    Url(#[from] url::ParseError),
    #[error("unknown subscription: {0}")]
    UnknownSubscription(String),
    #[error("pubsub token error: {0}")]
    Token(String),
    #[error("subscriptions are corrupt: {0}")]
    CorruptSubscriptions(#[from] serde_json::Error),
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    #[error(transparent)]
    Keys(#[from] KeyManagerError),
    #[error("pubsub error: {0}")]
    Default(#[from] anyhow::Error),
}
