use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch::Receiver as WatchReceiver;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::crypto::{decrypt_any, encrypt_multi, encrypt_single, Address, PublicKey, SecretKey};
use crate::keystore::PrivateKeySource;
use crate::kv::KvStore;

use super::backend::{PubSubBackend, ReceivedMessage};
use super::seen::SeenWindow;
use super::subscription::{Subscription, SubscriptionStore};
use super::{PubSubError, MAX_MESSAGES, SENTINEL};

/// Handler for the messages of one topic
///
/// Called with the (decrypted, sentinel-stripped) message and the topic. An
/// error is logged; the message is still acknowledged and will not be
/// offered again.
pub trait TopicProcessor: Send + Sync + 'static {
    fn process(&self, message: &str, topic: &str) -> anyhow::Result<()>;
}

impl<F> TopicProcessor for F
where
    F: Fn(&str, &str) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn process(&self, message: &str, topic: &str) -> anyhow::Result<()> {
        self(message, topic)
    }
}

#[derive(Clone, Debug)]
pub struct BusConfig {
    pub pull_interval: Duration,
    pub max_messages: usize,
    /// Pause after creating a subscription so the backend can activate it
    pub propagation_delay: Duration,
    /// Ceiling for the delay after consecutive failed poll cycles
    pub max_backoff: Duration,
    pub seen_capacity: u64,
    pub seen_max_age: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            pull_interval: Duration::from_millis(2000),
            max_messages: MAX_MESSAGES,
            propagation_delay: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
            seen_capacity: SeenWindow::DEFAULT_CAPACITY,
            seen_max_age: SeenWindow::DEFAULT_MAX_AGE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Completed { dispatched: usize },
    /// Another cycle was still in flight
    Skipped,
}

struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
    until: Option<Instant>,
}

impl Backoff {
    fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: 0,
            until: None,
        }
    }

    fn blocked(&self, now: Instant) -> bool {
        self.until.map(|until| now < until).unwrap_or(false)
    }

    fn fail(&mut self, now: Instant) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let wait = self
            .base
            .saturating_mul(2u32.saturating_pow(self.failures))
            .min(self.max);
        self.until = Some(now + wait);
        wait
    }

    fn reset(&mut self) {
        self.failures = 0;
        self.until = None;
    }
}

struct BusInner {
    backend: Arc<dyn PubSubBackend>,
    keys: Arc<dyn PrivateKeySource>,
    subscriptions: SubscriptionStore,
    processors: RwLock<HashMap<String, Arc<dyn TopicProcessor>>>,
    seen: SeenWindow,
    poll_guard: tokio::sync::Mutex<()>,
    subscribe_lock: tokio::sync::Mutex<()>,
    config: BusConfig,
}

/// Publish/subscribe client for one process
///
/// Cheap to clone; all clones share processors, subscriptions and the
/// window of already handled message ids.
#[derive(Clone)]
pub struct PubSubBus {
    inner: Arc<BusInner>,
}

impl PubSubBus {
    pub fn new(
        backend: Arc<dyn PubSubBackend>,
        keys: Arc<dyn PrivateKeySource>,
        kv: Arc<dyn KvStore>,
        config: BusConfig,
    ) -> Self {
        let seen = SeenWindow::new(config.seen_capacity, config.seen_max_age);
        Self {
            inner: Arc::new(BusInner {
                backend,
                keys,
                subscriptions: SubscriptionStore::new(kv),
                processors: RwLock::new(HashMap::new()),
                seen,
                poll_guard: tokio::sync::Mutex::new(()),
                subscribe_lock: tokio::sync::Mutex::new(()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    pub async fn subscriptions(&self) -> Result<BTreeMap<String, Subscription>, PubSubError> {
        self.inner.subscriptions.load().await
    }

    pub fn seen_count(&self) -> u64 {
        self.inner.seen.len()
    }

    /// Restore persisted subscriptions and spawn the poll loop.
    ///
    /// Register topic processors before calling this. The loop stops when
    /// `shutdown_rx` fires.
    pub async fn start(&self, shutdown_rx: WatchReceiver<()>) -> Result<JoinHandle<()>, PubSubError> {
        let restored = self.inner.subscriptions.load().await?;
        for subscription in restored.values() {
            if let Err(e) = self
                .inner
                .backend
                .create_subscription(&subscription.id, &subscription.topic)
                .await
            {
                tracing::warn!(
                    "failed to restore subscription {} on {}: {}",
                    subscription.id,
                    subscription.topic,
                    e
                );
            }
        }
        tracing::info!("restored {} topic subscriptions", restored.len());

        let bus = self.clone();
        Ok(tokio::spawn(async move { bus.run(shutdown_rx).await }))
    }

    async fn run(self, mut shutdown_rx: WatchReceiver<()>) {
        let mut ticker = interval(self.inner.config.pull_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        let backoff = Arc::new(Mutex::new(Backoff::new(
            self.inner.config.pull_interval,
            self.inner.config.max_backoff,
        )));

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = ticker.tick() => {
                    if backoff.lock().blocked(Instant::now()) {
                        continue;
                    }
                    let bus = self.clone();
                    let backoff = backoff.clone();
                    tokio::spawn(async move {
                        match bus.poll_once().await {
                            Ok(PollOutcome::Skipped) => {
                                tracing::debug!("previous poll cycle still running, skipping tick");
                            }
                            Ok(PollOutcome::Completed { .. }) => backoff.lock().reset(),
                            Err(e) => {
                                let wait = backoff.lock().fail(Instant::now());
                                tracing::warn!("poll cycle failed, backing off {:?}: {}", wait, e);
                            }
                        }
                    });
                }
            }
        }

        tracing::info!("pubsub poll loop stopped");
    }

    /// Pull once from every subscription.
    ///
    /// Returns [`PollOutcome::Skipped`] without touching the backend when
    /// another cycle holds the poll guard. A subscription that fails does not
    /// stop the others; the first error is returned after all were tried.
    pub async fn poll_once(&self) -> Result<PollOutcome, PubSubError> {
        let Ok(_guard) = self.inner.poll_guard.try_lock() else {
            return Ok(PollOutcome::Skipped);
        };

        let subscriptions = self.inner.subscriptions.load().await?;
        let mut dispatched = 0;
        let mut first_error = None;
        for subscription in subscriptions.values() {
            match self.pull_from_subscription(subscription).await {
                Ok(n) => dispatched += n,
                Err(e) => {
                    tracing::error!("pull from {} failed: {}", subscription.id, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(PollOutcome::Completed { dispatched }),
        }
    }

    /// Subscribe to `topic`, adding `key_address` to the keys tried on its
    /// messages.
    ///
    /// An existing subscription for the topic is reused; only its key set
    /// changes. A new one gets a random id, is registered with the backend
    /// and persisted, and the call then waits for the propagation delay.
    pub async fn subscribe_to_topic(
        &self,
        topic: &str,
        key_address: Option<Address>,
    ) -> Result<Subscription, PubSubError> {
        let guard = self.inner.subscribe_lock.lock().await;

        if let Some(mut existing) = self.inner.subscriptions.get(topic).await? {
            if let Some(address) = key_address {
                if existing.add_key_address(address) {
                    self.inner.subscriptions.put(existing.clone()).await?;
                    tracing::info!("added key {} to subscription on {}", address, topic);
                }
            }
            return Ok(existing);
        }

        let subscription = Subscription::new(topic, key_address)?;
        self.inner
            .backend
            .create_subscription(&subscription.id, topic)
            .await?;
        self.inner.subscriptions.put(subscription.clone()).await?;
        tracing::info!("subscribed to {} as {}", topic, subscription.id);
        drop(guard);

        tokio::time::sleep(self.inner.config.propagation_delay).await;
        Ok(subscription)
    }

    /// Publish `plaintext` on `topic`.
    ///
    /// No recipients: sent as is. One: single envelope. Several: multi
    /// envelope. Encrypted payloads carry the sentinel prefix.
    pub async fn publish_message(
        &self,
        plaintext: &str,
        topic: &str,
        recipients: &[PublicKey],
    ) -> Result<(), PubSubError> {
        let payload = match recipients {
            [] => plaintext.to_string(),
            [recipient] => encrypt_single(&format!("{}{}", SENTINEL, plaintext), recipient)?.to_json()?,
            many => encrypt_multi(&format!("{}{}", SENTINEL, plaintext), many)?.to_json()?,
        };
        let data = base64::engine::general_purpose::STANDARD.encode(payload);
        self.inner.backend.publish(topic, data).await?;
        tracing::debug!("published to {} for {} recipients", topic, recipients.len());
        Ok(())
    }

    async fn collect_keys(&self, subscription: &Subscription) -> Result<Vec<SecretKey>, PubSubError> {
        let mut keys = Vec::with_capacity(subscription.key_addresses.len());
        for address in &subscription.key_addresses {
            match self.inner.keys.ec_account(address).await? {
                Some(account) => keys.push(account.secret().clone()),
                None => tracing::debug!("no key for {} on {}, skipping", address, subscription.topic),
            }
        }
        Ok(keys)
    }

    fn read_message(&self, subscription: &Subscription, keys: &[SecretKey], message: &ReceivedMessage) -> Option<String> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&message.data)
            .map_err(|e| tracing::warn!("message {} is not base64: {}", message.message_id, e))
            .ok()?;
        let data = String::from_utf8(decoded)
            .map_err(|e| tracing::warn!("message {} is not utf-8: {}", message.message_id, e))
            .ok()?;

        if subscription.is_plaintext() {
            return Some(data);
        }

        let plaintext = decrypt_any(&data, keys)?;
        match plaintext.strip_prefix(SENTINEL) {
            Some(text) => Some(text.to_string()),
            None => {
                tracing::warn!("message {} decrypted without sentinel", message.message_id);
                None
            }
        }
    }

    /// Pull one batch from `subscription`, dispatch what is new and readable,
    /// and acknowledge the whole batch.
    ///
    /// Returns the number of messages handed to a processor.
    pub async fn pull_from_subscription(&self, subscription: &Subscription) -> Result<usize, PubSubError> {
        let messages = self
            .inner
            .backend
            .pull(&subscription.id, self.inner.config.max_messages)
            .await?;
        if messages.is_empty() {
            return Ok(0);
        }
        tracing::debug!("pulled {} messages from {}", messages.len(), subscription.id);

        let keys = if subscription.is_plaintext() {
            Vec::new()
        } else {
            self.collect_keys(subscription).await?
        };

        let mut dispatched = 0;
        let mut ack_ids = Vec::with_capacity(messages.len());
        for message in &messages {
            ack_ids.push(message.ack_id.clone());
            if !self.inner.seen.first_sighting(&message.message_id) {
                tracing::debug!("skipping already handled message {}", message.message_id);
                continue;
            }

            match self.read_message(subscription, &keys, message) {
                Some(text) => {
                    if self.process_topic_message(&subscription.topic, &text) {
                        dispatched += 1;
                    }
                }
                None => tracing::debug!(
                    "message {} on {} is not readable with our keys, dropping",
                    message.message_id,
                    subscription.topic
                ),
            }
        }

        if let Err(e) = self
            .inner
            .backend
            .acknowledge(&subscription.id, ack_ids)
            .await
        {
            tracing::warn!("failed to acknowledge batch on {}: {}", subscription.id, e);
        }

        Ok(dispatched)
    }

    /// Register the processor for `topic`, replacing any previous one.
    pub fn register_topic_processor(&self, topic: impl Into<String>, processor: impl TopicProcessor) {
        self.inner
            .processors
            .write()
            .insert(topic.into(), Arc::new(processor));
    }

    /// Hand `message` to the processor of `topic`.
    ///
    /// Returns false when no processor is registered; the message is dropped.
    pub fn process_topic_message(&self, topic: &str, message: &str) -> bool {
        let processor = self.inner.processors.read().get(topic).cloned();
        let Some(processor) = processor else {
            tracing::warn!("no processor registered for topic {}, dropping message", topic);
            return false;
        };
        if let Err(e) = processor.process(message, topic) {
            tracing::error!("processor for {} failed, message is lost: {}", topic, e);
        }
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let start = Instant::now();
        let mut backoff = Backoff::new(Duration::from_secs(2), Duration::from_secs(10));
        assert!(!backoff.blocked(start));
        assert_eq!(backoff.fail(start), Duration::from_secs(4));
        assert_eq!(backoff.fail(start), Duration::from_secs(8));
        assert_eq!(backoff.fail(start), Duration::from_secs(10));
        assert!(backoff.blocked(start + Duration::from_secs(9)));
        assert!(!backoff.blocked(start + Duration::from_secs(11)));
        backoff.reset();
        assert!(!backoff.blocked(start));
    }
}
