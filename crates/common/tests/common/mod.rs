//! Shared test utilities for bus and document integration tests
#![allow(dead_code)]

pub mod stub;

use std::sync::Arc;
use std::time::Duration;

use common::crypto::EcAccount;
use common::keystore::{KeyManager, StaticPassword};
use common::kv::MemoryKv;
use common::pubsub::{BusConfig, MemoryPubSub, PubSubBus};
use parking_lot::Mutex;

/// One participant: its own local store, key manager and bus client
pub struct Party {
    pub kv: MemoryKv,
    pub keys: Arc<KeyManager>,
    pub bus: PubSubBus,
    pub account: EcAccount,
}

pub fn fast_config() -> BusConfig {
    BusConfig {
        pull_interval: Duration::from_millis(20),
        propagation_delay: Duration::ZERO,
        ..Default::default()
    }
}

/// Route `tracing` output through the test harness; RUST_LOG selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Set up a participant on `backend` with one freshly generated EC account
pub async fn party(backend: &MemoryPubSub) -> Party {
    init_tracing();
    let kv = MemoryKv::new();
    let keys = Arc::new(KeyManager::new(
        Arc::new(kv.clone()),
        Arc::new(StaticPassword::new("secret")),
    ));
    let account = keys.generate_ec_account().await.unwrap();
    let bus = PubSubBus::new(
        Arc::new(backend.clone()),
        keys.clone(),
        Arc::new(kv.clone()),
        fast_config(),
    );
    Party {
        kv,
        keys,
        bus,
        account,
    }
}

/// Register a processor on `topic` that records every message it receives
pub fn collect(bus: &PubSubBus, topic: &str) -> Arc<Mutex<Vec<String>>> {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    bus.register_topic_processor(topic, move |message: &str, _topic: &str| -> anyhow::Result<()> {
        sink.lock().push(message.to_string());
        Ok(())
    });
    received
}
