//! Two tenants share one encrypted document published under a mutable name

mod common;

use std::sync::Arc;
use std::time::Duration;

use ::common::content::{download_document, upload_document, ContentHash, MemoryContentStore};
use ::common::crypto::SecretKey;
use ::common::keystore::{KeyManager, StaticPassword};
use ::common::kv::MemoryKv;
use ::common::pubsub::{BusConfig, MemoryPubSub, PubSubBus};
use parking_lot::Mutex;
use serde_json::{json, Value};

#[tokio::test]
async fn test_shared_lease_round_trip() {
    let server = common::TestServer::start().await;
    let blobs = MemoryContentStore::new();
    let publisher = common::account();
    let (a, b) = (common::account(), common::account());

    let lease = json!({"rent": 1200});
    let hash = upload_document(&blobs, &lease, &[*a.public(), *b.public()])
        .await
        .unwrap();
    server
        .client()
        .publish("apt-42", &hash.to_string(), &publisher)
        .await
        .unwrap();

    for reader in [&a, &b] {
        let pointer = server.client().resolve("apt-42").await.unwrap();
        let hash: ContentHash = pointer.parse().unwrap();
        let recovered: Value = download_document(&blobs, &hash, &[reader.secret().clone()])
            .await
            .unwrap();
        assert_eq!(recovered, lease);
    }

    let stranger = SecretKey::generate().unwrap();
    assert!(download_document::<Value>(&blobs, &hash, &[stranger])
        .await
        .is_err());
}

#[tokio::test]
async fn test_new_version_announced_over_pubsub() {
    let server = common::TestServer::start().await;
    let client = server.client();
    let blobs = MemoryContentStore::new();
    let backend = MemoryPubSub::new();
    let config = BusConfig {
        pull_interval: Duration::from_millis(20),
        propagation_delay: Duration::ZERO,
        ..Default::default()
    };

    // the tenant's side: a key manager owning its account and a bus client
    let tenant_kv = MemoryKv::new();
    let tenant_keys = Arc::new(KeyManager::new(
        Arc::new(tenant_kv.clone()),
        Arc::new(StaticPassword::new("tenant")),
    ));
    let tenant = tenant_keys.generate_ec_account().await.unwrap();
    let tenant_bus = PubSubBus::new(
        Arc::new(backend.clone()),
        tenant_keys.clone(),
        Arc::new(tenant_kv),
        config.clone(),
    );
    let announced = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = announced.clone();
    tenant_bus.register_topic_processor(
        "apt-42",
        move |message: &str, _topic: &str| -> anyhow::Result<()> {
            sink.lock().push(message.to_string());
            Ok(())
        },
    );
    tenant_bus
        .subscribe_to_topic("apt-42", Some(tenant.address()))
        .await
        .unwrap();

    // the landlord publishes v1, then v2, and announces the move
    let landlord = common::account();
    let landlord_bus = PubSubBus::new(
        Arc::new(backend.clone()),
        Arc::new(KeyManager::new(
            Arc::new(MemoryKv::new()),
            Arc::new(StaticPassword::new("landlord")),
        )),
        Arc::new(MemoryKv::new()),
        config,
    );
    let v1 = upload_document(&blobs, &json!({"rent": 1200}), &[*tenant.public()])
        .await
        .unwrap();
    client
        .publish("apt-42", &v1.to_string(), &landlord)
        .await
        .unwrap();
    let v2 = upload_document(&blobs, &json!({"rent": 1250}), &[*tenant.public()])
        .await
        .unwrap();
    client
        .update("apt-42", &v2.to_string(), &landlord)
        .await
        .unwrap();
    landlord_bus
        .publish_message(&v2.to_string(), "apt-42", &[*tenant.public()])
        .await
        .unwrap();

    tenant_bus.poll_once().await.unwrap();
    let announced = announced.lock().clone();
    assert_eq!(announced, vec![v2.to_string()]);

    let pointer = client.resolve("apt-42").await.unwrap();
    assert_eq!(pointer, announced[0]);
    let current: Value = download_document(
        &blobs,
        &pointer.parse().unwrap(),
        &[tenant.secret().clone()],
    )
    .await
    .unwrap();
    assert_eq!(current, json!({"rent": 1250}));
}
