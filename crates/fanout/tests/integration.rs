//! Integration tests for the fanout backplane.
//!
//! Requires a running Redis with `REDIS_URL` env var set. Run with:
//!
//! ```bash
//! REDIS_URL="redis://localhost:6379" \
//!   cargo test -p herald-fanout --test integration -- --ignored --nocapture
//! ```

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use herald_fanout::{ConnectionRegistry, Fanout, WireMessage};

async fn make_fanout() -> Arc<Fanout> {
    let redis_url = std::env::var("REDIS_URL").expect("REDIS_URL required");
    let redis = herald_common::redis_pool::create_redis_pool(&redis_url)
        .await
        .unwrap();
    let fanout = Arc::new(Fanout::new(Arc::new(ConnectionRegistry::new()), redis));

    let subscriber = Arc::clone(&fanout);
    tokio::spawn(subscriber.run_subscriber(redis_url));

    // Give the subscription a moment to establish.
    for _ in 0..50 {
        if fanout.backplane_healthy() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(fanout.backplane_healthy(), "subscription never established");
    fanout
}

/// Recipient with connections on two different processes: one publish
/// reaches both, exactly once each, and nobody else.
#[tokio::test]
#[ignore]
async fn test_cross_process_fanout() {
    let process_a = make_fanout().await;
    let process_b = make_fanout().await;

    let recipient = Uuid::new_v4();
    let bystander = Uuid::new_v4();

    let mut rx_a = process_a.registry().add(Uuid::new_v4(), recipient).await;
    let mut rx_b = process_b.registry().add(Uuid::new_v4(), recipient).await;
    let mut rx_bystander = process_b.registry().add(Uuid::new_v4(), bystander).await;

    process_a
        .publish_to_user(recipient, &WireMessage::connection_successful())
        .await;

    let got_a = tokio::time::timeout(Duration::from_secs(5), rx_a.recv())
        .await
        .expect("process A connection should receive")
        .unwrap();
    let got_b = tokio::time::timeout(Duration::from_secs(5), rx_b.recv())
        .await
        .expect("process B connection should receive")
        .unwrap();

    assert!(got_a.contains("connection_successful"));
    assert_eq!(got_a, got_b);

    // Exactly one copy each, zero for other users.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(rx_a.try_recv().is_err());
    assert!(rx_b.try_recv().is_err());
    assert!(rx_bystander.try_recv().is_err());
}

/// Publishing to a user with zero connections anywhere completes without error.
#[tokio::test]
#[ignore]
async fn test_publish_to_offline_user_is_ok() {
    let fanout = make_fanout().await;
    fanout
        .publish_to_user(Uuid::new_v4(), &WireMessage::connection_successful())
        .await;
}
