//! Integration tests for the hub and generator working together.
//!
//! These drive the real [`Hub`] actor with records produced by the real
//! [`Generator`], using in-memory subscriber queues in place of sockets.

#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

use std::collections::BTreeMap;
use std::time::Duration;

use mantle_core::config::HubConfig;
use mantle_core::generator::{Generator, GeneratorStop, ReferenceCurve};
use mantle_core::hub::{Frame, Hub, SubscriberHandle};
use mantle_types::{PhaseThresholds, StateRecord, SubscriberId};
use tokio::sync::{mpsc, watch};

fn hub_config() -> HubConfig {
    HubConfig {
        command_buffer: 16,
        subscriber_buffer: 64,
        send_timeout_ms: 50,
    }
}

fn generator() -> Generator<ReferenceCurve> {
    Generator::new(
        ReferenceCurve::default(),
        PhaseThresholds::default(),
        Duration::from_millis(60),
    )
}

fn decode(frame: &Frame) -> StateRecord {
    serde_json::from_str(frame.as_str()).unwrap()
}

fn drain(rx: &mut mpsc::Receiver<Frame>) -> Vec<u64> {
    let mut cycles = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        cycles.push(decode(&frame).cycle());
    }
    cycles
}

#[tokio::test]
async fn abrupt_disconnect_mid_stream() {
    let (hub, _task) = Hub::spawn(&hub_config());
    let mut generator = generator();

    let (s1, mut rx1) = SubscriberHandle::channel(64);
    let (s2, mut rx2) = SubscriberHandle::channel(64);
    let (s3, mut rx3) = SubscriberHandle::channel(64);
    hub.register(s1).await;
    hub.register(s2).await;
    hub.register(s3).await;

    for _ in 0..5 {
        hub.publish(generator.next_record().unwrap()).await.unwrap();
    }
    hub.stats().await.unwrap();
    let seen_by_2 = drain(&mut rx2);
    drop(rx2);

    for _ in 0..5 {
        hub.publish(generator.next_record().unwrap()).await.unwrap();
    }

    let stats = hub.stats().await.unwrap();
    assert_eq!(stats.subscribers, 2);
    assert_eq!(stats.dropped_subscribers, 1);

    let expected: Vec<u64> = (1..=10).collect();
    assert_eq!(drain(&mut rx1), expected);
    assert_eq!(drain(&mut rx3), expected);
    assert_eq!(seen_by_2, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn membership_decides_delivery() {
    // Deterministic interleaving of register, unregister, and publish,
    // checked against a model of the subscriber set.
    let (hub, _task) = Hub::spawn(&hub_config());
    let mut generator = generator();

    let mut live: BTreeMap<SubscriberId, mpsc::Receiver<Frame>> = BTreeMap::new();
    let mut expected: BTreeMap<SubscriberId, Vec<u64>> = BTreeMap::new();
    let mut retired: Vec<(SubscriberId, mpsc::Receiver<Frame>)> = Vec::new();
    let mut received: BTreeMap<SubscriberId, Vec<u64>> = BTreeMap::new();

    let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
    for _ in 0..300 {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        match seed % 4 {
            0 => {
                let (handle, rx) = SubscriberHandle::channel(512);
                let id = handle.id();
                hub.register(handle).await;
                live.insert(id, rx);
                expected.insert(id, Vec::new());
            }
            1 => {
                if let Some(id) = live.keys().next().copied() {
                    hub.unregister(id).await;
                    let rx = live.remove(&id).unwrap();
                    retired.push((id, rx));
                }
            }
            _ => {
                let record = generator.next_record().unwrap();
                hub.publish(record).await.unwrap();
                for id in live.keys() {
                    expected.get_mut(id).unwrap().push(record.cycle());
                }
            }
        }
    }
    // Unregistering something never registered changes nothing.
    hub.unregister(SubscriberId::new()).await;
    let stats = hub.stats().await.unwrap();
    assert_eq!(stats.subscribers, live.len());
    assert_eq!(stats.dropped_subscribers, 0);

    for (id, mut rx) in live.into_iter().chain(retired) {
        received.insert(id, drain(&mut rx));
    }
    assert_eq!(received, expected);
}

#[tokio::test(start_paused = true)]
async fn timed_generator_feeds_hub() {
    let (hub, hub_task) = Hub::spawn(&hub_config());
    let (subscriber, mut rx) = SubscriberHandle::channel(64);
    hub.register(subscriber).await;

    let (stop_tx, stop_rx) = watch::channel(false);
    let publisher = hub.clone();
    let generator_task =
        tokio::spawn(async move { generator().run(&publisher, stop_rx).await });

    tokio::time::sleep(Duration::from_millis(600)).await;
    stop_tx.send(true).unwrap();
    let report = generator_task.await.unwrap();
    assert_eq!(report.stop, GeneratorStop::Shutdown);
    assert!(report.published >= 5);

    hub.shutdown().await;
    let hub_report = hub_task.await.unwrap();
    assert_eq!(hub_report.stats.published, report.published);
    assert_eq!(hub_report.closed_on_shutdown, 1);

    let cycles = drain(&mut rx);
    let expected: Vec<u64> = (1..=report.published).collect();
    assert_eq!(cycles, expected);
}
