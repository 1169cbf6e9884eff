//! Concurrency tests: registry churn and fan-out on a multi-threaded runtime.
//!
//! Subscribers join and leave from many tasks while payloads are dispatched
//! from others, the way the accept loop, read loops and feed reader share
//! one registry in a running hub.

use changecast::{Dispatcher, MemoryConnection, MemoryPeer, Payload, SubscriberRegistry};
use std::sync::Arc;
use std::time::{Duration, Instant};

const STABLE_SUBSCRIBERS: usize = 8;
const CHURN_TASKS: usize = 4;
const CHURN_PER_TASK: usize = 500;
const DISPATCHES: usize = 500;

async fn register_peers(registry: &SubscriberRegistry, count: usize) -> Vec<MemoryPeer> {
    let mut peers = Vec::with_capacity(count);
    for _ in 0..count {
        let (conn, peer) = MemoryConnection::pair();
        registry.register(conn, None).await.unwrap();
        peers.push(peer);
    }
    peers
}

fn numbered(messages: &[String], prefix: &str) -> Vec<usize> {
    messages
        .iter()
        .filter_map(|m| m.strip_prefix(prefix))
        .map(|n| n.parse().unwrap())
        .collect()
}

fn assert_increasing(sequence: &[usize]) {
    assert!(
        sequence.windows(2).all(|w| w[0] < w[1]),
        "frames out of order: {:?}",
        sequence
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_churn_during_dispatch() {
    let registry = Arc::new(SubscriberRegistry::new());
    let dispatcher = Dispatcher::new(Arc::clone(&registry), Some(Duration::from_secs(5)));
    let stable = register_peers(&registry, STABLE_SUBSCRIBERS).await;

    let start = Instant::now();

    let feed = tokio::spawn(async move {
        for i in 0..DISPATCHES {
            dispatcher.dispatch(&Payload::from(i.to_string())).await;
        }
    });

    let churn: Vec<_> = (0..CHURN_TASKS)
        .map(|task| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let mut peers = Vec::with_capacity(CHURN_PER_TASK);
                for i in 0..CHURN_PER_TASK {
                    let (conn, peer) = MemoryConnection::pair();
                    let subscriber = registry.register(conn, None).await.unwrap();
                    if (task + i) % 5 == 0 {
                        peer.fail_writes();
                    }
                    tokio::task::yield_now().await;

                    if i % 3 == 0 {
                        // A failed write and a disconnect racing to remove it.
                        let (first, second) =
                            tokio::join!(registry.remove(&subscriber), registry.remove(&subscriber));
                        assert!(!(first && second));
                    } else {
                        registry.remove(&subscriber).await;
                    }
                    assert!(!registry.contains(&subscriber));
                    peers.push(peer);
                }
                peers
            })
        })
        .collect();

    let mut churned = Vec::new();
    for task in churn {
        churned.extend(task.await.unwrap());
    }
    feed.await.unwrap();

    println!(
        "  {} dispatches with {} churned subscribers took {:.2}ms",
        DISPATCHES,
        churned.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    let expected: Vec<String> = (0..DISPATCHES).map(|i| i.to_string()).collect();
    for peer in &stable {
        assert_eq!(peer.messages(), expected);
        assert_eq!(peer.close_count(), 0);
    }

    for peer in &churned {
        assert_eq!(peer.close_count(), 1);
        assert_increasing(&numbered(&peer.messages(), ""));
    }

    assert_eq!(registry.len(), STABLE_SUBSCRIBERS);
    assert_eq!(registry.close().await, STABLE_SUBSCRIBERS);
    assert!(registry.is_empty());
    for peer in &stable {
        assert_eq!(peer.close_count(), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_dispatchers_keep_each_stream_ordered() {
    let registry = Arc::new(SubscriberRegistry::new());
    let peers = register_peers(&registry, 16).await;

    let streams: Vec<_> = ["a", "b", "c"]
        .into_iter()
        .map(|prefix| {
            let dispatcher = Dispatcher::new(Arc::clone(&registry), None);
            tokio::spawn(async move {
                for i in 0..200 {
                    dispatcher.dispatch(&Payload::from(format!("{prefix}{i}"))).await;
                }
            })
        })
        .collect();

    for stream in streams {
        stream.await.unwrap();
    }

    for peer in &peers {
        let messages = peer.messages();
        assert_eq!(messages.len(), 600);
        for prefix in ["a", "b", "c"] {
            let sequence = numbered(&messages, prefix);
            assert_eq!(sequence, (0..200).collect::<Vec<_>>());
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_close_races_with_registration() {
    let registry = Arc::new(SubscriberRegistry::new());

    let joiners: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let mut outcomes = Vec::new();
                for _ in 0..250 {
                    let (conn, peer) = MemoryConnection::pair();
                    let admitted = registry.register(conn, None).await.is_some();
                    outcomes.push((admitted, peer));
                    tokio::task::yield_now().await;
                }
                outcomes
            })
        })
        .collect();

    tokio::task::yield_now().await;
    registry.close().await;

    let mut outcomes = Vec::new();
    for joiner in joiners {
        outcomes.extend(joiner.await.unwrap());
    }

    // Anything admitted before the seal was cleared by close; anything after
    // was refused. Either way every connection ends up closed exactly once.
    assert!(registry.is_empty());
    assert!(registry.is_closed());
    for (_, peer) in &outcomes {
        assert_eq!(peer.close_count(), 1);
    }
    let refused = outcomes.iter().filter(|(admitted, _)| !admitted).count();
    println!("  {} of {} late registrations refused", refused, outcomes.len());
}
