//! Concurrency tests for the presence registry, group tracker, and router.

use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::Barrier;

use bazaar_server::realtime::{ConnectionHandle, OutboundEvent, RealtimeState};

fn open_connection(
    state: &RealtimeState,
    user_id: &str,
) -> (u64, UnboundedReceiver<OutboundEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = ConnectionHandle::new(tx);
    let id = handle.id();
    assert!(state.connect(user_id, handle));
    (id, rx)
}

fn drain(rx: &mut UnboundedReceiver<OutboundEvent>) -> Vec<OutboundEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn concurrent_reconnects_leave_exactly_one_connection() {
    let state = Arc::new(RealtimeState::new());
    let barrier = Arc::new(Barrier::new(10));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let state = Arc::clone(&state);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let (tx, rx) = mpsc::unbounded_channel();
            let handle = ConnectionHandle::new(tx);
            let id = handle.id();
            state.connect("u1", handle);
            (id, rx)
        }));
    }

    let mut connections = Vec::new();
    for handle in handles {
        connections.push(handle.await.expect("task failed"));
    }

    // Exactly one connection won the slot
    let winner = state
        .registry
        .lookup("u1")
        .expect("user should be registered")
        .id();
    assert!(connections.iter().any(|(id, _)| *id == winner));
    assert_eq!(state.registry.len(), 1);

    // Every superseded connection's disconnect is stale and changes nothing
    for (id, _rx) in &connections {
        if *id != winner {
            state.disconnect("u1", *id);
            assert!(state.registry.lookup("u1").is_some());
        }
    }

    // The winner's disconnect empties the registry
    state.disconnect("u1", winner);
    assert!(state.registry.lookup("u1").is_none());
}

#[tokio::test]
async fn concurrent_subscribes_and_disconnect_never_leak_membership() {
    // A subscribe racing a disconnect must resolve to one of the two serial
    // orders: subscribed-then-removed, or removed-then-subscribed. Either
    // way, after the user's final disconnect nothing may linger.
    for _ in 0..50 {
        let state = Arc::new(RealtimeState::new());
        let (conn_id, _rx) = open_connection(&state, "u1");
        let barrier = Arc::new(Barrier::new(2));

        let subscriber = {
            let state = Arc::clone(&state);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                for i in 0..20 {
                    state.join_group(&format!("g{i}"), "u1");
                }
            })
        };
        let disconnector = {
            let state = Arc::clone(&state);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                state.disconnect("u1", conn_id);
            })
        };

        subscriber.await.expect("subscriber task failed");
        disconnector.await.expect("disconnector task failed");

        for i in 0..20 {
            assert!(
                !state.groups.members_of(&format!("g{i}")).contains("u1"),
                "membership leaked for g{i}"
            );
        }
    }
}

#[tokio::test]
async fn group_fanout_under_concurrent_sends_delivers_everything_in_order() {
    let state = Arc::new(RealtimeState::new());
    let (_id_a, mut rx_a) = open_connection(&state, "a");
    state.join_group("g1", "a");
    drain(&mut rx_a);

    let barrier = Arc::new(Barrier::new(4));
    let mut senders = Vec::new();
    for task in 0..4 {
        let state = Arc::clone(&state);
        let barrier = Arc::clone(&barrier);
        senders.push(tokio::spawn(async move {
            barrier.wait().await;
            for i in 0..25 {
                state
                    .router
                    .deliver_group("g1", serde_json::json!({"task": task, "seq": i}));
            }
        }));
    }
    for sender in senders {
        sender.await.expect("sender task failed");
    }

    let events = drain(&mut rx_a);
    assert_eq!(events.len(), 100);

    // Per-connection FIFO: each task's messages arrive in its send order
    let mut last_seq = [-1i64; 4];
    for event in &events {
        let OutboundEvent::NewGroupMessage { message, .. } = event else {
            panic!("unexpected event: {event:?}");
        };
        let task = message["task"].as_i64().unwrap() as usize;
        let seq = message["seq"].as_i64().unwrap();
        assert!(seq > last_seq[task], "out-of-order delivery for task {task}");
        last_seq[task] = seq;
    }
}

#[tokio::test]
async fn presence_roster_is_consistent_after_concurrent_churn() {
    let state = Arc::new(RealtimeState::new());
    let barrier = Arc::new(Barrier::new(8));

    let mut tasks = Vec::new();
    for user in 0..8 {
        let state = Arc::clone(&state);
        let barrier = Arc::clone(&barrier);
        tasks.push(tokio::spawn(async move {
            barrier.wait().await;
            let user_id = format!("user-{user}");
            let (tx, rx) = mpsc::unbounded_channel();
            let handle = ConnectionHandle::new(tx);
            let id = handle.id();
            state.connect(&user_id, handle);
            if user % 2 == 0 {
                state.disconnect(&user_id, id);
            }
            rx
        }));
    }

    let mut receivers = Vec::new();
    for task in tasks {
        receivers.push(task.await.expect("churn task failed"));
    }

    let mut online = state.registry.active_user_ids();
    online.sort();
    assert_eq!(
        online,
        vec!["user-1", "user-3", "user-5", "user-7"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()
    );
    drop(receivers);
}
