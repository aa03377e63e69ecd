//! Unit tests for `WsManager`, the room-scoped connection hub.
//!
//! These tests exercise the hub directly with fake connections, without any
//! HTTP upgrades. They verify add/remove semantics, room membership,
//! originator exclusion, the bounded-queue overflow policy, and graceful
//! shutdown behaviour.

use assert_matches::assert_matches;
use axum::extract::ws::Message;
use syncsphere_api::ws::WsManager;
use syncsphere_core::collaboration::WS_SEND_QUEUE_CAPACITY;

// ---------------------------------------------------------------------------
// Test: new manager starts with zero connections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn new_manager_has_zero_connections() {
    let manager = WsManager::new();

    assert_eq!(manager.connection_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: add() and remove() maintain the connection count
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_and_remove_maintain_count() {
    let manager = WsManager::new();

    let _rx = manager.add("conn-1".to_string(), 1).await;
    assert_eq!(manager.connection_count().await, 1);

    manager.remove("conn-1").await;
    assert_eq!(manager.connection_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: remove() with unknown ID is a no-op
// ---------------------------------------------------------------------------

#[tokio::test]
async fn remove_unknown_id_is_noop() {
    let manager = WsManager::new();

    let _rx = manager.add("conn-1".to_string(), 1).await;
    manager.remove("nonexistent").await;

    assert_eq!(manager.connection_count().await, 1);
}

// ---------------------------------------------------------------------------
// Test: join() scopes broadcast delivery to the room
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_reaches_only_room_members() {
    let manager = WsManager::new();

    let mut rx1 = manager.add("conn-1".to_string(), 1).await;
    let mut rx2 = manager.add("conn-2".to_string(), 2).await;
    let mut rx3 = manager.add("conn-3".to_string(), 3).await;

    assert!(manager.join("conn-1", 10).await);
    assert!(manager.join("conn-2", 10).await);
    assert!(manager.join("conn-3", 99).await);

    let delivered = manager
        .broadcast_to_room(10, Message::Text("room ten".into()), None)
        .await;
    assert_eq!(delivered, 2);

    assert_matches!(rx1.try_recv(), Ok(Message::Text(t)) if t == "room ten");
    assert_matches!(rx2.try_recv(), Ok(Message::Text(t)) if t == "room ten");
    // The other room hears nothing.
    assert!(rx3.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Test: a connection that never joined a room receives no broadcasts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unjoined_connection_receives_nothing() {
    let manager = WsManager::new();

    let mut rx = manager.add("conn-1".to_string(), 1).await;

    let delivered = manager
        .broadcast_to_room(10, Message::Text("hello".into()), None)
        .await;
    assert_eq!(delivered, 0);
    assert!(rx.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Test: broadcast() skips the excluded originator
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_excludes_originator() {
    let manager = WsManager::new();

    let mut rx1 = manager.add("conn-1".to_string(), 1).await;
    let mut rx2 = manager.add("conn-2".to_string(), 2).await;
    manager.join("conn-1", 10).await;
    manager.join("conn-2", 10).await;

    let delivered = manager
        .broadcast_to_room(10, Message::Text("change".into()), Some("conn-1"))
        .await;
    assert_eq!(delivered, 1);

    assert!(rx1.try_recv().is_err());
    assert_matches!(rx2.try_recv(), Ok(Message::Text(t)) if t == "change");
}

// ---------------------------------------------------------------------------
// Test: leave() returns the room and stops delivery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn leave_stops_delivery_and_reports_room() {
    let manager = WsManager::new();

    let mut rx = manager.add("conn-1".to_string(), 1).await;
    manager.join("conn-1", 10).await;
    assert_eq!(manager.room_of("conn-1").await, Some(10));

    let left = manager.leave("conn-1").await;
    assert_eq!(left, Some(10));
    assert_eq!(manager.room_of("conn-1").await, None);

    // Still connected, but no longer addressed by room broadcasts.
    assert_eq!(manager.connection_count().await, 1);
    let delivered = manager
        .broadcast_to_room(10, Message::Text("gone".into()), None)
        .await;
    assert_eq!(delivered, 0);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn leave_without_join_returns_none() {
    let manager = WsManager::new();

    let _rx = manager.add("conn-1".to_string(), 1).await;
    assert_eq!(manager.leave("conn-1").await, None);
}

// ---------------------------------------------------------------------------
// Test: connections_in_room counts only that room
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connections_in_room_is_scoped() {
    let manager = WsManager::new();

    let _rx1 = manager.add("conn-1".to_string(), 1).await;
    let _rx2 = manager.add("conn-2".to_string(), 2).await;
    let _rx3 = manager.add("conn-3".to_string(), 3).await;
    manager.join("conn-1", 10).await;
    manager.join("conn-2", 10).await;
    manager.join("conn-3", 99).await;

    assert_eq!(manager.connections_in_room(10).await, 2);
    assert_eq!(manager.connections_in_room(99).await, 1);
    assert_eq!(manager.connections_in_room(7).await, 0);
}

// ---------------------------------------------------------------------------
// Test: send_to() delivers directly to one connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn send_to_reaches_one_connection() {
    let manager = WsManager::new();

    let mut rx1 = manager.add("conn-1".to_string(), 1).await;
    let mut rx2 = manager.add("conn-2".to_string(), 2).await;

    assert!(manager.send_to("conn-1", Message::Text("just you".into())).await);

    assert_matches!(rx1.try_recv(), Ok(Message::Text(t)) if t == "just you");
    assert!(rx2.try_recv().is_err());
}

#[tokio::test]
async fn send_to_unknown_connection_returns_false() {
    let manager = WsManager::new();

    assert!(!manager.send_to("ghost", Message::Text("anyone?".into())).await);
}

// ---------------------------------------------------------------------------
// Test: a slow receiver overflows its queue and is disconnected,
// without stalling delivery to the rest of the room
// ---------------------------------------------------------------------------

#[tokio::test]
async fn slow_receiver_is_disconnected_on_overflow() {
    let manager = WsManager::new();

    // conn-slow is never drained; conn-fast is drained between sends.
    let _rx_slow = manager.add("conn-slow".to_string(), 1).await;
    let mut rx_fast = manager.add("conn-fast".to_string(), 2).await;
    manager.join("conn-slow", 10).await;
    manager.join("conn-fast", 10).await;

    let mut fast_received = 0;
    for _ in 0..=WS_SEND_QUEUE_CAPACITY {
        manager
            .broadcast_to_room(10, Message::Text("tick".into()), None)
            .await;
        if rx_fast.try_recv().is_ok() {
            fast_received += 1;
        }
    }

    // The slow connection hit its bound and was dropped from the registry;
    // the fast one got every message.
    assert_eq!(manager.connection_count().await, 1);
    assert_eq!(manager.room_of("conn-slow").await, None);
    assert_eq!(fast_received, WS_SEND_QUEUE_CAPACITY + 1);
}

// ---------------------------------------------------------------------------
// Test: broadcast() skips closed channels without panicking
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broadcast_skips_closed_channels() {
    let manager = WsManager::new();

    let rx1 = manager.add("conn-1".to_string(), 1).await;
    let mut rx2 = manager.add("conn-2".to_string(), 2).await;
    manager.join("conn-1", 10).await;
    manager.join("conn-2", 10).await;

    // Drop rx1 to close its channel.
    drop(rx1);

    let delivered = manager
        .broadcast_to_room(10, Message::Text("still alive".into()), None)
        .await;
    assert_eq!(delivered, 1);

    assert_matches!(rx2.try_recv(), Ok(Message::Text(t)) if t == "still alive");

    // The closed connection was reaped during the pass.
    assert_eq!(manager.connection_count().await, 1);
}

// ---------------------------------------------------------------------------
// Test: shutdown_all() sends Close and clears all connections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_all_sends_close_and_clears() {
    let manager = WsManager::new();

    let mut rx1 = manager.add("conn-1".to_string(), 1).await;
    let mut rx2 = manager.add("conn-2".to_string(), 2).await;
    assert_eq!(manager.connection_count().await, 2);

    manager.shutdown_all().await;

    assert_eq!(manager.connection_count().await, 0);

    let msg1 = rx1.recv().await.expect("rx1 should receive Close");
    assert_matches!(msg1, Message::Close(None));

    let msg2 = rx2.recv().await.expect("rx2 should receive Close");
    assert_matches!(msg2, Message::Close(None));

    // After Close, the channel should be closed (no more messages).
    assert!(
        rx1.recv().await.is_none(),
        "Channel should be closed after shutdown"
    );
}

// ---------------------------------------------------------------------------
// Test: adding with duplicate ID replaces the previous connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_id_replaces_previous_connection() {
    let manager = WsManager::new();

    let _rx_old = manager.add("conn-1".to_string(), 1).await;
    assert_eq!(manager.connection_count().await, 1);

    // Re-add with the same ID -- should replace, not duplicate.
    let mut rx_new = manager.add("conn-1".to_string(), 1).await;
    assert_eq!(manager.connection_count().await, 1);

    manager.join("conn-1", 10).await;
    manager
        .broadcast_to_room(10, Message::Text("replaced".into()), None)
        .await;
    let msg = rx_new.recv().await.expect("New rx should receive message");
    assert_matches!(msg, Message::Text(t) if t == "replaced");
}
