use futures_util::SinkExt;
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use tasksync::prelude::*;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

async fn start_relay() -> (RelayServer, SocketAddr, JoinHandle<()>) {
    let server = RelayServer::new();
    let listener = RelayListener::bind(server.clone(), SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .expect("Failed to bind relay");
    let addr = listener.local_addr().expect("Failed to read local addr");
    let handle = tokio::spawn(listener.run());
    (server, addr, handle)
}

fn config_for(addr: SocketAddr) -> ChannelConfig {
    ChannelConfig::new(format!("ws://{}", addr)).with_reconnect_delay(Duration::from_millis(50))
}

async fn connected_channel(addr: SocketAddr) -> EventChannel {
    let channel = EventChannel::connect(config_for(addr));
    let mut state = channel.watch_state();
    timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == ChannelState::Connected),
    )
    .await
    .expect("Timed out waiting for connection")
    .expect("Channel driver ended");
    channel
}

fn collect_events(channel: &EventChannel) -> UnboundedReceiver<TaskEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    channel.subscribe(move |event| {
        let _ = tx.send(event.clone());
    });
    rx
}

async fn wait_for_peer_count(server: &RelayServer, expected: usize) {
    timeout(Duration::from_secs(5), async {
        while server.connection_count().await != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Timed out waiting for peer count");
}

#[tokio::test]
async fn test_event_reaches_peer_but_not_sender() {
    let (server, addr, _listener) = start_relay().await;

    let channel_a = connected_channel(addr).await;
    let channel_b = connected_channel(addr).await;
    wait_for_peer_count(&server, 2).await;

    let mut events_a = collect_events(&channel_a);
    let mut events_b = collect_events(&channel_b);

    let event = TaskEvent::new(EventKind::TaskCreate, json!({"id": "7"}));
    assert!(channel_a.publish(&event));

    let received = timeout(Duration::from_secs(5), events_b.recv())
        .await
        .expect("Timed out waiting for event")
        .expect("Subscriber stream ended");
    assert_eq!(received, event);

    // Exactly one delivery to B, none to the sender.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(events_b.try_recv().is_err());
    assert!(events_a.try_recv().is_err());
}

#[tokio::test]
async fn test_fan_out_to_all_other_peers() {
    let (server, addr, _listener) = start_relay().await;

    let channel_a = connected_channel(addr).await;
    let channel_b = connected_channel(addr).await;
    let channel_c = connected_channel(addr).await;
    wait_for_peer_count(&server, 3).await;

    let mut events_b = collect_events(&channel_b);
    let mut events_c = collect_events(&channel_c);

    let event = TaskEvent::new(EventKind::TaskUpdate, json!({"id": "3", "done": true}));
    assert!(channel_a.publish(&event));

    for events in [&mut events_b, &mut events_c] {
        let received = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("Timed out waiting for event")
            .expect("Subscriber stream ended");
        assert_eq!(received, event);
    }
}

#[tokio::test]
async fn test_malformed_message_is_discarded() {
    let (server, addr, _listener) = start_relay().await;

    let channel = connected_channel(addr).await;
    let mut events = collect_events(&channel);

    // Raw peer that speaks garbage first, then a valid event.
    let (mut raw, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
        .await
        .expect("Failed to connect raw peer");
    wait_for_peer_count(&server, 2).await;

    raw.send(Message::text("not json".to_string()))
        .await
        .expect("Failed to send garbage");
    raw.send(Message::text(
        r#"{"type":"task_delete","payload":{"id":"9"}}"#.to_string(),
    ))
    .await
    .expect("Failed to send event");

    let received = timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("Timed out waiting for event")
        .expect("Subscriber stream ended");
    assert_eq!(received.kind, EventKind::TaskDelete);

    // The garbage neither reached subscribers nor dropped the peer.
    assert!(events.try_recv().is_err());
    assert_eq!(server.connection_count().await, 2);
}

#[tokio::test]
async fn test_publish_while_disconnected_reports_not_sent() {
    // Nothing listens on this address.
    let channel = EventChannel::connect(
        ChannelConfig::new("ws://127.0.0.1:9").with_reconnect_delay(Duration::from_millis(200)),
    );

    let event = TaskEvent::new(EventKind::TaskCreate, json!({"id": "7"}));
    assert!(!channel.publish(&event));
    assert_ne!(channel.state(), ChannelState::Connected);
}

#[tokio::test]
async fn test_unsubscribed_callback_receives_nothing() {
    let (server, addr, _listener) = start_relay().await;

    let channel_a = connected_channel(addr).await;
    let channel_b = connected_channel(addr).await;
    wait_for_peer_count(&server, 2).await;

    let (tx, mut cancelled_rx) = mpsc::unbounded_channel();
    let subscription = channel_b.subscribe(move |event: &TaskEvent| {
        let _ = tx.send(event.clone());
    });
    let mut events_b = collect_events(&channel_b);

    subscription.unsubscribe();
    subscription.unsubscribe(); // second call is a no-op

    let event = TaskEvent::new(EventKind::TaskUpdate, json!({"id": "2"}));
    assert!(channel_a.publish(&event));

    let received = timeout(Duration::from_secs(5), events_b.recv())
        .await
        .expect("Timed out waiting for event")
        .expect("Subscriber stream ended");
    assert_eq!(received, event);
    assert!(cancelled_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_liveness_keeps_responsive_peers_and_evicts_silent_ones() {
    let (server, addr, _listener) = start_relay().await;
    server.start_sweep(Duration::from_millis(100));

    // A real channel answers probes at the transport layer and survives.
    let channel = connected_channel(addr).await;
    wait_for_peer_count(&server, 1).await;

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(channel.state(), ChannelState::Connected);
    assert_eq!(server.connection_count().await, 1);

    // A raw peer that never polls its socket sends no pongs and is reaped
    // after one full probe interval.
    let (_silent, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
        .await
        .expect("Failed to connect silent peer");
    wait_for_peer_count(&server, 2).await;
    wait_for_peer_count(&server, 1).await;
    assert_eq!(channel.state(), ChannelState::Connected);

    server.shutdown().await;
}
