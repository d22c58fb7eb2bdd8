use crate::client::state::ChannelState;
use crate::client::subscription::{SubscriberRegistry, Subscription};
use crate::config::ChannelConfig;
use crate::model::TaskEvent;
use futures_util::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type OutboundSlot = Arc<Mutex<Option<UnboundedSender<Message>>>>;
type Subscribers = Arc<Mutex<SubscriberRegistry>>;
type StateSender = Arc<watch::Sender<ChannelState>>;

/// One logical link to the relay, re-established on drop with evenly spaced,
/// bounded retries. Inbound events fan out to all registered subscribers in
/// registration order.
///
/// Events published while the channel is not connected are dropped, not
/// queued; [`EventChannel::publish`] reports whether the event was handed to
/// the transport. After `max_reconnect_attempts` consecutive failures the
/// channel settles in [`ChannelState::Failed`] and stops scheduling attempts;
/// observe that through [`EventChannel::watch_state`] and recreate the
/// channel if desired.
pub struct EventChannel {
    outbound: OutboundSlot,
    subscribers: Subscribers,
    state: StateSender,
    driver: JoinHandle<()>,
}

impl EventChannel {
    /// Creates the channel and starts its connect/reconnect driver.
    pub fn connect(config: ChannelConfig) -> Self {
        let outbound: OutboundSlot = Arc::new(Mutex::new(None));
        let subscribers: Subscribers = Arc::new(Mutex::new(SubscriberRegistry::new()));
        let (state_tx, _) = watch::channel(ChannelState::Disconnected);
        let state: StateSender = Arc::new(state_tx);

        let driver = tokio::spawn(run_driver(
            config,
            outbound.clone(),
            subscribers.clone(),
            state.clone(),
        ));

        EventChannel {
            outbound,
            subscribers,
            state,
            driver,
        }
    }

    /// Sends an event to the relay, fire-and-forget. Returns `false` when the
    /// channel is not connected; the event is dropped, never queued.
    pub fn publish(&self, event: &TaskEvent) -> bool {
        let serialized = match event.encode() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to serialize event: {:?}", e);
                return false;
            }
        };

        let outbound = self.outbound.lock().unwrap();
        match outbound.as_ref() {
            Some(sender) => sender.send(Message::text(serialized)).is_ok(),
            None => {
                tracing::warn!("Channel is not connected. Event not sent");
                false
            }
        }
    }

    /// Registers a callback for every inbound event. The returned
    /// [`Subscription`] removes exactly this callback.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&TaskEvent) + Send + 'static,
    {
        let id = self.subscribers.lock().unwrap().add(Box::new(callback));
        Subscription::new(id, Arc::downgrade(&self.subscribers))
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Lifecycle observation, including the terminal
    /// [`ChannelState::Failed`].
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    /// Stops the reconnect driver; no further attempts or timers fire. The
    /// channel settles in [`ChannelState::Disconnected`].
    pub fn close(&self) {
        self.driver.abort();
        self.outbound.lock().unwrap().take();
        self.state.send_replace(ChannelState::Disconnected);
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

async fn run_driver(
    config: ChannelConfig,
    outbound: OutboundSlot,
    subscribers: Subscribers,
    state: StateSender,
) {
    let mut attempts = 0u32;
    loop {
        if attempts >= config.max_reconnect_attempts {
            tracing::error!("Max reconnection attempts reached");
            state.send_replace(ChannelState::Failed);
            return;
        }

        state.send_replace(ChannelState::Connecting);
        match connect_async(config.url.as_str()).await {
            Ok((ws_stream, _)) => {
                tracing::info!("Connected to relay at {}", config.url);
                attempts = 0;
                state.send_replace(ChannelState::Connected);

                // The outbound sender lives only as long as this session, so
                // nothing published during an outage can leak into the next
                // connection.
                let (tx, rx) = mpsc::unbounded_channel();
                *outbound.lock().unwrap() = Some(tx);
                run_session(ws_stream, rx, &subscribers).await;
                outbound.lock().unwrap().take();
                tracing::info!("Connection to relay closed. Attempting to reconnect");
            }
            Err(e) => {
                tracing::debug!("Connection attempt failed: {}", e);
            }
        }

        attempts += 1;
        state.send_replace(ChannelState::Disconnected);
        tokio::time::sleep(config.reconnect_delay).await;
    }
}

async fn run_session(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut rx: UnboundedReceiver<Message>,
    subscribers: &Subscribers,
) {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    loop {
        tokio::select! {
            outgoing = rx.recv() => match outgoing {
                Some(message) => {
                    if let Err(e) = ws_sender.send(message).await {
                        tracing::debug!("Failed to send message: {:?}", e);
                        break;
                    }
                }
                None => break,
            },
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => match TaskEvent::decode(text.as_str()) {
                    Ok(event) => subscribers.lock().unwrap().dispatch(&event),
                    Err(e) => {
                        tracing::warn!("Discarding malformed message: {}", e);
                    }
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!("Transport error: {:?}", e);
                    break;
                }
            },
        }
    }
}
