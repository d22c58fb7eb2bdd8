use crate::model::TaskEvent;
use crate::server::{Connection, ConnectionId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

/// Broadcast hub shared between the listener, per-connection tasks and the
/// liveness sweep. Cloning is cheap; all clones share one connection table.
#[derive(Clone)]
pub struct RelayServer {
    connections: Arc<RwLock<HashMap<ConnectionId, Connection>>>,
    sweeper: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl RelayServer {
    pub fn new() -> Self {
        RelayServer {
            connections: Arc::new(RwLock::new(HashMap::new())),
            sweeper: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn add_connection(&self, connection: Connection) {
        let id = connection.id;
        let mut connections = self.connections.write().await;
        connections.insert(id, connection);
        tracing::info!("Client {} connected ({} active)", id, connections.len());
    }

    /// Removes a connection; a no-op when it is already gone, so the
    /// disconnect, error and eviction paths may all call it.
    pub async fn remove_connection(&self, id: ConnectionId) {
        let mut connections = self.connections.write().await;
        if connections.remove(&id).is_some() {
            tracing::info!("Client {} disconnected ({} active)", id, connections.len());
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Forwards `event` to every connection except the sender. Peers whose
    /// outbound channel is gone are skipped; a slow peer never stalls the
    /// others. Returns the number of peers the event was handed to.
    pub async fn broadcast(&self, sender_id: ConnectionId, event: &TaskEvent) -> usize {
        let serialized = match event.encode() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to serialize event: {:?}", e);
                return 0;
            }
        };

        let connections = self.connections.read().await;
        let mut delivered = 0;
        for connection in connections.values() {
            if connection.id == sender_id {
                continue;
            }
            match connection.sender.send(Message::text(serialized.clone())) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!("Skipping unreachable client {}: {}", connection.id, e);
                }
            }
        }
        delivered
    }

    /// Records a pong from `id`, keeping it past the next sweep.
    pub async fn mark_alive(&self, id: ConnectionId) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.get_mut(&id) {
            connection.alive = true;
        }
    }

    /// One liveness pass: evicts every connection that missed the previous
    /// probe, then clears the flag on the survivors and pings them. A peer is
    /// therefore dropped only after a full interval with no pong.
    pub async fn sweep(&self) {
        let mut connections = self.connections.write().await;
        connections.retain(|id, connection| {
            if !connection.alive {
                tracing::info!("Evicting unresponsive client {}", id);
                let _ = connection.sender.send(Message::Close(None));
                return false;
            }
            connection.alive = false;
            let _ = connection.sender.send(Message::Ping(Vec::new().into()));
            true
        });
    }

    /// Starts the periodic liveness sweep. Call once per server.
    pub fn start_sweep(&self, interval: Duration) {
        let server = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                server.sweep().await;
            }
        });
        if let Some(previous) = self.sweeper.lock().unwrap().replace(handle) {
            previous.abort();
        }
    }

    /// Stops the sweep timer and releases every connection.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().unwrap().take() {
            handle.abort();
        }
        let mut connections = self.connections.write().await;
        for connection in connections.values() {
            let _ = connection.sender.send(Message::Close(None));
        }
        connections.clear();
        tracing::info!("Relay server shut down");
    }
}

impl Default for RelayServer {
    fn default() -> Self {
        Self::new()
    }
}
