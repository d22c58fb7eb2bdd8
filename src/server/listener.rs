use crate::error::NetworkError;
use crate::model::TaskEvent;
use crate::server::{Connection, RelayServer};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use uuid::Uuid;

/// Accept loop feeding connections into a [`RelayServer`].
pub struct RelayListener {
    server: RelayServer,
    listener: TcpListener,
}

impl RelayListener {
    /// Binds the listener. Use port 0 to let the OS pick; the bound address
    /// is available through [`RelayListener::local_addr`].
    pub async fn bind(server: RelayServer, addr: SocketAddr) -> Result<Self, NetworkError> {
        let listener = TcpListener::bind(&addr).await.map_err(NetworkError::Bind)?;
        Ok(RelayListener { server, listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetworkError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until the enclosing task is cancelled.
    pub async fn run(self) {
        match self.local_addr() {
            Ok(addr) => tracing::info!("Relay listening on ws://{}", addr),
            Err(_) => tracing::info!("Relay listening"),
        }

        while let Ok((stream, _)) = self.listener.accept().await {
            let server = self.server.clone();
            tokio::spawn(async move {
                handle_connection(stream, server).await;
            });
        }
    }
}

async fn handle_connection(stream: TcpStream, server: RelayServer) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            tracing::error!("WebSocket handshake failed: {:?}", e);
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let id = Uuid::new_v4();

    let (connection, mut closed) = Connection::new(id, tx);
    server.add_connection(connection).await;

    // Outgoing messages, fed by broadcasts and the liveness sweep.
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_sender.send(message).await {
                tracing::debug!("Failed to send to client {}: {:?}", id, e);
                break;
            }
        }
    });

    // Incoming messages from this peer. `closed` resolves when the table
    // entry is dropped; eviction must not wait on a dead peer to answer the
    // close handshake.
    loop {
        tokio::select! {
            _ = &mut closed => break,
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => match TaskEvent::decode(text.as_str()) {
                    Ok(event) => {
                        server.broadcast(id, &event).await;
                    }
                    Err(e) => {
                        // A single bad message is not fatal to the peer.
                        tracing::warn!("Discarding malformed message from {}: {}", id, e);
                    }
                },
                Some(Ok(Message::Pong(_))) => {
                    server.mark_alive(id).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!("Transport error on client {}: {:?}", id, e);
                    break;
                }
            },
        }
    }

    server.remove_connection(id).await;
}
