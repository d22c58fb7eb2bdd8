use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

pub type ConnectionId = Uuid;

/// One entry in the relay's connection table.
///
/// `alive` is cleared by each liveness sweep and set again when the peer's
/// pong arrives; a peer that stays cleared for a full sweep interval is
/// evicted by the next sweep.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub sender: UnboundedSender<Message>,
    pub alive: bool,
    _shutdown: oneshot::Sender<()>,
}

impl Connection {
    /// Creates the table entry together with its teardown signal. Dropping
    /// the entry (disconnect, eviction, shutdown) resolves the signal, so the
    /// peer's socket tasks exit even when the peer itself never responds.
    pub fn new(id: ConnectionId, sender: UnboundedSender<Message>) -> (Self, oneshot::Receiver<()>) {
        let (shutdown, closed) = oneshot::channel();
        (
            Self {
                id,
                sender,
                alive: true,
                _shutdown: shutdown,
            },
            closed,
        )
    }
}
