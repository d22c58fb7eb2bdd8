mod connection;
mod listener;
mod relay_server;

pub use connection::{Connection, ConnectionId};
pub use listener::RelayListener;
pub use relay_server::RelayServer;
