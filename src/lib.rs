pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod server;

pub mod prelude {
    pub use crate::client::ChannelState;
    pub use crate::client::EventChannel;
    pub use crate::client::Subscription;
    pub use crate::config::ChannelConfig;
    pub use crate::config::RelayConfig;
    pub use crate::error::NetworkError;
    pub use crate::model::EventKind;
    pub use crate::model::TaskEvent;
    pub use crate::server::RelayListener;
    pub use crate::server::RelayServer;
}
