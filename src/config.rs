use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the relay server process.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Port the relay listens on.
    pub port: u16,
    /// Interval between liveness sweeps.
    pub sweep_interval: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            sweep_interval: Duration::from_secs(30),
        }
    }
}

impl RelayConfig {
    /// Reads the port from `TASKSYNC_PORT`, falling back to `PORT`, then 8080.
    pub fn from_env() -> Self {
        let port = std::env::var("TASKSYNC_PORT")
            .or_else(|_| std::env::var("PORT"))
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(8080);
        Self {
            port,
            ..Default::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

/// Configuration for a reconnecting client channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Relay WebSocket URL.
    pub url: String,
    /// Consecutive failed attempts tolerated before the channel gives up.
    pub max_reconnect_attempts: u32,
    /// Fixed delay between reconnection attempts.
    pub reconnect_delay: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080".to_string(),
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(3),
        }
    }
}

impl ChannelConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }
}
