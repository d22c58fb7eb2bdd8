/// Lifecycle of a reconnecting channel.
///
/// `Failed` is terminal: the retry ceiling was reached and no further
/// connection attempt will be scheduled for this channel instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ChannelState::Disconnected => "disconnected",
            ChannelState::Connecting => "connecting",
            ChannelState::Connected => "connected",
            ChannelState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}
