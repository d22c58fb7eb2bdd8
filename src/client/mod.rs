mod channel;
mod state;
mod subscription;

pub use channel::EventChannel;
pub use state::ChannelState;
pub use subscription::{EventCallback, SubscriberRegistry, Subscription};
