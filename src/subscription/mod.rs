// Device channels: registry, event routing, WebSocket connections

pub mod manager;
pub mod protocol;
pub mod router;

pub use manager::{BroadcastPusher, ConnectionManager};
pub use protocol::{ChannelEventMessage, ChannelMessage, ClientMessage, ErrorMessage};
pub use router::{ChannelPusher, Dispatch, SubscriberId, SubscriptionRouter, CONTEXT_EVENT};
