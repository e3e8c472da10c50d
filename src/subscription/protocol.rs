use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client → Server message types
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "subscribe")]
    Subscribe { route: String },
    #[serde(rename = "unsubscribe")]
    Unsubscribe { route: String },
}

/// One push on a channel, fanned out to every connection
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub route: String,
    pub event: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

/// Server → Client: channel event notification
#[derive(Debug, Clone, Serialize)]
pub struct ChannelEventMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub route: String,
    pub event: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl From<ChannelMessage> for ChannelEventMessage {
    fn from(msg: ChannelMessage) -> Self {
        Self {
            msg_type: "channel_event".to_string(),
            route: msg.route,
            event: msg.event,
            payload: msg.payload,
            timestamp: msg.timestamp,
        }
    }
}

/// Server → Client: Error message
#[derive(Debug, Clone, Serialize)]
pub struct ErrorMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub error: String,
}

impl ErrorMessage {
    pub fn new(error: String) -> Self {
        Self {
            msg_type: "error".to_string(),
            error,
        }
    }
}
