use crate::signature::Signature;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload key carrying the ranked neighbour list
pub const NEAREST_KEY: &str = "nearest";

/// A named per-device event from a live-context source.
///
/// Wire format (one JSON object per message):
/// ```json
/// { "event": "raddec", "signature": "aa:bb:cc:dd:ee:ff/2",
///   "payload": { "nearest": [{ "device": "11:22/3", "rssi": -62 }] } }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiveEvent {
    /// Event name pushed to subscribers for telemetry deltas
    pub event: String,

    pub signature: Signature,

    #[serde(default)]
    pub payload: Map<String, Value>,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl LiveEvent {
    pub fn new(event: &str, signature: Signature, payload: Map<String, Value>) -> Self {
        Self {
            event: event.to_string(),
            signature,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Context-changing events carry a ranked neighbour list; everything
    /// else is a telemetry delta.
    pub fn is_context_change(&self) -> bool {
        self.payload.contains_key(NEAREST_KEY)
    }
}

/// Neighbour signatures from a bag's `nearest` list, strongest first.
///
/// Entries without a parseable `device` are skipped.
pub fn nearest_devices(bag: &Map<String, Value>) -> Vec<Signature> {
    bag.get(NEAREST_KEY)
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.get("device")?.as_str()?.parse().ok())
                .collect()
        })
        .unwrap_or_default()
}
