use crate::association::QueryParams;
use crate::context::{ContextManager, DeviceSelector};
use crate::live::LiveEvent;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Opaque handle of one transport connection
pub type SubscriberId = Uuid;

/// Event name used when pushing a re-aggregated snapshot
pub const CONTEXT_EVENT: &str = "devices";

/// Outbound side of the router, implemented by the transport
pub trait ChannelPusher: Send + Sync {
    fn push(&self, route: &str, event: &str, payload: Value);
}

/// What the router did with one live event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Nobody watches the device
    Dropped,
    /// Context re-aggregated and pushed
    Aggregated,
    /// Telemetry pushed as-is
    Delta,
    /// Re-aggregation failed; nothing pushed this tick
    Failed,
}

/// Fans live events out to device channels that have subscribers.
///
/// A channel exists only while at least one subscriber is attached; events
/// for devices without a channel cost nothing beyond a map lookup.
pub struct SubscriptionRouter {
    /// route -> attached subscribers
    channels: DashMap<String, HashSet<SubscriberId>>,
    context: Arc<ContextManager>,
    pusher: Arc<dyn ChannelPusher>,
}

impl SubscriptionRouter {
    pub fn new(context: Arc<ContextManager>, pusher: Arc<dyn ChannelPusher>) -> Self {
        Self {
            channels: DashMap::new(),
            context,
            pusher,
        }
    }

    /// Attach a subscriber. Returns true if this activated the channel.
    pub fn attach(&self, route: &str, subscriber: SubscriberId) -> bool {
        let mut subscribers = self.channels.entry(route.to_string()).or_default();
        let activated = subscribers.is_empty();
        subscribers.insert(subscriber);

        if activated {
            info!(route = %route, "Channel active");
        }
        activated
    }

    /// Detach a subscriber. Returns true if this removed the channel.
    pub fn detach(&self, route: &str, subscriber: SubscriberId) -> bool {
        let emptied = match self.channels.get_mut(route) {
            Some(mut subscribers) => {
                subscribers.remove(&subscriber);
                subscribers.is_empty()
            }
            None => false,
        };

        if emptied && self.channels.remove_if(route, |_, s| s.is_empty()).is_some() {
            info!(route = %route, "Channel inactive");
            return true;
        }
        false
    }

    pub fn is_active(&self, route: &str) -> bool {
        self.channels.contains_key(route)
    }

    pub fn subscriber_count(&self, route: &str) -> usize {
        self.channels.get(route).map(|s| s.len()).unwrap_or(0)
    }

    pub fn active_channels(&self) -> usize {
        self.channels.len()
    }

    /// Route one live event: drop, push as-is, or re-aggregate and push.
    pub async fn handle_event(&self, event: &LiveEvent) -> Dispatch {
        let route = event.signature.route();
        if !self.is_active(&route) {
            return Dispatch::Dropped;
        }

        if !event.is_context_change() {
            self.pusher
                .push(&route, &event.event, Value::Object(event.payload.clone()));
            return Dispatch::Delta;
        }

        let selector = DeviceSelector::Signature(event.signature.clone());
        let snapshot = match self.context.retrieve(&selector, &QueryParams::default()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!(route = %route, error = %e, "Re-aggregation failed, skipping tick");
                return Dispatch::Failed;
            }
        };

        match serde_json::to_value(&snapshot) {
            Ok(payload) => {
                self.pusher.push(&route, CONTEXT_EVENT, payload);
                Dispatch::Aggregated
            }
            Err(e) => {
                warn!(route = %route, error = %e, "Failed to serialize context snapshot");
                Dispatch::Failed
            }
        }
    }

    /// Consume a live event stream, one event at a time, until it closes
    pub async fn run(self: Arc<Self>, mut events: broadcast::Receiver<LiveEvent>) {
        info!("Subscription router started");

        loop {
            match events.recv().await {
                Ok(event) => {
                    self.handle_event(&event).await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped = skipped, "Subscription router lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    error!("Live event channel closed");
                    break;
                }
            }
        }
    }
}
