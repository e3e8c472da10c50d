use super::event::{nearest_devices, LiveEvent, NEAREST_KEY};
use super::{DeviceFilter, DeviceStates, LiveContextSource, RetrieveOptions};
use crate::signature::Signature;
use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// In-memory live device state fed by a stream of [`LiveEvent`]s.
///
/// Each event's payload is merged into the device's bag and the event is
/// re-broadcast to subscribers (the subscription router).
pub struct LiveStateEngine {
    /// Source name, used in logs
    name: String,

    /// Lock-free concurrent map for fast reads
    devices: Arc<DashMap<Signature, Map<String, Value>>>,

    /// Broadcast channel for processed events
    event_tx: broadcast::Sender<LiveEvent>,
}

impl LiveStateEngine {
    /// Create new engine with a broadcast channel of `capacity` events
    pub fn new(name: &str, capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity.max(1));

        Self {
            name: name.to_string(),
            devices: Arc::new(DashMap::new()),
            event_tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subscribe to processed events
    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.event_tx.subscribe()
    }

    /// Get a copy of one device's bag
    pub fn get_device(&self, signature: &Signature) -> Option<Map<String, Value>> {
        self.devices.get(signature).map(|d| d.clone())
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Merge an event into device state and broadcast it.
    ///
    /// A `nearest` list whose ranking is unchanged from the stored one is
    /// stripped from the broadcast copy, demoting the event to a telemetry
    /// delta. Returns the event as broadcast, or `None` if nothing was left
    /// to announce.
    pub fn process_event(&self, mut event: LiveEvent) -> Option<LiveEvent> {
        {
            let mut bag = self.devices.entry(event.signature.clone()).or_default();

            if event.payload.contains_key(NEAREST_KEY) {
                let previous = bag.contains_key(NEAREST_KEY).then(|| nearest_devices(&bag));
                let current = nearest_devices(&event.payload);

                for (key, value) in &event.payload {
                    bag.insert(key.clone(), value.clone());
                }

                if previous.as_ref() == Some(&current) {
                    event.payload.remove(NEAREST_KEY);
                }
            } else {
                for (key, value) in &event.payload {
                    bag.insert(key.clone(), value.clone());
                }
            }
        }

        if event.payload.is_empty() {
            debug!(source = %self.name, signature = %event.signature, "Nothing new to announce");
            return None;
        }

        // No receivers is fine
        let _ = self.event_tx.send(event.clone());
        Some(event)
    }

    /// Run NATS subscriber feeding events into this engine
    ///
    /// Subscribes to `subject` on core NATS; malformed messages are logged
    /// and skipped.
    pub async fn run_subscriber(self: Arc<Self>, client: async_nats::Client, subject: String) -> Result<()> {
        info!(source = %self.name, subject = %subject, "Starting live state subscriber");

        let mut messages = client
            .subscribe(subject.clone())
            .await
            .with_context(|| format!("Failed to subscribe to '{}'", subject))?;

        while let Some(msg) = messages.next().await {
            match serde_json::from_slice::<LiveEvent>(&msg.payload) {
                Ok(event) => {
                    self.process_event(event);
                }
                Err(e) => {
                    warn!(source = %self.name, subject = %msg.subject, error = %e, "Failed to deserialize live event, skipping");
                }
            }
        }

        warn!(source = %self.name, devices = self.device_count(), "Live state subscriber stream ended");
        Ok(())
    }

    fn select(&self, filter: &DeviceFilter) -> BTreeSet<Signature> {
        match filter {
            DeviceFilter::All => self.devices.iter().map(|d| d.key().clone()).collect(),
            DeviceFilter::Identifier(identifier) => self
                .devices
                .iter()
                .filter(|d| d.key().identifier() == identifier)
                .map(|d| d.key().clone())
                .collect(),
            DeviceFilter::Signatures(signatures) => signatures
                .iter()
                .filter(|s| self.devices.contains_key(*s))
                .cloned()
                .collect(),
        }
    }

    /// Neighbours of `selected` in both directions, limited to known devices
    fn neighbourhood(&self, selected: &BTreeSet<Signature>) -> BTreeSet<Signature> {
        // Snapshot first: no map access while iterating
        let rankings: Vec<(Signature, Vec<Signature>)> = self
            .devices
            .iter()
            .map(|d| (d.key().clone(), nearest_devices(d.value())))
            .collect();
        let known: BTreeSet<&Signature> = rankings.iter().map(|(s, _)| s).collect();

        let mut expanded = selected.clone();
        for (signature, neighbours) in &rankings {
            if selected.contains(signature) {
                expanded.extend(neighbours.iter().filter(|n| known.contains(n)).cloned());
            } else if neighbours.iter().any(|n| selected.contains(n)) {
                expanded.insert(signature.clone());
            }
        }

        expanded
    }
}

#[async_trait]
impl LiveContextSource for LiveStateEngine {
    async fn retrieve_context(
        &self,
        filter: &DeviceFilter,
        options: RetrieveOptions,
    ) -> Option<DeviceStates> {
        let mut selected = self.select(filter);
        if options.expand_nearest && !matches!(filter, DeviceFilter::All) {
            selected = self.neighbourhood(&selected);
        }

        let states: DeviceStates = selected
            .into_iter()
            .filter_map(|signature| {
                let bag = self.get_device(&signature)?;
                Some((signature, bag))
            })
            .collect();

        if states.is_empty() {
            None
        } else {
            Some(states)
        }
    }
}
