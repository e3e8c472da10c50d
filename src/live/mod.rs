// Live device state: provider seam, events, in-memory engine

mod engine;
mod event;

pub use engine::LiveStateEngine;
pub use event::{nearest_devices, LiveEvent, NEAREST_KEY};

use crate::signature::Signature;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Per-device property bags keyed by signature
pub type DeviceStates = BTreeMap<Signature, Map<String, Value>>;

/// Which devices a live-context query asks for
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceFilter {
    /// Every device the source knows
    All,
    /// Every signature sharing this identifier, whatever its type
    Identifier(String),
    Signatures(Vec<Signature>),
}

/// Options passed along with a live-context query
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RetrieveOptions {
    /// Also return the requested devices' neighbours, and the devices that
    /// list a requested device among theirs
    pub expand_nearest: bool,
}

/// Provider of ephemeral per-device state.
///
/// The core reads from providers but never owns or mutates their state;
/// returned bags are copies.
#[async_trait]
pub trait LiveContextSource: Send + Sync {
    /// Current state of the selected devices, `None` when nothing matches
    async fn retrieve_context(
        &self,
        filter: &DeviceFilter,
        options: RetrieveOptions,
    ) -> Option<DeviceStates>;
}
