// NATS client integration

mod client;
mod publisher;

pub use client::{NatsClient, NatsConfig};
pub use publisher::AssociationPublisher;
