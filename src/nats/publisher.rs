use crate::association::{Association, AssociationObserver};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

/// Republishes the full association set on a NATS subject
#[derive(Clone)]
pub struct AssociationPublisher {
    client: async_nats::Client,
    subject: String,
}

impl AssociationPublisher {
    pub fn new(client: async_nats::Client, subject: String) -> Self {
        Self { client, subject }
    }
}

#[async_trait]
impl AssociationObserver for AssociationPublisher {
    /// Payload: JSON object of signature -> association
    async fn associations_changed(
        &self,
        associations: &BTreeMap<String, Association>,
    ) -> Result<()> {
        let payload = serde_json::to_vec(associations)
            .context("Failed to serialize associations to JSON")?;

        debug!(
            subject = %self.subject,
            associations = associations.len(),
            "Publishing associations to NATS"
        );

        self.client
            .publish(self.subject.clone(), payload.into())
            .await
            .with_context(|| format!("Failed to publish associations to subject '{}'", self.subject))?;

        Ok(())
    }
}
