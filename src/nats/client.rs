use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

/// NATS configuration
#[derive(Clone, Debug, Deserialize)]
pub struct NatsConfig {
    #[serde(default = "default_url")]
    pub url: String,
    /// Subject carrying primary live events
    #[serde(default = "default_live_subject")]
    pub live_subject: String,
    /// Subject carrying complementary live events, if any
    #[serde(default)]
    pub complementary_subject: Option<String>,
    /// Subject on which the association set is republished after changes
    #[serde(default)]
    pub associations_subject: Option<String>,
}

fn default_url() -> String {
    std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string())
}

fn default_live_subject() -> String {
    "perch.live.>".to_string()
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            live_subject: default_live_subject(),
            complementary_subject: None,
            associations_subject: None,
        }
    }
}

/// Connected NATS client
pub struct NatsClient {
    client: async_nats::Client,
}

impl NatsClient {
    /// Connect to NATS
    pub async fn connect(config: NatsConfig) -> Result<Self> {
        info!("Connecting to NATS at {}", config.url);

        let client = async_nats::connect(&config.url)
            .await
            .context("Failed to connect to NATS")?;

        Ok(Self { client })
    }

    /// Get underlying NATS client
    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }

}
