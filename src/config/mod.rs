use serde::Deserialize;

pub use crate::nats::NatsConfig;

/// Complete perch configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PerchConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub live: LiveConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// Association store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path (":memory:" for an ephemeral store)
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String {
    "perch.db".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Live state configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LiveConfig {
    /// Broadcast capacity for live events and channel pushes
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_event_capacity() -> usize {
    1000
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
        }
    }
}

/// API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<PerchConfig, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: PerchConfig = toml::from_str(&contents)?;
    Ok(config)
}
