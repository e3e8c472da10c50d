// Device signatures
pub mod signature;

// Semantic operation outcomes
pub mod status;

// Persisted associations: store, query rules, CRUD
pub mod association;

// Live device state and providers
pub mod live;

// Context aggregation engine
pub mod context;

// Channel registry and live event fan-out
pub mod subscription;

// HTTP and WebSocket APIs
pub mod api;

// NATS client integration
pub mod nats;

// Configuration
pub mod config;
