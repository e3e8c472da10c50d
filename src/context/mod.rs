// Context aggregation: live state merged with associations

mod manager;

pub use manager::{ContextError, ContextManager, ContextSnapshot, DeviceSelector};
