//! Engine lifecycle events, broadcast to any interested subscriber.

pub mod publisher;

pub use publisher::{EngineEvent, EngineEventKind, EventPublisher};
