//! Core types and update pipeline for the ABC council bin collection service.

/// TOML configuration and address validation.
pub mod config;
/// Periodic fetch, publish and emit cycle.
pub mod coordinator;
/// Calendar event creation with deduplication through the event store.
pub mod emitter;
/// Domain models and identifiers shared by all crates.
pub mod model;
/// Traits describing the schedule source and calendar interfaces.
pub mod ports;
/// Per-bin sensor view of the published schedule.
pub mod sensor;
/// Durable record of calendar events already created.
pub mod store;

pub use config::*;
pub use coordinator::*;
pub use emitter::*;
pub use model::*;
pub use ports::*;
pub use sensor::*;
pub use store::*;
