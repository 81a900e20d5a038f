//! Storage layer.

pub mod memory;

pub use memory::{GeofenceQuery, GeofenceQueryCursor, MemoryDb};
