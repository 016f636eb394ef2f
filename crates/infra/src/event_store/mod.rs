//! Append-only event store boundary.
//!
//! The registry's history lives here. `InMemoryEventStore` backs tests and
//! ephemeral runs; `FileEventStore` is the durable JSON-lines log.

pub mod file;
pub mod in_memory;
pub mod r#trait;

pub use file::FileEventStore;
pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
