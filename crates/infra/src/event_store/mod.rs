//! Append-only event store boundary.
//!
//! Tenant-scoped event streams behind an async trait, with an in-memory
//! implementation for tests/dev and a Postgres one for deployments.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
