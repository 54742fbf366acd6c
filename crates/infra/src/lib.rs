//! Infrastructure layer: event store, dispatcher, read models, blobs, config.

pub mod blob_store;
pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod projections;
pub mod read_model;

pub use config::{AppConfig, ConfigError};
