//! Projections (read model builders).
//!
//! Projections consume stored events and build query-optimized read models.
//! All projections are:
//! - **Rebuildable**: reconstructed from `EventStore::load_all` at startup
//! - **Tenant-isolated**: rows are partitioned by tenant
//! - **Idempotent**: a per-stream cursor skips anything already applied

pub mod catalog;
pub mod cursor;
pub mod ledger;
pub mod users;

use std::collections::BTreeSet;

use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::Mutex;

use stockroom_core::{AggregateId, DomainError, TenantId, UserId};
use stockroom_events::EventEnvelope;
use stockroom_inventory::{ItemEvent, ItemId, MovementId};

use crate::event_store::{EventStore, EventStoreError};
use crate::read_model::{InMemoryTenantStore, ReadModelError};

pub use catalog::{CatalogItem, CatalogProjection, CatalogQuery, CatalogSort};
pub use cursor::StreamCursors;
pub use ledger::{LedgerProjection, MovementRecord};
pub use users::{UserReadModel, UsersProjection};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to decode event payload: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("out-of-order event: last applied {last}, got {found}")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("missing read model row: {0}")]
    MissingRow(String),

    #[error("ledger does not replay: {0}")]
    Ledger(DomainError),

    #[error(transparent)]
    Store(#[from] EventStoreError),

    #[error(transparent)]
    ReadModel(#[from] ReadModelError),
}

/// Decode an `inventory.item` payload and check it belongs to the envelope's stream.
pub(crate) fn decode_item_event(envelope: &EventEnvelope<JsonValue>) -> Result<ItemEvent, ProjectionError> {
    let event: ItemEvent = serde_json::from_value(envelope.payload().clone())
        .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

    if event.tenant_id() != envelope.tenant_id() || event.item_id() != ItemId(envelope.aggregate_id()) {
        return Err(ProjectionError::TenantIsolation(format!(
            "event for item {} does not belong to stream {} of tenant {}",
            event.item_id(),
            envelope.aggregate_id(),
            envelope.tenant_id()
        )));
    }
    Ok(event)
}

pub type Catalog = CatalogProjection<InMemoryTenantStore<ItemId, CatalogItem>>;
pub type Ledger = LedgerProjection<InMemoryTenantStore<MovementId, MovementRecord>>;
pub type Users = UsersProjection<InMemoryTenantStore<UserId, UserReadModel>>;

/// The application's read side.
///
/// After a command commits, the writer calls [`ReadModels::catch_up`] for the
/// affected stream, so a caller reading right after its own write sees it.
/// Appliers are serialized by one lock; queries never take it.
pub struct ReadModels {
    pub catalog: Catalog,
    pub ledger: Ledger,
    pub users: Users,
    apply_lock: Mutex<()>,
}

impl Default for ReadModels {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadModels {
    pub fn new() -> Self {
        Self {
            catalog: CatalogProjection::new(InMemoryTenantStore::new()),
            ledger: LedgerProjection::new(InMemoryTenantStore::new()),
            users: UsersProjection::new(InMemoryTenantStore::new()),
            apply_lock: Mutex::new(()),
        }
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        // Ledger first: a record that does not replay never reaches the catalog.
        self.ledger.apply_envelope(envelope)?;
        self.catalog.apply_envelope(envelope)?;
        self.users.apply_envelope(envelope)?;
        Ok(())
    }

    /// Apply whatever part of one stream the read models have not seen yet.
    pub async fn catch_up<S>(
        &self,
        store: &S,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<(), ProjectionError>
    where
        S: EventStore + ?Sized,
    {
        let _guard = self.apply_lock.lock().await;
        let events = store.load_stream(tenant_id, aggregate_id).await?;
        for stored in &events {
            self.apply_envelope(&stored.to_envelope())?;
        }
        Ok(())
    }

    /// Drop every row and replay the whole store in commit order.
    pub async fn rebuild<S>(&self, store: &S) -> Result<usize, ProjectionError>
    where
        S: EventStore + ?Sized,
    {
        let _guard = self.apply_lock.lock().await;
        let events = store.load_all().await?;

        let tenants: Vec<TenantId> = events
            .iter()
            .map(|e| *e.tenant_id.as_uuid())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(TenantId::from_uuid)
            .collect();
        self.catalog.reset(&tenants)?;
        self.ledger.reset(&tenants)?;
        self.users.reset(&tenants)?;

        for stored in &events {
            self.apply_envelope(&stored.to_envelope())?;
        }
        tracing::info!(events = events.len(), tenants = tenants.len(), "read models rebuilt");
        Ok(events.len())
    }
}
