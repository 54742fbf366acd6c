//! Command execution pipeline for event-sourced aggregates.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the aggregate's stream (tenant-scoped)
//!   ↓
//! 2. Rehydrate the aggregate from history
//!   ↓
//! 3. Handle the command (pure decision, produces events)
//!   ↓
//! 4. Append with ExpectedVersion::Exact(loaded version)
//!   ↓
//! 5. Publish committed envelopes to the bus (best-effort)
//! ```
//!
//! A concurrency failure at step 4 means another writer committed to the same
//! stream in between. The whole pipeline is re-run against the fresh history,
//! up to `MAX_ATTEMPTS` times, so the decision is always taken on the latest
//! state. This is what keeps two concurrent `out` movements from both passing
//! the stock check.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use stockroom_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, Quantity, TenantId};
use stockroom_events::{Command, EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// Attempts per command before a concurrency conflict is surfaced.
pub const MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Optimistic concurrency failure that survived every retry.
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    /// Cross-tenant or cross-aggregate stream mixing.
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    /// Deterministic domain conflict (duplicate name, existing item, ...).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: Quantity, requested: Quantity },

    /// Historical payload did not decode into the aggregate's event type.
    #[error("failed to decode stored event: {0}")]
    Deserialize(String),

    #[error(transparent)]
    Store(EventStoreError),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            EventStoreError::TenantIsolation(msg) => DispatchError::TenantIsolation(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::InvalidId(msg) => DispatchError::InvalidId(msg),
            DomainError::Conflict(msg) => DispatchError::Conflict(msg),
            DomainError::Unauthorized => DispatchError::Unauthorized,
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InsufficientStock { available, requested } => {
                DispatchError::InsufficientStock { available, requested }
            }
        }
    }
}

/// Result of a successful dispatch: the decided events and their stored form.
///
/// Both are empty when the command was a no-op.
#[derive(Debug, Clone)]
pub struct Committed<E> {
    pub events: Vec<E>,
    pub stored: Vec<StoredEvent>,
}

impl<E> Committed<E> {
    pub fn is_empty(&self) -> bool {
        self.stored.is_empty()
    }
}

/// Reusable command execution engine.
///
/// Generic over the store and the bus so tests run on in-memory
/// implementations and deployments on Postgres.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch a command to the aggregate it targets.
    ///
    /// `make_aggregate` builds the empty aggregate for the target id.
    pub async fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        command: A::Command,
        make_aggregate: impl Fn(AggregateId) -> A,
    ) -> Result<Committed<A::Event>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Command: Command,
        A::Event: stockroom_events::Event + Serialize + DeserializeOwned,
    {
        let aggregate_id = command.target_aggregate_id();
        let mut attempt = 1;

        loop {
            match self
                .try_dispatch(tenant_id, aggregate_id, &command, &make_aggregate)
                .await
            {
                Err(DispatchError::Concurrency(msg)) if attempt < MAX_ATTEMPTS => {
                    warn!(
                        %tenant_id,
                        %aggregate_id,
                        aggregate_type = A::AGGREGATE_TYPE,
                        attempt,
                        reason = %msg,
                        "concurrent append, retrying command"
                    );
                    attempt += 1;
                    tokio::task::yield_now().await;
                }
                other => return other,
            }
        }
    }

    async fn try_dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        command: &A::Command,
        make_aggregate: &impl Fn(AggregateId) -> A,
    ) -> Result<Committed<A::Event>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: stockroom_events::Event + Serialize + DeserializeOwned,
    {
        let history = self.store.load_stream(tenant_id, aggregate_id).await?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        let decided = aggregate.handle(command)?;
        if decided.is_empty() {
            debug!(%tenant_id, %aggregate_id, "command produced no events");
            return Ok(Committed {
                events: vec![],
                stored: vec![],
            });
        }

        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(tenant_id, aggregate_id, A::AGGREGATE_TYPE, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        let stored = self.store.append(uncommitted, expected).await?;
        info!(
            %tenant_id,
            %aggregate_id,
            aggregate_type = A::AGGREGATE_TYPE,
            events = stored.len(),
            "events committed"
        );

        // The store is the source of truth; a failed publish loses nothing.
        for ev in &stored {
            if let Err(err) = self.bus.publish(ev.to_envelope()) {
                warn!(event_id = %ev.event_id, error = ?err, "event publication failed");
            }
        }

        Ok(Committed {
            events: decided,
            stored,
        })
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // A buggy backend must never leak another tenant's history into a decision.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.tenant_id != tenant_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong tenant_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;

    use stockroom_core::UserId;
    use stockroom_events::InMemoryEventBus;
    use stockroom_inventory::{
        CreateItem, Direction, InitialStock, Item, ItemCommand, ItemDetails, ItemEvent, ItemId,
        LowStockThreshold, MovementId, RecordMovement,
    };

    use super::*;
    use crate::event_store::InMemoryEventStore;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

    fn q(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    fn create(tenant_id: TenantId, item_id: ItemId, initial: &str) -> ItemCommand {
        ItemCommand::CreateItem(CreateItem {
            tenant_id,
            item_id,
            details: ItemDetails {
                name: "Gloves".to_string(),
                category: "safety".to_string(),
                unit: "pair".to_string(),
                is_regular: true,
                location: None,
                notes: None,
            },
            threshold: LowStockThreshold::NoThreshold,
            initial_stock: Some(InitialStock {
                movement_id: MovementId::new(),
                quantity: q(initial),
                reason: String::new(),
                image_refs: vec![],
            }),
            actor: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    fn out(tenant_id: TenantId, item_id: ItemId, qty: &str) -> ItemCommand {
        ItemCommand::RecordMovement(RecordMovement {
            tenant_id,
            item_id,
            movement_id: MovementId::new(),
            direction: Direction::Out,
            quantity: q(qty),
            reason: "used".to_string(),
            image_refs: vec![],
            actor: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    fn make_item(id: AggregateId) -> Item {
        Item::empty(ItemId::new(id))
    }

    #[tokio::test]
    async fn create_commits_item_and_opening_movement_together() {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let sub = bus.subscribe();
        let dispatcher = CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), bus);
        let t = TenantId::new();
        let item_id = ItemId::new(AggregateId::new());

        let committed = dispatcher
            .dispatch::<Item>(t, create(t, item_id, "4"), make_item)
            .await
            .unwrap();

        assert_eq!(committed.stored.len(), 2);
        assert_eq!(committed.stored[0].aggregate_type, "inventory.item");
        assert!(matches!(committed.events[1], ItemEvent::StockMoved(_)));

        // Published after append.
        assert_eq!(sub.try_recv().unwrap().sequence_number(), 1);
        assert_eq!(sub.try_recv().unwrap().sequence_number(), 2);
    }

    #[tokio::test]
    async fn overdraw_is_rejected_without_writing() {
        let store = Arc::new(InMemoryEventStore::new());
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let dispatcher = CommandDispatcher::new(store.clone(), bus);
        let t = TenantId::new();
        let item_id = ItemId::new(AggregateId::new());
        dispatcher.dispatch::<Item>(t, create(t, item_id, "2"), make_item).await.unwrap();

        let err = dispatcher
            .dispatch::<Item>(t, out(t, item_id, "3"), make_item)
            .await
            .unwrap_err();

        match err {
            DispatchError::InsufficientStock { available, requested } => {
                assert_eq!(available, q("2"));
                assert_eq!(requested, q("3"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.load_stream(t, item_id.0).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_item_is_not_found() {
        let dispatcher = CommandDispatcher::new(
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemoryEventBus::<EventEnvelope<JsonValue>>::new()),
        );
        let t = TenantId::new();
        let err = dispatcher
            .dispatch::<Item>(t, out(t, ItemId::new(AggregateId::new()), "1"), make_item)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NotFound));
    }

    /// Fails the first `failures` appends with a concurrency error.
    struct FlakyStore {
        inner: InMemoryEventStore,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl EventStore for FlakyStore {
        async fn append(
            &self,
            events: Vec<UncommittedEvent>,
            expected_version: ExpectedVersion,
        ) -> Result<Vec<StoredEvent>, EventStoreError> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(EventStoreError::Concurrency("simulated".to_string()));
            }
            self.inner.append(events, expected_version).await
        }

        async fn load_stream(
            &self,
            tenant_id: TenantId,
            aggregate_id: AggregateId,
        ) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.load_stream(tenant_id, aggregate_id).await
        }

        async fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.load_all().await
        }
    }

    #[tokio::test]
    async fn concurrency_conflicts_are_retried_then_surfaced() {
        let t = TenantId::new();
        let bus: Bus = Arc::new(InMemoryEventBus::new());

        let store = FlakyStore {
            inner: InMemoryEventStore::new(),
            failures: AtomicUsize::new(MAX_ATTEMPTS - 1),
        };
        let dispatcher = CommandDispatcher::new(store, bus.clone());
        let ok = dispatcher
            .dispatch::<Item>(t, create(t, ItemId::new(AggregateId::new()), "1"), make_item)
            .await;
        assert!(ok.is_ok());

        let store = FlakyStore {
            inner: InMemoryEventStore::new(),
            failures: AtomicUsize::new(MAX_ATTEMPTS),
        };
        let dispatcher = CommandDispatcher::new(store, bus);
        let err = dispatcher
            .dispatch::<Item>(t, create(t, ItemId::new(AggregateId::new()), "1"), make_item)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Concurrency(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_outs_never_overdraw() {
        let store = Arc::new(InMemoryEventStore::new());
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let dispatcher = Arc::new(CommandDispatcher::new(store.clone(), bus));
        let t = TenantId::new();
        let item_id = ItemId::new(AggregateId::new());
        dispatcher.dispatch::<Item>(t, create(t, item_id, "5"), make_item).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let dispatcher = dispatcher.clone();
            handles.push(tokio::spawn(async move {
                dispatcher.dispatch::<Item>(t, out(t, item_id, "1"), make_item).await
            }));
        }

        let mut succeeded = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }
        assert!(succeeded <= 5);

        let history = store.load_stream(t, item_id.0).await.unwrap();
        let records: Vec<_> = history
            .iter()
            .filter_map(|e| match serde_json::from_value::<ItemEvent>(e.payload.clone()) {
                Ok(ItemEvent::StockMoved(m)) => Some(m),
                _ => None,
            })
            .collect();
        let stock = stockroom_inventory::ledger::replay(&records).unwrap();
        assert_eq!(stock, q(&(5 - succeeded).to_string()));
    }
}
