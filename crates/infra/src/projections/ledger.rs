//! Movement ledger read model.
//!
//! Every `StockMoved` becomes an immutable record. While applying, the
//! projection replays each record against the previous stock of its item, so a
//! stream whose `stock_after` values do not chain is refused instead of shown.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use stockroom_core::{Aggregate, Quantity, TenantId, UserId};
use stockroom_events::EventEnvelope;
use stockroom_inventory::ledger::next_stock;
use stockroom_inventory::{Direction, Item, ItemEvent, ItemId, MovementId};

use super::{ProjectionError, StreamCursors, decode_item_event};
use crate::read_model::{Page, Pagination, ReadModelError, TenantStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub movement_id: MovementId,
    pub tenant_id: TenantId,
    pub item_id: ItemId,
    pub direction: Direction,
    pub quantity: Quantity,
    pub stock_after: Quantity,
    pub reason: String,
    pub image_refs: Vec<String>,
    pub recorded_by: UserId,
    pub occurred_at: DateTime<Utc>,
    /// Position in the item's stream; breaks ties between equal timestamps.
    pub sequence_number: u64,
}

fn newest_first(a: &MovementRecord, b: &MovementRecord) -> std::cmp::Ordering {
    b.occurred_at
        .cmp(&a.occurred_at)
        .then_with(|| b.sequence_number.cmp(&a.sequence_number))
        .then_with(|| b.movement_id.0.cmp(&a.movement_id.0))
}

#[derive(Debug)]
pub struct LedgerProjection<S>
where
    S: TenantStore<MovementId, MovementRecord>,
{
    store: S,
    cursors: StreamCursors,
    stock: RwLock<HashMap<(TenantId, ItemId), Quantity>>,
}

impl<S> LedgerProjection<S>
where
    S: TenantStore<MovementId, MovementRecord>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
            stock: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, tenant_id: TenantId, movement_id: &MovementId) -> Option<MovementRecord> {
        self.store.get(tenant_id, movement_id)
    }

    /// Records of one item, newest first.
    pub fn for_item(&self, tenant_id: TenantId, item_id: ItemId) -> Vec<MovementRecord> {
        let mut records: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|r| r.item_id == item_id)
            .collect();
        records.sort_by(newest_first);
        records
    }

    /// All records of the tenant, newest first, one page at a time.
    pub fn list(&self, tenant_id: TenantId, pagination: Pagination) -> Page<MovementRecord> {
        let mut records = self.store.list(tenant_id);
        records.sort_by(newest_first);
        pagination.apply(records)
    }

    /// Stock implied by the records applied so far.
    pub fn replayed_stock(&self, tenant_id: TenantId, item_id: ItemId) -> Quantity {
        self.stock
            .read()
            .ok()
            .and_then(|m| m.get(&(tenant_id, item_id)).copied())
            .unwrap_or(Quantity::ZERO)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != Item::AGGREGATE_TYPE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.is_next(tenant_id, aggregate_id, seq)? {
            return Ok(());
        }

        if let ItemEvent::StockMoved(e) = decode_item_event(envelope)? {
            let previous = self.replayed_stock(tenant_id, e.item_id);
            let stock_after = next_stock(previous, &e).map_err(ProjectionError::Ledger)?;

            self.store.upsert(
                tenant_id,
                e.movement_id,
                MovementRecord {
                    movement_id: e.movement_id,
                    tenant_id,
                    item_id: e.item_id,
                    direction: e.direction,
                    quantity: e.quantity,
                    stock_after,
                    reason: e.reason,
                    image_refs: e.image_refs,
                    recorded_by: e.recorded_by,
                    occurred_at: e.occurred_at,
                    sequence_number: seq,
                },
            )?;
            if let Ok(mut m) = self.stock.write() {
                m.insert((tenant_id, e.item_id), stock_after);
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }

    pub fn reset(&self, tenants: &[TenantId]) -> Result<(), ReadModelError> {
        self.cursors.clear();
        if let Ok(mut m) = self.stock.write() {
            m.clear();
        }
        for t in tenants {
            self.store.clear_tenant(*t)?;
        }
        Ok(())
    }
}
