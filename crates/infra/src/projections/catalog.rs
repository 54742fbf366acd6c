//! Item catalog read model: one row per item with its current stock and level.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use stockroom_core::{Aggregate, Quantity, TenantId, UserId};
use stockroom_events::EventEnvelope;
use stockroom_inventory::{Item, ItemCreated, ItemEvent, ItemId, LowStockThreshold, StockLevel, classify};

use super::{ProjectionError, StreamCursors, decode_item_event};
use crate::read_model::{ReadModelError, TenantStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub item_id: ItemId,
    pub tenant_id: TenantId,
    pub name: String,
    pub category: String,
    pub unit: String,
    pub is_regular: bool,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub stock: Quantity,
    pub low_stock_threshold: LowStockThreshold,
    pub level: StockLevel,
    pub movement_count: u64,
    pub last_movement_reason: Option<String>,
    pub last_movement_at: Option<DateTime<Utc>>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogItem {
    fn created(e: ItemCreated) -> Self {
        let mut row = Self {
            item_id: e.item_id,
            tenant_id: e.tenant_id,
            name: e.details.name,
            category: e.details.category,
            unit: e.details.unit,
            is_regular: e.details.is_regular,
            location: e.details.location,
            notes: e.details.notes,
            stock: Quantity::ZERO,
            low_stock_threshold: e.threshold,
            level: StockLevel::Critical,
            movement_count: 0,
            last_movement_reason: None,
            last_movement_at: None,
            created_by: e.created_by,
            created_at: e.occurred_at,
            updated_at: e.occurred_at,
        };
        row.reclassify();
        row
    }

    /// Fold a follow-up event into the row. A second `ItemCreated` is ignored.
    ///
    /// Detail and threshold events overwrite fields, so folding one twice is
    /// harmless. `StockMoved` counts, and must be folded exactly once.
    pub fn evolve(&mut self, event: ItemEvent) {
        match event {
            ItemEvent::ItemCreated(_) => return,
            ItemEvent::DetailsUpdated(e) => {
                self.name = e.details.name;
                self.category = e.details.category;
                self.unit = e.details.unit;
                self.is_regular = e.details.is_regular;
                self.location = e.details.location;
                self.notes = e.details.notes;
                self.updated_at = e.occurred_at;
            }
            ItemEvent::ThresholdSet(e) => {
                self.low_stock_threshold = e.threshold;
                self.updated_at = e.occurred_at;
            }
            ItemEvent::StockMoved(e) => {
                self.stock = e.stock_after;
                self.movement_count += 1;
                self.last_movement_reason = Some(e.reason);
                self.last_movement_at = Some(e.occurred_at);
                self.updated_at = e.occurred_at;
            }
        }
        self.reclassify();
    }

    /// The row described by a stream's events from its creation onward,
    /// built without touching any store. `None` unless the first event is
    /// `ItemCreated`.
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a ItemEvent>) -> Option<Self> {
        let mut events = events.into_iter();
        let mut row = match events.next()? {
            ItemEvent::ItemCreated(e) => Self::created(e.clone()),
            _ => return None,
        };
        for e in events {
            row.evolve(e.clone());
        }
        Some(row)
    }

    fn reclassify(&mut self) {
        self.level = classify(self.stock, self.low_stock_threshold);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogSort {
    /// Most recently updated first.
    #[default]
    Recent,
    /// Lowest stock first.
    Stock,
}

/// Filters for the catalog list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CatalogQuery {
    pub category: Option<String>,
    /// Case-insensitive substring of the item name.
    pub q: Option<String>,
    #[serde(default)]
    pub regular_only: bool,
    #[serde(default)]
    pub sort: CatalogSort,
}

impl CatalogQuery {
    fn matches(&self, item: &CatalogItem) -> bool {
        if self.regular_only && !item.is_regular {
            return false;
        }
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            if !item.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(q) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            if !item.name.to_lowercase().contains(&q.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

/// Catalog projection over `inventory.item` streams.
#[derive(Debug)]
pub struct CatalogProjection<S>
where
    S: TenantStore<ItemId, CatalogItem>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> CatalogProjection<S>
where
    S: TenantStore<ItemId, CatalogItem>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, item_id: &ItemId) -> Option<CatalogItem> {
        self.store.get(tenant_id, item_id)
    }

    pub fn list(&self, tenant_id: TenantId, query: &CatalogQuery) -> Vec<CatalogItem> {
        let mut items: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|i| query.matches(i))
            .collect();

        match query.sort {
            CatalogSort::Recent => items.sort_by(|a, b| {
                b.updated_at
                    .cmp(&a.updated_at)
                    .then_with(|| a.name.cmp(&b.name))
            }),
            CatalogSort::Stock => {
                items.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.name.cmp(&b.name)))
            }
        }
        items
    }

    /// Regular items with their threshold and level, by name.
    pub fn thresholds(&self, tenant_id: TenantId) -> Vec<CatalogItem> {
        let mut items: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|i| i.is_regular)
            .collect();
        items.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        items
    }

    /// Apply one published envelope (idempotent, in-order per stream).
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

        let event = decode_item_event(envelope)?;
        let item_id = event.item_id();

        let row = match event {
            ItemEvent::ItemCreated(e) => CatalogItem::created(e),
            other => {
                let mut row = self.existing(tenant_id, &item_id)?;
                row.evolve(other);
                row
            }
        };
        self.store.upsert(tenant_id, item_id, row)?;

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }

    pub fn reset(&self, tenants: &[TenantId]) -> Result<(), ReadModelError> {
        self.cursors.clear();
        for t in tenants {
            self.store.clear_tenant(*t)?;
        }
        Ok(())
    }

    fn existing(&self, tenant_id: TenantId, item_id: &ItemId) -> Result<CatalogItem, ProjectionError> {
        self.store
            .get(tenant_id, item_id)
            .ok_or_else(|| ProjectionError::MissingRow(format!("catalog item {item_id}")))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::Duration;
    use uuid::Uuid;

    use stockroom_core::AggregateId;
    use stockroom_events::Event;
    use stockroom_inventory::{Direction, ItemDetails, LowStockThresholdSet, MovementId, StockMoved};

    use super::*;
    use crate::read_model::InMemoryTenantStore;

    fn envelope(seq: u64, event: &ItemEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            event.tenant_id(),
            event.item_id().0,
            Item::AGGREGATE_TYPE.to_string(),
            event.event_type().to_string(),
            seq,
            serde_json::to_value(event).unwrap(),
        )
    }

    fn created(tenant_id: TenantId, name: &str, category: &str, is_regular: bool, minutes_ago: i64) -> ItemEvent {
        ItemEvent::ItemCreated(ItemCreated {
            tenant_id,
            item_id: ItemId::new(AggregateId::new()),
            details: ItemDetails {
                name: name.to_string(),
                category: category.to_string(),
                unit: "pcs".to_string(),
                is_regular,
                location: None,
                notes: None,
            },
            threshold: LowStockThreshold::NoThreshold,
            created_by: UserId::new(),
            occurred_at: Utc::now() - Duration::minutes(minutes_ago),
        })
    }

    #[test]
    fn filters_and_sorts_the_catalog() {
        let p = CatalogProjection::new(InMemoryTenantStore::new());
        let t = TenantId::new();
        for e in [
            created(t, "Nitrile gloves", "Safety", true, 3),
            created(t, "Goggles", "safety", false, 2),
            created(t, "Glue stick", "office", true, 1),
        ] {
            p.apply_envelope(&envelope(1, &e)).unwrap();
        }

        let names = |items: Vec<CatalogItem>| items.into_iter().map(|i| i.name).collect::<Vec<_>>();

        assert_eq!(names(p.list(t, &CatalogQuery::default())), ["Glue stick", "Goggles", "Nitrile gloves"]);

        let safety = CatalogQuery { category: Some("SAFETY".to_string()), ..Default::default() };
        assert_eq!(names(p.list(t, &safety)), ["Goggles", "Nitrile gloves"]);

        let search = CatalogQuery { q: Some(" GL ".to_string()), regular_only: true, ..Default::default() };
        assert_eq!(names(p.list(t, &search)), ["Glue stick", "Nitrile gloves"]);

        assert_eq!(p.thresholds(t).len(), 2);
        assert!(p.list(TenantId::new(), &CatalogQuery::default()).is_empty());
    }

    #[test]
    fn threshold_changes_reclassify_and_replays_are_skipped() {
        let p = CatalogProjection::new(InMemoryTenantStore::new());
        let t = TenantId::new();
        let e = created(t, "Tape", "office", true, 0);
        let item_id = e.item_id();

        p.apply_envelope(&envelope(1, &e)).unwrap();
        assert_eq!(p.get(t, &item_id).unwrap().level, StockLevel::Critical);

        let set = ItemEvent::ThresholdSet(LowStockThresholdSet {
            tenant_id: t,
            item_id,
            threshold: LowStockThreshold::Threshold("2".parse().unwrap()),
            updated_by: UserId::new(),
            occurred_at: Utc::now(),
        });
        p.apply_envelope(&envelope(2, &set)).unwrap();
        p.apply_envelope(&envelope(2, &set)).unwrap();

        let row = p.get(t, &item_id).unwrap();
        assert_eq!(row.low_stock_threshold.value(), Some("2".parse().unwrap()));
        assert_eq!(row.level, StockLevel::Critical);

        assert!(matches!(
            p.apply_envelope(&envelope(5, &set)),
            Err(ProjectionError::NonMonotonicSequence { last: 2, found: 5 })
        ));
    }

    #[test]
    fn events_for_another_tenant_are_refused() {
        let p = CatalogProjection::new(InMemoryTenantStore::new());
        let e = created(TenantId::new(), "Tape", "office", true, 0);
        let env = envelope(1, &e);
        let foreign = EventEnvelope::new(
            env.event_id(),
            TenantId::new(),
            env.aggregate_id(),
            env.aggregate_type().to_string(),
            env.event_type().to_string(),
            1,
            env.payload().clone(),
        );
        assert!(matches!(p.apply_envelope(&foreign), Err(ProjectionError::TenantIsolation(_))));
    }

    #[test]
    fn committed_events_fold_to_the_projected_row() {
        let p = CatalogProjection::new(InMemoryTenantStore::new());
        let t = TenantId::new();
        let first = created(t, "Tape", "office", true, 0);
        let item_id = first.item_id();
        let moved = ItemEvent::StockMoved(StockMoved {
            tenant_id: t,
            item_id,
            movement_id: MovementId::new(),
            direction: Direction::In,
            quantity: "4".parse().unwrap(),
            stock_after: "4".parse().unwrap(),
            reason: "initial stock".to_string(),
            image_refs: vec![],
            recorded_by: UserId::new(),
            occurred_at: Utc::now(),
        });
        let events = [first, moved];
        for (i, e) in events.iter().enumerate() {
            p.apply_envelope(&envelope(i as u64 + 1, e)).unwrap();
        }

        let row = CatalogItem::from_events(&events).unwrap();
        assert_eq!(row.stock, "4".parse().unwrap());
        assert_eq!(row.movement_count, 1);
        assert_eq!(p.get(t, &item_id), Some(row));

        assert!(CatalogItem::from_events(&events[1..]).is_none());
    }

    /// Refuses writes until `accept` is flipped on.
    struct Flaky {
        inner: InMemoryTenantStore<ItemId, CatalogItem>,
        accept: AtomicBool,
    }

    impl TenantStore<ItemId, CatalogItem> for Flaky {
        fn get(&self, tenant_id: TenantId, key: &ItemId) -> Option<CatalogItem> {
            self.inner.get(tenant_id, key)
        }
        fn upsert(&self, tenant_id: TenantId, key: ItemId, value: CatalogItem) -> Result<(), ReadModelError> {
            if !self.accept.load(Ordering::SeqCst) {
                return Err(ReadModelError::Poisoned);
            }
            self.inner.upsert(tenant_id, key, value)
        }
        fn list(&self, tenant_id: TenantId) -> Vec<CatalogItem> {
            self.inner.list(tenant_id)
        }
        fn clear_tenant(&self, tenant_id: TenantId) -> Result<(), ReadModelError> {
            self.inner.clear_tenant(tenant_id)
        }
    }

    #[test]
    fn a_failed_write_leaves_the_event_pending() {
        let p = CatalogProjection::new(Flaky {
            inner: InMemoryTenantStore::new(),
            accept: AtomicBool::new(false),
        });
        let t = TenantId::new();
        let e = created(t, "Tape", "office", true, 0);
        let item_id = e.item_id();

        assert!(matches!(
            p.apply_envelope(&envelope(1, &e)),
            Err(ProjectionError::ReadModel(ReadModelError::Poisoned))
        ));
        assert!(p.get(t, &item_id).is_none());

        // Same sequence number is still next in line.
        p.store.accept.store(true, Ordering::SeqCst);
        p.apply_envelope(&envelope(1, &e)).unwrap();
        assert_eq!(p.get(t, &item_id).unwrap().name, "Tape");
    }
}
