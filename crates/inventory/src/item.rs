use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockroom_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, Quantity, TenantId, UserId,
};
use stockroom_events::{Command, Event};

use crate::stock::{Direction, StockWarning, apply_movement};
use crate::threshold::{LowStockThreshold, StockLevel, classify};

/// Upper bound on image references attached to one movement.
pub const MAX_IMAGES_PER_MOVEMENT: usize = 10;

/// Reason recorded for the opening movement when none is given.
pub const INITIAL_STOCK_REASON: &str = "initial stock";

/// Item identifier (one event stream per item).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub AggregateId);

impl ItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Movement record identifier (unique across the tenant).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementId(pub Uuid);

impl MovementId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for MovementId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for MovementId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for MovementId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(MovementId)
            .map_err(|e| DomainError::invalid_id(format!("MovementId: {e}")))
    }
}

/// Descriptive fields of an item. Stock is never part of this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub name: String,
    pub category: String,
    pub unit: String,
    pub is_regular: bool,
    pub location: Option<String>,
    pub notes: Option<String>,
}

impl ItemDetails {
    fn validated(&self) -> Result<ItemDetails, DomainError> {
        Ok(ItemDetails {
            name: required(&self.name, "name")?,
            category: required(&self.category, "category")?,
            unit: required(&self.unit, "unit")?,
            is_regular: self.is_regular,
            location: optional(self.location.as_deref()),
            notes: optional(self.notes.as_deref()),
        })
    }
}

/// Partial update of `ItemDetails`. `None` keeps the current value; an empty
/// string clears `location` / `notes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetailsPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub is_regular: Option<bool>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

impl ItemDetailsPatch {
    fn merged_onto(&self, current: &ItemDetails) -> ItemDetails {
        ItemDetails {
            name: self.name.clone().unwrap_or_else(|| current.name.clone()),
            category: self.category.clone().unwrap_or_else(|| current.category.clone()),
            unit: self.unit.clone().unwrap_or_else(|| current.unit.clone()),
            is_regular: self.is_regular.unwrap_or(current.is_regular),
            location: match &self.location {
                Some(v) => Some(v.clone()),
                None => current.location.clone(),
            },
            notes: match &self.notes {
                Some(v) => Some(v.clone()),
                None => current.notes.clone(),
            },
        }
    }
}

fn required(value: &str, field: &str) -> Result<String, DomainError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(v.to_string())
}

fn optional(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

fn normalize_reason(reason: &str, fallback: &str) -> String {
    let r = reason.trim();
    if r.is_empty() { fallback.to_string() } else { r.to_string() }
}

fn normalize_images(refs: &[String]) -> Result<Vec<String>, DomainError> {
    let cleaned: Vec<String> = refs
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect();
    if cleaned.len() > MAX_IMAGES_PER_MOVEMENT {
        return Err(DomainError::validation(format!(
            "at most {MAX_IMAGES_PER_MOVEMENT} images per movement"
        )));
    }
    Ok(cleaned)
}

/// Aggregate root: Item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    id: ItemId,
    tenant_id: Option<TenantId>,
    details: Option<ItemDetails>,
    threshold: LowStockThreshold,
    stock: Quantity,
    movements: u64,
    version: u64,
}

impl Item {
    /// Empty, not-yet-created instance for rehydration.
    pub fn empty(id: ItemId) -> Self {
        Self {
            id,
            tenant_id: None,
            details: None,
            threshold: LowStockThreshold::NoThreshold,
            stock: Quantity::ZERO,
            movements: 0,
            version: 0,
        }
    }

    pub fn is_created(&self) -> bool {
        self.details.is_some()
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn details(&self) -> Option<&ItemDetails> {
        self.details.as_ref()
    }

    pub fn stock(&self) -> Quantity {
        self.stock
    }

    pub fn threshold(&self) -> LowStockThreshold {
        self.threshold
    }

    pub fn level(&self) -> StockLevel {
        classify(self.stock, self.threshold)
    }

    /// Number of movement records in this item's ledger.
    pub fn movement_count(&self) -> u64 {
        self.movements
    }
}

impl AggregateRoot for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Opening stock recorded together with the item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialStock {
    pub movement_id: MovementId,
    pub quantity: Quantity,
    pub reason: String,
    pub image_refs: Vec<String>,
}

/// Command: CreateItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateItem {
    pub tenant_id: TenantId,
    pub item_id: ItemId,
    pub details: ItemDetails,
    pub threshold: LowStockThreshold,
    pub initial_stock: Option<InitialStock>,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateItemDetails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItemDetails {
    pub tenant_id: TenantId,
    pub item_id: ItemId,
    pub patch: ItemDetailsPatch,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetLowStockThreshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetLowStockThreshold {
    pub tenant_id: TenantId,
    pub item_id: ItemId,
    pub threshold: LowStockThreshold,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordMovement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMovement {
    pub tenant_id: TenantId,
    pub item_id: ItemId,
    pub movement_id: MovementId,
    pub direction: Direction,
    pub quantity: Quantity,
    pub reason: String,
    pub image_refs: Vec<String>,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemCommand {
    CreateItem(CreateItem),
    UpdateDetails(UpdateItemDetails),
    SetThreshold(SetLowStockThreshold),
    RecordMovement(RecordMovement),
}

impl Command for ItemCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        match self {
            ItemCommand::CreateItem(c) => c.item_id.0,
            ItemCommand::UpdateDetails(c) => c.item_id.0,
            ItemCommand::SetThreshold(c) => c.item_id.0,
            ItemCommand::RecordMovement(c) => c.item_id.0,
        }
    }
}

/// Event: ItemCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCreated {
    pub tenant_id: TenantId,
    pub item_id: ItemId,
    pub details: ItemDetails,
    pub threshold: LowStockThreshold,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemDetailsUpdated (carries the full new details).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetailsUpdated {
    pub tenant_id: TenantId,
    pub item_id: ItemId,
    pub details: ItemDetails,
    pub updated_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LowStockThresholdSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockThresholdSet {
    pub tenant_id: TenantId,
    pub item_id: ItemId,
    pub threshold: LowStockThreshold,
    pub updated_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockMoved. This is the movement record: immutable, and its
/// `stock_after` is the item's stock once the movement is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMoved {
    pub tenant_id: TenantId,
    pub item_id: ItemId,
    pub movement_id: MovementId,
    pub direction: Direction,
    pub quantity: Quantity,
    pub stock_after: Quantity,
    pub reason: String,
    pub image_refs: Vec<String>,
    pub recorded_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

impl StockMoved {
    /// Advisory warnings this movement raised when it was recorded.
    pub fn warnings(&self) -> Vec<StockWarning> {
        if self.direction == Direction::Out && self.stock_after.is_zero() {
            vec![StockWarning::StockDepleted]
        } else {
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemEvent {
    ItemCreated(ItemCreated),
    DetailsUpdated(ItemDetailsUpdated),
    ThresholdSet(LowStockThresholdSet),
    StockMoved(StockMoved),
}

impl ItemEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            ItemEvent::ItemCreated(e) => e.tenant_id,
            ItemEvent::DetailsUpdated(e) => e.tenant_id,
            ItemEvent::ThresholdSet(e) => e.tenant_id,
            ItemEvent::StockMoved(e) => e.tenant_id,
        }
    }

    pub fn item_id(&self) -> ItemId {
        match self {
            ItemEvent::ItemCreated(e) => e.item_id,
            ItemEvent::DetailsUpdated(e) => e.item_id,
            ItemEvent::ThresholdSet(e) => e.item_id,
            ItemEvent::StockMoved(e) => e.item_id,
        }
    }
}

impl Event for ItemEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ItemEvent::ItemCreated(_) => "inventory.item.created",
            ItemEvent::DetailsUpdated(_) => "inventory.item.details_updated",
            ItemEvent::ThresholdSet(_) => "inventory.item.threshold_set",
            ItemEvent::StockMoved(_) => "inventory.item.stock_moved",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ItemEvent::ItemCreated(e) => e.occurred_at,
            ItemEvent::DetailsUpdated(e) => e.occurred_at,
            ItemEvent::ThresholdSet(e) => e.occurred_at,
            ItemEvent::StockMoved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Item {
    const AGGREGATE_TYPE: &'static str = "inventory.item";

    type Command = ItemCommand;
    type Event = ItemEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ItemEvent::ItemCreated(e) => {
                self.id = e.item_id;
                self.tenant_id = Some(e.tenant_id);
                self.details = Some(e.details.clone());
                self.threshold = e.threshold;
                self.stock = Quantity::ZERO;
            }
            ItemEvent::DetailsUpdated(e) => {
                self.details = Some(e.details.clone());
            }
            ItemEvent::ThresholdSet(e) => {
                self.threshold = e.threshold;
            }
            ItemEvent::StockMoved(e) => {
                self.stock = e.stock_after;
                self.movements += 1;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ItemCommand::CreateItem(cmd) => self.handle_create(cmd),
            ItemCommand::UpdateDetails(cmd) => self.handle_update(cmd),
            ItemCommand::SetThreshold(cmd) => self.handle_threshold(cmd),
            ItemCommand::RecordMovement(cmd) => self.handle_movement(cmd),
        }
    }
}

impl Item {
    fn ensure_existing(&self, tenant_id: TenantId, item_id: ItemId) -> Result<&ItemDetails, DomainError> {
        let details = self.details.as_ref().ok_or_else(DomainError::not_found)?;
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != item_id {
            return Err(DomainError::invariant("item_id mismatch"));
        }
        Ok(details)
    }

    fn handle_create(&self, cmd: &CreateItem) -> Result<Vec<ItemEvent>, DomainError> {
        if self.is_created() {
            return Err(DomainError::conflict("item already exists"));
        }
        let details = cmd.details.validated()?;

        let mut events = vec![ItemEvent::ItemCreated(ItemCreated {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            details,
            threshold: cmd.threshold,
            created_by: cmd.actor,
            occurred_at: cmd.occurred_at,
        })];

        // Opening stock becomes the first ledger entry of the same batch.
        if let Some(initial) = cmd.initial_stock.as_ref().filter(|i| !i.quantity.is_zero()) {
            let change = apply_movement(Quantity::ZERO, Direction::In, initial.quantity)?;
            events.push(ItemEvent::StockMoved(StockMoved {
                tenant_id: cmd.tenant_id,
                item_id: cmd.item_id,
                movement_id: initial.movement_id,
                direction: Direction::In,
                quantity: initial.quantity,
                stock_after: change.stock_after,
                reason: normalize_reason(&initial.reason, INITIAL_STOCK_REASON),
                image_refs: normalize_images(&initial.image_refs)?,
                recorded_by: cmd.actor,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_update(&self, cmd: &UpdateItemDetails) -> Result<Vec<ItemEvent>, DomainError> {
        let current = self.ensure_existing(cmd.tenant_id, cmd.item_id)?;
        let next = cmd.patch.merged_onto(current).validated()?;
        if &next == current {
            return Ok(vec![]);
        }
        Ok(vec![ItemEvent::DetailsUpdated(ItemDetailsUpdated {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            details: next,
            updated_by: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_threshold(&self, cmd: &SetLowStockThreshold) -> Result<Vec<ItemEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.item_id)?;
        if cmd.threshold == self.threshold {
            return Ok(vec![]);
        }
        Ok(vec![ItemEvent::ThresholdSet(LowStockThresholdSet {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            threshold: cmd.threshold,
            updated_by: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_movement(&self, cmd: &RecordMovement) -> Result<Vec<ItemEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.item_id)?;
        let change = apply_movement(self.stock, cmd.direction, cmd.quantity)?;

        Ok(vec![ItemEvent::StockMoved(StockMoved {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            movement_id: cmd.movement_id,
            direction: cmd.direction,
            quantity: cmd.quantity,
            stock_after: change.stock_after,
            reason: normalize_reason(&cmd.reason, cmd.direction.default_reason()),
            image_refs: normalize_images(&cmd.image_refs)?,
            recorded_by: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_events::execute;

    fn q(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    fn details(name: &str) -> ItemDetails {
        ItemDetails {
            name: name.to_string(),
            category: "cleaning".to_string(),
            unit: "bottle".to_string(),
            is_regular: true,
            location: None,
            notes: None,
        }
    }

    fn create_cmd(tenant_id: TenantId, item_id: ItemId, initial: Option<&str>) -> ItemCommand {
        ItemCommand::CreateItem(CreateItem {
            tenant_id,
            item_id,
            details: details("Bleach"),
            threshold: LowStockThreshold::NoThreshold,
            initial_stock: initial.map(|s| InitialStock {
                movement_id: MovementId::new(),
                quantity: q(s),
                reason: String::new(),
                image_refs: vec![],
            }),
            actor: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    fn movement(tenant_id: TenantId, item_id: ItemId, direction: Direction, qty: &str) -> ItemCommand {
        ItemCommand::RecordMovement(RecordMovement {
            tenant_id,
            item_id,
            movement_id: MovementId::new(),
            direction,
            quantity: q(qty),
            reason: "weekly restock".to_string(),
            image_refs: vec![],
            actor: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    fn created(initial: Option<&str>) -> (TenantId, ItemId, Item) {
        let tenant_id = TenantId::new();
        let item_id = ItemId::new(AggregateId::new());
        let mut item = Item::empty(item_id);
        execute(&mut item, &create_cmd(tenant_id, item_id, initial)).unwrap();
        (tenant_id, item_id, item)
    }

    #[test]
    fn create_with_initial_stock_emits_opening_movement() {
        let tenant_id = TenantId::new();
        let item_id = ItemId::new(AggregateId::new());
        let item = Item::empty(item_id);

        let events = item.handle(&create_cmd(tenant_id, item_id, Some("12"))).unwrap();
        assert_eq!(events.len(), 2);

        let ItemEvent::StockMoved(m) = &events[1] else {
            panic!("expected StockMoved");
        };
        assert_eq!(m.direction, Direction::In);
        assert_eq!(m.stock_after, q("12"));
        assert_eq!(m.reason, INITIAL_STOCK_REASON);
    }

    #[test]
    fn create_with_zero_initial_stock_has_no_movement() {
        let (_, _, item) = created(Some("0"));
        assert_eq!(item.movement_count(), 0);
        assert_eq!(item.version(), 1);
    }

    #[test]
    fn create_requires_name_category_and_unit() {
        let tenant_id = TenantId::new();
        let item_id = ItemId::new(AggregateId::new());
        let item = Item::empty(item_id);

        let mut cmd = match create_cmd(tenant_id, item_id, None) {
            ItemCommand::CreateItem(c) => c,
            _ => unreachable!(),
        };
        cmd.details.unit = "   ".to_string();

        let err = item.handle(&ItemCommand::CreateItem(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn create_twice_conflicts() {
        let (tenant_id, item_id, item) = created(None);
        let err = item.handle(&create_cmd(tenant_id, item_id, None)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn outbound_over_stock_emits_nothing() {
        let (tenant_id, item_id, mut item) = created(Some("3"));
        let before = item.clone();

        let err = execute(&mut item, &movement(tenant_id, item_id, Direction::Out, "4")).unwrap_err();

        assert!(matches!(err, DomainError::InsufficientStock { .. }));
        assert_eq!(item, before);
    }

    #[test]
    fn movement_records_stock_after_and_default_reason() {
        let (tenant_id, item_id, mut item) = created(Some("3"));

        let mut cmd = match movement(tenant_id, item_id, Direction::Out, "1.5") {
            ItemCommand::RecordMovement(c) => c,
            _ => unreachable!(),
        };
        cmd.reason = "  ".to_string();

        let events = execute(&mut item, &ItemCommand::RecordMovement(cmd)).unwrap();
        let ItemEvent::StockMoved(m) = &events[0] else {
            panic!("expected StockMoved");
        };
        assert_eq!(m.stock_after, q("1.5"));
        assert_eq!(m.reason, "stock out");
        assert_eq!(item.stock(), q("1.5"));
    }

    #[test]
    fn movement_on_unknown_item_is_not_found() {
        let item_id = ItemId::new(AggregateId::new());
        let item = Item::empty(item_id);
        let err = item
            .handle(&movement(TenantId::new(), item_id, Direction::In, "1"))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn movement_from_other_tenant_is_rejected() {
        let (_, item_id, item) = created(Some("3"));
        let err = item
            .handle(&movement(TenantId::new(), item_id, Direction::Out, "1"))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn too_many_images_is_a_validation_error() {
        let (tenant_id, item_id, item) = created(Some("3"));
        let mut cmd = match movement(tenant_id, item_id, Direction::In, "1") {
            ItemCommand::RecordMovement(c) => c,
            _ => unreachable!(),
        };
        cmd.image_refs = (0..=MAX_IMAGES_PER_MOVEMENT).map(|i| format!("{i}.jpg")).collect();

        let err = item.handle(&ItemCommand::RecordMovement(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn threshold_change_reclassifies() {
        let (tenant_id, item_id, mut item) = created(Some("3"));
        assert_eq!(item.level(), StockLevel::Sufficient);

        let cmd = ItemCommand::SetThreshold(SetLowStockThreshold {
            tenant_id,
            item_id,
            threshold: LowStockThreshold::Threshold(q("3")),
            actor: UserId::new(),
            occurred_at: Utc::now(),
        });
        execute(&mut item, &cmd).unwrap();
        assert_eq!(item.level(), StockLevel::Critical);

        // Setting the same threshold again is a no-op.
        assert!(item.handle(&cmd).unwrap().is_empty());
    }

    #[test]
    fn patch_clears_location_and_ignores_noop() {
        let (tenant_id, item_id, mut item) = created(None);

        let set = ItemCommand::UpdateDetails(UpdateItemDetails {
            tenant_id,
            item_id,
            patch: ItemDetailsPatch {
                location: Some("Shelf B".to_string()),
                ..Default::default()
            },
            actor: UserId::new(),
            occurred_at: Utc::now(),
        });
        execute(&mut item, &set).unwrap();
        assert_eq!(item.details().unwrap().location.as_deref(), Some("Shelf B"));
        assert!(item.handle(&set).unwrap().is_empty());

        let clear = ItemCommand::UpdateDetails(UpdateItemDetails {
            tenant_id,
            item_id,
            patch: ItemDetailsPatch {
                location: Some(String::new()),
                ..Default::default()
            },
            actor: UserId::new(),
            occurred_at: Utc::now(),
        });
        execute(&mut item, &clear).unwrap();
        assert_eq!(item.details().unwrap().location, None);
    }

    #[test]
    fn events_round_trip_through_json() {
        let tenant_id = TenantId::new();
        let item_id = ItemId::new(AggregateId::new());
        let events = Item::empty(item_id)
            .handle(&create_cmd(tenant_id, item_id, Some("2.5")))
            .unwrap();

        let mut replayed = Item::empty(item_id);
        for ev in &events {
            let json = serde_json::to_value(ev).unwrap();
            let back: ItemEvent = serde_json::from_value(json).unwrap();
            replayed.apply(&back);
        }
        assert_eq!(replayed.stock(), q("2.5"));
        assert_eq!(replayed.version(), 2);
    }
}
