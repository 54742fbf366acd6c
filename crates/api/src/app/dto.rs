//! Request bodies and response views.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockroom_auth::{SessionTokens, UserRegistered};
use stockroom_core::{Quantity, TenantId, UserId};
use stockroom_infra::projections::{MovementRecord, UserReadModel};
use stockroom_inventory::{Direction, ItemId, MovementId, StockMoved, StockWarning};

// Auth

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    #[serde(alias = "safe_word")]
    pub secret: String,
    pub tenant_id: Option<TenantId>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub name: String,
    #[serde(alias = "safe_word")]
    pub secret: String,
    pub tenant_id: Option<TenantId>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub tokens: SessionTokens,
    pub user: SessionUser,
}

#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: UserId,
    pub tenant_id: TenantId,
    pub name: String,
    pub is_admin: bool,
}

#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub id: UserId,
    pub tenant_id: TenantId,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

impl From<UserReadModel> for ProfileView {
    fn from(u: UserReadModel) -> Self {
        Self {
            id: u.user_id,
            tenant_id: u.tenant_id,
            name: u.name,
            email: u.email,
            is_admin: u.is_admin,
            created_at: u.created_at,
            updated_at: u.updated_at,
            last_sign_in_at: u.last_sign_in_at,
        }
    }
}

impl ProfileView {
    /// A profile as it stands right after registration.
    pub fn registered(e: &UserRegistered) -> Self {
        Self {
            id: e.user_id,
            tenant_id: e.tenant_id,
            name: e.name.clone(),
            email: e.email.clone(),
            is_admin: e.is_admin,
            created_at: e.occurred_at,
            updated_at: e.occurred_at,
            last_sign_in_at: None,
        }
    }
}

/// Echo of a promote/demote.
#[derive(Debug, Serialize)]
pub struct AdminFlagView {
    pub id: UserId,
    pub name: Option<String>,
    pub is_admin: bool,
}

// Items

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    pub category: String,
    pub unit: String,
    #[serde(default)]
    pub is_regular: bool,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub low_stock_threshold: Option<Decimal>,
    pub initial_stock: Option<Decimal>,
    pub initial_reason: Option<String>,
    #[serde(default)]
    pub image_refs: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ThresholdRequest {
    /// `null` clears the threshold.
    pub threshold: Option<Decimal>,
}

// Movements

#[derive(Debug, Deserialize)]
pub struct RecordMovementRequest {
    pub item_id: String,
    pub direction: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub image_refs: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// A ledger record with the actor's and item's current names joined in.
#[derive(Debug, Serialize)]
pub struct MovementView {
    pub id: MovementId,
    pub item_id: ItemId,
    pub item_name: Option<String>,
    pub direction: Direction,
    pub quantity: Quantity,
    pub stock_after: Quantity,
    pub reason: String,
    pub image_refs: Vec<String>,
    pub recorded_by: UserId,
    pub recorded_by_name: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl MovementView {
    pub fn new(record: MovementRecord, item_name: Option<String>, recorded_by_name: Option<String>) -> Self {
        Self {
            id: record.movement_id,
            item_id: record.item_id,
            item_name,
            direction: record.direction,
            quantity: record.quantity,
            stock_after: record.stock_after,
            reason: record.reason,
            image_refs: record.image_refs,
            recorded_by: record.recorded_by,
            recorded_by_name,
            occurred_at: record.occurred_at,
        }
    }

    /// The view of a movement straight from its committed event.
    pub fn from_event(moved: &StockMoved, item_name: Option<String>, recorded_by_name: Option<String>) -> Self {
        Self {
            id: moved.movement_id,
            item_id: moved.item_id,
            item_name,
            direction: moved.direction,
            quantity: moved.quantity,
            stock_after: moved.stock_after,
            reason: moved.reason.clone(),
            image_refs: moved.image_refs.clone(),
            recorded_by: moved.recorded_by,
            recorded_by_name,
            occurred_at: moved.occurred_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MovementRecorded {
    pub movement: MovementView,
    pub stock_after: Quantity,
    pub warnings: Vec<StockWarning>,
}

// Uploads

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    /// Base64 data URL.
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub image_ref: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_fresh_registration_has_not_signed_in() {
        let at = Utc::now();
        let view = ProfileView::registered(&UserRegistered {
            tenant_id: TenantId::new(),
            user_id: UserId::new(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            is_admin: false,
            occurred_at: at,
        });

        assert_eq!(view.name, "Alice");
        assert_eq!((view.created_at, view.updated_at), (at, at));
        assert!(view.last_sign_in_at.is_none());

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn movement_view_mirrors_the_committed_event() {
        let moved = StockMoved {
            tenant_id: TenantId::new(),
            item_id: ItemId::new(stockroom_core::AggregateId::new()),
            movement_id: MovementId::new(),
            direction: Direction::Out,
            quantity: "1.5".parse().unwrap(),
            stock_after: "0".parse().unwrap(),
            reason: "used".to_string(),
            image_refs: vec!["a.webp".to_string()],
            recorded_by: UserId::new(),
            occurred_at: Utc::now(),
        };

        let view = MovementView::from_event(&moved, Some("Milk".to_string()), None);
        assert_eq!(view.id, moved.movement_id);
        assert_eq!(view.stock_after, moved.stock_after);
        assert_eq!(view.image_refs, moved.image_refs);
        assert_eq!(view.item_name.as_deref(), Some("Milk"));
        assert!(view.recorded_by_name.is_none());
    }
}
