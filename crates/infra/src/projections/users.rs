//! Users read model.
//!
//! Built from `auth.user` streams. Besides the directory rows it keeps the
//! name → email → user indexes that the login exchange resolves through.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use stockroom_auth::{CredentialDirectory, StoredCredential, UserEvent, UserProfile, normalize_key};
use stockroom_core::{Aggregate, AggregateId, TenantId, UserId};
use stockroom_events::EventEnvelope;

use super::{ProjectionError, StreamCursors};
use crate::read_model::{ReadModelError, TenantStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReadModel {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    /// Last profile change (registration or admin flag).
    pub updated_at: DateTime<Utc>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub password_hash: String,
}

#[derive(Debug, Default)]
struct Indexes {
    email_by_name: HashMap<(TenantId, String), String>,
    user_by_email: HashMap<(TenantId, String), UserId>,
}

pub struct UsersProjection<S>
where
    S: TenantStore<UserId, UserReadModel>,
{
    store: S,
    cursors: StreamCursors,
    indexes: RwLock<Indexes>,
}

impl<S> UsersProjection<S>
where
    S: TenantStore<UserId, UserReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
            indexes: RwLock::new(Indexes::default()),
        }
    }

    pub fn get(&self, tenant_id: TenantId, user_id: &UserId) -> Option<UserReadModel> {
        self.store.get(tenant_id, user_id)
    }

    /// Users of a tenant ordered by name.
    pub fn list(&self, tenant_id: TenantId) -> Vec<UserReadModel> {
        let mut users = self.store.list(tenant_id);
        users.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        users
    }

    /// Display name for an actor, if the user is known.
    pub fn display_name(&self, tenant_id: TenantId, user_id: &UserId) -> Option<String> {
        self.store.get(tenant_id, user_id).map(|u| u.name)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != UserProfile::AGGREGATE_TYPE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if !self.cursors.is_next(tenant_id, aggregate_id, seq)? {
            return Ok(());
        }

        let event: UserEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            UserEvent::Registered(e) => {
                check_stream(tenant_id, aggregate_id, e.tenant_id, e.user_id)?;
                if let Ok(mut idx) = self.indexes.write() {
                    idx.email_by_name
                        .insert((tenant_id, normalize_key(&e.name)), e.email.clone());
                    idx.user_by_email
                        .insert((tenant_id, normalize_key(&e.email)), e.user_id);
                }
                self.store.upsert(
                    tenant_id,
                    e.user_id,
                    UserReadModel {
                        user_id: e.user_id,
                        tenant_id,
                        name: e.name,
                        email: e.email,
                        is_admin: e.is_admin,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                        last_sign_in_at: None,
                        password_hash: e.password_hash,
                    },
                )?;
            }
            UserEvent::AdminFlagChanged(e) => {
                check_stream(tenant_id, aggregate_id, e.tenant_id, e.user_id)?;
                let mut row = self.existing(tenant_id, &e.user_id)?;
                row.is_admin = e.is_admin;
                row.updated_at = e.occurred_at;
                self.store.upsert(tenant_id, e.user_id, row)?;
            }
            UserEvent::SignedIn(e) => {
                check_stream(tenant_id, aggregate_id, e.tenant_id, e.user_id)?;
                let mut row = self.existing(tenant_id, &e.user_id)?;
                row.last_sign_in_at = Some(e.occurred_at);
                self.store.upsert(tenant_id, e.user_id, row)?;
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }

    pub fn reset(&self, tenants: &[TenantId]) -> Result<(), ReadModelError> {
        self.cursors.clear();
        if let Ok(mut idx) = self.indexes.write() {
            *idx = Indexes::default();
        }
        for t in tenants {
            self.store.clear_tenant(*t)?;
        }
        Ok(())
    }

    fn existing(&self, tenant_id: TenantId, user_id: &UserId) -> Result<UserReadModel, ProjectionError> {
        self.store
            .get(tenant_id, user_id)
            .ok_or_else(|| ProjectionError::MissingRow(format!("user {user_id}")))
    }
}

fn check_stream(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    event_tenant: TenantId,
    user_id: UserId,
) -> Result<(), ProjectionError> {
    if event_tenant != tenant_id || AggregateId::from(user_id) != aggregate_id {
        return Err(ProjectionError::TenantIsolation(format!(
            "user event for {user_id} does not belong to stream {aggregate_id} of tenant {tenant_id}"
        )));
    }
    Ok(())
}

impl<S> CredentialDirectory for UsersProjection<S>
where
    S: TenantStore<UserId, UserReadModel>,
{
    fn email_for_name(&self, tenant_id: TenantId, name: &str) -> Option<String> {
        let idx = self.indexes.read().ok()?;
        idx.email_by_name.get(&(tenant_id, normalize_key(name))).cloned()
    }

    fn credential_for_email(&self, tenant_id: TenantId, email: &str) -> Option<StoredCredential> {
        let user_id = {
            let idx = self.indexes.read().ok()?;
            *idx.user_by_email.get(&(tenant_id, normalize_key(email)))?
        };
        self.store.get(tenant_id, &user_id).map(|u| StoredCredential {
            user_id: u.user_id,
            tenant_id: u.tenant_id,
            name: u.name,
            password_hash: u.password_hash,
            is_admin: u.is_admin,
        })
    }
}
