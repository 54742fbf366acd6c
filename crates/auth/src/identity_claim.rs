//! Uniqueness of display names and emails.
//!
//! Each (tenant, kind, key) pair is its own aggregate stream with a derived id,
//! so two concurrent registrations for the same name race on the same stream
//! and optimistic concurrency picks exactly one winner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId};
use stockroom_events::{Command, Event};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    Name,
    Email,
}

impl IdentityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityKind::Name => "name",
            IdentityKind::Email => "email",
        }
    }
}

/// Lowercased, trimmed lookup key. Names and emails compare case-insensitively.
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Stream id for a claim on `key`.
pub fn claim_id(tenant_id: TenantId, kind: IdentityKind, key: &str) -> AggregateId {
    AggregateId::derived(tenant_id, kind.as_str(), &normalize_key(key))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaim {
    id: AggregateId,
    holder: Option<UserId>,
    version: u64,
}

impl IdentityClaim {
    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            holder: None,
            version: 0,
        }
    }

    pub fn holder(&self) -> Option<UserId> {
        self.holder
    }
}

impl AggregateRoot for IdentityClaim {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimCommand {
    Claim {
        tenant_id: TenantId,
        kind: IdentityKind,
        key: String,
        user_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    /// Compensates a claim when the rest of a registration fails.
    Release {
        tenant_id: TenantId,
        kind: IdentityKind,
        key: String,
        user_id: UserId,
        occurred_at: DateTime<Utc>,
    },
}

impl Command for ClaimCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        match self {
            ClaimCommand::Claim { tenant_id, kind, key, .. }
            | ClaimCommand::Release { tenant_id, kind, key, .. } => claim_id(*tenant_id, *kind, key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimEvent {
    Claimed {
        tenant_id: TenantId,
        kind: IdentityKind,
        key: String,
        user_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    Released {
        tenant_id: TenantId,
        kind: IdentityKind,
        key: String,
        user_id: UserId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for ClaimEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ClaimEvent::Claimed { .. } => "auth.identity_claim.claimed",
            ClaimEvent::Released { .. } => "auth.identity_claim.released",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ClaimEvent::Claimed { occurred_at, .. } | ClaimEvent::Released { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for IdentityClaim {
    const AGGREGATE_TYPE: &'static str = "auth.identity_claim";

    type Command = ClaimCommand;
    type Event = ClaimEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ClaimEvent::Claimed { user_id, .. } => self.holder = Some(*user_id),
            ClaimEvent::Released { .. } => self.holder = None,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ClaimCommand::Claim {
                tenant_id,
                kind,
                key,
                user_id,
                occurred_at,
            } => match self.holder {
                Some(holder) if holder == *user_id => Ok(vec![]),
                Some(_) => Err(DomainError::conflict(format!("{} already taken", kind.as_str()))),
                None => Ok(vec![ClaimEvent::Claimed {
                    tenant_id: *tenant_id,
                    kind: *kind,
                    key: normalize_key(key),
                    user_id: *user_id,
                    occurred_at: *occurred_at,
                }]),
            },
            ClaimCommand::Release {
                tenant_id,
                kind,
                key,
                user_id,
                occurred_at,
            } => match self.holder {
                Some(holder) if holder == *user_id => Ok(vec![ClaimEvent::Released {
                    tenant_id: *tenant_id,
                    kind: *kind,
                    key: normalize_key(key),
                    user_id: *user_id,
                    occurred_at: *occurred_at,
                }]),
                _ => Ok(vec![]),
            },
        }
    }
}
