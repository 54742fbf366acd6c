//! User profile aggregate (event-sourced).
//!
//! A profile is created at registration and afterwards only changes through
//! the admin flag and sign-in bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId};
use stockroom_events::{Command, Event};

/// User profile aggregate.
///
/// # Invariants
/// - A profile belongs to exactly one tenant.
/// - The admin flag is only changed by an explicit grant/revoke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    id: UserId,
    tenant_id: Option<TenantId>,
    name: String,
    email: String,
    password_hash: String,
    is_admin: bool,
    version: u64,
    created: bool,
}

impl UserProfile {
    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            email: String::new(),
            password_hash: String::new(),
            is_admin: false,
            version: 0,
            created: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    fn ensure_existing(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }
}

impl AggregateRoot for UserProfile {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command to register a profile. Name/email uniqueness is established by
/// identity claims before this command is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterUser {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command to grant or revoke the admin flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetAdmin {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub is_admin: bool,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command to stamp a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSignIn {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserCommand {
    Register(RegisterUser),
    SetAdmin(SetAdmin),
    RecordSignIn(RecordSignIn),
}

impl Command for UserCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        let user_id = match self {
            UserCommand::Register(c) => c.user_id,
            UserCommand::SetAdmin(c) => c.user_id,
            UserCommand::RecordSignIn(c) => c.user_id,
        };
        AggregateId::from(user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegistered {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminFlagChanged {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub is_admin: bool,
    pub changed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSignedIn {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserEvent {
    Registered(UserRegistered),
    AdminFlagChanged(AdminFlagChanged),
    SignedIn(UserSignedIn),
}

impl Event for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserEvent::Registered(_) => "auth.user.registered",
            UserEvent::AdminFlagChanged(_) => "auth.user.admin_flag_changed",
            UserEvent::SignedIn(_) => "auth.user.signed_in",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UserEvent::Registered(e) => e.occurred_at,
            UserEvent::AdminFlagChanged(e) => e.occurred_at,
            UserEvent::SignedIn(e) => e.occurred_at,
        }
    }
}

impl Aggregate for UserProfile {
    const AGGREGATE_TYPE: &'static str = "auth.user";

    type Command = UserCommand;
    type Event = UserEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            UserEvent::Registered(e) => {
                self.id = e.user_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.email = e.email.clone();
                self.password_hash = e.password_hash.clone();
                self.is_admin = e.is_admin;
                self.created = true;
            }
            UserEvent::AdminFlagChanged(e) => self.is_admin = e.is_admin,
            UserEvent::SignedIn(_) => {}
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            UserCommand::Register(cmd) => self.handle_register(cmd),
            UserCommand::SetAdmin(cmd) => self.handle_set_admin(cmd),
            UserCommand::RecordSignIn(cmd) => self.handle_sign_in(cmd),
        }
    }
}

impl UserProfile {
    fn handle_register(&self, cmd: &RegisterUser) -> Result<Vec<UserEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("user already exists"));
        }
        if cmd.password_hash.is_empty() {
            return Err(DomainError::validation("password hash is required"));
        }

        Ok(vec![UserEvent::Registered(UserRegistered {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            name: cmd.name.clone(),
            email: cmd.email.clone(),
            password_hash: cmd.password_hash.clone(),
            is_admin: cmd.is_admin,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_admin(&self, cmd: &SetAdmin) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id)?;
        if self.is_admin == cmd.is_admin {
            return Ok(vec![]);
        }

        Ok(vec![UserEvent::AdminFlagChanged(AdminFlagChanged {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            is_admin: cmd.is_admin,
            changed_by: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_sign_in(&self, cmd: &RecordSignIn) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id)?;
        Ok(vec![UserEvent::SignedIn(UserSignedIn {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_events::execute;

    fn registered(is_admin: bool) -> (TenantId, UserId, UserProfile) {
        let tenant_id = TenantId::new();
        let user_id = UserId::new();
        let mut user = UserProfile::empty(user_id);

        let cmd = UserCommand::Register(RegisterUser {
            tenant_id,
            user_id,
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            is_admin,
            occurred_at: Utc::now(),
        });
        execute(&mut user, &cmd).unwrap();
        (tenant_id, user_id, user)
    }

    fn set_admin(tenant_id: TenantId, user_id: UserId, is_admin: bool) -> UserCommand {
        UserCommand::SetAdmin(SetAdmin {
            tenant_id,
            user_id,
            is_admin,
            actor: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn register_sets_profile() {
        let (_, _, user) = registered(false);
        assert_eq!(user.name(), "Alice");
        assert!(!user.is_admin());
        assert_eq!(user.version(), 1);
    }

    #[test]
    fn register_twice_conflicts() {
        let (tenant_id, user_id, user) = registered(false);
        let again = UserCommand::Register(RegisterUser {
            tenant_id,
            user_id,
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            is_admin: false,
            occurred_at: Utc::now(),
        });
        assert!(matches!(user.handle(&again), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn promote_then_demote() {
        let (tenant_id, user_id, mut user) = registered(false);

        execute(&mut user, &set_admin(tenant_id, user_id, true)).unwrap();
        assert!(user.is_admin());

        // Promoting an admin is a no-op.
        assert!(user.handle(&set_admin(tenant_id, user_id, true)).unwrap().is_empty());

        execute(&mut user, &set_admin(tenant_id, user_id, false)).unwrap();
        assert!(!user.is_admin());
    }

    #[test]
    fn set_admin_on_unknown_user_is_not_found() {
        let user_id = UserId::new();
        let user = UserProfile::empty(user_id);
        assert_eq!(
            user.handle(&set_admin(TenantId::new(), user_id, true)),
            Err(DomainError::NotFound)
        );
    }

    #[test]
    fn cross_tenant_change_is_rejected() {
        let (_, user_id, user) = registered(false);
        let result = user.handle(&set_admin(TenantId::new(), user_id, true));
        assert!(matches!(result, Err(DomainError::InvariantViolation(_))));
    }
}
