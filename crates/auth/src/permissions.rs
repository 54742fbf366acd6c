use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier (e.g. `"admin.users.list"`).
///
/// The wildcard `"*"` grants everything and is what administrators hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));
    pub const LIST_USERS: Permission = Permission(Cow::Borrowed("admin.users.list"));
    pub const MANAGE_ADMINS: Permission = Permission(Cow::Borrowed("admin.users.manage"));
    pub const MANAGE_THRESHOLDS: Permission = Permission(Cow::Borrowed("inventory.thresholds.manage"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
