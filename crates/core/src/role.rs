//! Role records and effective roles.
//!
//! A role record lives at `userRoles/{uid}` and carries two optional flags. A
//! missing record or flag means `false`. The effective role additionally
//! consults a configured allow-list of admin emails, and suspension always wins
//! over admin.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::Email;

/// Role document as stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspended: Option<bool>,
}

impl RoleRecord {
    /// Record written for newly registered users.
    pub const NEW_USER: Self = Self {
        admin: Some(false),
        suspended: Some(false),
    };

    #[must_use]
    pub fn is_admin_flagged(&self) -> bool {
        self.admin == Some(true)
    }

    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.suspended == Some(true)
    }

    /// Apply a partial update in place (shallow merge, as the store does).
    pub fn apply(&mut self, update: RoleUpdate) {
        if update.admin.is_some() {
            self.admin = update.admin;
        }
        if update.suspended.is_some() {
            self.suspended = update.suspended;
        }
    }
}

/// Emails that are always treated as admin unless suspended.
///
/// Parsed from a comma-separated list; entries are trimmed and lower-cased and
/// empty entries are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminAllowList(HashSet<String>);

impl AdminAllowList {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split(',')
                .map(|entry| entry.trim().to_lowercase())
                .filter(|entry| !entry.is_empty())
                .collect(),
        )
    }

    /// Whether `email` is on the list. `None` never matches.
    #[must_use]
    pub fn contains(&self, email: Option<&Email>) -> bool {
        email.is_some_and(|email| self.0.contains(&email.normalized()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Role flags after combining the record with the allow-list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveRole {
    pub is_admin: bool,
    pub is_suspended: bool,
}

impl EffectiveRole {
    /// Derive from a role record snapshot.
    ///
    /// `suspended = record.suspended == true` and
    /// `admin = (record.admin == true || allow-listed) && !suspended`.
    #[must_use]
    pub fn derive(record: Option<&RoleRecord>, email: Option<&Email>, allow: &AdminAllowList) -> Self {
        let is_suspended = record.is_some_and(RoleRecord::is_suspended);
        let flagged = record.is_some_and(RoleRecord::is_admin_flagged);
        Self {
            is_admin: (flagged || allow.contains(email)) && !is_suspended,
            is_suspended,
        }
    }

    /// Role used when the role record cannot be read: allow-list only, never
    /// suspended.
    #[must_use]
    pub fn fallback(email: Option<&Email>, allow: &AdminAllowList) -> Self {
        Self {
            is_admin: allow.contains(email),
            is_suspended: false,
        }
    }
}

/// Partial role document written by an admin action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspended: Option<bool>,
}

/// Admin console role actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleAction {
    Promote,
    Demote,
    Suspend,
    Unsuspend,
}

impl RoleAction {
    /// The partial document this action writes.
    #[must_use]
    pub const fn update(self) -> RoleUpdate {
        match self {
            Self::Promote => RoleUpdate {
                admin: Some(true),
                suspended: Some(false),
            },
            Self::Demote => RoleUpdate {
                admin: Some(false),
                suspended: None,
            },
            Self::Suspend => RoleUpdate {
                admin: Some(false),
                suspended: Some(true),
            },
            Self::Unsuspend => RoleUpdate {
                admin: None,
                suspended: Some(false),
            },
        }
    }

    /// Whether applying this to yourself could remove your own admin access.
    #[must_use]
    pub const fn revokes_admin(self) -> bool {
        matches!(self, Self::Demote | Self::Suspend)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Promote => "promote",
            Self::Demote => "demote",
            Self::Suspend => "suspend",
            Self::Unsuspend => "unsuspend",
        }
    }
}

impl fmt::Display for RoleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown role action.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown role action: {0}")]
pub struct UnknownRoleAction(pub String);

impl FromStr for RoleAction {
    type Err = UnknownRoleAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "promote" => Ok(Self::Promote),
            "demote" => Ok(Self::Demote),
            "suspend" => Ok(Self::Suspend),
            "unsuspend" => Ok(Self::Unsuspend),
            other => Err(UnknownRoleAction(other.to_owned())),
        }
    }
}
