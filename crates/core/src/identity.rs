//! Session identity state machine.
//!
//! Tracks who is signed in and what their role is. The role comes from a
//! subscription to the user's role record, so there is a window after every
//! sign-in where the user is known but the role is not; the view reports
//! `loading` during that window.
//!
//! The machine never talks to the store itself. Instead
//! [`IdentityState::auth_changed`] returns a [`RoleWatchCommand`] telling the
//! owner whether to keep, stop or (re)start the role subscription, and role
//! snapshots are fed back in tagged with the uid they belong to so that late
//! deliveries for a previous user are dropped.

use serde::{Deserialize, Serialize};

use crate::role::{AdminAllowList, EffectiveRole, RoleRecord};
use crate::types::{Email, UserId};

/// The auth provider's session object, as far as this application uses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: UserId,
    pub email: Option<Email>,
    pub email_verified: bool,
}

/// What the rest of the application sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub user: Option<AuthUser>,
    pub loading: bool,
    pub is_admin: bool,
    pub is_suspended: bool,
    pub is_email_verified: bool,
}

impl SessionView {
    /// Nobody signed in, nothing pending.
    #[must_use]
    pub const fn signed_out() -> Self {
        Self {
            user: None,
            loading: false,
            is_admin: false,
            is_suspended: false,
            is_email_verified: false,
        }
    }
}

/// What the owner must do with the role subscription after an auth change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleWatchCommand {
    /// Same user; leave the subscription alone.
    Keep,
    /// Signed out; tear the subscription down.
    Stop,
    /// New user; tear down any previous subscription, then watch this uid.
    Start(UserId),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdentityState {
    #[default]
    Unauthenticated,
    AuthenticatingRole {
        user: AuthUser,
    },
    Authenticated {
        user: AuthUser,
        role: EffectiveRole,
    },
}

impl IdentityState {
    /// The signed-in user, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&AuthUser> {
        match self {
            Self::Unauthenticated => None,
            Self::AuthenticatingRole { user } | Self::Authenticated { user, .. } => Some(user),
        }
    }

    /// Feed a new auth session (or its absence).
    pub fn auth_changed(&mut self, next: Option<AuthUser>) -> RoleWatchCommand {
        let Some(next) = next else {
            *self = Self::Unauthenticated;
            return RoleWatchCommand::Stop;
        };

        match self {
            Self::AuthenticatingRole { user } | Self::Authenticated { user, .. } if user.uid == next.uid => {
                *user = next;
                RoleWatchCommand::Keep
            }
            _ => {
                let uid = next.uid.clone();
                *self = Self::AuthenticatingRole { user: next };
                RoleWatchCommand::Start(uid)
            }
        }
    }

    /// Apply a role snapshot for `uid`.
    ///
    /// Returns `false` and changes nothing when `uid` is not the current user.
    pub fn role_resolved(&mut self, uid: &UserId, record: Option<&RoleRecord>, allow: &AdminAllowList) -> bool {
        self.settle(uid, |user| EffectiveRole::derive(record, user.email.as_ref(), allow))
    }

    /// The role subscription for `uid` failed; fall back to the allow-list.
    ///
    /// Returns `false` and changes nothing when `uid` is not the current user.
    pub fn role_failed(&mut self, uid: &UserId, allow: &AdminAllowList) -> bool {
        self.settle(uid, |user| EffectiveRole::fallback(user.email.as_ref(), allow))
    }

    fn settle(&mut self, uid: &UserId, role_for: impl FnOnce(&AuthUser) -> EffectiveRole) -> bool {
        let user = match self {
            Self::AuthenticatingRole { user } | Self::Authenticated { user, .. } if &user.uid == uid => user.clone(),
            _ => return false,
        };
        let role = role_for(&user);
        *self = Self::Authenticated { user, role };
        true
    }

    #[must_use]
    pub fn view(&self) -> SessionView {
        match self {
            Self::Unauthenticated => SessionView::signed_out(),
            Self::AuthenticatingRole { user } => SessionView {
                user: Some(user.clone()),
                loading: true,
                is_admin: false,
                is_suspended: false,
                is_email_verified: user.email_verified,
            },
            Self::Authenticated { user, role } => SessionView {
                user: Some(user.clone()),
                loading: false,
                is_admin: role.is_admin,
                is_suspended: role.is_suspended,
                is_email_verified: user.email_verified,
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user(uid: &str, email: &str, verified: bool) -> AuthUser {
        AuthUser {
            uid: UserId::new(uid),
            email: Some(Email::parse(email).unwrap()),
            email_verified: verified,
        }
    }

    #[test]
    fn test_sign_in_starts_role_watch_and_loads() {
        let mut state = IdentityState::default();
        let cmd = state.auth_changed(Some(user("u1", "a@x.in", true)));
        assert_eq!(cmd, RoleWatchCommand::Start(UserId::new("u1")));
        let view = state.view();
        assert!(view.loading);
        assert!(view.is_email_verified);
        assert!(!view.is_admin);
    }

    #[test]
    fn test_role_snapshot_ends_loading() {
        let allow = AdminAllowList::default();
        let mut state = IdentityState::default();
        state.auth_changed(Some(user("u1", "a@x.in", true)));
        let record = RoleRecord {
            admin: Some(true),
            suspended: None,
        };
        assert!(state.role_resolved(&UserId::new("u1"), Some(&record), &allow));
        let view = state.view();
        assert!(!view.loading);
        assert!(view.is_admin);
    }

    #[test]
    fn test_sign_out_stops_and_clears_flags() {
        let allow = AdminAllowList::parse("a@x.in");
        let mut state = IdentityState::default();
        state.auth_changed(Some(user("u1", "a@x.in", true)));
        state.role_resolved(&UserId::new("u1"), None, &allow);
        assert!(state.view().is_admin);

        assert_eq!(state.auth_changed(None), RoleWatchCommand::Stop);
        assert_eq!(state.view(), SessionView::signed_out());
    }

    #[test]
    fn test_stale_snapshot_after_user_switch_is_ignored() {
        let allow = AdminAllowList::default();
        let mut state = IdentityState::default();
        state.auth_changed(Some(user("admin", "boss@x.in", true)));
        let cmd = state.auth_changed(Some(user("guest", "guest@x.in", true)));
        assert_eq!(cmd, RoleWatchCommand::Start(UserId::new("guest")));

        let admin_record = RoleRecord {
            admin: Some(true),
            suspended: Some(false),
        };
        assert!(!state.role_resolved(&UserId::new("admin"), Some(&admin_record), &allow));
        assert!(state.view().loading);
        assert!(!state.view().is_admin);
    }

    #[test]
    fn test_same_user_refresh_keeps_watch_and_rederives_verification() {
        let allow = AdminAllowList::default();
        let mut state = IdentityState::default();
        state.auth_changed(Some(user("u1", "a@x.in", false)));
        state.role_resolved(&UserId::new("u1"), None, &allow);
        assert!(!state.view().is_email_verified);

        let cmd = state.auth_changed(Some(user("u1", "a@x.in", true)));
        assert_eq!(cmd, RoleWatchCommand::Keep);
        let view = state.view();
        assert!(view.is_email_verified);
        assert!(!view.loading);
    }

    #[test]
    fn test_role_failure_falls_back_to_allow_list() {
        let allow = AdminAllowList::parse("a@x.in");
        let mut state = IdentityState::default();
        state.auth_changed(Some(user("u1", "A@x.in", true)));
        assert!(state.role_failed(&UserId::new("u1"), &allow));
        let view = state.view();
        assert!(view.is_admin);
        assert!(!view.is_suspended);
        assert!(!view.loading);
    }

    #[test]
    fn test_role_update_while_authenticated() {
        let allow = AdminAllowList::default();
        let mut state = IdentityState::default();
        state.auth_changed(Some(user("u1", "a@x.in", true)));
        state.role_resolved(&UserId::new("u1"), None, &allow);
        let suspended = RoleRecord {
            admin: None,
            suspended: Some(true),
        };
        assert!(state.role_resolved(&UserId::new("u1"), Some(&suspended), &allow));
        assert!(state.view().is_suspended);
    }
}
