//! Role management for the admin console.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

use hapus_core::{
    AdminAllowList, AuthUser, Email, EffectiveRole, RoleAction, RoleRecord, UserId, UserProfile,
};

use crate::db::{RepositoryError, RoleRepository, UserRepository};
use crate::store::DocumentStore;

/// Errors from role management.
#[derive(Debug, Error)]
pub enum RoleError {
    /// An admin tried to demote or suspend their own account.
    #[error("You cannot {0} your own account")]
    SelfRevocation(RoleAction),

    /// Store access failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// One row of the admin user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub uid: UserId,
    /// Registration profile. Users who only ever signed in with a link or
    /// Google have none.
    pub profile: Option<UserProfile>,
    /// Role record as stored.
    pub role: RoleRecord,
    /// Role after applying the allow-list and suspension.
    pub effective: EffectiveRole,
}

/// Role operations over a borrowed store.
pub struct RoleService<'a> {
    roles: RoleRepository<'a>,
    users: UserRepository<'a>,
}

impl<'a> RoleService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            roles: RoleRepository::new(store),
            users: UserRepository::new(store),
        }
    }

    /// Apply `action` to `target` on behalf of `actor` and return the
    /// resulting record.
    ///
    /// # Errors
    ///
    /// Returns `RoleError::SelfRevocation` when the action would remove the
    /// actor's own admin access, `RoleError::Repository` if the write fails.
    #[instrument(skip(self, actor), fields(actor = %actor.uid, target = %target, action = %action))]
    pub async fn apply(
        &self,
        actor: &AuthUser,
        target: &UserId,
        action: RoleAction,
    ) -> Result<RoleRecord, RoleError> {
        if &actor.uid == target && action.revokes_admin() {
            return Err(RoleError::SelfRevocation(action));
        }
        self.roles.update(target, action.update()).await?;
        let record = self.roles.get(target).await?.unwrap_or_default();
        info!("role updated");
        Ok(record)
    }

    /// Every user with a profile or a role record, ordered by uid.
    ///
    /// # Errors
    ///
    /// Returns `RoleError::Repository` if either collection cannot be read.
    pub async fn directory(&self, allow: &AdminAllowList) -> Result<Vec<DirectoryEntry>, RoleError> {
        let mut roles = self.roles.list().await?;
        let mut entries: BTreeMap<String, DirectoryEntry> = BTreeMap::new();

        for profile in self.users.list().await? {
            let role = roles.remove(&profile.uid);
            let uid = profile.uid.clone();
            entries.insert(uid.as_str().to_owned(), entry(uid, Some(profile), role, allow));
        }
        for (uid, role) in roles {
            entries.insert(uid.as_str().to_owned(), entry(uid, None, Some(role), allow));
        }
        Ok(entries.into_values().collect())
    }
}

fn entry(
    uid: UserId,
    profile: Option<UserProfile>,
    role: Option<RoleRecord>,
    allow: &AdminAllowList,
) -> DirectoryEntry {
    let email = profile
        .as_ref()
        .and_then(|p| p.email.as_deref())
        .and_then(|raw| Email::parse(raw).ok());
    DirectoryEntry {
        effective: EffectiveRole::derive(role.as_ref(), email.as_ref(), allow),
        role: role.unwrap_or_default(),
        uid,
        profile,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hapus_core::{RegistrationForm, Timestamp};

    use super::*;
    use crate::store::MemoryStore;

    fn admin() -> AuthUser {
        AuthUser {
            uid: UserId::new("admin-1"),
            email: Some(Email::parse("owner@devgadhapus.in").unwrap()),
            email_verified: true,
        }
    }

    async fn register(store: &MemoryStore, uid: &str, email: &str) {
        let account = RegistrationForm {
            name: "Kiran Deshmukh".to_owned(),
            email: email.to_owned(),
            phone: "9123456780".to_owned(),
            address: "9 Lalbaug".to_owned(),
            pincode: "400012".to_owned(),
            password: "kesar123".to_owned(),
            confirm_password: "kesar123".to_owned(),
        }
        .validate()
        .unwrap();
        let uid = UserId::new(uid);
        UserRepository::new(store)
            .put(&UserProfile::from_account(uid.clone(), &account, Timestamp::now()))
            .await
            .unwrap();
        RoleRepository::new(store).put(&uid, RoleRecord::NEW_USER).await.unwrap();
    }

    #[tokio::test]
    async fn test_promote_then_suspend() {
        let store = MemoryStore::new();
        register(&store, "u1", "kiran@example.in").await;
        let service = RoleService::new(&store);
        let target = UserId::new("u1");

        let record = service.apply(&admin(), &target, RoleAction::Promote).await.unwrap();
        assert!(record.is_admin_flagged());

        let record = service.apply(&admin(), &target, RoleAction::Suspend).await.unwrap();
        assert!(record.is_suspended());
        assert!(!record.is_admin_flagged());

        let record = service.apply(&admin(), &target, RoleAction::Unsuspend).await.unwrap();
        assert!(!record.is_suspended());
        assert!(!record.is_admin_flagged());
    }

    #[tokio::test]
    async fn test_admin_cannot_revoke_self() {
        let store = MemoryStore::new();
        let service = RoleService::new(&store);
        let me = admin();

        for action in [RoleAction::Demote, RoleAction::Suspend] {
            let err = service.apply(&me, &me.uid, action).await.unwrap_err();
            assert!(matches!(err, RoleError::SelfRevocation(a) if a == action));
        }
        assert!(service.apply(&me, &me.uid, RoleAction::Promote).await.is_ok());
    }

    #[tokio::test]
    async fn test_directory_merges_profiles_and_roles() {
        let store = MemoryStore::new();
        register(&store, "u1", "owner@devgadhapus.in").await;
        register(&store, "u2", "kiran@example.in").await;
        RoleRepository::new(&store)
            .put(&UserId::new("u3"), RoleRecord { admin: Some(true), suspended: Some(true) })
            .await
            .unwrap();

        let allow = AdminAllowList::parse("owner@devgadhapus.in");
        let entries = RoleService::new(&store).directory(&allow).await.unwrap();
        let uids: Vec<&str> = entries.iter().map(|e| e.uid.as_str()).collect();
        assert_eq!(uids, ["u1", "u2", "u3"]);

        assert!(entries[0].effective.is_admin);
        assert!(!entries[1].effective.is_admin);
        assert!(entries[2].profile.is_none());
        assert!(entries[2].effective.is_suspended);
        assert!(!entries[2].effective.is_admin);
    }
}
