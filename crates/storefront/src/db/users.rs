//! Customer profile repository.
//!
//! Profiles are written once at registration and read by the admin console
//! to show who a role record belongs to.

use serde_json::Value;
use tracing::instrument;

use hapus_core::{UserId, UserProfile};

use super::{RepositoryError, USERS, child_path, decode, encode};
use crate::store::DocumentStore;

/// Repository for customer profiles.
pub struct UserRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Write the profile at `users/{uid}`, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the write fails.
    #[instrument(skip(self, profile), fields(user_id = %profile.uid))]
    pub async fn put(&self, profile: &UserProfile) -> Result<(), RepositoryError> {
        let path = child_path(USERS, profile.uid.as_str())?;
        self.store.set(&path, encode(profile)?).await?;
        Ok(())
    }

    /// Get a profile by uid.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the read fails.
    /// Returns `RepositoryError::DataCorruption` if the document is malformed.
    pub async fn get(&self, uid: &UserId) -> Result<Option<UserProfile>, RepositoryError> {
        let path = child_path(USERS, uid.as_str())?;
        self.store
            .get(&path)
            .await?
            .map(|value| decode(&path, value))
            .transpose()
    }

    /// All profiles, ordered by uid. Malformed documents are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the read fails.
    pub async fn list(&self) -> Result<Vec<UserProfile>, RepositoryError> {
        let Some(Value::Object(map)) = self.store.get(USERS).await? else {
            return Ok(Vec::new());
        };
        let mut profiles: Vec<UserProfile> = map
            .into_iter()
            .filter_map(|(uid, value)| {
                decode(&format!("{USERS}/{uid}"), value)
                    .inspect_err(|e| tracing::warn!(error = %e, "skipping malformed profile"))
                    .ok()
            })
            .collect();
        profiles.sort_by(|a, b| a.uid.as_str().cmp(b.uid.as_str()));
        Ok(profiles)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hapus_core::{RegistrationForm, Timestamp};
    use serde_json::json;

    use super::*;
    use crate::store::MemoryStore;

    fn profile(uid: &str) -> UserProfile {
        let account = RegistrationForm {
            name: "Ravi Kulkarni".to_owned(),
            email: "ravi@example.in".to_owned(),
            phone: "9820012345".to_owned(),
            address: "4 Girgaon Road".to_owned(),
            pincode: "400004".to_owned(),
            password: "alphonso".to_owned(),
            confirm_password: "alphonso".to_owned(),
        }
        .validate()
        .unwrap();
        UserProfile::from_account(UserId::new(uid), &account, Timestamp::now())
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = MemoryStore::new();
        let repo = UserRepository::new(&store);
        repo.put(&profile("uid-1")).await.unwrap();

        let stored = repo.get(&UserId::new("uid-1")).await.unwrap().unwrap();
        assert_eq!(stored.name, "Ravi Kulkarni");
        assert_eq!(stored.pincode, "400004");
        assert!(repo.get(&UserId::new("uid-2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_skips_malformed() {
        let store = MemoryStore::new();
        let repo = UserRepository::new(&store);
        repo.put(&profile("uid-b")).await.unwrap();
        repo.put(&profile("uid-a")).await.unwrap();
        store.set("users/broken", json!({"name": 7})).await.unwrap();

        let uids: Vec<String> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.uid.into_inner())
            .collect();
        assert_eq!(uids, ["uid-a", "uid-b"]);
    }
}
