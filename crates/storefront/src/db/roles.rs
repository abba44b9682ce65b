//! Role record repository.
//!
//! A role record lives at `userRoles/{uid}`. Admin actions write partial
//! records that are merged into whatever is already stored.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::instrument;

use hapus_core::{RoleRecord, RoleUpdate, UserId};

use super::{RepositoryError, USER_ROLES, child_path, decode, encode};
use crate::store::{DocumentStore, Snapshot, Subscription};

/// Repository for role records.
pub struct RoleRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> RoleRepository<'a> {
    /// Create a new role repository.
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Get the role record for `uid`. `None` when no record exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the read fails.
    /// Returns `RepositoryError::DataCorruption` if the record is malformed.
    pub async fn get(&self, uid: &UserId) -> Result<Option<RoleRecord>, RepositoryError> {
        let path = child_path(USER_ROLES, uid.as_str())?;
        decode_snapshot(&path, self.store.get(&path).await?)
    }

    /// Replace the role record for `uid`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the write fails.
    #[instrument(skip(self), fields(user_id = %uid))]
    pub async fn put(&self, uid: &UserId, record: RoleRecord) -> Result<(), RepositoryError> {
        let path = child_path(USER_ROLES, uid.as_str())?;
        self.store.set(&path, encode(&record)?).await?;
        Ok(())
    }

    /// Merge `update` into the role record for `uid`. Unset fields are left
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the write fails.
    #[instrument(skip(self), fields(user_id = %uid))]
    pub async fn update(&self, uid: &UserId, update: RoleUpdate) -> Result<(), RepositoryError> {
        let path = child_path(USER_ROLES, uid.as_str())?;
        let fields = match encode(&update)? {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        if fields.is_empty() {
            return Ok(());
        }
        self.store.update(&path, fields).await?;
        Ok(())
    }

    /// Every role record, keyed by uid. Malformed records are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the read fails.
    pub async fn list(&self) -> Result<HashMap<UserId, RoleRecord>, RepositoryError> {
        let Some(Value::Object(map)) = self.store.get(USER_ROLES).await? else {
            return Ok(HashMap::new());
        };
        Ok(map
            .into_iter()
            .filter_map(|(uid, value)| {
                decode::<RoleRecord>(&format!("{USER_ROLES}/{uid}"), value)
                    .inspect_err(|e| tracing::warn!(error = %e, "skipping malformed role record"))
                    .ok()
                    .map(|record| (UserId::new(uid), record))
            })
            .collect())
    }

    /// Live view of the role record for `uid`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the subscription cannot be opened.
    pub async fn subscribe(&self, uid: &UserId) -> Result<Subscription, RepositoryError> {
        let path = child_path(USER_ROLES, uid.as_str())?;
        Ok(self.store.subscribe(&path, None).await?)
    }
}

/// Decode a role record snapshot. An absent record decodes to `None`.
///
/// # Errors
///
/// Returns `RepositoryError::DataCorruption` if the record is malformed.
pub fn decode_snapshot(path: &str, snapshot: Snapshot) -> Result<Option<RoleRecord>, RepositoryError> {
    snapshot.map(|value| decode(path, value)).transpose()
}
