//! Typed access to the hosted document store.
//!
//! # Layout
//!
//! - `orders/{orderId}` - order documents, keyed by store-assigned push keys
//! - `users/{uid}` - customer profiles captured at registration
//! - `userRoles/{uid}` - admin/suspended flags
//!
//! Repositories borrow the store for the duration of a request, the same way
//! they would borrow a connection pool.

pub mod orders;
pub mod roles;
pub mod users;

pub use orders::{
    ADMIN_WINDOW, OrderRepository, orders_from_snapshot, user_orders_from_snapshot,
};
pub use roles::RoleRepository;
pub use users::UserRepository;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::store::{StoreError, validate_key};

/// Order documents.
pub const ORDERS: &str = "orders";
/// Customer profiles.
pub const USERS: &str = "users";
/// Role records.
pub const USER_ROLES: &str = "userRoles";

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Document exists but does not have the expected shape.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Document not found.
    #[error("not found")]
    NotFound,
}

impl RepositoryError {
    /// Whether the store's security rules refused the operation.
    #[must_use]
    pub const fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Store(StoreError::PermissionDenied(_)))
    }
}

/// `{collection}/{key}`, rejecting keys that would address another node.
pub(crate) fn child_path(collection: &str, key: &str) -> Result<String, RepositoryError> {
    validate_key(key)?;
    Ok(format!("{collection}/{key}"))
}

pub(crate) fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, RepositoryError> {
    serde_json::from_value(value)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid document at {path}: {e}")))
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Value, RepositoryError> {
    serde_json::to_value(value).map_err(|e| RepositoryError::Store(StoreError::Decode(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_path_rejects_nested_keys() {
        assert_eq!(child_path(ORDERS, "-Nabc").unwrap_or_default(), "orders/-Nabc");
        assert!(matches!(
            child_path(USER_ROLES, "uid/../admin"),
            Err(RepositoryError::Store(StoreError::InvalidKey(_)))
        ));
    }

    #[test]
    fn test_permission_denied_classification() {
        let err = RepositoryError::Store(StoreError::PermissionDenied("userRoles/u1".to_owned()));
        assert!(err.is_permission_denied());
        assert!(!RepositoryError::NotFound.is_permission_denied());
    }
}
