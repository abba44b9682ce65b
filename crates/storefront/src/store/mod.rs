//! Hosted document store boundary.
//!
//! The store is a single JSON tree addressed by slash-separated paths
//! (`orders/{id}`, `users/{uid}`, `userRoles/{uid}`). It supports point reads
//! and writes, store-assigned push keys, simple ordered queries and live
//! subscriptions.
//!
//! # Backends
//!
//! - [`FirebaseStore`] - Realtime Database REST and streaming API
//! - [`MemoryStore`] - in-process tree used by tests and local development
//!
//! Both backends share the tree helpers in [`tree`] so that ordering and
//! query semantics match.

mod firebase;
mod memory;
pub mod sse;
pub mod tree;

pub use firebase::FirebaseStore;
pub use memory::MemoryStore;

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Errors that can occur when talking to the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with an unexpected status.
    #[error("store returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// Security rules rejected the operation.
    #[error("permission denied at {0}")]
    PermissionDenied(String),

    /// A document could not be decoded.
    #[error("invalid document: {0}")]
    Decode(#[from] serde_json::Error),

    /// A live stream broke.
    #[error("stream error: {0}")]
    Stream(String),

    /// A path segment contains characters the store does not allow.
    #[error("invalid key: {0:?}")]
    InvalidKey(String),
}

/// Child ordering and windowing for [`DocumentStore::query`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Order children by this child key. Children are ordered by key when unset.
    pub order_by_child: Option<String>,
    /// Keep only children whose ordering value equals this.
    pub equal_to: Option<Value>,
    /// Keep only the last `n` children after ordering.
    pub limit_to_last: Option<usize>,
}

impl Query {
    #[must_use]
    pub fn order_by_child(child: impl Into<String>) -> Self {
        Self {
            order_by_child: Some(child.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn equal_to(mut self, value: impl Into<Value>) -> Self {
        self.equal_to = Some(value.into());
        self
    }

    #[must_use]
    pub const fn limit_to_last(mut self, n: usize) -> Self {
        self.limit_to_last = Some(n);
        self
    }
}

/// A snapshot delivered by a subscription. `None` means nothing is stored.
pub type Snapshot = Option<Value>;

/// A live subscription to a path.
///
/// Yields the current snapshot first and then a new snapshot after every
/// change. An `Err` item ends the subscription. Dropping the subscription
/// stops the background task feeding it.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<Result<Snapshot, StoreError>>,
    task: AbortHandle,
}

impl Subscription {
    /// Channel capacity used by backends.
    pub(crate) const BUFFER: usize = 16;

    pub(crate) const fn new(rx: mpsc::Receiver<Result<Snapshot, StoreError>>, task: AbortHandle) -> Self {
        Self { rx, task }
    }

    /// Wait for the next snapshot. `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<Result<Snapshot, StoreError>> {
        self.rx.recv().await
    }
}

impl Stream for Subscription {
    type Item = Result<Snapshot, StoreError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Operations the storefront needs from the hosted document store.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Read the value at `path`.
    async fn get(&self, path: &str) -> Result<Snapshot, StoreError>;

    /// Read the children of `path` ordered and windowed by `query`.
    async fn query(&self, path: &str, query: &Query) -> Result<Vec<(String, Value)>, StoreError>;

    /// Replace the value at `path`. `Value::Null` deletes it.
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Shallow-merge `fields` into the value at `path`.
    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError>;

    /// Append `value` under a new chronologically ordered key and return the key.
    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError>;

    /// Watch `path`, optionally narrowed by `query`.
    async fn subscribe(&self, path: &str, query: Option<Query>) -> Result<Subscription, StoreError>;
}

/// Check that `key` is usable as a single path segment.
///
/// # Errors
///
/// Returns `StoreError::InvalidKey` for empty keys and keys containing
/// `/ . # $ [ ]` or control characters.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let forbidden = |c: char| matches!(c, '/' | '.' | '#' | '$' | '[' | ']') || c.is_control();
    if key.is_empty() || key.len() > 768 || key.chars().any(forbidden) {
        return Err(StoreError::InvalidKey(key.to_owned()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("-NxA1b2C3d4").is_ok());
        assert!(validate_key("uid_123").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key("a.b").is_err());
        assert!(validate_key("$root").is_err());
    }

    #[test]
    fn test_query_builder() {
        let query = Query::order_by_child("createdAt").limit_to_last(50);
        assert_eq!(query.order_by_child.as_deref(), Some("createdAt"));
        assert_eq!(query.limit_to_last, Some(50));
        assert_eq!(query.equal_to, None);
    }
}
