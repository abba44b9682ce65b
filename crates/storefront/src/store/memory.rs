//! In-process document store.
//!
//! Keeps the whole tree in memory and notifies subscribers through a version
//! counter on a `watch` channel. Used by the integration tests and by
//! `HAPUS_BACKEND=memory` for local development.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock, mpsc, watch};

use super::{DocumentStore, Query, Snapshot, StoreError, Subscription, tree};

/// Alphabet for push keys, in ascending ASCII order so keys sort by time.
const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

/// Memory-backed [`DocumentStore`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

struct Inner {
    tree: RwLock<Value>,
    version: watch::Sender<u64>,
    denied: RwLock<Vec<String>>,
    push_ids: Mutex<PushIds>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            tree: RwLock::new(Value::Null),
            version: watch::Sender::new(0),
            denied: RwLock::new(Vec::new()),
            push_ids: Mutex::new(PushIds::default()),
        }
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every operation under `prefix` with `PermissionDenied`, the way
    /// security rules would. Live subscriptions under it are cancelled.
    pub async fn deny(&self, prefix: &str) {
        self.inner.denied.write().await.push(prefix.trim_matches('/').to_owned());
        self.bump();
    }

    /// Lift every rule added with [`MemoryStore::deny`].
    pub async fn allow_all(&self) {
        self.inner.denied.write().await.clear();
        self.bump();
    }

    /// Clone of the whole tree, for assertions.
    pub async fn dump(&self) -> Value {
        self.inner.tree.read().await.clone()
    }

    fn bump(&self) {
        self.inner.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    async fn check(&self, path: &str) -> Result<(), StoreError> {
        let path = path.trim_matches('/');
        let denied = self.inner.denied.read().await;
        let blocked = denied.iter().any(|prefix| {
            path == prefix || path.starts_with(&format!("{prefix}/")) || prefix.is_empty()
        });
        if blocked {
            return Err(StoreError::PermissionDenied(path.to_owned()));
        }
        Ok(())
    }

    async fn snapshot(&self, path: &str, query: Option<&Query>) -> Result<Snapshot, StoreError> {
        self.check(path).await?;
        let root = self.inner.tree.read().await;
        let node = tree::get(&root, path);
        Ok(match query {
            Some(query) => tree::children_to_snapshot(tree::query_children(node, query)),
            None => node.cloned(),
        })
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Snapshot, StoreError> {
        self.snapshot(path, None).await
    }

    async fn query(&self, path: &str, query: &Query) -> Result<Vec<(String, Value)>, StoreError> {
        self.check(path).await?;
        let root = self.inner.tree.read().await;
        Ok(tree::query_children(tree::get(&root, path), query))
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.check(path).await?;
        tree::set(&mut *self.inner.tree.write().await, path, value);
        self.bump();
        Ok(())
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.check(path).await?;
        tree::merge(&mut *self.inner.tree.write().await, path, fields);
        self.bump();
        Ok(())
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        self.check(path).await?;
        let key = self
            .inner
            .push_ids
            .lock()
            .await
            .next(Utc::now().timestamp_millis());
        let target = format!("{}/{key}", path.trim_matches('/'));
        tree::set(&mut *self.inner.tree.write().await, &target, value);
        self.bump();
        Ok(key)
    }

    async fn subscribe(&self, path: &str, query: Option<Query>) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::channel(Subscription::BUFFER);
        let mut changes = self.inner.version.subscribe();
        let store = self.clone();
        let path = path.to_owned();

        let task = tokio::spawn(async move {
            let mut last: Option<Snapshot> = None;
            loop {
                match store.snapshot(&path, query.as_ref()).await {
                    Ok(snapshot) => {
                        if last.as_ref() != Some(&snapshot) {
                            if tx.send(Ok(snapshot.clone())).await.is_err() {
                                break;
                            }
                            last = Some(snapshot);
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(Err(err)).await;
                        break;
                    }
                }
                if changes.changed().await.is_err() {
                    break;
                }
            }
        });

        Ok(Subscription::new(rx, task.abort_handle()))
    }
}

/// Generator for chronologically sortable push keys.
///
/// Eight characters of millisecond timestamp followed by twelve random
/// characters. Keys generated in the same millisecond increment the random
/// part so they still sort in creation order.
#[derive(Debug, Default)]
struct PushIds {
    last_time: i64,
    last_random: [u8; 12],
}

impl PushIds {
    fn next(&mut self, now_ms: i64) -> String {
        if now_ms == self.last_time {
            for digit in self.last_random.iter_mut().rev() {
                if *digit < 63 {
                    *digit += 1;
                    break;
                }
                *digit = 0;
            }
        } else {
            self.last_time = now_ms;
            let mut rng = rand::rng();
            for digit in &mut self.last_random {
                *digit = rng.random_range(0..64);
            }
        }

        let mut time_chars = [b'-'; 8];
        let mut remaining = now_ms.max(0);
        for slot in time_chars.iter_mut().rev() {
            *slot = push_char(remaining % 64);
            remaining /= 64;
        }

        time_chars
            .iter()
            .copied()
            .chain(self.last_random.iter().map(|&d| push_char(i64::from(d))))
            .map(char::from)
            .collect()
    }
}

fn push_char(index: i64) -> u8 {
    usize::try_from(index)
        .ok()
        .and_then(|i| PUSH_CHARS.get(i))
        .copied()
        .unwrap_or(b'-')
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_push_ids_sort_by_time_and_within_millisecond() {
        let mut ids = PushIds::default();
        let a = ids.next(1_700_000_000_000);
        let b = ids.next(1_700_000_000_000);
        let c = ids.next(1_700_000_000_001);
        assert_eq!(a.len(), 20);
        assert!(a < b);
        assert!(b < c);
    }

    #[tokio::test]
    async fn test_push_then_get() {
        let store = MemoryStore::new();
        let key = store.push("orders", json!({"status": "pending"})).await.unwrap();
        let value = store.get(&format!("orders/{key}")).await.unwrap();
        assert_eq!(value, Some(json!({"status": "pending"})));
    }

    #[tokio::test]
    async fn test_denied_path() {
        let store = MemoryStore::new();
        store.deny("userRoles").await;
        let err = store.get("userRoles/u1").await.unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied(_)));
        assert!(store.get("orders").await.is_ok());
    }

    #[tokio::test]
    async fn test_subscription_sees_initial_and_changes() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe("userRoles/u1", None).await.unwrap();
        assert_eq!(sub.next().await.unwrap().unwrap(), None);

        let mut fields = Map::new();
        fields.insert("admin".to_owned(), json!(true));
        store.update("userRoles/u1", fields).await.unwrap();
        assert_eq!(sub.next().await.unwrap().unwrap(), Some(json!({"admin": true})));
    }

    #[tokio::test]
    async fn test_subscription_skips_unrelated_writes() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe("userRoles/u1", None).await.unwrap();
        sub.next().await.unwrap().unwrap();

        store.set("orders/x", json!({"status": "pending"})).await.unwrap();
        store.set("userRoles/u1", json!({"suspended": true})).await.unwrap();
        assert_eq!(sub.next().await.unwrap().unwrap(), Some(json!({"suspended": true})));
    }

    #[tokio::test]
    async fn test_deny_cancels_live_subscription() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe("userRoles/u1", None).await.unwrap();
        sub.next().await.unwrap().unwrap();
        store.deny("userRoles").await;
        assert!(matches!(sub.next().await, Some(Err(StoreError::PermissionDenied(_)))));
        assert!(sub.next().await.is_none());
    }
}
