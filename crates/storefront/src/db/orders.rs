//! Order repository.
//!
//! Orders are written once with a push key and afterwards only `status` and
//! `messages` change. Listing queries order by a child field so the store
//! does the windowing; results are then sorted newest first.

use serde_json::{Map, Value};
use tracing::instrument;

use hapus_core::{Order, OrderId, OrderMessage, OrderRecord, OrderStatus, UserId, owned_by};

use super::{ORDERS, RepositoryError, child_path, decode, encode};
use crate::store::{DocumentStore, Query, Snapshot, Subscription};

/// Number of orders the admin console works with.
pub const ADMIN_WINDOW: usize = 50;

/// Repository for order documents.
pub struct OrderRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Write a new order and return its store-assigned id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the write fails.
    #[instrument(skip(self, record), fields(user_id = %record.user_id))]
    pub async fn create(&self, record: &OrderRecord) -> Result<OrderId, RepositoryError> {
        let key = self.store.push(ORDERS, encode(record)?).await?;
        Ok(OrderId::new(key))
    }

    /// Get an order by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the read fails.
    /// Returns `RepositoryError::DataCorruption` if the document is malformed.
    pub async fn get(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let path = child_path(ORDERS, id.as_str())?;
        match self.store.get(&path).await? {
            Some(value) => Ok(Some(Order {
                id: id.clone(),
                record: decode(&path, value)?,
            })),
            None => Ok(None),
        }
    }

    /// The `limit` most recently created orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the query fails.
    pub async fn recent(&self, limit: usize) -> Result<Vec<Order>, RepositoryError> {
        let children = self.store.query(ORDERS, &recent_query(limit)).await?;
        Ok(orders_from_children(children))
    }

    /// Orders placed by `uid`, newest first.
    ///
    /// Filtering happens in the store query; the result is checked again so
    /// a widened query never hands out someone else's order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the query fails.
    pub async fn for_user(&self, uid: &UserId) -> Result<Vec<Order>, RepositoryError> {
        let children = self.store.query(ORDERS, &owner_query(uid)).await?;
        Ok(owned_by(orders_from_children(children), uid))
    }

    /// Overwrite an order's status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the write fails.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn set_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<(), RepositoryError> {
        let path = child_path(ORDERS, id.as_str())?;
        let mut fields = Map::new();
        fields.insert("status".to_owned(), Value::from(status.as_str()));
        self.store.update(&path, fields).await?;
        Ok(())
    }

    /// Replace an order's whole message list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the write fails.
    #[instrument(skip(self, messages), fields(order_id = %id, count = messages.len()))]
    pub async fn set_messages(
        &self,
        id: &OrderId,
        messages: &[OrderMessage],
    ) -> Result<(), RepositoryError> {
        let path = format!("{}/messages", child_path(ORDERS, id.as_str())?);
        self.store.set(&path, encode(&messages)?).await?;
        Ok(())
    }

    /// Live view of the `limit` most recent orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the subscription cannot be opened.
    pub async fn watch_recent(&self, limit: usize) -> Result<Subscription, RepositoryError> {
        Ok(self
            .store
            .subscribe(ORDERS, Some(recent_query(limit)))
            .await?)
    }

    /// Live view of the orders placed by `uid`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the subscription cannot be opened.
    pub async fn watch_for_user(&self, uid: &UserId) -> Result<Subscription, RepositoryError> {
        Ok(self.store.subscribe(ORDERS, Some(owner_query(uid))).await?)
    }
}

fn recent_query(limit: usize) -> Query {
    Query::order_by_child("createdAt").limit_to_last(limit)
}

fn owner_query(uid: &UserId) -> Query {
    Query::order_by_child("userId").equal_to(uid.as_str())
}

/// Decode query results, newest first. Malformed documents are skipped.
#[must_use]
pub fn orders_from_children(children: Vec<(String, Value)>) -> Vec<Order> {
    let mut orders: Vec<Order> = children
        .into_iter()
        .filter_map(|(key, value)| {
            let path = format!("{ORDERS}/{key}");
            match decode::<OrderRecord>(&path, value) {
                Ok(record) => Some(Order {
                    id: OrderId::new(key),
                    record,
                }),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping malformed order");
                    None
                }
            }
        })
        .collect();
    Order::sort_newest_first(&mut orders);
    orders
}

/// Decode a subscription snapshot of the orders collection.
#[must_use]
pub fn orders_from_snapshot(snapshot: Snapshot) -> Vec<Order> {
    match snapshot {
        Some(Value::Object(map)) => orders_from_children(map.into_iter().collect()),
        _ => Vec::new(),
    }
}

/// Decode a snapshot of [`OrderRepository::watch_for_user`], keeping only
/// orders placed by `uid`.
#[must_use]
pub fn user_orders_from_snapshot(snapshot: Snapshot, uid: &UserId) -> Vec<Order> {
    owned_by(orders_from_snapshot(snapshot), uid)
}
