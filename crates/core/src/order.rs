//! Order documents.
//!
//! An order is written once at checkout and afterwards only its `status` and
//! `messages` change. Line items are copies of the cart lines at order time so
//! later catalog edits never alter a placed order.
//!
//! Field names are camelCase because that is how documents are laid out in
//! the store.

use serde::{Deserialize, Serialize};

use crate::cart::{Cart, CartLine};
use crate::types::{Email, OrderId, OrderStatus, Price, ProductId, SenderRole, Timestamp, UserId};
use crate::validation::{DeliveryContact, ValidationError};

/// Contact and delivery snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub phone: String,
    pub address: String,
    pub pincode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A purchased line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub name_marathi: String,
    pub price: Price,
    pub quantity: u32,
    pub weight: String,
}

impl From<&CartLine> for OrderLine {
    fn from(line: &CartLine) -> Self {
        Self {
            id: line.product_id.clone(),
            name: line.name.clone(),
            name_marathi: line.name_marathi.clone(),
            price: line.price,
            quantity: line.quantity,
            weight: line.weight.clone(),
        }
    }
}

/// One entry in an order's message thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderMessage {
    pub timestamp: Timestamp,
    pub sender_type: SenderRole,
    pub message: String,
}

impl OrderMessage {
    /// Build a message from free text.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyMessage` when `text` is blank.
    pub fn compose(sender: SenderRole, text: &str, now: Timestamp) -> Result<Self, ValidationError> {
        let message = text.trim();
        if message.is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        Ok(Self {
            timestamp: now,
            sender_type: sender,
            message: message.to_owned(),
        })
    }
}

/// Order document as stored at `orders/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub user_id: UserId,
    pub customer: CustomerDetails,
    pub items: Vec<OrderLine>,
    pub total_price: Price,
    pub status: OrderStatus,
    /// The store drops empty arrays, so an absent list reads back as empty.
    #[serde(default)]
    pub messages: Vec<OrderMessage>,
    pub created_at: Timestamp,
}

impl OrderRecord {
    /// Snapshot a cart and validated contact into a new pending order.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyCart` when the cart has no lines.
    pub fn from_checkout(
        user_id: &UserId,
        email: Option<&Email>,
        cart: &Cart,
        contact: DeliveryContact,
        now: Timestamp,
    ) -> Result<Self, ValidationError> {
        if cart.is_empty() {
            return Err(ValidationError::EmptyCart);
        }
        Ok(Self {
            user_id: user_id.clone(),
            customer: CustomerDetails {
                name: contact.name,
                email: email.map(|e| e.as_str().to_owned()),
                phone: contact.phone.as_str().to_owned(),
                address: contact.address,
                pincode: contact.pincode.as_str().to_owned(),
                notes: contact.notes,
            },
            items: cart.lines().iter().map(OrderLine::from).collect(),
            total_price: cart.total_price(),
            status: OrderStatus::Pending,
            messages: Vec::new(),
            created_at: now,
        })
    }

    /// Exact, case-sensitive owner check.
    #[must_use]
    pub fn is_owned_by(&self, uid: &UserId) -> bool {
        &self.user_id == uid
    }

    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, line| acc.saturating_add(line.quantity))
    }
}

/// An order together with its store-assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(flatten)]
    pub record: OrderRecord,
}

impl Order {
    /// Sort newest first by creation time.
    pub fn sort_newest_first(orders: &mut [Self]) {
        orders.sort_by(|a, b| b.record.created_at.cmp(&a.record.created_at));
    }
}

/// Keep only orders placed by `uid`.
#[must_use]
pub fn owned_by(orders: impl IntoIterator<Item = Order>, uid: &UserId) -> Vec<Order> {
    orders
        .into_iter()
        .filter(|order| order.record.is_owned_by(uid))
        .collect()
}

/// Orders grouped by status for the admin console.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderBuckets {
    pub pending: Vec<Order>,
    pub confirmed: Vec<Order>,
    pub rejected: Vec<Order>,
}

impl OrderBuckets {
    /// Split `orders` by status, preserving their relative order.
    #[must_use]
    pub fn partition(orders: impl IntoIterator<Item = Order>) -> Self {
        let mut buckets = Self::default();
        for order in orders {
            match order.record.status {
                OrderStatus::Pending => buckets.pending.push(order),
                OrderStatus::Confirmed => buckets.confirmed.push(order),
                OrderStatus::Rejected => buckets.rejected.push(order),
            }
        }
        buckets
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len() + self.confirmed.len() + self.rejected.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
