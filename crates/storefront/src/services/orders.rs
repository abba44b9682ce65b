//! Order workflow.
//!
//! Orders go `pending -> confirmed` or `pending -> rejected`. Status changes
//! are made only from the admin console; overwriting a terminal status is
//! allowed and logged.

use thiserror::Error;
use tracing::{info, instrument, warn};

use hapus_core::{
    AuthUser, Cart, CheckoutForm, Order, OrderBuckets, OrderId, OrderMessage, OrderRecord,
    OrderStatus, SenderRole, Timestamp, UserId, ValidationError,
};

use crate::db::orders::ADMIN_WINDOW;
use crate::db::{OrderRepository, RepositoryError};
use crate::store::DocumentStore;

/// Errors from the order workflow.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Input rejected before anything was written.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No order with this id.
    #[error("order not found: {0}")]
    NotFound(OrderId),

    /// Store access failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Order operations over a borrowed store.
pub struct OrderService<'a> {
    orders: OrderRepository<'a>,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            orders: OrderRepository::new(store),
        }
    }

    /// Turn the cart into a pending order.
    ///
    /// All checks run before the write. The caller clears the cart once this
    /// returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Validation` for an empty cart or an invalid
    /// delivery form, `OrderError::Repository` if the write fails.
    #[instrument(skip(self, cart, form), fields(user_id = %user.uid, items = cart.total_items()))]
    pub async fn place_order(
        &self,
        user: &AuthUser,
        cart: &Cart,
        form: &CheckoutForm,
    ) -> Result<OrderId, OrderError> {
        if cart.is_empty() {
            return Err(ValidationError::EmptyCart.into());
        }
        let contact = form.validate()?;
        let record = OrderRecord::from_checkout(
            &user.uid,
            user.email.as_ref(),
            cart,
            contact,
            Timestamp::now(),
        )?;
        let id = self.orders.create(&record).await?;
        info!(order_id = %id, total = %record.total_price, "order placed");
        Ok(id)
    }

    /// The most recent orders grouped by status.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the query fails.
    pub async fn recent_for_admin(&self) -> Result<OrderBuckets, OrderError> {
        let orders = self.orders.recent(ADMIN_WINDOW).await?;
        Ok(OrderBuckets::partition(orders))
    }

    /// Orders placed by `uid`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the query fails.
    pub async fn for_user(&self, uid: &UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.for_user(uid).await?)
    }

    /// Mark an order confirmed.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for an unknown id.
    pub async fn confirm(&self, id: &OrderId) -> Result<(), OrderError> {
        self.transition(id, OrderStatus::Confirmed).await
    }

    /// Mark an order rejected.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for an unknown id.
    pub async fn reject(&self, id: &OrderId) -> Result<(), OrderError> {
        self.transition(id, OrderStatus::Rejected).await
    }

    #[instrument(skip(self), fields(order_id = %id))]
    async fn transition(&self, id: &OrderId, status: OrderStatus) -> Result<(), OrderError> {
        let order = self
            .orders
            .get(id)
            .await?
            .ok_or_else(|| OrderError::NotFound(id.clone()))?;

        let previous = order.record.status;
        if previous.is_terminal() && previous != status {
            warn!(from = %previous, to = %status, "overwriting terminal order status");
        }
        self.orders.set_status(id, status).await?;
        info!(from = %previous, to = %status, "order status changed");
        Ok(())
    }

    /// Append a message to an order's thread and return the whole thread.
    ///
    /// The thread is read, extended and written back as a whole; a message
    /// appended concurrently by someone else can be lost.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Validation` for a blank message and
    /// `OrderError::NotFound` for an unknown id.
    #[instrument(skip(self, text), fields(order_id = %id))]
    pub async fn append_message(
        &self,
        id: &OrderId,
        sender: SenderRole,
        text: &str,
    ) -> Result<Vec<OrderMessage>, OrderError> {
        let message = OrderMessage::compose(sender, text, Timestamp::now())?;
        let order = self
            .orders
            .get(id)
            .await?
            .ok_or_else(|| OrderError::NotFound(id.clone()))?;

        let mut messages = order.record.messages;
        messages.push(message);
        self.orders.set_messages(id, &messages).await?;
        Ok(messages)
    }
}
