//! Order inspection commands.

use hapus_core::{Order, OrderId, OrderStatus, SenderRole};
use hapus_storefront::db::OrderRepository;
use hapus_storefront::store::DocumentStore;

use super::CommandError;

/// Keep the orders with `status`, or all of them.
fn with_status(orders: Vec<Order>, status: Option<OrderStatus>) -> Vec<Order> {
    match status {
        Some(status) => orders
            .into_iter()
            .filter(|order| order.record.status == status)
            .collect(),
        None => orders,
    }
}

/// List the `limit` most recent orders, newest first.
///
/// # Errors
///
/// Returns `CommandError::Repository` if the query fails.
#[allow(clippy::print_stdout)]
pub async fn list(
    store: &dyn DocumentStore,
    status: Option<OrderStatus>,
    limit: usize,
) -> Result<(), CommandError> {
    let orders = with_status(OrderRepository::new(store).recent(limit).await?, status);

    if orders.is_empty() {
        println!("No orders.");
        return Ok(());
    }

    for order in &orders {
        let record = &order.record;
        println!(
            "{}  #{}  {:<9}  {:>8}  {} item(s)  {}  {}",
            record.created_at,
            order.id.short_ref(),
            record.status.as_str(),
            record.total_price.to_string(),
            record.item_count(),
            record.customer.name,
            order.id,
        );
    }
    Ok(())
}

/// Print one order with its line items and messages.
///
/// # Errors
///
/// Returns `CommandError::NotFound` for an unknown id.
#[allow(clippy::print_stdout)]
pub async fn show(store: &dyn DocumentStore, id: &str) -> Result<(), CommandError> {
    let id = OrderId::new(id);
    let order = OrderRepository::new(store)
        .get(&id)
        .await?
        .ok_or_else(|| CommandError::NotFound(format!("order {id}")))?;
    let record = &order.record;

    println!("Order #{} ({})", id.short_ref(), id);
    println!("  status:   {}", record.status);
    println!("  placed:   {}", record.created_at);
    println!("  user:     {}", record.user_id);
    println!("  customer: {} <{}>", record.customer.name, record.customer.email.as_deref().unwrap_or("-"));
    println!("  phone:    {}", record.customer.phone);
    println!("  address:  {} {}", record.customer.address, record.customer.pincode);
    if let Some(notes) = &record.customer.notes {
        println!("  notes:    {notes}");
    }

    println!("  items:");
    for line in &record.items {
        println!("    {} x {} ({}) @ {}", line.quantity, line.name, line.weight, line.price);
    }
    println!("  total:    {}", record.total_price);

    if !record.messages.is_empty() {
        println!("  messages:");
        for message in &record.messages {
            let sender = match message.sender_type {
                SenderRole::Admin => "admin",
                SenderRole::User => "user",
            };
            println!("    [{}] {sender}: {}", message.timestamp, message.message);
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hapus_core::{
        Cart, CheckoutForm, Email, OrderRecord, ProductId, Timestamp, UserId, catalog,
    };

    use super::*;

    fn order(id: &str, status: OrderStatus) -> Order {
        let mut cart = Cart::new();
        cart.add(catalog::find(&ProductId::new("royal-hapus")).unwrap());
        let contact = CheckoutForm {
            name: "Meera".to_string(),
            phone: "9876543210".to_string(),
            address: "12 Marine Drive".to_string(),
            pincode: "400020".to_string(),
            notes: None,
        }
        .validate()
        .unwrap();
        let email = Email::parse("meera@example.in").unwrap();
        let mut record = OrderRecord::from_checkout(
            &UserId::new("u1"),
            Some(&email),
            &cart,
            contact,
            Timestamp::now(),
        )
        .unwrap();
        record.status = status;
        Order {
            id: OrderId::new(id),
            record,
        }
    }

    #[test]
    fn test_status_filter() {
        let orders = vec![
            order("-a", OrderStatus::Pending),
            order("-b", OrderStatus::Confirmed),
            order("-c", OrderStatus::Pending),
        ];

        let pending = with_status(orders.clone(), Some(OrderStatus::Pending));
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|o| o.record.status == OrderStatus::Pending));

        assert_eq!(with_status(orders, None).len(), 3);
    }
}
