//! Session cart.
//!
//! A cart is a list of lines keyed by product id. Each line carries a copy of
//! the product's name, price and weight taken when it was first added, plus a
//! quantity that is always at least 1. Totals are computed from the lines on
//! demand so they can never drift from them.

use serde::{Deserialize, Serialize};

use crate::catalog::Product;
use crate::types::{Price, ProductId};

/// One product in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub name_marathi: String,
    pub price: Price,
    pub weight: String,
    pub quantity: u32,
}

impl CartLine {
    fn from_product(product: &Product) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.to_owned(),
            name_marathi: product.name_marathi.to_owned(),
            price: product.price,
            weight: product.weight.to_owned(),
            quantity: 1,
        }
    }

    /// `price * quantity`.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.price.times(self.quantity)
    }
}

/// The cart for one browsing session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one unit of `product`.
    ///
    /// Inserts a new line at quantity 1 or increments the existing line.
    pub fn add(&mut self, product: &Product) {
        match self.line_mut(&product.id) {
            Some(line) => line.quantity = line.quantity.saturating_add(1),
            None => self.lines.push(CartLine::from_product(product)),
        }
    }

    /// Remove the line for `product_id`. Absent lines are ignored.
    pub fn remove(&mut self, product_id: &ProductId) {
        self.lines.retain(|line| &line.product_id != product_id);
    }

    /// Set the quantity for `product_id`.
    ///
    /// Anything below 1 removes the line. Unknown products are ignored.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: i64) {
        if quantity < 1 {
            self.remove(product_id);
            return;
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        if let Some(line) = self.line_mut(product_id) {
            line.quantity = quantity;
        }
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of quantities across all lines.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.lines
            .iter()
            .fold(0u32, |acc, line| acc.saturating_add(line.quantity))
    }

    /// Sum of `quantity * price` across all lines.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.lines.iter().map(CartLine::subtotal).sum()
    }

    fn line_mut(&mut self, product_id: &ProductId) -> Option<&mut CartLine> {
        self.lines
            .iter_mut()
            .find(|line| &line.product_id == product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    fn product(id: &str) -> &'static Product {
        catalog::find(&ProductId::new(id)).unwrap_or_else(|| panic!("missing {id}"))
    }

    fn assert_consistent(cart: &Cart) {
        let items: u32 = cart.lines().iter().map(|l| l.quantity).sum();
        let price: Price = cart
            .lines()
            .iter()
            .map(|l| l.price.times(l.quantity))
            .sum();
        assert_eq!(cart.total_items(), items);
        assert_eq!(cart.total_price(), price);
        assert!(cart.lines().iter().all(|l| l.quantity >= 1));
    }

    #[test]
    fn test_add_inserts_then_increments() {
        let mut cart = Cart::new();
        cart.add(product("royal-hapus"));
        cart.add(product("royal-hapus"));
        cart.add(product("family-pack"));

        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.total_items(), 3);
        assert_eq!(cart.total_price(), Price::rupees(1800 * 2 + 1200));
        assert_consistent(&cart);
    }

    #[test]
    fn test_set_quantity_below_one_removes() {
        let mut cart = Cart::new();
        cart.add(product("classic-hapus"));
        cart.set_quantity(&ProductId::new("classic-hapus"), 0);
        assert!(cart.is_empty());

        cart.add(product("classic-hapus"));
        cart.set_quantity(&ProductId::new("classic-hapus"), -3);
        assert!(cart.is_empty());
        assert_consistent(&cart);
    }

    #[test]
    fn test_set_quantity_updates_existing_only() {
        let mut cart = Cart::new();
        cart.add(product("premium-box"));
        cart.set_quantity(&ProductId::new("premium-box"), 4);
        cart.set_quantity(&ProductId::new("royal-hapus"), 2);

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.total_items(), 4);
        assert_eq!(cart.total_price(), Price::rupees(10_000));
    }

    #[test]
    fn test_remove_absent_line_is_noop() {
        let mut cart = Cart::new();
        cart.add(product("aam-ras-special"));
        let before = cart.clone();
        cart.remove(&ProductId::new("royal-hapus"));
        cart.remove(&ProductId::new("royal-hapus"));
        assert_eq!(cart, before);
    }

    #[test]
    fn test_mixed_sequence_keeps_totals_consistent() {
        let ids = ["royal-hapus", "classic-hapus", "premium-box"];
        let mut cart = Cart::new();
        for step in 0..30_i64 {
            let id = ids[usize::try_from(step).unwrap_or(0) % ids.len()];
            match step % 4 {
                0 | 1 => cart.add(product(id)),
                2 => cart.set_quantity(&ProductId::new(id), step % 5 - 1),
                _ => cart.remove(&ProductId::new(id)),
            }
            assert_consistent(&cart);
        }
    }

    #[test]
    fn test_clear() {
        let mut cart = Cart::new();
        cart.add(product("royal-hapus"));
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total_items(), 0);
        assert_eq!(cart.total_price(), Price::ZERO);
    }
}
