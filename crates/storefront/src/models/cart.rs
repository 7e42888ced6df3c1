//! Cart models.

use rust_decimal::Decimal;
use serde::Serialize;

use keyhaven_core::{CartId, CartItemId, CartOwner, ProductId};

/// A cart document. Owned by exactly one identity; lives forever (clearing
/// empties the lines, it never deletes the cart).
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub id: CartId,
    pub owner: CartOwner,
}

/// One line of a cart, joined against the live product row.
///
/// `unit_price` is the product's *current* price, not a price captured at
/// add-to-cart time, so totals move with the catalog until checkout
/// snapshots them.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl CartLine {
    /// Line total at the current unit price.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// A cart with its resolved lines, as served to the cart and checkout pages.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub cart_id: CartId,
    pub lines: Vec<CartLine>,
}

impl CartView {
    /// Live total: `Σ quantity × current unit price`.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Whether there is anything to check out.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().expect("valid decimal")
    }

    fn line(id: i32, product: i32, price: &str, qty: i32) -> CartLine {
        CartLine {
            id: CartItemId::new(id),
            product_id: ProductId::new(product),
            product_name: format!("Product {product}"),
            unit_price: dec(price),
            quantity: qty,
        }
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line(1, 1, "19.99", 3).line_total(), dec("59.97"));
    }

    #[test]
    fn test_cart_total_sums_lines() {
        let view = CartView {
            cart_id: CartId::new(1),
            lines: vec![line(1, 1, "10.00", 2), line(2, 2, "4.50", 1)],
        };
        assert_eq!(view.total(), dec("24.50"));
        assert!(!view.is_empty());
    }

    #[test]
    fn test_empty_cart_total_is_zero() {
        let view = CartView {
            cart_id: CartId::new(1),
            lines: Vec::new(),
        };
        assert_eq!(view.total(), Decimal::ZERO);
        assert!(view.is_empty());
    }
}
