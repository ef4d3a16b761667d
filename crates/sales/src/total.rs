//! Order line items and the order total.

use serde::{Deserialize, Serialize};

use stockbook_core::{DomainError, DomainResult, Money, ValueObject};
use stockbook_products::ProductId;

/// One product/quantity/price triple within an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl ValueObject for LineItem {}

impl LineItem {
    /// `quantity × unit_price`.
    pub fn subtotal(&self) -> DomainResult<Money> {
        self.unit_price
            .checked_mul_quantity(i64::from(self.quantity))
            .ok_or_else(overflow)
    }
}

fn overflow() -> DomainError {
    DomainError::invalid_input("order total out of range")
}

/// `Σ quantity × unit_price` over `items`, in exact decimal arithmetic.
///
/// Items are not re-validated here. An empty slice totals zero. The only
/// failure is `InvalidInput` when the sum leaves the representable range.
pub fn order_total(items: &[LineItem]) -> DomainResult<Money> {
    items.iter().try_fold(Money::zero(), |acc, item| {
        acc.checked_add(item.subtotal()?).ok_or_else(overflow)
    })
}
