//! Stock valuation (pure).

use serde::{Deserialize, Serialize};

use stockbook_core::{DomainError, DomainResult, Money};

/// An item is low on stock when it is at or below its reorder level.
pub fn is_low_stock(quantity: i64, min_quantity: i64) -> bool {
    quantity <= min_quantity
}

/// One row of on-hand stock priced at the product's current price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLine {
    pub quantity: i64,
    pub min_quantity: i64,
    pub unit_price: Money,
}

impl StockLine {
    pub fn value(&self) -> DomainResult<Money> {
        self.unit_price
            .checked_mul_quantity(self.quantity)
            .ok_or_else(|| DomainError::invalid_input("stock value out of range"))
    }

    pub fn is_low_stock(&self) -> bool {
        is_low_stock(self.quantity, self.min_quantity)
    }
}

/// Σ quantity × unit_price over all lines.
pub fn stock_value(lines: &[StockLine]) -> DomainResult<Money> {
    lines.iter().try_fold(Money::zero(), |acc, line| {
        acc.checked_add(line.value()?)
            .ok_or_else(|| DomainError::invalid_input("stock value out of range"))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSummary {
    pub item_count: usize,
    pub low_stock_count: usize,
    pub total_value: Money,
}

pub fn summarize(lines: &[StockLine]) -> DomainResult<StockSummary> {
    Ok(StockSummary {
        item_count: lines.len(),
        low_stock_count: lines.iter().filter(|l| l.is_low_stock()).count(),
        total_value: stock_value(lines)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(quantity: i64, min_quantity: i64, price: rust_decimal::Decimal) -> StockLine {
        StockLine {
            quantity,
            min_quantity,
            unit_price: Money::new(price),
        }
    }

    #[test]
    fn low_stock_includes_the_reorder_level_itself() {
        assert!(is_low_stock(5, 5));
        assert!(is_low_stock(0, 0));
        assert!(!is_low_stock(6, 5));
    }

    #[test]
    fn summary_counts_and_values() {
        let lines = [
            line(10, 5, dec!(2.50)),
            line(3, 5, dec!(10.00)),
            line(0, 0, dec!(99.99)),
        ];
        let summary = summarize(&lines).unwrap();
        assert_eq!(summary.item_count, 3);
        assert_eq!(summary.low_stock_count, 2);
        assert_eq!(summary.total_value, Money::new(dec!(55.00)));
    }

    #[test]
    fn empty_inventory_is_worth_zero() {
        assert_eq!(stock_value(&[]).unwrap(), Money::zero());
    }

    #[test]
    fn overflow_is_invalid_input() {
        let lines = [line(2, 0, rust_decimal::Decimal::MAX)];
        assert!(matches!(stock_value(&lines), Err(DomainError::InvalidInput(_))));
    }
}
