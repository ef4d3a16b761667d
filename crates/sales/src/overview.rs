//! Monthly sales overview for the dashboard chart.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use stockbook_core::{DomainError, DomainResult, Money};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlySales {
    /// Calendar month as `YYYY-MM`.
    pub name: String,
    pub total: Money,
}

/// Group `(date, total)` pairs by calendar month, ascending by month.
pub fn monthly_sales<I>(points: I) -> DomainResult<Vec<MonthlySales>>
where
    I: IntoIterator<Item = (NaiveDate, Money)>,
{
    let mut months: BTreeMap<(i32, u32), Money> = BTreeMap::new();
    for (date, total) in points {
        let slot = months.entry((date.year(), date.month())).or_default();
        *slot = slot
            .checked_add(total)
            .ok_or_else(|| DomainError::invalid_input("monthly total out of range"))?;
    }

    Ok(months
        .into_iter()
        .map(|((year, month), total)| MonthlySales {
            name: format!("{year:04}-{month:02}"),
            total,
        })
        .collect())
}
