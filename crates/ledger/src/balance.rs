//! Running balance over ledger transactions.
//!
//! Each transaction contributes its signed effect. Transactions are ordered by
//! date with a stable sort, so entries sharing a date keep the order they were
//! given in. The balance series is the prefix sum of the sorted effects: one
//! point per transaction, never collapsed per day.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockbook_core::{DomainError, DomainResult, Money};

use crate::transaction::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningBalancePoint {
    pub date: NaiveDate,
    pub balance: Money,
}

fn overflow() -> DomainError {
    DomainError::invalid_input("running balance out of range")
}

/// Date-ascending cumulative balance, one point per transaction.
///
/// Linear after the sort: each point extends the previous prefix sum.
pub fn running_balance(transactions: &[Transaction]) -> DomainResult<Vec<RunningBalancePoint>> {
    let mut effects: Vec<(NaiveDate, Money)> = transactions
        .iter()
        .map(|t| (t.date, t.signed_effect()))
        .collect();
    // `sort_by_key` is stable.
    effects.sort_by_key(|(date, _)| *date);

    let mut balance = Money::zero();
    effects
        .into_iter()
        .map(|(date, effect)| {
            balance = balance.checked_add(effect).ok_or_else(overflow)?;
            Ok(RunningBalancePoint { date, balance })
        })
        .collect()
}

/// Sum of all signed effects; equals the last point of [`running_balance`].
pub fn current_balance(transactions: &[Transaction]) -> DomainResult<Money> {
    Money::try_sum(transactions.iter().map(Transaction::signed_effect)).ok_or_else(overflow)
}
