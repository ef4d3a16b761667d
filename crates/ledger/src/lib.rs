//! Ledger domain module: credit/debit transactions and the running balance.

pub mod balance;
pub mod transaction;

pub use balance::{RunningBalancePoint, current_balance, running_balance};
pub use transaction::{
    AmendTransaction, LedgerCommand, LedgerEvent, LedgerTransaction, RecordTransaction,
    Transaction, TransactionAmended, TransactionDetails, TransactionId, TransactionKind,
    TransactionRecorded, TransactionVoided, VoidTransaction,
};
