use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money};
use stockbook_events::Event;
use stockbook_products::ProductId;
use stockbook_sales::OrderId;

/// Ledger transaction identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub AggregateId);

impl TransactionId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Direction of a ledger entry. Credits add to the balance, debits subtract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    #[serde(alias = "income")]
    Credit,
    #[serde(alias = "expense")]
    Debit,
}

/// Editable attributes of a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub date: NaiveDate,
    pub kind: TransactionKind,
    pub amount: Money,
    pub product_id: ProductId,
    #[serde(default)]
    pub order_id: Option<OrderId>,
    #[serde(default)]
    pub description: Option<String>,
}

impl TransactionDetails {
    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.amount.is_positive() {
            return Err(DomainError::validation("amount must be greater than zero"));
        }
        Ok(())
    }

    fn normalized(&self) -> Self {
        Self {
            description: self
                .description
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            ..self.clone()
        }
    }
}

/// A recorded ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub date: NaiveDate,
    pub kind: TransactionKind,
    pub amount: Money,
    pub product_id: ProductId,
    pub order_id: Option<OrderId>,
    pub description: Option<String>,
}

impl Transaction {
    pub fn from_details(id: TransactionId, details: TransactionDetails) -> Self {
        Self {
            id,
            date: details.date,
            kind: details.kind,
            amount: details.amount,
            product_id: details.product_id,
            order_id: details.order_id,
            description: details.description,
        }
    }

    /// `+amount` for a credit, `-amount` for a debit.
    pub fn signed_effect(&self) -> Money {
        match self.kind {
            TransactionKind::Credit => self.amount,
            TransactionKind::Debit => -self.amount,
        }
    }
}

/// Aggregate root: one ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTransaction {
    id: TransactionId,
    current: Option<Transaction>,
    voided: bool,
    version: u64,
}

impl LedgerTransaction {
    /// Create an empty, not-yet-recorded aggregate instance for rehydration.
    pub fn empty(id: TransactionId) -> Self {
        Self {
            id,
            current: None,
            voided: false,
            version: 0,
        }
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        self.current.as_ref()
    }

    pub fn is_voided(&self) -> bool {
        self.voided
    }
}

impl AggregateRoot for LedgerTransaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTransaction {
    pub transaction_id: TransactionId,
    pub details: TransactionDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Full replacement of the entry's details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendTransaction {
    pub transaction_id: TransactionId,
    pub details: TransactionDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidTransaction {
    pub transaction_id: TransactionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerCommand {
    RecordTransaction(RecordTransaction),
    AmendTransaction(AmendTransaction),
    VoidTransaction(VoidTransaction),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecorded {
    pub transaction_id: TransactionId,
    pub details: TransactionDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionAmended {
    pub transaction_id: TransactionId,
    pub details: TransactionDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionVoided {
    pub transaction_id: TransactionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    TransactionRecorded(TransactionRecorded),
    TransactionAmended(TransactionAmended),
    TransactionVoided(TransactionVoided),
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::TransactionRecorded(_) => "ledger.transaction.recorded",
            LedgerEvent::TransactionAmended(_) => "ledger.transaction.amended",
            LedgerEvent::TransactionVoided(_) => "ledger.transaction.voided",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::TransactionRecorded(e) => e.occurred_at,
            LedgerEvent::TransactionAmended(e) => e.occurred_at,
            LedgerEvent::TransactionVoided(e) => e.occurred_at,
        }
    }
}

impl Aggregate for LedgerTransaction {
    type Command = LedgerCommand;
    type Event = LedgerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LedgerEvent::TransactionRecorded(e) => {
                self.id = e.transaction_id;
                self.current = Some(Transaction::from_details(e.transaction_id, e.details.clone()));
            }
            LedgerEvent::TransactionAmended(e) => {
                self.current = Some(Transaction::from_details(e.transaction_id, e.details.clone()));
            }
            LedgerEvent::TransactionVoided(_) => {
                self.voided = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LedgerCommand::RecordTransaction(cmd) => self.handle_record(cmd),
            LedgerCommand::AmendTransaction(cmd) => self.handle_amend(cmd),
            LedgerCommand::VoidTransaction(cmd) => self.handle_void(cmd),
        }
    }
}

impl LedgerTransaction {
    fn ensure_live(&self, transaction_id: TransactionId) -> Result<(), DomainError> {
        if self.current.is_none() || self.voided {
            return Err(DomainError::not_found());
        }
        if self.id != transaction_id {
            return Err(DomainError::invariant("transaction_id mismatch"));
        }
        Ok(())
    }

    fn handle_record(&self, cmd: &RecordTransaction) -> Result<Vec<LedgerEvent>, DomainError> {
        if self.current.is_some() {
            return Err(DomainError::conflict("transaction already exists"));
        }
        let details = cmd.details.normalized();
        details.validate()?;

        Ok(vec![LedgerEvent::TransactionRecorded(TransactionRecorded {
            transaction_id: cmd.transaction_id,
            details,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_amend(&self, cmd: &AmendTransaction) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_live(cmd.transaction_id)?;
        let details = cmd.details.normalized();
        details.validate()?;

        Ok(vec![LedgerEvent::TransactionAmended(TransactionAmended {
            transaction_id: cmd.transaction_id,
            details,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_void(&self, cmd: &VoidTransaction) -> Result<Vec<LedgerEvent>, DomainError> {
        self.ensure_live(cmd.transaction_id)?;

        Ok(vec![LedgerEvent::TransactionVoided(TransactionVoided {
            transaction_id: cmd.transaction_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_transaction_id() -> TransactionId {
        TransactionId::new(AggregateId::new())
    }

    fn details(kind: TransactionKind, amount: Money) -> TransactionDetails {
        TransactionDetails {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            kind,
            amount,
            product_id: ProductId::new(AggregateId::new()),
            order_id: None,
            description: Some("  ".to_string()),
        }
    }

    fn recorded(id: TransactionId) -> LedgerTransaction {
        let mut tx = LedgerTransaction::empty(id);
        let events = tx
            .handle(&LedgerCommand::RecordTransaction(RecordTransaction {
                transaction_id: id,
                details: details(TransactionKind::Credit, Money::new(dec!(100))),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            tx.apply(e);
        }
        tx
    }

    #[test]
    fn signed_effect_follows_kind() {
        let id = test_transaction_id();
        let credit =
            Transaction::from_details(id, details(TransactionKind::Credit, Money::new(dec!(100))));
        let debit =
            Transaction::from_details(id, details(TransactionKind::Debit, Money::new(dec!(40))));
        assert_eq!(credit.signed_effect(), Money::new(dec!(100)));
        assert_eq!(debit.signed_effect(), Money::new(dec!(-40)));
    }

    #[test]
    fn kind_accepts_income_and_expense_aliases() {
        let income: TransactionKind = serde_json::from_str("\"income\"").unwrap();
        let expense: TransactionKind = serde_json::from_str("\"expense\"").unwrap();
        assert_eq!(income, TransactionKind::Credit);
        assert_eq!(expense, TransactionKind::Debit);
        assert_eq!(serde_json::to_string(&TransactionKind::Debit).unwrap(), "\"debit\"");
    }

    #[test]
    fn record_drops_blank_description() {
        let id = test_transaction_id();
        let tx = recorded(id);
        let current = tx.transaction().unwrap();
        assert_eq!(current.description, None);
        assert_eq!(current.id, id);
        assert_eq!(tx.version(), 1);
    }

    #[test]
    fn amount_must_be_positive() {
        let id = test_transaction_id();
        for amount in [Money::zero(), Money::new(dec!(-5))] {
            let err = LedgerTransaction::empty(id)
                .handle(&LedgerCommand::RecordTransaction(RecordTransaction {
                    transaction_id: id,
                    details: details(TransactionKind::Debit, amount),
                    occurred_at: Utc::now(),
                }))
                .unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }
    }

    #[test]
    fn amend_replaces_details() {
        let id = test_transaction_id();
        let mut tx = recorded(id);
        let events = tx
            .handle(&LedgerCommand::AmendTransaction(AmendTransaction {
                transaction_id: id,
                details: details(TransactionKind::Debit, Money::new(dec!(12.5))),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        tx.apply(&events[0]);
        let current = tx.transaction().unwrap();
        assert_eq!(current.kind, TransactionKind::Debit);
        assert_eq!(current.signed_effect(), Money::new(dec!(-12.5)));
    }

    #[test]
    fn voided_transaction_is_not_found() {
        let id = test_transaction_id();
        let mut tx = recorded(id);
        let void = LedgerCommand::VoidTransaction(VoidTransaction {
            transaction_id: id,
            occurred_at: Utc::now(),
        });
        let events = tx.handle(&void).unwrap();
        tx.apply(&events[0]);
        assert!(tx.is_voided());
        assert_eq!(tx.handle(&void).unwrap_err(), DomainError::NotFound);
    }
}
