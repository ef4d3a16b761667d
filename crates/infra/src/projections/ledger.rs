//! Ledger read model and the balance views computed from it.
//!
//! Transactions are listed in recording order. That order is what the stable
//! date sort in [`running_balance`] preserves for same-day entries.

use serde_json::Value as JsonValue;

use stockbook_core::{DomainResult, Money};
use stockbook_events::EventEnvelope;
use stockbook_ledger::{
    LedgerEvent, RunningBalancePoint, Transaction, TransactionId, current_balance, running_balance,
};

use crate::projections::aggregate_types;
use crate::projections::cursor::{Projection, ProjectionError, StreamCursors, decode, ensure_stream};
use crate::read_model::ReadModelStore;

#[derive(Debug)]
pub struct LedgerProjection<S>
where
    S: ReadModelStore<TransactionId, Transaction>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> LedgerProjection<S>
where
    S: ReadModelStore<TransactionId, Transaction>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, id: &TransactionId) -> Option<Transaction> {
        self.store.get(id)
    }

    pub fn list(&self) -> Vec<Transaction> {
        self.store.list()
    }

    pub fn running_balance(&self) -> DomainResult<Vec<RunningBalancePoint>> {
        running_balance(&self.store.list())
    }

    pub fn current_balance(&self) -> DomainResult<Money> {
        current_balance(&self.store.list())
    }
}

impl<S> Projection for LedgerProjection<S>
where
    S: ReadModelStore<TransactionId, Transaction>,
{
    fn name(&self) -> &'static str {
        "ledger.transactions"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_types::TRANSACTION {
            return Ok(());
        }
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let ev: LedgerEvent = decode(envelope)?;
        let id = match &ev {
            LedgerEvent::TransactionRecorded(e) => e.transaction_id,
            LedgerEvent::TransactionAmended(e) => e.transaction_id,
            LedgerEvent::TransactionVoided(e) => e.transaction_id,
        };
        ensure_stream(envelope, id.0)?;

        match ev {
            LedgerEvent::TransactionRecorded(e) => {
                self.store.upsert(id, Transaction::from_details(id, e.details));
            }
            LedgerEvent::TransactionAmended(e) => {
                // Upsert keeps the recording position.
                self.store.upsert(id, Transaction::from_details(id, e.details));
            }
            LedgerEvent::TransactionVoided(_) => {
                self.store.remove(&id);
            }
        }

        self.cursors.advance(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

    fn reset(&self) {
        self.store.clear();
        self.cursors.clear();
    }
}
