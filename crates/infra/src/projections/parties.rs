use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use stockbook_events::EventEnvelope;
use stockbook_parties::{CustomerType, PartyDetails, PartyEvent, PartyId, PartyKind};

use crate::projections::aggregate_types;
use crate::projections::cursor::{Projection, ProjectionError, StreamCursors, decode, ensure_stream};
use crate::read_model::ReadModelStore;

/// Directory entry for a customer or supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartyReadModel {
    pub party_id: PartyId,
    pub kind: PartyKind,
    pub name: String,
    pub document: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_type: Option<CustomerType>,
    pub created_at: DateTime<Utc>,
}

impl PartyReadModel {
    fn new(party_id: PartyId, kind: PartyKind, details: PartyDetails, created_at: DateTime<Utc>) -> Self {
        Self {
            party_id,
            kind,
            name: details.name,
            document: details.document,
            email: details.email,
            phone: details.phone,
            address: details.address,
            customer_type: details.customer_type,
            created_at,
        }
    }
}

#[derive(Debug)]
pub struct PartyDirectoryProjection<S>
where
    S: ReadModelStore<PartyId, PartyReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> PartyDirectoryProjection<S>
where
    S: ReadModelStore<PartyId, PartyReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, party_id: &PartyId) -> Option<PartyReadModel> {
        self.store.get(party_id)
    }

    /// Lookup that only matches parties of `kind`.
    pub fn get_kind(&self, party_id: &PartyId, kind: PartyKind) -> Option<PartyReadModel> {
        self.store.get(party_id).filter(|p| p.kind == kind)
    }

    pub fn list(&self, kind: PartyKind) -> Vec<PartyReadModel> {
        self.store.list().into_iter().filter(|p| p.kind == kind).collect()
    }
}

impl<S> Projection for PartyDirectoryProjection<S>
where
    S: ReadModelStore<PartyId, PartyReadModel>,
{
    fn name(&self) -> &'static str {
        "parties.directory"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_types::PARTY {
            return Ok(());
        }
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let ev: PartyEvent = decode(envelope)?;
        let party_id = match &ev {
            PartyEvent::PartyRegistered(e) => e.party_id,
            PartyEvent::PartyUpdated(e) => e.party_id,
            PartyEvent::PartyRemoved(e) => e.party_id,
        };
        ensure_stream(envelope, party_id.0)?;

        match ev {
            PartyEvent::PartyRegistered(e) => {
                self.store
                    .upsert(party_id, PartyReadModel::new(party_id, e.kind, e.details, e.occurred_at));
            }
            PartyEvent::PartyUpdated(e) => {
                // Kind and creation time are fixed at registration.
                if let Some(existing) = self.store.get(&party_id) {
                    self.store.upsert(
                        party_id,
                        PartyReadModel::new(party_id, existing.kind, e.details, existing.created_at),
                    );
                }
            }
            PartyEvent::PartyRemoved(_) => {
                self.store.remove(&party_id);
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
