use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{Aggregate, AggregateId, AggregateRoot, DomainError, validate};
use stockbook_events::Event;

/// Party identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyId(pub AggregateId);

impl PartyId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PartyId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Party kind: customer or supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyKind {
    Customer,
    Supplier,
}

impl PartyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartyKind::Customer => "customer",
            PartyKind::Supplier => "supplier",
        }
    }

    /// Accepted lengths of the tax document, in digits.
    fn document_lengths(&self) -> &'static [usize] {
        match self {
            PartyKind::Customer => &[11, 14],
            PartyKind::Supplier => &[14],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerType {
    #[default]
    Individual,
    Company,
}

/// Contact and registration details of a party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyDetails {
    pub name: String,
    pub document: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    /// Customers only.
    #[serde(default)]
    pub customer_type: Option<CustomerType>,
}

impl PartyDetails {
    pub fn validate(&self, kind: PartyKind) -> Result<(), DomainError> {
        validate::min_len("name", &self.name, 2)?;
        validate::digits("document", &self.document, kind.document_lengths())?;
        validate::email("email", &self.email)?;
        validate::min_len("phone", &self.phone, 10)?;
        validate::min_len("address", &self.address, 5)?;
        if kind == PartyKind::Supplier && self.customer_type.is_some() {
            return Err(DomainError::validation(
                "customer_type only applies to customers",
            ));
        }
        Ok(())
    }

    /// Trimmed copy; customers without a type default to individual.
    fn normalized(&self, kind: PartyKind) -> Self {
        Self {
            name: self.name.trim().to_string(),
            document: self.document.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
            customer_type: match kind {
                PartyKind::Customer => Some(self.customer_type.unwrap_or_default()),
                PartyKind::Supplier => self.customer_type,
            },
        }
    }
}

/// Aggregate root: Party (customer or supplier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    id: PartyId,
    kind: PartyKind,
    details: Option<PartyDetails>,
    removed: bool,
    version: u64,
}

impl Party {
    /// Create an empty, not-yet-registered aggregate instance for rehydration.
    pub fn empty(id: PartyId) -> Self {
        Self {
            id,
            kind: PartyKind::Customer,
            details: None,
            removed: false,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> PartyId {
        self.id
    }

    pub fn kind(&self) -> PartyKind {
        self.kind
    }

    pub fn details(&self) -> Option<&PartyDetails> {
        self.details.as_ref()
    }

    /// Registered and not removed.
    pub fn is_active(&self) -> bool {
        self.details.is_some() && !self.removed
    }
}

impl AggregateRoot for Party {
    type Id = PartyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterParty {
    pub party_id: PartyId,
    pub kind: PartyKind,
    pub details: PartyDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Full replacement of the details; the kind is fixed at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDetails {
    pub party_id: PartyId,
    pub details: PartyDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveParty {
    pub party_id: PartyId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyCommand {
    RegisterParty(RegisterParty),
    UpdateDetails(UpdateDetails),
    RemoveParty(RemoveParty),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRegistered {
    pub party_id: PartyId,
    pub kind: PartyKind,
    pub details: PartyDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyUpdated {
    pub party_id: PartyId,
    pub details: PartyDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRemoved {
    pub party_id: PartyId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartyEvent {
    PartyRegistered(PartyRegistered),
    PartyUpdated(PartyUpdated),
    PartyRemoved(PartyRemoved),
}

impl Event for PartyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PartyEvent::PartyRegistered(_) => "parties.party.registered",
            PartyEvent::PartyUpdated(_) => "parties.party.updated",
            PartyEvent::PartyRemoved(_) => "parties.party.removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PartyEvent::PartyRegistered(e) => e.occurred_at,
            PartyEvent::PartyUpdated(e) => e.occurred_at,
            PartyEvent::PartyRemoved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Party {
    type Command = PartyCommand;
    type Event = PartyEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PartyEvent::PartyRegistered(e) => {
                self.id = e.party_id;
                self.kind = e.kind;
                self.details = Some(e.details.clone());
            }
            PartyEvent::PartyUpdated(e) => {
                self.details = Some(e.details.clone());
            }
            PartyEvent::PartyRemoved(_) => {
                self.removed = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PartyCommand::RegisterParty(cmd) => self.handle_register(cmd),
            PartyCommand::UpdateDetails(cmd) => self.handle_update(cmd),
            PartyCommand::RemoveParty(cmd) => self.handle_remove(cmd),
        }
    }
}

impl Party {
    fn ensure_active(&self, party_id: PartyId) -> Result<(), DomainError> {
        if !self.is_active() {
            return Err(DomainError::not_found());
        }
        if self.id != party_id {
            return Err(DomainError::invariant("party_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterParty) -> Result<Vec<PartyEvent>, DomainError> {
        if self.details.is_some() {
            return Err(DomainError::conflict("party already exists"));
        }
        let details = cmd.details.normalized(cmd.kind);
        details.validate(cmd.kind)?;

        Ok(vec![PartyEvent::PartyRegistered(PartyRegistered {
            party_id: cmd.party_id,
            kind: cmd.kind,
            details,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateDetails) -> Result<Vec<PartyEvent>, DomainError> {
        self.ensure_active(cmd.party_id)?;
        let details = cmd.details.normalized(self.kind);
        details.validate(self.kind)?;

        Ok(vec![PartyEvent::PartyUpdated(PartyUpdated {
            party_id: cmd.party_id,
            details,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove(&self, cmd: &RemoveParty) -> Result<Vec<PartyEvent>, DomainError> {
        self.ensure_active(cmd.party_id)?;

        Ok(vec![PartyEvent::PartyRemoved(PartyRemoved {
            party_id: cmd.party_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
