//! Parties domain module (event-sourced): customers and suppliers.

pub mod party;

pub use party::{
    CustomerType, Party, PartyCommand, PartyDetails, PartyEvent, PartyId, PartyKind,
    PartyRegistered, PartyRemoved, PartyUpdated, RegisterParty, RemoveParty, UpdateDetails,
};
