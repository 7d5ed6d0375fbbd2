//! Audit-log events.
//!
//! Events are buffered in the operation's snapshot and appended at commit,
//! so the log only ever shows operations that took effect.

use serde::{Deserialize, Serialize};
use tracechain_storage::EventRecord;

use crate::error::LedgerError;
use crate::types::{Category, Identity, Role, TokenId};

pub mod messages {
    pub const ANIMAL_CREATED: &str = "AnimalNFT created";
    pub const ANIMAL_CHANGED: &str = "Animal info changed.";
    pub const ANIMAL_KILLED: &str = "Animal slaughtered.";
    pub const TRANSPORT_CREATED: &str = "Transport created";
    pub const TRANSPORT_CHANGED: &str = "Transport info changed.";
    pub const CARCASS_CREATED: &str = "CarcassNFT created";
    pub const CARCASS_CHANGED: &str = "Carcass info changed.";
    pub const MEAT_CREATED: &str = "MeatNFT created";
    pub const MEAT_CHANGED: &str = "Meat info changed.";
    pub const RECIPE_CREATED: &str = "RecipeNFT created";
    pub const PRODUCT_CREATED: &str = "ManufacturedProduct created";
    pub const PRODUCT_CHANGED: &str = "ManufacturedProduct info changed.";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum LedgerEvent {
    RoleGranted {
        role: Role,
        account: Identity,
        sender: Identity,
    },
    RoleRevoked {
        role: Role,
        account: Identity,
        sender: Identity,
    },
    NftMinted {
        token_id: TokenId,
        category: Category,
        owner: Identity,
        message: String,
    },
    MetadataChanged {
        token_id: TokenId,
        actor: Identity,
        message: String,
    },
    Transfer {
        token_id: TokenId,
        category: Category,
        from: Identity,
        to: Identity,
    },
    TransportRecorded {
        transport_id: TokenId,
        animal_id: TokenId,
        actor: Identity,
        message: String,
    },
    TransportChanged {
        transport_id: TokenId,
        animal_id: TokenId,
        actor: Identity,
        message: String,
    },
}

impl LedgerEvent {
    pub(crate) fn minted(token_id: TokenId, category: Category, owner: &Identity, message: &str) -> Self {
        LedgerEvent::NftMinted {
            token_id,
            category,
            owner: owner.clone(),
            message: message.to_string(),
        }
    }

    pub(crate) fn changed(token_id: TokenId, actor: &Identity, message: &str) -> Self {
        LedgerEvent::MetadataChanged {
            token_id,
            actor: actor.clone(),
            message: message.to_string(),
        }
    }

    /// The human-readable message, for events that carry one.
    pub fn message(&self) -> Option<&str> {
        match self {
            LedgerEvent::NftMinted { message, .. }
            | LedgerEvent::MetadataChanged { message, .. }
            | LedgerEvent::TransportRecorded { message, .. }
            | LedgerEvent::TransportChanged { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// A committed event with its position in the global log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub sequence: u64,
    pub recorded_at: String,
    pub event: LedgerEvent,
}

impl TryFrom<EventRecord> for AuditEntry {
    type Error = LedgerError;

    fn try_from(record: EventRecord) -> Result<Self, Self::Error> {
        let event = serde_json::from_value(record.payload).map_err(|e| LedgerError::Corrupt {
            key: format!("event/{}", record.sequence),
            message: e.to_string(),
        })?;
        Ok(AuditEntry {
            sequence: record.sequence,
            recorded_at: record.recorded_at,
            event,
        })
    }
}
