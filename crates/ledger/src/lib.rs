//! Role-gated custody ledger for food supply chain traceability.
//!
//! Records move forward along animal → carcass → meat → manufactured
//! product, with transports as side legs of an animal and recipes as
//! validation templates for meat sets. Each record is owned by exactly one
//! identity; every write is gated by ownership, a role, and a category
//! check on the ids it references.
//!
//! [`Ledger`] is the entry point. It runs every operation atomically over a
//! [`tracechain_storage::LedgerStorage`] backend.

mod animal;
mod carcass;
pub mod config;
pub mod error;
pub mod event;
mod ledger;
mod mapper;
mod meat;
mod product;
mod recipe;
mod roles;
mod transport;
mod txn;
pub mod types;

pub use config::{ConfigError, LedgerConfig, ReceiverRule, Registrar, TransferPolicy};
pub use error::{ErrorKind, LedgerError, Requirement, StateViolation};
pub use event::{AuditEntry, LedgerEvent};
pub use ledger::Ledger;
pub use types::{
    Animal, AnimalUpdate, Carcass, CarcassUpdate, Category, Identity, Ingredient,
    ManufacturedProduct, Meat, MeatTrace, MeatUpdate, ProductTrace, ProductUpdate, Recipe, Role,
    TokenEntry, TokenId, Transport, TransportUpdate,
};
