use std::fmt;

use serde::{Deserialize, Serialize};
use tracechain_storage::StorageError;

use crate::types::{Category, Identity, Role, TokenId};

/// Abstract failure kinds, independent of the variant payloads.
///
/// Scenario files and JSON output name failures by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Unauthorized,
    NotOwner,
    InvalidReceiver,
    WrongCategory,
    IllegalStateTransition,
    ArityMismatch,
    RecipeMismatch,
    DuplicateId,
    /// Lost an optimistic concurrency race; the caller may retry.
    Conflict,
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What the caller was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Role(Role),
    /// Only registries on the mapper's allow-list may register tokens.
    TrustedRegistrar,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Role(Role::Admin) => f.write_str("an admin"),
            Requirement::Role(role) => write!(f, "a {}", role.noun()),
            Requirement::TrustedRegistrar => f.write_str("a trusted registry"),
        }
    }
}

/// Lifecycle rules a request would break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StateViolation {
    #[error("Animal already has been slaughtered")]
    AlreadySlaughtered,
    #[error("Animal is still alive")]
    AnimalAlive,
    #[error("Animal life cycle is over")]
    LifeCycleOver,
    #[error("Animal is not present or is not owned by the transporter")]
    StaleTransport,
    #[error("Carcass already exists for this animal")]
    CarcassExists,
    #[error("Product needs at least one meat")]
    NoMeat,
    #[error("Meat is listed more than once")]
    DuplicateMeat,
}

/// Every way a ledger operation can fail. A failed operation commits nothing.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Caller is not {requirement}")]
    Unauthorized {
        caller: String,
        requirement: Requirement,
    },

    #[error("Caller does not own this token")]
    NotOwner { token_id: TokenId, caller: Identity },

    #[error("{}", receiver_reason(.accepted))]
    InvalidReceiver {
        token_id: TokenId,
        receiver: Identity,
        accepted: Vec<Role>,
    },

    #[error("Token {token_id} is a {actual}, expected {expected}")]
    WrongCategory {
        token_id: TokenId,
        expected: Category,
        actual: Category,
    },

    #[error("Token {token_id} is not registered")]
    UnknownToken { token_id: TokenId },

    #[error("{category} {id} does not exist")]
    MissingRecord { category: Category, id: TokenId },

    #[error("{violation}")]
    IllegalStateTransition {
        id: TokenId,
        violation: StateViolation,
    },

    #[error(
        "Ingredient lists must have equal length (species: {species}, parts: {parts}, weights: {weights})"
    )]
    ArityMismatch {
        species: usize,
        parts: usize,
        weights: usize,
    },

    #[error("Meat is not valid for the recipe")]
    RecipeMismatch { recipe_id: TokenId },

    #[error("Token {token_id} is already registered")]
    DuplicateId { token_id: TokenId },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("corrupt ledger value at {key}: {message}")]
    Corrupt { key: String, message: String },
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Unauthorized { .. } => ErrorKind::Unauthorized,
            LedgerError::NotOwner { .. } => ErrorKind::NotOwner,
            LedgerError::InvalidReceiver { .. } => ErrorKind::InvalidReceiver,
            LedgerError::WrongCategory { .. }
            | LedgerError::UnknownToken { .. }
            | LedgerError::MissingRecord { .. } => ErrorKind::WrongCategory,
            LedgerError::IllegalStateTransition { .. } => ErrorKind::IllegalStateTransition,
            LedgerError::ArityMismatch { .. } => ErrorKind::ArityMismatch,
            LedgerError::RecipeMismatch { .. } => ErrorKind::RecipeMismatch,
            LedgerError::DuplicateId { .. } => ErrorKind::DuplicateId,
            LedgerError::Storage(StorageError::ConcurrentConflict { .. }) => ErrorKind::Conflict,
            LedgerError::Storage(StorageError::AlreadyExists { .. }) => ErrorKind::DuplicateId,
            LedgerError::Storage(StorageError::Backend(_)) | LedgerError::Corrupt { .. } => {
                ErrorKind::Storage
            }
        }
    }

    pub(crate) fn unauthorized(caller: &Identity, role: Role) -> Self {
        LedgerError::Unauthorized {
            caller: caller.to_string(),
            requirement: Requirement::Role(role),
        }
    }

    pub(crate) fn illegal(id: TokenId, violation: StateViolation) -> Self {
        LedgerError::IllegalStateTransition { id, violation }
    }
}

fn receiver_reason(accepted: &[Role]) -> String {
    let nouns: Vec<&str> = accepted.iter().map(|r| r.noun()).collect();
    match nouns.as_slice() {
        [] => "Receiver may not hold this token".to_string(),
        [one] => format!("Receiver is not a {one}"),
        [a, b] => format!("Receiver is neither a {a} nor a {b}"),
        many => format!("Receiver is none of: {}", many.join(", ")),
    }
}
