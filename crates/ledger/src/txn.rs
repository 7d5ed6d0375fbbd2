//! Typed access to one storage snapshot.
//!
//! Every ledger operation runs inside exactly one [`Txn`]: registries read
//! and write JSON documents through it and queue their audit events on it.
//! Nothing becomes visible until [`Txn::commit`].

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracechain_storage::{CommitReceipt, LedgerStorage, StorageError};

use crate::error::LedgerError;
use crate::event::LedgerEvent;
use crate::types::{Category, Identity, Role, TokenId};

/// Storage key layout.
pub(crate) mod keys {
    use super::*;

    pub const ADMIN: &str = "ledger/admin";
    pub const TOKEN_COUNTER: &str = "counter/token";
    pub const TRANSPORT_COUNTER: &str = "counter/transport";

    pub fn roles(identity: &Identity) -> String {
        format!("roles/{identity}")
    }

    pub fn role_members(role: Role) -> String {
        format!("role_members/{role}")
    }

    pub fn token(id: TokenId) -> String {
        format!("token/{id}")
    }

    pub fn owner_tokens(owner: &Identity) -> String {
        format!("owner_tokens/{owner}")
    }

    pub fn category_tokens(category: Category) -> String {
        format!("category_tokens/{}", category.key())
    }

    pub fn record(category: Category, id: TokenId) -> String {
        format!("{}/{id}", category.key())
    }

    pub fn carcass_of_animal(animal_id: TokenId) -> String {
        format!("carcass_of_animal/{animal_id}")
    }

    pub fn animal_transports(animal_id: TokenId) -> String {
        format!("animal_transports/{animal_id}")
    }

    pub fn carcass_meats(carcass_id: TokenId) -> String {
        format!("carcass_meats/{carcass_id}")
    }
}

pub(crate) struct Txn<'s, S: LedgerStorage> {
    storage: &'s S,
    snapshot: S::Snapshot,
    events: Vec<LedgerEvent>,
}

impl<'s, S: LedgerStorage> Txn<'s, S> {
    pub async fn begin(storage: &'s S) -> Result<Self, LedgerError> {
        let snapshot = storage.begin_snapshot().await?;
        Ok(Txn {
            storage,
            snapshot,
            events: Vec::new(),
        })
    }

    pub async fn load<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>, LedgerError> {
        match self.storage.read(&mut self.snapshot, key).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| corrupt(key, e)),
            None => Ok(None),
        }
    }

    /// Load a list-valued key, treating absence as empty.
    pub async fn load_list<T: DeserializeOwned>(&mut self, key: &str) -> Result<Vec<T>, LedgerError> {
        Ok(self.load(key).await?.unwrap_or_default())
    }

    /// Load the record of `category` stored under `id`.
    pub async fn record<T: DeserializeOwned>(
        &mut self,
        category: Category,
        id: TokenId,
    ) -> Result<T, LedgerError> {
        self.load(&keys::record(category, id))
            .await?
            .ok_or(LedgerError::MissingRecord { category, id })
    }

    pub async fn store<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), LedgerError> {
        let value = serde_json::to_value(value).map_err(|e| corrupt(key, e))?;
        self.storage.write(&mut self.snapshot, key, value).await?;
        Ok(())
    }

    /// Create `key`; fails with `StorageError::AlreadyExists` if present.
    pub async fn insert<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), LedgerError> {
        let value = serde_json::to_value(value).map_err(|e| corrupt(key, e))?;
        self.storage.insert(&mut self.snapshot, key, value).await?;
        Ok(())
    }

    /// Take the next value of a counter (starting at zero) and advance it.
    pub async fn next_id(&mut self, counter: &str) -> Result<TokenId, LedgerError> {
        let id: TokenId = self.load(counter).await?.unwrap_or(0);
        self.store(counter, &(id + 1)).await?;
        Ok(id)
    }

    pub async fn push<T: Serialize + DeserializeOwned>(
        &mut self,
        key: &str,
        item: T,
    ) -> Result<(), LedgerError> {
        let mut list: Vec<T> = self.load_list(key).await?;
        list.push(item);
        self.store(key, &list).await
    }

    pub fn emit(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    /// Append queued events and commit the snapshot.
    pub async fn commit(mut self) -> Result<CommitReceipt, LedgerError> {
        for event in std::mem::take(&mut self.events) {
            let payload = match serde_json::to_value(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    let _ = self.storage.abort_snapshot(self.snapshot).await;
                    return Err(corrupt("event", e));
                }
            };
            if let Err(e) = self.storage.append_event(&mut self.snapshot, payload).await {
                let _ = self.storage.abort_snapshot(self.snapshot).await;
                return Err(e.into());
            }
        }
        Ok(self.storage.commit_snapshot(self.snapshot).await?)
    }

    pub async fn abort(self) {
        if let Err(e) = self.storage.abort_snapshot(self.snapshot).await {
            tracing::warn!(error = %e, "snapshot abort failed");
        }
    }
}

fn corrupt(key: &str, e: serde_json::Error) -> LedgerError {
    LedgerError::Corrupt {
        key: key.to_string(),
        message: e.to_string(),
    }
}

/// Map an insert collision on a token key to `DuplicateId`.
pub(crate) fn duplicate_on_exists(token_id: TokenId) -> impl FnOnce(LedgerError) -> LedgerError {
    move |e| match e {
        LedgerError::Storage(StorageError::AlreadyExists { .. }) => {
            LedgerError::DuplicateId { token_id }
        }
        other => other,
    }
}
