//! Owner and category index of every token.
//!
//! The mapper is the single source of truth for who owns a token and what
//! kind of record it is. Categories are fixed at registration; owners only
//! change through [`TokenMapper::transfer`].

use std::collections::BTreeSet;
use std::sync::Arc;

use tracechain_storage::LedgerStorage;

use crate::config::{MapperConfig, ReceiverRule, Registrar, TransferPolicy};
use crate::error::{LedgerError, Requirement};
use crate::event::LedgerEvent;
use crate::roles::RoleAccess;
use crate::txn::{duplicate_on_exists, keys, Txn};
use crate::types::{Category, Identity, TokenEntry, TokenId};

#[derive(Debug, Clone)]
pub(crate) struct TokenMapper {
    trusted: Arc<BTreeSet<Registrar>>,
    policy: Arc<TransferPolicy>,
    roles: RoleAccess,
}

impl TokenMapper {
    pub fn new(config: &MapperConfig, policy: &TransferPolicy, roles: RoleAccess) -> Self {
        TokenMapper {
            trusted: Arc::new(config.trusted_registrars.clone()),
            policy: Arc::new(policy.clone()),
            roles,
        }
    }

    /// Allocate the next global token id.
    pub async fn next_token_id<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
    ) -> Result<TokenId, LedgerError> {
        txn.next_id(keys::TOKEN_COUNTER).await
    }

    /// The id the next created token will receive.
    pub async fn token_index<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
    ) -> Result<TokenId, LedgerError> {
        Ok(txn.load(keys::TOKEN_COUNTER).await?.unwrap_or(0))
    }

    pub async fn register_new_token<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        registrar: Registrar,
        token_id: TokenId,
        category: Category,
        owner: &Identity,
    ) -> Result<(), LedgerError> {
        if !self.trusted.contains(&registrar) {
            return Err(LedgerError::Unauthorized {
                caller: registrar.as_str().to_string(),
                requirement: Requirement::TrustedRegistrar,
            });
        }
        let entry = TokenEntry {
            category,
            owner: owner.clone(),
        };
        txn.insert(&keys::token(token_id), &entry)
            .await
            .map_err(duplicate_on_exists(token_id))?;
        txn.push(&keys::owner_tokens(owner), token_id).await?;
        txn.push(&keys::category_tokens(category), token_id).await?;
        Ok(())
    }

    pub async fn entry<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        token_id: TokenId,
    ) -> Result<TokenEntry, LedgerError> {
        txn.load(&keys::token(token_id))
            .await?
            .ok_or(LedgerError::UnknownToken { token_id })
    }

    pub async fn owner_of<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        token_id: TokenId,
    ) -> Result<Identity, LedgerError> {
        Ok(self.entry(txn, token_id).await?.owner)
    }

    pub async fn category_of<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        token_id: TokenId,
    ) -> Result<Category, LedgerError> {
        Ok(self.entry(txn, token_id).await?.category)
    }

    /// Resolve `token_id`, insisting that it is a `expected`.
    pub async fn require_category<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        token_id: TokenId,
        expected: Category,
    ) -> Result<TokenEntry, LedgerError> {
        let entry = self.entry(txn, token_id).await?;
        if entry.category != expected {
            return Err(LedgerError::WrongCategory {
                token_id,
                expected,
                actual: entry.category,
            });
        }
        Ok(entry)
    }

    /// Resolve a `expected` token that `caller` must currently own.
    pub async fn require_owned<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        token_id: TokenId,
        expected: Category,
        caller: &Identity,
    ) -> Result<TokenEntry, LedgerError> {
        let entry = self.require_category(txn, token_id, expected).await?;
        if &entry.owner != caller {
            return Err(LedgerError::NotOwner {
                token_id,
                caller: caller.clone(),
            });
        }
        Ok(entry)
    }

    pub async fn tokens_of_owner<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        owner: &Identity,
    ) -> Result<Vec<TokenId>, LedgerError> {
        txn.load_list(&keys::owner_tokens(owner)).await
    }

    pub async fn tokens_by_category<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        category: Category,
    ) -> Result<Vec<TokenId>, LedgerError> {
        txn.load_list(&keys::category_tokens(category)).await
    }

    /// Move `token_id` from `caller` to `to`.
    ///
    /// `expected` restricts the transfer to one category (the
    /// registry-specific paths); `None` is the generic path. The receiver
    /// must satisfy the configured rule of the token's category.
    pub async fn transfer<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        caller: &Identity,
        token_id: TokenId,
        to: &Identity,
        expected: Option<Category>,
    ) -> Result<(), LedgerError> {
        let mut entry = match expected {
            Some(category) => self.require_category(txn, token_id, category).await?,
            None => self.entry(txn, token_id).await?,
        };
        if &entry.owner != caller {
            return Err(LedgerError::NotOwner {
                token_id,
                caller: caller.clone(),
            });
        }

        let rule = self.policy.rule_for(entry.category);
        if let ReceiverRule::Roles(accepted) = &rule {
            let held = self.roles.roles_of(txn, to).await?;
            if !rule.admits(&held) {
                return Err(LedgerError::InvalidReceiver {
                    token_id,
                    receiver: to.clone(),
                    accepted: accepted.clone(),
                });
            }
        }

        let from = std::mem::replace(&mut entry.owner, to.clone());
        if &from != to {
            let from_key = keys::owner_tokens(&from);
            let mut held: Vec<TokenId> = txn.load_list(&from_key).await?;
            held.retain(|id| *id != token_id);
            txn.store(&from_key, &held).await?;
            txn.push(&keys::owner_tokens(to), token_id).await?;
            txn.store(&keys::token(token_id), &entry).await?;
        }
        txn.emit(LedgerEvent::Transfer {
            token_id,
            category: entry.category,
            from,
            to: to.clone(),
        });
        Ok(())
    }
}
