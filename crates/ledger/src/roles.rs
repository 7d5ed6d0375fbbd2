//! Role membership. Every mutating operation of the registries is gated
//! here.

use std::collections::BTreeSet;

use tracechain_storage::LedgerStorage;

use crate::error::LedgerError;
use crate::event::LedgerEvent;
use crate::txn::{keys, Txn};
use crate::types::{Identity, Role};

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RoleAccess;

impl RoleAccess {
    /// Grant ADMIN to `admin` unless the ledger was already initialized.
    /// Returns `true` when this call performed the initialization.
    pub async fn bootstrap<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        admin: &Identity,
    ) -> Result<bool, LedgerError> {
        if txn.load::<Identity>(keys::ADMIN).await?.is_some() {
            return Ok(false);
        }
        txn.insert(keys::ADMIN, admin).await?;
        self.add_member(txn, admin, Role::Admin).await?;
        txn.emit(LedgerEvent::RoleGranted {
            role: Role::Admin,
            account: admin.clone(),
            sender: admin.clone(),
        });
        Ok(true)
    }

    pub async fn roles_of<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        identity: &Identity,
    ) -> Result<BTreeSet<Role>, LedgerError> {
        Ok(txn
            .load(&keys::roles(identity))
            .await?
            .unwrap_or_default())
    }

    pub async fn has_role<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        identity: &Identity,
        role: Role,
    ) -> Result<bool, LedgerError> {
        Ok(self.roles_of(txn, identity).await?.contains(&role))
    }

    pub async fn require<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        caller: &Identity,
        role: Role,
    ) -> Result<(), LedgerError> {
        if self.has_role(txn, caller, role).await? {
            Ok(())
        } else {
            Err(LedgerError::unauthorized(caller, role))
        }
    }

    /// Holders of `role`, in the order they were granted it.
    pub async fn members<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        role: Role,
    ) -> Result<Vec<Identity>, LedgerError> {
        txn.load_list(&keys::role_members(role)).await
    }

    pub async fn grant<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        sender: &Identity,
        account: &Identity,
        role: Role,
    ) -> Result<bool, LedgerError> {
        self.require(txn, sender, Role::Admin).await?;
        let changed = self.add_member(txn, account, role).await?;
        if changed {
            txn.emit(LedgerEvent::RoleGranted {
                role,
                account: account.clone(),
                sender: sender.clone(),
            });
        }
        Ok(changed)
    }

    pub async fn revoke<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        sender: &Identity,
        account: &Identity,
        role: Role,
    ) -> Result<bool, LedgerError> {
        self.require(txn, sender, Role::Admin).await?;
        self.remove_and_emit(txn, sender, account, role).await
    }

    /// Drop one of the caller's own roles. Needs no admin rights.
    pub async fn renounce<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        caller: &Identity,
        role: Role,
    ) -> Result<bool, LedgerError> {
        self.remove_and_emit(txn, caller, caller, role).await
    }

    async fn remove_and_emit<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        sender: &Identity,
        account: &Identity,
        role: Role,
    ) -> Result<bool, LedgerError> {
        let changed = self.remove_member(txn, account, role).await?;
        if changed {
            txn.emit(LedgerEvent::RoleRevoked {
                role,
                account: account.clone(),
                sender: sender.clone(),
            });
        }
        Ok(changed)
    }

    async fn add_member<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        account: &Identity,
        role: Role,
    ) -> Result<bool, LedgerError> {
        let mut held = self.roles_of(txn, account).await?;
        if !held.insert(role) {
            return Ok(false);
        }
        txn.store(&keys::roles(account), &held).await?;
        txn.push(&keys::role_members(role), account.clone()).await?;
        Ok(true)
    }

    async fn remove_member<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        account: &Identity,
        role: Role,
    ) -> Result<bool, LedgerError> {
        let mut held = self.roles_of(txn, account).await?;
        if !held.remove(&role) {
            return Ok(false);
        }
        txn.store(&keys::roles(account), &held).await?;
        let key = keys::role_members(role);
        let mut members: Vec<Identity> = txn.load_list(&key).await?;
        members.retain(|m| m != account);
        txn.store(&key, &members).await?;
        Ok(true)
    }
}
