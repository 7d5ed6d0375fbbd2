use tracechain_storage::LedgerStorage;

use crate::error::{LedgerError, StateViolation};
use crate::event::{messages, LedgerEvent};
use crate::mapper::TokenMapper;
use crate::roles::RoleAccess;
use crate::txn::{keys, Txn};
use crate::types::{Category, Identity, Role, TokenId, Transport, TransportUpdate};

/// Transport legs of an animal.
///
/// A transport is bound to whoever owned the animal when it was recorded.
/// Staleness is checked lazily on every write: once the animal has moved
/// on, the record can no longer change.
#[derive(Debug, Clone)]
pub(crate) struct TransportRegistry {
    roles: RoleAccess,
    mapper: TokenMapper,
}

impl TransportRegistry {
    pub fn new(roles: RoleAccess, mapper: TokenMapper) -> Self {
        TransportRegistry { roles, mapper }
    }

    pub async fn create<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        caller: &Identity,
        animal_id: TokenId,
    ) -> Result<Transport, LedgerError> {
        self.mapper
            .require_owned(txn, animal_id, Category::Animal, caller)
            .await?;
        self.roles.require(txn, caller, Role::Transporter).await?;

        let id = txn.next_id(keys::TRANSPORT_COUNTER).await?;
        let transport = Transport {
            id,
            animal_id,
            bound_owner: caller.clone(),
            duration: 0,
            temperature: 0,
            humidity: 0,
            is_contaminated: false,
        };
        txn.insert(&keys::record(Category::Transport, id), &transport)
            .await?;
        txn.push(&keys::animal_transports(animal_id), id).await?;
        txn.emit(LedgerEvent::TransportRecorded {
            transport_id: id,
            animal_id,
            actor: caller.clone(),
            message: messages::TRANSPORT_CREATED.to_string(),
        });
        Ok(transport)
    }

    pub async fn set<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        caller: &Identity,
        id: TokenId,
        update: TransportUpdate,
    ) -> Result<Transport, LedgerError> {
        let mut transport: Transport = txn.record(Category::Transport, id).await?;
        let current = self.mapper.owner_of(txn, transport.animal_id).await?;
        if current != transport.bound_owner || caller != &transport.bound_owner {
            return Err(LedgerError::illegal(id, StateViolation::StaleTransport));
        }
        self.roles.require(txn, caller, Role::Transporter).await?;

        transport.duration = update.duration;
        transport.temperature = update.temperature;
        transport.humidity = update.humidity;
        transport.is_contaminated = update.is_contaminated;
        txn.store(&keys::record(Category::Transport, id), &transport)
            .await?;
        txn.emit(LedgerEvent::TransportChanged {
            transport_id: id,
            animal_id: transport.animal_id,
            actor: caller.clone(),
            message: messages::TRANSPORT_CHANGED.to_string(),
        });
        Ok(transport)
    }

    pub async fn get<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        id: TokenId,
    ) -> Result<Transport, LedgerError> {
        txn.record(Category::Transport, id).await
    }

    /// Every transport recorded for `animal_id`, oldest first.
    pub async fn of_animal<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        animal_id: TokenId,
    ) -> Result<Vec<Transport>, LedgerError> {
        self.mapper
            .require_category(txn, animal_id, Category::Animal)
            .await?;
        let ids: Vec<TokenId> = txn.load_list(&keys::animal_transports(animal_id)).await?;
        let mut transports = Vec::with_capacity(ids.len());
        for id in ids {
            transports.push(txn.record(Category::Transport, id).await?);
        }
        Ok(transports)
    }
}
