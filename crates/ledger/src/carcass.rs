use tracechain_storage::LedgerStorage;

use crate::config::Registrar;
use crate::error::{LedgerError, StateViolation};
use crate::event::{messages, LedgerEvent};
use crate::mapper::TokenMapper;
use crate::roles::RoleAccess;
use crate::txn::{keys, Txn};
use crate::types::{Animal, Carcass, CarcassUpdate, Category, Identity, Role, TokenId};

/// Slaughter stage: one carcass per killed animal.
#[derive(Debug, Clone)]
pub(crate) struct CarcassRegistry {
    roles: RoleAccess,
    mapper: TokenMapper,
}

impl CarcassRegistry {
    pub fn new(roles: RoleAccess, mapper: TokenMapper) -> Self {
        CarcassRegistry { roles, mapper }
    }

    pub async fn create<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        caller: &Identity,
        animal_id: TokenId,
    ) -> Result<Carcass, LedgerError> {
        self.roles.require(txn, caller, Role::Slaughterer).await?;
        self.mapper
            .require_owned(txn, animal_id, Category::Animal, caller)
            .await?;
        let animal: Animal = txn.record(Category::Animal, animal_id).await?;
        if !animal.is_life_cycle_over {
            return Err(LedgerError::illegal(animal_id, StateViolation::AnimalAlive));
        }
        let link = keys::carcass_of_animal(animal_id);
        if txn.load::<TokenId>(&link).await?.is_some() {
            return Err(LedgerError::illegal(animal_id, StateViolation::CarcassExists));
        }

        let id = self.mapper.next_token_id(txn).await?;
        let carcass = Carcass {
            id,
            animal_id,
            agreement_number: String::new(),
            country_of_slaughter: String::new(),
            date_of_slaughter: 0,
            carcass_weight: 0,
            is_contaminated: false,
        };
        txn.insert(&keys::record(Category::Carcass, id), &carcass)
            .await?;
        txn.insert(&link, &id).await?;
        self.mapper
            .register_new_token(txn, Registrar::Carcass, id, Category::Carcass, caller)
            .await?;
        txn.emit(LedgerEvent::minted(id, Category::Carcass, caller, messages::CARCASS_CREATED));
        Ok(carcass)
    }

    pub async fn set<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        caller: &Identity,
        id: TokenId,
        update: CarcassUpdate,
    ) -> Result<Carcass, LedgerError> {
        self.mapper
            .require_owned(txn, id, Category::Carcass, caller)
            .await?;
        self.roles.require(txn, caller, Role::Slaughterer).await?;
        let mut carcass: Carcass = txn.record(Category::Carcass, id).await?;
        carcass.agreement_number = update.agreement_number;
        carcass.country_of_slaughter = update.country_of_slaughter;
        carcass.date_of_slaughter = update.date_of_slaughter;
        carcass.carcass_weight = update.carcass_weight;
        carcass.is_contaminated = update.is_contaminated;
        txn.store(&keys::record(Category::Carcass, id), &carcass)
            .await?;
        txn.emit(LedgerEvent::changed(id, caller, messages::CARCASS_CHANGED));
        Ok(carcass)
    }

    pub async fn transfer<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        caller: &Identity,
        id: TokenId,
        to: &Identity,
    ) -> Result<(), LedgerError> {
        self.mapper
            .transfer(txn, caller, id, to, Some(Category::Carcass))
            .await
    }

    pub async fn get<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        id: TokenId,
    ) -> Result<Carcass, LedgerError> {
        self.mapper
            .require_category(txn, id, Category::Carcass)
            .await?;
        txn.record(Category::Carcass, id).await
    }

    pub async fn of_animal<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        animal_id: TokenId,
    ) -> Result<Option<Carcass>, LedgerError> {
        self.mapper
            .require_category(txn, animal_id, Category::Animal)
            .await?;
        match txn.load::<TokenId>(&keys::carcass_of_animal(animal_id)).await? {
            Some(id) => Ok(Some(txn.record(Category::Carcass, id).await?)),
            None => Ok(None),
        }
    }
}
