use tracechain_storage::LedgerStorage;

use crate::config::Registrar;
use crate::error::{LedgerError, StateViolation};
use crate::event::{messages, LedgerEvent};
use crate::mapper::TokenMapper;
use crate::roles::RoleAccess;
use crate::txn::{keys, Txn};
use crate::types::{Animal, AnimalUpdate, Category, Identity, Role, TokenId};

/// Breeding stage: creates animals and ends their life cycle.
#[derive(Debug, Clone)]
pub(crate) struct AnimalRegistry {
    roles: RoleAccess,
    mapper: TokenMapper,
}

impl AnimalRegistry {
    pub fn new(roles: RoleAccess, mapper: TokenMapper) -> Self {
        AnimalRegistry { roles, mapper }
    }

    pub async fn create<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        caller: &Identity,
        species: &str,
        weight: u64,
        sex: &str,
    ) -> Result<Animal, LedgerError> {
        self.roles.require(txn, caller, Role::Breeder).await?;
        let id = self.mapper.next_token_id(txn).await?;
        let animal = Animal {
            id,
            species: species.to_string(),
            birth_weight: weight,
            sex: sex.to_string(),
            place_of_origin: String::new(),
            date_of_birth: 0,
            gender: String::new(),
            weight,
            sickness_list: Vec::new(),
            vaccination_list: Vec::new(),
            food_list: Vec::new(),
            is_contaminated: false,
            is_life_cycle_over: false,
        };
        txn.insert(&keys::record(Category::Animal, id), &animal).await?;
        self.mapper
            .register_new_token(txn, Registrar::Animal, id, Category::Animal, caller)
            .await?;
        txn.emit(LedgerEvent::minted(id, Category::Animal, caller, messages::ANIMAL_CREATED));
        Ok(animal)
    }

    /// Overwrite the breeding data of a living animal.
    pub async fn set<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        caller: &Identity,
        id: TokenId,
        update: AnimalUpdate,
    ) -> Result<Animal, LedgerError> {
        self.mapper
            .require_owned(txn, id, Category::Animal, caller)
            .await?;
        self.roles.require(txn, caller, Role::Breeder).await?;
        let mut animal: Animal = txn.record(Category::Animal, id).await?;
        if animal.is_life_cycle_over {
            return Err(LedgerError::illegal(id, StateViolation::LifeCycleOver));
        }

        let AnimalUpdate {
            place_of_origin,
            date_of_birth,
            gender,
            weight,
            sickness_list,
            vaccination_list,
            food_list,
            is_contaminated,
        } = update;
        animal.place_of_origin = place_of_origin;
        animal.date_of_birth = date_of_birth;
        animal.gender = gender;
        animal.weight = weight;
        animal.sickness_list = sickness_list;
        animal.vaccination_list = vaccination_list;
        animal.food_list = food_list;
        animal.is_contaminated = is_contaminated;

        txn.store(&keys::record(Category::Animal, id), &animal).await?;
        txn.emit(LedgerEvent::changed(id, caller, messages::ANIMAL_CHANGED));
        Ok(animal)
    }

    /// End the animal's life cycle. Happens at most once.
    pub async fn kill<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        caller: &Identity,
        id: TokenId,
    ) -> Result<Animal, LedgerError> {
        self.mapper
            .require_owned(txn, id, Category::Animal, caller)
            .await?;
        let mut animal: Animal = txn.record(Category::Animal, id).await?;
        if animal.is_life_cycle_over {
            return Err(LedgerError::illegal(id, StateViolation::AlreadySlaughtered));
        }
        animal.is_life_cycle_over = true;
        txn.store(&keys::record(Category::Animal, id), &animal).await?;
        txn.emit(LedgerEvent::changed(id, caller, messages::ANIMAL_KILLED));
        Ok(animal)
    }

    pub async fn transfer<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        caller: &Identity,
        id: TokenId,
        to: &Identity,
    ) -> Result<(), LedgerError> {
        self.mapper
            .transfer(txn, caller, id, to, Some(Category::Animal))
            .await
    }

    pub async fn get<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        id: TokenId,
    ) -> Result<Animal, LedgerError> {
        self.mapper
            .require_category(txn, id, Category::Animal)
            .await?;
        txn.record(Category::Animal, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MapperConfig, TransferPolicy};
    use crate::error::ErrorKind;
    use tracechain_storage::MemoryStorage;

    fn id(s: &str) -> Identity {
        Identity::new(s)
    }

    fn registry() -> AnimalRegistry {
        let mapper = TokenMapper::new(
            &MapperConfig::default(),
            &TransferPolicy::default(),
            RoleAccess,
        );
        AnimalRegistry::new(RoleAccess, mapper)
    }

    async fn with_breeder(txn: &mut Txn<'_, MemoryStorage>) {
        RoleAccess.bootstrap(txn, &id("admin")).await.unwrap();
        RoleAccess
            .grant(txn, &id("admin"), &id("b"), Role::Breeder)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn create_requires_breeder() {
        let storage = MemoryStorage::new();
        let mut txn = Txn::begin(&storage).await.unwrap();
        let err = registry()
            .create(&mut txn, &id("b"), "Cow", 10, "male")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Caller is not a breeder");
    }

    #[tokio::test]
    async fn created_animal_is_alive_and_owned() {
        let storage = MemoryStorage::new();
        let mut txn = Txn::begin(&storage).await.unwrap();
        with_breeder(&mut txn).await;
        let reg = registry();
        let animal = reg.create(&mut txn, &id("b"), "Cow", 10, "male").await.unwrap();
        assert_eq!(animal.id, 0);
        assert_eq!(animal.birth_weight, 10);
        assert!(!animal.is_life_cycle_over);
        assert_eq!(reg.get(&mut txn, 0).await.unwrap(), animal);
    }

    #[tokio::test]
    async fn set_checks_owner_before_role() {
        let storage = MemoryStorage::new();
        let mut txn = Txn::begin(&storage).await.unwrap();
        with_breeder(&mut txn).await;
        let reg = registry();
        reg.create(&mut txn, &id("b"), "Cow", 10, "male").await.unwrap();
        let err = reg
            .set(&mut txn, &id("admin"), 0, AnimalUpdate::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotOwner);
    }

    #[tokio::test]
    async fn killed_animal_is_frozen() {
        let storage = MemoryStorage::new();
        let mut txn = Txn::begin(&storage).await.unwrap();
        with_breeder(&mut txn).await;
        let reg = registry();
        reg.create(&mut txn, &id("b"), "Cow", 10, "male").await.unwrap();
        reg.kill(&mut txn, &id("b"), 0).await.unwrap();

        let err = reg.kill(&mut txn, &id("b"), 0).await.unwrap_err();
        assert_eq!(err.to_string(), "Animal already has been slaughtered");

        let err = reg
            .set(&mut txn, &id("b"), 0, AnimalUpdate::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalStateTransition);
        assert!(reg.get(&mut txn, 0).await.unwrap().is_life_cycle_over);
    }
}
