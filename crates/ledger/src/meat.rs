use tracechain_storage::LedgerStorage;

use crate::config::Registrar;
use crate::error::LedgerError;
use crate::event::{messages, LedgerEvent};
use crate::mapper::TokenMapper;
use crate::roles::RoleAccess;
use crate::txn::{keys, Txn};
use crate::types::{Animal, Carcass, Category, Identity, Meat, MeatUpdate, Role, TokenId};

/// Cutting stage: any number of meats per carcass.
#[derive(Debug, Clone)]
pub(crate) struct MeatRegistry {
    roles: RoleAccess,
    mapper: TokenMapper,
}

impl MeatRegistry {
    pub fn new(roles: RoleAccess, mapper: TokenMapper) -> Self {
        MeatRegistry { roles, mapper }
    }

    pub async fn create<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        caller: &Identity,
        carcass_id: TokenId,
        part: &str,
        weight: u64,
    ) -> Result<Meat, LedgerError> {
        self.mapper
            .require_owned(txn, carcass_id, Category::Carcass, caller)
            .await?;
        self.roles.require(txn, caller, Role::Manufacturer).await?;

        let id = self.mapper.next_token_id(txn).await?;
        let meat = Meat {
            id,
            carcass_id,
            part: part.to_string(),
            weight,
            agreement_number: String::new(),
            country_of_cutting: String::new(),
            date_of_cutting: 0,
            is_contaminated: false,
        };
        txn.insert(&keys::record(Category::Meat, id), &meat).await?;
        txn.push(&keys::carcass_meats(carcass_id), id).await?;
        self.mapper
            .register_new_token(txn, Registrar::Meat, id, Category::Meat, caller)
            .await?;
        txn.emit(LedgerEvent::minted(id, Category::Meat, caller, messages::MEAT_CREATED));
        Ok(meat)
    }

    pub async fn set<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        caller: &Identity,
        id: TokenId,
        update: MeatUpdate,
    ) -> Result<Meat, LedgerError> {
        self.mapper
            .require_owned(txn, id, Category::Meat, caller)
            .await?;
        self.roles.require(txn, caller, Role::Manufacturer).await?;
        let mut meat: Meat = txn.record(Category::Meat, id).await?;
        meat.agreement_number = update.agreement_number;
        meat.country_of_cutting = update.country_of_cutting;
        meat.date_of_cutting = update.date_of_cutting;
        meat.part = update.part;
        meat.is_contaminated = update.is_contaminated;
        meat.weight = update.weight;
        txn.store(&keys::record(Category::Meat, id), &meat).await?;
        txn.emit(LedgerEvent::changed(id, caller, messages::MEAT_CHANGED));
        Ok(meat)
    }

    pub async fn get<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        id: TokenId,
    ) -> Result<Meat, LedgerError> {
        self.mapper.require_category(txn, id, Category::Meat).await?;
        txn.record(Category::Meat, id).await
    }

    pub async fn of_carcass<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        carcass_id: TokenId,
    ) -> Result<Vec<Meat>, LedgerError> {
        self.mapper
            .require_category(txn, carcass_id, Category::Carcass)
            .await?;
        let ids: Vec<TokenId> = txn.load_list(&keys::carcass_meats(carcass_id)).await?;
        let mut meats = Vec::with_capacity(ids.len());
        for id in ids {
            meats.push(txn.record(Category::Meat, id).await?);
        }
        Ok(meats)
    }

    /// Carcass and animal a meat was cut from, each resolved with a
    /// category check.
    pub async fn origin<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        meat: &Meat,
    ) -> Result<(Carcass, Animal), LedgerError> {
        self.mapper
            .require_category(txn, meat.carcass_id, Category::Carcass)
            .await?;
        let carcass: Carcass = txn.record(Category::Carcass, meat.carcass_id).await?;
        self.mapper
            .require_category(txn, carcass.animal_id, Category::Animal)
            .await?;
        let animal: Animal = txn.record(Category::Animal, carcass.animal_id).await?;
        Ok((carcass, animal))
    }

    pub async fn species_of<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        meat: &Meat,
    ) -> Result<String, LedgerError> {
        let (_, animal) = self.origin(txn, meat).await?;
        Ok(animal.species)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animal::AnimalRegistry;
    use crate::carcass::CarcassRegistry;
    use crate::config::{MapperConfig, TransferPolicy};
    use crate::error::ErrorKind;
    use tracechain_storage::MemoryStorage;

    fn id(s: &str) -> Identity {
        Identity::new(s)
    }

    /// Builds a carcass (id 1, from a "Pig") owned by manufacturer `m`.
    async fn carcass_at_manufacturer(txn: &mut Txn<'_, MemoryStorage>) -> MeatRegistry {
        let mapper = TokenMapper::new(
            &MapperConfig::default(),
            &TransferPolicy::default(),
            RoleAccess,
        );
        let animals = AnimalRegistry::new(RoleAccess, mapper.clone());
        let carcasses = CarcassRegistry::new(RoleAccess, mapper.clone());
        let admin = id("admin");
        RoleAccess.bootstrap(txn, &admin).await.unwrap();
        for (who, role) in [
            ("b", Role::Breeder),
            ("s", Role::Slaughterer),
            ("m", Role::Manufacturer),
        ] {
            RoleAccess.grant(txn, &admin, &id(who), role).await.unwrap();
        }
        animals.create(txn, &id("b"), "Pig", 8, "female").await.unwrap();
        animals.transfer(txn, &id("b"), 0, &id("s")).await.unwrap();
        animals.kill(txn, &id("s"), 0).await.unwrap();
        carcasses.create(txn, &id("s"), 0).await.unwrap();
        carcasses.transfer(txn, &id("s"), 1, &id("m")).await.unwrap();
        MeatRegistry::new(RoleAccess, mapper)
    }

    #[tokio::test]
    async fn cuts_reference_their_carcass() {
        let storage = MemoryStorage::new();
        let mut txn = Txn::begin(&storage).await.unwrap();
        let meats = carcass_at_manufacturer(&mut txn).await;
        let a = meats.create(&mut txn, &id("m"), 1, "Loin", 3).await.unwrap();
        let b = meats.create(&mut txn, &id("m"), 1, "Belly", 2).await.unwrap();
        assert_eq!((a.id, b.id), (2, 3));
        assert_eq!(meats.of_carcass(&mut txn, 1).await.unwrap(), vec![a.clone(), b]);
        assert_eq!(meats.species_of(&mut txn, &a).await.unwrap(), "Pig");
    }

    #[tokio::test]
    async fn carcass_reference_must_be_a_carcass() {
        let storage = MemoryStorage::new();
        let mut txn = Txn::begin(&storage).await.unwrap();
        let meats = carcass_at_manufacturer(&mut txn).await;
        let err = meats
            .create(&mut txn, &id("m"), 0, "Loin", 3)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongCategory);
    }

    #[tokio::test]
    async fn set_overwrites_every_field() {
        let storage = MemoryStorage::new();
        let mut txn = Txn::begin(&storage).await.unwrap();
        let meats = carcass_at_manufacturer(&mut txn).await;
        meats.create(&mut txn, &id("m"), 1, "Loin", 3).await.unwrap();
        let update = MeatUpdate {
            agreement_number: "AG-7".to_string(),
            country_of_cutting: "NL".to_string(),
            date_of_cutting: 1_700_000_000,
            part: "Tenderloin".to_string(),
            is_contaminated: true,
            weight: 4,
        };
        let meat = meats.set(&mut txn, &id("m"), 2, update).await.unwrap();
        assert_eq!(meat.part, "Tenderloin");
        assert_eq!(meat.carcass_id, 1);
        assert!(meat.is_contaminated);
        assert_eq!(meats.get(&mut txn, 2).await.unwrap(), meat);
    }
}
