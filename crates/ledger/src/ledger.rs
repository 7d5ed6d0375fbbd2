//! The `Ledger` composition root.
//!
//! Every public operation runs in its own storage snapshot: the registry
//! call either succeeds and the snapshot (with its events) is committed, or
//! it fails and the snapshot is aborted. Read-only operations always abort.

use std::collections::BTreeSet;

use tracechain_storage::LedgerStorage;

use crate::animal::AnimalRegistry;
use crate::carcass::CarcassRegistry;
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::event::AuditEntry;
use crate::mapper::TokenMapper;
use crate::meat::MeatRegistry;
use crate::product::ProductRegistry;
use crate::recipe::RecipeRegistry;
use crate::roles::RoleAccess;
use crate::transport::TransportRegistry;
use crate::txn::Txn;
use crate::types::{
    Animal, AnimalUpdate, Carcass, CarcassUpdate, Category, Identity, ManufacturedProduct, Meat,
    MeatUpdate, ProductTrace, ProductUpdate, Recipe, Role, TokenId, Transport, TransportUpdate,
};

pub struct Ledger<S: LedgerStorage> {
    storage: S,
    roles: RoleAccess,
    mapper: TokenMapper,
    animals: AnimalRegistry,
    transports: TransportRegistry,
    carcasses: CarcassRegistry,
    meats: MeatRegistry,
    recipes: RecipeRegistry,
    products: ProductRegistry,
}

impl<S: LedgerStorage> Ledger<S> {
    /// Wire the registries over `storage` without touching it.
    pub fn new(storage: S, config: &LedgerConfig) -> Self {
        let roles = RoleAccess;
        let mapper = TokenMapper::new(&config.mapper, &config.transfer_policy, roles);
        let animals = AnimalRegistry::new(roles, mapper.clone());
        let transports = TransportRegistry::new(roles, mapper.clone());
        let carcasses = CarcassRegistry::new(roles, mapper.clone());
        let meats = MeatRegistry::new(roles, mapper.clone());
        let recipes = RecipeRegistry::new(roles, mapper.clone());
        let products = ProductRegistry::new(
            roles,
            mapper.clone(),
            meats.clone(),
            recipes.clone(),
            transports.clone(),
        );
        Ledger {
            storage,
            roles,
            mapper,
            animals,
            transports,
            carcasses,
            meats,
            recipes,
            products,
        }
    }

    /// Wire the registries and grant ADMIN to `config.admin` if the storage
    /// holds no ledger yet. Re-opening an initialized store keeps its admin.
    pub async fn initialize(storage: S, config: &LedgerConfig) -> Result<Self, LedgerError> {
        let ledger = Self::new(storage, config);
        let mut txn = Txn::begin(&ledger.storage).await?;
        let result = ledger.roles.bootstrap(&mut txn, &config.admin).await;
        let created = ledger.settle("initialize", txn, result).await?;
        if created {
            tracing::info!(admin = %config.admin, "ledger initialized");
        } else {
            tracing::debug!("ledger already initialized");
        }
        Ok(ledger)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    async fn settle<T>(
        &self,
        op: &'static str,
        txn: Txn<'_, S>,
        result: Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        match result {
            Ok(value) => match txn.commit().await {
                Ok(receipt) => {
                    tracing::debug!(
                        op,
                        commit = receipt.commit,
                        keys = receipt.keys_written,
                        events = receipt.event_sequences.len(),
                        "operation committed"
                    );
                    Ok(value)
                }
                Err(e) => {
                    tracing::warn!(op, error = %e, kind = %e.kind(), "commit failed");
                    Err(e)
                }
            },
            Err(e) => {
                txn.abort().await;
                tracing::debug!(op, error = %e, kind = %e.kind(), "operation rejected");
                Err(e)
            }
        }
    }

    async fn settle_read<T>(
        &self,
        txn: Txn<'_, S>,
        result: Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        txn.abort().await;
        result
    }

    // ── Roles ────────────────────────────────────────────────────────────────

    pub async fn grant_role(
        &self,
        sender: &Identity,
        account: &Identity,
        role: Role,
    ) -> Result<bool, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.roles.grant(&mut txn, sender, account, role).await;
        self.settle("grant_role", txn, result).await
    }

    pub async fn revoke_role(
        &self,
        sender: &Identity,
        account: &Identity,
        role: Role,
    ) -> Result<bool, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.roles.revoke(&mut txn, sender, account, role).await;
        self.settle("revoke_role", txn, result).await
    }

    pub async fn renounce_role(&self, caller: &Identity, role: Role) -> Result<bool, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.roles.renounce(&mut txn, caller, role).await;
        self.settle("renounce_role", txn, result).await
    }

    pub async fn has_role(&self, identity: &Identity, role: Role) -> Result<bool, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.roles.has_role(&mut txn, identity, role).await;
        self.settle_read(txn, result).await
    }

    pub async fn roles_of(&self, identity: &Identity) -> Result<BTreeSet<Role>, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.roles.roles_of(&mut txn, identity).await;
        self.settle_read(txn, result).await
    }

    pub async fn role_members(&self, role: Role) -> Result<Vec<Identity>, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.roles.members(&mut txn, role).await;
        self.settle_read(txn, result).await
    }

    // ── Mapper ───────────────────────────────────────────────────────────────
    //
    // Tokens enter the mapper only through the registries' create paths.

    /// Transfer any token under the receiver rule of its own category.
    pub async fn transfer_token(
        &self,
        caller: &Identity,
        token_id: TokenId,
        to: &Identity,
    ) -> Result<(), LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.mapper.transfer(&mut txn, caller, token_id, to, None).await;
        self.settle("transfer_token", txn, result).await
    }

    pub async fn owner_of(&self, token_id: TokenId) -> Result<Identity, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.mapper.owner_of(&mut txn, token_id).await;
        self.settle_read(txn, result).await
    }

    pub async fn category_of(&self, token_id: TokenId) -> Result<Category, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.mapper.category_of(&mut txn, token_id).await;
        self.settle_read(txn, result).await
    }

    pub async fn tokens_of_owner(&self, owner: &Identity) -> Result<Vec<TokenId>, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.mapper.tokens_of_owner(&mut txn, owner).await;
        self.settle_read(txn, result).await
    }

    pub async fn tokens_by_category(&self, category: Category) -> Result<Vec<TokenId>, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.mapper.tokens_by_category(&mut txn, category).await;
        self.settle_read(txn, result).await
    }

    pub async fn token_index(&self) -> Result<TokenId, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.mapper.token_index(&mut txn).await;
        self.settle_read(txn, result).await
    }

    // ── Animals ──────────────────────────────────────────────────────────────

    pub async fn create_animal(
        &self,
        caller: &Identity,
        species: &str,
        weight: u64,
        sex: &str,
    ) -> Result<Animal, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.animals.create(&mut txn, caller, species, weight, sex).await;
        self.settle("create_animal", txn, result).await
    }

    pub async fn set_animal_data(
        &self,
        caller: &Identity,
        id: TokenId,
        update: AnimalUpdate,
    ) -> Result<Animal, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.animals.set(&mut txn, caller, id, update).await;
        self.settle("set_animal_data", txn, result).await
    }

    pub async fn kill_animal(&self, caller: &Identity, id: TokenId) -> Result<Animal, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.animals.kill(&mut txn, caller, id).await;
        self.settle("kill_animal", txn, result).await
    }

    pub async fn transfer_animal(
        &self,
        caller: &Identity,
        id: TokenId,
        to: &Identity,
    ) -> Result<(), LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.animals.transfer(&mut txn, caller, id, to).await;
        self.settle("transfer_animal", txn, result).await
    }

    pub async fn animal(&self, id: TokenId) -> Result<Animal, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.animals.get(&mut txn, id).await;
        self.settle_read(txn, result).await
    }

    // ── Transports ───────────────────────────────────────────────────────────

    pub async fn create_transport(
        &self,
        caller: &Identity,
        animal_id: TokenId,
    ) -> Result<Transport, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.transports.create(&mut txn, caller, animal_id).await;
        self.settle("create_transport", txn, result).await
    }

    pub async fn set_transport_data(
        &self,
        caller: &Identity,
        id: TokenId,
        update: TransportUpdate,
    ) -> Result<Transport, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.transports.set(&mut txn, caller, id, update).await;
        self.settle("set_transport_data", txn, result).await
    }

    pub async fn transport(&self, id: TokenId) -> Result<Transport, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.transports.get(&mut txn, id).await;
        self.settle_read(txn, result).await
    }

    pub async fn transports_of_animal(
        &self,
        animal_id: TokenId,
    ) -> Result<Vec<Transport>, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.transports.of_animal(&mut txn, animal_id).await;
        self.settle_read(txn, result).await
    }

    // ── Carcasses ────────────────────────────────────────────────────────────

    pub async fn create_carcass(
        &self,
        caller: &Identity,
        animal_id: TokenId,
    ) -> Result<Carcass, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.carcasses.create(&mut txn, caller, animal_id).await;
        self.settle("create_carcass", txn, result).await
    }

    pub async fn set_carcass_data(
        &self,
        caller: &Identity,
        id: TokenId,
        update: CarcassUpdate,
    ) -> Result<Carcass, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.carcasses.set(&mut txn, caller, id, update).await;
        self.settle("set_carcass_data", txn, result).await
    }

    pub async fn transfer_carcass(
        &self,
        caller: &Identity,
        id: TokenId,
        to: &Identity,
    ) -> Result<(), LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.carcasses.transfer(&mut txn, caller, id, to).await;
        self.settle("transfer_carcass", txn, result).await
    }

    pub async fn carcass(&self, id: TokenId) -> Result<Carcass, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.carcasses.get(&mut txn, id).await;
        self.settle_read(txn, result).await
    }

    pub async fn carcass_of_animal(&self, animal_id: TokenId) -> Result<Option<Carcass>, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.carcasses.of_animal(&mut txn, animal_id).await;
        self.settle_read(txn, result).await
    }

    // ── Meat ─────────────────────────────────────────────────────────────────

    pub async fn create_meat(
        &self,
        caller: &Identity,
        carcass_id: TokenId,
        part: &str,
        weight: u64,
    ) -> Result<Meat, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.meats.create(&mut txn, caller, carcass_id, part, weight).await;
        self.settle("create_meat", txn, result).await
    }

    pub async fn set_meat_data(
        &self,
        caller: &Identity,
        id: TokenId,
        update: MeatUpdate,
    ) -> Result<Meat, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.meats.set(&mut txn, caller, id, update).await;
        self.settle("set_meat_data", txn, result).await
    }

    pub async fn meat(&self, id: TokenId) -> Result<Meat, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.meats.get(&mut txn, id).await;
        self.settle_read(txn, result).await
    }

    pub async fn meats_of_carcass(&self, carcass_id: TokenId) -> Result<Vec<Meat>, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.meats.of_carcass(&mut txn, carcass_id).await;
        self.settle_read(txn, result).await
    }

    // ── Recipes ──────────────────────────────────────────────────────────────

    pub async fn create_recipe(
        &self,
        caller: &Identity,
        name: &str,
        description: &str,
        species: &[String],
        parts: &[String],
        weights: &[u64],
    ) -> Result<Recipe, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self
            .recipes
            .create(&mut txn, caller, name, description, species, parts, weights)
            .await;
        self.settle("create_recipe", txn, result).await
    }

    pub async fn recipe(&self, id: TokenId) -> Result<Recipe, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.recipes.get(&mut txn, id).await;
        self.settle_read(txn, result).await
    }

    // ── Manufactured products ────────────────────────────────────────────────

    pub async fn check_meat_for_recipe(
        &self,
        recipe_id: TokenId,
        meat_id: TokenId,
    ) -> Result<bool, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.products.meat_fits_recipe(&mut txn, recipe_id, meat_id).await;
        self.settle_read(txn, result).await
    }

    /// `recipe_id = None` skips recipe validation.
    pub async fn create_manufactured_product(
        &self,
        caller: &Identity,
        recipe_id: Option<TokenId>,
        meat_ids: &[TokenId],
        product_name: &str,
        price: u64,
        description: &str,
    ) -> Result<ManufacturedProduct, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self
            .products
            .create(&mut txn, caller, recipe_id, meat_ids, product_name, price, description)
            .await;
        self.settle("create_manufactured_product", txn, result).await
    }

    pub async fn update_manufactured_product(
        &self,
        caller: &Identity,
        id: TokenId,
        update: ProductUpdate,
    ) -> Result<ManufacturedProduct, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.products.update(&mut txn, caller, id, update).await;
        self.settle("update_manufactured_product", txn, result).await
    }

    pub async fn manufactured_product(&self, id: TokenId) -> Result<ManufacturedProduct, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.products.get(&mut txn, id).await;
        self.settle_read(txn, result).await
    }

    pub async fn trace_product(&self, id: TokenId) -> Result<ProductTrace, LedgerError> {
        let mut txn = Txn::begin(&self.storage).await?;
        let result = self.products.trace(&mut txn, id).await;
        self.settle_read(txn, result).await
    }

    // ── Audit log ────────────────────────────────────────────────────────────

    /// Committed events after sequence `after`, at most `limit` (0 = all).
    pub async fn audit_log(
        &self,
        after: Option<u64>,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, LedgerError> {
        self.storage
            .list_events(after, limit)
            .await?
            .into_iter()
            .map(AuditEntry::try_from)
            .collect()
    }
}
