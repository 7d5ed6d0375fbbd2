//! Assembly stage: manufactured products made from owned meat, optionally
//! validated against a recipe.

use std::collections::{BTreeMap, BTreeSet};

use tracechain_storage::LedgerStorage;

use crate::config::Registrar;
use crate::error::{LedgerError, StateViolation};
use crate::event::{messages, LedgerEvent};
use crate::mapper::TokenMapper;
use crate::meat::MeatRegistry;
use crate::recipe::RecipeRegistry;
use crate::roles::RoleAccess;
use crate::transport::TransportRegistry;
use crate::txn::{keys, Txn};
use crate::types::{
    Category, Identity, ManufacturedProduct, Meat, MeatTrace, ProductTrace, ProductUpdate, Recipe,
    Role, TokenId,
};

#[derive(Debug, Clone)]
pub(crate) struct ProductRegistry {
    roles: RoleAccess,
    mapper: TokenMapper,
    meats: MeatRegistry,
    recipes: RecipeRegistry,
    transports: TransportRegistry,
}

impl ProductRegistry {
    pub fn new(
        roles: RoleAccess,
        mapper: TokenMapper,
        meats: MeatRegistry,
        recipes: RecipeRegistry,
        transports: TransportRegistry,
    ) -> Self {
        ProductRegistry {
            roles,
            mapper,
            meats,
            recipes,
            transports,
        }
    }

    /// Whether the meat's (species, part) appears anywhere in the recipe.
    pub async fn meat_fits_recipe<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        recipe_id: TokenId,
        meat_id: TokenId,
    ) -> Result<bool, LedgerError> {
        let recipe = self.recipes.get(txn, recipe_id).await?;
        let meat = self.meats.get(txn, meat_id).await?;
        let species = self.meats.species_of(txn, &meat).await?;
        Ok(recipe
            .ingredients
            .iter()
            .any(|i| i.animal_type == species && i.part == meat.part))
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        caller: &Identity,
        recipe_id: Option<TokenId>,
        meat_ids: &[TokenId],
        product_name: &str,
        price: u64,
        description: &str,
    ) -> Result<ManufacturedProduct, LedgerError> {
        self.roles.require(txn, caller, Role::Manufacturer).await?;
        if meat_ids.is_empty() {
            // No product id exists yet: name the recipe, or 0 without one.
            let subject = recipe_id.unwrap_or_default();
            return Err(LedgerError::illegal(subject, StateViolation::NoMeat));
        }
        let id = self.mapper.next_token_id(txn).await?;

        let mut seen = BTreeSet::new();
        let mut meats = Vec::with_capacity(meat_ids.len());
        for &meat_id in meat_ids {
            if !seen.insert(meat_id) {
                return Err(LedgerError::illegal(meat_id, StateViolation::DuplicateMeat));
            }
            self.mapper
                .require_owned(txn, meat_id, Category::Meat, caller)
                .await?;
            meats.push(self.meats.get(txn, meat_id).await?);
        }

        if let Some(recipe_id) = recipe_id {
            let recipe = self.recipes.get(txn, recipe_id).await?;
            if !self.matches_recipe(txn, &recipe, &meats).await? {
                return Err(LedgerError::RecipeMismatch { recipe_id });
            }
        }

        let product = ManufacturedProduct {
            id,
            recipe_id,
            meat_ids: meat_ids.to_vec(),
            product_name: product_name.to_string(),
            date_of_manufacturation: 0,
            price,
            description: description.to_string(),
        };
        txn.insert(&keys::record(Category::ManufacturedProduct, id), &product)
            .await?;
        self.mapper
            .register_new_token(
                txn,
                Registrar::ManufacturedProduct,
                id,
                Category::ManufacturedProduct,
                caller,
            )
            .await?;
        txn.emit(LedgerEvent::minted(
            id,
            Category::ManufacturedProduct,
            caller,
            messages::PRODUCT_CREATED,
        ));
        Ok(product)
    }

    /// Exact multiset equality of (species, part) between the recipe's
    /// ingredients and the supplied meats.
    async fn matches_recipe<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        recipe: &Recipe,
        meats: &[Meat],
    ) -> Result<bool, LedgerError> {
        if recipe.ingredients.len() != meats.len() {
            return Ok(false);
        }
        let mut balance: BTreeMap<(String, String), i64> = BTreeMap::new();
        for ingredient in &recipe.ingredients {
            *balance
                .entry((ingredient.animal_type.clone(), ingredient.part.clone()))
                .or_default() += 1;
        }
        for meat in meats {
            let species = self.meats.species_of(txn, meat).await?;
            *balance.entry((species, meat.part.clone())).or_default() -= 1;
        }
        Ok(balance.values().all(|n| *n == 0))
    }

    pub async fn update<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        caller: &Identity,
        id: TokenId,
        update: ProductUpdate,
    ) -> Result<ManufacturedProduct, LedgerError> {
        self.mapper
            .require_owned(txn, id, Category::ManufacturedProduct, caller)
            .await?;
        self.roles.require(txn, caller, Role::Manufacturer).await?;
        let mut product: ManufacturedProduct =
            txn.record(Category::ManufacturedProduct, id).await?;
        product.date_of_manufacturation = update.date_of_manufacturation;
        product.product_name = update.product_name;
        product.price = update.price;
        product.description = update.description;
        txn.store(&keys::record(Category::ManufacturedProduct, id), &product)
            .await?;
        txn.emit(LedgerEvent::changed(id, caller, messages::PRODUCT_CHANGED));
        Ok(product)
    }

    pub async fn get<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        id: TokenId,
    ) -> Result<ManufacturedProduct, LedgerError> {
        self.mapper
            .require_category(txn, id, Category::ManufacturedProduct)
            .await?;
        txn.record(Category::ManufacturedProduct, id).await
    }

    /// Follow a product back through its meats to the living animals.
    pub async fn trace<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        id: TokenId,
    ) -> Result<ProductTrace, LedgerError> {
        let product = self.get(txn, id).await?;
        let recipe = match product.recipe_id {
            Some(recipe_id) => Some(self.recipes.get(txn, recipe_id).await?),
            None => None,
        };
        let mut meats = Vec::with_capacity(product.meat_ids.len());
        for &meat_id in &product.meat_ids {
            let meat = self.meats.get(txn, meat_id).await?;
            let (carcass, animal) = self.meats.origin(txn, &meat).await?;
            let transports = self.transports.of_animal(txn, animal.id).await?;
            meats.push(MeatTrace {
                meat,
                carcass,
                animal,
                transports,
            });
        }
        Ok(ProductTrace {
            product,
            recipe,
            meats,
        })
    }
}
