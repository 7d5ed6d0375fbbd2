use tracechain_storage::LedgerStorage;

use crate::config::Registrar;
use crate::error::LedgerError;
use crate::event::{messages, LedgerEvent};
use crate::mapper::TokenMapper;
use crate::roles::RoleAccess;
use crate::txn::{keys, Txn};
use crate::types::{Category, Identity, Ingredient, Recipe, Role, TokenId};

/// Write-once ingredient templates.
#[derive(Debug, Clone)]
pub(crate) struct RecipeRegistry {
    roles: RoleAccess,
    mapper: TokenMapper,
}

impl RecipeRegistry {
    pub fn new(roles: RoleAccess, mapper: TokenMapper) -> Self {
        RecipeRegistry { roles, mapper }
    }

    /// Ingredients are given as three parallel lists of equal length.
    #[allow(clippy::too_many_arguments)]
    pub async fn create<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        caller: &Identity,
        name: &str,
        description: &str,
        species: &[String],
        parts: &[String],
        weights: &[u64],
    ) -> Result<Recipe, LedgerError> {
        self.roles.require(txn, caller, Role::Manufacturer).await?;
        if species.len() != parts.len() || parts.len() != weights.len() {
            return Err(LedgerError::ArityMismatch {
                species: species.len(),
                parts: parts.len(),
                weights: weights.len(),
            });
        }
        let ingredients = species
            .iter()
            .zip(parts)
            .zip(weights)
            .map(|((animal_type, part), weight)| Ingredient {
                animal_type: animal_type.clone(),
                part: part.clone(),
                weight: *weight,
            })
            .collect();

        let id = self.mapper.next_token_id(txn).await?;
        let recipe = Recipe {
            id,
            name: name.to_string(),
            description: description.to_string(),
            ingredients,
        };
        txn.insert(&keys::record(Category::Recipe, id), &recipe)
            .await?;
        self.mapper
            .register_new_token(txn, Registrar::Recipe, id, Category::Recipe, caller)
            .await?;
        txn.emit(LedgerEvent::minted(id, Category::Recipe, caller, messages::RECIPE_CREATED));
        Ok(recipe)
    }

    pub async fn get<S: LedgerStorage>(
        &self,
        txn: &mut Txn<'_, S>,
        id: TokenId,
    ) -> Result<Recipe, LedgerError> {
        self.mapper
            .require_category(txn, id, Category::Recipe)
            .await?;
        txn.record(Category::Recipe, id).await
    }
}
