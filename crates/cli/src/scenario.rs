//! Scenario files: an ordered list of ledger calls, each made by a named
//! actor, optionally expected to fail with a given error kind.
//!
//! ```toml
//! admin = "0xadmin"
//!
//! [[step]]
//! actor = "0xadmin"
//! action = "grant_role"
//! account = "0xbreeder"
//! role = "BREEDER"
//!
//! [[step]]
//! actor = "0xbreeder"
//! action = "kill_animal"
//! id = 0
//! expect_error = "IllegalStateTransition"
//! ```
//!
//! The same structure is accepted as JSON (`{"admin": .., "step": [..]}`).

use std::path::Path;

use serde::Deserialize;
use tracechain_ledger::{
    AnimalUpdate, CarcassUpdate, Category, ErrorKind, Identity, MeatUpdate, ProductUpdate, Role,
    TokenId, TransportUpdate,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Overrides the configured admin for this run.
    #[serde(default)]
    pub admin: Option<Identity>,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub actor: Identity,
    /// Free-form label shown instead of the generated description.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub expect_error: Option<ErrorKind>,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    GrantRole {
        account: Identity,
        role: Role,
    },
    RevokeRole {
        account: Identity,
        role: Role,
    },
    RenounceRole {
        role: Role,
    },
    HasRole {
        account: Identity,
        role: Role,
    },
    CreateAnimal {
        species: String,
        weight: u64,
        sex: String,
    },
    SetAnimalData {
        id: TokenId,
        data: AnimalUpdate,
    },
    KillAnimal {
        id: TokenId,
    },
    TransferAnimal {
        id: TokenId,
        to: Identity,
    },
    GetAnimal {
        id: TokenId,
    },
    CreateTransport {
        animal_id: TokenId,
    },
    SetTransportData {
        id: TokenId,
        data: TransportUpdate,
    },
    GetTransport {
        id: TokenId,
    },
    CreateCarcass {
        animal_id: TokenId,
    },
    SetCarcassData {
        id: TokenId,
        data: CarcassUpdate,
    },
    TransferCarcass {
        id: TokenId,
        to: Identity,
    },
    GetCarcass {
        id: TokenId,
    },
    CreateMeat {
        carcass_id: TokenId,
        part: String,
        weight: u64,
    },
    SetMeatData {
        id: TokenId,
        data: MeatUpdate,
    },
    GetMeat {
        id: TokenId,
    },
    CreateRecipe {
        name: String,
        #[serde(default)]
        description: String,
        species: Vec<String>,
        parts: Vec<String>,
        weights: Vec<u64>,
    },
    GetRecipe {
        id: TokenId,
    },
    CheckMeatForRecipe {
        recipe_id: TokenId,
        meat_id: TokenId,
    },
    CreateManufacturedProduct {
        #[serde(default)]
        recipe_id: Option<TokenId>,
        meat_ids: Vec<TokenId>,
        product_name: String,
        price: u64,
        #[serde(default)]
        description: String,
    },
    UpdateManufacturedProduct {
        id: TokenId,
        data: ProductUpdate,
    },
    GetManufacturedProduct {
        id: TokenId,
    },
    TraceProduct {
        id: TokenId,
    },
    TransferToken {
        id: TokenId,
        to: Identity,
    },
    OwnerOf {
        id: TokenId,
    },
    TokensOfOwner {
        owner: Identity,
    },
    TokensByCategory {
        category: Category,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::GrantRole { .. } => "grant_role",
            Action::RevokeRole { .. } => "revoke_role",
            Action::RenounceRole { .. } => "renounce_role",
            Action::HasRole { .. } => "has_role",
            Action::CreateAnimal { .. } => "create_animal",
            Action::SetAnimalData { .. } => "set_animal_data",
            Action::KillAnimal { .. } => "kill_animal",
            Action::TransferAnimal { .. } => "transfer_animal",
            Action::GetAnimal { .. } => "get_animal",
            Action::CreateTransport { .. } => "create_transport",
            Action::SetTransportData { .. } => "set_transport_data",
            Action::GetTransport { .. } => "get_transport",
            Action::CreateCarcass { .. } => "create_carcass",
            Action::SetCarcassData { .. } => "set_carcass_data",
            Action::TransferCarcass { .. } => "transfer_carcass",
            Action::GetCarcass { .. } => "get_carcass",
            Action::CreateMeat { .. } => "create_meat",
            Action::SetMeatData { .. } => "set_meat_data",
            Action::GetMeat { .. } => "get_meat",
            Action::CreateRecipe { .. } => "create_recipe",
            Action::GetRecipe { .. } => "get_recipe",
            Action::CheckMeatForRecipe { .. } => "check_meat_for_recipe",
            Action::CreateManufacturedProduct { .. } => "create_manufactured_product",
            Action::UpdateManufacturedProduct { .. } => "update_manufactured_product",
            Action::GetManufacturedProduct { .. } => "get_manufactured_product",
            Action::TraceProduct { .. } => "trace_product",
            Action::TransferToken { .. } => "transfer_token",
            Action::OwnerOf { .. } => "owner_of",
            Action::TokensOfOwner { .. } => "tokens_of_owner",
            Action::TokensByCategory { .. } => "tokens_by_category",
        }
    }
}

impl Step {
    pub fn describe(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        match self.expect_error {
            Some(kind) => format!("{} {} fails with {}", self.actor, self.action.name(), kind),
            None => format!("{} {}", self.actor, self.action.name()),
        }
    }
}

/// Load a scenario, choosing the parser by file extension (`.json`, else TOML).
pub fn load(path: &Path) -> Result<Scenario, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("error reading file '{}': {}", path.display(), e))?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&text)
            .map_err(|e| format!("error parsing JSON in '{}': {}", path.display(), e))
    } else {
        toml::from_str(&text)
            .map_err(|e| format!("error parsing TOML in '{}': {}", path.display(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_steps_parse_with_expectations() {
        let scenario: Scenario = toml::from_str(
            r#"
            admin = "0xadmin"

            [[step]]
            actor = "0xadmin"
            action = "grant_role"
            account = "0xbreeder"
            role = "BREEDER_ROLE"

            [[step]]
            actor = "0xbreeder"
            action = "set_animal_data"
            id = 0
            data = { place_of_origin = "Farm XYZ", date_of_birth = 1622524800, gender = "Male", weight = 1000 }

            [[step]]
            actor = "0xbreeder"
            action = "create_manufactured_product"
            meat_ids = [2, 3]
            recipe_id = 4
            product_name = "Box"
            price = 10
            expect_error = "Unauthorized"
            "#,
        )
        .unwrap();
        assert_eq!(scenario.admin, Some(Identity::new("0xadmin")));
        assert_eq!(scenario.steps.len(), 3);
        assert!(matches!(
            scenario.steps[0].action,
            Action::GrantRole { role: Role::Breeder, .. }
        ));
        match &scenario.steps[1].action {
            Action::SetAnimalData { id, data } => {
                assert_eq!(*id, 0);
                assert_eq!(data.place_of_origin, "Farm XYZ");
                assert!(data.food_list.is_empty());
            }
            other => panic!("unexpected action {other:?}"),
        }
        let last = &scenario.steps[2];
        assert_eq!(last.expect_error, Some(ErrorKind::Unauthorized));
        assert!(matches!(
            last.action,
            Action::CreateManufacturedProduct { recipe_id: Some(4), .. }
        ));
        assert_eq!(
            last.describe(),
            "0xbreeder create_manufactured_product fails with Unauthorized"
        );
    }

    #[test]
    fn json_scenarios_parse() {
        let scenario: Scenario = serde_json::from_str(
            r#"{"step": [{"actor": "0xb", "action": "create_animal", "species": "Cow", "weight": 10, "sex": "male", "name": "first calf"}]}"#,
        )
        .unwrap();
        assert!(scenario.admin.is_none());
        assert_eq!(scenario.steps[0].describe(), "first calf");
    }

    #[test]
    fn unknown_action_is_rejected() {
        let err = toml::from_str::<Scenario>(
            "[[step]]\nactor = \"a\"\naction = \"eat_animal\"\n",
        );
        assert!(err.is_err());
    }
}
