//! Identities, roles, categories and the record types of every lifecycle
//! stage.
//!
//! Records reference their predecessors by plain integer id; every such
//! reference is resolved through the mapper with a category check before
//! it is followed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a record. Token ids (animals, carcasses, meats, recipes,
/// manufactured products) share one global counter; transports have their
/// own.
pub type TokenId = u64;

// ──────────────────────────────────────────────
// Identity
// ──────────────────────────────────────────────

/// An acting party (a wallet address in a chain deployment).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Identity(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Identity(s.to_string())
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Identity(s)
    }
}

// ──────────────────────────────────────────────
// Role
// ──────────────────────────────────────────────

/// Capability grant held by an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum Role {
    Admin,
    Breeder,
    Transporter,
    Slaughterer,
    Manufacturer,
    Minter,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::Breeder,
        Role::Transporter,
        Role::Slaughterer,
        Role::Manufacturer,
        Role::Minter,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Breeder => "BREEDER",
            Role::Transporter => "TRANSPORTER",
            Role::Slaughterer => "SLAUGHTERER",
            Role::Manufacturer => "MANUFACTURER",
            Role::Minter => "MINTER",
        }
    }

    /// Lower-case noun used in failure reasons ("Caller is not a breeder").
    pub fn noun(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Breeder => "breeder",
            Role::Transporter => "transporter",
            Role::Slaughterer => "slaughterer",
            Role::Manufacturer => "manufacturer",
            Role::Minter => "minter",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(pub String);

/// Accepts `BREEDER`, `breeder`, `BREEDER_ROLE`, and the legacy spellings
/// `SLAUGHTER_ROLE` / `MANUFACTURERE_ROLE` still found in deployment scripts.
impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_suffix("_ROLE").unwrap_or(&upper);
        match name {
            "ADMIN" | "DEFAULT_ADMIN" => Ok(Role::Admin),
            "BREEDER" => Ok(Role::Breeder),
            "TRANSPORTER" => Ok(Role::Transporter),
            "SLAUGHTERER" | "SLAUGHTER" => Ok(Role::Slaughterer),
            "MANUFACTURER" | "MANUFACTURERE" => Ok(Role::Manufacturer),
            "MINTER" => Ok(Role::Minter),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = ParseRoleError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ──────────────────────────────────────────────
// Category
// ──────────────────────────────────────────────

/// Fixed type tag of a record, assigned at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Category {
    Animal,
    Carcass,
    Transport,
    Meat,
    Recipe,
    ManufacturedProduct,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Animal,
        Category::Carcass,
        Category::Transport,
        Category::Meat,
        Category::Recipe,
        Category::ManufacturedProduct,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Animal => "Animal",
            Category::Carcass => "Carcass",
            Category::Transport => "Transport",
            Category::Meat => "Meat",
            Category::Recipe => "Recipe",
            Category::ManufacturedProduct => "ManufacturedProduct",
        }
    }

    /// snake_case form used in storage keys and configuration.
    pub fn key(self) -> &'static str {
        match self {
            Category::Animal => "animal",
            Category::Carcass => "carcass",
            Category::Transport => "transport",
            Category::Meat => "meat",
            Category::Recipe => "recipe",
            Category::ManufacturedProduct => "manufactured_product",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0}")]
pub struct ParseCategoryError(pub String);

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted) || c.key() == wanted)
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

impl TryFrom<String> for Category {
    type Error = ParseCategoryError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ──────────────────────────────────────────────
// Mapper entry
// ──────────────────────────────────────────────

/// Ownership record of a registered token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub category: Category,
    pub owner: Identity,
}

// ──────────────────────────────────────────────
// Records
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Animal {
    pub id: TokenId,
    pub species: String,
    pub birth_weight: u64,
    pub sex: String,
    pub place_of_origin: String,
    /// Unix seconds.
    pub date_of_birth: u64,
    pub gender: String,
    pub weight: u64,
    pub sickness_list: Vec<String>,
    pub vaccination_list: Vec<String>,
    pub food_list: Vec<String>,
    pub is_contaminated: bool,
    pub is_life_cycle_over: bool,
}

/// Breeding data written by `set_animal_data`. Overwrites every field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimalUpdate {
    pub place_of_origin: String,
    pub date_of_birth: u64,
    pub gender: String,
    pub weight: u64,
    #[serde(default)]
    pub sickness_list: Vec<String>,
    #[serde(default)]
    pub vaccination_list: Vec<String>,
    #[serde(default)]
    pub food_list: Vec<String>,
    #[serde(default)]
    pub is_contaminated: bool,
}

/// Transport leg of an animal. Not a token: it cannot change hands and is
/// only writable while the animal still belongs to `bound_owner`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transport {
    pub id: TokenId,
    pub animal_id: TokenId,
    pub bound_owner: Identity,
    /// Seconds.
    pub duration: u64,
    pub temperature: i64,
    pub humidity: u64,
    pub is_contaminated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportUpdate {
    pub duration: u64,
    pub temperature: i64,
    pub humidity: u64,
    #[serde(default)]
    pub is_contaminated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Carcass {
    pub id: TokenId,
    pub animal_id: TokenId,
    pub agreement_number: String,
    pub country_of_slaughter: String,
    pub date_of_slaughter: u64,
    pub carcass_weight: u64,
    pub is_contaminated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarcassUpdate {
    pub agreement_number: String,
    pub country_of_slaughter: String,
    pub date_of_slaughter: u64,
    pub carcass_weight: u64,
    #[serde(default)]
    pub is_contaminated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meat {
    pub id: TokenId,
    pub carcass_id: TokenId,
    pub part: String,
    pub weight: u64,
    pub agreement_number: String,
    pub country_of_cutting: String,
    pub date_of_cutting: u64,
    pub is_contaminated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeatUpdate {
    pub agreement_number: String,
    pub country_of_cutting: String,
    pub date_of_cutting: u64,
    pub part: String,
    #[serde(default)]
    pub is_contaminated: bool,
    pub weight: u64,
}

/// One line of a recipe: which cut of which species, and how much.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub animal_type: String,
    pub part: String,
    pub weight: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: TokenId,
    pub name: String,
    pub description: String,
    pub ingredients: Vec<Ingredient>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManufacturedProduct {
    pub id: TokenId,
    /// Recipe the meat set was validated against, if any.
    pub recipe_id: Option<TokenId>,
    pub meat_ids: Vec<TokenId>,
    pub product_name: String,
    pub date_of_manufacturation: u64,
    pub price: u64,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub date_of_manufacturation: u64,
    pub product_name: String,
    pub price: u64,
    #[serde(default)]
    pub description: String,
}

// ──────────────────────────────────────────────
// Traceability
// ──────────────────────────────────────────────

/// One meat of a product, followed back to the living animal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeatTrace {
    pub meat: Meat,
    pub carcass: Carcass,
    pub animal: Animal,
    pub transports: Vec<Transport>,
}

/// Full provenance chain of a manufactured product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductTrace {
    pub product: ManufacturedProduct,
    pub recipe: Option<Recipe>,
    pub meats: Vec<MeatTrace>,
}
