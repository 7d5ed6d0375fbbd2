//! Ledger configuration, loadable from TOML.
//!
//! ```toml
//! admin = "0xadmin"
//!
//! [transfer_policy]
//! animal = ["TRANSPORTER", "SLAUGHTERER"]
//! carcass = ["TRANSPORTER", "MANUFACTURER"]
//! meat = "any"
//!
//! [mapper]
//! trusted_registrars = ["animal", "carcass", "meat", "recipe", "manufactured_product"]
//!
//! [log]
//! filter = "info"
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::{Category, Identity, Role};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("error reading config file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialization failed: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Identity granted ADMIN when the ledger is first initialized.
    pub admin: Identity,
    pub transfer_policy: TransferPolicy,
    pub mapper: MapperConfig,
    pub log: LogConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            admin: Identity::new("admin"),
            transfer_policy: TransferPolicy::default(),
            mapper: MapperConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl LedgerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ──────────────────────────────────────────────
// Transfer policy
// ──────────────────────────────────────────────

/// Who may receive a token of a given category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRule", into = "RawRule")]
pub enum ReceiverRule {
    /// Any identity may receive the token.
    Any,
    /// The receiver must hold at least one of these roles.
    Roles(Vec<Role>),
}

impl ReceiverRule {
    pub fn admits(&self, held: &BTreeSet<Role>) -> bool {
        match self {
            ReceiverRule::Any => true,
            ReceiverRule::Roles(roles) => roles.iter().any(|r| held.contains(r)),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawRule {
    Keyword(String),
    Roles(Vec<Role>),
}

impl TryFrom<RawRule> for ReceiverRule {
    type Error = String;

    fn try_from(raw: RawRule) -> Result<Self, Self::Error> {
        match raw {
            RawRule::Keyword(k) if k.eq_ignore_ascii_case("any") => Ok(ReceiverRule::Any),
            RawRule::Keyword(k) => Err(format!(
                "receiver rule must be \"any\" or a list of roles, got \"{k}\""
            )),
            RawRule::Roles(roles) => Ok(ReceiverRule::Roles(roles)),
        }
    }
}

impl From<ReceiverRule> for RawRule {
    fn from(rule: ReceiverRule) -> Self {
        match rule {
            ReceiverRule::Any => RawRule::Keyword("any".to_string()),
            ReceiverRule::Roles(roles) => RawRule::Roles(roles),
        }
    }
}

/// Per-category receiver rules applied by every ownership transfer.
///
/// Animals and carcasses may only move to the next stage's roles; meat,
/// recipes and products are unrestricted unless configured otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferPolicy {
    pub animal: ReceiverRule,
    pub carcass: ReceiverRule,
    pub meat: ReceiverRule,
    pub recipe: ReceiverRule,
    pub manufactured_product: ReceiverRule,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        TransferPolicy {
            animal: ReceiverRule::Roles(vec![Role::Transporter, Role::Slaughterer]),
            carcass: ReceiverRule::Roles(vec![Role::Transporter, Role::Manufacturer]),
            meat: ReceiverRule::Any,
            recipe: ReceiverRule::Any,
            manufactured_product: ReceiverRule::Any,
        }
    }
}

impl TransferPolicy {
    /// Rule for `category`. Transports never change hands.
    pub fn rule_for(&self, category: Category) -> ReceiverRule {
        match category {
            Category::Animal => self.animal.clone(),
            Category::Carcass => self.carcass.clone(),
            Category::Meat => self.meat.clone(),
            Category::Recipe => self.recipe.clone(),
            Category::ManufacturedProduct => self.manufactured_product.clone(),
            Category::Transport => ReceiverRule::Roles(Vec::new()),
        }
    }
}

// ──────────────────────────────────────────────
// Mapper
// ──────────────────────────────────────────────

/// Registry components that can ask the mapper to register tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Registrar {
    Animal,
    Carcass,
    Meat,
    Recipe,
    ManufacturedProduct,
}

impl Registrar {
    pub const ALL: [Registrar; 5] = [
        Registrar::Animal,
        Registrar::Carcass,
        Registrar::Meat,
        Registrar::Recipe,
        Registrar::ManufacturedProduct,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Registrar::Animal => "animal registry",
            Registrar::Carcass => "carcass registry",
            Registrar::Meat => "meat registry",
            Registrar::Recipe => "recipe registry",
            Registrar::ManufacturedProduct => "manufactured product registry",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    pub trusted_registrars: BTreeSet<Registrar>,
}

impl Default for MapperConfig {
    fn default() -> Self {
        MapperConfig {
            trusted_registrars: Registrar::ALL.into_iter().collect(),
        }
    }
}

// ──────────────────────────────────────────────
// Logging
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive. `RUST_LOG` takes precedence.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            filter: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = LedgerConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, LedgerConfig::default());
    }

    #[test]
    fn partial_policy_keeps_other_defaults() {
        let cfg = LedgerConfig::from_toml_str(
            r#"
            admin = "0xf39F"

            [transfer_policy]
            meat = ["MANUFACTURER"]
            carcass = "any"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.admin, Identity::new("0xf39F"));
        assert_eq!(
            cfg.transfer_policy.meat,
            ReceiverRule::Roles(vec![Role::Manufacturer])
        );
        assert_eq!(cfg.transfer_policy.carcass, ReceiverRule::Any);
        assert_eq!(
            cfg.transfer_policy.animal,
            ReceiverRule::Roles(vec![Role::Transporter, Role::Slaughterer])
        );
    }

    #[test]
    fn bad_rule_keyword_is_rejected() {
        let err = LedgerConfig::from_toml_str("[transfer_policy]\nmeat = \"nobody\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn trusted_registrars_can_be_narrowed() {
        let cfg =
            LedgerConfig::from_toml_str("[mapper]\ntrusted_registrars = [\"animal\"]\n").unwrap();
        assert_eq!(
            cfg.mapper.trusted_registrars,
            [Registrar::Animal].into_iter().collect()
        );
    }

    #[test]
    fn serialized_config_parses_back() {
        let cfg = LedgerConfig::default();
        let text = cfg.to_toml_string().unwrap();
        assert_eq!(LedgerConfig::from_toml_str(&text).unwrap(), cfg);
    }

    #[test]
    fn receiver_rule_admits() {
        let held: BTreeSet<Role> = [Role::Manufacturer].into_iter().collect();
        assert!(ReceiverRule::Any.admits(&BTreeSet::new()));
        assert!(ReceiverRule::Roles(vec![Role::Transporter, Role::Manufacturer]).admits(&held));
        assert!(!ReceiverRule::Roles(vec![Role::Slaughterer]).admits(&held));
    }
}
