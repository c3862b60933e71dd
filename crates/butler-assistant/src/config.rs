//! The `assistant` section of `butler-config.yaml`.
//!
//! Only this section is read here; the rest of the file belongs to
//! [`butler_proxy::ProxyConfig`]. A missing file or section yields the
//! defaults.

use std::path::Path;

use butler_proxy::{ConfigError, SeedBudget, SeedUser};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Dialog behaviour and seed data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssistantConfig {
    /// Greet users as if they were on holiday.
    #[serde(default)]
    pub vacation: bool,

    /// Who the apology message blames.
    #[serde(default = "default_dev_name")]
    pub dev_name: String,

    /// Currency label in transaction listings.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Share of a category budget at which warnings start.
    #[serde(default = "default_warn_threshold")]
    pub warn_threshold: Decimal,

    /// How many transactions "Show Last Transactions" lists.
    #[serde(default = "default_recent_txn_limit")]
    pub recent_txn_limit: i64,

    /// Users seeded into the allow-list at bootstrap.
    #[serde(default)]
    pub users: Vec<SeedUser>,

    /// Budgets seeded at bootstrap.
    #[serde(default)]
    pub budgets: Vec<SeedBudget>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            vacation: false,
            dev_name: default_dev_name(),
            currency: default_currency(),
            warn_threshold: default_warn_threshold(),
            recent_txn_limit: default_recent_txn_limit(),
            users: Vec::new(),
            budgets: Vec::new(),
        }
    }
}

impl AssistantConfig {
    /// Load the `assistant` section from a YAML file, or defaults if the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file exists but cannot be read, or
    /// [`ConfigError::Yaml`] if it is not valid YAML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Extract the `assistant` section from a full config document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the document or the section is
    /// invalid.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let raw: serde_yml::Value = serde_yml::from_str(yaml)?;
        match raw.get("assistant") {
            Some(section) => Ok(serde_yml::from_value(section.clone())?),
            None => Ok(Self::default()),
        }
    }
}

fn default_dev_name() -> String {
    "the developer".to_owned()
}

fn default_currency() -> String {
    "SGD".to_owned()
}

fn default_warn_threshold() -> Decimal {
    Decimal::new(8, 1)
}

const fn default_recent_txn_limit() -> i64 {
    8
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn section_is_extracted_from_full_document() {
        let yaml = r"
database:
  url: postgresql://localhost/butler
assistant:
  vacation: true
  dev_name: Lance
  warn_threshold: 0.75
  users:
    - id: 1001
      name: Ann
  budgets:
    - category: Rent
      max_budget: 2000
      max_tx_amount: 2000
";
        let config = AssistantConfig::parse(yaml).unwrap();
        assert!(config.vacation);
        assert_eq!(config.dev_name, "Lance");
        assert_eq!(config.warn_threshold, Decimal::new(75, 2));
        assert_eq!(config.currency, "SGD");
        assert_eq!(config.recent_txn_limit, 8);
        assert_eq!(config.users[0].id, 1001);
        assert_eq!(config.budgets[0].category, "Rent");
    }

    #[test]
    fn missing_section_gives_defaults() {
        let config = AssistantConfig::parse("logging:\n  level: debug\n").unwrap();
        assert_eq!(config, AssistantConfig::default());
        assert_eq!(config.warn_threshold, Decimal::new(8, 1));
    }
}
