//! Configuration parser — JSON and YAML pack definitions
//!
//! ## Usage
//!
//! ```rust,ignore
//! let parser = ConfigParser::new();
//! let config = parser.parse_yaml(&std::fs::read_to_string("sv01.yaml")?)?;
//! ```

use std::path::Path;

use crate::catalog::CardRecord;
use crate::config::PackConfig;
use crate::error::{PackError, PackResult};

/// Parser for pack configurations and catalog snapshots
pub struct ConfigParser {
    /// Validation limits
    pub limits: ConfigLimits,
}

/// Parsing limits for untrusted input
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    pub max_name_length: usize,
    pub max_rarities: usize,
    pub max_tag_rules: usize,
    pub max_categories: usize,
    pub max_slots: usize,
    pub max_guaranteed_slots: u32,
    pub max_special_packs: usize,
    pub max_catalog_size: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_name_length: 256,
            max_rarities: 64,
            max_tag_rules: 64,
            max_categories: 64,
            max_slots: 32,
            max_guaranteed_slots: 64,
            max_special_packs: 16,
            max_catalog_size: 20_000,
        }
    }
}

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Guess from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

impl ConfigParser {
    /// Create a new parser
    pub fn new() -> Self {
        Self {
            limits: ConfigLimits::default(),
        }
    }

    /// Create parser with custom limits
    pub fn with_limits(limits: ConfigLimits) -> Self {
        Self { limits }
    }

    /// Parse a JSON pack configuration
    pub fn parse_json(&self, json: &str) -> PackResult<PackConfig> {
        let config: PackConfig =
            serde_json::from_str(json).map_err(|e| PackError::Parse(e.to_string()))?;
        self.validate(&config)?;
        Ok(config)
    }

    /// Parse a YAML pack configuration
    pub fn parse_yaml(&self, yaml: &str) -> PackResult<PackConfig> {
        let config: PackConfig =
            serde_yml::from_str(yaml).map_err(|e| PackError::Parse(e.to_string()))?;
        self.validate(&config)?;
        Ok(config)
    }

    /// Parse in the given format
    pub fn parse(&self, text: &str, format: ConfigFormat) -> PackResult<PackConfig> {
        match format {
            ConfigFormat::Json => self.parse_json(text),
            ConfigFormat::Yaml => self.parse_yaml(text),
        }
    }

    /// Read and parse a file, picking the format from its extension
    pub fn load(&self, path: impl AsRef<Path>) -> PackResult<PackConfig> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            PackError::Parse(format!("unsupported config extension: {}", path.display()))
        })?;
        let text = std::fs::read_to_string(path)
            .map_err(|e| PackError::Parse(format!("{}: {}", path.display(), e)))?;
        self.parse(&text, format)
    }

    /// Parse a JSON catalog snapshot (array of records)
    pub fn parse_catalog_json(&self, json: &str) -> PackResult<Vec<CardRecord>> {
        let records: Vec<CardRecord> =
            serde_json::from_str(json).map_err(|e| PackError::Parse(e.to_string()))?;
        if records.len() > self.limits.max_catalog_size {
            return Err(PackError::LimitExceeded(format!(
                "Too many cards: {} > {}",
                records.len(),
                self.limits.max_catalog_size
            )));
        }
        Ok(records)
    }

    /// Validate limits and structure
    pub fn validate(&self, config: &PackConfig) -> PackResult<()> {
        if config.name.len() > self.limits.max_name_length {
            return Err(PackError::LimitExceeded(format!(
                "Pack name too long: {} > {}",
                config.name.len(),
                self.limits.max_name_length
            )));
        }

        check_len("rarities", config.rarities.len(), self.limits.max_rarities)?;
        check_len("tag rules", config.tag_rules.len(), self.limits.max_tag_rules)?;
        check_len("categories", config.categories.len(), self.limits.max_categories)?;
        check_len("slots", config.slots.len(), self.limits.max_slots)?;
        check_len(
            "special packs",
            config.special_packs.len(),
            self.limits.max_special_packs,
        )?;

        let guaranteed: u32 = config.guaranteed.values().sum();
        if guaranteed > self.limits.max_guaranteed_slots {
            return Err(PackError::LimitExceeded(format!(
                "Too many guaranteed slots: {} > {}",
                guaranteed, self.limits.max_guaranteed_slots
            )));
        }

        config.validate()
    }
}

impl Default for ConfigParser {
    fn default() -> Self {
        Self::new()
    }
}

fn check_len(what: &str, len: usize, max: usize) -> PackResult<()> {
    if len > max {
        return Err(PackError::LimitExceeded(format!(
            "Too many {}: {} > {}",
            what, len, max
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PriceKind;
    use crate::config::PoolSelector;
    use crate::rarity::{RarityGroup, SpecialTag};

    const YAML: &str = r#"
name: Test Booster
rarities:
  Common: { group: common, reverse_eligible: true }
  Uncommon: { group: uncommon, reverse_eligible: true }
  Rare: { group: rare, reverse_eligible: true }
  Double Rare: { group: hit }
pool_sizes:
  common: 80
  double rare: 12
guaranteed:
  common: 4
  uncommon: 3
categories:
  rare: { pool: { rarity: rare } }
  double rare: { pool: { rarity: double rare } }
  regular: { pool: reverse, price: reverse }
  poke ball: { pool: { special: poke-ball } }
slots:
  rare:
    categories: { double rare: 0.1667 }
    fallback: rare
  reverse_1:
    categories: { poke ball: 0.25 }
    fallback: regular
"#;

    #[test]
    fn test_parse_yaml() {
        let config = ConfigParser::new().parse_yaml(YAML).unwrap();
        assert_eq!(config.name, "Test Booster");
        assert_eq!(config.guaranteed.get(&RarityGroup::Common), Some(&4));
        assert_eq!(config.pool_size("double rare"), Some(12));
        assert_eq!(
            config.categories["poke ball"].pool,
            PoolSelector::Special(SpecialTag::PokeBall)
        );
        assert_eq!(config.slots["rare"].fallback.as_deref(), Some("rare"));
        // Omitted tag rules fall back to the defaults
        assert!(!config.tag_rules.is_empty());
    }

    #[test]
    fn test_parse_yaml_pool_selectors() {
        let config = ConfigParser::new().parse_yaml(YAML).unwrap();
        assert_eq!(
            config.categories["rare"].pool,
            PoolSelector::Rarity("rare".into())
        );
        assert_eq!(
            config.categories["double rare"].pool,
            PoolSelector::Rarity("double rare".into())
        );
        assert_eq!(config.categories["regular"].pool, PoolSelector::Reverse);
        assert_eq!(config.categories["regular"].price, PriceKind::Reverse);
    }

    #[test]
    fn test_parse_yaml_roundtrips_preset() {
        let preset = crate::presets::ball_pattern_booster();
        let yaml = serde_yml::to_string(&preset).unwrap();
        let parsed = ConfigParser::new().parse_yaml(&yaml).unwrap();
        assert_eq!(parsed, preset);
    }

    #[test]
    fn test_parse_json_roundtrips_preset() {
        let preset = crate::presets::scarlet_violet_booster();
        let json = serde_json::to_string(&preset).unwrap();
        let parsed = ConfigParser::new().parse_json(&json).unwrap();
        assert_eq!(parsed, preset);
    }

    #[test]
    fn test_limits_enforced() {
        let parser = ConfigParser::with_limits(ConfigLimits {
            max_guaranteed_slots: 5,
            ..Default::default()
        });
        assert!(matches!(
            parser.parse_yaml(YAML),
            Err(PackError::LimitExceeded(_))
        ));
    }

    #[test]
    fn test_malformed_input_is_parse_error() {
        let parser = ConfigParser::new();
        assert!(matches!(parser.parse_json("{"), Err(PackError::Parse(_))));
        assert!(matches!(
            parser.parse_catalog_json(r#"[{"name": "x"}]"#),
            Err(PackError::Parse(_))
        ));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.YML")), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")), None);
    }
}
