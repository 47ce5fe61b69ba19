//! Rarity classification
//!
//! Raw rarity text from upstream catalogs is inconsistent ("Double Rare",
//! "double_rare", " DOUBLE RARE "). Everything is normalized once during
//! catalog ingestion into:
//! - a canonical `RarityGroup`
//! - a reverse-holo eligibility flag
//! - an optional `SpecialTag`, chosen by the first matching rule of an ordered
//!   rule table

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{PackError, PackResult};

/// Canonical rarity group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RarityGroup {
    Common,
    Uncommon,
    Rare,
    /// Chase cards counted by "at least one hit"
    Hit,
    Other,
}

impl RarityGroup {
    /// All groups in canonical order
    pub const ALL: [RarityGroup; 5] = [
        RarityGroup::Common,
        RarityGroup::Uncommon,
        RarityGroup::Rare,
        RarityGroup::Hit,
        RarityGroup::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Uncommon => "uncommon",
            Self::Rare => "rare",
            Self::Hit => "hit",
            Self::Other => "other",
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit)
    }

    /// Parse a group name (normalized, case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let name = normalize_text(name);
        Self::ALL.into_iter().find(|g| g.as_str() == name)
    }
}

impl std::fmt::Display for RarityGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Special tag pulling a card out of its raw rarity's pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpecialTag {
    MasterBall,
    PokeBall,
    AceSpec,
}

impl SpecialTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MasterBall => "master-ball",
            Self::PokeBall => "poke-ball",
            Self::AceSpec => "ace-spec",
        }
    }
}

impl std::fmt::Display for SpecialTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical mapping for one normalized raw rarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RarityRule {
    pub group: RarityGroup,
    /// Can appear in the regular reverse-holo pool
    #[serde(default)]
    pub reverse_eligible: bool,
}

impl RarityRule {
    pub fn new(group: RarityGroup, reverse_eligible: bool) -> Self {
        Self {
            group,
            reverse_eligible,
        }
    }
}

/// Which card field a tag rule inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagField {
    #[default]
    Name,
    Rarity,
}

/// One entry of the ordered special-tag rule table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRule {
    /// Substring matched against the normalized field
    pub pattern: String,
    #[serde(default)]
    pub field: TagField,
    pub tag: SpecialTag,
}

impl TagRule {
    /// Rule matching the card name
    pub fn name(pattern: impl Into<String>, tag: SpecialTag) -> Self {
        Self {
            pattern: pattern.into(),
            field: TagField::Name,
            tag,
        }
    }

    /// Rule matching the raw rarity text
    pub fn rarity(pattern: impl Into<String>, tag: SpecialTag) -> Self {
        Self {
            pattern: pattern.into(),
            field: TagField::Rarity,
            tag,
        }
    }

    fn matches(&self, name: &str, rarity: &str) -> bool {
        match self.field {
            TagField::Name => name.contains(&self.pattern),
            TagField::Rarity => rarity.contains(&self.pattern),
        }
    }
}

/// Normalize free text: trim, lowercase, fold accents and separators, collapse spaces
pub fn normalize_text(raw: &str) -> String {
    let folded: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'é' | 'è' | 'ê' => 'e',
            '_' | '-' => ' ',
            other => other,
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Result of classifying one catalog row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Normalized rarity text
    pub rarity: String,
    pub group: RarityGroup,
    pub reverse_eligible: bool,
    pub special_tag: Option<SpecialTag>,
}

/// Maps raw rarity text and card names to canonical groups and tags
#[derive(Debug, Clone, Default)]
pub struct RarityClassifier {
    rules: HashMap<String, RarityRule>,
    tag_rules: Vec<TagRule>,
}

impl RarityClassifier {
    /// Build from a rarity mapping and an ordered tag rule table
    pub fn new(rarities: &BTreeMap<String, RarityRule>, tag_rules: &[TagRule]) -> Self {
        let rules = rarities
            .iter()
            .map(|(raw, rule)| (normalize_text(raw), *rule))
            .collect();
        let tag_rules = tag_rules
            .iter()
            .map(|rule| TagRule {
                pattern: normalize_text(&rule.pattern),
                ..rule.clone()
            })
            .collect();
        Self { rules, tag_rules }
    }

    /// Look up the canonical rule for a raw rarity
    pub fn rule(&self, raw_rarity: &str) -> PackResult<RarityRule> {
        let key = normalize_text(raw_rarity);
        self.rules
            .get(&key)
            .copied()
            .ok_or_else(|| PackError::UnknownRarity(raw_rarity.trim().to_string()))
    }

    /// First matching special tag, if any
    pub fn special_tag(&self, name: &str, raw_rarity: &str) -> Option<SpecialTag> {
        let name = normalize_text(name);
        let rarity = normalize_text(raw_rarity);
        self.tag_rules
            .iter()
            .find(|rule| rule.matches(&name, &rarity))
            .map(|rule| rule.tag)
    }

    /// Classify a catalog row. An explicit tag wins over the rule table.
    pub fn classify(
        &self,
        name: &str,
        raw_rarity: &str,
        explicit_tag: Option<SpecialTag>,
    ) -> PackResult<Classification> {
        let rule = self.rule(raw_rarity)?;
        let special_tag = explicit_tag.or_else(|| self.special_tag(name, raw_rarity));
        Ok(Classification {
            rarity: normalize_text(raw_rarity),
            group: rule.group,
            // Tagged cards only live in their special category
            reverse_eligible: rule.reverse_eligible && special_tag.is_none(),
            special_tag,
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Default ordered tag rules
pub fn default_tag_rules() -> Vec<TagRule> {
    vec![
        TagRule::name("master ball", SpecialTag::MasterBall),
        TagRule::name("poke ball", SpecialTag::PokeBall),
        TagRule::name("pokeball", SpecialTag::PokeBall),
        TagRule::rarity("ace spec", SpecialTag::AceSpec),
    ]
}
