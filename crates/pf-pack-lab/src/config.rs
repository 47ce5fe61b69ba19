//! Pack configuration
//!
//! Describes one product's slot layout. Loaded once per run (see
//! `parser::ConfigParser`) and passed by reference into every component;
//! nothing here is global or mutated after construction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{Card, PriceKind};
use crate::error::{check_probability, PackError, PackResult};
use crate::rarity::{
    default_tag_rules, normalize_text, RarityGroup, RarityRule, SpecialTag, TagRule,
};
use crate::strategy::{EXACT_SLOT, GUARANTEED_SLOT};

/// Which catalog cards make up a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolSelector {
    /// Untagged cards of a canonical group
    Group(RarityGroup),
    /// Untagged cards of one normalized rarity
    Rarity(String),
    /// Cards carrying a special tag
    Special(SpecialTag),
    /// Untagged reverse-holo eligible cards
    Reverse,
}

impl PoolSelector {
    /// Does `card` belong to this pool?
    pub fn admits(&self, card: &Card) -> bool {
        match self {
            Self::Group(group) => card.group == *group && card.special_tag.is_none(),
            Self::Rarity(rarity) => {
                card.special_tag.is_none() && card.rarity == normalize_text(rarity)
            }
            Self::Special(tag) => card.special_tag == Some(*tag),
            Self::Reverse => card.reverse_eligible,
        }
    }
}

/// Category definition referenced by probabilistic slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDef {
    /// `{ rarity: rare }` style single-key map in both JSON and YAML
    #[serde(with = "serde_yml::with::singleton_map")]
    pub pool: PoolSelector,
    #[serde(default)]
    pub price: PriceKind,
}

impl CategoryDef {
    pub fn rarity(rarity: impl Into<String>) -> Self {
        Self {
            pool: PoolSelector::Rarity(rarity.into()),
            price: PriceKind::Base,
        }
    }

    pub fn group(group: RarityGroup) -> Self {
        Self {
            pool: PoolSelector::Group(group),
            price: PriceKind::Base,
        }
    }

    pub fn special(tag: SpecialTag) -> Self {
        Self {
            pool: PoolSelector::Special(tag),
            price: PriceKind::Base,
        }
    }

    /// Regular reverse-holo pool valued at reverse prices
    pub fn reverse() -> Self {
        Self {
            pool: PoolSelector::Reverse,
            price: PriceKind::Reverse,
        }
    }
}

/// Categorical distribution of one probabilistic slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotDef {
    /// Category label → probability
    #[serde(default)]
    pub categories: BTreeMap<String, f64>,
    /// Category receiving the residual mass when its probability is omitted
    #[serde(default)]
    pub fallback: Option<String>,
}

impl SlotDef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a category
    pub fn with(mut self, label: impl Into<String>, probability: f64) -> Self {
        self.categories.insert(label.into(), probability);
        self
    }

    /// Builder: set the fallback category
    pub fn with_fallback(mut self, label: impl Into<String>) -> Self {
        self.fallback = Some(label.into());
        self
    }
}

/// Reference to a catalog card by name (and optionally rarity)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRef {
    pub name: String,
    #[serde(default)]
    pub rarity: Option<String>,
}

impl CardRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rarity: None,
        }
    }
}

/// Draws from a pool for a random special-pack payoff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolDraw {
    /// Category label or group name
    pub pool: String,
    pub count: u32,
}

/// Payoff of a special full-pack override event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum PackPayoff {
    /// Explicit card list
    Fixed { cards: Vec<CardRef> },
    /// Counts per pool, drawn with replacement
    Random { draws: Vec<PoolDraw> },
}

fn enabled_default() -> bool {
    true
}

/// God pack / demi-god pack definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialPackEvent {
    pub name: String,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    pub trigger_probability: f64,
    pub payoff: PackPayoff,
}

impl SpecialPackEvent {
    pub fn fixed(name: impl Into<String>, trigger_probability: f64, cards: Vec<CardRef>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            trigger_probability,
            payoff: PackPayoff::Fixed { cards },
        }
    }

    pub fn random(name: impl Into<String>, trigger_probability: f64, draws: Vec<PoolDraw>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            trigger_probability,
            payoff: PackPayoff::Random { draws },
        }
    }

    /// Builder: toggle the event
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Complete pack configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackConfig {
    /// Product name
    pub name: String,

    /// Raw rarity text → canonical rule
    pub rarities: BTreeMap<String, RarityRule>,

    /// Ordered special-tag rules, first match wins
    #[serde(default = "default_tag_rules")]
    pub tag_rules: Vec<TagRule>,

    /// Distinct cards per category/group in the full set
    #[serde(default)]
    pub pool_sizes: BTreeMap<String, usize>,

    /// Guaranteed slots per canonical group
    #[serde(default)]
    pub guaranteed: BTreeMap<RarityGroup, u32>,

    /// Category definitions used by probabilistic slots
    #[serde(default)]
    pub categories: BTreeMap<String, CategoryDef>,

    /// Probabilistic slots ("rare", "reverse_1", ...)
    #[serde(default)]
    pub slots: BTreeMap<String, SlotDef>,

    /// Cards with a directly known per-pack pull rate
    #[serde(default)]
    pub exact_rates: BTreeMap<String, f64>,

    /// Special full-pack override events
    #[serde(default)]
    pub special_packs: Vec<SpecialPackEvent>,
}

impl PackConfig {
    /// Empty configuration with the default tag rules
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rarities: BTreeMap::new(),
            tag_rules: default_tag_rules(),
            pool_sizes: BTreeMap::new(),
            guaranteed: BTreeMap::new(),
            categories: BTreeMap::new(),
            slots: BTreeMap::new(),
            exact_rates: BTreeMap::new(),
            special_packs: Vec::new(),
        }
    }

    /// Builder: map a raw rarity
    pub fn with_rarity(
        mut self,
        raw: impl Into<String>,
        group: RarityGroup,
        reverse_eligible: bool,
    ) -> Self {
        self.rarities
            .insert(raw.into(), RarityRule::new(group, reverse_eligible));
        self
    }

    /// Builder: replace the tag rule table
    pub fn with_tag_rules(mut self, rules: Vec<TagRule>) -> Self {
        self.tag_rules = rules;
        self
    }

    /// Builder: set a pool size
    pub fn with_pool_size(mut self, label: impl Into<String>, size: usize) -> Self {
        self.pool_sizes.insert(label.into(), size);
        self
    }

    /// Builder: set guaranteed slots for a group
    pub fn with_guaranteed(mut self, group: RarityGroup, slot_count: u32) -> Self {
        self.guaranteed.insert(group, slot_count);
        self
    }

    /// Builder: define a category
    pub fn with_category(mut self, label: impl Into<String>, def: CategoryDef) -> Self {
        self.categories.insert(label.into(), def);
        self
    }

    /// Builder: define a probabilistic slot
    pub fn with_slot(mut self, name: impl Into<String>, slot: SlotDef) -> Self {
        self.slots.insert(name.into(), slot);
        self
    }

    /// Builder: set an exact pull rate for a card
    pub fn with_exact_rate(mut self, card: impl Into<String>, probability: f64) -> Self {
        self.exact_rates.insert(card.into(), probability);
        self
    }

    /// Builder: add a special pack event
    pub fn with_special_pack(mut self, event: SpecialPackEvent) -> Self {
        self.special_packs.push(event);
        self
    }

    /// Configured pool size for a label, if any
    pub fn pool_size(&self, label: &str) -> Option<usize> {
        self.pool_sizes.get(label).copied()
    }

    /// Enabled special pack events
    pub fn active_special_packs(&self) -> impl Iterator<Item = &SpecialPackEvent> {
        self.special_packs.iter().filter(|e| e.enabled)
    }

    /// Structural checks that do not need the catalog
    pub fn validate(&self) -> PackResult<()> {
        for (slot, def) in &self.slots {
            // Slot names prefix "slot/category" result keys
            if slot == GUARANTEED_SLOT || slot == EXACT_SLOT || slot.contains('/') {
                return Err(PackError::InvalidSlotName(slot.clone()));
            }
            for (label, p) in &def.categories {
                if !self.categories.contains_key(label) {
                    return Err(PackError::UnknownCategory {
                        slot: slot.clone(),
                        category: label.clone(),
                    });
                }
                check_probability(format!("{}/{}", slot, label), *p)?;
            }
            if let Some(fallback) = &def.fallback {
                if !self.categories.contains_key(fallback) {
                    return Err(PackError::UnknownCategory {
                        slot: slot.clone(),
                        category: fallback.clone(),
                    });
                }
            }
        }

        for (card, p) in &self.exact_rates {
            check_probability(format!("exact/{}", card), *p)?;
        }

        for event in &self.special_packs {
            check_probability(format!("special/{}", event.name), event.trigger_probability)?;
        }

        Ok(())
    }
}
