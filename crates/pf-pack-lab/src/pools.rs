//! Pool index — which catalog cards each guaranteed group and category draws from

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::catalog::{CardCatalog, CardId, PriceKind};
use crate::config::{PackConfig, PoolSelector};
use crate::error::{check_probability, PackError, PackResult, ValuationWarning};
use crate::rarity::{normalize_text, RarityGroup};

/// Pool identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PoolKey {
    Group(RarityGroup),
    Category(String),
}

impl std::fmt::Display for PoolKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Group(group) => write!(f, "{}", group),
            Self::Category(label) => f.write_str(label),
        }
    }
}

/// A listed card inside a pool, valued at the pool's price kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoolMember {
    pub card: CardId,
    pub value: f64,
    pub priced: bool,
}

/// Cards sharing a rarity/category
///
/// `size` is the number of distinct cards in the full set. It may exceed the
/// number of listed members when the upstream catalog omits unpriced cards;
/// those unlisted cards are worth 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    key: PoolKey,
    members: Vec<PoolMember>,
    size: usize,
    price: PriceKind,
}

impl Pool {
    pub fn key(&self) -> &PoolKey {
        &self.key
    }

    pub fn label(&self) -> String {
        self.key.to_string()
    }

    pub fn members(&self) -> &[PoolMember] {
        &self.members
    }

    /// Distinct cards in the set, the uniform-draw denominator
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn price_kind(&self) -> PriceKind {
        self.price
    }

    /// Expected value of one uniform draw, unlisted cards counted at 0
    pub fn mean_value(&self) -> Option<f64> {
        if self.size == 0 {
            return None;
        }
        let total: f64 = self.members.iter().map(|m| m.value).sum();
        Some(total / self.size as f64)
    }
}

/// Card with a directly configured per-pack pull rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExactCard {
    pub card: CardId,
    pub probability: f64,
    pub value: f64,
}

/// All pools for one catalog + configuration
#[derive(Debug, Clone, Default)]
pub struct PoolIndex {
    groups: BTreeMap<RarityGroup, Pool>,
    categories: BTreeMap<String, Pool>,
    exact: Vec<ExactCard>,
    warnings: Vec<ValuationWarning>,
}

impl PoolIndex {
    /// Partition the catalog into pools
    ///
    /// Cards with an exact pull rate are removed from every pool. Pool sizes
    /// fall back to the catalog count when not configured.
    pub fn build(catalog: &CardCatalog, config: &PackConfig) -> PackResult<Self> {
        let mut index = Self::default();

        let mut exact_ids = HashSet::new();
        for (name, p) in &config.exact_rates {
            let probability = check_probability(format!("exact/{}", name), *p)?;
            let cards = catalog.find_all(name);
            if cards.is_empty() {
                return Err(PackError::UnknownCard(name.clone()));
            }
            for card in cards {
                exact_ids.insert(card.id);
                index.exact.push(ExactCard {
                    card: card.id,
                    probability,
                    value: card.base_price.unwrap_or(0.0),
                });
            }
        }
        index.exact.sort_by_key(|e| e.card);

        let mut reverse_reported = HashSet::new();

        for group in RarityGroup::ALL {
            let pool = index.collect_pool(
                catalog,
                config,
                PoolKey::Group(group),
                &PoolSelector::Group(group),
                PriceKind::Base,
                &exact_ids,
                &mut reverse_reported,
            );
            index.groups.insert(group, pool);
        }

        for (label, def) in &config.categories {
            let pool = index.collect_pool(
                catalog,
                config,
                PoolKey::Category(label.clone()),
                &def.pool,
                def.price,
                &exact_ids,
                &mut reverse_reported,
            );
            index.categories.insert(label.clone(), pool);
        }

        Ok(index)
    }

    #[allow(clippy::too_many_arguments)]
    fn collect_pool(
        &mut self,
        catalog: &CardCatalog,
        config: &PackConfig,
        key: PoolKey,
        selector: &PoolSelector,
        price: PriceKind,
        exact_ids: &HashSet<CardId>,
        reverse_reported: &mut HashSet<CardId>,
    ) -> Pool {
        let mut members = Vec::new();
        for card in catalog.iter() {
            if exact_ids.contains(&card.id) || !selector.admits(card) {
                continue;
            }
            let value = card.price(price);
            if value.is_none() && price == PriceKind::Reverse && reverse_reported.insert(card.id) {
                ValuationWarning::MissingReversePrice {
                    card: card.name.clone(),
                }
                .emit(&mut self.warnings);
            }
            members.push(PoolMember {
                card: card.id,
                value: value.unwrap_or(0.0),
                priced: value.is_some(),
            });
        }

        let label = key.to_string();
        let observed = members.len();
        let size = match config.pool_size(&label) {
            Some(configured) if configured < observed => {
                ValuationWarning::PoolSizeBelowCatalog {
                    pool: label,
                    configured,
                    observed,
                }
                .emit(&mut self.warnings);
                observed
            }
            Some(configured) => configured,
            None => observed,
        };

        Pool {
            key,
            members,
            size,
            price,
        }
    }

    pub fn group(&self, group: RarityGroup) -> Option<&Pool> {
        self.groups.get(&group)
    }

    pub fn category(&self, label: &str) -> Option<&Pool> {
        self.categories.get(label)
    }

    /// Look up by category label first, then by group name
    pub fn resolve_label(&self, label: &str) -> Option<&Pool> {
        self.categories
            .get(label)
            .or_else(|| self.categories.get(&normalize_text(label)))
            .or_else(|| RarityGroup::from_name(label).and_then(|g| self.groups.get(&g)))
    }

    pub fn exact_cards(&self) -> &[ExactCard] {
        &self.exact
    }

    pub fn warnings(&self) -> &[ValuationWarning] {
        &self.warnings
    }
}
