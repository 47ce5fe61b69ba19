//! Slot valuation strategies
//!
//! Every part of a pack is valued by exactly one strategy:
//!
//! ```text
//! SlotStrategy
//!     ├── Exact            cards with a configured per-pack rate (Bernoulli each)
//!     ├── GuaranteedSlot   S uniform draws from one rarity group (Binomial per card)
//!     └── ProbabilityBased one categorical draw over (category, card) outcomes
//! ```
//!
//! Each variant resolves its own category pulls and derives its own variance
//! term. Slots are assumed independent, so pack-level EV and variance are
//! plain sums over strategies.

use serde::{Deserialize, Serialize};

use crate::catalog::CardId;
use crate::error::{PackError, PackResult};
use crate::pools::{Pool, PoolIndex};
use crate::rarity::RarityGroup;
use crate::slots::{GuaranteedSlotGroup, SlotDistribution, SlotProbabilityModel};

/// Slot name used for guaranteed groups
pub const GUARANTEED_SLOT: &str = "guaranteed";
/// Slot and category name used for exact-rate cards
pub const EXACT_SLOT: &str = "exact";

/// Strategy discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Exact,
    GuaranteedSlot,
    ProbabilityBased,
}

/// One card's contribution through one participation path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PullOutcome {
    pub card: CardId,
    /// Unconditional per-pack pull probability along this path
    pub rate: f64,
    pub value: f64,
}

/// Resolved pulls of one (slot, category)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPulls {
    pub slot: String,
    pub category: String,
    pub kind: StrategyKind,
    /// Uniform-draw denominator N
    pub pool_size: usize,
    /// Slot count for guaranteed groups, category probability otherwise
    pub weight: f64,
    pub outcomes: Vec<PullOutcome>,
}

impl CategoryPulls {
    /// Stable "slot/category" key
    pub fn key(&self) -> String {
        category_key(&self.slot, &self.category)
    }

    /// Σ rate × value
    pub fn expected_value(&self) -> f64 {
        self.outcomes.iter().map(|o| o.rate * o.value).sum()
    }

    /// Σ rate over listed cards
    pub fn total_rate(&self) -> f64 {
        self.outcomes.iter().map(|o| o.rate).sum()
    }

    /// Mass of the pool's unlisted (zero-value) cards
    fn unlisted_rate(&self) -> f64 {
        match self.kind {
            StrategyKind::ProbabilityBased if self.pool_size > 0 => {
                let unlisted = self.pool_size.saturating_sub(self.outcomes.len());
                self.weight * unlisted as f64 / self.pool_size as f64
            }
            _ => 0.0,
        }
    }
}

/// Build the "slot/category" key used across analytic and simulated reports
pub fn category_key(slot: &str, category: &str) -> String {
    format!("{}/{}", slot, category)
}

/// Polymorphic valuation interface, one implementation per strategy
pub trait SlotValuation {
    fn kind(&self) -> StrategyKind;

    /// Slot name as reported in results
    fn slot_name(&self) -> &str;

    /// Per-card pull paths for every category this slot contributes
    fn resolve(&self, pools: &PoolIndex) -> PackResult<Vec<CategoryPulls>>;

    /// Variance of the slot's value given its resolved pulls
    fn variance(&self, pulls: &[CategoryPulls]) -> f64;
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXACT
// ═══════════════════════════════════════════════════════════════════════════════

/// Cards with a directly configured per-pack rate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExactSlot;

impl SlotValuation for ExactSlot {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Exact
    }

    fn slot_name(&self) -> &str {
        EXACT_SLOT
    }

    fn resolve(&self, pools: &PoolIndex) -> PackResult<Vec<CategoryPulls>> {
        let outcomes = pools
            .exact_cards()
            .iter()
            .map(|exact| PullOutcome {
                card: exact.card,
                rate: exact.probability,
                value: exact.value,
            })
            .collect::<Vec<_>>();
        Ok(vec![CategoryPulls {
            slot: EXACT_SLOT.to_string(),
            category: EXACT_SLOT.to_string(),
            kind: StrategyKind::Exact,
            pool_size: outcomes.len(),
            weight: 1.0,
            outcomes,
        }])
    }

    /// Σ v² p(1 − p), each card an independent Bernoulli trial
    fn variance(&self, pulls: &[CategoryPulls]) -> f64 {
        pulls
            .iter()
            .flat_map(|c| c.outcomes.iter())
            .map(|o| o.value * o.value * o.rate * (1.0 - o.rate))
            .sum()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// GUARANTEED SLOT
// ═══════════════════════════════════════════════════════════════════════════════

/// S independent uniform draws from one rarity group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuaranteedSlot {
    pub group: RarityGroup,
    pub slot_count: u32,
}

impl From<GuaranteedSlotGroup> for GuaranteedSlot {
    fn from(g: GuaranteedSlotGroup) -> Self {
        Self {
            group: g.group,
            slot_count: g.slot_count,
        }
    }
}

impl SlotValuation for GuaranteedSlot {
    fn kind(&self) -> StrategyKind {
        StrategyKind::GuaranteedSlot
    }

    fn slot_name(&self) -> &str {
        GUARANTEED_SLOT
    }

    /// ep = S / N for every listed card of the group
    fn resolve(&self, pools: &PoolIndex) -> PackResult<Vec<CategoryPulls>> {
        let pool = pools
            .group(self.group)
            .ok_or_else(|| PackError::UnknownPool(self.group.to_string()))?;
        let slots = f64::from(self.slot_count);

        let outcomes = if self.slot_count == 0 {
            Vec::new()
        } else {
            let q = per_card_share(pool, || format!("{} guaranteed slots", self.slot_count))?;
            pool.members()
                .iter()
                .map(|m| PullOutcome {
                    card: m.card,
                    rate: slots * q,
                    value: m.value,
                })
                .collect()
        };

        Ok(vec![CategoryPulls {
            slot: GUARANTEED_SLOT.to_string(),
            category: self.group.to_string(),
            kind: StrategyKind::GuaranteedSlot,
            pool_size: pool.size(),
            weight: slots,
            outcomes,
        }])
    }

    /// Σ v² · S·q(1 − q) with q = 1/N; per-card counts treated as independent
    fn variance(&self, pulls: &[CategoryPulls]) -> f64 {
        pulls
            .iter()
            .filter(|c| c.pool_size > 0)
            .map(|c| {
                let q = 1.0 / c.pool_size as f64;
                let binomial = c.weight * q * (1.0 - q);
                c.outcomes
                    .iter()
                    .map(|o| o.value * o.value * binomial)
                    .sum::<f64>()
            })
            .sum()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROBABILITY BASED
// ═══════════════════════════════════════════════════════════════════════════════

/// One categorical draw: category by configured odds, then a uniform card
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilisticSlot {
    pub distribution: SlotDistribution,
}

impl SlotValuation for ProbabilisticSlot {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ProbabilityBased
    }

    fn slot_name(&self) -> &str {
        self.distribution.name()
    }

    /// ep = p(s, c) / N(s, c) for every listed card of each category
    fn resolve(&self, pools: &PoolIndex) -> PackResult<Vec<CategoryPulls>> {
        let slot = self.distribution.name();
        let mut pulls = Vec::with_capacity(self.distribution.categories().len());

        for category in self.distribution.categories() {
            let pool = pools
                .category(&category.label)
                .ok_or_else(|| PackError::UnknownCategory {
                    slot: slot.to_string(),
                    category: category.label.clone(),
                })?;

            let outcomes = if category.probability == 0.0 {
                Vec::new()
            } else {
                let q = per_card_share(pool, || {
                    format!("slot '{}' with probability {}", slot, category.probability)
                })?;
                pool.members()
                    .iter()
                    .map(|m| PullOutcome {
                        card: m.card,
                        rate: category.probability * q,
                        value: m.value,
                    })
                    .collect()
            };

            pulls.push(CategoryPulls {
                slot: slot.to_string(),
                category: category.label.clone(),
                kind: StrategyKind::ProbabilityBased,
                pool_size: pool.size(),
                weight: category.probability,
                outcomes,
            });
        }

        Ok(pulls)
    }

    /// Σ pᵢ(vᵢ − E[X])² over every (category, card) outcome
    ///
    /// Unlisted pool cards and mass left unassigned by an under-full slot
    /// are zero-value outcomes.
    fn variance(&self, pulls: &[CategoryPulls]) -> f64 {
        let mean: f64 = pulls.iter().map(CategoryPulls::expected_value).sum();
        let unassigned = (1.0 - pulls.iter().map(|c| c.weight).sum::<f64>()).max(0.0);
        let outcomes: f64 = pulls
            .iter()
            .map(|c| {
                let listed: f64 = c
                    .outcomes
                    .iter()
                    .map(|o| o.rate * (o.value - mean).powi(2))
                    .sum();
                listed + c.unlisted_rate() * mean * mean
            })
            .sum();
        outcomes + unassigned * mean * mean
    }
}

/// 1/N for a pool, failing on an empty pool
fn per_card_share(pool: &Pool, demand: impl FnOnce() -> String) -> PackResult<f64> {
    if pool.is_empty() {
        return Err(PackError::ZeroPool {
            pool: pool.label(),
            demand: demand(),
        });
    }
    Ok(1.0 / pool.size() as f64)
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISPATCH
// ═══════════════════════════════════════════════════════════════════════════════

/// Tagged strategy, dispatched through `SlotValuation`
#[derive(Debug, Clone, PartialEq)]
pub enum SlotStrategy {
    Exact(ExactSlot),
    GuaranteedSlot(GuaranteedSlot),
    ProbabilityBased(ProbabilisticSlot),
}

impl SlotStrategy {
    /// Every strategy a pack is made of: guaranteed groups, probabilistic
    /// slots, then exact-rate cards when present
    pub fn plan(model: &SlotProbabilityModel, pools: &PoolIndex) -> Vec<SlotStrategy> {
        let mut plan: Vec<SlotStrategy> = model
            .guaranteed()
            .iter()
            .map(|g| SlotStrategy::GuaranteedSlot((*g).into()))
            .collect();
        plan.extend(model.slots().iter().map(|s| {
            SlotStrategy::ProbabilityBased(ProbabilisticSlot {
                distribution: s.clone(),
            })
        }));
        if !pools.exact_cards().is_empty() {
            plan.push(SlotStrategy::Exact(ExactSlot));
        }
        plan
    }

    fn valuation(&self) -> &dyn SlotValuation {
        match self {
            Self::Exact(s) => s,
            Self::GuaranteedSlot(s) => s,
            Self::ProbabilityBased(s) => s,
        }
    }
}

impl SlotValuation for SlotStrategy {
    fn kind(&self) -> StrategyKind {
        self.valuation().kind()
    }

    fn slot_name(&self) -> &str {
        self.valuation().slot_name()
    }

    fn resolve(&self, pools: &PoolIndex) -> PackResult<Vec<CategoryPulls>> {
        self.valuation().resolve(pools)
    }

    fn variance(&self, pulls: &[CategoryPulls]) -> f64 {
        self.valuation().variance(pulls)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::catalog::{CardCatalog, CardRecord};
    use crate::config::{CategoryDef, PackConfig, SlotDef};
    use crate::rarity::RarityClassifier;

    fn pools(config: &PackConfig, records: Vec<CardRecord>) -> PoolIndex {
        let classifier = RarityClassifier::new(&config.rarities, &config.tag_rules);
        let catalog = CardCatalog::ingest(records, &classifier).unwrap();
        PoolIndex::build(&catalog, config).unwrap()
    }

    fn config() -> PackConfig {
        PackConfig::new("Test")
            .with_rarity("common", RarityGroup::Common, true)
            .with_rarity("double rare", RarityGroup::Hit, false)
            .with_category("double rare", CategoryDef::rarity("double rare"))
    }

    #[test]
    fn test_guaranteed_rate_is_slots_over_pool() {
        let config = config().with_pool_size("common", 10);
        let pools = pools(&config, vec![CardRecord::new("A", "common", Some(0.25))]);
        let slot = GuaranteedSlot {
            group: RarityGroup::Common,
            slot_count: 4,
        };
        let pulls = slot.resolve(&pools).unwrap();

        assert_eq!(pulls.len(), 1);
        assert_relative_eq!(pulls[0].outcomes[0].rate, 0.4, epsilon = 1e-12);
        assert_relative_eq!(pulls[0].expected_value(), 0.10, epsilon = 1e-12);
        // 0.25² · 4 · 0.1 · 0.9
        assert_relative_eq!(slot.variance(&pulls), 0.0225, epsilon = 1e-12);
    }

    #[test]
    fn test_guaranteed_zero_pool_fails() {
        let pools = pools(&config(), Vec::new());
        let slot = GuaranteedSlot {
            group: RarityGroup::Common,
            slot_count: 4,
        };
        assert!(matches!(slot.resolve(&pools), Err(PackError::ZeroPool { .. })));

        let empty = GuaranteedSlot {
            group: RarityGroup::Common,
            slot_count: 0,
        };
        assert!(empty.resolve(&pools).unwrap()[0].outcomes.is_empty());
    }

    #[test]
    fn test_probabilistic_rate_and_variance() {
        let config = config()
            .with_category("common", CategoryDef::group(RarityGroup::Common))
            .with_slot("rare", SlotDef::new().with("double rare", 0.2).with("common", 0.8));
        let pools = pools(
            &config,
            vec![
                CardRecord::new("DR", "double rare", Some(5.0)),
                CardRecord::new("C", "common", Some(0.0)),
            ],
        );
        let model = SlotProbabilityModel::from_config(&config).unwrap();
        let slot = ProbabilisticSlot {
            distribution: model.slot("rare").unwrap().clone(),
        };
        let pulls = slot.resolve(&pools).unwrap();

        let ev: f64 = pulls.iter().map(CategoryPulls::expected_value).sum();
        assert_relative_eq!(ev, 1.0, epsilon = 1e-12);
        // Bernoulli(0.2) scaled by 5: 25 · 0.2 · 0.8
        assert_relative_eq!(slot.variance(&pulls), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_probabilistic_variance_counts_unlisted_cards() {
        let config = config()
            .with_pool_size("double rare", 2)
            .with_slot("rare", SlotDef::new().with("double rare", 1.0));
        let pools = pools(&config, vec![CardRecord::new("DR", "double rare", Some(2.0))]);
        let model = SlotProbabilityModel::from_config(&config).unwrap();
        let slot = ProbabilisticSlot {
            distribution: model.slot("rare").unwrap().clone(),
        };
        let pulls = slot.resolve(&pools).unwrap();

        // Value 2 or 0 with equal odds: mean 1, variance 1
        assert_relative_eq!(pulls[0].expected_value(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(slot.variance(&pulls), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_probabilistic_variance_counts_unassigned_mass() {
        let config = config().with_slot("rare", SlotDef::new().with("double rare", 0.2));
        let pools = pools(&config, vec![CardRecord::new("DR", "double rare", Some(5.0))]);
        let model = SlotProbabilityModel::from_config(&config).unwrap();
        let slot = ProbabilisticSlot {
            distribution: model.slot("rare").unwrap().clone(),
        };
        let pulls = slot.resolve(&pools).unwrap();
        assert_relative_eq!(slot.variance(&pulls), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_probabilistic_zero_pool_with_mass_fails() {
        let config = config().with_slot("rare", SlotDef::new().with("double rare", 0.1));
        let pools = pools(&config, Vec::new());
        let model = SlotProbabilityModel::from_config(&config).unwrap();
        let slot = SlotStrategy::ProbabilityBased(ProbabilisticSlot {
            distribution: model.slot("rare").unwrap().clone(),
        });
        assert!(matches!(slot.resolve(&pools), Err(PackError::ZeroPool { .. })));
    }

    #[test]
    fn test_exact_bernoulli_variance() {
        let config = config().with_exact_rate("Promo", 0.1);
        let pools = pools(&config, vec![CardRecord::new("Promo", "common", Some(10.0))]);
        let pulls = ExactSlot.resolve(&pools).unwrap();

        assert_relative_eq!(pulls[0].expected_value(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(ExactSlot.variance(&pulls), 9.0, epsilon = 1e-12);
    }

    #[test]
    fn test_plan_orders_strategies() {
        let config = config()
            .with_guaranteed(RarityGroup::Common, 4)
            .with_slot("rare", SlotDef::new().with("double rare", 1.0))
            .with_exact_rate("Promo", 0.1);
        let pools = pools(&config, vec![CardRecord::new("Promo", "common", Some(1.0))]);
        let model = SlotProbabilityModel::from_config(&config).unwrap();
        let kinds: Vec<_> = SlotStrategy::plan(&model, &pools)
            .iter()
            .map(|s| s.kind())
            .collect();
        assert_eq!(
            kinds,
            vec![
                StrategyKind::GuaranteedSlot,
                StrategyKind::ProbabilityBased,
                StrategyKind::Exact
            ]
        );
    }
}
