//! Effective probability resolver
//!
//! Turns slot-level odds into per-card, per-pack pull probabilities. A card
//! reachable through several slots (a common that can also land in a reverse
//! slot) accumulates one rate per path; the per-card total is their sum.

use serde::Serialize;

use crate::catalog::{CardCatalog, CardId};
use crate::error::PackResult;
use crate::pools::PoolIndex;
use crate::slots::SlotProbabilityModel;
use crate::strategy::{CategoryPulls, SlotStrategy, SlotValuation};

/// One strategy with its resolved categories
#[derive(Debug, Clone)]
pub struct ResolvedSlot {
    pub strategy: SlotStrategy,
    pub categories: Vec<CategoryPulls>,
}

impl ResolvedSlot {
    pub fn expected_value(&self) -> f64 {
        self.categories.iter().map(CategoryPulls::expected_value).sum()
    }

    pub fn variance(&self) -> f64 {
        self.strategy.variance(&self.categories)
    }
}

/// Resolved pull paths for one pack
#[derive(Debug, Clone)]
pub struct ResolvedPulls {
    slots: Vec<ResolvedSlot>,
    per_card: Vec<f64>,
}

impl ResolvedPulls {
    pub fn slots(&self) -> &[ResolvedSlot] {
        &self.slots
    }

    /// All categories in strategy order
    pub fn categories(&self) -> impl Iterator<Item = &CategoryPulls> {
        self.slots.iter().flat_map(|s| s.categories.iter())
    }

    /// Expected copies of `card` per pack, summed across every path
    pub fn pull_rate(&self, card: CardId) -> f64 {
        self.per_card.get(card.index()).copied().unwrap_or(0.0)
    }

    /// Per-card rates indexed by `CardId`
    pub fn pull_rates(&self) -> &[f64] {
        &self.per_card
    }

    /// Card rates above zero, highest first
    pub fn top_cards(&self, limit: usize) -> Vec<CardRate> {
        let mut rates: Vec<CardRate> = self
            .per_card
            .iter()
            .enumerate()
            .filter(|(_, rate)| **rate > 0.0)
            .map(|(i, rate)| CardRate {
                card: CardId(i),
                rate: *rate,
            })
            .collect();
        rates.sort_by(|a, b| b.rate.total_cmp(&a.rate).then(a.card.cmp(&b.card)));
        rates.truncate(limit);
        rates
    }
}

/// Per-card aggregated pull rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CardRate {
    pub card: CardId,
    pub rate: f64,
}

/// Resolves per-card pull rates from the slot model and pool index
pub struct EffectiveProbabilityResolver<'a> {
    catalog: &'a CardCatalog,
    model: &'a SlotProbabilityModel,
    pools: &'a PoolIndex,
}

impl<'a> EffectiveProbabilityResolver<'a> {
    pub fn new(
        catalog: &'a CardCatalog,
        model: &'a SlotProbabilityModel,
        pools: &'a PoolIndex,
    ) -> Self {
        Self {
            catalog,
            model,
            pools,
        }
    }

    /// Resolve every strategy of the pack
    ///
    /// Fails with `ZeroPool` when a slot puts mass on an empty pool.
    pub fn resolve(&self) -> PackResult<ResolvedPulls> {
        let mut per_card = vec![0.0; self.catalog.len()];
        let mut slots = Vec::new();

        for strategy in SlotStrategy::plan(self.model, self.pools) {
            let categories = strategy.resolve(self.pools)?;
            for pulls in &categories {
                for outcome in &pulls.outcomes {
                    if let Some(rate) = per_card.get_mut(outcome.card.index()) {
                        *rate += outcome.rate;
                    }
                }
            }
            slots.push(ResolvedSlot {
                strategy,
                categories,
            });
        }

        log::debug!(
            "Resolved {} strategies over {} cards",
            slots.len(),
            per_card.len()
        );

        Ok(ResolvedPulls { slots, per_card })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::catalog::CardRecord;
    use crate::config::{CategoryDef, PackConfig, SlotDef};
    use crate::rarity::{RarityClassifier, RarityGroup};

    fn resolve(config: &PackConfig, records: Vec<CardRecord>) -> (CardCatalog, ResolvedPulls) {
        let classifier = RarityClassifier::new(&config.rarities, &config.tag_rules);
        let catalog = CardCatalog::ingest(records, &classifier).unwrap();
        let model = SlotProbabilityModel::from_config(config).unwrap();
        let pools = PoolIndex::build(&catalog, config).unwrap();
        let resolved = EffectiveProbabilityResolver::new(&catalog, &model, &pools)
            .resolve()
            .unwrap();
        (catalog, resolved)
    }

    #[test]
    fn test_card_rate_sums_paths() {
        let config = PackConfig::new("Test")
            .with_rarity("common", RarityGroup::Common, true)
            .with_guaranteed(RarityGroup::Common, 4)
            .with_pool_size("common", 10)
            .with_category("regular", CategoryDef::reverse())
            .with_pool_size("regular", 20)
            .with_slot("reverse_1", SlotDef::new().with_fallback("regular"));
        let (catalog, resolved) = resolve(
            &config,
            vec![CardRecord::new("A", "common", Some(0.1)).with_reverse_price(0.5)],
        );
        let a = catalog.find("A").unwrap().id;

        // 4/10 from the guaranteed slots, 1/20 from the reverse slot
        assert_relative_eq!(resolved.pull_rate(a), 0.45, epsilon = 1e-12);
        assert_eq!(resolved.categories().count(), 2);
        assert_eq!(resolved.top_cards(5), vec![CardRate { card: a, rate: resolved.pull_rate(a) }]);
    }

    #[test]
    fn test_double_rare_rate() {
        let config = PackConfig::new("Test")
            .with_rarity("double rare", RarityGroup::Hit, false)
            .with_category("double rare", CategoryDef::rarity("double rare"))
            .with_pool_size("double rare", 5)
            .with_slot("rare", SlotDef::new().with("double rare", 0.5));
        let (catalog, resolved) = resolve(&config, vec![CardRecord::new("DR", "double rare", Some(10.0))]);
        let dr = catalog.find("DR").unwrap().id;

        assert_relative_eq!(resolved.pull_rate(dr), 0.1, epsilon = 1e-12);
        assert_relative_eq!(resolved.slots()[0].expected_value(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_pool_propagates() {
        let config = PackConfig::new("Test")
            .with_rarity("common", RarityGroup::Common, true)
            .with_guaranteed(RarityGroup::Common, 1);
        let classifier = RarityClassifier::new(&config.rarities, &config.tag_rules);
        let catalog = CardCatalog::ingest(Vec::new(), &classifier).unwrap();
        let model = SlotProbabilityModel::from_config(&config).unwrap();
        let pools = PoolIndex::build(&catalog, &config).unwrap();
        let resolver = EffectiveProbabilityResolver::new(&catalog, &model, &pools);
        assert!(resolver.resolve().is_err());
    }
}
