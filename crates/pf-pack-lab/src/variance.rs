//! Variance engine — independent-slot decomposition
//!
//! Pack variance is the sum of per-strategy variances; no covariance terms.
//! Special pack events are not part of the decomposition.

use serde::{Deserialize, Serialize};

use crate::resolver::ResolvedPulls;
use crate::strategy::{SlotValuation, StrategyKind};

/// Variance of one strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotVariance {
    pub slot: String,
    pub kind: StrategyKind,
    pub expected_value: f64,
    pub variance: f64,
}

/// Analytic variance of one pack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceReport {
    pub slots: Vec<SlotVariance>,
    pub variance: f64,
    pub std_dev: f64,
}

/// Sums per-slot variance terms
#[derive(Debug, Default)]
pub struct VarianceEngine;

impl VarianceEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, resolved: &ResolvedPulls) -> VarianceReport {
        let slots: Vec<SlotVariance> = resolved
            .slots()
            .iter()
            .map(|slot| SlotVariance {
                slot: slot.strategy.slot_name().to_string(),
                kind: slot.strategy.kind(),
                expected_value: slot.expected_value(),
                variance: slot.variance().max(0.0),
            })
            .collect();

        let variance = slots.iter().map(|s| s.variance).sum::<f64>().max(0.0);
        VarianceReport {
            slots,
            variance,
            std_dev: variance.sqrt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::catalog::{CardCatalog, CardRecord};
    use crate::config::{CategoryDef, PackConfig, SlotDef};
    use crate::pools::PoolIndex;
    use crate::rarity::{RarityClassifier, RarityGroup};
    use crate::resolver::EffectiveProbabilityResolver;
    use crate::slots::SlotProbabilityModel;

    fn report(config: &PackConfig, records: Vec<CardRecord>) -> VarianceReport {
        let classifier = RarityClassifier::new(&config.rarities, &config.tag_rules);
        let catalog = CardCatalog::ingest(records, &classifier).unwrap();
        let model = SlotProbabilityModel::from_config(config).unwrap();
        let pools = PoolIndex::build(&catalog, config).unwrap();
        let resolved = EffectiveProbabilityResolver::new(&catalog, &model, &pools)
            .resolve()
            .unwrap();
        VarianceEngine::new().evaluate(&resolved)
    }

    #[test]
    fn test_single_card_pool_has_no_variance() {
        let config = PackConfig::new("One")
            .with_rarity("common", RarityGroup::Common, true)
            .with_guaranteed(RarityGroup::Common, 4);
        let report = report(&config, vec![CardRecord::new("A", "common", Some(1.0))]);
        assert_eq!(report.variance, 0.0);
        assert_eq!(report.std_dev, 0.0);
    }

    #[test]
    fn test_slot_variances_add() {
        let config = PackConfig::new("Two")
            .with_rarity("common", RarityGroup::Common, true)
            .with_rarity("double rare", RarityGroup::Hit, false)
            .with_guaranteed(RarityGroup::Common, 4)
            .with_pool_size("common", 10)
            .with_category("double rare", CategoryDef::rarity("double rare"))
            .with_slot("rare", SlotDef::new().with("double rare", 0.2));
        let report = report(
            &config,
            vec![
                CardRecord::new("C", "common", Some(0.25)),
                CardRecord::new("DR", "double rare", Some(5.0)),
            ],
        );

        // 0.0225 from the commons, 25 · 0.2 · 0.8 from the rare slot
        assert_eq!(report.slots.len(), 2);
        assert_relative_eq!(report.slots[0].variance, 0.0225, epsilon = 1e-12);
        assert_relative_eq!(report.slots[1].variance, 4.0, epsilon = 1e-12);
        assert_relative_eq!(report.variance, 4.0225, epsilon = 1e-12);
        assert_relative_eq!(report.std_dev * report.std_dev, report.variance, epsilon = 1e-12);
    }
}
