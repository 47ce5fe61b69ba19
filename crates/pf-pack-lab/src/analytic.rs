//! Analytic valuation engine
//!
//! Closed-form expected value per category, special pack contributions and
//! the probability of pulling at least one hit. Deterministic: identical
//! catalog and configuration always produce bit-identical numbers.

use serde::{Deserialize, Serialize};

use crate::catalog::CardCatalog;
use crate::config::{PackConfig, PackPayoff, SpecialPackEvent};
use crate::error::{PackError, PackResult};
use crate::pools::PoolIndex;
use crate::resolver::ResolvedPulls;
use crate::strategy::StrategyKind;

/// EV of one (slot, category)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryValue {
    /// "slot/category"
    pub key: String,
    pub slot: String,
    pub category: String,
    pub kind: StrategyKind,
    pub pool_size: usize,
    /// Slot count for guaranteed groups, category probability otherwise
    pub weight: f64,
    /// Listed cards contributing
    pub cards: usize,
    /// Expected copies of listed cards per pack
    pub expected_pulls: f64,
    pub expected_value: f64,
}

/// EV contribution of one enabled special pack event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialPackValue {
    pub name: String,
    pub trigger_probability: f64,
    /// Value of the pack when it triggers
    pub payoff_value: f64,
    /// trigger_probability × payoff_value
    pub contribution: f64,
}

/// Analytic EV breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticValuation {
    pub categories: Vec<CategoryValue>,
    /// Σ category EV
    pub regular_ev: f64,
    pub special_packs: Vec<SpecialPackValue>,
    /// Σ special pack contributions
    pub special_ev: f64,
    /// regular_ev + special_ev
    pub total_ev: f64,
    /// P(at least one hit card per pack)
    pub hit_probability: f64,
}

impl AnalyticValuation {
    /// EV of one category by "slot/category" key
    pub fn category_ev(&self, key: &str) -> Option<f64> {
        self.categories
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.expected_value)
    }
}

/// Closed-form EV over a resolved pack
pub struct AnalyticValuationEngine<'a> {
    catalog: &'a CardCatalog,
    config: &'a PackConfig,
    pools: &'a PoolIndex,
}

impl<'a> AnalyticValuationEngine<'a> {
    pub fn new(catalog: &'a CardCatalog, config: &'a PackConfig, pools: &'a PoolIndex) -> Self {
        Self {
            catalog,
            config,
            pools,
        }
    }

    /// Compute the full EV breakdown
    ///
    /// Special pack mass is added on top of the regular pack; regular slot
    /// probabilities are not scaled down by the trigger probabilities.
    pub fn evaluate(&self, resolved: &ResolvedPulls) -> PackResult<AnalyticValuation> {
        let categories: Vec<CategoryValue> = resolved
            .categories()
            .map(|pulls| CategoryValue {
                key: pulls.key(),
                slot: pulls.slot.clone(),
                category: pulls.category.clone(),
                kind: pulls.kind,
                pool_size: pulls.pool_size,
                weight: pulls.weight,
                cards: pulls.outcomes.len(),
                expected_pulls: pulls.total_rate(),
                expected_value: pulls.expected_value(),
            })
            .collect();
        let regular_ev: f64 = categories.iter().map(|c| c.expected_value).sum();

        let mut special_packs = Vec::new();
        for event in self.config.active_special_packs() {
            let payoff_value = self.payoff_value(event)?;
            special_packs.push(SpecialPackValue {
                name: event.name.clone(),
                trigger_probability: event.trigger_probability,
                payoff_value,
                contribution: event.trigger_probability * payoff_value,
            });
        }
        let special_ev: f64 = special_packs.iter().map(|s| s.contribution).sum();

        let hit_probability = self.hit_probability(resolved);

        log::debug!(
            "Analytic EV '{}': regular {:.4}, special {:.6}, P(hit) {:.4}",
            self.config.name,
            regular_ev,
            special_ev,
            hit_probability
        );

        Ok(AnalyticValuation {
            categories,
            regular_ev,
            special_packs,
            special_ev,
            total_ev: regular_ev + special_ev,
            hit_probability,
        })
    }

    /// Value of a special pack when it triggers
    ///
    /// Fixed payoffs sum the named cards' base prices. Random payoffs sum
    /// `count × mean pool value`, draws being with replacement.
    pub fn payoff_value(&self, event: &SpecialPackEvent) -> PackResult<f64> {
        match &event.payoff {
            PackPayoff::Fixed { cards } => self.catalog.total_base_price(cards),
            PackPayoff::Random { draws } => {
                let mut total = 0.0;
                for draw in draws {
                    let pool = self
                        .pools
                        .resolve_label(&draw.pool)
                        .ok_or_else(|| PackError::UnknownPool(draw.pool.clone()))?;
                    if draw.count == 0 {
                        continue;
                    }
                    let mean = pool.mean_value().ok_or_else(|| PackError::ZeroPool {
                        pool: pool.label(),
                        demand: format!("special pack '{}'", event.name),
                    })?;
                    total += f64::from(draw.count) * mean;
                }
                Ok(total)
            }
        }
    }

    /// 1 − Π(1 − ep) over hit cards, each card an independent Bernoulli trial
    pub fn hit_probability(&self, resolved: &ResolvedPulls) -> f64 {
        let miss: f64 = self
            .catalog
            .iter()
            .filter(|card| card.is_hit())
            .map(|card| 1.0 - resolved.pull_rate(card.id).clamp(0.0, 1.0))
            .product();
        (1.0 - miss).clamp(0.0, 1.0)
    }
}
