//! Pack valuator — one entry point from configuration to `ValuationResult`
//!
//! ```text
//! PackConfig + CardRecords
//!     → RarityClassifier → CardCatalog
//!     → SlotProbabilityModel + PoolIndex
//!     → EffectiveProbabilityResolver
//!     → AnalyticValuationEngine + VarianceEngine
//!     → (optional) MonteCarloSimulator → Reconciliation
//! ```
//!
//! Construction fails fast on any structural configuration error, so a
//! built `PackValuator` always produces a result.

use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;

use serde::Serialize;

use crate::analytic::{AnalyticValuation, AnalyticValuationEngine, CategoryValue, SpecialPackValue};
use crate::catalog::{CardCatalog, CardRecord};
use crate::config::PackConfig;
use crate::error::{PackError, PackResult, ValuationWarning};
use crate::pools::PoolIndex;
use crate::rarity::RarityClassifier;
use crate::reconcile::Reconciliation;
use crate::resolver::{EffectiveProbabilityResolver, ResolvedPulls};
use crate::simulation::{MonteCarloSimulator, SimulationConfig, SimulationReport};
use crate::slots::SlotProbabilityModel;
use crate::validator::{ProbabilityValidator, SlotValidation, ValidatorConfig};
use crate::variance::{SlotVariance, VarianceEngine, VarianceReport};

/// Full valuation output, handed to an external reporting collaborator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationResult {
    pub name: String,
    pub categories: Vec<CategoryValue>,
    pub regular_ev: f64,
    pub special_packs: Vec<SpecialPackValue>,
    pub total_ev: f64,
    pub pack_price: Option<f64>,
    /// total_ev − pack_price
    pub net_value: Option<f64>,
    /// (total_ev − pack_price) / pack_price
    pub roi: Option<f64>,
    pub hit_probability: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub slot_variances: Vec<SlotVariance>,
    pub simulation: Option<SimulationReport>,
    pub reconciliation: Option<Reconciliation>,
    pub warnings: Vec<ValuationWarning>,
}

impl ValuationResult {
    /// "slot/category" → EV
    pub fn category_ev(&self) -> BTreeMap<String, f64> {
        self.categories
            .iter()
            .map(|c| (c.key.clone(), c.expected_value))
            .collect()
    }

    pub fn to_json_pretty(&self) -> PackResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| PackError::Parse(e.to_string()))
    }
}

/// Owns one run's immutable model and its deterministic results
pub struct PackValuator {
    config: PackConfig,
    catalog: CardCatalog,
    model: SlotProbabilityModel,
    pools: PoolIndex,
    resolved: ResolvedPulls,
    analytic: AnalyticValuation,
    variance: VarianceReport,
}

impl PackValuator {
    /// Build every component and compute the analytic path
    pub fn new(
        config: PackConfig,
        records: impl IntoIterator<Item = CardRecord>,
    ) -> PackResult<Self> {
        let classifier = RarityClassifier::new(&config.rarities, &config.tag_rules);
        let catalog = CardCatalog::ingest(records, &classifier)?;
        Self::with_catalog(config, catalog)
    }

    /// Build from an already ingested catalog
    pub fn with_catalog(config: PackConfig, catalog: CardCatalog) -> PackResult<Self> {
        config.validate()?;
        let model = SlotProbabilityModel::from_config(&config)?;
        let pools = PoolIndex::build(&catalog, &config)?;
        let resolved = EffectiveProbabilityResolver::new(&catalog, &model, &pools).resolve()?;
        let analytic = AnalyticValuationEngine::new(&catalog, &config, &pools).evaluate(&resolved)?;
        let variance = VarianceEngine::new().evaluate(&resolved);

        log::info!(
            "Valued '{}': {} cards, EV {:.4}, σ {:.4}, P(hit) {:.4}",
            config.name,
            catalog.len(),
            analytic.total_ev,
            variance.std_dev,
            analytic.hit_probability
        );

        Ok(Self {
            config,
            catalog,
            model,
            pools,
            resolved,
            analytic,
            variance,
        })
    }

    pub fn config(&self) -> &PackConfig {
        &self.config
    }

    pub fn catalog(&self) -> &CardCatalog {
        &self.catalog
    }

    pub fn model(&self) -> &SlotProbabilityModel {
        &self.model
    }

    pub fn pools(&self) -> &PoolIndex {
        &self.pools
    }

    /// Per-card pull rates and per-strategy pulls
    pub fn resolved(&self) -> &ResolvedPulls {
        &self.resolved
    }

    pub fn analytic(&self) -> &AnalyticValuation {
        &self.analytic
    }

    pub fn variance(&self) -> &VarianceReport {
        &self.variance
    }

    /// Every data-quality warning raised while building
    pub fn warnings(&self) -> Vec<ValuationWarning> {
        self.catalog
            .warnings()
            .iter()
            .chain(self.model.warnings())
            .chain(self.pools.warnings())
            .cloned()
            .collect()
    }

    /// Analytic result, priced against `pack_price` when given
    pub fn valuate(&self, pack_price: Option<f64>) -> ValuationResult {
        let pack_price = pack_price.filter(|p| p.is_finite());
        let total_ev = self.analytic.total_ev;
        ValuationResult {
            name: self.config.name.clone(),
            categories: self.analytic.categories.clone(),
            regular_ev: self.analytic.regular_ev,
            special_packs: self.analytic.special_packs.clone(),
            total_ev,
            pack_price,
            net_value: pack_price.map(|price| total_ev - price),
            roi: pack_price
                .filter(|price| *price > 0.0)
                .map(|price| (total_ev - price) / price),
            hit_probability: self.analytic.hit_probability,
            variance: self.variance.variance,
            std_dev: self.variance.std_dev,
            slot_variances: self.variance.slots.clone(),
            simulation: None,
            reconciliation: None,
            warnings: self.warnings(),
        }
    }

    pub fn simulator(&self) -> PackResult<MonteCarloSimulator> {
        MonteCarloSimulator::new(&self.catalog, &self.config, &self.model, &self.pools)
    }

    pub fn simulate(&self, config: &SimulationConfig) -> PackResult<SimulationReport> {
        Ok(self.simulator()?.run(config))
    }

    pub fn simulate_with_cancel(
        &self,
        config: &SimulationConfig,
        cancel: &AtomicBool,
    ) -> PackResult<SimulationReport> {
        Ok(self.simulator()?.run_with_cancel(config, cancel))
    }

    /// Analytic result plus a simulation and its reconciliation
    pub fn valuate_with_simulation(
        &self,
        pack_price: Option<f64>,
        config: &SimulationConfig,
    ) -> PackResult<ValuationResult> {
        let report = self.simulate(config)?;
        let mut result = self.valuate(pack_price);
        result.reconciliation = Some(Reconciliation::compare(&self.analytic, &report));
        result.simulation = Some(report);
        Ok(result)
    }

    /// Chi-square pre-flight over every probabilistic slot
    pub fn validate_probabilities(&self, config: &ValidatorConfig) -> Vec<SlotValidation> {
        ProbabilityValidator::new(config.clone()).validate_model(&self.model)
    }
}
