//! Probability validator — chi-square goodness of fit per slot
//!
//! Draws category outcomes straight from each slot distribution, without
//! opening packs, and compares observed counts to `p × samples`. A failing
//! slot points at a configuration typo rather than at the EV math.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::slots::{SlotDistribution, SlotProbabilityModel, PROBABILITY_TOLERANCE};
use crate::stats;

/// Label of the bucket collecting unassigned probability mass
pub const UNASSIGNED: &str = "(unassigned)";

/// Validator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Draws per slot
    pub samples: u64,
    /// Base seed; random when `None`
    pub seed: Option<u64>,
    /// Per-category relative error above which a category is flagged
    pub max_relative_error: f64,
    /// Slot fails when its p-value falls below this
    pub significance: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            samples: 500_000,
            seed: None,
            max_relative_error: 0.02,
            significance: 0.05,
        }
    }
}

impl ValidatorConfig {
    pub fn with_samples(mut self, samples: u64) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Observed vs expected for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCheck {
    pub label: String,
    pub probability: f64,
    pub expected: f64,
    pub observed: u64,
    pub observed_frequency: f64,
    /// |observed − expected| / expected
    pub relative_error: f64,
    pub flagged: bool,
}

/// Goodness-of-fit verdict for one slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotValidation {
    pub slot: String,
    pub samples: u64,
    pub probability_sum: f64,
    /// Σ p within tolerance of 1
    pub sum_ok: bool,
    pub chi_square: f64,
    pub degrees_of_freedom: usize,
    pub p_value: f64,
    pub categories: Vec<CategoryCheck>,
    /// Samples drawn, sum_ok and p_value ≥ significance
    pub passed: bool,
}

impl SlotValidation {
    /// Categories beyond the relative error threshold
    pub fn flagged_categories(&self) -> impl Iterator<Item = &CategoryCheck> {
        self.categories.iter().filter(|c| c.flagged)
    }
}

/// Pre-flight check of slot distributions
#[derive(Debug, Clone, Default)]
pub struct ProbabilityValidator {
    config: ValidatorConfig,
}

impl ProbabilityValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Validate every probabilistic slot; each slot gets its own stream
    pub fn validate_model(&self, model: &SlotProbabilityModel) -> Vec<SlotValidation> {
        let seed = self.config.seed.unwrap_or_else(rand::random);
        model
            .slots()
            .iter()
            .enumerate()
            .map(|(index, slot)| self.validate_with_stream(slot, seed, index as u64))
            .collect()
    }

    /// Validate one slot distribution
    pub fn validate_slot(&self, slot: &SlotDistribution) -> SlotValidation {
        let seed = self.config.seed.unwrap_or_else(rand::random);
        self.validate_with_stream(slot, seed, 0)
    }

    fn validate_with_stream(&self, slot: &SlotDistribution, seed: u64, stream: u64) -> SlotValidation {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(stream);

        let samples = self.config.samples;
        let categories = slot.categories();
        let mut observed = vec![0u64; categories.len()];
        let mut unassigned = 0u64;
        for _ in 0..samples {
            match slot.sample(&mut rng) {
                Some(index) => observed[index] += 1,
                None => unassigned += 1,
            }
        }

        let n = samples as f64;
        let mut checks: Vec<CategoryCheck> = categories
            .iter()
            .zip(&observed)
            .map(|(category, &count)| self.check(&category.label, category.probability, count, n))
            .collect();

        let probability_sum = slot.total();
        let residual = 1.0 - probability_sum;
        if residual > PROBABILITY_TOLERANCE || unassigned > 0 {
            checks.push(self.check(UNASSIGNED, residual.max(0.0), unassigned, n));
        }

        let mut chi_square = 0.0;
        let mut buckets = 0usize;
        for check in &checks {
            if check.expected > 0.0 {
                chi_square += (check.observed as f64 - check.expected).powi(2) / check.expected;
                buckets += 1;
            } else if check.observed > 0 {
                chi_square = f64::INFINITY;
            }
        }
        let degrees_of_freedom = buckets.saturating_sub(1);
        let p_value = stats::chi_square_survival(chi_square, degrees_of_freedom);

        let sum_ok = slot.is_normalized();
        // No draws is no evidence
        let passed = samples > 0 && sum_ok && p_value >= self.config.significance;

        if passed {
            log::debug!(
                "Slot '{}' passed: χ² = {:.3}, df = {}, p = {:.4}",
                slot.name(),
                chi_square,
                degrees_of_freedom,
                p_value
            );
        } else {
            log::warn!(
                "Slot '{}' failed validation: sum = {:.8}, χ² = {:.3}, df = {}, p = {:.4}",
                slot.name(),
                probability_sum,
                chi_square,
                degrees_of_freedom,
                p_value
            );
        }

        SlotValidation {
            slot: slot.name().to_string(),
            samples,
            probability_sum,
            sum_ok,
            chi_square,
            degrees_of_freedom,
            p_value,
            categories: checks,
            passed,
        }
    }

    fn check(&self, label: &str, probability: f64, observed: u64, n: f64) -> CategoryCheck {
        let expected = probability * n;
        let relative_error = if expected > 0.0 {
            (observed as f64 - expected).abs() / expected
        } else if observed > 0 {
            f64::INFINITY
        } else {
            0.0
        };
        CategoryCheck {
            label: label.to_string(),
            probability,
            expected,
            observed,
            observed_frequency: if n > 0.0 { observed as f64 / n } else { 0.0 },
            relative_error,
            flagged: relative_error > self.config.max_relative_error,
        }
    }
}
