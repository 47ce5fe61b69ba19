//! Analytic vs simulated reconciliation

use serde::{Deserialize, Serialize};

use crate::analytic::AnalyticValuation;
use crate::simulation::SimulationReport;

/// Default |z| bound for agreement
pub const DEFAULT_Z_THRESHOLD: f64 = 4.0;

/// Per-category comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryReconciliation {
    pub key: String,
    pub analytic_ev: f64,
    pub simulated_ev: f64,
    pub difference: f64,
}

/// Agreement between closed-form EV and the simulated mean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Total EV when the simulation rolled special packs, regular EV otherwise
    pub analytic_ev: f64,
    pub simulated_mean: f64,
    /// σ / √N of the simulated mean
    pub standard_error: f64,
    pub z_score: f64,
    pub z_threshold: f64,
    pub within_tolerance: bool,
    pub categories: Vec<CategoryReconciliation>,
}

impl Reconciliation {
    pub fn compare(analytic: &AnalyticValuation, simulation: &SimulationReport) -> Self {
        Self::compare_with_threshold(analytic, simulation, DEFAULT_Z_THRESHOLD)
    }

    pub fn compare_with_threshold(
        analytic: &AnalyticValuation,
        simulation: &SimulationReport,
        z_threshold: f64,
    ) -> Self {
        let analytic_ev = if simulation.include_special_packs {
            analytic.total_ev
        } else {
            analytic.regular_ev
        };
        let difference = simulation.mean - analytic_ev;
        let standard_error = simulation.standard_error();
        let z_score = if standard_error > 0.0 {
            difference / standard_error
        } else if difference.abs() < 1e-9 {
            0.0
        } else {
            f64::INFINITY.copysign(difference)
        };

        let categories = analytic
            .categories
            .iter()
            .map(|category| {
                let simulated_ev = simulation
                    .category(&category.key)
                    .map(|c| c.mean_value)
                    .unwrap_or(0.0);
                CategoryReconciliation {
                    key: category.key.clone(),
                    analytic_ev: category.expected_value,
                    simulated_ev,
                    difference: simulated_ev - category.expected_value,
                }
            })
            .collect();

        let within_tolerance = simulation.completed_trials > 0 && z_score.abs() <= z_threshold;
        if !within_tolerance {
            log::warn!(
                "Simulated mean {:.4} disagrees with analytic EV {:.4} (z = {:.2})",
                simulation.mean,
                analytic_ev,
                z_score
            );
        }

        Self {
            analytic_ev,
            simulated_mean: simulation.mean,
            standard_error,
            z_score,
            z_threshold,
            within_tolerance,
            categories,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytic::CategoryValue;
    use crate::simulation::CategoryStats;
    use crate::strategy::StrategyKind;

    fn analytic(ev: f64) -> AnalyticValuation {
        AnalyticValuation {
            categories: vec![CategoryValue {
                key: "guaranteed/common".into(),
                slot: "guaranteed".into(),
                category: "common".into(),
                kind: StrategyKind::GuaranteedSlot,
                pool_size: 1,
                weight: 4.0,
                cards: 1,
                expected_pulls: 4.0,
                expected_value: ev,
            }],
            regular_ev: ev,
            special_packs: Vec::new(),
            special_ev: 0.0,
            total_ev: ev,
            hit_probability: 0.0,
        }
    }

    fn report(mean: f64, std_dev: f64, trials: u64) -> SimulationReport {
        SimulationReport {
            requested_trials: trials,
            completed_trials: trials,
            cancelled: false,
            seed: 0,
            include_special_packs: false,
            mean,
            std_dev,
            variance: std_dev * std_dev,
            min: mean,
            max: mean,
            percentiles: Vec::new(),
            categories: vec![CategoryStats {
                key: "guaranteed/common".into(),
                slot: "guaranteed".into(),
                category: "common".into(),
                pulls: trials * 4,
                total_value: mean * trials as f64,
                degraded_draws: 0,
                mean_value: mean,
            }],
            special_packs: Vec::new(),
            degraded_draws: 0,
        }
    }

    #[test]
    fn test_exact_agreement_without_spread() {
        let r = Reconciliation::compare(&analytic(4.0), &report(4.0, 0.0, 100));
        assert_eq!(r.z_score, 0.0);
        assert!(r.within_tolerance);
        assert_eq!(r.categories[0].difference, 0.0);
    }

    #[test]
    fn test_z_score_uses_standard_error() {
        // SE = 1 / √100 = 0.1
        let r = Reconciliation::compare(&analytic(4.0), &report(4.3, 1.0, 100));
        assert!((r.z_score - 3.0).abs() < 1e-9);
        assert!(r.within_tolerance);

        let r = Reconciliation::compare(&analytic(4.0), &report(4.5, 1.0, 100));
        assert!(!r.within_tolerance);
    }

    #[test]
    fn test_mismatch_without_spread_fails() {
        let r = Reconciliation::compare(&analytic(4.0), &report(5.0, 0.0, 100));
        assert!(r.z_score.is_infinite());
        assert!(!r.within_tolerance);
    }
}
