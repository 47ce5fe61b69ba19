//! Monte Carlo pack opening simulator
//!
//! Opens packs by direct sampling, independent of the analytic path:
//!
//! 1. Guaranteed groups: `slot_count` uniform draws with replacement
//! 2. Probabilistic slots: draw a category, then one uniform card
//! 3. Exact-rate cards: one Bernoulli trial each
//! 4. Special packs (opt-in): roll each enabled event, add its payoff on top
//!
//! Trials are split into fixed-size chunks. Each chunk owns a ChaCha8 stream
//! derived from the base seed and its index, so a seeded run returns the
//! same report whether chunks execute on one thread or many.

use std::sync::atomic::{AtomicBool, Ordering};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::catalog::CardCatalog;
use crate::config::{PackConfig, PackPayoff};
use crate::error::{PackError, PackResult};
use crate::pools::{Pool, PoolIndex};
use crate::slots::{SlotDistribution, SlotProbabilityModel};
use crate::stats;
use crate::strategy::{category_key, EXACT_SLOT, GUARANTEED_SLOT};

/// Percentile ranks reported by every run
pub const PERCENTILE_RANKS: [f64; 5] = [5.0, 25.0, 50.0, 75.0, 95.0];

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// Simulation run settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub trials: u64,
    /// Base seed; random when `None`
    pub seed: Option<u64>,
    /// Run chunks on the rayon pool
    pub parallel: bool,
    /// Trials per chunk
    pub chunk_size: u64,
    /// Roll enabled special pack events per trial
    pub include_special_packs: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            trials: 100_000,
            seed: None,
            parallel: true,
            chunk_size: 10_000,
            include_special_packs: false,
        }
    }
}

impl SimulationConfig {
    /// Builder: set trial count
    pub fn with_trials(mut self, trials: u64) -> Self {
        self.trials = trials;
        self
    }

    /// Builder: fix the seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builder: toggle parallel execution
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Builder: set chunk size
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Builder: include special pack events
    pub fn with_special_packs(mut self, include: bool) -> Self {
        self.include_special_packs = include;
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPORT
// ═══════════════════════════════════════════════════════════════════════════════

/// Simulated pulls of one (slot, category)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    /// "slot/category"
    pub key: String,
    pub slot: String,
    pub category: String,
    pub pulls: u64,
    pub total_value: f64,
    /// Draws that hit an empty pool and were valued at 0
    pub degraded_draws: u64,
    /// total_value / completed trials
    pub mean_value: f64,
}

/// How often a special pack event triggered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialPackHits {
    pub name: String,
    pub hits: u64,
}

/// One percentile point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentile {
    pub rank: f64,
    pub value: f64,
}

/// Distribution of simulated pack values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub requested_trials: u64,
    pub completed_trials: u64,
    pub cancelled: bool,
    pub seed: u64,
    pub include_special_packs: bool,
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
    pub percentiles: Vec<Percentile>,
    pub categories: Vec<CategoryStats>,
    pub special_packs: Vec<SpecialPackHits>,
    pub degraded_draws: u64,
}

impl SimulationReport {
    /// Value at a reported percentile rank
    pub fn percentile(&self, rank: f64) -> Option<f64> {
        self.percentiles
            .iter()
            .find(|p| (p.rank - rank).abs() < f64::EPSILON)
            .map(|p| p.value)
    }

    /// Simulated stats for one "slot/category" key
    pub fn category(&self, key: &str) -> Option<&CategoryStats> {
        self.categories.iter().find(|c| c.key == key)
    }

    /// Standard error of the mean
    pub fn standard_error(&self) -> f64 {
        if self.completed_trials == 0 {
            return 0.0;
        }
        self.std_dev / (self.completed_trials as f64).sqrt()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SAMPLING PLAN
// ═══════════════════════════════════════════════════════════════════════════════

/// Flattened pool: listed values plus the uniform-draw denominator
#[derive(Debug, Clone)]
struct DrawPool {
    values: Vec<f64>,
    size: usize,
}

impl DrawPool {
    fn from_pool(pool: &Pool) -> Self {
        Self {
            values: pool.members().iter().map(|m| m.value).collect(),
            size: pool.size(),
        }
    }

    /// One uniform draw. `None` when the pool is empty.
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<f64> {
        if self.size == 0 {
            return None;
        }
        let index = rng.random_range(0..self.size);
        Some(self.values.get(index).copied().unwrap_or(0.0))
    }
}

#[derive(Debug, Clone)]
struct GuaranteedDraw {
    tally: usize,
    count: u32,
    pool: DrawPool,
}

#[derive(Debug, Clone)]
struct SlotDraw {
    distribution: SlotDistribution,
    /// (tally index, pool) aligned with the distribution's categories
    outcomes: Vec<(usize, DrawPool)>,
}

#[derive(Debug, Clone)]
struct ExactDraw {
    tally: usize,
    /// (probability, value) per card
    cards: Vec<(f64, f64)>,
}

#[derive(Debug, Clone)]
enum SpecialPayoff {
    Fixed(f64),
    Random(Vec<(u32, DrawPool)>),
}

#[derive(Debug, Clone)]
struct SpecialDraw {
    name: String,
    trigger_probability: f64,
    payoff: SpecialPayoff,
}

/// Per-category accumulator
#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    pulls: u64,
    value: f64,
    degraded: u64,
}

impl Tally {
    fn merge(&mut self, other: &Tally) {
        self.pulls += other.pulls;
        self.value += other.value;
        self.degraded += other.degraded;
    }
}

/// Partial result of one chunk
#[derive(Debug, Clone, Default)]
struct ChunkResult {
    values: Vec<f64>,
    tallies: Vec<Tally>,
    special_hits: Vec<u64>,
    cancelled: bool,
}

impl ChunkResult {
    fn new(tallies: usize, specials: usize, capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            tallies: vec![Tally::default(); tallies],
            special_hits: vec![0; specials],
            cancelled: false,
        }
    }

    fn merge(&mut self, other: ChunkResult) {
        self.values.extend(other.values);
        for (mine, theirs) in self.tallies.iter_mut().zip(&other.tallies) {
            mine.merge(theirs);
        }
        for (mine, theirs) in self.special_hits.iter_mut().zip(&other.special_hits) {
            *mine += theirs;
        }
        self.cancelled |= other.cancelled;
    }

    fn record(&mut self, tally: usize, value: Option<f64>) -> f64 {
        let Some(entry) = self.tallies.get_mut(tally) else {
            return 0.0;
        };
        match value {
            Some(value) => {
                entry.pulls += 1;
                entry.value += value;
                value
            }
            None => {
                entry.degraded += 1;
                0.0
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIMULATOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Stochastic pack opener
///
/// Owns a flattened sampling plan so chunks can share it across threads.
#[derive(Debug, Clone)]
pub struct MonteCarloSimulator {
    keys: Vec<(String, String)>,
    guaranteed: Vec<GuaranteedDraw>,
    slots: Vec<SlotDraw>,
    exact: Option<ExactDraw>,
    specials: Vec<SpecialDraw>,
}

impl MonteCarloSimulator {
    /// Build the sampling plan
    ///
    /// Empty pools are accepted here; drawing from one degrades that draw
    /// to 0. Special pack references must resolve.
    pub fn new(
        catalog: &CardCatalog,
        config: &PackConfig,
        model: &SlotProbabilityModel,
        pools: &PoolIndex,
    ) -> PackResult<Self> {
        let mut keys = Vec::new();

        let mut guaranteed = Vec::with_capacity(model.guaranteed().len());
        for group in model.guaranteed() {
            let pool = pools
                .group(group.group)
                .ok_or_else(|| PackError::UnknownPool(group.group.to_string()))?;
            keys.push((GUARANTEED_SLOT.to_string(), group.group.to_string()));
            guaranteed.push(GuaranteedDraw {
                tally: keys.len() - 1,
                count: group.slot_count,
                pool: DrawPool::from_pool(pool),
            });
        }

        let mut slots = Vec::with_capacity(model.slots().len());
        for distribution in model.slots() {
            let mut outcomes = Vec::with_capacity(distribution.categories().len());
            for category in distribution.categories() {
                let pool = pools
                    .category(&category.label)
                    .ok_or_else(|| PackError::UnknownCategory {
                        slot: distribution.name().to_string(),
                        category: category.label.clone(),
                    })?;
                keys.push((distribution.name().to_string(), category.label.clone()));
                outcomes.push((keys.len() - 1, DrawPool::from_pool(pool)));
            }
            slots.push(SlotDraw {
                distribution: distribution.clone(),
                outcomes,
            });
        }

        let exact = if pools.exact_cards().is_empty() {
            None
        } else {
            keys.push((EXACT_SLOT.to_string(), EXACT_SLOT.to_string()));
            Some(ExactDraw {
                tally: keys.len() - 1,
                cards: pools
                    .exact_cards()
                    .iter()
                    .map(|e| (e.probability, e.value))
                    .collect(),
            })
        };

        let mut specials = Vec::new();
        for event in config.active_special_packs() {
            let payoff = match &event.payoff {
                PackPayoff::Fixed { cards } => {
                    SpecialPayoff::Fixed(catalog.total_base_price(cards)?)
                }
                PackPayoff::Random { draws } => {
                    let mut plan = Vec::with_capacity(draws.len());
                    for draw in draws {
                        let pool = pools
                            .resolve_label(&draw.pool)
                            .ok_or_else(|| PackError::UnknownPool(draw.pool.clone()))?;
                        plan.push((draw.count, DrawPool::from_pool(pool)));
                    }
                    SpecialPayoff::Random(plan)
                }
            };
            specials.push(SpecialDraw {
                name: event.name.clone(),
                trigger_probability: event.trigger_probability,
                payoff,
            });
        }

        Ok(Self {
            keys,
            guaranteed,
            slots,
            exact,
            specials,
        })
    }

    /// Run to completion
    pub fn run(&self, config: &SimulationConfig) -> SimulationReport {
        self.run_with_cancel(config, &AtomicBool::new(false))
    }

    /// Run until done or until `cancel` is raised
    ///
    /// Cancellation is checked between trials; completed trials are kept.
    pub fn run_with_cancel(&self, config: &SimulationConfig, cancel: &AtomicBool) -> SimulationReport {
        let seed = config.seed.unwrap_or_else(rand::random);
        let chunk_size = config.chunk_size.max(1);
        let chunks = config.trials.div_ceil(chunk_size);

        log::info!(
            "Simulating {} packs (seed {}, {} chunks, parallel: {})",
            config.trials,
            seed,
            chunks,
            config.parallel
        );

        let run_chunk = |chunk: usize| {
            let chunk = chunk as u64;
            let start = chunk * chunk_size;
            let trials = chunk_size.min(config.trials - start);
            self.run_chunk(seed, chunk, trials, config.include_special_packs, cancel)
        };

        let partials: Vec<ChunkResult> = if config.parallel {
            (0..chunks as usize).into_par_iter().map(run_chunk).collect()
        } else {
            (0..chunks as usize).map(run_chunk).collect()
        };

        let mut total = ChunkResult::new(self.keys.len(), self.specials.len(), 0);
        for partial in partials {
            total.merge(partial);
        }

        let report = self.summarize(config, seed, total);
        if report.cancelled {
            log::warn!(
                "Simulation cancelled after {} of {} trials",
                report.completed_trials,
                report.requested_trials
            );
        }
        log::debug!(
            "Simulated mean {:.4} ± {:.4} over {} trials",
            report.mean,
            report.std_dev,
            report.completed_trials
        );
        report
    }

    fn run_chunk(
        &self,
        seed: u64,
        chunk: u64,
        trials: u64,
        include_special_packs: bool,
        cancel: &AtomicBool,
    ) -> ChunkResult {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(chunk);

        let mut result = ChunkResult::new(self.keys.len(), self.specials.len(), trials as usize);
        for _ in 0..trials {
            if cancel.load(Ordering::Relaxed) {
                result.cancelled = true;
                break;
            }
            let value = self.open_pack(&mut rng, include_special_packs, &mut result);
            result.values.push(value);
        }
        result
    }

    /// Simulate one pack and return its value
    fn open_pack<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        include_special_packs: bool,
        acc: &mut ChunkResult,
    ) -> f64 {
        let mut value = 0.0;

        for group in &self.guaranteed {
            for _ in 0..group.count {
                let draw = group.pool.draw(rng);
                value += acc.record(group.tally, draw);
            }
        }

        for slot in &self.slots {
            // Unassigned mass of an under-full slot yields no card
            if let Some((tally, pool)) = slot
                .distribution
                .sample(rng)
                .and_then(|index| slot.outcomes.get(index))
            {
                let draw = pool.draw(rng);
                value += acc.record(*tally, draw);
            }
        }

        if let Some(exact) = &self.exact {
            for (probability, card_value) in &exact.cards {
                if rng.random::<f64>() < *probability {
                    value += acc.record(exact.tally, Some(*card_value));
                }
            }
        }

        if include_special_packs {
            for (index, special) in self.specials.iter().enumerate() {
                if rng.random::<f64>() >= special.trigger_probability {
                    continue;
                }
                acc.special_hits[index] += 1;
                value += match &special.payoff {
                    SpecialPayoff::Fixed(total) => *total,
                    SpecialPayoff::Random(draws) => draws
                        .iter()
                        .map(|(count, pool)| {
                            (0..*count)
                                .map(|_| pool.draw(rng).unwrap_or(0.0))
                                .sum::<f64>()
                        })
                        .sum(),
                };
            }
        }

        value
    }

    fn summarize(&self, config: &SimulationConfig, seed: u64, total: ChunkResult) -> SimulationReport {
        let completed = total.values.len() as u64;
        let (mean, std_dev) = stats::mean_std_dev(&total.values);

        let mut sorted = total.values;
        sorted.sort_by(f64::total_cmp);
        let min = sorted.first().copied().unwrap_or(0.0);
        let max = sorted.last().copied().unwrap_or(0.0);
        let percentiles = PERCENTILE_RANKS
            .iter()
            .map(|&rank| Percentile {
                rank,
                value: stats::percentile(&sorted, rank),
            })
            .collect();

        let per_trial = |v: f64| if completed > 0 { v / completed as f64 } else { 0.0 };
        let categories: Vec<CategoryStats> = self
            .keys
            .iter()
            .zip(&total.tallies)
            .map(|((slot, category), tally)| CategoryStats {
                key: category_key(slot, category),
                slot: slot.clone(),
                category: category.clone(),
                pulls: tally.pulls,
                total_value: tally.value,
                degraded_draws: tally.degraded,
                mean_value: per_trial(tally.value),
            })
            .collect();
        let degraded_draws = categories.iter().map(|c| c.degraded_draws).sum();

        let special_packs = self
            .specials
            .iter()
            .zip(&total.special_hits)
            .map(|(special, hits)| SpecialPackHits {
                name: special.name.clone(),
                hits: *hits,
            })
            .collect();

        SimulationReport {
            requested_trials: config.trials,
            completed_trials: completed,
            cancelled: total.cancelled,
            seed,
            include_special_packs: config.include_special_packs,
            mean,
            std_dev,
            variance: std_dev * std_dev,
            min,
            max,
            percentiles,
            categories,
            special_packs,
            degraded_draws,
        }
    }
}
