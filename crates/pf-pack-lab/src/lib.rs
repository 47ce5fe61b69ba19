//! # pf-pack-lab — Trading Card Pack Valuation Engine
//!
//! Estimates what a sealed booster pack is worth: the expected value of its
//! contents, the spread around it, and the chance of pulling a hit.
//!
//! ## Features
//!
//! - **Effective Pull Rates**: per-card, per-pack probabilities summed across every slot a card can land in
//! - **Analytic EV**: closed-form EV per category, special pack contributions, hit probability
//! - **Variance**: independent-slot decomposition per strategy
//! - **Monte Carlo**: seeded, chunked, rayon-parallel pack opening with percentiles
//! - **Validation**: chi-square goodness of fit for every slot distribution
//! - **Configuration**: JSON/YAML pack layouts plus built-in presets
//!
//! ## Architecture
//!
//! ```text
//! PackConfig ──► SlotProbabilityModel ──┐
//!                                       ├──► EffectiveProbabilityResolver
//! CardRecords ─► CardCatalog ─► PoolIndex┘            │
//!                                          ┌──────────┴──────────┐
//!                                          v                     v
//!                           AnalyticValuationEngine        VarianceEngine
//!                                          │
//!                                          v
//!                     ValuationResult ◄── Reconciliation ◄── MonteCarloSimulator
//! ```

pub mod analytic;
pub mod catalog;
pub mod config;
pub mod error;
pub mod parser;
pub mod pools;
pub mod presets;
pub mod rarity;
pub mod reconcile;
pub mod resolver;
pub mod simulation;
pub mod slots;
pub mod stats;
pub mod strategy;
pub mod validator;
pub mod valuation;
pub mod variance;

pub use analytic::*;
pub use catalog::*;
pub use config::*;
pub use error::*;
pub use parser::{ConfigFormat, ConfigLimits, ConfigParser};
pub use pools::*;
pub use rarity::*;
pub use reconcile::*;
pub use resolver::*;
pub use simulation::*;
pub use slots::*;
pub use strategy::*;
pub use validator::*;
pub use valuation::*;
pub use variance::*;
