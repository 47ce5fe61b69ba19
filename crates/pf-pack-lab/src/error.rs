//! Error and warning types for pack valuation
//!
//! Two severities exist:
//! - `PackError` — structural configuration problems. Fatal, returned before
//!   any EV is computed.
//! - `ValuationWarning` — data-quality caveats. Accumulated on the result so the
//!   caller can decide whether to trust the numbers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal configuration error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PackError {
    #[error("Unknown rarity: '{0}' has no canonical mapping")]
    UnknownRarity(String),

    #[error("Zero-size pool '{pool}' referenced by {demand}")]
    ZeroPool { pool: String, demand: String },

    #[error("Invalid probability {value} for '{context}'")]
    InvalidProbability { context: String, value: f64 },

    #[error("Slot '{slot}' references undefined category '{category}'")]
    UnknownCategory { slot: String, category: String },

    #[error("Invalid slot name '{0}': reserved or contains '/'")]
    InvalidSlotName(String),

    #[error("Unknown card: {0}")]
    UnknownCard(String),

    #[error("Unknown pool: {0}")]
    UnknownPool(String),

    #[error("Duplicate card in catalog: {0}")]
    DuplicateCard(String),

    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Result type alias
pub type PackResult<T> = Result<T, PackError>;

/// Checks that `value` is a usable probability
pub(crate) fn check_probability(context: impl Into<String>, value: f64) -> PackResult<f64> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(PackError::InvalidProbability {
            context: context.into(),
            value,
        })
    }
}

/// Non-fatal data-quality warning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValuationWarning {
    /// Slot probabilities do not sum to 1 within tolerance
    ProbabilitySum { slot: String, sum: f64 },

    /// Card has no base price; valued at 0
    MissingPrice { card: String },

    /// Card sits in a reverse-priced pool without a reverse price; valued at 0
    MissingReversePrice { card: String },

    /// Price was negative or not finite; treated as missing
    InvalidPrice { card: String, value: f64 },

    /// Configured pool size is smaller than the number of catalog cards in it
    PoolSizeBelowCatalog {
        pool: String,
        configured: usize,
        observed: usize,
    },

    /// Fallback residual mass was negative and clamped to 0
    ResidualClamped {
        slot: String,
        category: String,
        residual: f64,
    },
}

impl ValuationWarning {
    /// Log the warning and append it to `sink`
    pub(crate) fn emit(self, sink: &mut Vec<ValuationWarning>) {
        log::warn!("{}", self);
        sink.push(self);
    }
}

impl std::fmt::Display for ValuationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProbabilitySum { slot, sum } => {
                write!(f, "slot '{}' probabilities sum to {:.8}, expected 1", slot, sum)
            }
            Self::MissingPrice { card } => write!(f, "card '{}' has no price, valued at 0", card),
            Self::MissingReversePrice { card } => {
                write!(f, "card '{}' has no reverse price, valued at 0", card)
            }
            Self::InvalidPrice { card, value } => {
                write!(f, "card '{}' has invalid price {}, treated as missing", card, value)
            }
            Self::PoolSizeBelowCatalog {
                pool,
                configured,
                observed,
            } => write!(
                f,
                "pool '{}' configured with {} cards but catalog lists {}; using {}",
                pool, configured, observed, observed
            ),
            Self::ResidualClamped {
                slot,
                category,
                residual,
            } => write!(
                f,
                "fallback '{}' in slot '{}' has residual {:.8}, clamped to 0",
                category, slot, residual
            ),
        }
    }
}
