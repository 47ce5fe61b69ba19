//! Slot probability model — validated categorical distributions per slot

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::PackConfig;
use crate::error::{check_probability, PackError, PackResult, ValuationWarning};
use crate::rarity::RarityGroup;

/// Allowed deviation of a slot's probability sum from 1
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// One category outcome of a probabilistic slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotCategory {
    pub label: String,
    pub probability: f64,
}

impl SlotCategory {
    pub fn new(label: impl Into<String>, probability: f64) -> Self {
        Self {
            label: label.into(),
            probability,
        }
    }
}

/// Categorical distribution of a single probabilistic slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotDistribution {
    name: String,
    categories: Vec<SlotCategory>,
    fallback: Option<String>,
}

impl SlotDistribution {
    /// Build from explicit categories. Each probability must lie in [0, 1].
    pub fn new(name: impl Into<String>, categories: Vec<SlotCategory>) -> PackResult<Self> {
        let name = name.into();
        for category in &categories {
            check_probability(format!("{}/{}", name, category.label), category.probability)?;
        }
        Ok(Self {
            name,
            categories,
            fallback: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn categories(&self) -> &[SlotCategory] {
        &self.categories
    }

    /// Category holding the residual "regular" mass, if any
    pub fn fallback(&self) -> Option<&str> {
        self.fallback.as_deref()
    }

    pub fn probability(&self, label: &str) -> Option<f64> {
        self.categories
            .iter()
            .find(|c| c.label == label)
            .map(|c| c.probability)
    }

    /// Sum of all category probabilities
    pub fn total(&self) -> f64 {
        self.categories.iter().map(|c| c.probability).sum()
    }

    pub fn is_normalized(&self) -> bool {
        (self.total() - 1.0).abs() <= PROBABILITY_TOLERANCE
    }

    /// Draw a category index. `None` when the draw lands in unassigned mass,
    /// which only happens if the probabilities sum to less than 1.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        let u: f64 = rng.random();
        let mut cumulative = 0.0;
        for (index, category) in self.categories.iter().enumerate() {
            cumulative += category.probability;
            if u < cumulative {
                return Some(index);
            }
        }
        None
    }
}

/// Guaranteed slot count for one rarity group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuaranteedSlotGroup {
    pub group: RarityGroup,
    pub slot_count: u32,
}

/// Validated slot model for one pack
#[derive(Debug, Clone, Default)]
pub struct SlotProbabilityModel {
    guaranteed: Vec<GuaranteedSlotGroup>,
    slots: Vec<SlotDistribution>,
    warnings: Vec<ValuationWarning>,
}

impl SlotProbabilityModel {
    /// Build and validate from configuration
    ///
    /// Unknown categories and out-of-range probabilities fail. A slot whose
    /// probabilities do not sum to 1 only raises a warning.
    pub fn from_config(config: &PackConfig) -> PackResult<Self> {
        let mut warnings = Vec::new();

        let guaranteed = config
            .guaranteed
            .iter()
            .map(|(group, count)| GuaranteedSlotGroup {
                group: *group,
                slot_count: *count,
            })
            .collect();

        let mut slots = Vec::with_capacity(config.slots.len());
        for (slot_name, def) in &config.slots {
            let mut categories = Vec::with_capacity(def.categories.len() + 1);
            for (label, p) in &def.categories {
                if !config.categories.contains_key(label) {
                    return Err(PackError::UnknownCategory {
                        slot: slot_name.clone(),
                        category: label.clone(),
                    });
                }
                categories.push(SlotCategory::new(label.clone(), *p));
            }

            if let Some(fallback) = &def.fallback {
                if !config.categories.contains_key(fallback) {
                    return Err(PackError::UnknownCategory {
                        slot: slot_name.clone(),
                        category: fallback.clone(),
                    });
                }
                if !def.categories.contains_key(fallback) {
                    let assigned: f64 = categories.iter().map(|c| c.probability).sum();
                    let residual = 1.0 - assigned;
                    let mass = if residual < -PROBABILITY_TOLERANCE {
                        ValuationWarning::ResidualClamped {
                            slot: slot_name.clone(),
                            category: fallback.clone(),
                            residual,
                        }
                        .emit(&mut warnings);
                        0.0
                    } else {
                        residual.max(0.0)
                    };
                    categories.push(SlotCategory::new(fallback.clone(), mass));
                }
            }

            let mut distribution = SlotDistribution::new(slot_name.clone(), categories)?;
            distribution.fallback = def.fallback.clone();

            if !distribution.is_normalized() {
                ValuationWarning::ProbabilitySum {
                    slot: slot_name.clone(),
                    sum: distribution.total(),
                }
                .emit(&mut warnings);
            }
            slots.push(distribution);
        }

        log::debug!(
            "Slot model '{}': {} guaranteed groups, {} probabilistic slots",
            config.name,
            config.guaranteed.len(),
            slots.len()
        );

        Ok(Self {
            guaranteed,
            slots,
            warnings,
        })
    }

    pub fn guaranteed(&self) -> &[GuaranteedSlotGroup] {
        &self.guaranteed
    }

    pub fn slots(&self) -> &[SlotDistribution] {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> Option<&SlotDistribution> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// Cards per regular pack
    pub fn total_slot_count(&self) -> u32 {
        self.guaranteed.iter().map(|g| g.slot_count).sum::<u32>() + self.slots.len() as u32
    }

    /// Slots failing the sum-to-one check
    pub fn unnormalized_slots(&self) -> Vec<&SlotDistribution> {
        self.slots.iter().filter(|s| !s.is_normalized()).collect()
    }

    pub fn warnings(&self) -> &[ValuationWarning] {
        &self.warnings
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::config::{CategoryDef, SlotDef};

    fn config() -> PackConfig {
        PackConfig::new("Test")
            .with_guaranteed(RarityGroup::Common, 4)
            .with_guaranteed(RarityGroup::Uncommon, 3)
            .with_category("rare", CategoryDef::rarity("rare"))
            .with_category("double rare", CategoryDef::rarity("double rare"))
            .with_category("ultra rare", CategoryDef::rarity("ultra rare"))
    }

    #[test]
    fn test_fallback_receives_residual() {
        let config = config().with_slot(
            "rare",
            SlotDef::new()
                .with("double rare", 0.2)
                .with("ultra rare", 0.05)
                .with_fallback("rare"),
        );
        let model = SlotProbabilityModel::from_config(&config).unwrap();
        let slot = model.slot("rare").unwrap();

        assert!((slot.probability("rare").unwrap() - 0.75).abs() < 1e-12);
        assert!(slot.is_normalized());
        assert_eq!(slot.fallback(), Some("rare"));
        assert!(model.warnings().is_empty());
        assert_eq!(model.total_slot_count(), 8);
    }

    #[test]
    fn test_unnormalized_slot_warns_but_builds() {
        let config = config().with_slot(
            "rare",
            SlotDef::new().with("double rare", 0.2).with("rare", 0.7),
        );
        let model = SlotProbabilityModel::from_config(&config).unwrap();

        assert_eq!(model.unnormalized_slots().len(), 1);
        assert!(matches!(
            model.warnings()[0],
            ValuationWarning::ProbabilitySum { ref slot, .. } if slot == "rare"
        ));
    }

    #[test]
    fn test_overfull_slot_clamps_fallback() {
        let config = config().with_slot(
            "rare",
            SlotDef::new()
                .with("double rare", 0.8)
                .with("ultra rare", 0.3)
                .with_fallback("rare"),
        );
        let model = SlotProbabilityModel::from_config(&config).unwrap();
        let slot = model.slot("rare").unwrap();

        assert_eq!(slot.probability("rare"), Some(0.0));
        assert!(model
            .warnings()
            .iter()
            .any(|w| matches!(w, ValuationWarning::ResidualClamped { .. })));
        assert!(model
            .warnings()
            .iter()
            .any(|w| matches!(w, ValuationWarning::ProbabilitySum { .. })));
    }

    #[test]
    fn test_unknown_category_fails() {
        let config = config().with_slot("rare", SlotDef::new().with_fallback("mystery"));
        assert!(matches!(
            SlotProbabilityModel::from_config(&config),
            Err(PackError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn test_sample_respects_cumulative_mass() {
        let slot = SlotDistribution::new(
            "s",
            vec![SlotCategory::new("a", 0.0), SlotCategory::new("b", 1.0)],
        )
        .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..1000 {
            assert_eq!(slot.sample(&mut rng), Some(1));
        }

        let empty = SlotDistribution::new("e", vec![SlotCategory::new("a", 0.0)]).unwrap();
        assert_eq!(empty.sample(&mut rng), None);
    }
}
