//! Card catalog — immutable per-run set of priced cards

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::CardRef;
use crate::error::{PackError, PackResult, ValuationWarning};
use crate::rarity::{normalize_text, RarityClassifier, RarityGroup, SpecialTag};

/// Index of a card inside its catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CardId(pub usize);

impl CardId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Which price a pool values its cards at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceKind {
    #[default]
    Base,
    Reverse,
}

/// Upstream catalog row, as handed over by a spreadsheet or database loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRecord {
    pub name: String,
    pub rarity: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub reverse_price: Option<f64>,
    #[serde(default)]
    pub special_tag: Option<SpecialTag>,
}

impl CardRecord {
    pub fn new(name: impl Into<String>, rarity: impl Into<String>, price: Option<f64>) -> Self {
        Self {
            name: name.into(),
            rarity: rarity.into(),
            price,
            reverse_price: None,
            special_tag: None,
        }
    }

    /// Builder: set reverse-holo price
    pub fn with_reverse_price(mut self, price: f64) -> Self {
        self.reverse_price = Some(price);
        self
    }

    /// Builder: force a special tag
    pub fn with_special_tag(mut self, tag: SpecialTag) -> Self {
        self.special_tag = Some(tag);
        self
    }
}

/// A classified card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub name: String,
    pub rarity_raw: String,
    /// Normalized rarity text
    pub rarity: String,
    pub group: RarityGroup,
    pub base_price: Option<f64>,
    pub reverse_price: Option<f64>,
    pub special_tag: Option<SpecialTag>,
    pub reverse_eligible: bool,
}

impl Card {
    pub fn is_hit(&self) -> bool {
        self.group.is_hit()
    }

    pub fn price(&self, kind: PriceKind) -> Option<f64> {
        match kind {
            PriceKind::Base => self.base_price,
            PriceKind::Reverse => self.reverse_price,
        }
    }
}

/// Immutable card catalog built once per valuation run
#[derive(Debug, Clone, Default)]
pub struct CardCatalog {
    cards: Vec<Card>,
    by_name: HashMap<String, Vec<CardId>>,
    warnings: Vec<ValuationWarning>,
}

impl CardCatalog {
    /// Classify and index upstream rows
    ///
    /// Fails on a rarity with no canonical mapping or on a repeated
    /// (name, rarity) pair. Bad prices become warnings.
    pub fn ingest(
        records: impl IntoIterator<Item = CardRecord>,
        classifier: &RarityClassifier,
    ) -> PackResult<Self> {
        let mut catalog = Self::default();

        for record in records {
            let class = classifier.classify(&record.name, &record.rarity, record.special_tag)?;
            let name_key = normalize_text(&record.name);

            if let Some(ids) = catalog.by_name.get(&name_key) {
                if ids
                    .iter()
                    .any(|id| catalog.cards[id.0].rarity == class.rarity)
                {
                    return Err(PackError::DuplicateCard(format!(
                        "{} ({})",
                        record.name, record.rarity
                    )));
                }
            }

            let base_price = catalog.sanitize_price(&record.name, record.price);
            if base_price.is_none() {
                ValuationWarning::MissingPrice {
                    card: record.name.clone(),
                }
                .emit(&mut catalog.warnings);
            }
            let reverse_price = catalog.sanitize_price(&record.name, record.reverse_price);

            let id = CardId(catalog.cards.len());
            catalog.by_name.entry(name_key).or_default().push(id);
            catalog.cards.push(Card {
                id,
                name: record.name,
                rarity_raw: record.rarity,
                rarity: class.rarity,
                group: class.group,
                base_price,
                reverse_price,
                special_tag: class.special_tag,
                reverse_eligible: class.reverse_eligible,
            });
        }

        log::debug!("Ingested {} cards", catalog.cards.len());
        Ok(catalog)
    }

    /// Parse a JSON array of `CardRecord` and ingest it
    pub fn from_json(json: &str, classifier: &RarityClassifier) -> PackResult<Self> {
        let records: Vec<CardRecord> =
            serde_json::from_str(json).map_err(|e| PackError::Parse(e.to_string()))?;
        Self::ingest(records, classifier)
    }

    fn sanitize_price(&mut self, card: &str, price: Option<f64>) -> Option<f64> {
        match price {
            Some(value) if value.is_finite() && value >= 0.0 => Some(value),
            Some(value) => {
                ValuationWarning::InvalidPrice {
                    card: card.to_string(),
                    value,
                }
                .emit(&mut self.warnings);
                None
            }
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn get(&self, id: CardId) -> Option<&Card> {
        self.cards.get(id.0)
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn iter(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter()
    }

    /// First card with this name
    pub fn find(&self, name: &str) -> Option<&Card> {
        self.by_name
            .get(&normalize_text(name))
            .and_then(|ids| ids.first())
            .and_then(|id| self.get(*id))
    }

    /// Card with this name and rarity
    pub fn find_with_rarity(&self, name: &str, rarity: &str) -> Option<&Card> {
        let rarity = normalize_text(rarity);
        self.by_name
            .get(&normalize_text(name))?
            .iter()
            .filter_map(|id| self.get(*id))
            .find(|card| card.rarity == rarity)
    }

    /// Every card with this name
    pub fn find_all(&self, name: &str) -> Vec<&Card> {
        self.by_name
            .get(&normalize_text(name))
            .map(|ids| ids.iter().filter_map(|id| self.get(*id)).collect())
            .unwrap_or_default()
    }

    /// Card named by a reference, narrowed by rarity when given
    pub fn resolve_ref(&self, card_ref: &CardRef) -> PackResult<&Card> {
        match &card_ref.rarity {
            Some(rarity) => self.find_with_rarity(&card_ref.name, rarity),
            None => self.find(&card_ref.name),
        }
        .ok_or_else(|| PackError::UnknownCard(card_ref.name.clone()))
    }

    /// Σ base price of the referenced cards, unpriced cards counting 0
    pub fn total_base_price(&self, cards: &[CardRef]) -> PackResult<f64> {
        let mut total = 0.0;
        for card_ref in cards {
            total += self.resolve_ref(card_ref)?.base_price.unwrap_or(0.0);
        }
        Ok(total)
    }

    /// Data-quality warnings raised during ingestion
    pub fn warnings(&self) -> &[ValuationWarning] {
        &self.warnings
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::rarity::{default_tag_rules, RarityRule};

    fn classifier() -> RarityClassifier {
        let mut rarities = BTreeMap::new();
        rarities.insert("common".to_string(), RarityRule::new(RarityGroup::Common, true));
        rarities.insert("double rare".to_string(), RarityRule::new(RarityGroup::Hit, false));
        RarityClassifier::new(&rarities, &default_tag_rules())
    }

    #[test]
    fn test_total_base_price_resolves_refs() {
        let catalog = CardCatalog::ingest(
            vec![
                CardRecord::new("Pikachu", "Common", Some(0.5)),
                CardRecord::new("Pikachu", "Double Rare", Some(6.0)),
                CardRecord::new("Pawmi", "Common", None),
            ],
            &classifier(),
        )
        .unwrap();

        let lineup = vec![
            CardRef {
                name: "pikachu".into(),
                rarity: Some("DOUBLE RARE".into()),
            },
            CardRef::named("Pikachu"),
            CardRef::named("Pawmi"),
        ];
        assert_eq!(catalog.total_base_price(&lineup).unwrap(), 6.5);
        assert_eq!(
            catalog.total_base_price(&[CardRef::named("Mew")]),
            Err(PackError::UnknownCard("Mew".into()))
        );
    }

    #[test]
    fn test_ingest_assigns_ids_and_groups() {
        let catalog = CardCatalog::ingest(
            vec![
                CardRecord::new("Sprigatito", "Common", Some(0.10)),
                CardRecord::new("Miraidon ex", "Double Rare", Some(4.0)),
            ],
            &classifier(),
        )
        .unwrap();

        assert_eq!(catalog.len(), 2);
        let miraidon = catalog.find("miraidon EX").unwrap();
        assert_eq!(miraidon.id, CardId(1));
        assert_eq!(miraidon.group, RarityGroup::Hit);
        assert!(miraidon.is_hit());
        assert!(catalog.warnings().is_empty());
    }

    #[test]
    fn test_unknown_rarity_fails_ingest() {
        let result = CardCatalog::ingest(
            vec![CardRecord::new("Mew", "Shiny Rare", Some(1.0))],
            &classifier(),
        );
        assert!(matches!(result, Err(PackError::UnknownRarity(_))));
    }

    #[test]
    fn test_same_name_different_rarity_allowed() {
        let catalog = CardCatalog::ingest(
            vec![
                CardRecord::new("Pikachu", "Common", Some(0.2)),
                CardRecord::new("Pikachu", "Double Rare", Some(3.0)),
            ],
            &classifier(),
        )
        .unwrap();
        assert_eq!(catalog.find_all("Pikachu").len(), 2);
        assert_eq!(
            catalog.find_with_rarity("Pikachu", "double rare").unwrap().base_price,
            Some(3.0)
        );
    }

    #[test]
    fn test_duplicate_card_rejected() {
        let result = CardCatalog::ingest(
            vec![
                CardRecord::new("Pikachu", "Common", Some(0.2)),
                CardRecord::new("pikachu", "common", Some(0.3)),
            ],
            &classifier(),
        );
        assert!(matches!(result, Err(PackError::DuplicateCard(_))));
    }

    #[test]
    fn test_bad_prices_become_warnings() {
        let catalog = CardCatalog::ingest(
            vec![
                CardRecord::new("A", "Common", None),
                CardRecord::new("B", "Common", Some(-1.0)),
                CardRecord::new("C", "Common", Some(0.5)).with_reverse_price(f64::NAN),
            ],
            &classifier(),
        )
        .unwrap();

        assert_eq!(catalog.find("B").unwrap().base_price, None);
        assert_eq!(catalog.find("C").unwrap().reverse_price, None);
        let missing = catalog
            .warnings()
            .iter()
            .filter(|w| matches!(w, ValuationWarning::MissingPrice { .. }))
            .count();
        let invalid = catalog
            .warnings()
            .iter()
            .filter(|w| matches!(w, ValuationWarning::InvalidPrice { .. }))
            .count();
        assert_eq!(missing, 2);
        assert_eq!(invalid, 2);
    }

    #[test]
    fn test_from_json() {
        let json = r#"[
            {"name": "Pikachu", "rarity": "Common", "price": 0.25, "reverse_price": 0.5},
            {"name": "Pikachu Master Ball", "rarity": "Common", "price": 40.0}
        ]"#;
        let catalog = CardCatalog::from_json(json, &classifier()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.find("Pikachu Master Ball").unwrap().special_tag,
            Some(SpecialTag::MasterBall)
        );
        assert_eq!(catalog.find("Pikachu").unwrap().price(PriceKind::Reverse), Some(0.5));
    }
}
