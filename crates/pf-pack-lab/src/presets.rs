//! Built-in pack layouts
//!
//! Probabilities are community-measured pull rates and only a starting
//! point; real products should load their own table through `ConfigParser`.

use crate::config::{CardRef, CategoryDef, PackConfig, PoolDraw, SlotDef, SpecialPackEvent};
use crate::rarity::{RarityGroup, SpecialTag};

/// Get all built-in presets
pub fn all_presets() -> Vec<PackConfig> {
    vec![scarlet_violet_booster(), ball_pattern_booster()]
}

fn base_rarities(config: PackConfig) -> PackConfig {
    config
        .with_rarity("Common", RarityGroup::Common, true)
        .with_rarity("Uncommon", RarityGroup::Uncommon, true)
        .with_rarity("Rare", RarityGroup::Rare, true)
        .with_rarity("Double Rare", RarityGroup::Hit, false)
        .with_rarity("Ultra Rare", RarityGroup::Hit, false)
        .with_rarity("Illustration Rare", RarityGroup::Hit, false)
        .with_rarity("Special Illustration Rare", RarityGroup::Hit, false)
        .with_rarity("Hyper Rare", RarityGroup::Hit, false)
        .with_rarity("ACE SPEC Rare", RarityGroup::Other, false)
}

/// Modern-era booster: 4 common, 3 uncommon, a rare slot and two reverse slots
pub fn scarlet_violet_booster() -> PackConfig {
    base_rarities(PackConfig::new("Scarlet & Violet Booster"))
        .with_guaranteed(RarityGroup::Common, 4)
        .with_guaranteed(RarityGroup::Uncommon, 3)
        .with_category("rare", CategoryDef::rarity("rare"))
        .with_category("double rare", CategoryDef::rarity("double rare"))
        .with_category("ultra rare", CategoryDef::rarity("ultra rare"))
        .with_category("illustration rare", CategoryDef::rarity("illustration rare"))
        .with_category(
            "special illustration rare",
            CategoryDef::rarity("special illustration rare"),
        )
        .with_category("hyper rare", CategoryDef::rarity("hyper rare"))
        .with_category("ace spec", CategoryDef::special(SpecialTag::AceSpec))
        .with_category("regular", CategoryDef::reverse())
        .with_slot(
            "rare",
            SlotDef::new()
                .with("double rare", 0.1667)
                .with("ultra rare", 0.0667)
                .with("special illustration rare", 0.0313)
                .with("hyper rare", 0.0185)
                .with_fallback("rare"),
        )
        .with_slot(
            "reverse_1",
            SlotDef::new().with("ace spec", 0.05).with_fallback("regular"),
        )
        .with_slot(
            "reverse_2",
            SlotDef::new()
                .with("illustration rare", 0.0769)
                .with_fallback("regular"),
        )
}

/// Booster whose reverse slots carry Poké Ball and Master Ball pattern cards
pub fn ball_pattern_booster() -> PackConfig {
    base_rarities(PackConfig::new("Ball Pattern Booster"))
        .with_guaranteed(RarityGroup::Common, 4)
        .with_guaranteed(RarityGroup::Uncommon, 3)
        .with_category("rare", CategoryDef::rarity("rare"))
        .with_category("double rare", CategoryDef::rarity("double rare"))
        .with_category("ultra rare", CategoryDef::rarity("ultra rare"))
        .with_category("illustration rare", CategoryDef::rarity("illustration rare"))
        .with_category(
            "special illustration rare",
            CategoryDef::rarity("special illustration rare"),
        )
        .with_category("poke ball", CategoryDef::special(SpecialTag::PokeBall))
        .with_category("master ball", CategoryDef::special(SpecialTag::MasterBall))
        .with_category("regular", CategoryDef::reverse())
        .with_slot(
            "rare",
            SlotDef::new()
                .with("double rare", 0.1667)
                .with("ultra rare", 0.0667)
                .with("special illustration rare", 0.0313)
                .with_fallback("rare"),
        )
        .with_slot(
            "reverse_1",
            SlotDef::new().with("poke ball", 0.3333).with_fallback("regular"),
        )
        .with_slot(
            "reverse_2",
            SlotDef::new()
                .with("illustration rare", 0.0769)
                .with("master ball", 0.05)
                .with_fallback("regular"),
        )
        .with_special_pack(god_pack_example())
}

/// Disabled god pack: every card an illustration rare, drawn with replacement
pub fn god_pack_example() -> SpecialPackEvent {
    SpecialPackEvent::random(
        "god pack",
        1.0 / 2000.0,
        vec![
            PoolDraw {
                pool: "illustration rare".into(),
                count: 9,
            },
            PoolDraw {
                pool: "special illustration rare".into(),
                count: 1,
            },
        ],
    )
    .with_enabled(false)
}

/// Fixed-list god pack for a known chase lineup
pub fn fixed_god_pack(name: &str, trigger_probability: f64, cards: &[&str]) -> SpecialPackEvent {
    SpecialPackEvent::fixed(
        name,
        trigger_probability,
        cards.iter().map(|c| CardRef::named(*c)).collect(),
    )
}
