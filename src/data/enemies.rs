use serde::{Deserialize, Serialize};

/// Enemy tiers, ordered weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyTier {
    Street,
    Veteran,
    Elite,
}

impl EnemyTier {
    pub fn label(&self) -> &'static str {
        match self {
            EnemyTier::Street => "Street Thug",
            EnemyTier::Veteran => "Veteran Enforcer",
            EnemyTier::Elite => "Elite Hitman",
        }
    }
}

/// One row of a tier's loot table.
#[derive(Debug, Clone, Copy)]
pub struct LootEntry {
    pub item_id: &'static str,
    pub drop_chance: f64,
    /// Inclusive quantity range; a rolled 0 drops nothing.
    pub quantity: (u32, u32),
}

/// Static description of one tier.
#[derive(Debug, Clone, Copy)]
pub struct TierSpec {
    pub tier: EnemyTier,
    /// Roll weight; the table is consumed by cumulative probability.
    pub weight: f64,
    pub power: (u32, u32),
    pub loot: &'static [LootEntry],
}

const STREET_LOOT: &[LootEntry] = &[
    LootEntry {
        item_id: "bandage",
        drop_chance: 0.4,
        quantity: (1, 2),
    },
    LootEntry {
        item_id: "switchblade",
        drop_chance: 0.05,
        quantity: (1, 1),
    },
];

const VETERAN_LOOT: &[LootEntry] = &[
    LootEntry {
        item_id: "bandage",
        drop_chance: 0.5,
        quantity: (1, 3),
    },
    LootEntry {
        item_id: "first-aid-kit",
        drop_chance: 0.2,
        quantity: (1, 1),
    },
    LootEntry {
        item_id: "brass-knuckles",
        drop_chance: 0.08,
        quantity: (1, 1),
    },
    LootEntry {
        item_id: "leather-jacket",
        drop_chance: 0.05,
        quantity: (1, 1),
    },
];

const ELITE_LOOT: &[LootEntry] = &[
    LootEntry {
        item_id: "first-aid-kit",
        drop_chance: 0.35,
        quantity: (1, 2),
    },
    LootEntry {
        item_id: "adrenaline-shot",
        drop_chance: 0.15,
        quantity: (1, 1),
    },
    LootEntry {
        item_id: "bulletproof-vest",
        drop_chance: 0.05,
        quantity: (1, 1),
    },
    LootEntry {
        item_id: "sawn-off-shotgun",
        drop_chance: 0.05,
        quantity: (1, 1),
    },
    LootEntry {
        item_id: "gold-chain",
        drop_chance: 0.1,
        quantity: (1, 1),
    },
];

pub const TIER_TABLE: [TierSpec; 3] = [
    TierSpec {
        tier: EnemyTier::Street,
        weight: 0.6,
        power: (5, 15),
        loot: STREET_LOOT,
    },
    TierSpec {
        tier: EnemyTier::Veteran,
        weight: 0.3,
        power: (15, 35),
        loot: VETERAN_LOOT,
    },
    TierSpec {
        tier: EnemyTier::Elite,
        weight: 0.1,
        power: (35, 60),
        loot: ELITE_LOOT,
    },
];

/// Every defeated enemy also drops cash scaled to its power.
pub const MONEY_DROP_CHANCE: f64 = 0.8;
pub const MONEY_POWER_MULTIPLIER: (u32, u32) = (1, 3);

/// Resolves a unit roll against the cumulative tier weights.
pub fn roll_tier(roll: f64) -> &'static TierSpec {
    let mut cumulative = 0.0;
    for spec in &TIER_TABLE {
        cumulative += spec.weight;
        if roll < cumulative {
            return spec;
        }
    }
    &TIER_TABLE[TIER_TABLE.len() - 1]
}

pub fn spec_for(tier: EnemyTier) -> &'static TierSpec {
    match tier {
        EnemyTier::Street => &TIER_TABLE[0],
        EnemyTier::Veteran => &TIER_TABLE[1],
        EnemyTier::Elite => &TIER_TABLE[2],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_weights_sum_to_one() {
        let total: f64 = TIER_TABLE.iter().map(|spec| spec.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cumulative_roll_picks_expected_tiers() {
        assert_eq!(roll_tier(0.0).tier, EnemyTier::Street);
        assert_eq!(roll_tier(0.59).tier, EnemyTier::Street);
        assert_eq!(roll_tier(0.6).tier, EnemyTier::Veteran);
        assert_eq!(roll_tier(0.89).tier, EnemyTier::Veteran);
        assert_eq!(roll_tier(0.9).tier, EnemyTier::Elite);
        assert_eq!(roll_tier(0.95).tier, EnemyTier::Elite);
    }

    #[test]
    fn highest_tier_roll_stays_in_its_power_range() {
        let spec = roll_tier(0.95);
        assert_eq!(spec.tier, EnemyTier::Elite);
        assert_eq!(spec.power, (35, 60));
    }

    #[test]
    fn spec_lookup_matches_table_order() {
        for spec in &TIER_TABLE {
            assert_eq!(spec_for(spec.tier).tier, spec.tier);
        }
    }

    #[test]
    fn loot_table_ids_exist_in_the_item_catalog() {
        let catalog = crate::data::items::ItemCatalog::builtin();
        for spec in &TIER_TABLE {
            for entry in spec.loot {
                assert!(catalog.contains(entry.item_id), "{}", entry.item_id);
            }
        }
    }
}
