use std::collections::HashMap;

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Equipment slot names. Exactly one item fits in each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    Head,
    Mask,
    Body,
    Gloves,
    Pants,
    Boots,
    Accessory,
    Charm,
    Weapon,
}

impl Slot {
    pub const ALL: [Slot; 9] = [
        Slot::Head,
        Slot::Mask,
        Slot::Body,
        Slot::Gloves,
        Slot::Pants,
        Slot::Boots,
        Slot::Accessory,
        Slot::Charm,
        Slot::Weapon,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Slot::Head => "Head",
            Slot::Mask => "Mask",
            Slot::Body => "Body",
            Slot::Gloves => "Gloves",
            Slot::Pants => "Pants",
            Slot::Boots => "Boots",
            Slot::Accessory => "Accessory",
            Slot::Charm => "Charm",
            Slot::Weapon => "Weapon",
        }
    }

    pub fn parse(value: &str) -> Option<Slot> {
        Slot::ALL
            .iter()
            .copied()
            .find(|slot| slot.label().eq_ignore_ascii_case(value))
    }
}

/// Flat stat bonuses contributed by a worn piece of equipment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatBonuses {
    pub max_hp: i32,
    pub defence: i32,
    pub evasion: f64,
    pub hit_rate: f64,
    pub critical: f64,
    pub damage: i32,
}

/// Minimum level/attribute values demanded before an item can be worn.
/// Zero means unconstrained.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Requirements {
    pub level: u32,
    pub influence: u32,
    pub strength: u32,
    pub agility: u32,
    pub vitality: u32,
    pub hit_rate: u32,
}

/// What an item is, with variant-specific payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ItemKind {
    /// Consumed on use; restores health.
    Consumable { heal: i32 },
    /// Sits in the inventory with no active effect.
    NonConsumable,
    /// Occupies an equipment slot while worn.
    Equipment {
        slot: Slot,
        bonuses: StatBonuses,
        requirements: Requirements,
    },
}

/// Immutable item definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
    /// Shop price in dollars; 0 means not sold anywhere.
    pub price: i64,
    pub max_stack: u32,
}

impl ItemDefinition {
    pub fn stackable(&self) -> bool {
        self.max_stack > 1
    }

    pub fn is_equipment(&self) -> bool {
        matches!(self.kind, ItemKind::Equipment { .. })
    }

    pub fn slot(&self) -> Option<Slot> {
        match &self.kind {
            ItemKind::Equipment { slot, .. } => Some(*slot),
            _ => None,
        }
    }

    pub fn bonuses(&self) -> Option<&StatBonuses> {
        match &self.kind {
            ItemKind::Equipment { bonuses, .. } => Some(bonuses),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum CatalogError {
    DuplicateId(String),
    EmptyId,
    InvalidStack { id: String, max_stack: u32 },
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::DuplicateId(id) => write!(f, "duplicate item id '{}'", id),
            CatalogError::EmptyId => write!(f, "item id cannot be empty"),
            CatalogError::InvalidStack { id, max_stack } => {
                write!(f, "item '{}' has invalid max stack {}", id, max_stack)
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// Registry of all item definitions, keyed by id.
#[derive(Resource, Debug, Clone)]
pub struct ItemCatalog {
    items: HashMap<String, ItemDefinition>,
}

impl ItemCatalog {
    pub fn new(definitions: Vec<ItemDefinition>) -> Result<Self, CatalogError> {
        let mut items = HashMap::with_capacity(definitions.len());
        for def in definitions {
            if def.id.trim().is_empty() {
                return Err(CatalogError::EmptyId);
            }
            if def.max_stack == 0 || (def.is_equipment() && def.max_stack != 1) {
                return Err(CatalogError::InvalidStack {
                    id: def.id,
                    max_stack: def.max_stack,
                });
            }
            if items.contains_key(&def.id) {
                return Err(CatalogError::DuplicateId(def.id));
            }
            items.insert(def.id.clone(), def);
        }
        Ok(Self { items })
    }

    /// The built-in registry shipped with the game.
    pub fn builtin() -> Self {
        let items = builtin_definitions()
            .into_iter()
            .map(|def| (def.id.clone(), def))
            .collect();
        Self { items }
    }

    pub fn get(&self, id: &str) -> Option<&ItemDefinition> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemDefinition> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn consumable(id: &str, name: &str, heal: i32, price: i64) -> ItemDefinition {
    ItemDefinition {
        id: id.to_string(),
        name: name.to_string(),
        kind: ItemKind::Consumable { heal },
        price,
        max_stack: 99,
    }
}

fn keepsake(id: &str, name: &str, price: i64) -> ItemDefinition {
    ItemDefinition {
        id: id.to_string(),
        name: name.to_string(),
        kind: ItemKind::NonConsumable,
        price,
        max_stack: 1,
    }
}

fn equipment(
    id: &str,
    name: &str,
    slot: Slot,
    bonuses: StatBonuses,
    requirements: Requirements,
    price: i64,
) -> ItemDefinition {
    ItemDefinition {
        id: id.to_string(),
        name: name.to_string(),
        kind: ItemKind::Equipment {
            slot,
            bonuses,
            requirements,
        },
        price,
        max_stack: 1,
    }
}

fn builtin_definitions() -> Vec<ItemDefinition> {
    vec![
        consumable("bandage", "Bandage", 25, 10),
        consumable("first-aid-kit", "First Aid Kit", 60, 40),
        consumable("adrenaline-shot", "Adrenaline Shot", 120, 100),
        keepsake("gold-watch", "Gold Watch", 250),
        keepsake("counterfeit-ledger", "Counterfeit Ledger", 0),
        equipment(
            "flat-cap",
            "Flat Cap",
            Slot::Head,
            StatBonuses {
                defence: 2,
                ..StatBonuses::default()
            },
            Requirements::default(),
            15,
        ),
        equipment(
            "kevlar-helmet",
            "Kevlar Helmet",
            Slot::Head,
            StatBonuses {
                max_hp: 10,
                defence: 6,
                ..StatBonuses::default()
            },
            Requirements {
                level: 3,
                ..Requirements::default()
            },
            120,
        ),
        equipment(
            "balaclava",
            "Balaclava",
            Slot::Mask,
            StatBonuses {
                evasion: 2.0,
                ..StatBonuses::default()
            },
            Requirements::default(),
            25,
        ),
        equipment(
            "leather-jacket",
            "Leather Jacket",
            Slot::Body,
            StatBonuses {
                max_hp: 5,
                defence: 4,
                ..StatBonuses::default()
            },
            Requirements::default(),
            60,
        ),
        equipment(
            "bulletproof-vest",
            "Bulletproof Vest",
            Slot::Body,
            StatBonuses {
                max_hp: 20,
                defence: 10,
                ..StatBonuses::default()
            },
            Requirements {
                level: 5,
                vitality: 8,
                ..Requirements::default()
            },
            400,
        ),
        equipment(
            "leather-gloves",
            "Leather Gloves",
            Slot::Gloves,
            StatBonuses {
                hit_rate: 1.5,
                ..StatBonuses::default()
            },
            Requirements::default(),
            20,
        ),
        equipment(
            "cargo-pants",
            "Cargo Pants",
            Slot::Pants,
            StatBonuses {
                defence: 2,
                evasion: 1.0,
                ..StatBonuses::default()
            },
            Requirements::default(),
            35,
        ),
        equipment(
            "steel-toe-boots",
            "Steel-Toe Boots",
            Slot::Boots,
            StatBonuses {
                defence: 2,
                damage: 2,
                ..StatBonuses::default()
            },
            Requirements::default(),
            45,
        ),
        equipment(
            "gold-chain",
            "Gold Chain",
            Slot::Accessory,
            StatBonuses {
                critical: 2.0,
                ..StatBonuses::default()
            },
            Requirements {
                influence: 4,
                ..Requirements::default()
            },
            150,
        ),
        equipment(
            "rabbits-foot",
            "Rabbit's Foot",
            Slot::Charm,
            StatBonuses {
                evasion: 3.0,
                critical: 1.5,
                ..StatBonuses::default()
            },
            Requirements {
                level: 2,
                ..Requirements::default()
            },
            80,
        ),
        equipment(
            "switchblade",
            "Switchblade",
            Slot::Weapon,
            StatBonuses {
                damage: 5,
                ..StatBonuses::default()
            },
            Requirements::default(),
            30,
        ),
        equipment(
            "brass-knuckles",
            "Brass Knuckles",
            Slot::Weapon,
            StatBonuses {
                damage: 9,
                ..StatBonuses::default()
            },
            Requirements {
                strength: 5,
                ..Requirements::default()
            },
            90,
        ),
        equipment(
            "sawn-off-shotgun",
            "Sawn-Off Shotgun",
            Slot::Weapon,
            StatBonuses {
                damage: 18,
                hit_rate: 1.0,
                ..StatBonuses::default()
            },
            Requirements {
                level: 5,
                strength: 10,
                ..Requirements::default()
            },
            500,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_validates() {
        let catalog = ItemCatalog::new(builtin_definitions()).expect("builtin table is valid");
        assert!(catalog.len() >= 15);
        assert!(catalog.contains("bandage"));
        assert!(catalog.get("switchblade").is_some_and(|d| d.is_equipment()));
    }

    #[test]
    fn equipment_is_never_stackable() {
        for def in ItemCatalog::builtin().iter() {
            if def.is_equipment() {
                assert_eq!(def.max_stack, 1, "{} must not stack", def.id);
            }
        }
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let defs = vec![
            consumable("bandage", "Bandage", 25, 10),
            consumable("bandage", "Bandage Again", 30, 12),
        ];
        assert!(matches!(
            ItemCatalog::new(defs),
            Err(CatalogError::DuplicateId(_))
        ));
    }

    #[test]
    fn slot_labels_round_trip() {
        for slot in Slot::ALL {
            assert_eq!(Slot::parse(slot.label()), Some(slot));
        }
        assert_eq!(Slot::parse("weapon"), Some(Slot::Weapon));
        assert_eq!(Slot::parse("belt"), None);
    }
}
