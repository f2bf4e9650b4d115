use std::collections::HashMap;

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::player::{Attributes, Progression};
use crate::data::items::{ItemCatalog, ItemKind, Requirements, Slot};
use crate::simulation::inventory::InventoryStore;

/// Worn equipment: at most one item id per slot. An equipped id never
/// simultaneously appears as an inventory entry.
#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
pub struct EquipmentState {
    slots: HashMap<Slot, String>,
}

impl EquipmentState {
    /// Rebuilds worn equipment from persisted (slot, item id) pairs.
    pub fn from_pairs(pairs: Vec<(Slot, String)>) -> Self {
        Self {
            slots: pairs.into_iter().collect(),
        }
    }

    pub fn equipped(&self, slot: Slot) -> Option<&str> {
        self.slots.get(&slot).map(String::as_str)
    }

    pub fn equipped_ids(&self) -> impl Iterator<Item = &str> {
        self.slots.values().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Slot, &str)> {
        self.slots.iter().map(|(slot, id)| (*slot, id.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn set(&mut self, slot: Slot, item_id: String) {
        self.slots.insert(slot, item_id);
    }

    fn take(&mut self, slot: Slot) -> Option<String> {
        self.slots.remove(&slot)
    }
}

/// One failed requirement check, with the numbers that failed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmetRequirement {
    pub name: &'static str,
    pub required: u32,
    pub actual: u32,
}

#[derive(Debug)]
pub enum EquipError {
    UnknownItem(String),
    NotInInventory(String),
    NotEquipment(String),
    RequirementsNotMet {
        item_id: String,
        unmet: Vec<UnmetRequirement>,
    },
}

impl std::fmt::Display for EquipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EquipError::UnknownItem(id) => write!(f, "no such item: {}", id),
            EquipError::NotInInventory(id) => write!(f, "{} is not in the inventory", id),
            EquipError::NotEquipment(id) => write!(f, "{} cannot be equipped", id),
            EquipError::RequirementsNotMet { item_id, unmet } => {
                write!(f, "cannot equip {}: requires", item_id)?;
                for (index, req) in unmet.iter().enumerate() {
                    let sep = if index == 0 { " " } else { ", " };
                    write!(
                        f,
                        "{}{} {} (have {})",
                        sep, req.name, req.required, req.actual
                    )?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for EquipError {}

/// Checks every requirement and collects all that are unmet, so the
/// message can enumerate them in one pass.
pub fn unmet_requirements(
    requirements: &Requirements,
    progression: &Progression,
    attributes: &Attributes,
) -> Vec<UnmetRequirement> {
    let checks = [
        ("level", requirements.level, progression.level),
        ("influence", requirements.influence, attributes.influence),
        ("strength", requirements.strength, attributes.strength),
        ("agility", requirements.agility, attributes.agility),
        ("vitality", requirements.vitality, attributes.vitality),
        ("hit rate", requirements.hit_rate, attributes.hit_rate),
    ];
    checks
        .into_iter()
        .filter(|(_, required, actual)| actual < required)
        .map(|(name, required, actual)| UnmetRequirement {
            name,
            required,
            actual,
        })
        .collect()
}

/// Equips an inventory item. An occupied slot is vacated back into the
/// inventory first, then the new item leaves the inventory. The caller
/// recomputes derived stats once after the whole operation.
pub fn equip(
    catalog: &ItemCatalog,
    inventory: &mut InventoryStore,
    equipment: &mut EquipmentState,
    progression: &Progression,
    attributes: &Attributes,
    item_id: &str,
) -> Result<Slot, EquipError> {
    let def = catalog
        .get(item_id)
        .ok_or_else(|| EquipError::UnknownItem(item_id.to_string()))?;
    let ItemKind::Equipment {
        slot, requirements, ..
    } = &def.kind
    else {
        return Err(EquipError::NotEquipment(item_id.to_string()));
    };

    if inventory.count(item_id) == 0 {
        return Err(EquipError::NotInInventory(item_id.to_string()));
    }

    let unmet = unmet_requirements(requirements, progression, attributes);
    if !unmet.is_empty() {
        return Err(EquipError::RequirementsNotMet {
            item_id: item_id.to_string(),
            unmet,
        });
    }

    if equipment.equipped(*slot).is_some() {
        unequip(catalog, inventory, equipment, *slot);
    }

    inventory
        .remove(item_id, 1)
        .map_err(|_| EquipError::NotInInventory(item_id.to_string()))?;
    equipment.set(*slot, item_id.to_string());
    Ok(*slot)
}

/// Returns the slot's item to the inventory and empties the slot. A
/// no-op on an empty slot. Returns the vacated item id.
pub fn unequip(
    catalog: &ItemCatalog,
    inventory: &mut InventoryStore,
    equipment: &mut EquipmentState,
    slot: Slot,
) -> Option<String> {
    let item_id = equipment.take(slot)?;
    if inventory.add(catalog, &item_id, 1).is_err() {
        // The id vanished from the catalog; keep it equipped rather than
        // destroy the item.
        equipment.set(slot, item_id);
        return None;
    }
    Some(item_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::combat::Health;
    use crate::components::player::DerivedStats;
    use crate::simulation::progression::calculate_character_stats;

    fn strong_player() -> (Progression, Attributes) {
        (
            Progression {
                level: 10,
                experience: 0,
            },
            Attributes {
                influence: 10,
                strength: 12,
                agility: 6,
                vitality: 10,
                hit_rate: 4,
            },
        )
    }

    #[test]
    fn equip_moves_the_item_out_of_the_inventory() {
        let catalog = ItemCatalog::builtin();
        let (progression, attributes) = strong_player();
        let mut inventory = InventoryStore::default();
        let mut equipment = EquipmentState::default();
        inventory.add(&catalog, "switchblade", 1).unwrap();

        let slot = equip(
            &catalog,
            &mut inventory,
            &mut equipment,
            &progression,
            &attributes,
            "switchblade",
        )
        .unwrap();

        assert_eq!(slot, Slot::Weapon);
        assert_eq!(equipment.equipped(Slot::Weapon), Some("switchblade"));
        assert_eq!(inventory.count("switchblade"), 0);
    }

    #[test]
    fn equipping_over_an_occupied_slot_swaps_the_old_item_back() {
        let catalog = ItemCatalog::builtin();
        let (progression, attributes) = strong_player();
        let mut inventory = InventoryStore::default();
        let mut equipment = EquipmentState::default();
        inventory.add(&catalog, "switchblade", 1).unwrap();
        inventory.add(&catalog, "brass-knuckles", 1).unwrap();

        equip(
            &catalog,
            &mut inventory,
            &mut equipment,
            &progression,
            &attributes,
            "switchblade",
        )
        .unwrap();
        equip(
            &catalog,
            &mut inventory,
            &mut equipment,
            &progression,
            &attributes,
            "brass-knuckles",
        )
        .unwrap();

        assert_eq!(equipment.equipped(Slot::Weapon), Some("brass-knuckles"));
        assert_eq!(inventory.count("switchblade"), 1);
        assert_eq!(inventory.count("brass-knuckles"), 0);
    }

    #[test]
    fn requirement_failures_enumerate_every_unmet_check() {
        let catalog = ItemCatalog::builtin();
        let progression = Progression {
            level: 2,
            experience: 0,
        };
        let attributes = Attributes {
            strength: 4,
            ..Attributes::default()
        };
        let mut inventory = InventoryStore::default();
        let mut equipment = EquipmentState::default();
        inventory.add(&catalog, "sawn-off-shotgun", 1).unwrap();

        let err = equip(
            &catalog,
            &mut inventory,
            &mut equipment,
            &progression,
            &attributes,
            "sawn-off-shotgun",
        )
        .unwrap_err();

        let EquipError::RequirementsNotMet { unmet, .. } = &err else {
            panic!("expected RequirementsNotMet, got {:?}", err);
        };
        assert_eq!(unmet.len(), 2);
        let message = err.to_string();
        assert!(message.contains("level 5 (have 2)"), "{}", message);
        assert!(message.contains("strength 10 (have 4)"), "{}", message);
        assert_eq!(inventory.count("sawn-off-shotgun"), 1);
    }

    #[test]
    fn non_equipment_is_rejected() {
        let catalog = ItemCatalog::builtin();
        let (progression, attributes) = strong_player();
        let mut inventory = InventoryStore::default();
        let mut equipment = EquipmentState::default();
        inventory.add(&catalog, "bandage", 1).unwrap();

        assert!(matches!(
            equip(
                &catalog,
                &mut inventory,
                &mut equipment,
                &progression,
                &attributes,
                "bandage",
            ),
            Err(EquipError::NotEquipment(_))
        ));
    }

    #[test]
    fn unequip_on_an_empty_slot_is_a_no_op() {
        let catalog = ItemCatalog::builtin();
        let mut inventory = InventoryStore::default();
        let mut equipment = EquipmentState::default();
        assert_eq!(
            unequip(&catalog, &mut inventory, &mut equipment, Slot::Head),
            None
        );
        assert!(inventory.is_empty());
    }

    #[test]
    fn equip_then_unequip_restores_inventory_and_stats() {
        let catalog = ItemCatalog::builtin();
        let (progression, attributes) = strong_player();
        let mut inventory = InventoryStore::default();
        let mut equipment = EquipmentState::default();
        inventory.add(&catalog, "leather-jacket", 1).unwrap();

        let mut health = Health::new(1);
        let mut derived = DerivedStats::default();
        calculate_character_stats(
            &attributes,
            &equipment,
            &catalog,
            &mut health,
            &mut derived,
        );
        let entries_before = inventory.entries().to_vec();
        let stats_before = derived;
        let max_before = health.max;

        equip(
            &catalog,
            &mut inventory,
            &mut equipment,
            &progression,
            &attributes,
            "leather-jacket",
        )
        .unwrap();
        calculate_character_stats(
            &attributes,
            &equipment,
            &catalog,
            &mut health,
            &mut derived,
        );
        assert_eq!(derived.defence, stats_before.defence + 4);
        assert_eq!(health.max, max_before + 5);

        unequip(&catalog, &mut inventory, &mut equipment, Slot::Body).unwrap();
        calculate_character_stats(
            &attributes,
            &equipment,
            &catalog,
            &mut health,
            &mut derived,
        );

        assert_eq!(inventory.entries(), entries_before.as_slice());
        assert_eq!(derived, stats_before);
        assert_eq!(health.max, max_before);
        assert!(equipment.is_empty());
    }
}
