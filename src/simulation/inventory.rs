use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::combat::Health;
use crate::data::items::{ItemCatalog, ItemKind};

/// One owned stack. Quantity is always at least 1; entries at zero are
/// deleted, never kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub item_id: String,
    pub quantity: u32,
}

#[derive(Debug)]
pub enum InventoryError {
    UnknownItem(String),
    NotEnough {
        item_id: String,
        requested: u32,
        held: u32,
    },
    NotConsumable(String),
}

impl std::fmt::Display for InventoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InventoryError::UnknownItem(id) => write!(f, "no such item: {}", id),
            InventoryError::NotEnough {
                item_id,
                requested,
                held,
            } => write!(
                f,
                "not enough {} in inventory: need {}, have {}",
                item_id, requested, held
            ),
            InventoryError::NotConsumable(id) => write!(f, "{} cannot be used", id),
        }
    }
}

impl std::error::Error for InventoryError {}

/// Ordered collection of the player's items. Stackable items merge into
/// shared entries up to their max stack; non-stackable items occupy one
/// entry per unit.
#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryStore {
    entries: Vec<InventoryEntry>,
}

impl InventoryStore {
    pub fn from_entries(entries: Vec<InventoryEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[InventoryEntry] {
        &self.entries
    }

    pub fn find(&self, item_id: &str) -> Option<&InventoryEntry> {
        self.entries.iter().find(|entry| entry.item_id == item_id)
    }

    /// Total quantity held across all entries for this id.
    pub fn count(&self, item_id: &str) -> u32 {
        self.entries
            .iter()
            .filter(|entry| entry.item_id == item_id)
            .map(|entry| entry.quantity)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds `quantity` units of a known item.
    pub fn add(
        &mut self,
        catalog: &ItemCatalog,
        item_id: &str,
        quantity: u32,
    ) -> Result<(), InventoryError> {
        let def = catalog
            .get(item_id)
            .ok_or_else(|| InventoryError::UnknownItem(item_id.to_string()))?;
        if quantity == 0 {
            return Ok(());
        }

        if def.stackable() {
            let mut remaining = quantity;
            for entry in self
                .entries
                .iter_mut()
                .filter(|entry| entry.item_id == item_id)
            {
                let room = def.max_stack.saturating_sub(entry.quantity);
                let moved = room.min(remaining);
                entry.quantity += moved;
                remaining -= moved;
                if remaining == 0 {
                    break;
                }
            }
            while remaining > 0 {
                let moved = remaining.min(def.max_stack);
                self.entries.push(InventoryEntry {
                    item_id: item_id.to_string(),
                    quantity: moved,
                });
                remaining -= moved;
            }
        } else {
            // One entry per unit owned; units never merge.
            for _ in 0..quantity {
                self.entries.push(InventoryEntry {
                    item_id: item_id.to_string(),
                    quantity: 1,
                });
            }
        }
        Ok(())
    }

    /// Removes `quantity` units, deleting entries that reach zero.
    pub fn remove(&mut self, item_id: &str, quantity: u32) -> Result<(), InventoryError> {
        let held = self.count(item_id);
        if held < quantity {
            return Err(InventoryError::NotEnough {
                item_id: item_id.to_string(),
                requested: quantity,
                held,
            });
        }

        let mut remaining = quantity;
        for entry in self
            .entries
            .iter_mut()
            .filter(|entry| entry.item_id == item_id)
        {
            let taken = entry.quantity.min(remaining);
            entry.quantity -= taken;
            remaining -= taken;
            if remaining == 0 {
                break;
            }
        }
        self.entries.retain(|entry| entry.quantity > 0);
        Ok(())
    }
}

/// Consumes one unit of a consumable and applies its heal effect.
/// Returns the HP actually restored.
pub fn use_item(
    catalog: &ItemCatalog,
    inventory: &mut InventoryStore,
    item_id: &str,
    health: &mut Health,
) -> Result<i32, InventoryError> {
    let def = catalog
        .get(item_id)
        .ok_or_else(|| InventoryError::UnknownItem(item_id.to_string()))?;
    let ItemKind::Consumable { heal } = def.kind else {
        return Err(InventoryError::NotConsumable(item_id.to_string()));
    };
    inventory.remove(item_id, 1)?;
    Ok(health.heal(heal))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ItemCatalog {
        ItemCatalog::builtin()
    }

    #[test]
    fn stackable_items_merge_into_one_entry() {
        let catalog = catalog();
        let mut inv = InventoryStore::default();
        inv.add(&catalog, "bandage", 3).unwrap();
        inv.add(&catalog, "bandage", 2).unwrap();
        assert_eq!(inv.entries().len(), 1);
        assert_eq!(inv.count("bandage"), 5);
        assert_eq!(inv.find("bandage").map(|entry| entry.quantity), Some(5));
        assert!(inv.find("first-aid-kit").is_none());
    }

    #[test]
    fn non_stackable_items_keep_one_entry_per_unit() {
        let catalog = catalog();
        let mut inv = InventoryStore::default();
        inv.add(&catalog, "switchblade", 3).unwrap();
        assert_eq!(inv.entries().len(), 3);
        assert!(inv.entries().iter().all(|entry| entry.quantity == 1));
    }

    #[test]
    fn unknown_items_are_rejected() {
        let catalog = catalog();
        let mut inv = InventoryStore::default();
        assert!(matches!(
            inv.add(&catalog, "plasma-rifle", 1),
            Err(InventoryError::UnknownItem(_))
        ));
    }

    #[test]
    fn removing_more_than_held_fails_and_changes_nothing() {
        let catalog = catalog();
        let mut inv = InventoryStore::default();
        inv.add(&catalog, "bandage", 2).unwrap();
        let err = inv.remove("bandage", 3).unwrap_err();
        assert!(matches!(
            err,
            InventoryError::NotEnough {
                requested: 3,
                held: 2,
                ..
            }
        ));
        assert_eq!(inv.count("bandage"), 2);
    }

    #[test]
    fn removal_never_leaves_zero_quantity_entries() {
        let catalog = catalog();
        let mut inv = InventoryStore::default();
        inv.add(&catalog, "bandage", 2).unwrap();
        inv.add(&catalog, "switchblade", 2).unwrap();
        inv.remove("bandage", 2).unwrap();
        inv.remove("switchblade", 1).unwrap();
        assert!(inv.entries().iter().all(|entry| entry.quantity >= 1));
        assert_eq!(inv.count("bandage"), 0);
        assert_eq!(inv.count("switchblade"), 1);
    }

    #[test]
    fn using_a_consumable_heals_and_consumes() {
        let catalog = catalog();
        let mut inv = InventoryStore::default();
        let mut hp = Health {
            current: 100,
            max: 200,
        };
        inv.add(&catalog, "bandage", 1).unwrap();
        let healed = use_item(&catalog, &mut inv, "bandage", &mut hp).unwrap();
        assert_eq!(healed, 25);
        assert_eq!(hp.current, 125);
        assert_eq!(inv.count("bandage"), 0);
    }

    #[test]
    fn using_equipment_is_rejected() {
        let catalog = catalog();
        let mut inv = InventoryStore::default();
        let mut hp = Health::new(100);
        inv.add(&catalog, "switchblade", 1).unwrap();
        assert!(matches!(
            use_item(&catalog, &mut inv, "switchblade", &mut hp),
            Err(InventoryError::NotConsumable(_))
        ));
        assert_eq!(inv.count("switchblade"), 1);
    }
}
