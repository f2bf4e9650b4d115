use bevy_ecs::prelude::*;

use crate::components::combat::Health;
use crate::components::player::{Attributes, DerivedStats, Progression};
use crate::components::world::Player;
use crate::core::world::{ActionIntent, ActionQueue};
use crate::data::items::ItemCatalog;
use crate::simulation::enemies::Enemy;
use crate::simulation::equipment::{self, EquipmentState};
use crate::simulation::inventory::InventoryStore;
use crate::simulation::progression::calculate_character_stats;
use crate::systems::{ActionLog, PersistRequest};

/// System: consumes Equip/Unequip intents. Derived stats are recomputed
/// once per tick with changes, not per chained slot move.
pub fn equipment_system(
    intents: Res<ActionQueue>,
    catalog: Res<ItemCatalog>,
    mut inventory: ResMut<InventoryStore>,
    mut equipment: ResMut<EquipmentState>,
    mut log: ResMut<ActionLog>,
    mut persist: ResMut<PersistRequest>,
    mut player: Query<
        (&Progression, &Attributes, &mut Health, &mut DerivedStats),
        (With<Player>, Without<Enemy>),
    >,
) {
    let Ok((progression, attributes, mut health, mut derived)) = player.get_single_mut() else {
        return;
    };

    let mut changed = false;
    for intent in intents.0.iter() {
        match intent {
            ActionIntent::Equip { item_id } => {
                match equipment::equip(
                    &catalog,
                    &mut inventory,
                    &mut equipment,
                    progression,
                    attributes,
                    item_id,
                ) {
                    Ok(slot) => {
                        let name = catalog
                            .get(item_id)
                            .map(|def| def.name.clone())
                            .unwrap_or_else(|| item_id.clone());
                        log.push(format!("Equipped {} ({}).", name, slot.label()));
                        changed = true;
                    }
                    Err(err) => log.push(err.to_string()),
                }
            }
            ActionIntent::Unequip { slot } => {
                match equipment::unequip(&catalog, &mut inventory, &mut equipment, *slot) {
                    Some(item_id) => {
                        let name = catalog
                            .get(&item_id)
                            .map(|def| def.name.clone())
                            .unwrap_or(item_id);
                        log.push(format!("Unequipped {} from {}.", name, slot.label()));
                        changed = true;
                    }
                    None => log.push(format!("Nothing equipped in {}.", slot.label())),
                }
            }
            _ => {}
        }
    }

    if changed {
        calculate_character_stats(
            attributes,
            &equipment,
            &catalog,
            &mut health,
            &mut derived,
        );
        persist.0 = true;
    }
}
