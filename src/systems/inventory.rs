use bevy_ecs::prelude::*;

use crate::components::combat::Health;
use crate::components::world::Player;
use crate::core::world::{ActionIntent, ActionQueue};
use crate::data::items::ItemCatalog;
use crate::simulation::enemies::Enemy;
use crate::simulation::inventory::{use_item, InventoryStore};
use crate::systems::{ActionLog, PersistRequest};

/// System: consumes UseItem intents.
pub fn use_item_system(
    intents: Res<ActionQueue>,
    catalog: Res<ItemCatalog>,
    mut inventory: ResMut<InventoryStore>,
    mut log: ResMut<ActionLog>,
    mut persist: ResMut<PersistRequest>,
    mut player: Query<&mut Health, (With<Player>, Without<Enemy>)>,
) {
    let Ok(mut health) = player.get_single_mut() else {
        return;
    };
    for intent in intents.0.iter() {
        let ActionIntent::UseItem { item_id } = intent else {
            continue;
        };
        match use_item(&catalog, &mut inventory, item_id, &mut health) {
            Ok(healed) => {
                let name = catalog
                    .get(item_id)
                    .map(|def| def.name.clone())
                    .unwrap_or_else(|| item_id.clone());
                log.push(format!("Used {}: restored {} HP.", name, healed));
                persist.0 = true;
            }
            Err(err) => log.push(err.to_string()),
        }
    }
}
