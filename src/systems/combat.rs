use bevy_ecs::prelude::*;

use crate::components::combat::Health;
use crate::components::player::{Attributes, DerivedStats, PlayerLocation, Progression, Wallet};
use crate::components::world::{EntityId, GeoPos, Player};
use crate::core::ecs::GameConfig;
use crate::core::world::{ActionIntent, ActionQueue};
use crate::data::items::ItemCatalog;
use crate::simulation::enemies::{experience_for, roll_loot, Enemy};
use crate::simulation::equipment::EquipmentState;
use crate::simulation::geo;
use crate::simulation::inventory::InventoryStore;
use crate::simulation::progression::{calculate_character_stats, gain_experience};
use crate::simulation::rng::WorldRng;
use crate::systems::{ActionLog, PersistRequest};

/// System: resolves Attack intents. A defeated enemy pays out
/// experience, cash, and rolled loot, then despawns.
pub fn combat_system(
    mut commands: Commands,
    intents: Res<ActionQueue>,
    config: Res<GameConfig>,
    catalog: Res<ItemCatalog>,
    equipment: Res<EquipmentState>,
    mut inventory: ResMut<InventoryStore>,
    mut rng: ResMut<WorldRng>,
    mut log: ResMut<ActionLog>,
    mut persist: ResMut<PersistRequest>,
    mut player: Query<
        (
            &PlayerLocation,
            &Attributes,
            &mut Progression,
            &mut Wallet,
            &mut Health,
            &mut DerivedStats,
        ),
        (With<Player>, Without<Enemy>),
    >,
    mut enemies: Query<(Entity, &EntityId, &Enemy, &GeoPos, &mut Health), Without<Player>>,
) {
    let Ok((location, attributes, mut progression, mut wallet, mut health, mut derived)) =
        player.get_single_mut()
    else {
        return;
    };

    for intent in intents.0.iter() {
        let ActionIntent::Attack { enemy_id } = intent else {
            continue;
        };
        let Some(player_pos) = location.0 else {
            log.push("no location fix yet");
            continue;
        };

        let mut target = None;
        for (entity, id, enemy, pos, enemy_health) in enemies.iter_mut() {
            if id.0 == *enemy_id {
                target = Some((entity, id.0, enemy.clone(), *pos, enemy_health));
                break;
            }
        }
        let Some((entity, uid, enemy, enemy_pos, mut enemy_health)) = target else {
            log.push(format!("no such enemy: #{}", enemy_id));
            continue;
        };

        let distance_m = geo::distance_m(player_pos, enemy_pos);
        if distance_m > config.enemy_engage_range_m {
            log.push(format!(
                "too far to attack: {:.0} m away, limit {:.0} m",
                distance_m, config.enemy_engage_range_m
            ));
            continue;
        }

        let dealt = (derived.damage - enemy.defense).max(1);
        enemy_health.take_damage(dealt);
        log.push(format!(
            "You hit {} #{} for {} ({} / {} HP left).",
            enemy.tier.label(),
            uid,
            dealt,
            enemy_health.current,
            enemy_health.max
        ));

        if enemy_health.is_depleted() {
            let exp = experience_for(enemy.power);
            let levels = gain_experience(&mut progression, exp);
            let loot = roll_loot(enemy.tier, enemy.power, &mut rng.0);
            wallet.cash += loot.money;

            let mut haul: Vec<String> = Vec::new();
            if loot.money > 0 {
                haul.push(format!("${}", loot.money));
            }
            for (item_id, quantity) in &loot.items {
                if inventory.add(&catalog, item_id, *quantity).is_ok() {
                    let name = catalog
                        .get(item_id)
                        .map(|def| def.name.clone())
                        .unwrap_or_else(|| item_id.clone());
                    haul.push(format!("{} x{}", name, quantity));
                }
            }
            if haul.is_empty() {
                log.push(format!(
                    "{} #{} defeated (+{} exp).",
                    enemy.tier.label(),
                    uid,
                    exp
                ));
            } else {
                log.push(format!(
                    "{} #{} defeated (+{} exp): {}.",
                    enemy.tier.label(),
                    uid,
                    exp,
                    haul.join(", ")
                ));
            }
            if levels > 0 {
                calculate_character_stats(
                    attributes,
                    &equipment,
                    &catalog,
                    &mut health,
                    &mut derived,
                );
                log.push(format!("Level up! Now level {}.", progression.level));
            }
            commands.entity(entity).despawn();
        } else {
            let taken = (enemy.attack - derived.defence).max(1);
            health.take_damage(taken);
            log.push(format!(
                "{} #{} hits back for {} ({} / {} HP).",
                enemy.tier.label(),
                uid,
                taken,
                health.current,
                health.max
            ));
            if health.is_depleted() {
                log.push("You collapse. Wait for your wounds to close.");
            }
        }
        persist.0 = true;
    }
}
