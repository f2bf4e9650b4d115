use bevy_ecs::prelude::*;

use crate::components::combat::Health;
use crate::components::player::PlayerLocation;
use crate::components::world::{EntityId, GeoPos, Player};
use crate::core::ecs::GameConfig;
use crate::core::world::{ActionIntent, ActionQueue, IdAllocator};
use crate::simulation::enemies::{jitter, roll_enemy, Enemy, Facing};
use crate::simulation::rng::WorldRng;
use crate::simulation::time::{GameClock, IntervalGate};
use crate::systems::ActionLog;

/// Interval gate for idle enemy movement.
#[derive(Resource, Debug, Default)]
pub struct EnemyMoveTimer(pub IntervalGate);

/// System: SpawnEnemies intents clear the roster and roll a fresh batch
/// around the player.
pub fn enemy_spawn_system(
    mut commands: Commands,
    intents: Res<ActionQueue>,
    config: Res<GameConfig>,
    mut rng: ResMut<WorldRng>,
    mut allocator: ResMut<IdAllocator>,
    mut log: ResMut<ActionLog>,
    player: Query<&PlayerLocation, With<Player>>,
    existing: Query<Entity, With<Enemy>>,
) {
    for intent in intents.0.iter() {
        let ActionIntent::SpawnEnemies { count } = intent else {
            continue;
        };
        let Some(center) = player.get_single().ok().and_then(|location| location.0) else {
            log.push("no location fix yet");
            continue;
        };

        for entity in existing.iter() {
            commands.entity(entity).despawn();
        }
        for _ in 0..*count {
            let blueprint = roll_enemy(center, config.enemy_spawn_radius_m, &mut rng.0);
            commands.spawn((
                EntityId(allocator.alloc()),
                Enemy {
                    tier: blueprint.tier,
                    power: blueprint.power,
                    attack: blueprint.stats.attack,
                    defense: blueprint.stats.defense,
                },
                blueprint.location,
                Health::new(blueprint.stats.health),
                Facing::default(),
            ));
        }
        log.push(format!("{} enemies prowl the area.", count));
    }
}

/// System: periodic random jitter; the dominant movement axis sets the
/// facing tag for the map surface.
pub fn enemy_movement_system(
    clock: Res<GameClock>,
    config: Res<GameConfig>,
    mut timer: ResMut<EnemyMoveTimer>,
    mut rng: ResMut<WorldRng>,
    mut enemies: Query<(&mut GeoPos, &mut Facing), With<Enemy>>,
) {
    if !timer.0.ready(clock.now_ms, config.enemy_move_interval_ms) {
        return;
    }
    for (mut position, mut facing) in enemies.iter_mut() {
        let (moved, new_facing) = jitter(*position, config.enemy_step_m, &mut rng.0);
        *position = moved;
        *facing = new_facing;
    }
}
