use bevy_ecs::prelude::*;

use crate::components::combat::Health;
use crate::components::world::Player;
use crate::core::ecs::GameConfig;
use crate::simulation::enemies::Enemy;
use crate::simulation::time::{GameClock, IntervalGate};
use crate::systems::PersistRequest;

/// Interval gate for passive regeneration.
#[derive(Resource, Debug, Default)]
pub struct RegenTimer(pub IntervalGate);

/// System: heals a fixed amount on a fixed interval while below max HP.
pub fn regen_system(
    clock: Res<GameClock>,
    config: Res<GameConfig>,
    mut timer: ResMut<RegenTimer>,
    mut persist: ResMut<PersistRequest>,
    mut player: Query<&mut Health, (With<Player>, Without<Enemy>)>,
) {
    if !timer.0.ready(clock.now_ms, config.regen_interval_ms) {
        return;
    }
    let Ok(mut health) = player.get_single_mut() else {
        return;
    };
    if health.current < health.max {
        health.heal(config.regen_amount);
        persist.0 = true;
    }
}
