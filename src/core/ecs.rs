use bevy_ecs::prelude::*;
use bevy_ecs::schedule::SystemSet;
use serde::{Deserialize, Serialize};

use crate::core::world::{ActionQueue, IdAllocator};
use crate::data::items::ItemCatalog;
use crate::simulation::equipment::EquipmentState;
use crate::simulation::inventory::InventoryStore;
use crate::simulation::rng::WorldRng;
use crate::simulation::territory::{BusinessLedger, RemovalQuota};
use crate::simulation::time::GameClock;
use crate::systems::combat::combat_system;
use crate::systems::enemy_motion::{enemy_movement_system, enemy_spawn_system, EnemyMoveTimer};
use crate::systems::equipment::equipment_system;
use crate::systems::inventory::use_item_system;
use crate::systems::map_surface::{map_surface_system, MapSurface};
use crate::systems::regen::{regen_system, RegenTimer};
use crate::systems::territory::territory_system;
use crate::systems::{
    begin_tick_system, location_intake_system, settings_system, ActionLog, PersistRequest,
};

/// Tunable pacing knobs. Rule thresholds (ranges, caps, quotas) are
/// constants in their own modules; these are the timer-ish values a host
/// may want to tweak.
#[derive(Resource, Debug, Clone)]
pub struct GameConfig {
    pub regen_interval_ms: i64,
    pub regen_amount: i32,
    pub enemy_move_interval_ms: i64,
    pub enemy_step_m: f64,
    pub enemy_engage_range_m: f64,
    pub enemy_spawn_radius_m: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            regen_interval_ms: 60_000,
            regen_amount: 5,
            enemy_move_interval_ms: 5_000,
            enemy_step_m: 12.0,
            enemy_engage_range_m: 50.0,
            enemy_spawn_radius_m: 1_000.0,
        }
    }
}

/// Player-facing toggles carried in every snapshot.
#[derive(Resource, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Settings {
    pub sound_on: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self { sound_on: true }
    }
}

/// Canonical tick ordering for the simulation.
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum TickSet {
    Intake,
    Simulation,
    Cleanup,
}

/// Build the ECS world with baseline resources.
pub fn create_world(seed: u64) -> World {
    let mut world = World::new();
    world.insert_resource(GameClock::default());
    world.insert_resource(GameConfig::default());
    world.insert_resource(Settings::default());
    world.insert_resource(ActionQueue::default());
    world.insert_resource(IdAllocator::default());
    world.insert_resource(WorldRng(seed));
    world.insert_resource(ItemCatalog::builtin());
    world.insert_resource(InventoryStore::default());
    world.insert_resource(EquipmentState::default());
    world.insert_resource(BusinessLedger::default());
    world.insert_resource(RemovalQuota::default());
    world.insert_resource(ActionLog::default());
    world.insert_resource(PersistRequest::default());
    world.insert_resource(MapSurface::default());
    world.insert_resource(RegenTimer::default());
    world.insert_resource(EnemyMoveTimer::default());
    world
}

/// Build the system schedule in the canonical order. Simulation systems
/// are chained: one writer at a time keeps the action log and compound
/// invariants deterministic.
pub fn create_schedule() -> Schedule {
    let mut schedule = Schedule::default();

    schedule.configure_sets((TickSet::Intake, TickSet::Simulation, TickSet::Cleanup).chain());

    schedule.add_systems(
        (begin_tick_system, location_intake_system)
            .chain()
            .in_set(TickSet::Intake),
    );
    schedule.add_systems(
        (
            settings_system,
            use_item_system,
            equipment_system,
            territory_system,
            enemy_spawn_system,
            combat_system,
            regen_system,
            enemy_movement_system,
        )
            .chain()
            .in_set(TickSet::Simulation),
    );
    schedule.add_systems(map_surface_system.in_set(TickSet::Cleanup));

    schedule
}
