use bevy_ecs::prelude::*;

use crate::components::world::GeoPos;
use crate::data::enemies::{
    self, EnemyTier, MONEY_DROP_CHANCE, MONEY_POWER_MULTIPLIER,
};
use crate::simulation::{geo, rng};

const HEALTH_PER_POWER: f64 = 10.0;
const ATTACK_PER_POWER: f64 = 1.5;
const DEFENSE_PER_POWER: f64 = 0.8;

/// One shared multiplier per enemy scales all three stats together.
pub const STAT_MULTIPLIER_RANGE: (f64, f64) = (0.8, 1.2);

pub const EXPERIENCE_PER_POWER: i64 = 10;

/// A procedurally-generated hostile roaming near the player.
#[derive(Component, Debug, Clone)]
pub struct Enemy {
    pub tier: EnemyTier,
    pub power: u32,
    pub attack: i32,
    pub defense: i32,
}

/// Facing tag derived from the last movement vector; rendering-only.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Facing {
    North,
    #[default]
    South,
    East,
    West,
}

impl Facing {
    pub fn label(&self) -> &'static str {
        match self {
            Facing::North => "N",
            Facing::South => "S",
            Facing::East => "E",
            Facing::West => "W",
        }
    }
}

/// Stats derived from power. The multiplier is rolled once per enemy,
/// not per stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnemyStats {
    pub health: i32,
    pub attack: i32,
    pub defense: i32,
}

pub fn derive_stats(power: u32, multiplier: f64) -> EnemyStats {
    let scaled = |factor: f64| ((power as f64 * factor * multiplier).round() as i32).max(1);
    EnemyStats {
        health: scaled(HEALTH_PER_POWER),
        attack: scaled(ATTACK_PER_POWER),
        defense: scaled(DEFENSE_PER_POWER),
    }
}

/// One rolled enemy, ready to spawn as an entity.
#[derive(Debug, Clone)]
pub struct EnemyBlueprint {
    pub tier: EnemyTier,
    pub power: u32,
    pub stats: EnemyStats,
    pub location: GeoPos,
}

/// Rolls tier, power, stats, and an area-uniform position inside the
/// spawn disk.
pub fn roll_enemy(center: GeoPos, radius_m: f64, rng_state: &mut u64) -> EnemyBlueprint {
    let spec = enemies::roll_tier(rng::roll_unit(rng_state));
    let power = rng::roll_range(rng_state, spec.power.0, spec.power.1);
    let multiplier = rng::roll_between(
        rng_state,
        STAT_MULTIPLIER_RANGE.0,
        STAT_MULTIPLIER_RANGE.1,
    );
    EnemyBlueprint {
        tier: spec.tier,
        power,
        stats: derive_stats(power, multiplier),
        location: geo::random_point_in_radius(center, radius_m, rng_state),
    }
}

/// Rolled drops from one defeated enemy.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LootDrop {
    pub items: Vec<(String, u32)>,
    pub money: i64,
}

/// Rolls every loot-table entry independently against its drop chance;
/// entries that roll a zero quantity are omitted. The universal money
/// drop scales with power.
pub fn roll_loot(tier: EnemyTier, power: u32, rng_state: &mut u64) -> LootDrop {
    let spec = enemies::spec_for(tier);
    let mut drop = LootDrop::default();
    for entry in spec.loot {
        if !rng::roll_chance(rng_state, entry.drop_chance) {
            continue;
        }
        let quantity = rng::roll_range(rng_state, entry.quantity.0, entry.quantity.1);
        if quantity > 0 {
            drop.items.push((entry.item_id.to_string(), quantity));
        }
    }
    if rng::roll_chance(rng_state, MONEY_DROP_CHANCE) {
        let factor = rng::roll_range(
            rng_state,
            MONEY_POWER_MULTIPLIER.0,
            MONEY_POWER_MULTIPLIER.1,
        );
        drop.money = power as i64 * factor as i64;
    }
    drop
}

pub fn experience_for(power: u32) -> i64 {
    power as i64 * EXPERIENCE_PER_POWER
}

/// The dominant axis of a movement vector decides the facing tag.
pub fn classify_facing(east_m: f64, north_m: f64) -> Facing {
    if east_m.abs() >= north_m.abs() {
        if east_m >= 0.0 {
            Facing::East
        } else {
            Facing::West
        }
    } else if north_m >= 0.0 {
        Facing::North
    } else {
        Facing::South
    }
}

/// Small random positional jitter plus the facing it implies.
pub fn jitter(position: GeoPos, max_step_m: f64, rng_state: &mut u64) -> (GeoPos, Facing) {
    let east_m = rng::roll_between(rng_state, -max_step_m, max_step_m);
    let north_m = rng::roll_between(rng_state, -max_step_m, max_step_m);
    let facing = classify_facing(east_m, north_m);
    (geo::offset_by_meters(position, east_m, north_m), facing)
}
