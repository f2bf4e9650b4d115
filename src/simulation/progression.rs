use crate::components::combat::Health;
use crate::components::player::{Attributes, DerivedStats, Progression};
use crate::data::items::{ItemCatalog, StatBonuses};
use crate::simulation::equipment::EquipmentState;

pub const BASE_HP: i32 = 100;
pub const HP_PER_VITALITY: i32 = 10;
pub const DEFENCE_PER_VITALITY: i32 = 2;
pub const EXP_PER_LEVEL: u64 = 100;

/// Experience required to advance out of `level`.
pub fn exp_needed(level: u32) -> u64 {
    level as u64 * EXP_PER_LEVEL
}

/// Adds experience and consumes level thresholds in a loop, so one large
/// grant behaves exactly like many small ones. Returns the number of
/// levels gained; the caller recomputes derived stats when nonzero.
pub fn gain_experience(progression: &mut Progression, amount: i64) -> u32 {
    if amount <= 0 {
        return 0;
    }
    progression.experience += amount as u64;
    let mut levels_gained = 0;
    while progression.experience >= exp_needed(progression.level) {
        progression.experience -= exp_needed(progression.level);
        progression.level += 1;
        levels_gained += 1;
    }
    levels_gained
}

/// Sums stat bonuses across all equipped items. Ids missing from the
/// catalog contribute nothing.
pub fn equipped_bonuses(equipment: &EquipmentState, catalog: &ItemCatalog) -> StatBonuses {
    let mut total = StatBonuses::default();
    for item_id in equipment.equipped_ids() {
        if let Some(bonuses) = catalog.get(item_id).and_then(|def| def.bonuses()) {
            total.max_hp += bonuses.max_hp;
            total.defence += bonuses.defence;
            total.evasion += bonuses.evasion;
            total.hit_rate += bonuses.hit_rate;
            total.critical += bonuses.critical;
            total.damage += bonuses.damage;
        }
    }
    total
}

/// Maximum HP from vitality plus equipment. Clamps current HP down to the
/// new maximum, never up.
pub fn calculate_max_hp(
    attributes: &Attributes,
    equipment: &EquipmentState,
    catalog: &ItemCatalog,
    health: &mut Health,
) {
    let bonus = equipped_bonuses(equipment, catalog).max_hp;
    health.set_max(BASE_HP + attributes.vitality as i32 * HP_PER_VITALITY + bonus);
}

/// Full derived-stat recompute: base-attribute contributions plus
/// equipment bonuses. Always refreshes max HP first.
pub fn calculate_character_stats(
    attributes: &Attributes,
    equipment: &EquipmentState,
    catalog: &ItemCatalog,
    health: &mut Health,
    derived: &mut DerivedStats,
) {
    calculate_max_hp(attributes, equipment, catalog, health);
    let bonuses = equipped_bonuses(equipment, catalog);
    derived.defence = attributes.vitality as i32 * DEFENCE_PER_VITALITY + bonuses.defence;
    derived.evasion_rate = attributes.agility as f64 / 2.0 + bonuses.evasion;
    derived.critical_rate = attributes.hit_rate as f64 + bonuses.hit_rate + bonuses.critical;
    derived.damage = attributes.strength as i32 + bonuses.damage;
}
