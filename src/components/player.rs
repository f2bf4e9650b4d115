use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::world::GeoPos;
use crate::simulation::territory::OrganizationRef;

/// Identity fields mirrored from the account layer.
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub user_id: String,
    pub username: String,
    pub alias: String,
}

/// Base attributes; every derived stat starts from these.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Attributes {
    pub influence: u32,
    pub strength: u32,
    pub agility: u32,
    pub vitality: u32,
    pub hit_rate: u32,
}

impl Attributes {
    /// Total character power: the sum of all base attributes.
    pub fn power(&self) -> u32 {
        self.influence + self.strength + self.agility + self.vitality + self.hit_rate
    }
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            influence: 1,
            strength: 1,
            agility: 1,
            vitality: 1,
            hit_rate: 1,
        }
    }
}

/// Level and experience accumulator. Experience is always kept below the
/// threshold for the current level.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progression {
    pub level: u32,
    pub experience: u64,
}

impl Default for Progression {
    fn default() -> Self {
        Self {
            level: 1,
            experience: 0,
        }
    }
}

/// Liquid cash, in whole dollars.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Wallet {
    pub cash: i64,
}

/// Organization membership. Base location is set iff membership is set.
#[derive(Component, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Membership {
    pub organization: Option<OrganizationRef>,
    pub base_location: Option<GeoPos>,
}

/// Stats recomputed from attributes and equipment; cached, never
/// authoritative on their own.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedStats {
    pub defence: i32,
    pub evasion_rate: f64,
    pub critical_rate: f64,
    pub damage: i32,
}

/// Last geolocation fix reported by the host; None until one arrives.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct PlayerLocation(pub Option<GeoPos>);
