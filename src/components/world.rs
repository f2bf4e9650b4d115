use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// A point on the real-world map, in decimal degrees.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPos {
    pub lat: f64,
    pub lon: f64,
}

/// Stable identifier for addressing entities externally.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityId(pub u32);

/// Marker component for the human player to distinguish them from enemies.
#[derive(Component, Debug)]
pub struct Player;
