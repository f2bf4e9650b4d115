pub mod combat;
pub mod enemy_motion;
pub mod equipment;
pub mod inventory;
pub mod map_surface;
pub mod regen;
pub mod territory;

use bevy_ecs::prelude::*;

use crate::components::player::PlayerLocation;
use crate::components::world::{GeoPos, Player};
use crate::core::ecs::Settings;
use crate::core::world::{ActionIntent, ActionQueue};
use crate::systems::map_surface::MapSurface;

/// Resource collecting user-facing lines for the current tick. Every
/// rejection lands here with its exact unmet condition; nothing is
/// dropped silently.
#[derive(Resource, Default, Debug)]
pub struct ActionLog(pub Vec<String>);

impl ActionLog {
    pub fn push(&mut self, line: impl Into<String>) {
        self.0.push(line.into());
    }
}

/// Set by any system that mutates persistent state; the host saves when
/// the snapshot reports it.
#[derive(Resource, Default, Debug, Clone, Copy)]
pub struct PersistRequest(pub bool);

/// System: clears per-tick outputs before intake.
pub fn begin_tick_system(
    mut log: ResMut<ActionLog>,
    mut persist: ResMut<PersistRequest>,
    mut surface: ResMut<MapSurface>,
) {
    log.0.clear();
    persist.0 = false;
    surface.commands.clear();
}

/// System: applies geolocation fixes reported by the host.
pub fn location_intake_system(
    intents: Res<ActionQueue>,
    mut query: Query<&mut PlayerLocation, With<Player>>,
) {
    for intent in intents.0.iter() {
        if let ActionIntent::ReportLocation { lat, lon } = intent {
            for mut location in query.iter_mut() {
                location.0 = Some(GeoPos {
                    lat: *lat,
                    lon: *lon,
                });
            }
        }
    }
}

/// System: sound toggle from the settings sheet.
pub fn settings_system(
    intents: Res<ActionQueue>,
    mut settings: ResMut<Settings>,
    mut log: ResMut<ActionLog>,
    mut persist: ResMut<PersistRequest>,
) {
    for intent in intents.0.iter() {
        if matches!(intent, ActionIntent::ToggleSound) {
            settings.sound_on = !settings.sound_on;
            log.push(if settings.sound_on {
                "Sound on."
            } else {
                "Sound off."
            });
            persist.0 = true;
        }
    }
}
