use bevy_ecs::prelude::*;
use bevy_utils::HashMap;

use crate::components::combat::Health;
use crate::components::world::{EntityId, GeoPos};
use crate::simulation::enemies::{Enemy, Facing};
use crate::simulation::territory::BusinessLedger;

/// Marker flavors the presentation layer distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Business,
    Base,
    Enemy,
}

/// Commands for the external map surface, keyed by entity id. The core
/// owns no rendering state; it only reports that visible attributes
/// changed.
#[derive(Debug, Clone, PartialEq)]
pub enum MapCommand {
    AddMarker {
        id: String,
        kind: MarkerKind,
        lat: f64,
        lon: f64,
        label: String,
    },
    UpdateMarker {
        id: String,
        lat: f64,
        lon: f64,
        label: String,
    },
    RemoveMarker {
        id: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct MarkerState {
    kind: MarkerKind,
    lat: f64,
    lon: f64,
    label: String,
}

/// Last-pushed marker states plus the commands emitted this tick.
#[derive(Resource, Default, Debug)]
pub struct MapSurface {
    known: HashMap<String, MarkerState>,
    pub commands: Vec<MapCommand>,
}

/// System: diffs the live caches against the known marker set and emits
/// add/update/remove commands.
pub fn map_surface_system(
    mut surface: ResMut<MapSurface>,
    ledger: Res<BusinessLedger>,
    enemies: Query<(&EntityId, &GeoPos, &Enemy, &Facing, &Health)>,
) {
    let mut desired: HashMap<String, MarkerState> = HashMap::default();

    for business in ledger.businesses() {
        let label = match &business.protecting_organization {
            Some(org) => format!(
                "{} | protected by {} ({})",
                business.name,
                org.abbreviation,
                business.protecting_users.len()
            ),
            None => business.name.clone(),
        };
        desired.insert(
            business.id.clone(),
            MarkerState {
                kind: MarkerKind::Business,
                lat: business.location.lat,
                lon: business.location.lon,
                label,
            },
        );
    }

    for base in ledger.bases() {
        desired.insert(
            base.id.clone(),
            MarkerState {
                kind: MarkerKind::Base,
                lat: base.location.lat,
                lon: base.location.lon,
                label: format!("{} [{}]", base.name, base.abbreviation),
            },
        );
    }

    for (id, position, enemy, facing, health) in enemies.iter() {
        desired.insert(
            format!("enemy-{}", id.0),
            MarkerState {
                kind: MarkerKind::Enemy,
                lat: position.lat,
                lon: position.lon,
                label: format!(
                    "{} ({} / {} HP) {}",
                    enemy.tier.label(),
                    health.current,
                    health.max,
                    facing.label()
                ),
            },
        );
    }

    let surface = &mut *surface;
    for (id, state) in desired.iter() {
        match surface.known.get(id) {
            None => surface.commands.push(MapCommand::AddMarker {
                id: id.clone(),
                kind: state.kind,
                lat: state.lat,
                lon: state.lon,
                label: state.label.clone(),
            }),
            Some(previous) if previous != state => {
                surface.commands.push(MapCommand::UpdateMarker {
                    id: id.clone(),
                    lat: state.lat,
                    lon: state.lon,
                    label: state.label.clone(),
                })
            }
            Some(_) => {}
        }
    }
    for id in surface.known.keys() {
        if !desired.contains_key(id) {
            surface
                .commands
                .push(MapCommand::RemoveMarker { id: id.clone() });
        }
    }
    surface.known = desired;
}
