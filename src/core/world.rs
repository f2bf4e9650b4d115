use std::path::Path;

use bevy_ecs::prelude::*;

use crate::components::combat::Health;
use crate::components::player::{
    Attributes, DerivedStats, Membership, PlayerLocation, PlayerProfile, Progression, Wallet,
};
use crate::components::world::{EntityId, GeoPos, Player};
use crate::core::ecs::{create_schedule, create_world, Settings};
use crate::core::serialization::{
    apply_state_to_world, extract_state_from_world, load_state_from_path, save_state_to_path,
    SaveState,
};
use crate::data::items::{ItemCatalog, Slot};
use crate::simulation::enemies::{Enemy, Facing};
use crate::simulation::equipment::EquipmentState;
use crate::simulation::inventory::InventoryStore;
use crate::simulation::map_data::FacilityRecord;
use crate::simulation::progression::{calculate_character_stats, exp_needed};
use crate::simulation::territory::{BusinessLedger, MergeOutcome};
use crate::simulation::time::GameClock;
use crate::systems::map_surface::{MapCommand, MapSurface};
use crate::systems::{ActionLog, PersistRequest};

/// Intent-driven commands fed into the simulation each tick.
#[derive(Debug, Clone)]
pub enum ActionIntent {
    ReportLocation { lat: f64, lon: f64 },
    UseItem { item_id: String },
    Equip { item_id: String },
    Unequip { slot: Slot },
    Protect { business_id: String },
    CollectProfit { business_id: String },
    AbandonProtection { business_id: String },
    JoinOrganization { base_id: String },
    AutoJoinOrganization,
    LeaveOrganization,
    BuyItem { business_id: String, item_id: String },
    Attack { enemy_id: u32 },
    SpawnEnemies { count: u32 },
    ToggleSound,
}

/// Resource storing the intents for the next tick.
#[derive(Resource, Default, Debug)]
pub struct ActionQueue(pub Vec<ActionIntent>);

#[derive(Resource, Debug)]
pub struct IdAllocator {
    next: u32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdAllocator {
    pub fn alloc(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn bump_to_at_least(&mut self, min_next: u32) {
        if self.next < min_next {
            self.next = min_next;
        }
    }
}

/// Data snapshot returned to the presentation layer after each tick.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub tick: u64,
    pub now_ms: i64,
    pub player: PlayerSummary,
    pub businesses: Vec<BusinessSummary>,
    pub bases: Vec<BaseSummary>,
    pub enemies: Vec<EnemySummary>,
    pub action_log: Vec<String>,
    pub map_commands: Vec<MapCommand>,
    /// True when a mutating action this tick wants the state persisted.
    pub needs_save: bool,
    pub sound_on: bool,
}

#[derive(Debug, Clone)]
pub struct PlayerSummary {
    pub username: String,
    pub alias: String,
    pub level: u32,
    pub experience: u64,
    pub exp_needed: u64,
    pub cash: i64,
    pub power: u32,
    pub hp: (i32, i32),
    pub stats: DerivedStats,
    pub location: Option<GeoPos>,
    pub organization: Option<String>,
    pub inventory: Vec<(String, u32)>,
    pub equipment: Vec<(Slot, String)>,
}

#[derive(Debug, Clone)]
pub struct BusinessSummary {
    pub id: String,
    pub name: String,
    pub category: String,
    pub is_shop: bool,
    pub location: GeoPos,
    pub protected_by: Option<String>,
    pub protectors: usize,
    pub protection_power: u32,
    pub profit_controlled: bool,
    pub potential_profit: i64,
}

#[derive(Debug, Clone)]
pub struct BaseSummary {
    pub id: String,
    pub name: String,
    pub abbreviation: String,
    pub location: GeoPos,
}

#[derive(Debug, Clone)]
pub struct EnemySummary {
    pub id: u32,
    pub name: &'static str,
    pub power: u32,
    pub hp: (i32, i32),
    pub location: GeoPos,
    pub facing: Facing,
}

/// Wrapper around the ECS world and schedule; the host's only handle on
/// the simulation.
pub struct Game {
    world: World,
    schedule: Schedule,
    player: Entity,
    player_uid: u32,
    seed: u64,
}

impl Game {
    /// Create a new game world using the provided seed.
    pub fn new(seed: u64) -> Self {
        let mut world = create_world(seed);
        let player_uid = allocate_entity_id(&mut world);
        let player = spawn_player(&mut world, player_uid);
        recompute_player_stats(&mut world, player);
        if let Some(mut health) = world.get_mut::<Health>(player) {
            health.current = health.max;
        }
        let schedule = create_schedule();

        Self {
            world,
            schedule,
            player,
            player_uid,
            seed,
        }
    }

    /// Run one simulation tick at `now_ms` with the provided intents and
    /// return a snapshot for rendering.
    pub fn tick(&mut self, now_ms: i64, intents: Vec<ActionIntent>) -> Snapshot {
        {
            let mut clock = self.world.resource_mut::<GameClock>();
            clock.advance_to(now_ms);
        }
        {
            let mut queue = self.world.resource_mut::<ActionQueue>();
            queue.0 = intents;
        }

        self.schedule.run(&mut self.world);
        Snapshot::capture(self.player, &self.world)
    }

    /// Merge a fully-resolved batch of map records into the business
    /// cache. Partial batches never reach this point; a failed fetch
    /// merges nothing.
    pub fn merge_map_records(&mut self, records: &[FacilityRecord]) -> MergeOutcome {
        self.world
            .resource_mut::<BusinessLedger>()
            .merge_records(records)
    }

    /// Expose the player's entity index for intent addressing.
    pub fn player_uid(&self) -> u32 {
        self.player_uid
    }

    /// Extract a serializable save state from the current world.
    pub fn save_state(&self) -> SaveState {
        extract_state_from_world(&self.world, self.player, self.seed)
    }

    /// Apply a saved state back into the live world.
    pub fn load_state(&mut self, state: SaveState) {
        self.seed = state.seed;
        apply_state_to_world(state, &mut self.world, self.player);
        recompute_player_stats(&mut self.world, self.player);
        self.player_uid = self
            .world
            .get::<EntityId>(self.player)
            .map(|id| id.0)
            .unwrap_or(self.player_uid);
    }

    /// Save state directly to a JSON file path.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        save_state_to_path(&self.save_state(), path)
    }

    /// Load state directly from a JSON file path.
    pub fn load_from_path<P: AsRef<Path>>(&mut self, path: P) -> std::io::Result<()> {
        let state = load_state_from_path(path)?;
        self.load_state(state);
        Ok(())
    }
}

fn allocate_entity_id(world: &mut World) -> u32 {
    let mut alloc = world.resource_mut::<IdAllocator>();
    alloc.alloc()
}

fn spawn_player(world: &mut World, uid: u32) -> Entity {
    world
        .spawn((
            Player,
            EntityId(uid),
            PlayerProfile {
                user_id: format!("player-{}", uid),
                username: "you".to_string(),
                alias: "You".to_string(),
            },
            Attributes::default(),
            Progression::default(),
            Wallet { cash: 100 },
            Membership::default(),
            PlayerLocation::default(),
            Health::new(1),
            DerivedStats::default(),
        ))
        .id()
}

/// Recompute max HP and derived stats from attributes plus equipment.
pub(crate) fn recompute_player_stats(world: &mut World, player: Entity) {
    let Some(attributes) = world.get::<Attributes>(player).copied() else {
        return;
    };
    let Some(mut health) = world.get::<Health>(player).cloned() else {
        return;
    };
    let Some(mut derived) = world.get::<DerivedStats>(player).copied() else {
        return;
    };
    {
        let catalog = world.resource::<ItemCatalog>();
        let equipment = world.resource::<EquipmentState>();
        calculate_character_stats(&attributes, equipment, catalog, &mut health, &mut derived);
    }
    if let Some(mut component) = world.get_mut::<Health>(player) {
        *component = health;
    }
    if let Some(mut component) = world.get_mut::<DerivedStats>(player) {
        *component = derived;
    }
}

impl Snapshot {
    fn capture(player: Entity, world: &World) -> Self {
        let clock = world.resource::<GameClock>();
        let catalog = world.resource::<ItemCatalog>();

        let profile = world.get::<PlayerProfile>(player);
        let progression = world
            .get::<Progression>(player)
            .copied()
            .unwrap_or_default();
        let attributes = world.get::<Attributes>(player).copied().unwrap_or_default();
        let membership = world.get::<Membership>(player);

        let inventory = world
            .resource::<InventoryStore>()
            .entries()
            .iter()
            .map(|entry| {
                let name = catalog
                    .get(&entry.item_id)
                    .map(|def| def.name.clone())
                    .unwrap_or_else(|| entry.item_id.clone());
                (name, entry.quantity)
            })
            .collect();

        let equipment_state = world.resource::<EquipmentState>();
        let equipment = Slot::ALL
            .iter()
            .filter_map(|slot| {
                equipment_state.equipped(*slot).map(|item_id| {
                    let name = catalog
                        .get(item_id)
                        .map(|def| def.name.clone())
                        .unwrap_or_else(|| item_id.to_string());
                    (*slot, name)
                })
            })
            .collect();

        let player_summary = PlayerSummary {
            username: profile
                .map(|p| p.username.clone())
                .unwrap_or_else(|| "unknown".to_string()),
            alias: profile
                .map(|p| p.alias.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            level: progression.level,
            experience: progression.experience,
            exp_needed: exp_needed(progression.level),
            cash: world.get::<Wallet>(player).map(|w| w.cash).unwrap_or(0),
            power: attributes.power(),
            hp: world
                .get::<Health>(player)
                .map(|h| (h.current, h.max))
                .unwrap_or((0, 0)),
            stats: world
                .get::<DerivedStats>(player)
                .copied()
                .unwrap_or_default(),
            location: world
                .get::<PlayerLocation>(player)
                .and_then(|location| location.0),
            organization: membership.and_then(|m| {
                m.organization
                    .as_ref()
                    .map(|org| format!("{} [{}]", org.name, org.abbreviation))
            }),
            inventory,
            equipment,
        };

        let ledger = world.resource::<BusinessLedger>();
        let mut businesses: Vec<BusinessSummary> = ledger
            .businesses()
            .map(|business| BusinessSummary {
                id: business.id.clone(),
                name: business.name.clone(),
                category: business.category.clone(),
                is_shop: business.is_shop,
                location: business.location,
                protected_by: business
                    .protecting_organization
                    .as_ref()
                    .map(|org| org.abbreviation.clone()),
                protectors: business.protecting_users.len(),
                protection_power: business.protection_power,
                profit_controlled: business.profit_controlled,
                potential_profit: business.potential_profit(clock.now_ms),
            })
            .collect();
        businesses.sort_by(|a, b| a.id.cmp(&b.id));

        let mut bases: Vec<BaseSummary> = ledger
            .bases()
            .map(|base| BaseSummary {
                id: base.id.clone(),
                name: base.name.clone(),
                abbreviation: base.abbreviation.clone(),
                location: base.location,
            })
            .collect();
        bases.sort_by(|a, b| a.id.cmp(&b.id));

        let mut enemies: Vec<EnemySummary> = world
            .iter_entities()
            .filter_map(|entity_ref| {
                let enemy = entity_ref.get::<Enemy>()?;
                Some(EnemySummary {
                    id: entity_ref.get::<EntityId>().map(|id| id.0).unwrap_or(0),
                    name: enemy.tier.label(),
                    power: enemy.power,
                    hp: entity_ref
                        .get::<Health>()
                        .map(|h| (h.current, h.max))
                        .unwrap_or((0, 0)),
                    location: entity_ref
                        .get::<GeoPos>()
                        .copied()
                        .unwrap_or(GeoPos { lat: 0.0, lon: 0.0 }),
                    facing: entity_ref.get::<Facing>().copied().unwrap_or_default(),
                })
            })
            .collect();
        enemies.sort_by_key(|enemy| enemy.id);

        Snapshot {
            tick: clock.tick,
            now_ms: clock.now_ms,
            player: player_summary,
            businesses,
            bases,
            enemies,
            action_log: world.resource::<ActionLog>().0.clone(),
            map_commands: world.resource::<MapSurface>().commands.clone(),
            needs_save: world.resource::<PersistRequest>().0,
            sound_on: world.resource::<Settings>().sound_on,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::map_data::FacilityRecord;

    const NOW: i64 = 1_700_000_000_000;

    fn record(id: &str, name: &str, category: &str, lat: f64, lon: f64) -> FacilityRecord {
        FacilityRecord {
            id: id.to_string(),
            name: Some(name.to_string()),
            category: category.to_string(),
            location: GeoPos { lat, lon },
        }
    }

    fn game_with_scene() -> Game {
        let mut game = Game::new(42);
        game.merge_map_records(&[
            record("b1", "Corner Cafe", "cafe", 40.7300, -73.9900),
            record("base1", "Iron Hounds", "social_club", 40.7301, -73.9901),
        ]);
        game.tick(
            NOW,
            vec![ActionIntent::ReportLocation {
                lat: 40.7300,
                lon: -73.9900,
            }],
        );
        game
    }

    #[test]
    fn map_commands_go_quiet_once_markers_are_announced() {
        let mut game = game_with_scene();
        // The scene tick already announced the markers; a quiet tick has
        // nothing new to say.
        let quiet = game.tick(NOW + 1_000, Vec::new());
        assert!(quiet.map_commands.is_empty());
    }

    #[test]
    fn first_tick_announces_every_marker() {
        let mut game = Game::new(42);
        game.merge_map_records(&[
            record("b1", "Corner Cafe", "cafe", 40.7300, -73.9900),
            record("base1", "Iron Hounds", "social_club", 40.7301, -73.9901),
        ]);
        let snapshot = game.tick(NOW, Vec::new());
        let adds = snapshot
            .map_commands
            .iter()
            .filter(|command| matches!(command, MapCommand::AddMarker { .. }))
            .count();
        assert_eq!(adds, 2);
    }

    #[test]
    fn mutating_actions_request_persistence_and_quiet_ticks_do_not() {
        let mut game = game_with_scene();
        let joined = game.tick(
            NOW + 1_000,
            vec![ActionIntent::JoinOrganization {
                base_id: "base1".to_string(),
            }],
        );
        assert!(joined.needs_save);
        assert_eq!(
            joined.player.organization.as_deref(),
            Some("Iron Hounds [IH]")
        );

        let quiet = game.tick(NOW + 2_000, Vec::new());
        assert!(!quiet.needs_save);
    }

    #[test]
    fn rejected_actions_surface_their_condition_in_the_log() {
        let mut game = game_with_scene();
        let snapshot = game.tick(
            NOW + 1_000,
            vec![ActionIntent::Protect {
                business_id: "b1".to_string(),
            }],
        );
        // Not in an organization yet; the rejection must be readable.
        assert!(snapshot
            .action_log
            .iter()
            .any(|line| line.contains("not in an organization")));
        assert!(!snapshot.needs_save);
    }

    #[test]
    fn spawned_enemies_show_up_with_markers() {
        let mut game = game_with_scene();
        let snapshot = game.tick(NOW + 1_000, vec![ActionIntent::SpawnEnemies { count: 5 }]);
        assert_eq!(snapshot.enemies.len(), 5);
        let enemy_adds = snapshot
            .map_commands
            .iter()
            .filter(|command| {
                matches!(command, MapCommand::AddMarker { id, .. } if id.starts_with("enemy-"))
            })
            .count();
        assert_eq!(enemy_adds, 5);
        for enemy in &snapshot.enemies {
            assert!(enemy.power >= 5);
            assert!(enemy.hp.0 > 0);
        }
    }

    #[test]
    fn regeneration_heals_on_the_configured_interval() {
        let mut game = game_with_scene();
        let mut state = game.save_state();
        state.player.hp.current = 50;
        game.load_state(state);

        // Inside the interval: nothing happens.
        let early = game.tick(NOW + 30_000, Vec::new());
        assert_eq!(early.player.hp.0, 50);

        let healed = game.tick(NOW + 61_000, Vec::new());
        assert_eq!(healed.player.hp.0, 55);
        assert!(healed.needs_save);
    }

    #[test]
    fn sound_toggle_round_trips_through_the_snapshot() {
        let mut game = game_with_scene();
        let off = game.tick(NOW + 1_000, vec![ActionIntent::ToggleSound]);
        assert!(!off.sound_on);
        assert!(off.needs_save);
        let on = game.tick(NOW + 2_000, vec![ActionIntent::ToggleSound]);
        assert!(on.sound_on);
    }
}
