use std::collections::HashMap;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::components::player::Attributes;
use crate::components::world::GeoPos;
use crate::core::serialization::{SaveState, SavedHealth, SavedPlayer, SavedSettings};
use crate::data::items::Slot;
use crate::save::repository::SaveRepository;
use crate::simulation::inventory::InventoryEntry;
use crate::simulation::territory::{
    OrganizationRef, Protector, RemovalQuota, SavedBusinessState,
};

const SAVE_SCHEMA_VERSION: i64 = 1;

const SAVE_DB_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS save_meta (
  id INTEGER PRIMARY KEY CHECK (id = 1),
  schema_version INTEGER NOT NULL,
  save_version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS player (
  id INTEGER PRIMARY KEY CHECK (id = 1),
  user_id TEXT NOT NULL,
  username TEXT NOT NULL,
  alias TEXT NOT NULL,
  level INTEGER NOT NULL,
  experience INTEGER NOT NULL,
  cash INTEGER NOT NULL,
  influence INTEGER NOT NULL,
  strength INTEGER NOT NULL,
  agility INTEGER NOT NULL,
  vitality INTEGER NOT NULL,
  hit_rate INTEGER NOT NULL,
  hp_current INTEGER NOT NULL,
  hp_max INTEGER NOT NULL,
  org_name TEXT,
  org_abbreviation TEXT,
  org_base_lat REAL,
  org_base_lon REAL,
  lat REAL,
  lon REAL,
  seed INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS inventory (
  position INTEGER PRIMARY KEY,
  item_id TEXT NOT NULL,
  quantity INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS equipment (
  slot TEXT PRIMARY KEY,
  item_id TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS businesses (
  business_id TEXT PRIMARY KEY,
  last_collected INTEGER NOT NULL,
  org_name TEXT,
  org_abbreviation TEXT
);

CREATE TABLE IF NOT EXISTS protecting_users (
  business_id TEXT NOT NULL,
  position INTEGER NOT NULL,
  user_id TEXT NOT NULL,
  user_power INTEGER NOT NULL,
  PRIMARY KEY (business_id, position)
);

CREATE TABLE IF NOT EXISTS removal_quota (
  id INTEGER PRIMARY KEY CHECK (id = 1),
  day INTEGER NOT NULL,
  used INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
  id INTEGER PRIMARY KEY CHECK (id = 1),
  sound_on INTEGER NOT NULL
);
"#;

#[derive(Debug)]
pub enum SaveDbError {
    Sqlite(rusqlite::Error),
    InvalidData(String),
}

impl std::fmt::Display for SaveDbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveDbError::Sqlite(err) => write!(f, "save db: {}", err),
            SaveDbError::InvalidData(reason) => write!(f, "save db invalid data: {}", reason),
        }
    }
}

impl std::error::Error for SaveDbError {}

impl From<rusqlite::Error> for SaveDbError {
    fn from(err: rusqlite::Error) -> Self {
        SaveDbError::Sqlite(err)
    }
}

/// Durable single-slot save storage on SQLite.
pub struct SaveDb {
    conn: Connection,
}

impl SaveDb {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SaveDbError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, SaveDbError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, SaveDbError> {
        conn.execute_batch(SAVE_DB_SCHEMA)?;
        conn.execute(
            "INSERT OR IGNORE INTO save_meta (id, schema_version, save_version) VALUES (1, ?1, ?2)",
            params![SAVE_SCHEMA_VERSION, 1],
        )?;
        Ok(Self { conn })
    }

    pub fn write_state(&mut self, state: &SaveState) -> Result<(), SaveDbError> {
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM player", [])?;
        tx.execute("DELETE FROM inventory", [])?;
        tx.execute("DELETE FROM equipment", [])?;
        tx.execute("DELETE FROM businesses", [])?;
        tx.execute("DELETE FROM protecting_users", [])?;
        tx.execute("DELETE FROM removal_quota", [])?;
        tx.execute("DELETE FROM settings", [])?;

        let player = &state.player;
        let (org_name, org_abbreviation) = match &player.organization {
            Some(org) => (Some(org.name.as_str()), Some(org.abbreviation.as_str())),
            None => (None, None),
        };
        tx.execute(
            "INSERT INTO player (id, user_id, username, alias, level, experience, cash,\
                 influence, strength, agility, vitality, hit_rate, hp_current, hp_max,\
                 org_name, org_abbreviation, org_base_lat, org_base_lon, lat, lon, seed)\
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,\
                 ?16, ?17, ?18, ?19, ?20)",
            params![
                player.user_id,
                player.username,
                player.alias,
                player.level as i64,
                player.experience as i64,
                player.cash,
                player.attributes.influence as i64,
                player.attributes.strength as i64,
                player.attributes.agility as i64,
                player.attributes.vitality as i64,
                player.attributes.hit_rate as i64,
                player.hp.current as i64,
                player.hp.max as i64,
                org_name,
                org_abbreviation,
                player.org_base_location.map(|pos| pos.lat),
                player.org_base_location.map(|pos| pos.lon),
                player.location.map(|pos| pos.lat),
                player.location.map(|pos| pos.lon),
                state.seed as i64,
            ],
        )?;

        for (position, entry) in player.inventory.iter().enumerate() {
            tx.execute(
                "INSERT INTO inventory (position, item_id, quantity) VALUES (?1, ?2, ?3)",
                params![position as i64, entry.item_id, entry.quantity as i64],
            )?;
        }
        for (slot, item_id) in player.equipment.iter() {
            tx.execute(
                "INSERT INTO equipment (slot, item_id) VALUES (?1, ?2)",
                params![slot.label(), item_id],
            )?;
        }

        for (business_id, saved) in state.businesses.iter() {
            let (org_name, org_abbreviation) = match &saved.protecting_organization {
                Some(org) => (Some(org.name.as_str()), Some(org.abbreviation.as_str())),
                None => (None, None),
            };
            tx.execute(
                "INSERT INTO businesses (business_id, last_collected, org_name, org_abbreviation)\
                 VALUES (?1, ?2, ?3, ?4)",
                params![business_id, saved.last_collected, org_name, org_abbreviation],
            )?;
            for (position, protector) in saved.protecting_users.iter().enumerate() {
                tx.execute(
                    "INSERT INTO protecting_users (business_id, position, user_id, user_power)\
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        business_id,
                        position as i64,
                        protector.user_id,
                        protector.user_power as i64
                    ],
                )?;
            }
        }

        tx.execute(
            "INSERT INTO removal_quota (id, day, used) VALUES (1, ?1, ?2)",
            params![state.removals.day, state.removals.used as i64],
        )?;
        tx.execute(
            "INSERT INTO settings (id, sound_on) VALUES (1, ?1)",
            params![state.settings.sound_on as i64],
        )?;

        tx.commit()?;
        Ok(())
    }

    pub fn read_state(&self) -> Result<Option<SaveState>, SaveDbError> {
        let row = self
            .conn
            .query_row(
                "SELECT user_id, username, alias, level, experience, cash,\
                     influence, strength, agility, vitality, hit_rate, hp_current, hp_max,\
                     org_name, org_abbreviation, org_base_lat, org_base_lon, lat, lon, seed \
                 FROM player WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                        (
                            row.get::<_, i64>(6)?,
                            row.get::<_, i64>(7)?,
                            row.get::<_, i64>(8)?,
                            row.get::<_, i64>(9)?,
                            row.get::<_, i64>(10)?,
                        ),
                        (row.get::<_, i64>(11)?, row.get::<_, i64>(12)?),
                        row.get::<_, Option<String>>(13)?,
                        row.get::<_, Option<String>>(14)?,
                        (
                            row.get::<_, Option<f64>>(15)?,
                            row.get::<_, Option<f64>>(16)?,
                        ),
                        (
                            row.get::<_, Option<f64>>(17)?,
                            row.get::<_, Option<f64>>(18)?,
                        ),
                        row.get::<_, i64>(19)?,
                    ))
                },
            )
            .optional()?;

        let Some((
            user_id,
            username,
            alias,
            level,
            experience,
            cash,
            (influence, strength, agility, vitality, hit_rate),
            (hp_current, hp_max),
            org_name,
            org_abbreviation,
            (org_base_lat, org_base_lon),
            (lat, lon),
            seed,
        )) = row
        else {
            return Ok(None);
        };

        let organization = match (org_name, org_abbreviation) {
            (Some(name), Some(abbreviation)) => Some(OrganizationRef { name, abbreviation }),
            _ => None,
        };
        let org_base_location = match (org_base_lat, org_base_lon) {
            (Some(lat), Some(lon)) => Some(GeoPos { lat, lon }),
            _ => None,
        };
        let location = match (lat, lon) {
            (Some(lat), Some(lon)) => Some(GeoPos { lat, lon }),
            _ => None,
        };

        let inventory = self.read_inventory()?;
        let equipment = self.read_equipment()?;
        let businesses = self.read_businesses()?;
        let mut protected_business_ids: Vec<String> = businesses
            .values()
            .filter(|saved| {
                saved
                    .protecting_users
                    .iter()
                    .any(|protector| protector.user_id == user_id)
            })
            .map(|saved| saved.id.clone())
            .collect();
        protected_business_ids.sort();

        let removals = self
            .conn
            .query_row(
                "SELECT day, used FROM removal_quota WHERE id = 1",
                [],
                |row| {
                    Ok(RemovalQuota {
                        day: row.get(0)?,
                        used: row.get::<_, i64>(1)? as u32,
                    })
                },
            )
            .optional()?
            .unwrap_or_default();

        let sound_on = self
            .conn
            .query_row("SELECT sound_on FROM settings WHERE id = 1", [], |row| {
                row.get::<_, i64>(0)
            })
            .optional()?
            .map(|value| value != 0)
            .unwrap_or(true);

        Ok(Some(SaveState {
            version: 1,
            seed: seed as u64,
            player: SavedPlayer {
                user_id,
                username,
                alias,
                level: level.max(1) as u32,
                experience: experience.max(0) as u64,
                exp_needed: 0,
                cash,
                attributes: Attributes {
                    influence: influence.max(0) as u32,
                    strength: strength.max(0) as u32,
                    agility: agility.max(0) as u32,
                    vitality: vitality.max(0) as u32,
                    hit_rate: hit_rate.max(0) as u32,
                },
                power: 0,
                hp: SavedHealth {
                    current: hp_current as i32,
                    max: hp_max as i32,
                },
                stats: Default::default(),
                inventory,
                equipment,
                organization,
                org_base_location,
                location,
            },
            protected_business_ids,
            businesses,
            removals,
            settings: SavedSettings { sound_on },
        }))
    }

    fn read_inventory(&self) -> Result<Vec<InventoryEntry>, SaveDbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT item_id, quantity FROM inventory ORDER BY position")?;
        let rows = stmt.query_map([], |row| {
            Ok(InventoryEntry {
                item_id: row.get(0)?,
                quantity: row.get::<_, i64>(1)? as u32,
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    fn read_equipment(&self) -> Result<Vec<(Slot, String)>, SaveDbError> {
        let mut stmt = self.conn.prepare("SELECT slot, item_id FROM equipment")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut pairs = Vec::new();
        for row in rows {
            let (slot_label, item_id) = row?;
            let slot = Slot::parse(&slot_label).ok_or_else(|| {
                SaveDbError::InvalidData(format!("unknown equipment slot '{}'", slot_label))
            })?;
            pairs.push((slot, item_id));
        }
        Ok(pairs)
    }

    fn read_businesses(&self) -> Result<HashMap<String, SavedBusinessState>, SaveDbError> {
        let mut protectors: HashMap<String, Vec<Protector>> = HashMap::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT business_id, user_id, user_power FROM protecting_users \
                 ORDER BY business_id, position",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    Protector {
                        user_id: row.get(1)?,
                        user_power: row.get::<_, i64>(2)? as u32,
                    },
                ))
            })?;
            for row in rows {
                let (business_id, protector) = row?;
                protectors.entry(business_id).or_default().push(protector);
            }
        }

        let mut stmt = self.conn.prepare(
            "SELECT business_id, last_collected, org_name, org_abbreviation FROM businesses",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut businesses = HashMap::new();
        for row in rows {
            let (business_id, last_collected, org_name, org_abbreviation) = row?;
            let protecting_organization = match (org_name, org_abbreviation) {
                (Some(name), Some(abbreviation)) => Some(OrganizationRef { name, abbreviation }),
                _ => None,
            };
            let protecting_users = protectors.remove(&business_id).unwrap_or_default();
            let protection_power = protecting_users.iter().map(|p| p.user_power).sum();
            businesses.insert(
                business_id.clone(),
                SavedBusinessState {
                    id: business_id,
                    last_collected,
                    protecting_organization,
                    protection_power,
                    protecting_users,
                },
            );
        }
        Ok(businesses)
    }
}

impl SaveRepository for SaveDb {
    fn load(&mut self) -> Result<Option<SaveState>, Box<dyn std::error::Error>> {
        Ok(self.read_state()?)
    }

    fn save(&mut self, state: &SaveState) -> Result<(), Box<dyn std::error::Error>> {
        self.write_state(state)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> SaveState {
        let mut businesses = HashMap::new();
        businesses.insert(
            "b1".to_string(),
            SavedBusinessState {
                id: "b1".to_string(),
                last_collected: 1_700_000_000_000,
                protecting_organization: Some(OrganizationRef {
                    name: "Iron Hounds".to_string(),
                    abbreviation: "IH".to_string(),
                }),
                protection_power: 5,
                protecting_users: vec![Protector {
                    user_id: "player-1".to_string(),
                    user_power: 5,
                }],
            },
        );
        SaveState {
            version: 1,
            seed: 7,
            player: SavedPlayer {
                user_id: "player-1".to_string(),
                username: "you".to_string(),
                alias: "You".to_string(),
                level: 3,
                experience: 40,
                exp_needed: 300,
                cash: 240,
                attributes: Attributes {
                    influence: 2,
                    strength: 3,
                    agility: 1,
                    vitality: 4,
                    hit_rate: 1,
                },
                power: 11,
                hp: SavedHealth {
                    current: 120,
                    max: 140,
                },
                stats: Default::default(),
                inventory: vec![InventoryEntry {
                    item_id: "bandage".to_string(),
                    quantity: 3,
                }],
                equipment: vec![(Slot::Weapon, "switchblade".to_string())],
                organization: Some(OrganizationRef {
                    name: "Iron Hounds".to_string(),
                    abbreviation: "IH".to_string(),
                }),
                org_base_location: Some(GeoPos {
                    lat: 40.73,
                    lon: -73.99,
                }),
                location: Some(GeoPos {
                    lat: 40.731,
                    lon: -73.991,
                }),
            },
            businesses,
            protected_business_ids: vec!["b1".to_string()],
            removals: RemovalQuota { day: 19_700, used: 1 },
            settings: SavedSettings { sound_on: false },
        }
    }

    #[test]
    fn empty_db_loads_as_no_save() {
        let db = SaveDb::open_in_memory().unwrap();
        assert!(db.read_state().unwrap().is_none());
    }

    #[test]
    fn state_round_trips_through_sqlite() {
        let mut db = SaveDb::open_in_memory().unwrap();
        let state = sample_state();
        db.write_state(&state).unwrap();
        let restored = db.read_state().unwrap().expect("a save exists");

        assert_eq!(restored.seed, 7);
        assert_eq!(restored.player.user_id, "player-1");
        assert_eq!(restored.player.level, 3);
        assert_eq!(restored.player.cash, 240);
        assert_eq!(restored.player.attributes.vitality, 4);
        assert_eq!(restored.player.inventory, state.player.inventory);
        assert_eq!(restored.player.equipment, state.player.equipment);
        assert_eq!(
            restored.player.organization,
            state.player.organization
        );
        assert_eq!(restored.removals.day, 19_700);
        assert_eq!(restored.removals.used, 1);
        assert!(!restored.settings.sound_on);

        let b1 = &restored.businesses["b1"];
        assert_eq!(b1.last_collected, 1_700_000_000_000);
        assert_eq!(b1.protecting_users.len(), 1);
        assert_eq!(b1.protection_power, 5);
    }

    #[test]
    fn saving_twice_overwrites_the_slot() {
        let mut db = SaveDb::open_in_memory().unwrap();
        let mut state = sample_state();
        db.write_state(&state).unwrap();
        state.player.cash = 999;
        state.businesses.clear();
        db.write_state(&state).unwrap();

        let restored = db.read_state().unwrap().expect("a save exists");
        assert_eq!(restored.player.cash, 999);
        assert!(restored.businesses.is_empty());
    }
}
