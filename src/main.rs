use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use turf_syndicate::components::world::GeoPos;
use turf_syndicate::core::world::Snapshot;
use turf_syndicate::data::items::Slot;
use turf_syndicate::save::{SaveDb, SaveRepository};
use turf_syndicate::simulation::geo::BoundingRegion;
use turf_syndicate::simulation::map_data::{
    fetch_or_empty, FacilityRecord, MapDataProvider, StaticMapData,
};
use turf_syndicate::{ActionIntent, Game};

const DEFAULT_SAVE_PATH: &str = "./turf_save.db";
const VIEWPORT_HALF_EXTENT_M: f64 = 3_000.0;

fn main() {
    println!("Initializing Turf Syndicate (debug shell)...");
    let save_path = parse_save_path(env::args().collect());

    let mut repo: Box<dyn SaveRepository> = match SaveDb::open(&save_path) {
        Ok(db) => Box::new(db),
        Err(err) => {
            eprintln!("Failed to open save db at {}: {}", save_path.display(), err);
            std::process::exit(1);
        }
    };

    let mut game = Game::new(default_seed());
    match repo.load() {
        Ok(Some(state)) => {
            println!("Resuming saved session.");
            game.load_state(state);
        }
        Ok(None) => println!("Starting a fresh session."),
        Err(err) => eprintln!("Failed to load saved state: {}", err),
    }

    let mut provider = demo_map_data();
    let mut offset_ms: i64 = 0;

    // First fix + map sync so the shell starts with something on screen.
    let spawn = GeoPos {
        lat: 40.7300,
        lon: -73.9900,
    };
    sync_map(&mut game, &mut provider, spawn);
    let snapshot = game.tick(
        wall_clock_ms() + offset_ms,
        vec![ActionIntent::ReportLocation {
            lat: spawn.lat,
            lon: spawn.lon,
        }],
    );
    print_log(&snapshot);
    print_help();

    let stdin = io::stdin();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, args)) = parts.split_first() else {
            continue;
        };

        let mut intents = Vec::new();
        match command {
            "quit" | "exit" => break,
            "help" => {
                print_help();
                continue;
            }
            "wait" => {
                let minutes: i64 = args.first().and_then(|v| v.parse().ok()).unwrap_or(1);
                offset_ms += minutes * 60_000;
                println!("...{} minute(s) pass.", minutes);
            }
            "goto" => {
                let (Some(lat), Some(lon)) = (
                    args.first().and_then(|v| v.parse::<f64>().ok()),
                    args.get(1).and_then(|v| v.parse::<f64>().ok()),
                ) else {
                    println!("usage: goto <lat> <lon>");
                    continue;
                };
                let here = GeoPos { lat, lon };
                sync_map(&mut game, &mut provider, here);
                intents.push(ActionIntent::ReportLocation { lat, lon });
            }
            "use" => match args.first() {
                Some(item_id) => intents.push(ActionIntent::UseItem {
                    item_id: item_id.to_string(),
                }),
                None => {
                    println!("usage: use <item-id>");
                    continue;
                }
            },
            "equip" => match args.first() {
                Some(item_id) => intents.push(ActionIntent::Equip {
                    item_id: item_id.to_string(),
                }),
                None => {
                    println!("usage: equip <item-id>");
                    continue;
                }
            },
            "unequip" => match args.first().and_then(|v| Slot::parse(v)) {
                Some(slot) => intents.push(ActionIntent::Unequip { slot }),
                None => {
                    println!("usage: unequip <slot> (Head, Mask, Body, ...)");
                    continue;
                }
            },
            "protect" => match args.first() {
                Some(id) => intents.push(ActionIntent::Protect {
                    business_id: id.to_string(),
                }),
                None => {
                    println!("usage: protect <business-id>");
                    continue;
                }
            },
            "collect" => match args.first() {
                Some(id) => intents.push(ActionIntent::CollectProfit {
                    business_id: id.to_string(),
                }),
                None => {
                    println!("usage: collect <business-id>");
                    continue;
                }
            },
            "abandon" => match args.first() {
                Some(id) => intents.push(ActionIntent::AbandonProtection {
                    business_id: id.to_string(),
                }),
                None => {
                    println!("usage: abandon <business-id>");
                    continue;
                }
            },
            "join" => match args.first() {
                Some(id) => intents.push(ActionIntent::JoinOrganization {
                    base_id: id.to_string(),
                }),
                None => {
                    println!("usage: join <base-id>");
                    continue;
                }
            },
            "autojoin" => intents.push(ActionIntent::AutoJoinOrganization),
            "leave" => intents.push(ActionIntent::LeaveOrganization),
            "buy" => match (args.first(), args.get(1)) {
                (Some(business_id), Some(item_id)) => intents.push(ActionIntent::BuyItem {
                    business_id: business_id.to_string(),
                    item_id: item_id.to_string(),
                }),
                _ => {
                    println!("usage: buy <business-id> <item-id>");
                    continue;
                }
            },
            "spawn" => {
                let count: u32 = args.first().and_then(|v| v.parse().ok()).unwrap_or(8);
                intents.push(ActionIntent::SpawnEnemies { count });
            }
            "attack" => match args.first().and_then(|v| v.parse::<u32>().ok()) {
                Some(enemy_id) => intents.push(ActionIntent::Attack { enemy_id }),
                None => {
                    println!("usage: attack <enemy-id>");
                    continue;
                }
            },
            "sound" => intents.push(ActionIntent::ToggleSound),
            "status" | "map" | "inv" | "enemies" => {}
            other => {
                println!("Unknown command '{}'. Try 'help'.", other);
                continue;
            }
        }

        let snapshot = game.tick(wall_clock_ms() + offset_ms, intents);
        print_log(&snapshot);
        match command {
            "status" => print_status(&snapshot),
            "map" => print_map(&snapshot),
            "inv" => print_inventory(&snapshot),
            "enemies" => print_enemies(&snapshot),
            _ => {}
        }

        if snapshot.needs_save {
            if let Err(err) = repo.save(&game.save_state()) {
                // A failed write is a warning; the session continues in memory.
                eprintln!("Warning: failed to persist state: {}", err);
            }
        }
    }

    println!("Goodbye.");
}

fn parse_save_path(args: Vec<String>) -> PathBuf {
    let mut path = PathBuf::from(DEFAULT_SAVE_PATH);
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--save" {
            if let Some(value) = iter.next() {
                path = PathBuf::from(value);
            }
        }
    }
    path
}

fn wall_clock_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn default_seed() -> u64 {
    wall_clock_ms() as u64 | 1
}

fn sync_map(game: &mut Game, provider: &mut dyn MapDataProvider, center: GeoPos) {
    let region = BoundingRegion::around(center, VIEWPORT_HALF_EXTENT_M);
    let (records, err) = fetch_or_empty(provider, region);
    if let Some(err) = err {
        eprintln!("Warning: {}", err);
    }
    let outcome = game.merge_map_records(&records);
    if outcome.businesses_added > 0 || outcome.bases_added > 0 || outcome.businesses_evicted > 0 {
        println!(
            "Map sync: {} businesses added, {} updated, {} evicted, {} bases.",
            outcome.businesses_added,
            outcome.businesses_updated,
            outcome.businesses_evicted,
            outcome.bases_added
        );
    }
}

fn print_log(snapshot: &Snapshot) {
    for line in &snapshot.action_log {
        println!("  {}", line);
    }
}

fn print_status(snapshot: &Snapshot) {
    let p = &snapshot.player;
    println!(
        "{} (lvl {}, {} / {} exp)  HP {} / {}  ${}  power {}",
        p.alias, p.level, p.experience, p.exp_needed, p.hp.0, p.hp.1, p.cash, p.power
    );
    println!(
        "dmg {}  def {}  eva {:.1}  crit {:.1}",
        p.stats.damage, p.stats.defence, p.stats.evasion_rate, p.stats.critical_rate
    );
    match &p.organization {
        Some(org) => println!("organization: {}", org),
        None => println!("organization: none"),
    }
    match p.location {
        Some(pos) => println!("location: {:.4}, {:.4}", pos.lat, pos.lon),
        None => println!("location: unknown"),
    }
}

fn print_map(snapshot: &Snapshot) {
    for base in &snapshot.bases {
        println!("[base] {}  {} [{}]", base.id, base.name, base.abbreviation);
    }
    for business in &snapshot.businesses {
        let protection = match &business.protected_by {
            Some(abbr) => format!(
                "protected by {} ({}, power {})",
                abbr, business.protectors, business.protection_power
            ),
            None => "unprotected".to_string(),
        };
        let shop = if business.is_shop { " [shop]" } else { "" };
        let profit = if business.profit_controlled {
            format!("  accrued ${}", business.potential_profit)
        } else {
            String::new()
        };
        println!(
            "[biz]  {}  {} ({}){}  {}{}",
            business.id, business.name, business.category, shop, protection, profit
        );
    }
}

fn print_inventory(snapshot: &Snapshot) {
    if snapshot.player.inventory.is_empty() {
        println!("  (inventory empty)");
    }
    for (name, quantity) in &snapshot.player.inventory {
        println!("  {} x{}", name, quantity);
    }
    for (slot, name) in &snapshot.player.equipment {
        println!("  [{}] {}", slot.label(), name);
    }
}

fn print_enemies(snapshot: &Snapshot) {
    if snapshot.enemies.is_empty() {
        println!("  (no enemies nearby)");
    }
    for enemy in &snapshot.enemies {
        println!(
            "  #{} {} (power {})  {} / {} HP  facing {}",
            enemy.id,
            enemy.name,
            enemy.power,
            enemy.hp.0,
            enemy.hp.1,
            enemy.facing.label()
        );
    }
}

fn print_help() {
    println!("commands:");
    println!("  status | map | inv | enemies");
    println!("  goto <lat> <lon>      report a location fix");
    println!("  join <base-id> | autojoin | leave");
    println!("  protect <id> | collect <id> | abandon <id>");
    println!("  buy <business-id> <item-id>");
    println!("  use <item-id> | equip <item-id> | unequip <slot>");
    println!("  spawn [n] | attack <enemy-id>");
    println!("  wait [minutes] | sound | quit");
}

/// A small canned downtown so the shell works offline.
fn demo_map_data() -> StaticMapData {
    let records = vec![
        facility("n1", "Corner Cafe", "cafe", 40.7302, -73.9895),
        facility("n2", "Night Owl Bar", "bar", 40.7310, -73.9912),
        facility("n3", "Borough Market", "supermarket", 40.7295, -73.9904),
        facility("n4", "Lucky Star Casino", "casino", 40.7288, -73.9889),
        facility("n5", "Hegemony Bank", "bank", 40.7315, -73.9880),
        facility("n6", "Dockside Pharmacy", "pharmacy", 40.7320, -73.9931),
        facility("n7", "Iron Hounds Club", "social_club", 40.7305, -73.9902),
        facility("n8", "Velvet Circle Hall", "townhall", 40.7405, -73.9790),
        facility("n9", "Old Depot", "warehouse", 40.7299, -73.9921),
    ];
    StaticMapData { records }
}

fn facility(id: &str, name: &str, category: &str, lat: f64, lon: f64) -> FacilityRecord {
    FacilityRecord {
        id: id.to_string(),
        name: Some(name.to_string()),
        category: category.to_string(),
        location: GeoPos { lat, lon },
    }
}
