use bevy_ecs::prelude::*;

use crate::components::player::{Attributes, Membership, PlayerLocation, PlayerProfile, Wallet};
use crate::components::world::Player;
use crate::core::world::{ActionIntent, ActionQueue};
use crate::data::items::ItemCatalog;
use crate::simulation::inventory::InventoryStore;
use crate::simulation::territory::{
    find_and_join_initial_organization, join_organization_manually, leave_organization,
    BusinessLedger, PlayerContext, RemovalQuota, TerritoryError,
};
use crate::simulation::time::GameClock;
use crate::systems::{ActionLog, PersistRequest};

fn context<'a>(
    profile: &'a PlayerProfile,
    attributes: &Attributes,
    location: &PlayerLocation,
    membership: &'a Membership,
) -> PlayerContext<'a> {
    PlayerContext {
        user_id: &profile.user_id,
        power: attributes.power(),
        location: location.0,
        organization: membership.organization.as_ref(),
        base_location: membership.base_location,
    }
}

/// System: territory-economy intents plus the per-tick profit-control
/// refresh.
pub fn territory_system(
    intents: Res<ActionQueue>,
    clock: Res<GameClock>,
    catalog: Res<ItemCatalog>,
    mut ledger: ResMut<BusinessLedger>,
    mut quota: ResMut<RemovalQuota>,
    mut inventory: ResMut<InventoryStore>,
    mut log: ResMut<ActionLog>,
    mut persist: ResMut<PersistRequest>,
    mut player: Query<
        (
            &PlayerProfile,
            &Attributes,
            &PlayerLocation,
            &mut Membership,
            &mut Wallet,
        ),
        With<Player>,
    >,
) {
    let Ok((profile, attributes, location, mut membership, mut wallet)) = player.get_single_mut()
    else {
        return;
    };

    for intent in intents.0.iter() {
        match intent {
            ActionIntent::Protect { business_id } => {
                let ctx = context(profile, attributes, location, &membership);
                match ledger.activate_protection(&ctx, business_id) {
                    Ok(()) => {
                        if let Some(business) = ledger.business(business_id) {
                            log.push(format!(
                                "Now protecting {} ({} protectors, power {}).",
                                business.name,
                                business.protecting_users.len(),
                                business.protection_power
                            ));
                        }
                        persist.0 = true;
                    }
                    Err(err) => log.push(err.to_string()),
                }
            }
            ActionIntent::CollectProfit { business_id } => {
                let ctx = context(profile, attributes, location, &membership);
                match ledger.collect_profit(&ctx, business_id, clock.now_ms) {
                    Ok(amount) => {
                        wallet.cash += amount;
                        let name = ledger
                            .business(business_id)
                            .map(|business| business.name.clone())
                            .unwrap_or_else(|| business_id.clone());
                        log.push(format!("Collected ${} from {}.", amount, name));
                        persist.0 = true;
                    }
                    Err(err) => log.push(err.to_string()),
                }
            }
            ActionIntent::AbandonProtection { business_id } => {
                match ledger.remove_player_protection(
                    &profile.user_id,
                    business_id,
                    &mut quota,
                    clock.day_number(),
                ) {
                    Ok(()) => {
                        let name = ledger
                            .business(business_id)
                            .map(|business| business.name.clone())
                            .unwrap_or_else(|| business_id.clone());
                        log.push(format!(
                            "Stopped protecting {} ({} removals left today).",
                            name,
                            quota.remaining()
                        ));
                        persist.0 = true;
                    }
                    Err(err) => log.push(err.to_string()),
                }
            }
            ActionIntent::JoinOrganization { base_id } => {
                match join_organization_manually(
                    &ledger,
                    location.0,
                    &mut membership,
                    base_id,
                ) {
                    Ok(org) => {
                        log.push(format!("Joined {} [{}].", org.name, org.abbreviation));
                        persist.0 = true;
                    }
                    Err(err) => log.push(err.to_string()),
                }
            }
            ActionIntent::AutoJoinOrganization => {
                match find_and_join_initial_organization(&ledger, location.0, &mut membership) {
                    Ok(Some(org)) => {
                        log.push(format!(
                            "Assigned to the closest organization: {} [{}].",
                            org.name, org.abbreviation
                        ));
                        persist.0 = true;
                    }
                    Ok(None) => log.push(
                        "No automatic assignment: choose an organization base nearby.",
                    ),
                    Err(err) => log.push(err.to_string()),
                }
            }
            ActionIntent::LeaveOrganization => {
                if membership.organization.is_none() {
                    log.push(TerritoryError::NoOrganization.to_string());
                } else {
                    leave_organization(&mut membership);
                    log.push("Left the organization.");
                    persist.0 = true;
                }
            }
            ActionIntent::BuyItem {
                business_id,
                item_id,
            } => {
                let ctx = context(profile, attributes, location, &membership);
                let price = match catalog.get(item_id) {
                    Some(def) => def.price,
                    None => {
                        log.push(format!("no such item: {}", item_id));
                        continue;
                    }
                };
                match ledger.check_purchase(&ctx, business_id, item_id, price, wallet.cash) {
                    Ok(price) => match inventory.add(&catalog, item_id, 1) {
                        Ok(()) => {
                            wallet.cash -= price;
                            let name = catalog
                                .get(item_id)
                                .map(|def| def.name.clone())
                                .unwrap_or_else(|| item_id.clone());
                            log.push(format!("Bought {} for ${}.", name, price));
                            persist.0 = true;
                        }
                        Err(err) => log.push(err.to_string()),
                    },
                    Err(err) => log.push(err.to_string()),
                }
            }
            _ => {}
        }
    }

    // Membership may have changed above; re-derive profit control before
    // anything downstream reads accrual.
    let ctx = context(profile, attributes, location, &membership);
    ledger.refresh_profit_control(&ctx, clock.now_ms);
}
