use std::collections::HashMap;

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::player::Membership;
use crate::components::world::GeoPos;
use crate::simulation::geo;
use crate::simulation::map_data::FacilityRecord;

pub const TERRITORY_RADIUS_M: f64 = 2_000.0;
pub const PROTECTION_ACTIVATION_RANGE_M: f64 = 2_000.0;
pub const PROFIT_COLLECTION_DISTANCE_M: f64 = 2_000.0;
pub const SHOP_RANGE_M: f64 = 2_000.0;
pub const MANUAL_JOIN_DISTANCE_M: f64 = 2_000.0;
pub const AUTO_JOIN_SEARCH_RADIUS_M: f64 = 10_000.0;

pub const MAX_PROTECTING_USERS: usize = 10;
pub const MAX_PLAYER_PROTECTED_BUSINESSES: usize = 15;
pub const MAX_DAILY_PROTECTION_REMOVALS: u32 = 2;

/// Accrual is capped at one hour; the rate works out to one dollar per
/// second of control.
pub const MAX_ACCUMULATION_MS: i64 = 3_600_000;
pub const PROFIT_RATE_PER_MS: f64 = 0.001;

/// Category tags the upstream provider uses that we accept as businesses.
const BUSINESS_CATEGORIES: &[&str] = &[
    "restaurant",
    "cafe",
    "bar",
    "pub",
    "fast_food",
    "nightclub",
    "casino",
    "bank",
    "supermarket",
    "convenience",
    "pharmacy",
    "clothes",
    "electronics",
    "jewelry",
    "bakery",
    "butcher",
    "car_repair",
];

/// Subset of business categories that double as item shops.
const SHOP_CATEGORIES: &[&str] = &[
    "supermarket",
    "convenience",
    "pharmacy",
    "clothes",
    "electronics",
    "bakery",
];

/// Category tags that classify as organization bases.
const BASE_CATEGORIES: &[&str] = &["townhall", "community_centre", "social_club"];

/// Identifying pair copied (never shared by reference) onto protected
/// businesses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationRef {
    pub name: String,
    pub abbreviation: String,
}

/// One player contributing power to a business's protection total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protector {
    pub user_id: String,
    pub user_power: u32,
}

/// The persisted subset of a business: only protection and collection
/// state survives across sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SavedBusinessState {
    #[serde(default)]
    pub id: String,
    pub last_collected: i64,
    pub protecting_organization: Option<OrganizationRef>,
    pub protection_power: u32,
    pub protecting_users: Vec<Protector>,
}

/// A protectable business on the live map.
#[derive(Debug, Clone)]
pub struct Business {
    pub id: String,
    pub name: String,
    pub location: GeoPos,
    pub category: String,
    pub is_shop: bool,
    /// Milliseconds timestamp of the last collection; 0 = never.
    pub last_collected_at: i64,
    pub protecting_organization: Option<OrganizationRef>,
    pub protecting_users: Vec<Protector>,
    pub protection_power: u32,
    /// Derived each tick from org-base proximity; not persisted.
    pub profit_controlled: bool,
}

impl Business {
    fn from_record(record: &FacilityRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record
                .name
                .clone()
                .unwrap_or_else(|| format!("Unnamed {}", record.category)),
            location: record.location,
            category: record.category.clone(),
            is_shop: SHOP_CATEGORIES.contains(&record.category.as_str()),
            last_collected_at: 0,
            protecting_organization: None,
            protecting_users: Vec::new(),
            protection_power: 0,
            profit_controlled: false,
        }
    }

    pub fn is_protector(&self, user_id: &str) -> bool {
        self.protecting_users
            .iter()
            .any(|protector| protector.user_id == user_id)
    }

    /// Protection state a session needs to remember about this business.
    pub fn has_default_state(&self) -> bool {
        self.last_collected_at == 0 && self.protecting_users.is_empty()
    }

    pub fn saved_state(&self) -> SavedBusinessState {
        SavedBusinessState {
            id: self.id.clone(),
            last_collected: self.last_collected_at,
            protecting_organization: self.protecting_organization.clone(),
            protection_power: self.protection_power,
            protecting_users: self.protecting_users.clone(),
        }
    }

    fn apply_saved_state(&mut self, saved: &SavedBusinessState) {
        self.last_collected_at = saved.last_collected;
        self.protecting_organization = saved.protecting_organization.clone();
        self.protecting_users = saved.protecting_users.clone();
        // Cached totals are re-derived, never trusted from disk.
        self.recompute_protection_power();
        self.profit_controlled = self.last_collected_at > 0;
    }

    fn recompute_protection_power(&mut self) {
        if self.protecting_users.is_empty() {
            self.protecting_organization = None;
            self.protection_power = 0;
        } else {
            self.protection_power = self
                .protecting_users
                .iter()
                .map(|protector| protector.user_power)
                .sum();
        }
    }

    /// Uncollected profit at `now_ms`: elapsed control time, capped at
    /// one hour, times the per-millisecond rate; zero without profit
    /// control.
    pub fn potential_profit(&self, now_ms: i64) -> i64 {
        if !self.profit_controlled || self.last_collected_at == 0 {
            return 0;
        }
        let elapsed = (now_ms - self.last_collected_at).clamp(0, MAX_ACCUMULATION_MS);
        (elapsed as f64 * PROFIT_RATE_PER_MS).floor() as i64
    }
}

/// An organization base on the map. Joining one makes its name the
/// player's organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationBase {
    pub id: String,
    pub name: String,
    pub abbreviation: String,
    pub location: GeoPos,
}

impl OrganizationBase {
    fn from_record(record: &FacilityRecord) -> Self {
        let name = record
            .name
            .clone()
            .unwrap_or_else(|| "Unnamed Organization".to_string());
        Self {
            id: record.id.clone(),
            abbreviation: abbreviate(&name),
            name,
            location: record.location,
        }
    }

    pub fn organization_ref(&self) -> OrganizationRef {
        OrganizationRef {
            name: self.name.clone(),
            abbreviation: self.abbreviation.clone(),
        }
    }
}

/// Uppercase initials, at most three.
fn abbreviate(name: &str) -> String {
    let initials: String = name
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(3)
        .collect();
    if initials.is_empty() {
        "ORG".to_string()
    } else {
        initials.to_uppercase()
    }
}

/// Player-side facts the territory rules read. Built fresh per action
/// from the player's components.
#[derive(Debug, Clone, Copy)]
pub struct PlayerContext<'a> {
    pub user_id: &'a str,
    pub power: u32,
    pub location: Option<GeoPos>,
    pub organization: Option<&'a OrganizationRef>,
    pub base_location: Option<GeoPos>,
}

#[derive(Debug)]
pub enum TerritoryError {
    BusinessNotFound(String),
    BaseNotFound(String),
    NoLocation,
    NoOrganization,
    AlreadyInOrganization(String),
    OutOfRange {
        action: &'static str,
        distance_m: f64,
        limit_m: f64,
    },
    ProtectedByRival {
        organization: String,
    },
    AlreadyProtecting,
    ProtectorLimitReached,
    PlayerProtectionLimitReached,
    NotAProtector,
    RemovalQuotaExhausted,
    ProtectionMismatch,
    NotAShop(String),
    NotSoldHere {
        item_id: String,
    },
    NotEnoughCash {
        price: i64,
        cash: i64,
    },
}

impl std::fmt::Display for TerritoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerritoryError::BusinessNotFound(id) => write!(f, "no such business: {}", id),
            TerritoryError::BaseNotFound(id) => write!(f, "no such organization base: {}", id),
            TerritoryError::NoLocation => write!(f, "no location fix yet"),
            TerritoryError::NoOrganization => write!(f, "you are not in an organization"),
            TerritoryError::AlreadyInOrganization(name) => {
                write!(f, "you already belong to {}", name)
            }
            TerritoryError::OutOfRange {
                action,
                distance_m,
                limit_m,
            } => write!(
                f,
                "too far to {}: {:.0} m away, limit {:.0} m",
                action, distance_m, limit_m
            ),
            TerritoryError::ProtectedByRival { organization } => {
                write!(f, "already protected by {}", organization)
            }
            TerritoryError::AlreadyProtecting => {
                write!(f, "you are already protecting this business")
            }
            TerritoryError::ProtectorLimitReached => write!(
                f,
                "this business already has {} protectors",
                MAX_PROTECTING_USERS
            ),
            TerritoryError::PlayerProtectionLimitReached => write!(
                f,
                "you cannot protect more than {} businesses",
                MAX_PLAYER_PROTECTED_BUSINESSES
            ),
            TerritoryError::NotAProtector => {
                write!(f, "you are not protecting this business")
            }
            TerritoryError::RemovalQuotaExhausted => write!(
                f,
                "daily limit reached: only {} protection removals per day",
                MAX_DAILY_PROTECTION_REMOVALS
            ),
            TerritoryError::ProtectionMismatch => {
                write!(f, "your organization does not protect this business")
            }
            TerritoryError::NotAShop(id) => write!(f, "{} is not a shop", id),
            TerritoryError::NotSoldHere { item_id } => {
                write!(f, "{} is not sold here", item_id)
            }
            TerritoryError::NotEnoughCash { price, cash } => {
                write!(f, "not enough cash: costs ${}, you have ${}", price, cash)
            }
        }
    }
}

impl std::error::Error for TerritoryError {}

/// Per-calendar-day budget of protection removals.
#[derive(Resource, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RemovalQuota {
    pub day: i64,
    pub used: u32,
}

impl RemovalQuota {
    /// Resets the window when the calendar day changes.
    pub fn roll(&mut self, day: i64) {
        if day != self.day {
            self.day = day;
            self.used = 0;
        }
    }

    pub fn remaining(&self) -> u32 {
        MAX_DAILY_PROTECTION_REMOVALS.saturating_sub(self.used)
    }
}

/// Counts of one merge pass, for the action log.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub businesses_added: usize,
    pub businesses_updated: usize,
    pub businesses_evicted: usize,
    pub bases_added: usize,
    pub ignored: usize,
}

/// Live cache of map businesses and organization bases, keyed by stable
/// upstream id.
#[derive(Resource, Debug, Default)]
pub struct BusinessLedger {
    businesses: HashMap<String, Business>,
    bases: HashMap<String, OrganizationBase>,
    /// Saved protection state waiting for its business to be fetched.
    saved_overlay: HashMap<String, SavedBusinessState>,
}

impl BusinessLedger {
    pub fn business(&self, id: &str) -> Option<&Business> {
        self.businesses.get(id)
    }

    pub fn businesses(&self) -> impl Iterator<Item = &Business> {
        self.businesses.values()
    }

    pub fn base(&self, id: &str) -> Option<&OrganizationBase> {
        self.bases.get(id)
    }

    pub fn bases(&self) -> impl Iterator<Item = &OrganizationBase> {
        self.bases.values()
    }

    /// How many businesses this player currently protects, across the
    /// whole cache.
    pub fn protected_count(&self, user_id: &str) -> usize {
        self.businesses
            .values()
            .filter(|business| business.is_protector(user_id))
            .count()
    }

    pub fn protected_ids(&self, user_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .businesses
            .values()
            .filter(|business| business.is_protector(user_id))
            .map(|business| business.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Businesses worth persisting: any non-default protection or
    /// collection state.
    pub fn dirty_businesses(&self) -> impl Iterator<Item = &Business> {
        self.businesses
            .values()
            .filter(|business| !business.has_default_state())
    }

    /// Stashes saved per-business state and overlays it onto anything
    /// already cached. The rest waits for `merge_records` to fetch the
    /// matching ids.
    pub fn restore_saved_state(&mut self, saved: HashMap<String, SavedBusinessState>) {
        self.saved_overlay = saved;
        let ids: Vec<String> = self
            .businesses
            .keys()
            .filter(|id| self.saved_overlay.contains_key(*id))
            .cloned()
            .collect();
        for id in ids {
            if let (Some(business), Some(state)) =
                (self.businesses.get_mut(&id), self.saved_overlay.remove(&id))
            {
                business.apply_saved_state(&state);
            }
        }
    }

    /// Merges one fetched record batch. Keyed by stable id and
    /// idempotent: existing businesses keep their protection and
    /// collection state, records outside the allow-lists are ignored,
    /// and a cached business whose upstream category no longer passes
    /// the filter is evicted.
    pub fn merge_records(&mut self, records: &[FacilityRecord]) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        for record in records {
            let category = record.category.as_str();
            if BASE_CATEGORIES.contains(&category) {
                if !self.bases.contains_key(&record.id) {
                    self.bases
                        .insert(record.id.clone(), OrganizationBase::from_record(record));
                    outcome.bases_added += 1;
                }
            } else if BUSINESS_CATEGORIES.contains(&category) {
                match self.businesses.get_mut(&record.id) {
                    Some(business) => {
                        if let Some(name) = &record.name {
                            business.name = name.clone();
                        }
                        business.location = record.location;
                        business.category = record.category.clone();
                        business.is_shop = SHOP_CATEGORIES.contains(&category);
                        outcome.businesses_updated += 1;
                    }
                    None => {
                        let mut business = Business::from_record(record);
                        if let Some(state) = self.saved_overlay.remove(&record.id) {
                            business.apply_saved_state(&state);
                        }
                        self.businesses.insert(record.id.clone(), business);
                        outcome.businesses_added += 1;
                    }
                }
            } else if self.businesses.remove(&record.id).is_some() {
                outcome.businesses_evicted += 1;
            } else {
                outcome.ignored += 1;
            }
        }
        outcome
    }

    /// Re-evaluates the profit-control predicate for every business.
    /// Entering control starts accrual from now, never retroactively.
    pub fn refresh_profit_control(&mut self, ctx: &PlayerContext<'_>, now_ms: i64) {
        let base = match (ctx.organization, ctx.base_location) {
            (Some(_), Some(base)) => Some(base),
            _ => None,
        };
        for business in self.businesses.values_mut() {
            let controlled = base.map_or(false, |base| {
                geo::distance_m(business.location, base) <= TERRITORY_RADIUS_M
            });
            if controlled && !business.profit_controlled {
                business.last_collected_at = now_ms;
            }
            business.profit_controlled = controlled;
        }
    }

    /// Claims a protection slot for the player. Rejections carry the
    /// exact unmet condition.
    pub fn activate_protection(
        &mut self,
        ctx: &PlayerContext<'_>,
        business_id: &str,
    ) -> Result<(), TerritoryError> {
        let already_protecting = self.protected_count(ctx.user_id);
        let business = self
            .businesses
            .get_mut(business_id)
            .ok_or_else(|| TerritoryError::BusinessNotFound(business_id.to_string()))?;
        let location = ctx.location.ok_or(TerritoryError::NoLocation)?;
        let organization = ctx.organization.ok_or(TerritoryError::NoOrganization)?;

        let distance_m = geo::distance_m(location, business.location);
        if distance_m > PROTECTION_ACTIVATION_RANGE_M {
            return Err(TerritoryError::OutOfRange {
                action: "activate protection",
                distance_m,
                limit_m: PROTECTION_ACTIVATION_RANGE_M,
            });
        }

        if let Some(holder) = &business.protecting_organization {
            if holder != organization {
                // Contested takeovers do not exist; the first organization
                // holds the slot until it is abandoned.
                return Err(TerritoryError::ProtectedByRival {
                    organization: holder.name.clone(),
                });
            }
        }

        if business.is_protector(ctx.user_id) {
            return Err(TerritoryError::AlreadyProtecting);
        }
        if business.protecting_users.len() >= MAX_PROTECTING_USERS {
            return Err(TerritoryError::ProtectorLimitReached);
        }
        if already_protecting >= MAX_PLAYER_PROTECTED_BUSINESSES {
            return Err(TerritoryError::PlayerProtectionLimitReached);
        }

        if business.protecting_organization.as_ref() != Some(organization) {
            business.protecting_users.clear();
            business.protecting_organization = Some(organization.clone());
        }
        business.protecting_users.push(Protector {
            user_id: ctx.user_id.to_string(),
            user_power: ctx.power,
        });
        business.recompute_protection_power();
        Ok(())
    }

    /// Collects accrued profit. Requires the player's organization to be
    /// the protecting organization, not mere proximity.
    pub fn collect_profit(
        &mut self,
        ctx: &PlayerContext<'_>,
        business_id: &str,
        now_ms: i64,
    ) -> Result<i64, TerritoryError> {
        let business = self
            .businesses
            .get_mut(business_id)
            .ok_or_else(|| TerritoryError::BusinessNotFound(business_id.to_string()))?;
        let location = ctx.location.ok_or(TerritoryError::NoLocation)?;
        let organization = ctx.organization.ok_or(TerritoryError::NoOrganization)?;

        if business.protecting_organization.as_ref() != Some(organization) {
            return Err(TerritoryError::ProtectionMismatch);
        }

        let distance_m = geo::distance_m(location, business.location);
        if distance_m > PROFIT_COLLECTION_DISTANCE_M {
            return Err(TerritoryError::OutOfRange {
                action: "collect profit",
                distance_m,
                limit_m: PROFIT_COLLECTION_DISTANCE_M,
            });
        }

        let profit = business.potential_profit(now_ms);
        business.last_collected_at = now_ms;
        Ok(profit)
    }

    /// Withdraws the player from a business's protector list, subject to
    /// the daily quota.
    pub fn remove_player_protection(
        &mut self,
        user_id: &str,
        business_id: &str,
        quota: &mut RemovalQuota,
        day: i64,
    ) -> Result<(), TerritoryError> {
        quota.roll(day);
        if quota.remaining() == 0 {
            return Err(TerritoryError::RemovalQuotaExhausted);
        }
        let business = self
            .businesses
            .get_mut(business_id)
            .ok_or_else(|| TerritoryError::BusinessNotFound(business_id.to_string()))?;
        if !business.is_protector(user_id) {
            return Err(TerritoryError::NotAProtector);
        }
        business
            .protecting_users
            .retain(|protector| protector.user_id != user_id);
        business.recompute_protection_power();
        quota.used += 1;
        Ok(())
    }

    /// Validates a shop purchase and returns the price to debit. The
    /// caller owns the wallet and inventory mutation.
    pub fn check_purchase(
        &self,
        ctx: &PlayerContext<'_>,
        business_id: &str,
        item_id: &str,
        price: i64,
        cash: i64,
    ) -> Result<i64, TerritoryError> {
        let business = self
            .business(business_id)
            .ok_or_else(|| TerritoryError::BusinessNotFound(business_id.to_string()))?;
        if !business.is_shop {
            return Err(TerritoryError::NotAShop(business.name.clone()));
        }
        let location = ctx.location.ok_or(TerritoryError::NoLocation)?;
        let distance_m = geo::distance_m(location, business.location);
        if distance_m > SHOP_RANGE_M {
            return Err(TerritoryError::OutOfRange {
                action: "shop here",
                distance_m,
                limit_m: SHOP_RANGE_M,
            });
        }
        if price <= 0 {
            return Err(TerritoryError::NotSoldHere {
                item_id: item_id.to_string(),
            });
        }
        if cash < price {
            return Err(TerritoryError::NotEnoughCash { price, cash });
        }
        Ok(price)
    }
}

/// Joins the organization anchored at `base_id`. Requires proximity and
/// no current membership.
pub fn join_organization_manually(
    ledger: &BusinessLedger,
    location: Option<GeoPos>,
    membership: &mut Membership,
    base_id: &str,
) -> Result<OrganizationRef, TerritoryError> {
    if let Some(current) = &membership.organization {
        return Err(TerritoryError::AlreadyInOrganization(current.name.clone()));
    }
    let base = ledger
        .base(base_id)
        .ok_or_else(|| TerritoryError::BaseNotFound(base_id.to_string()))?;
    let location = location.ok_or(TerritoryError::NoLocation)?;
    let distance_m = geo::distance_m(location, base.location);
    if distance_m > MANUAL_JOIN_DISTANCE_M {
        return Err(TerritoryError::OutOfRange {
            action: "join this organization",
            distance_m,
            limit_m: MANUAL_JOIN_DISTANCE_M,
        });
    }
    let organization = base.organization_ref();
    membership.organization = Some(organization.clone());
    membership.base_location = Some(base.location);
    Ok(organization)
}

/// Auto-assigns the closest base within the search radius, but only when
/// no base is close enough for a manual choice. Returns None when the
/// player should pick manually or nothing is in range.
pub fn find_and_join_initial_organization(
    ledger: &BusinessLedger,
    location: Option<GeoPos>,
    membership: &mut Membership,
) -> Result<Option<OrganizationRef>, TerritoryError> {
    if let Some(current) = &membership.organization {
        return Err(TerritoryError::AlreadyInOrganization(current.name.clone()));
    }
    let location = location.ok_or(TerritoryError::NoLocation)?;

    let mut closest: Option<(&OrganizationBase, f64)> = None;
    for base in ledger.bases() {
        let distance_m = geo::distance_m(location, base.location);
        if closest.map_or(true, |(_, best)| distance_m < best) {
            closest = Some((base, distance_m));
        }
    }

    match closest {
        Some((_, distance_m)) if distance_m <= MANUAL_JOIN_DISTANCE_M => Ok(None),
        Some((base, distance_m)) if distance_m <= AUTO_JOIN_SEARCH_RADIUS_M => {
            let organization = base.organization_ref();
            membership.organization = Some(organization.clone());
            membership.base_location = Some(base.location);
            Ok(Some(organization))
        }
        _ => Ok(None),
    }
}

/// Clears membership and base location unconditionally. Active
/// protections are left in place.
pub fn leave_organization(membership: &mut Membership) {
    membership.organization = None;
    membership.base_location = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::geo::offset_by_meters;

    const NOW: i64 = 1_700_000_000_000;

    fn origin() -> GeoPos {
        GeoPos {
            lat: 40.7300,
            lon: -73.9900,
        }
    }

    fn record(id: &str, name: &str, category: &str, pos: GeoPos) -> FacilityRecord {
        FacilityRecord {
            id: id.to_string(),
            name: Some(name.to_string()),
            category: category.to_string(),
            location: pos,
        }
    }

    fn ledger_with_scene() -> BusinessLedger {
        let mut ledger = BusinessLedger::default();
        ledger.merge_records(&[
            record("b1", "Corner Cafe", "cafe", origin()),
            record(
                "b2",
                "Night Owl Bar",
                "bar",
                offset_by_meters(origin(), 500.0, 0.0),
            ),
            record(
                "s1",
                "Borough Market",
                "supermarket",
                offset_by_meters(origin(), 0.0, 300.0),
            ),
            record("base1", "Iron Hounds", "social_club", origin()),
            record(
                "base2",
                "Velvet Circle",
                "townhall",
                offset_by_meters(origin(), 6_000.0, 0.0),
            ),
        ]);
        ledger
    }

    fn syndicate() -> OrganizationRef {
        OrganizationRef {
            name: "Iron Hounds".to_string(),
            abbreviation: "IH".to_string(),
        }
    }

    fn ctx<'a>(org: Option<&'a OrganizationRef>, location: Option<GeoPos>) -> PlayerContext<'a> {
        PlayerContext {
            user_id: "u1",
            power: 25,
            location,
            organization: org,
            base_location: org.map(|_| origin()),
        }
    }

    #[test]
    fn classification_splits_businesses_bases_and_junk() {
        let mut ledger = BusinessLedger::default();
        let outcome = ledger.merge_records(&[
            record("b1", "Corner Cafe", "cafe", origin()),
            record("base1", "Iron Hounds", "social_club", origin()),
            record("x1", "Bus Stop", "bus_stop", origin()),
        ]);
        assert_eq!(outcome.businesses_added, 1);
        assert_eq!(outcome.bases_added, 1);
        assert_eq!(outcome.ignored, 1);
        assert!(ledger.business("b1").is_some());
        assert!(ledger.base("base1").is_some());
        assert!(ledger.business("x1").is_none());
    }

    #[test]
    fn merge_is_idempotent_and_keeps_protection_state() {
        let mut ledger = ledger_with_scene();
        let org = syndicate();
        ledger
            .activate_protection(&ctx(Some(&org), Some(origin())), "b1")
            .unwrap();

        let batch = [record("b1", "Corner Cafe", "cafe", origin())];
        ledger.merge_records(&batch);
        ledger.merge_records(&batch);

        let business = ledger.business("b1").unwrap();
        assert_eq!(business.protecting_users.len(), 1);
        assert_eq!(business.protecting_organization, Some(org));
    }

    #[test]
    fn reclassified_records_evict_cached_businesses() {
        let mut ledger = ledger_with_scene();
        let outcome = ledger.merge_records(&[record("b1", "Corner Cafe", "construction", origin())]);
        assert_eq!(outcome.businesses_evicted, 1);
        assert!(ledger.business("b1").is_none());
    }

    #[test]
    fn protection_invariant_holds_through_add_and_remove() {
        let mut ledger = ledger_with_scene();
        let org = syndicate();
        let player = ctx(Some(&org), Some(origin()));

        ledger.activate_protection(&player, "b1").unwrap();
        {
            let business = ledger.business("b1").unwrap();
            assert!(!business.protecting_users.is_empty());
            assert!(business.protecting_organization.is_some());
            assert_eq!(business.protection_power, 25);
        }

        let mut quota = RemovalQuota::default();
        ledger
            .remove_player_protection("u1", "b1", &mut quota, 0)
            .unwrap();
        let business = ledger.business("b1").unwrap();
        assert!(business.protecting_users.is_empty());
        assert!(business.protecting_organization.is_none());
        assert_eq!(business.protection_power, 0);
    }

    #[test]
    fn protection_requires_location_org_and_range() {
        let mut ledger = ledger_with_scene();
        let org = syndicate();

        assert!(matches!(
            ledger.activate_protection(&ctx(Some(&org), None), "b1"),
            Err(TerritoryError::NoLocation)
        ));
        assert!(matches!(
            ledger.activate_protection(&ctx(None, Some(origin())), "b1"),
            Err(TerritoryError::NoOrganization)
        ));

        let far = offset_by_meters(origin(), 0.0, 2_500.0);
        let err = ledger
            .activate_protection(&ctx(Some(&org), Some(far)), "b1")
            .unwrap_err();
        assert!(matches!(err, TerritoryError::OutOfRange { .. }));
    }

    #[test]
    fn rival_protection_is_a_hard_rejection() {
        let mut ledger = ledger_with_scene();
        let rival = OrganizationRef {
            name: "Velvet Circle".to_string(),
            abbreviation: "VC".to_string(),
        };
        let mut rival_ctx = ctx(Some(&rival), Some(origin()));
        rival_ctx.user_id = "u2";
        ledger.activate_protection(&rival_ctx, "b1").unwrap();

        let org = syndicate();
        let err = ledger
            .activate_protection(&ctx(Some(&org), Some(origin())), "b1")
            .unwrap_err();
        assert!(matches!(err, TerritoryError::ProtectedByRival { .. }));
    }

    #[test]
    fn protector_count_never_exceeds_the_cap() {
        let mut ledger = ledger_with_scene();
        let org = syndicate();
        for i in 0..MAX_PROTECTING_USERS {
            let user_id = format!("member-{}", i);
            let mut player = ctx(Some(&org), Some(origin()));
            player.user_id = &user_id;
            ledger.activate_protection(&player, "b1").unwrap();
        }
        let mut player = ctx(Some(&org), Some(origin()));
        player.user_id = "one-too-many";
        assert!(matches!(
            ledger.activate_protection(&player, "b1"),
            Err(TerritoryError::ProtectorLimitReached)
        ));
        assert_eq!(
            ledger.business("b1").unwrap().protecting_users.len(),
            MAX_PROTECTING_USERS
        );
    }

    #[test]
    fn one_player_cannot_protect_more_than_the_global_cap() {
        let mut ledger = BusinessLedger::default();
        let records: Vec<FacilityRecord> = (0..MAX_PLAYER_PROTECTED_BUSINESSES + 1)
            .map(|i| record(&format!("b{}", i), "Cafe", "cafe", origin()))
            .collect();
        ledger.merge_records(&records);

        let org = syndicate();
        let player = ctx(Some(&org), Some(origin()));
        for i in 0..MAX_PLAYER_PROTECTED_BUSINESSES {
            ledger
                .activate_protection(&player, &format!("b{}", i))
                .unwrap();
        }
        assert!(matches!(
            ledger.activate_protection(&player, &format!("b{}", MAX_PLAYER_PROTECTED_BUSINESSES)),
            Err(TerritoryError::PlayerProtectionLimitReached)
        ));
        assert_eq!(
            ledger.protected_count("u1"),
            MAX_PLAYER_PROTECTED_BUSINESSES
        );
    }

    #[test]
    fn profit_needs_control_and_grows_monotonically_to_the_cap() {
        let mut ledger = ledger_with_scene();
        let org = syndicate();
        let player = ctx(Some(&org), Some(origin()));

        assert_eq!(ledger.business("b1").unwrap().potential_profit(NOW), 0);

        ledger.refresh_profit_control(&player, NOW);
        let business = ledger.business("b1").unwrap();
        assert!(business.profit_controlled);
        assert_eq!(business.potential_profit(NOW), 0);

        let mut last = 0;
        for minutes in [1, 10, 30, 59, 60, 90] {
            let profit = business.potential_profit(NOW + minutes * 60_000);
            assert!(profit >= last);
            last = profit;
        }
        // Exactly at the one-hour boundary the cap has no effect yet.
        assert_eq!(business.potential_profit(NOW + 3_600_000), 3_600);
        assert_eq!(business.potential_profit(NOW + 7_200_000), 3_600);
    }

    #[test]
    fn collecting_requires_matching_protection_and_resets_accrual() {
        let mut ledger = ledger_with_scene();
        let org = syndicate();
        let player = ctx(Some(&org), Some(origin()));

        // Proximity control alone is not enough to collect.
        ledger.refresh_profit_control(&player, NOW);
        assert!(matches!(
            ledger.collect_profit(&player, "b1", NOW + 60_000),
            Err(TerritoryError::ProtectionMismatch)
        ));

        ledger.activate_protection(&player, "b1").unwrap();
        let collected = ledger
            .collect_profit(&player, "b1", NOW + 600_000)
            .unwrap();
        assert_eq!(collected, 600);
        assert_eq!(
            ledger
                .business("b1")
                .unwrap()
                .potential_profit(NOW + 600_000),
            0
        );
    }

    #[test]
    fn removal_quota_caps_per_day_and_resets_on_rollover() {
        let mut ledger = ledger_with_scene();
        let org = syndicate();
        let player = ctx(Some(&org), Some(origin()));
        for id in ["b1", "b2", "s1"] {
            ledger.activate_protection(&player, id).unwrap();
        }

        let mut quota = RemovalQuota::default();
        ledger
            .remove_player_protection("u1", "b1", &mut quota, 10)
            .unwrap();
        ledger
            .remove_player_protection("u1", "b2", &mut quota, 10)
            .unwrap();
        assert!(matches!(
            ledger.remove_player_protection("u1", "s1", &mut quota, 10),
            Err(TerritoryError::RemovalQuotaExhausted)
        ));

        // Date rollover grants a fresh budget.
        ledger
            .remove_player_protection("u1", "s1", &mut quota, 11)
            .unwrap();
        assert_eq!(quota.used, 1);
        assert_eq!(ledger.protected_count("u1"), 0);
    }

    #[test]
    fn removing_while_not_a_protector_fails_without_spending_quota() {
        let mut ledger = ledger_with_scene();
        let mut quota = RemovalQuota::default();
        assert!(matches!(
            ledger.remove_player_protection("u1", "b1", &mut quota, 0),
            Err(TerritoryError::NotAProtector)
        ));
        assert_eq!(quota.used, 0);
    }

    #[test]
    fn manual_join_rejects_just_past_the_limit_with_the_distance() {
        let ledger = ledger_with_scene();
        let mut membership = Membership::default();
        let standing = offset_by_meters(origin(), 0.0, 2_001.0);
        let err = join_organization_manually(&ledger, Some(standing), &mut membership, "base1")
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("2001 m"), "{}", message);
        assert!(message.contains("2000 m"), "{}", message);
        assert!(membership.organization.is_none());
    }

    #[test]
    fn manual_join_inside_the_limit_sets_membership_and_base() {
        let ledger = ledger_with_scene();
        let mut membership = Membership::default();
        let org = join_organization_manually(&ledger, Some(origin()), &mut membership, "base1")
            .unwrap();
        assert_eq!(org.name, "Iron Hounds");
        assert_eq!(org.abbreviation, "IH");
        assert_eq!(membership.base_location, Some(origin()));
    }

    #[test]
    fn auto_join_defers_to_manual_choice_when_a_base_is_close() {
        let ledger = ledger_with_scene();
        let mut membership = Membership::default();
        let joined =
            find_and_join_initial_organization(&ledger, Some(origin()), &mut membership).unwrap();
        assert_eq!(joined, None);
        assert!(membership.organization.is_none());
    }

    #[test]
    fn auto_join_takes_the_closest_base_inside_the_search_radius() {
        let ledger = ledger_with_scene();
        let mut membership = Membership::default();
        // 3 km from base1, 3 km beyond manual range but within search
        // range of both bases; base1 is closer.
        let standing = offset_by_meters(origin(), -3_000.0, 0.0);
        let joined =
            find_and_join_initial_organization(&ledger, Some(standing), &mut membership)
                .unwrap()
                .expect("should auto-join");
        assert_eq!(joined.name, "Iron Hounds");
        assert!(membership.base_location.is_some());
    }

    #[test]
    fn leaving_keeps_existing_protections() {
        let mut ledger = ledger_with_scene();
        let org = syndicate();
        let player = ctx(Some(&org), Some(origin()));
        ledger.activate_protection(&player, "b1").unwrap();

        let mut membership = Membership {
            organization: Some(org),
            base_location: Some(origin()),
        };
        leave_organization(&mut membership);
        assert!(membership.organization.is_none());
        assert!(membership.base_location.is_none());
        assert_eq!(ledger.protected_count("u1"), 1);
    }

    #[test]
    fn saved_state_overlays_on_merge_and_rederives_power() {
        let mut ledger = BusinessLedger::default();
        let mut saved = HashMap::new();
        saved.insert(
            "b1".to_string(),
            SavedBusinessState {
                id: "b1".to_string(),
                last_collected: NOW,
                protecting_organization: Some(syndicate()),
                // A stale cached total: must be recomputed from the users.
                protection_power: 9_999,
                protecting_users: vec![Protector {
                    user_id: "u1".to_string(),
                    user_power: 25,
                }],
            },
        );
        ledger.restore_saved_state(saved);
        ledger.merge_records(&[record("b1", "Corner Cafe", "cafe", origin())]);

        let business = ledger.business("b1").unwrap();
        assert_eq!(business.protection_power, 25);
        assert_eq!(business.last_collected_at, NOW);
        assert!(business.profit_controlled);
    }

    #[test]
    fn abbreviations_take_up_to_three_initials() {
        assert_eq!(abbreviate("Iron Hounds"), "IH");
        assert_eq!(abbreviate("Velvet Circle Social Club"), "VCS");
        assert_eq!(abbreviate(""), "ORG");
    }
}
