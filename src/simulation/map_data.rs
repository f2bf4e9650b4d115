use serde::{Deserialize, Serialize};

use crate::components::world::GeoPos;
use crate::simulation::geo::BoundingRegion;

/// One raw facility reported by the upstream map-data provider, before
/// classification into businesses and bases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub category: String,
    pub location: GeoPos,
}

#[derive(Debug)]
pub enum MapDataError {
    Unavailable(String),
    Malformed(String),
}

impl std::fmt::Display for MapDataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapDataError::Unavailable(reason) => {
                write!(f, "map data unavailable: {}", reason)
            }
            MapDataError::Malformed(reason) => {
                write!(f, "map data malformed: {}", reason)
            }
        }
    }
}

impl std::error::Error for MapDataError {}

/// Seam to the external map-data provider. Implementations fetch raw
/// facility records for a viewport; retry policy is theirs, not ours.
pub trait MapDataProvider {
    fn fetch_facilities(
        &mut self,
        region: BoundingRegion,
    ) -> Result<Vec<FacilityRecord>, MapDataError>;
}

/// Degrades a failed fetch into an empty batch so a sync cycle adds
/// nothing instead of aborting; the error is handed back for logging.
pub fn fetch_or_empty(
    provider: &mut dyn MapDataProvider,
    region: BoundingRegion,
) -> (Vec<FacilityRecord>, Option<MapDataError>) {
    match provider.fetch_facilities(region) {
        Ok(records) => (records, None),
        Err(err) => (Vec::new(), Some(err)),
    }
}

/// Canned provider used by the debug binary and tests.
#[derive(Debug, Default, Clone)]
pub struct StaticMapData {
    pub records: Vec<FacilityRecord>,
}

impl MapDataProvider for StaticMapData {
    fn fetch_facilities(
        &mut self,
        region: BoundingRegion,
    ) -> Result<Vec<FacilityRecord>, MapDataError> {
        Ok(self
            .records
            .iter()
            .filter(|record| region.contains(record.location))
            .cloned()
            .collect())
    }
}
