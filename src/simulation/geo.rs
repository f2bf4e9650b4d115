use serde::{Deserialize, Serialize};

use crate::components::world::GeoPos;
use crate::simulation::rng;

const EARTH_RADIUS_M: f64 = 6_371_000.0;
// Derived from the same sphere as the haversine distance, so offsetting
// by N meters and measuring the distance back agree.
const METERS_PER_DEG_LAT: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

/// Great-circle distance between two points, in meters.
pub fn distance_m(a: GeoPos, b: GeoPos) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Offsets a point by (east, north) meters. Longitude is stretched by
/// cos(lat) to compensate for meridian convergence.
pub fn offset_by_meters(origin: GeoPos, east_m: f64, north_m: f64) -> GeoPos {
    let lat = origin.lat + north_m / METERS_PER_DEG_LAT;
    let lon = origin.lon + east_m / (METERS_PER_DEG_LAT * origin.lat.to_radians().cos());
    GeoPos { lat, lon }
}

/// Area-uniform random point within `radius_m` of `center`. The square
/// root keeps density uniform over the disk instead of clustering at the
/// center.
pub fn random_point_in_radius(center: GeoPos, radius_m: f64, rng_state: &mut u64) -> GeoPos {
    let r = radius_m * rng::roll_unit(rng_state).sqrt();
    let theta = rng::roll_unit(rng_state) * std::f64::consts::TAU;
    offset_by_meters(center, r * theta.cos(), r * theta.sin())
}

/// Rectangular map viewport reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingRegion {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingRegion {
    /// Region spanning `half_extent_m` meters in each direction around a point.
    pub fn around(center: GeoPos, half_extent_m: f64) -> Self {
        let north_edge = offset_by_meters(center, 0.0, half_extent_m);
        let south_edge = offset_by_meters(center, 0.0, -half_extent_m);
        let east_edge = offset_by_meters(center, half_extent_m, 0.0);
        let west_edge = offset_by_meters(center, -half_extent_m, 0.0);
        Self {
            south: south_edge.lat,
            west: west_edge.lon,
            north: north_edge.lat,
            east: east_edge.lon,
        }
    }

    pub fn contains(&self, p: GeoPos) -> bool {
        p.lat >= self.south && p.lat <= self.north && p.lon >= self.west && p.lon <= self.east
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_of_one_degree_latitude() {
        let a = GeoPos { lat: 0.0, lon: 0.0 };
        let b = GeoPos { lat: 1.0, lon: 0.0 };
        let d = distance_m(a, b);
        assert!((d - 111_195.0).abs() < 200.0, "got {}", d);
    }

    #[test]
    fn offset_round_trips_through_distance() {
        let origin = GeoPos {
            lat: 52.52,
            lon: 13.405,
        };
        let moved = offset_by_meters(origin, 300.0, 400.0);
        let d = distance_m(origin, moved);
        assert!((d - 500.0).abs() < 5.0, "got {}", d);
    }

    #[test]
    fn random_points_stay_inside_the_disk() {
        let center = GeoPos {
            lat: 40.73,
            lon: -73.99,
        };
        let mut rng = 1234u64;
        for _ in 0..200 {
            let p = random_point_in_radius(center, 1_000.0, &mut rng);
            assert!(distance_m(center, p) <= 1_001.0);
        }
    }

    #[test]
    fn region_contains_its_center() {
        let center = GeoPos {
            lat: 40.73,
            lon: -73.99,
        };
        let region = BoundingRegion::around(center, 500.0);
        assert!(region.contains(center));
        assert!(!region.contains(offset_by_meters(center, 0.0, 600.0)));
    }
}
