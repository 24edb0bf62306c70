//! Post-query distance ranking.
//!
//! Distance is a derived attribute computed only at query time against a
//! caller-supplied origin; it is never persisted. Ranking is a pure
//! function of (origin, candidate coordinates) so it carries no storage
//! dependency.

use crate::models::Stakeholder;

/// Approximate miles per degree of latitude.
///
/// Part of the distance contract: downstream consumers depend on the exact
/// constant, so it must not be swapped for a more precise figure.
pub const MILES_PER_DEGREE: f64 = 69.097;

/// Sentinel distance for records missing either coordinate: effectively
/// unknown/far. Sorts last and is excluded by any positive radius filter.
pub const UNKNOWN_DISTANCE_MILES: f64 = 999.0;

/// Approximate planar distance in miles between the origin and a record's
/// coordinates.
///
/// This is a flat-earth approximation: longitude degrees are scaled by
/// `cos(origin latitude)` and the planar hypotenuse is converted at
/// [`MILES_PER_DEGREE`]. It is only valid for short-to-regional distances
/// near the origin's latitude band, which is the directory's use case
/// (search radii of tens of miles). Records missing either coordinate get
/// [`UNKNOWN_DISTANCE_MILES`].
pub fn distance_miles(
    origin_latitude: f64,
    origin_longitude: f64,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> f64 {
    match (latitude, longitude) {
        (Some(lat), Some(lon)) => {
            let dx = (lon - origin_longitude).abs() * origin_latitude.to_radians().cos();
            let dy = (lat - origin_latitude).abs();
            (dx * dx + dy * dy).sqrt() * MILES_PER_DEGREE
        }
        _ => UNKNOWN_DISTANCE_MILES,
    }
}

/// Annotate each record with its distance from the origin, sort ascending
/// (stable for ties), and, when `radius_miles` is positive, drop records
/// farther than the radius. `radius_miles <= 0` means no filtering.
pub fn rank_by_distance(
    stakeholders: &mut Vec<Stakeholder>,
    origin_latitude: f64,
    origin_longitude: f64,
    radius_miles: f64,
) {
    for stakeholder in stakeholders.iter_mut() {
        stakeholder.distance = Some(distance_miles(
            origin_latitude,
            origin_longitude,
            stakeholder.latitude,
            stakeholder.longitude,
        ));
    }
    stakeholders.sort_by(|a, b| {
        a.distance
            .unwrap_or(UNKNOWN_DISTANCE_MILES)
            .total_cmp(&b.distance.unwrap_or(UNKNOWN_DISTANCE_MILES))
    });
    if radius_miles > 0.0 {
        stakeholders.retain(|s| s.distance.unwrap_or(UNKNOWN_DISTANCE_MILES) <= radius_miles);
    }
}
