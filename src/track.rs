use rayon::prelude::*;

use crate::geo::{course_difference, haversine_km, KMH_TO_KNOTS};
use crate::model::{CleanedPosition, Mmsi};

/// Calculated speed is only derived when the gap lies in (0, 24] hours.
pub const MAX_SPEED_WINDOW_HOURS: f64 = 24.0;

pub fn vessel_partitions(positions: &[CleanedPosition]) -> Vec<Vec<&CleanedPosition>> {
    let mut sorted: Vec<&CleanedPosition> = positions.iter().collect();
    sorted.sort_by(|a, b| {
        a.mmsi
            .cmp(&b.mmsi)
            .then(a.timestamp.cmp(&b.timestamp))
            .then(a.lat.total_cmp(&b.lat))
            .then(a.lon.total_cmp(&b.lon))
    });
    sorted
        .chunk_by(|a, b| a.mmsi == b.mmsi)
        .map(<[_]>::to_vec)
        .collect()
}

/// Pair every element of an ordered track with the element before it.
pub fn with_predecessor<'a, T>(track: &'a [T]) -> impl Iterator<Item = (Option<&'a T>, &'a T)> + 'a {
    std::iter::once(None)
        .chain(track.iter().map(Some))
        .zip(track.iter())
}

pub fn elapsed_hours(previous: &CleanedPosition, current: &CleanedPosition) -> f64 {
    (current.timestamp - previous.timestamp).num_milliseconds() as f64 / 3_600_000.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedPoint<'a> {
    pub position: &'a CleanedPosition,
    pub previous: Option<&'a CleanedPosition>,
    pub sequence: u32,
    pub elapsed_hours: Option<f64>,
    pub distance_km: Option<f64>,
    pub calculated_speed_kn: Option<f64>,
    pub course_change_deg: Option<f64>,
    pub speed_discrepancy_kn: Option<f64>,
}

impl<'a> DerivedPoint<'a> {
    fn derive(sequence: u32, previous: Option<&'a CleanedPosition>, position: &'a CleanedPosition) -> Self {
        let Some(prev) = previous else {
            return DerivedPoint {
                position,
                previous: None,
                sequence,
                elapsed_hours: None,
                distance_km: None,
                calculated_speed_kn: None,
                course_change_deg: None,
                speed_discrepancy_kn: None,
            };
        };

        let elapsed = elapsed_hours(prev, position);
        let distance = haversine_km(prev.lat, prev.lon, position.lat, position.lon);
        let calculated_speed = (elapsed > 0.0 && elapsed <= MAX_SPEED_WINDOW_HOURS)
            .then(|| distance / elapsed * KMH_TO_KNOTS);
        let course_change = match (prev.cog, position.cog) {
            (Some(a), Some(b)) => Some(course_difference(a, b)),
            _ => None,
        };
        let speed_discrepancy = match (position.sog, calculated_speed) {
            (Some(sog), Some(calc)) => Some((sog - calc).abs()),
            _ => None,
        };

        DerivedPoint {
            position,
            previous: Some(prev),
            sequence,
            elapsed_hours: Some(elapsed),
            distance_km: Some(distance),
            calculated_speed_kn: calculated_speed,
            course_change_deg: course_change,
            speed_discrepancy_kn: speed_discrepancy,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VesselTrack<'a> {
    pub mmsi: Mmsi,
    pub points: Vec<DerivedPoint<'a>>,
}

fn derive_track<'a>(partition: &[&'a CleanedPosition]) -> VesselTrack<'a> {
    let points = with_predecessor(partition)
        .zip(1u32..)
        .map(|((prev, cur), sequence)| DerivedPoint::derive(sequence, prev.copied(), *cur))
        .collect::<Vec<_>>();
    VesselTrack {
        mmsi: partition[0].mmsi,
        points,
    }
}

pub fn build_tracks(positions: &[CleanedPosition]) -> Vec<VesselTrack<'_>> {
    vessel_partitions(positions)
        .par_iter()
        .map(|partition| derive_track(partition))
        .collect()
}
