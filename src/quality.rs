use std::collections::VecDeque;

use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::Serialize;

use crate::model::Mmsi;
use crate::track::{DerivedPoint, VesselTrack};

pub const MAX_MATERIALIZED_GAP_HOURS: f64 = 72.0;
pub const MIN_MATERIALIZED_QUALITY: f64 = 0.3;
pub const SPEED_WINDOW: usize = 5;

const ANOMALOUS_SPEED_KN: f64 = 60.0;
const SPEED_DISCREPANCY_KN: f64 = 30.0;
const COURSE_JUMP_DEG: f64 = 90.0;
const COURSE_JUMP_WINDOW_HOURS: f64 = 5.0 / 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContinuityClass {
    FirstPosition,
    DataGap,
    HighFrequency,
    NormalFrequency,
    LowFrequency,
    DailyReport,
    LargeGap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementClass {
    Initial,
    StationaryOrGap,
    Anchored,
    SlowMovement,
    NormalTransit,
    FastTransit,
    HighSpeed,
    AnomalousSpeed,
}

pub fn continuity_class(point: &DerivedPoint) -> ContinuityClass {
    match (point.sequence, point.elapsed_hours) {
        (1, _) => ContinuityClass::FirstPosition,
        (_, None) => ContinuityClass::DataGap,
        (_, Some(h)) if h <= 0.5 => ContinuityClass::HighFrequency,
        (_, Some(h)) if h <= 2.0 => ContinuityClass::NormalFrequency,
        (_, Some(h)) if h <= 6.0 => ContinuityClass::LowFrequency,
        (_, Some(h)) if h <= 24.0 => ContinuityClass::DailyReport,
        (_, Some(_)) => ContinuityClass::LargeGap,
    }
}

pub fn movement_class(point: &DerivedPoint) -> MovementClass {
    match (point.sequence, point.calculated_speed_kn) {
        (1, _) => MovementClass::Initial,
        (_, None) => MovementClass::StationaryOrGap,
        (_, Some(kn)) if kn < 0.5 => MovementClass::Anchored,
        (_, Some(kn)) if kn < 5.0 => MovementClass::SlowMovement,
        (_, Some(kn)) if kn < 15.0 => MovementClass::NormalTransit,
        (_, Some(kn)) if kn < 25.0 => MovementClass::FastTransit,
        (_, Some(kn)) if kn < 60.0 => MovementClass::HighSpeed,
        (_, Some(_)) => MovementClass::AnomalousSpeed,
    }
}

/// Confidence in a derived point, always within [0, 1].
pub fn quality_score(point: &DerivedPoint) -> f64 {
    match point {
        p if p.sequence == 1 => 0.8,
        DerivedPoint { elapsed_hours: None, .. } => 0.3,
        DerivedPoint { elapsed_hours: Some(h), .. } if *h > 24.0 => 0.4,
        DerivedPoint { speed_discrepancy_kn: Some(d), .. } if *d > SPEED_DISCREPANCY_KN => 0.5,
        DerivedPoint { elapsed_hours: Some(h), distance_km: Some(_), .. } if *h <= 2.0 => 1.0,
        DerivedPoint { elapsed_hours: Some(h), .. } if *h <= 6.0 => 0.9,
        _ => 0.7,
    }
}

/// Informational only; the anomaly detector applies its own rules.
pub fn has_potential_anomaly(point: &DerivedPoint) -> bool {
    let too_fast = point.calculated_speed_kn.is_some_and(|kn| kn > ANOMALOUS_SPEED_KN);
    let sharp_turn = matches!(
        (point.course_change_deg, point.elapsed_hours),
        (Some(deg), Some(h)) if deg > COURSE_JUMP_DEG && h <= COURSE_JUMP_WINDOW_HOURS
    );
    let discrepancy = point
        .speed_discrepancy_kn
        .is_some_and(|d| d > SPEED_DISCREPANCY_KN);
    too_fast || sharp_turn || discrepancy
}

fn is_materialized(point: &TrackPoint) -> bool {
    point.quality_score >= MIN_MATERIALIZED_QUALITY
        && !point
            .elapsed_hours
            .is_some_and(|h| h > MAX_MATERIALIZED_GAP_HOURS)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackPoint {
    pub mmsi: Mmsi,
    pub position_timestamp: NaiveDateTime,
    pub sequence: u32,
    pub lat: f64,
    pub lon: f64,
    pub sog: Option<f64>,
    pub cog: Option<f64>,
    pub heading: Option<u16>,
    pub prev_timestamp: Option<NaiveDateTime>,
    pub prev_lat: Option<f64>,
    pub prev_lon: Option<f64>,
    pub prev_sog: Option<f64>,
    pub prev_cog: Option<f64>,
    pub elapsed_hours: Option<f64>,
    pub distance_km: Option<f64>,
    pub calculated_speed_kn: Option<f64>,
    pub course_change_deg: Option<f64>,
    pub speed_discrepancy_kn: Option<f64>,
    pub continuity: ContinuityClass,
    pub movement: MovementClass,
    pub quality_score: f64,
    pub has_potential_anomaly: bool,
    pub cumulative_distance_km: f64,
    pub moving_avg_speed_kn: f64,
    pub running_avg_quality: f64,
    pub point_count: u32,
}

#[derive(Debug, Default)]
struct RunningTotals {
    distance_km: f64,
    quality_sum: f64,
    count: u32,
    recent_speeds: VecDeque<f64>,
}

impl RunningTotals {
    fn push(&mut self, point: &DerivedPoint, quality: f64) -> (f64, f64, f64, u32) {
        self.distance_km += point.distance_km.unwrap_or(0.0);
        self.quality_sum += quality;
        self.count += 1;

        self.recent_speeds.push_back(point.calculated_speed_kn.unwrap_or(0.0));
        if self.recent_speeds.len() > SPEED_WINDOW {
            self.recent_speeds.pop_front();
        }
        let moving_avg = self.recent_speeds.iter().sum::<f64>() / self.recent_speeds.len() as f64;

        (
            self.distance_km,
            moving_avg,
            self.quality_sum / self.count as f64,
            self.count,
        )
    }
}

fn classify_point(point: &DerivedPoint, totals: &mut RunningTotals) -> TrackPoint {
    let quality = quality_score(point);
    let (cumulative_distance, moving_avg_speed, running_avg_quality, point_count) =
        totals.push(point, quality);
    let position = point.position;
    let previous = point.previous;

    TrackPoint {
        mmsi: position.mmsi,
        position_timestamp: position.timestamp,
        sequence: point.sequence,
        lat: position.lat,
        lon: position.lon,
        sog: position.sog,
        cog: position.cog,
        heading: position.heading,
        prev_timestamp: previous.map(|p| p.timestamp),
        prev_lat: previous.map(|p| p.lat),
        prev_lon: previous.map(|p| p.lon),
        prev_sog: previous.and_then(|p| p.sog),
        prev_cog: previous.and_then(|p| p.cog),
        elapsed_hours: point.elapsed_hours,
        distance_km: point.distance_km,
        calculated_speed_kn: point.calculated_speed_kn,
        course_change_deg: point.course_change_deg,
        speed_discrepancy_kn: point.speed_discrepancy_kn,
        continuity: continuity_class(point),
        movement: movement_class(point),
        quality_score: quality,
        has_potential_anomaly: has_potential_anomaly(point),
        cumulative_distance_km: cumulative_distance,
        moving_avg_speed_kn: moving_avg_speed,
        running_avg_quality,
        point_count,
    }
}

pub fn classify_track(track: &VesselTrack) -> Vec<TrackPoint> {
    let mut totals = RunningTotals::default();
    track
        .points
        .iter()
        .map(|point| classify_point(point, &mut totals))
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct ClassifiedTracks {
    pub points: Vec<TrackPoint>,
    pub excluded: usize,
}

pub fn classify(tracks: &[VesselTrack]) -> ClassifiedTracks {
    let per_vessel: Vec<Vec<TrackPoint>> = tracks.par_iter().map(classify_track).collect();

    let mut out = ClassifiedTracks::default();
    for point in per_vessel.into_iter().flatten() {
        if is_materialized(&point) {
            out.points.push(point);
        } else {
            out.excluded += 1;
        }
    }
    out
}
