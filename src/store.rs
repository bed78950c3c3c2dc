use std::collections::BTreeMap;
use std::ops::Range;

use chrono::NaiveDateTime;

use crate::anomaly::AnomalyEvent;
use crate::engine::RunOutput;
use crate::error::{EngineError, Result};
use crate::geo::haversine_km;
use crate::model::{CleanedPosition, Mmsi, MMSI_MAX, MMSI_MIN};
use crate::quality::TrackPoint;

pub const MAX_ANOMALY_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct VesselSummary {
    pub mmsi: Mmsi,
    pub vessel_name: Option<String>,
    pub imo: Option<String>,
    pub call_sign: Option<String>,
    pub vessel_type: Option<u16>,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub draft: Option<f64>,
    pub cargo: Option<u16>,
    pub transceiver_class: Option<String>,
    pub last_seen: NaiveDateTime,
}

/// Contiguous index ranges per vessel. Each output is already sorted by mmsi.
fn index_by_vessel<T>(rows: &[T], mmsi: impl Fn(&T) -> Mmsi) -> BTreeMap<Mmsi, Range<usize>> {
    let mut index = BTreeMap::new();
    let mut start = 0;
    for chunk in rows.chunk_by(|a, b| mmsi(a) == mmsi(b)) {
        index.insert(mmsi(&chunk[0]), start..start + chunk.len());
        start += chunk.len();
    }
    index
}

fn check_mmsi(mmsi: Mmsi) -> Result<Mmsi> {
    if (MMSI_MIN..=MMSI_MAX).contains(&mmsi) {
        Ok(mmsi)
    } else {
        Err(EngineError::InvalidMmsi(mmsi))
    }
}

pub struct TrackStore {
    output: RunOutput,
    positions: BTreeMap<Mmsi, Range<usize>>,
    points: BTreeMap<Mmsi, Range<usize>>,
    anomalies: BTreeMap<Mmsi, Range<usize>>,
}

impl TrackStore {
    pub fn new(output: RunOutput) -> Self {
        let positions = index_by_vessel(&output.positions, |p| p.mmsi);
        let points = index_by_vessel(&output.track_points, |p| p.mmsi);
        let anomalies = index_by_vessel(&output.anomalies, |e| e.mmsi);
        TrackStore {
            output,
            positions,
            points,
            anomalies,
        }
    }

    pub fn vessels(&self) -> impl Iterator<Item = Mmsi> + '_ {
        self.positions.keys().copied()
    }

    fn positions_of(&self, mmsi: Mmsi) -> &[CleanedPosition] {
        self.positions
            .get(&mmsi)
            .map_or(&[][..], |r| &self.output.positions[r.clone()])
    }

    pub fn latest_position(&self, mmsi: Mmsi) -> Result<Option<&CleanedPosition>> {
        Ok(self.positions_of(check_mmsi(mmsi)?).last())
    }

    pub fn vessel_summary(&self, mmsi: Mmsi) -> Result<Option<VesselSummary>> {
        Ok(self.latest_position(mmsi)?.map(|p| VesselSummary {
            mmsi: p.mmsi,
            vessel_name: p.vessel_name.clone(),
            imo: p.imo.clone(),
            call_sign: p.call_sign.clone(),
            vessel_type: p.vessel_type,
            length: p.length,
            width: p.width,
            draft: p.draft,
            cargo: p.cargo,
            transceiver_class: p.transceiver_class.clone(),
            last_seen: p.timestamp,
        }))
    }

    /// Cleaned positions within `[start, end]`, oldest first, at most `limit`.
    pub fn positions(
        &self,
        mmsi: Mmsi,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
        limit: usize,
    ) -> Result<Vec<&CleanedPosition>> {
        let rows = self.positions_of(check_mmsi(mmsi)?);
        let from = start.map_or(0, |s| rows.partition_point(|p| p.timestamp < s));
        let to = end.map_or(rows.len(), |e| rows.partition_point(|p| p.timestamp <= e));
        Ok(rows[from..to.max(from)].iter().take(limit).collect())
    }

    pub fn track(&self, mmsi: Mmsi) -> Result<&[TrackPoint]> {
        let mmsi = check_mmsi(mmsi)?;
        Ok(self
            .points
            .get(&mmsi)
            .map_or(&[][..], |r| &self.output.track_points[r.clone()]))
    }

    /// Newest anomalies first, optionally only those at or after `since`.
    pub fn anomalies(&self, mmsi: Mmsi, since: Option<NaiveDateTime>, limit: usize) -> Result<Vec<&AnomalyEvent>> {
        let mmsi = check_mmsi(mmsi)?;
        let limit = limit.clamp(1, MAX_ANOMALY_LIMIT);
        let rows = self
            .anomalies
            .get(&mmsi)
            .map_or(&[][..], |r| &self.output.anomalies[r.clone()]);
        let mut items: Vec<&AnomalyEvent> = rows
            .iter()
            .filter(|e| since.map_or(true, |s| e.event_time >= s))
            .collect();
        items.sort_by(|a, b| {
            b.event_time
                .cmp(&a.event_time)
                .then(b.created_at.cmp(&a.created_at))
        });
        items.truncate(limit);
        Ok(items)
    }

    pub fn points_near(&self, lat: f64, lon: f64, radius_km: f64) -> Vec<&TrackPoint> {
        self.output
            .track_points
            .iter()
            .filter(|p| haversine_km(lat, lon, p.lat, p.lon) <= radius_km)
            .collect()
    }

    pub fn output(&self) -> &RunOutput {
        &self.output
    }
}
