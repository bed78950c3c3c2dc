use std::fmt;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use log::{debug, info};

use crate::anomaly::{self, AnomalyEvent, AnomalyKind};
use crate::error::{EngineError, Result};
use crate::model::{CleanedPosition, RawPositionReport};
use crate::quality::{self, TrackPoint};
use crate::track;
use crate::validate::{self, ValidationReport};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub validation: ValidationReport,
    pub vessels: usize,
    pub track_points: usize,
    pub excluded_points: usize,
    pub high_speed: usize,
    pub course_jump: usize,
    pub duplicate_report: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn anomalies(&self) -> usize {
        self.high_speed + self.course_jump + self.duplicate_report
    }
}

fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        format!("{:.1}m", secs / 60.0)
    } else {
        format!("{:.1}h", secs / 3600.0)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = &self.validation;
        write!(
            f,
            "{} reports in, {} rejected, {} duplicates collapsed; \
             flags: {} zero_position, {} missing_non_critical, {} duplicate_report; \
             {} vessels, {} track points ({} excluded); \
             anomalies: {} high_speed, {} course_jump, {} duplicate_report; took {}",
            v.input,
            v.rejected,
            v.collapsed_duplicates,
            v.zero_position,
            v.missing_non_critical,
            v.duplicate_report,
            self.vessels,
            self.track_points,
            self.excluded_points,
            self.high_speed,
            self.course_jump,
            self.duplicate_report,
            format_duration(self.elapsed),
        )
    }
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub positions: Vec<CleanedPosition>,
    pub track_points: Vec<TrackPoint>,
    pub anomalies: Vec<AnomalyEvent>,
    pub summary: RunSummary,
}

/// Run the full engine over a closed batch.
///
/// `as_of` stamps every anomaly's `created_at`; the same input and `as_of`
/// always yield identical outputs.
pub fn run_batch(reports: &[RawPositionReport], as_of: NaiveDateTime) -> Result<RunOutput> {
    let started = Instant::now();
    if reports.is_empty() {
        return Err(EngineError::EmptyInput);
    }

    let validated = validate::validate(reports);
    if validated.positions.is_empty() {
        return Err(EngineError::NoSurvivingPositions(reports.len()));
    }
    debug!("validation: {:?}", validated.report);

    let positions = validated.positions;
    let (track_points, excluded_points, vessels) = {
        let tracks = track::build_tracks(&positions);
        let classified = quality::classify(&tracks);
        (classified.points, classified.excluded, tracks.len())
    };
    let anomalies = anomaly::detect(&positions, as_of);

    let count = |kind: AnomalyKind| anomalies.iter().filter(|e| e.anomaly_type == kind).count();
    let summary = RunSummary {
        validation: validated.report,
        vessels,
        track_points: track_points.len(),
        excluded_points,
        high_speed: count(AnomalyKind::HighSpeed),
        course_jump: count(AnomalyKind::CourseJump),
        duplicate_report: count(AnomalyKind::DuplicateReport),
        elapsed: started.elapsed(),
    };
    info!("run complete: {}", summary);

    Ok(RunOutput {
        positions,
        track_points,
        anomalies,
        summary,
    })
}
