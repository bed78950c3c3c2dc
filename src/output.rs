use std::fs::{self, File};
use std::io;
use std::path::Path;

use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::anomaly::AnomalyEvent;
use crate::engine::RunOutput;
use crate::error::{EngineError, Result};
use crate::model::{CleanedPosition, RawPositionReport};
use crate::quality::TrackPoint;

pub const CLEANED_POSITIONS_FILE: &str = "cleaned_positions.csv";
pub const TRACK_POINTS_FILE: &str = "track_points.csv";
pub const ANOMALY_EVENTS_FILE: &str = "anomaly_events.csv";

const OUTPUT_FILES: [&str; 3] = [CLEANED_POSITIONS_FILE, TRACK_POINTS_FILE, ANOMALY_EVENTS_FILE];

pub fn read_reports(path: &str) -> Result<Vec<RawPositionReport>> {
    let csv_err = |source| EngineError::Csv {
        path: path.to_string(),
        source,
    };
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Fields)
        .from_path(path)
        .map_err(csv_err)?;

    let reports = rdr
        .deserialize()
        .collect::<std::result::Result<Vec<RawPositionReport>, _>>()
        .map_err(csv_err)?;
    info!("{} has {} raw reports.", path, reports.len());
    Ok(reports)
}

pub fn load_reports(paths: &[String]) -> Result<Vec<RawPositionReport>> {
    let per_file = paths
        .par_iter()
        .map(|path| read_reports(path))
        .collect::<Result<Vec<_>>>()?;
    Ok(per_file.into_iter().flatten().collect())
}

/// A row of a published output. `HEADER` is written even when there are no rows.
pub trait OutputRow: Serialize {
    const HEADER: &'static [&'static str];
}

impl OutputRow for CleanedPosition {
    const HEADER: &'static [&'static str] = &[
        "mmsi",
        "timestamp",
        "lat",
        "lon",
        "sog",
        "cog",
        "heading",
        "vessel_name",
        "imo",
        "call_sign",
        "vessel_type",
        "status",
        "length",
        "width",
        "draft",
        "cargo",
        "transceiver_class",
        "flag_reason",
        "duplicate_count",
    ];
}

impl OutputRow for TrackPoint {
    const HEADER: &'static [&'static str] = &[
        "mmsi",
        "position_timestamp",
        "sequence",
        "lat",
        "lon",
        "sog",
        "cog",
        "heading",
        "prev_timestamp",
        "prev_lat",
        "prev_lon",
        "prev_sog",
        "prev_cog",
        "elapsed_hours",
        "distance_km",
        "calculated_speed_kn",
        "course_change_deg",
        "speed_discrepancy_kn",
        "continuity",
        "movement",
        "quality_score",
        "has_potential_anomaly",
        "cumulative_distance_km",
        "moving_avg_speed_kn",
        "running_avg_quality",
        "point_count",
    ];
}

impl OutputRow for AnomalyEvent {
    const HEADER: &'static [&'static str] = &["mmsi", "event_time", "anomaly_type", "details", "created_at"];
}

fn write_csv<T: OutputRow>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(File::create(path)?);
    wtr.write_record(T::HEADER)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Move the staged files over the published ones.
///
/// Published files are first set aside into `backup`. If any rename fails,
/// files already installed are removed and the set-aside ones put back.
fn swap_into_place(
    staged: &Path,
    backup: &Path,
    out_dir: &Path,
    rename: impl Fn(&Path, &Path) -> io::Result<()>,
) -> io::Result<()> {
    let mut set_aside = Vec::new();
    let mut installed = Vec::new();

    let result = OUTPUT_FILES
        .iter()
        .try_for_each(|name| -> io::Result<()> {
            let target = out_dir.join(name);
            if target.symlink_metadata().is_ok() {
                rename(&target, &backup.join(name))?;
                set_aside.push(*name);
            }
            Ok(())
        })
        .and_then(|()| {
            OUTPUT_FILES.iter().try_for_each(|name| -> io::Result<()> {
                rename(&staged.join(name), &out_dir.join(name))?;
                installed.push(*name);
                Ok(())
            })
        });

    if let Err(e) = result {
        for name in installed {
            if let Err(err) = fs::remove_file(out_dir.join(name)) {
                warn!("unable to remove partially published {}: {}", name, err);
            }
        }
        for name in set_aside {
            if let Err(err) = rename(&backup.join(name), &out_dir.join(name)) {
                warn!("unable to restore previous {}: {}", name, err);
            }
        }
        return Err(e);
    }
    Ok(())
}

/// Write the three outputs into `out_dir`, replacing any previous run.
pub fn publish(out_dir: &Path, output: &RunOutput) -> Result<()> {
    fs::create_dir_all(out_dir)?;
    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(out_dir)?;

    write_csv(&staging.path().join(CLEANED_POSITIONS_FILE), &output.positions)?;
    write_csv(&staging.path().join(TRACK_POINTS_FILE), &output.track_points)?;
    write_csv(&staging.path().join(ANOMALY_EVENTS_FILE), &output.anomalies)?;

    let backup = staging.path().join("previous");
    fs::create_dir(&backup)?;
    swap_into_place(staging.path(), &backup, out_dir, |from: &Path, to: &Path| {
        fs::rename(from, to)
    })?;

    if let Err(e) = staging.close() {
        warn!("unable to remove staging directory: {}", e);
    }
    info!(
        "published {} positions, {} track points, {} anomalies to {}",
        output.positions.len(),
        output.track_points.len(),
        output.anomalies.len(),
        out_dir.display()
    );
    Ok(())
}
