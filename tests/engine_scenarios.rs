mod common;

use std::collections::BTreeMap;

use approx::assert_relative_eq;
use common::{as_of, at, report, with_motion};
use sea_track::anomaly::{AnomalyDetail, AnomalyKind};
use sea_track::engine::run_batch;
use sea_track::model::QualityFlag;
use sea_track::quality::{ContinuityClass, MovementClass};

#[test]
fn test_course_jump_scenario() {
    let reports = vec![
        with_motion(report("211000000", 0, 55.0, 10.0), Some(8.0), Some(10.0)),
        with_motion(report("211000000", 180, 55.005, 10.0), Some(8.0), Some(170.0)),
    ];
    let out = run_batch(&reports, as_of()).unwrap();

    let jumps: Vec<_> = out
        .anomalies
        .iter()
        .filter(|e| e.anomaly_type == AnomalyKind::CourseJump)
        .collect();
    assert_eq!(jumps.len(), 1);
    assert_eq!(jumps[0].mmsi, 211000000);
    assert_eq!(jumps[0].event_time, at(180));
    assert_eq!(jumps[0].created_at, as_of());
    match jumps[0].details {
        AnomalyDetail::CourseJump { course_diff, .. } => assert_relative_eq!(course_diff, 160.0),
        ref other => panic!("unexpected detail {:?}", other),
    }

    // the track sees the same turn through its own computation
    let second = &out.track_points[1];
    assert_relative_eq!(second.course_change_deg.unwrap(), 160.0);
    assert!(second.has_potential_anomaly);
}

#[test]
fn test_high_speed_scenario() {
    let reports = vec![with_motion(report("211000000", 0, 55.0, 10.0), Some(75.0), Some(90.0))];
    let out = run_batch(&reports, as_of()).unwrap();
    assert_eq!(out.anomalies.len(), 1);
    assert_eq!(out.anomalies[0].anomaly_type, AnomalyKind::HighSpeed);
    assert_eq!(out.anomalies[0].details, AnomalyDetail::HighSpeed { sog: 75.0 });
}

#[test]
fn test_duplicate_timestamp_scenario() {
    let reports = vec![
        report("316005613", 0, 49.10, -123.10),
        report("316005613", 0, 49.11, -123.11),
        report("316005613", 0, 49.12, -123.12),
        // exact copy collapses into the first record
        report("316005613", 0, 49.10, -123.10),
    ];
    let out = run_batch(&reports, as_of()).unwrap();

    let dups: Vec<_> = out
        .anomalies
        .iter()
        .filter(|e| e.anomaly_type == AnomalyKind::DuplicateReport)
        .collect();
    assert_eq!(dups.len(), 1);
    assert_eq!(dups[0].details, AnomalyDetail::DuplicateReport { count: 3 });

    assert_eq!(out.positions.len(), 3);
    assert!(out.positions.iter().all(|p| p.has_flag(QualityFlag::DuplicateReport)));
    assert_eq!(out.summary.validation.collapsed_duplicates, 1);
}

#[test]
fn test_first_report_scenario() {
    let out = run_batch(&[report("211000000", 0, 55.0, 10.0)], as_of()).unwrap();
    let p = &out.track_points[0];
    assert_eq!(p.sequence, 1);
    assert_eq!(p.continuity, ContinuityClass::FirstPosition);
    assert_eq!(p.movement, MovementClass::Initial);
    assert_eq!(p.quality_score, 0.8);
    assert!(p.prev_timestamp.is_none());
    assert!(p.prev_lat.is_none());
    assert!(p.elapsed_hours.is_none());
    assert!(p.distance_km.is_none());
    assert!(p.calculated_speed_kn.is_none());
    assert!(p.course_change_deg.is_none());
    assert!(p.speed_discrepancy_kn.is_none());
}

#[test]
fn test_gap_scenarios() {
    let hour = 3600;
    let reports = vec![
        report("211000000", 0, 55.0, 10.0),
        report("211000000", 30 * hour, 55.2, 10.0),
        report("211000000", 110 * hour, 55.4, 10.0),
    ];
    let out = run_batch(&reports, as_of()).unwrap();

    // 80h gap before the third point drops it from the output
    assert_eq!(out.track_points.len(), 2);
    assert_eq!(out.summary.excluded_points, 1);

    let p = &out.track_points[1];
    assert_relative_eq!(p.elapsed_hours.unwrap(), 30.0);
    assert!(p.calculated_speed_kn.is_none());
    assert_eq!(p.continuity, ContinuityClass::LargeGap);
    assert_eq!(p.quality_score, 0.4);
}

#[test]
fn test_cleaned_positions_are_in_range_and_unique() {
    let mut reports = Vec::new();
    for i in 0..40 {
        let lat = -100.0 + i as f64 * 5.0;
        let lon = -200.0 + i as f64 * 10.0;
        let mmsi = if i % 7 == 0 { "12345" } else { "244123456" };
        reports.push(report(mmsi, i * 60, lat, lon));
        reports.push(report(mmsi, i * 60, lat, lon));
    }
    let out = run_batch(&reports, as_of()).unwrap();
    assert!(!out.positions.is_empty());

    let mut seen = std::collections::HashSet::new();
    for p in &out.positions {
        assert!((100_000_000..=999_999_999).contains(&p.mmsi));
        assert!((-90.0..=90.0).contains(&p.lat));
        assert!((-180.0..=180.0).contains(&p.lon));
        assert!(seen.insert((p.mmsi, p.timestamp, p.lat.to_bits(), p.lon.to_bits())));
    }
}

#[test]
fn test_signed_zero_is_one_position() {
    let reports = vec![
        report("211000000", 0, 0.0, 10.0),
        report("211000000", 0, -0.0, 10.0),
    ];
    let out = run_batch(&reports, as_of()).unwrap();
    assert_eq!(out.positions.len(), 1);
    assert!(!out.positions[0].has_flag(QualityFlag::DuplicateReport));
    assert!(out.anomalies.is_empty());
}

#[test]
fn test_sequences_contiguous_per_vessel() {
    let mut reports = Vec::new();
    for i in (0..12).rev() {
        reports.push(report("211000000", i * 600, 55.0 + i as f64 * 0.01, 10.0));
        reports.push(report("311000000", i * 900, 56.0, 11.0 + i as f64 * 0.01));
    }
    reports.push(report("411000000", 0, 57.0, 12.0));
    let out = run_batch(&reports, as_of()).unwrap();

    let mut per_vessel: BTreeMap<u32, Vec<_>> = BTreeMap::new();
    for p in &out.track_points {
        per_vessel.entry(p.mmsi).or_default().push(p);
    }
    assert_eq!(out.summary.vessels, 3);
    for (mmsi, points) in per_vessel {
        let cleaned = out.positions.iter().filter(|p| p.mmsi == mmsi).count();
        let seq: Vec<u32> = points.iter().map(|p| p.sequence).collect();
        assert_eq!(seq, (1..=cleaned as u32).collect::<Vec<_>>());
        assert!(points
            .windows(2)
            .all(|w| w[0].position_timestamp < w[1].position_timestamp));
        assert_eq!(points.last().unwrap().point_count as usize, cleaned);
    }
}

#[test]
fn test_rerun_is_identical() {
    let mut reports = Vec::new();
    for i in 0..30 {
        let cog = (i * 83 % 360) as f64;
        reports.push(with_motion(
            report("211000000", i * 120, 55.0 + (i % 5) as f64 * 0.01, 10.0),
            Some((i * 3) as f64),
            Some(cog),
        ));
        reports.push(report("316005613", (i / 3) * 60, 49.0 + i as f64 * 0.001, -123.0));
    }
    let first = run_batch(&reports, as_of()).unwrap();

    reports.reverse();
    let second = run_batch(&reports, as_of()).unwrap();

    assert_eq!(first.positions, second.positions);
    assert_eq!(first.track_points, second.track_points);
    assert_eq!(first.anomalies, second.anomalies);
}

#[test]
fn test_rejections_are_counted_not_fatal() {
    let mut missing_ts = report("211000000", 0, 55.0, 10.0);
    missing_ts.timestamp = None;
    let reports = vec![
        report("211000000", 0, 55.0, 10.0),
        report("2110000", 60, 55.0, 10.0),
        report("211000000", 120, 95.0, 10.0),
        missing_ts,
    ];
    let out = run_batch(&reports, as_of()).unwrap();
    assert_eq!(out.summary.validation.input, 4);
    assert_eq!(out.summary.validation.rejected, 3);
    assert_eq!(out.positions.len(), 1);
}
