use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::{Serialize, Serializer};

use crate::geo::course_difference;
use crate::model::{CleanedPosition, Mmsi};
use crate::track::{vessel_partitions, with_predecessor};

pub const HIGH_SPEED_KN: f64 = 60.0;
pub const COURSE_JUMP_DEG: f64 = 90.0;
pub const COURSE_JUMP_WINDOW_SECS: i64 = 5 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    HighSpeed,
    CourseJump,
    DuplicateReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnomalyDetail {
    HighSpeed {
        sog: f64,
    },
    CourseJump {
        previous_cog: f64,
        cog: f64,
        course_diff: f64,
    },
    DuplicateReport {
        count: usize,
    },
}

fn as_json<S: Serializer>(detail: &AnomalyDetail, serializer: S) -> Result<S::Ok, S::Error> {
    let json = serde_json::to_string(detail).map_err(<S::Error as serde::ser::Error>::custom)?;
    serializer.serialize_str(&json)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyEvent {
    pub mmsi: Mmsi,
    pub event_time: NaiveDateTime,
    pub anomaly_type: AnomalyKind,
    #[serde(serialize_with = "as_json")]
    pub details: AnomalyDetail,
    pub created_at: NaiveDateTime,
}

pub fn detect_high_speed(positions: &[CleanedPosition], created_at: NaiveDateTime) -> Vec<AnomalyEvent> {
    positions
        .par_iter()
        .filter_map(|p| {
            let sog = p.sog.filter(|sog| *sog > HIGH_SPEED_KN)?;
            Some(AnomalyEvent {
                mmsi: p.mmsi,
                event_time: p.timestamp,
                anomaly_type: AnomalyKind::HighSpeed,
                details: AnomalyDetail::HighSpeed { sog },
                created_at,
            })
        })
        .collect()
}

fn course_jump(
    previous: &CleanedPosition,
    current: &CleanedPosition,
    created_at: NaiveDateTime,
) -> Option<AnomalyEvent> {
    let (previous_cog, cog) = (previous.cog?, current.cog?);
    let elapsed_ms = (current.timestamp - previous.timestamp).num_milliseconds();
    if elapsed_ms > COURSE_JUMP_WINDOW_SECS * 1000 {
        return None;
    }
    let course_diff = course_difference(previous_cog, cog);
    (course_diff > COURSE_JUMP_DEG).then_some(AnomalyEvent {
        mmsi: current.mmsi,
        event_time: current.timestamp,
        anomaly_type: AnomalyKind::CourseJump,
        details: AnomalyDetail::CourseJump {
            previous_cog,
            cog,
            course_diff,
        },
        created_at,
    })
}

/// Rule "course_jump": more than 90 degrees between consecutive reports at most
/// five minutes apart, in the same per-vessel order the track builder uses.
pub fn detect_course_jumps(positions: &[CleanedPosition], created_at: NaiveDateTime) -> Vec<AnomalyEvent> {
    vessel_partitions(positions)
        .par_iter()
        .flat_map_iter(|track| {
            with_predecessor(track)
                .filter_map(|(prev, cur)| course_jump(prev?, cur, created_at))
                .collect::<Vec<_>>()
        })
        .collect()
}

pub fn detect_duplicates(positions: &[CleanedPosition], created_at: NaiveDateTime) -> Vec<AnomalyEvent> {
    let mut groups: BTreeMap<(Mmsi, NaiveDateTime), usize> = BTreeMap::new();
    for p in positions {
        *groups.entry((p.mmsi, p.timestamp)).or_default() += 1;
    }
    groups
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|((mmsi, event_time), count)| AnomalyEvent {
            mmsi,
            event_time,
            anomaly_type: AnomalyKind::DuplicateReport,
            details: AnomalyDetail::DuplicateReport { count },
            created_at,
        })
        .collect()
}

pub fn detect(positions: &[CleanedPosition], created_at: NaiveDateTime) -> Vec<AnomalyEvent> {
    let mut events = detect_high_speed(positions, created_at);
    events.extend(detect_course_jumps(positions, created_at));
    events.extend(detect_duplicates(positions, created_at));
    // stable, so equal keys keep rule output order
    events.sort_by(|a, b| {
        (a.mmsi, a.event_time, a.anomaly_type).cmp(&(b.mmsi, b.event_time, b.anomaly_type))
    });
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FlagSet, NavigationalStatus};
    use chrono::{Duration, NaiveDate};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn pos(mmsi: Mmsi, seconds: i64, lat: f64, sog: Option<f64>, cog: Option<f64>) -> CleanedPosition {
        CleanedPosition {
            mmsi,
            timestamp: t0() + Duration::seconds(seconds),
            lat,
            lon: 10.0,
            sog,
            cog,
            heading: None,
            vessel_name: None,
            imo: None,
            call_sign: None,
            vessel_type: None,
            status: NavigationalStatus::Undefined,
            length: None,
            width: None,
            draft: None,
            cargo: None,
            transceiver_class: None,
            flag_reason: FlagSet::default(),
            duplicate_count: 1,
        }
    }

    #[test]
    fn test_high_speed() {
        let positions = vec![
            pos(211000000, 0, 55.0, Some(75.0), None),
            pos(211000000, 60, 55.0, Some(60.0), None),
            pos(211000000, 120, 55.0, None, None),
        ];
        let events = detect_high_speed(&positions, t0());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].details, AnomalyDetail::HighSpeed { sog: 75.0 });
        assert_eq!(events[0].event_time, t0());
    }

    #[test]
    fn test_course_jump() {
        let positions = vec![
            pos(211000000, 0, 55.0, None, Some(10.0)),
            pos(211000000, 180, 55.01, None, Some(170.0)),
        ];
        let events = detect_course_jumps(&positions, t0());
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].details,
            AnomalyDetail::CourseJump {
                previous_cog: 10.0,
                cog: 170.0,
                course_diff: 160.0
            }
        );
        assert_eq!(events[0].event_time, t0() + Duration::seconds(180));
    }

    #[test]
    fn test_course_jump_needs_short_gap_and_both_courses() {
        let positions = vec![
            pos(211000000, 0, 55.0, None, Some(10.0)),
            pos(211000000, 301, 55.0, None, Some(170.0)),
            pos(211000000, 400, 55.0, None, None),
            pos(211000000, 450, 55.0, None, Some(350.0)),
            // exactly 90 degrees is not a jump
            pos(211000000, 460, 55.0, None, Some(80.0)),
        ];
        assert!(detect_course_jumps(&positions, t0()).is_empty());
    }

    #[test]
    fn test_course_jump_window_counts_fractional_seconds() {
        let mut late = pos(211000000, 0, 55.01, None, Some(170.0));
        late.timestamp = t0() + Duration::milliseconds(300_500);
        let positions = vec![pos(211000000, 0, 55.0, None, Some(10.0)), late.clone()];
        assert!(detect_course_jumps(&positions, t0()).is_empty());

        late.timestamp = t0() + Duration::milliseconds(300_000);
        let positions = vec![pos(211000000, 0, 55.0, None, Some(10.0)), late];
        assert_eq!(detect_course_jumps(&positions, t0()).len(), 1);
    }

    #[test]
    fn test_course_jump_does_not_cross_vessels() {
        let positions = vec![
            pos(211000000, 0, 55.0, None, Some(10.0)),
            pos(311000000, 60, 55.0, None, Some(170.0)),
        ];
        assert!(detect_course_jumps(&positions, t0()).is_empty());
    }

    #[test]
    fn test_duplicate_report_one_event_per_group() {
        let positions = vec![
            pos(316005613, 0, 49.1, None, None),
            pos(316005613, 0, 49.2, None, None),
            pos(316005613, 0, 49.3, None, None),
            pos(316005613, 60, 49.3, None, None),
        ];
        let events = detect_duplicates(&positions, t0());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].details, AnomalyDetail::DuplicateReport { count: 3 });
    }

    #[test]
    fn test_rules_fire_independently() {
        let positions = vec![
            pos(211000000, 0, 55.0, Some(75.0), None),
            pos(211000000, 0, 55.1, Some(10.0), None),
        ];
        let events = detect(&positions, t0());
        let kinds: Vec<_> = events.iter().map(|e| e.anomaly_type).collect();
        assert_eq!(kinds, vec![AnomalyKind::HighSpeed, AnomalyKind::DuplicateReport]);
    }

    #[test]
    fn test_detail_serializes_as_json_object() {
        let detail = AnomalyDetail::CourseJump {
            previous_cog: 10.0,
            cog: 170.0,
            course_diff: 160.0,
        };
        assert_eq!(
            serde_json::to_string(&detail).unwrap(),
            r#"{"previous_cog":10.0,"cog":170.0,"course_diff":160.0}"#
        );
        assert_eq!(
            serde_json::to_string(&AnomalyDetail::DuplicateReport { count: 3 }).unwrap(),
            r#"{"count":3}"#
        );
    }
}
