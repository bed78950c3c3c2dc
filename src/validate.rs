use std::collections::HashMap;

use chrono::NaiveDateTime;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{
    parse_timestamp, CleanedPosition, FlagSet, Mmsi, NavigationalStatus, QualityFlag,
    RawPositionReport, MMSI_MAX, MMSI_MIN,
};

static IMO_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^IMO\d{7}$").unwrap());

static MAX_SOG: f64 = 200.0;
static HEADING_UNAVAILABLE: f64 = 511.0;

const SAMPLE_LIMIT: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub input: usize,
    pub rejected: usize,
    pub collapsed_duplicates: usize,
    pub zero_position: usize,
    pub missing_non_critical: usize,
    pub duplicate_report: usize,
}

impl ValidationReport {
    pub fn dropped(&self) -> usize {
        self.rejected + self.collapsed_duplicates
    }
}

#[derive(Debug, Clone)]
pub struct Validated {
    pub positions: Vec<CleanedPosition>,
    pub report: ValidationReport,
}

fn parse_mmsi(raw: Option<&str>) -> Option<Mmsi> {
    let s = raw?.trim();
    if s.len() != 9 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mmsi: Mmsi = s.parse().ok()?;
    (MMSI_MIN..=MMSI_MAX).contains(&mmsi).then_some(mmsi)
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn normalize_name(raw: Option<&str>) -> Option<String> {
    non_empty(raw).map(str::to_lowercase)
}

fn normalize_upper(raw: Option<&str>) -> Option<String> {
    non_empty(raw).map(str::to_uppercase)
}

fn normalize_imo(raw: Option<&str>) -> Option<String> {
    let imo = non_empty(raw)?.to_uppercase();
    IMO_PATTERN.is_match(&imo).then_some(imo)
}

fn in_range(value: Option<f64>, valid: impl Fn(f64) -> bool) -> Option<f64> {
    value.filter(|v| valid(*v))
}

fn normalize_heading(raw: Option<f64>) -> Option<u16> {
    match raw {
        Some(h) if h == HEADING_UNAVAILABLE => None,
        Some(h) if (0.0..=359.0).contains(&h) => Some(h.round() as u16),
        _ => None,
    }
}

fn clean_record(raw: &RawPositionReport) -> Option<CleanedPosition> {
    let mmsi = parse_mmsi(raw.mmsi.as_deref())?;
    let timestamp = raw.timestamp.as_deref().and_then(parse_timestamp)?;
    // -0.0 + 0.0 is 0.0, so both zeros share one dedup key
    let lat = in_range(raw.lat, |v| (-90.0..=90.0).contains(&v))? + 0.0;
    let lon = in_range(raw.lon, |v| (-180.0..=180.0).contains(&v))? + 0.0;

    let mut position = CleanedPosition {
        mmsi,
        timestamp,
        lat,
        lon,
        sog: in_range(raw.sog, |v| (0.0..=MAX_SOG).contains(&v)),
        cog: in_range(raw.cog, |v| (0.0..360.0).contains(&v)),
        heading: normalize_heading(raw.heading),
        vessel_name: normalize_name(raw.vessel_name.as_deref()),
        imo: normalize_imo(raw.imo.as_deref()),
        call_sign: normalize_upper(raw.call_sign.as_deref()),
        vessel_type: raw.vessel_type,
        status: NavigationalStatus::from_code(raw.status),
        length: in_range(raw.length, |v| v >= 0.0),
        width: in_range(raw.width, |v| v >= 0.0),
        draft: in_range(raw.draft, |v| v >= 0.0),
        cargo: raw.cargo,
        transceiver_class: normalize_upper(raw.transceiver_class.as_deref()),
        flag_reason: FlagSet::default(),
        duplicate_count: 1,
    };

    if position.lat == 0.0 && position.lon == 0.0 {
        position.flag_reason.insert(QualityFlag::ZeroPosition);
    }
    let missing_non_critical = position.vessel_name.is_none()
        || position.imo.is_none()
        || position.call_sign.is_none()
        || position.vessel_type.is_none()
        || position.length.is_none()
        || position.width.is_none()
        || position.draft.is_none()
        || position.cargo.is_none();
    if missing_non_critical {
        position.flag_reason.insert(QualityFlag::MissingNonCritical);
    }
    Some(position)
}

type DedupKey = (Mmsi, NaiveDateTime, u64, u64);

fn dedup_key(p: &CleanedPosition) -> DedupKey {
    (p.mmsi, p.timestamp, p.lat.to_bits(), p.lon.to_bits())
}

/// Validate, normalize, deduplicate and flag a batch of raw reports.
///
/// True duplicates share (mmsi, timestamp, lat, lon). Of each such group the
/// first record in input order carrying a vessel name is kept, or the first
/// record when none has one. Records that only share (mmsi, timestamp) are all
/// kept and flagged `duplicate_report`.
pub fn validate(reports: &[RawPositionReport]) -> Validated {
    let mut report = ValidationReport {
        input: reports.len(),
        ..Default::default()
    };

    let mut kept: Vec<CleanedPosition> = Vec::with_capacity(reports.len());
    let mut slots: HashMap<DedupKey, usize> = HashMap::new();

    for raw in reports {
        let Some(position) = clean_record(raw) else {
            if report.rejected < SAMPLE_LIMIT {
                debug!("rejected report mmsi={:?} ts={:?}", raw.mmsi, raw.timestamp);
            }
            report.rejected += 1;
            continue;
        };
        match slots.get(&dedup_key(&position)) {
            Some(&slot) => {
                report.collapsed_duplicates += 1;
                if kept[slot].vessel_name.is_none() && position.vessel_name.is_some() {
                    kept[slot] = position;
                }
            }
            None => {
                slots.insert(dedup_key(&position), kept.len());
                kept.push(position);
            }
        }
    }

    // stable: equal keys keep input order
    kept.sort_by(|a, b| {
        a.mmsi
            .cmp(&b.mmsi)
            .then(a.timestamp.cmp(&b.timestamp))
            .then(a.lat.total_cmp(&b.lat))
            .then(a.lon.total_cmp(&b.lon))
    });

    for group in kept.chunk_by_mut(|a, b| a.mmsi == b.mmsi && a.timestamp == b.timestamp) {
        let count = group.len();
        for position in group.iter_mut() {
            position.duplicate_count = count;
            if count > 1 {
                position.flag_reason.insert(QualityFlag::DuplicateReport);
            }
        }
    }

    for position in &kept {
        if position.has_flag(QualityFlag::ZeroPosition) {
            report.zero_position += 1;
        }
        if position.has_flag(QualityFlag::MissingNonCritical) {
            report.missing_non_critical += 1;
        }
        if position.has_flag(QualityFlag::DuplicateReport) {
            report.duplicate_report += 1;
        }
    }

    Validated {
        positions: kept,
        report,
    }
}
