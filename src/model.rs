use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Maritime Mobile Service Identity, always within `MMSI_MIN..=MMSI_MAX` once cleaned.
pub type Mmsi = u32;

pub const MMSI_MIN: Mmsi = 100_000_000;
pub const MMSI_MAX: Mmsi = 999_999_999;

static TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%d/%m/%Y %H:%M:%S"];

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationalStatus {
    UnderWayUsingEngine,
    AtAnchor,
    NotUnderCommand,
    RestrictedManeuverability,
    ConstrainedByDraught,
    Moored,
    Aground,
    EngagedInFishing,
    UnderWaySailing,
    Reserved,
    AisSartActive,
    Undefined,
}

impl NavigationalStatus {
    pub fn from_code(code: Option<u8>) -> Self {
        match code {
            Some(0) => NavigationalStatus::UnderWayUsingEngine,
            Some(1) => NavigationalStatus::AtAnchor,
            Some(2) => NavigationalStatus::NotUnderCommand,
            Some(3) => NavigationalStatus::RestrictedManeuverability,
            Some(4) => NavigationalStatus::ConstrainedByDraught,
            Some(5) => NavigationalStatus::Moored,
            Some(6) => NavigationalStatus::Aground,
            Some(7) => NavigationalStatus::EngagedInFishing,
            Some(8) => NavigationalStatus::UnderWaySailing,
            Some(9..=13) => NavigationalStatus::Reserved,
            Some(14) => NavigationalStatus::AisSartActive,
            _ => NavigationalStatus::Undefined,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
//1.	MMSI				Maritime Mobile Service Identity, 9 digits
//2.	BaseDateTime		Timestamp from the AIS basestation, format: 2023-01-01T00:00:01
//3.	LAT				Latitude of message report (e.g. 57.8794)
//4.	LON				Longitude of message report (e.g. 17.9125)
//5.	SOG				Speed over ground in knots
//6.	COG				Course over ground in degrees
//7.	Heading			True heading in degrees, 511 when not available
//8.	VesselName			Name as reported in the static message
//9.	IMO				IMO number of the vessel, e.g. IMO9428217
//10.	CallSign			Callsign of the vessel
//11.	VesselType			AIS ship type code
//12.	Status				AIS navigational status code
//13.	Length				Length of the vessel in meters
//14.	Width				Width of the vessel in meters
//15.	Draft				Draught in meters
//16.	Cargo				Cargo type code
//17.	TransceiverClass		A or B
// example: 368084090,2023-01-01T00:00:06,29.31252,-94.7758,0.0,253.4,511,WESTERN SEA,,WDK6776,31,0,23.0,8.0,3.0,,A
#[serde(default)]
pub struct RawPositionReport {
    #[serde(rename = "MMSI")]
    pub mmsi: Option<String>,
    #[serde(rename = "BaseDateTime")]
    pub timestamp: Option<String>,
    #[serde(rename = "LAT", deserialize_with = "csv::invalid_option")]
    pub lat: Option<f64>,
    #[serde(rename = "LON", deserialize_with = "csv::invalid_option")]
    pub lon: Option<f64>,
    #[serde(rename = "SOG", deserialize_with = "csv::invalid_option")]
    pub sog: Option<f64>,
    #[serde(rename = "COG", deserialize_with = "csv::invalid_option")]
    pub cog: Option<f64>,
    #[serde(rename = "Heading", deserialize_with = "csv::invalid_option")]
    pub heading: Option<f64>,
    #[serde(rename = "VesselName")]
    pub vessel_name: Option<String>,
    #[serde(rename = "IMO")]
    pub imo: Option<String>,
    #[serde(rename = "CallSign")]
    pub call_sign: Option<String>,
    #[serde(rename = "VesselType", deserialize_with = "csv::invalid_option")]
    pub vessel_type: Option<u16>,
    #[serde(rename = "Status", deserialize_with = "csv::invalid_option")]
    pub status: Option<u8>,
    #[serde(rename = "Length", deserialize_with = "csv::invalid_option")]
    pub length: Option<f64>,
    #[serde(rename = "Width", deserialize_with = "csv::invalid_option")]
    pub width: Option<f64>,
    #[serde(rename = "Draft", deserialize_with = "csv::invalid_option")]
    pub draft: Option<f64>,
    #[serde(rename = "Cargo", deserialize_with = "csv::invalid_option")]
    pub cargo: Option<u16>,
    #[serde(rename = "TransceiverClass")]
    pub transceiver_class: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QualityFlag {
    ZeroPosition,
    MissingNonCritical,
    DuplicateReport,
}

impl QualityFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityFlag::ZeroPosition => "zero_position",
            QualityFlag::MissingNonCritical => "missing_non_critical",
            QualityFlag::DuplicateReport => "duplicate_report",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet(Vec<QualityFlag>);

impl FlagSet {
    pub fn insert(&mut self, flag: QualityFlag) {
        if let Err(pos) = self.0.binary_search(&flag) {
            self.0.insert(pos, flag);
        }
    }

    pub fn contains(&self, flag: QualityFlag) -> bool {
        self.0.binary_search(&flag).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, flag) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(flag.as_str())?;
        }
        Ok(())
    }
}

impl Serialize for FlagSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A validated, normalized position report. Unique per (mmsi, timestamp, lat, lon).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanedPosition {
    pub mmsi: Mmsi,
    pub timestamp: NaiveDateTime,
    pub lat: f64,
    pub lon: f64,
    pub sog: Option<f64>,
    pub cog: Option<f64>,
    /// `None` when the transponder reports 511 ("not available").
    pub heading: Option<u16>,
    pub vessel_name: Option<String>,
    pub imo: Option<String>,
    pub call_sign: Option<String>,
    pub vessel_type: Option<u16>,
    pub status: NavigationalStatus,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub draft: Option<f64>,
    pub cargo: Option<u16>,
    pub transceiver_class: Option<String>,
    pub flag_reason: FlagSet,
    pub duplicate_count: usize,
}

impl CleanedPosition {
    pub fn has_flag(&self, flag: QualityFlag) -> bool {
        self.flag_reason.contains(flag)
    }
}
