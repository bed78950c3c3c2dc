#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use sea_track::model::RawPositionReport;

pub fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn as_of() -> NaiveDateTime {
    t0() + Duration::days(7)
}

pub fn at(seconds: i64) -> NaiveDateTime {
    t0() + Duration::seconds(seconds)
}

/// A complete, valid report `seconds` after `t0()`.
pub fn report(mmsi: &str, seconds: i64, lat: f64, lon: f64) -> RawPositionReport {
    RawPositionReport {
        mmsi: Some(mmsi.to_string()),
        timestamp: Some(at(seconds).format("%Y-%m-%dT%H:%M:%S").to_string()),
        lat: Some(lat),
        lon: Some(lon),
        sog: Some(10.0),
        cog: Some(45.0),
        heading: Some(45.0),
        vessel_name: Some("Western Sea".to_string()),
        imo: Some("IMO9428217".to_string()),
        call_sign: Some("WDK6776".to_string()),
        vessel_type: Some(31),
        status: Some(0),
        length: Some(23.0),
        width: Some(8.0),
        draft: Some(3.0),
        cargo: Some(31),
        transceiver_class: Some("A".to_string()),
    }
}

pub fn with_motion(mut raw: RawPositionReport, sog: Option<f64>, cog: Option<f64>) -> RawPositionReport {
    raw.sog = sog;
    raw.cog = cog;
    raw
}

pub const HEADER: &str = "MMSI,BaseDateTime,LAT,LON,SOG,COG,Heading,VesselName,IMO,CallSign,VesselType,Status,Length,Width,Draft,Cargo,TransceiverClass";
