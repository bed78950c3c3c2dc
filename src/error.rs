use thiserror::Error;

use crate::model::Mmsi;

/// Run-level failures. Record-level problems never surface here; they are
/// counted by the validator instead.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("input batch is empty")]
    EmptyInput,

    #[error("none of the {0} input reports survived validation")]
    NoSurvivingPositions(usize),

    #[error("mmsi must be a 9-digit integer, got {0}")]
    InvalidMmsi(Mmsi),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("unable to read csv input {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("unable to publish outputs: {0}")]
    Io(#[from] std::io::Error),

    #[error("unable to write csv output: {0}")]
    CsvWrite(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
