use clinometer::DeviceError;
use std::fmt;
use thiserror::Error;

/// The neighbor constraint a rejected height violated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeightBound {
    /// Heights must be finite and above ground.
    Positive,

    /// Must exceed the previous segment's cumulative height.
    Above(f64),

    /// Must stay under the following segment's cumulative height.
    Below(f64),
}

impl fmt::Display for HeightBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positive => write!(f, "must be greater than 0 m"),
            Self::Above(floor) => write!(f, "must be greater than {floor:.2} m"),
            Self::Below(ceil) => write!(f, "must be less than {ceil:.2} m"),
        }
    }
}

#[derive(Error, Debug)]
pub enum LotbookError {
    #[error("invalid height {value:.2} m, {bound}")]
    InvalidHeight { value: f64, bound: HeightBound },

    #[error("invalid lot name {0:?}")]
    InvalidName(String),

    #[error("no segments captured")]
    EmptyLedger,

    #[error("no active lot")]
    NoActiveLot,

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid tree number {0}")]
    InvalidTreeNumber(u32),

    #[error("invalid eye height {0} m")]
    InvalidEyeHeight(f64),

    #[error("invalid distance {0} m")]
    InvalidDistance(f64),

    #[error("no measurements to export")]
    NothingToExport,

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u64),

    #[error("malformed snapshot, {0}")]
    Malformed(String),

    #[error("{0}")]
    Device(#[from] DeviceError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Csv(#[from] csv::Error),
}
