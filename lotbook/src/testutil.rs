//! Fixtures shared by unit tests.

use crate::{CaptureMethod, Lot, Method, SegmentLedger, TreeMeasurement};
use chrono::{DateTime, TimeZone, Utc};

pub(crate) fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, 10, 0, 0).unwrap()
}

pub(crate) fn measurement(tree: u32, method: Method, heights: &[f64]) -> TreeMeasurement {
    let mut ledger = SegmentLedger::new();
    for h in heights {
        ledger.capture(*h, CaptureMethod::Manual, None, 15.0).unwrap();
    }
    TreeMeasurement::from_ledger(tree, method, &ledger, 15.0, at(2)).unwrap()
}

pub(crate) fn lot(name: &str, measurements: Vec<TreeMeasurement>) -> Lot {
    let mut lot = Lot::new(name).unwrap();
    for m in measurements {
        lot.push(m);
    }
    lot
}
