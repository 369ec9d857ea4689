use crate::{ledger::round_cm, LotbookError, Segment, SegmentLedger};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt};

/// Measurement methodology. Every tree is measured once with each.
///
/// Ordering follows the field protocol: `MethodA` first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Method {
    #[default]
    MethodA,
    MethodB,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MethodA => "MethodA",
            Self::MethodB => "MethodB",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A committed record of one tree under one method.
///
/// Holds its own copy of the segments; nothing done to the session
/// ledger afterwards reaches it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeMeasurement {
    tree_number: u32,
    method: Method,
    segments: Vec<Segment>,
    total_height: f64,
    distance: f64,
    timestamp: DateTime<Utc>,
}

impl TreeMeasurement {
    pub(crate) fn from_ledger(
        tree_number: u32,
        method: Method,
        ledger: &SegmentLedger,
        distance: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, LotbookError> {
        let total_height = round_cm(ledger.total_height()?);
        Ok(Self {
            tree_number,
            method,
            segments: ledger.segments().to_vec(),
            total_height,
            distance,
            timestamp,
        })
    }

    pub fn tree_number(&self) -> u32 {
        self.tree_number
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn total_height(&self) -> f64 {
        self.total_height
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// A named batch of tree measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    name: String,

    #[serde(default)]
    tree_measurements: Vec<TreeMeasurement>,

    /// Last time this lot was written to the archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<DateTime<Utc>>,
}

impl Lot {
    /// Returns an empty lot. Surrounding whitespace is trimmed and a
    /// blank name is rejected.
    pub fn new(name: &str) -> Result<Self, LotbookError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(LotbookError::InvalidName(name.to_string()));
        }
        Ok(Self {
            name: trimmed.to_string(),
            tree_measurements: Vec::new(),
            saved_at: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Measurements in commit order.
    pub fn measurements(&self) -> &[TreeMeasurement] {
        &self.tree_measurements
    }

    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        self.saved_at
    }

    /// Number of distinct trees measured.
    pub fn tree_count(&self) -> usize {
        self.tree_measurements
            .iter()
            .map(TreeMeasurement::tree_number)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Tree number to resume at: one past the highest measured.
    pub fn next_tree_number(&self) -> Result<u32, LotbookError> {
        match self
            .tree_measurements
            .iter()
            .map(TreeMeasurement::tree_number)
            .max()
        {
            None => Ok(1),
            Some(max) => max
                .checked_add(1)
                .ok_or(LotbookError::InvalidTreeNumber(max)),
        }
    }

    pub(crate) fn push(&mut self, measurement: TreeMeasurement) {
        self.tree_measurements.push(measurement);
    }

    pub(crate) fn set_saved_at(&mut self, at: DateTime<Utc>) {
        self.saved_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::{Lot, Method, TreeMeasurement};
    use crate::{testutil::measurement, LotbookError, SegmentLedger};
    use chrono::Utc;

    #[test]
    fn test_method_order() {
        assert!(Method::MethodA < Method::MethodB);
        assert_eq!(Method::default(), Method::MethodA);
        assert_eq!(Method::MethodB.to_string(), "MethodB");
    }

    #[test]
    fn test_lot_name_is_trimmed() {
        assert_eq!(Lot::new("  Norte ").unwrap().name(), "Norte");
        assert!(matches!(Lot::new("   "), Err(LotbookError::InvalidName(_))));
        assert!(matches!(Lot::new(""), Err(LotbookError::InvalidName(_))));
    }

    #[test]
    fn test_from_empty_ledger_fails() {
        let ledger = SegmentLedger::new();
        assert!(matches!(
            TreeMeasurement::from_ledger(1, Method::MethodA, &ledger, 15.0, Utc::now()),
            Err(LotbookError::EmptyLedger)
        ));
    }

    #[test]
    fn test_tree_stats() {
        let mut lot = Lot::new("Sur").unwrap();
        assert_eq!(lot.tree_count(), 0);
        assert_eq!(lot.next_tree_number().unwrap(), 1);

        lot.push(measurement(1, Method::MethodA, &[2.0, 7.5]));
        lot.push(measurement(1, Method::MethodB, &[7.4]));
        lot.push(measurement(4, Method::MethodA, &[12.0]));
        assert_eq!(lot.tree_count(), 2);
        assert_eq!(lot.next_tree_number().unwrap(), 5);
        assert_eq!(lot.measurements()[0].total_height(), 7.5);
    }

    #[test]
    fn test_next_tree_number_at_limit() {
        let mut lot = Lot::new("Sur").unwrap();
        lot.push(measurement(u32::MAX, Method::MethodA, &[3.0]));
        assert!(matches!(
            lot.next_tree_number(),
            Err(LotbookError::InvalidTreeNumber(u32::MAX))
        ));
    }
}
