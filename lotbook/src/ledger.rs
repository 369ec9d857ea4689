//! Stacked height readings for the tree and method being measured.

use crate::{HeightBound, LotbookError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rounds meters to centimeters.
pub(crate) fn round_cm(meters: f64) -> f64 {
    (meters * 100.0).round() / 100.0
}

/// Provenance of a segment's height.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMethod {
    /// Derived from the inclination sensor.
    Sensor,

    /// Typed in (or edited) by the operator.
    #[default]
    Manual,
}

impl CaptureMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for CaptureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stacked reading.
///
/// `length` is always derived from the neighbor below and can't be
/// set directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub(crate) index: u32,

    pub(crate) cumulative_height: f64,

    pub(crate) length: f64,

    #[serde(default)]
    pub(crate) capture_method: CaptureMethod,

    /// Corrected inclination, only for sensor captures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) angle: Option<f64>,

    /// Horizontal distance in effect when captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) distance: Option<f64>,
}

impl Segment {
    /// 1-based segment number.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn cumulative_height(&self) -> f64 {
        self.cumulative_height
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn capture_method(&self) -> CaptureMethod {
        self.capture_method
    }

    pub fn angle(&self) -> Option<f64> {
        self.angle
    }

    pub fn distance(&self) -> Option<f64> {
        self.distance
    }
}

/// Ordered, validated segments for one tree/method in progress.
///
/// Positions in this API are 0-based; [`Segment::index`] is the
/// 1-based number shown to operators.
///
/// # Invariants
///
/// - indices are dense, starting at 1
/// - cumulative heights strictly increase with index
/// - every length equals the difference to the segment below
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentLedger {
    segments: Vec<Segment>,
}

impl SegmentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// Appends a reading on top of the stack.
    ///
    /// `raw_height` is rounded to centimeters before it is checked
    /// against the segment below.
    pub fn capture(
        &mut self,
        raw_height: f64,
        method: CaptureMethod,
        angle: Option<f64>,
        distance: f64,
    ) -> Result<&Segment, LotbookError> {
        let height = round_cm(raw_height);
        let position = self.segments.len();
        self.check(position, height)?;
        #[allow(clippy::cast_possible_truncation)]
        let segment = Segment {
            index: position as u32 + 1,
            cumulative_height: height,
            length: round_cm(height - self.floor(position)),
            capture_method: method,
            angle,
            distance: Some(distance),
        };
        self.segments.push(segment);
        Ok(&self.segments[position])
    }

    /// Replaces the cumulative height at `position`.
    ///
    /// Edited heights are manual: any sensor angle is dropped. Lengths
    /// from `position` upward are recomputed.
    pub fn edit(&mut self, position: usize, new_height: f64) -> Result<&Segment, LotbookError> {
        if position >= self.segments.len() {
            return Err(Self::missing(position));
        }
        let height = round_cm(new_height);
        self.check(position, height)?;
        let segment = &mut self.segments[position];
        segment.cumulative_height = height;
        segment.capture_method = CaptureMethod::Manual;
        segment.angle = None;
        self.recompute_from(position);
        Ok(&self.segments[position])
    }

    /// Removes the segment at `position`, renumbering and recomputing
    /// everything above it.
    pub fn delete(&mut self, position: usize) -> Result<Segment, LotbookError> {
        if position >= self.segments.len() {
            return Err(Self::missing(position));
        }
        let removed = self.segments.remove(position);
        self.recompute_from(position);
        Ok(removed)
    }

    pub fn reset(&mut self) {
        self.segments.clear();
    }

    /// Returns the top segment's cumulative height.
    pub fn total_height(&self) -> Result<f64, LotbookError> {
        self.segments
            .last()
            .map(|seg| seg.cumulative_height)
            .ok_or(LotbookError::EmptyLedger)
    }
}

impl SegmentLedger {
    /// Cumulative height directly below `position`.
    fn floor(&self, position: usize) -> f64 {
        match position {
            0 => 0.0,
            n => self.segments[n - 1].cumulative_height,
        }
    }

    /// Checks `height` against the neighbors of `position`.
    fn check(&self, position: usize, height: f64) -> Result<(), LotbookError> {
        let bound = if !height.is_finite() || height <= 0.0 {
            Some(HeightBound::Positive)
        } else if position > 0 && height <= self.floor(position) {
            Some(HeightBound::Above(self.floor(position)))
        } else {
            self.segments
                .get(position + 1)
                .filter(|next| height >= next.cumulative_height)
                .map(|next| HeightBound::Below(next.cumulative_height))
        };
        match bound {
            Some(bound) => Err(LotbookError::InvalidHeight {
                value: height,
                bound,
            }),
            None => Ok(()),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn recompute_from(&mut self, start: usize) {
        for position in start..self.segments.len() {
            let floor = self.floor(position);
            let segment = &mut self.segments[position];
            segment.index = position as u32 + 1;
            segment.length = round_cm(segment.cumulative_height - floor);
        }
    }

    fn missing(position: usize) -> LotbookError {
        LotbookError::NotFound(format!("segment {}", position + 1))
    }
}
