//! The measurement workflow: which lot, tree and method are active,
//! and the ledger being filled.

use crate::{
    ledger::CaptureMethod, LotbookError, Lot, Method, Segment, SegmentLedger, TreeMeasurement,
};
use chrono::{DateTime, Utc};
use clinometer::{
    constants::{DEFAULT_DISTANCE_M, EYE_HEIGHT_M},
    height, AngleSample, Calibration, LevelIndicator,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Where the workflow stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No lot is open.
    Idle,

    /// Capturing the active tree with the given method.
    TreeReady(Method),

    /// Both methods committed; waiting for the next tree.
    TreeComplete,
}

/// Observer defaults applied when a session starts over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Observer eye height in meters.
    pub eye_height: f64,

    /// Horizontal distance to the trunk in meters.
    pub default_distance: f64,
}

impl SessionConfig {
    /// Checks both values are finite and above zero.
    pub fn validate(&self) -> Result<(), LotbookError> {
        if !self.eye_height.is_finite() || self.eye_height <= 0.0 {
            return Err(LotbookError::InvalidEyeHeight(self.eye_height));
        }
        if !self.default_distance.is_finite() || self.default_distance <= 0.0 {
            return Err(LotbookError::InvalidDistance(self.default_distance));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            eye_height: EYE_HEIGHT_M,
            default_distance: DEFAULT_DISTANCE_M,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionState {
    /// Lot being measured, with its committed measurements.
    active_lot: Option<Lot>,

    active_tree: u32,

    active_method: Method,

    /// Horizontal distance applied to new captures.
    active_distance: f64,

    #[serde(rename = "calibration_offset")]
    calibration: Calibration,

    /// Latest corrected inclination in degrees.
    current_angle: f64,

    eye_height: f64,

    tree_complete: bool,

    /// Uncommitted segments.
    ledger: SegmentLedger,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SessionState {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            active_lot: None,
            active_tree: 1,
            active_method: Method::MethodA,
            active_distance: config.default_distance,
            calibration: Calibration::default(),
            current_angle: 0.0,
            eye_height: config.eye_height,
            tree_complete: false,
            ledger: SegmentLedger::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        match (&self.active_lot, self.tree_complete) {
            (None, _) => Phase::Idle,
            (Some(_), true) => Phase::TreeComplete,
            (Some(_), false) => Phase::TreeReady(self.active_method),
        }
    }

    pub fn active_lot(&self) -> Option<&Lot> {
        self.active_lot.as_ref()
    }

    pub fn active_tree(&self) -> u32 {
        self.active_tree
    }

    pub fn active_method(&self) -> Method {
        self.active_method
    }

    pub fn active_distance(&self) -> f64 {
        self.active_distance
    }

    pub fn calibration_offset(&self) -> f64 {
        self.calibration.offset()
    }

    pub fn current_angle(&self) -> f64 {
        self.current_angle
    }

    pub fn eye_height(&self) -> f64 {
        self.eye_height
    }

    pub fn ledger(&self) -> &SegmentLedger {
        &self.ledger
    }

    /// Height currently sighted, for live display.
    pub fn live_height(&self) -> f64 {
        height(self.current_angle, self.active_distance, self.eye_height)
    }

    pub fn level_indicator(&self) -> LevelIndicator {
        LevelIndicator::from_angle(self.current_angle)
    }
}

impl SessionState {
    /// Starts a new lot at tree 1 with `MethodA`.
    pub fn new_lot(&mut self, name: &str) -> Result<&Lot, LotbookError> {
        let lot = Lot::new(name)?;
        info!("new lot {}", lot.name());
        Ok(self.activate(lot, 1))
    }

    /// Eye height for live heights from here on. Checked by
    /// [`SessionConfig::validate`] before it gets here.
    pub(crate) fn set_eye_height(&mut self, meters: f64) {
        self.eye_height = meters;
    }

    /// Makes `lot` the active lot, resuming at `tree`.
    pub(crate) fn activate(&mut self, lot: Lot, tree: u32) -> &Lot {
        self.active_tree = tree;
        self.active_method = Method::MethodA;
        self.tree_complete = false;
        self.ledger.reset();
        self.active_lot.insert(lot)
    }

    /// Feeds one orientation sample; returns the live height.
    ///
    /// Empty samples, and samples with a NaN or infinite pitch, leave
    /// the current angle as it was.
    pub fn observe(&mut self, sample: AngleSample) -> f64 {
        if let Some(pitch) = sample.pitch_degrees.filter(|p| p.is_finite()) {
            self.current_angle = self.calibration.effective_angle(pitch);
        }
        self.live_height()
    }

    /// Makes the current line of sight the zero reference.
    ///
    /// Additive: see [`Calibration::calibrate`].
    pub fn calibrate(&mut self) -> f64 {
        self.calibration.calibrate(self.current_angle);
        self.current_angle = 0.0;
        self.calibration.offset()
    }

    /// Captures the live height derived from the current angle.
    pub fn capture_sensor(&mut self) -> Result<&Segment, LotbookError> {
        let raw = self.live_height();
        let angle = (self.current_angle * 10.0).round() / 10.0;
        debug!("capture sensor; angle: {angle}, raw: {raw}");
        self.ledger.capture(
            raw,
            CaptureMethod::Sensor,
            Some(angle),
            self.active_distance,
        )
    }

    pub fn capture_manual(&mut self, height: f64) -> Result<&Segment, LotbookError> {
        debug!("capture manual; raw: {height}");
        self.ledger
            .capture(height, CaptureMethod::Manual, None, self.active_distance)
    }

    pub fn edit_segment(&mut self, position: usize, height: f64) -> Result<&Segment, LotbookError> {
        self.ledger.edit(position, height)
    }

    pub fn delete_segment(&mut self, position: usize) -> Result<Segment, LotbookError> {
        self.ledger.delete(position)
    }

    /// Commits the ledger as a measurement of the active tree/method.
    ///
    /// After `MethodA` the same tree moves on to `MethodB`; after
    /// `MethodB` the tree is complete and waits for
    /// [`SessionState::advance_tree`].
    pub fn commit_measurement(
        &mut self,
        timestamp: DateTime<Utc>,
    ) -> Result<TreeMeasurement, LotbookError> {
        if self.ledger.is_empty() {
            return Err(LotbookError::EmptyLedger);
        }
        let lot = self.active_lot.as_mut().ok_or(LotbookError::NoActiveLot)?;
        let measurement = TreeMeasurement::from_ledger(
            self.active_tree,
            self.active_method,
            &self.ledger,
            self.active_distance,
            timestamp,
        )?;
        lot.push(measurement.clone());
        self.ledger.reset();
        info!(
            "committed tree {} {} at {:.2} m",
            measurement.tree_number(),
            measurement.method(),
            measurement.total_height()
        );
        match self.active_method {
            Method::MethodA => self.active_method = Method::MethodB,
            Method::MethodB => self.tree_complete = true,
        }
        Ok(measurement)
    }

    /// Moves to the next tree, whether or not this one is complete.
    pub fn advance_tree(&mut self) -> Result<u32, LotbookError> {
        if self.active_lot.is_none() {
            return Err(LotbookError::NoActiveLot);
        }
        self.active_tree = self
            .active_tree
            .checked_add(1)
            .ok_or(LotbookError::InvalidTreeNumber(self.active_tree))?;
        self.active_method = Method::MethodA;
        self.tree_complete = false;
        self.ledger.reset();
        Ok(self.active_tree)
    }

    /// Jumps to tree `number`, discarding uncommitted segments.
    ///
    /// Returns how many segments were discarded; warning the operator
    /// beforehand is up to the caller.
    pub fn change_tree(&mut self, number: u32) -> Result<usize, LotbookError> {
        if number == 0 {
            return Err(LotbookError::InvalidTreeNumber(number));
        }
        let discarded = self.ledger.len();
        if discarded > 0 {
            warn!("tree {number}: discarded {discarded} uncommitted segments");
        }
        self.active_tree = number;
        self.tree_complete = false;
        self.ledger.reset();
        Ok(discarded)
    }

    /// Switches method. Segments already captured stay in the ledger
    /// and will be committed under the new method.
    pub fn change_method(&mut self, method: Method) {
        self.active_method = method;
        self.tree_complete = false;
    }

    /// Sets the distance for subsequent captures only.
    pub fn change_distance(&mut self, meters: f64) -> Result<(), LotbookError> {
        if !meters.is_finite() || meters <= 0.0 {
            return Err(LotbookError::InvalidDistance(meters));
        }
        self.active_distance = meters;
        Ok(())
    }

    pub(crate) fn mark_saved(&mut self, at: DateTime<Utc>) {
        if let Some(lot) = self.active_lot.as_mut() {
            lot.set_saved_at(at);
        }
    }

    pub fn clear(&mut self, config: SessionConfig) {
        *self = Self::new(config);
    }
}
