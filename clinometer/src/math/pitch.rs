/// Folds a device pitch reading (−180..180°) into −90..90°.
///
/// Devices report pitch past vertical as values beyond ±90°; those
/// are mirrored back so the result always describes the inclination
/// of the line of sight.
pub fn normalize_pitch(raw_deg: f64) -> f64 {
    if raw_deg > 90.0 {
        180.0 - raw_deg
    } else if raw_deg < -90.0 {
        -180.0 - raw_deg
    } else {
        raw_deg
    }
}

/// Zero reference applied to normalized pitch readings.
///
/// Calibration is additive: each call to [`Calibration::calibrate`]
/// adds the current (already corrected) angle to the offset, so
/// re-zeroing after drift compounds with earlier calibrations rather
/// than replacing them. Use [`Calibration::reset`] to start over.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Calibration {
    offset_deg: f64,
}

impl Calibration {
    pub fn new(offset_deg: f64) -> Self {
        Self { offset_deg }
    }

    pub fn offset(&self) -> f64 {
        self.offset_deg
    }

    /// Returns the corrected inclination for a raw device pitch.
    pub fn effective_angle(&self, raw_deg: f64) -> f64 {
        normalize_pitch(raw_deg) - self.offset_deg
    }

    /// Treats `current_angle_deg` as the new zero.
    pub fn calibrate(&mut self, current_angle_deg: f64) {
        self.offset_deg += current_angle_deg;
        log::debug!(
            "calibrate; added: {current_angle_deg}, offset: {}",
            self.offset_deg
        );
    }

    pub fn reset(&mut self) {
        self.offset_deg = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_pitch, Calibration};
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_pitch() {
        assert_eq!(normalize_pitch(45.0), 45.0);
        assert_eq!(normalize_pitch(90.0), 90.0);
        assert_eq!(normalize_pitch(120.0), 60.0);
        assert_eq!(normalize_pitch(180.0), 0.0);
        assert_eq!(normalize_pitch(-90.0), -90.0);
        assert_eq!(normalize_pitch(-135.0), -45.0);
        assert_eq!(normalize_pitch(-180.0), 0.0);
    }

    #[test]
    fn test_effective_angle_applies_offset() {
        let cal = Calibration::new(3.5);
        assert_relative_eq!(cal.effective_angle(120.0), 56.5);
    }

    #[test]
    fn test_calibration_is_cumulative() {
        let mut cal = Calibration::default();
        // Device pointed at the trunk base reads 4° up.
        let current = cal.effective_angle(4.0);
        cal.calibrate(current);
        assert_relative_eq!(cal.effective_angle(4.0), 0.0);

        // Device drifted; base now reads 5° raw, 1° corrected.
        let current = cal.effective_angle(5.0);
        assert_relative_eq!(current, 1.0);
        cal.calibrate(current);
        assert_relative_eq!(cal.offset(), 5.0);
        assert_relative_eq!(cal.effective_angle(5.0), 0.0);

        cal.reset();
        assert_eq!(cal.offset(), 0.0);
    }
}
