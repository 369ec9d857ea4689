use crate::constants::LEVEL_TOLERANCE_DEG;

/// Drawing instruction for the bubble-level overlay shown over the
/// camera feed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelIndicator {
    /// Horizontal bubble offset as a fraction of the half-width of
    /// the level, in −1..1. Positive is up.
    pub offset: f64,

    /// Whether the line of sight is within tolerance of horizontal.
    pub level: bool,
}

impl LevelIndicator {
    pub fn from_angle(angle_deg: f64) -> Self {
        Self {
            offset: (angle_deg / 90.0).clamp(-1.0, 1.0),
            level: angle_deg.abs() < LEVEL_TOLERANCE_DEG,
        }
    }
}
