/// Average eye height of a standing observer in meters.
pub const EYE_HEIGHT_M: f64 = 1.6;

/// Default horizontal distance from observer to trunk in meters.
pub const DEFAULT_DISTANCE_M: f64 = 15.0;

/// Angles within this many degrees of zero are considered level.
pub const LEVEL_TOLERANCE_DEG: f64 = 2.0;
