//! # Clinometer
//!
//! `clinometer` turns device pitch readings into heights above ground
//! using the observer's horizontal distance to the target and eye
//! height.

pub mod constants;
mod device;
mod error;
mod math;
mod overlay;

pub use crate::{
    device::{Acquired, AngleSample, AngleSource, Camera, Device, Replay},
    error::DeviceError,
    math::{height, normalize_pitch, Calibration},
    overlay::LevelIndicator,
};
