//! Ports for the hardware collaborators that feed the core.
//!
//! The core never talks to a sensor or camera directly. Adapters
//! implement [`Device`] (plus [`AngleSource`] or [`Camera`]) and the
//! core holds them through an [`Acquired`] guard for the duration of
//! a measurement mode.

use crate::DeviceError;
use log::debug;
use std::{
    collections::VecDeque,
    ops::{Deref, DerefMut},
};

/// One orientation reading.
///
/// `pitch_degrees` is `None` when the sensor fired without a usable
/// value; consumers must leave their current angle unchanged.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AngleSample {
    pub pitch_degrees: Option<f64>,
}

impl AngleSample {
    pub fn new(pitch_degrees: f64) -> Self {
        Self {
            pitch_degrees: Some(pitch_degrees),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// A hardware handle that must be explicitly acquired and released.
pub trait Device {
    /// Human readable name used in error messages and logs.
    fn name(&self) -> &str;

    fn acquire(&mut self) -> Result<(), DeviceError>;

    fn release(&mut self);
}

/// A stream of device orientation samples.
pub trait AngleSource: Device {
    /// Returns the next pending sample, if any.
    fn poll(&mut self) -> Option<AngleSample>;
}

/// A live video feed. The core never inspects frames.
pub trait Camera: Device {}

/// Scoped ownership of an acquired [`Device`].
///
/// The device is released when the guard drops, whichever way the
/// measurement mode ends.
pub struct Acquired<'a, D: Device + ?Sized> {
    device: &'a mut D,
}

impl<'a, D: Device + ?Sized> Acquired<'a, D> {
    pub fn new(device: &'a mut D) -> Result<Self, DeviceError> {
        device.acquire()?;
        debug!("acquired {}", device.name());
        Ok(Self { device })
    }
}

impl<D: Device + ?Sized> Deref for Acquired<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.device
    }
}

impl<D: Device + ?Sized> DerefMut for Acquired<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        self.device
    }
}

impl<D: Device + ?Sized> Drop for Acquired<'_, D> {
    fn drop(&mut self) {
        self.device.release();
        debug!("released {}", self.device.name());
    }
}

/// An [`AngleSource`] that replays a fixed list of samples.
///
/// Useful for command line use, where a pitch is supplied as an
/// argument instead of read from a live sensor, and for tests.
#[derive(Debug, Clone, Default)]
pub struct Replay {
    samples: VecDeque<AngleSample>,
    active: bool,
}

impl Replay {
    pub fn new<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = AngleSample>,
    {
        Self {
            samples: samples.into_iter().collect(),
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Device for Replay {
    fn name(&self) -> &str {
        "replayed orientation sensor"
    }

    fn acquire(&mut self) -> Result<(), DeviceError> {
        self.active = true;
        Ok(())
    }

    fn release(&mut self) {
        self.active = false;
    }
}

impl AngleSource for Replay {
    fn poll(&mut self) -> Option<AngleSample> {
        if self.active {
            self.samples.pop_front()
        } else {
            None
        }
    }
}
