use thiserror::Error;

/// Failures reported by hardware adapters.
///
/// None of these are fatal; callers are expected to fall back to
/// manual height entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("access to {0} was denied")]
    PermissionDenied(String),

    #[error("{0} is not available on this device")]
    Unavailable(String),
}
