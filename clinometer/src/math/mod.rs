mod height;
mod pitch;

pub use {height::height, pitch::normalize_pitch, pitch::Calibration};
