//! # Lotbook
//!
//! `lotbook` keeps the field ledger for clinometer tree height
//! surveys. Heights are captured as stacked segments per tree and
//! method, committed into named lots, archived, exported as CSV and
//! mirrored to a durable key-value slot.
//!
//! All interaction goes through [`Controller`], which owns the
//! session and archive and persists after every mutating command.

mod archive;
mod controller;
mod error;
pub mod export;
mod ledger;
mod measurement;
mod session;
pub mod store;
#[cfg(test)]
mod testutil;

pub use crate::{
    archive::{BatchArchive, LoadedLot, LotSummary, SaveOutcome},
    controller::Controller,
    error::{HeightBound, LotbookError},
    export::CsvExport,
    ledger::{CaptureMethod, Segment, SegmentLedger},
    measurement::{Lot, Method, TreeMeasurement},
    session::{Phase, SessionConfig, SessionState},
    store::{FileSlots, MemorySlots, PersistenceStore, SlotStore, Snapshot},
};
pub use clinometer;
