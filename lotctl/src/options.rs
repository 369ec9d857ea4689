use clap::{Parser, Subcommand, ValueEnum};
use lotbook::{clinometer::constants::EYE_HEIGHT_M, Method};
use std::path::PathBuf;

/// Field book for clinometer tree height surveys.
///
/// State is kept in `--state-dir` between invocations, so a survey
/// can be carried out one command at a time.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the persisted session.
    #[arg(long, env = "LOTCTL_STATE_DIR", default_value = ".lotctl")]
    pub state_dir: PathBuf,

    /// Observer eye height in meters, applied when a lot is started.
    #[arg(long, default_value_t = EYE_HEIGHT_M)]
    pub eye_height: f64,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start a new lot at tree 1, MethodA.
    NewLot { name: String },

    /// Capture a cumulative height typed in by hand.
    Capture { height: f64 },

    /// Capture from inclination readings; the last one is used.
    Sight {
        /// Raw device pitch readings in degrees.
        #[arg(required = true, allow_negative_numbers = true)]
        pitch: Vec<f64>,
    },

    /// Make the line of sight the zero reference.
    Calibrate {
        /// Readings to take before calibrating. Without any, the last
        /// observed angle is used.
        #[arg(allow_negative_numbers = true)]
        pitch: Vec<f64>,
    },

    /// Change a segment's cumulative height.
    Edit { segment: usize, height: f64 },

    /// Remove a segment.
    Delete { segment: usize },

    /// Commit the segments for the active tree and method.
    Commit,

    /// Move on to the next tree.
    Next,

    /// Jump to a tree number, discarding uncommitted segments.
    Tree { number: u32 },

    /// Switch method for the active tree.
    Method {
        #[arg(value_enum)]
        method: MethodArg,
    },

    /// Horizontal distance to the trunk for subsequent captures.
    Distance { meters: f64 },

    /// Save the active lot to the archive.
    Save,

    /// Resume an archived lot.
    Load { name: String },

    /// Remove a lot from the archive.
    DeleteLot { name: String },

    /// List archived lots.
    Lots,

    /// Show the session.
    Status,

    /// Write a CSV export.
    Export {
        /// Export every archived lot plus the active one.
        #[arg(long)]
        all: bool,

        /// Output directory.
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Reset the session. Archived lots are kept.
    Clear,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MethodArg {
    A,
    B,
}

impl From<MethodArg> for Method {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::A => Method::MethodA,
            MethodArg::B => Method::MethodB,
        }
    }
}
