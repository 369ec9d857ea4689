mod commands;
mod options;

use anyhow::Result;
use clap::Parser;
use lotbook::{Controller, FileSlots, SessionConfig};
use options::Cli;

fn main() -> Result<()> {
    let Cli {
        state_dir,
        eye_height,
        json,
        cmd,
    } = Cli::parse();

    env_logger::init();

    let config = SessionConfig {
        eye_height,
        ..SessionConfig::default()
    };
    let slots = FileSlots::open(&state_dir)?;
    let mut ctl = Controller::open(slots, config)?;
    cmd.run(&mut ctl, json)
}
