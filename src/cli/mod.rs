//! Command-line entry point: one subcommand per pipeline stage, matching
//! the teacher's one-binary-many-subcommands layout.

mod build_lut;
mod locate_cmd;
mod scan_cmd;
mod trigger_cmd;

pub use build_lut::BuildLutArgs;
pub use locate_cmd::LocateArgs;
pub use scan_cmd::ScanArgs;
pub use trigger_cmd::TriggerArgs;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::SeisError;

#[derive(Parser, Debug)]
#[clap(
    name = "seiscoal",
    about = "Detects, triggers and locates microseismic events from continuous waveform data",
    version
)]
pub struct Cli {
    /// Increase logging verbosity (-v debug, -vv trace).
    #[clap(short, long, parse(from_occurrences), global = true, help_heading = "LOGGING")]
    pub verbose: u8,

    /// Mirror log output to this file in addition to the terminal.
    #[clap(long, global = true, help_heading = "LOGGING")]
    pub log_file: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Builds a travel-time LUT from a station table and velocity model.
    BuildLut(BuildLutArgs),
    /// Stacks onset functions against a LUT into a coalescence time series.
    Scan(ScanArgs),
    /// Groups a coalescence time series into candidate event windows.
    Trigger(TriggerArgs),
    /// Locates and picks every candidate window, writing event records.
    Locate(LocateArgs),
}

/// Parses arguments, installs the logger, and dispatches to the requested
/// subcommand. This is the crate's sole binary entry point.
pub fn run() -> Result<(), SeisError> {
    let cli = Cli::parse();
    crate::logging::setup_logging(cli.verbose, cli.log_file.as_deref())?;
    match cli.command {
        Command::BuildLut(args) => build_lut::run(args),
        Command::Scan(args) => scan_cmd::run(args),
        Command::Trigger(args) => trigger_cmd::run(args),
        Command::Locate(args) => locate_cmd::run(args),
    }
}
