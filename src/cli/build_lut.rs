use std::path::PathBuf;

use clap::Parser;
use log::info;

use crate::error::SeisError;
use crate::geo::{GridSpec, Projection, SortOrder};
use crate::lut::{write_lut, BuildMode, TravelTimeBuilder, VelocityModel};
use crate::station::StationSet;

#[derive(Parser, Debug)]
pub struct BuildLutArgs {
    /// Path to the station table CSV (`name, longitude, latitude, elevation`).
    #[clap(long, help_heading = "INPUT AND OUTPUT")]
    stations: PathBuf,

    /// Path to the velocity model CSV (`depth, vp, vs`).
    #[clap(long, help_heading = "INPUT AND OUTPUT")]
    velocity_model: PathBuf,

    /// Path the binary LUT is written to.
    #[clap(short, long, help_heading = "INPUT AND OUTPUT")]
    output: PathBuf,

    /// Treat the velocity model as piecewise-constant blocks rather than a
    /// piecewise-linear gradient between layers.
    #[clap(long, help_heading = "VELOCITY MODEL")]
    block_model: bool,

    /// Number of cells along the grid's x axis.
    #[clap(long, help_heading = "GRID")]
    nx: i64,
    /// Number of cells along the grid's y axis.
    #[clap(long, help_heading = "GRID")]
    ny: i64,
    /// Number of cells along the grid's z axis.
    #[clap(long, help_heading = "GRID")]
    nz: i64,

    /// Cell size along the grid's x axis, in metres.
    #[clap(long, help_heading = "GRID")]
    dx: f64,
    /// Cell size along the grid's y axis, in metres.
    #[clap(long, help_heading = "GRID")]
    dy: f64,
    /// Cell size along the grid's z axis, in metres.
    #[clap(long, help_heading = "GRID")]
    dz: f64,

    /// Grid azimuth, degrees clockwise from north.
    #[clap(long, default_value = "0.0", help_heading = "GRID")]
    azimuth: f64,

    /// Grid dip, degrees downward from horizontal.
    #[clap(long, default_value = "0.0", help_heading = "GRID")]
    dip: f64,

    /// Grid centre longitude, degrees.
    #[clap(long, help_heading = "GRID")]
    longitude: f64,
    /// Grid centre latitude, degrees.
    #[clap(long, help_heading = "GRID")]
    latitude: f64,
    /// Grid centre elevation, metres above the reference datum.
    #[clap(long, default_value = "0.0", help_heading = "GRID")]
    elevation: f64,

    /// Travel-time build mode: `homogeneous`, `layered-1d-radial`, or
    /// `layered-1d-direct`.
    #[clap(long, default_value = "layered-1d-radial", help_heading = "GRID")]
    mode: String,
}

fn parse_mode(s: &str) -> Result<BuildMode, SeisError> {
    match s {
        "homogeneous" => Ok(BuildMode::Homogeneous),
        "layered-1d-radial" => Ok(BuildMode::Layered1dRadial),
        "layered-1d-direct" => Ok(BuildMode::Layered1dDirect),
        other => Err(SeisError::Config(format!(
            "unknown build mode {other:?} (expected homogeneous, layered-1d-radial or layered-1d-direct)"
        ))),
    }
}

pub fn run(args: BuildLutArgs) -> Result<(), SeisError> {
    let stations = StationSet::from_csv(&args.stations)?;
    let velocity = VelocityModel::from_csv(&args.velocity_model, args.block_model)?;
    let mode = parse_mode(&args.mode)?;

    let grid = GridSpec {
        cell_count: (args.nx, args.ny, args.nz),
        cell_size: (args.dx, args.dy, args.dz),
        azimuth: args.azimuth,
        dip: args.dip,
        sort_order: SortOrder::RowMajor,
        elevation: args.elevation,
        projection: Projection::Wgs84,
        longitude: args.longitude,
        latitude: args.latitude,
    }
    .try_build()?;

    info!(
        "building travel-time LUT for {} stations over {} cells",
        stations.len(),
        grid.n_cells()
    );
    let lut = TravelTimeBuilder::new(grid, stations, velocity, mode).build()?;
    write_lut(lut, &args.output)?;
    info!("wrote LUT to {}", args.output.display());
    Ok(())
}
