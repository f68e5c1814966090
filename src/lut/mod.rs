//! Travel-time lookup tables (LUTs): construction, interpolation and
//! persistence.
//!
//! Grounded on `examples/original_source/QMigrate/core/model.py`'s `LUT`
//! class (fields, `value_at`/`fetch_map`/`decimate`) and on
//! `examples/other_examples/.../crates-projection-src-lut.rs.rs` for the
//! binary-persistence shape (`to_bytes`/`from_bytes`, a typed size-mismatch
//! error).

mod builder;
mod fmm;
mod io;
mod nonlinloc;
mod travel_time;
mod velocity;

pub use builder::{BuildMode, TravelTimeBuilder};
pub use fmm::FmmError;
pub use io::{read_lut, write_lut};
pub use nonlinloc::{read_nonlinloc_lut, NonLinLocGrid};
pub use travel_time::Lut;
pub use velocity::{Layer, VelocityError, VelocityModel};

use thiserror::Error;

use crate::event::Phase;
use crate::geo::grid::GridError;

#[derive(Error, Debug)]
pub enum LutError {
    #[error(transparent)]
    Grid(#[from] GridError),

    #[error("non-finite travel time computed for station {station} phase {phase:?}")]
    NonFiniteTravelTime { station: String, phase: Phase },

    #[error("negative travel time ({value}) computed for station {station} phase {phase:?}")]
    NegativeTravelTime {
        station: String,
        phase: Phase,
        value: f64,
    },

    #[error("LUT shape mismatch: expected {expected} cells, found {found}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("LUT station dimension changed: expected {expected} stations, found {found}")]
    StationDimensionChanged { expected: usize, found: usize },

    #[error("velocity at depth {depth} is non-positive: vp={vp}, vs={vs}")]
    NonPositiveVelocity { depth: f64, vp: f64, vs: f64 },

    #[error("station lies outside the travel-time grid's domain")]
    SourceOutsideDomain,

    #[error("fast marching did not converge while building the LUT")]
    DidNotConverge,

    #[error("unsupported LUT file format version: {found} (supports {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("LUT file is corrupt: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("out of memory: failed to allocate {bytes} bytes for a LUT")]
    OutOfMemory { bytes: usize },
}

impl From<VelocityError> for LutError {
    fn from(e: VelocityError) -> Self {
        match e {
            VelocityError::NonPositiveVelocity { depth, vp, vs } => {
                Self::NonPositiveVelocity { depth, vp, vs }
            }
            other => Self::Corrupt(other.to_string()),
        }
    }
}
