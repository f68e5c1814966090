//! Error type for all seiscoal-related errors. This should be the *only*
//! error enum that is publicly visible.

use thiserror::Error;

use crate::geo::grid::GridError;
use crate::locate::LocateError;
use crate::lut::LutError;
use crate::onset::OnsetError;
use crate::scan::ScanError;
use crate::station::StationFileError;
use crate::trigger::TriggerError;

/// The *only* publicly visible error from seiscoal.
#[derive(Error, Debug)]
pub enum SeisError {
    /// An invariant was violated while configuring a component.
    #[error("configuration error: {0}")]
    Config(String),

    /// Array dimensions disagreed.
    #[error("shape error: {0}")]
    Shape(String),

    /// A pad or window was too small, or fell outside the available data.
    #[error("window error: {0}")]
    Window(String),

    /// An operation required at least one station but none were available.
    #[error("no stations available: {0}")]
    NoStations(String),

    /// LUT construction failed.
    #[error("LUT build error: {0}")]
    Build(String),

    /// A non-fatal fit failure. Callers absorb this and emit a sentinel pick;
    /// it is only ever surfaced here when a caller chooses to propagate it.
    #[error("fit error: {0}")]
    Fit(String),

    /// A collaborator (waveform reader, results writer) failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// An allocation failed. Carries the size that was requested.
    #[error("out of memory: failed to allocate {bytes} bytes")]
    OutOfMemory { bytes: usize },

    /// A generic error that doesn't fit any of the above.
    #[error("{0}")]
    Generic(String),
}

impl From<GridError> for SeisError {
    fn from(e: GridError) -> Self {
        let s = e.to_string();
        match e {
            GridError::NonPositiveCellCount { .. }
            | GridError::NonPositiveCellSize { .. }
            | GridError::InconsistentCentre => Self::Config(s),
            GridError::InvalidProjection(_) => Self::Config(s),
            GridError::IndexOutOfBounds { .. } => Self::Shape(s),
        }
    }
}

impl From<LutError> for SeisError {
    fn from(e: LutError) -> Self {
        let s = e.to_string();
        match e {
            LutError::Grid(e) => Self::from(e),
            LutError::NonFiniteTravelTime { .. } | LutError::NegativeTravelTime { .. } => {
                Self::Build(s)
            }
            LutError::ShapeMismatch { .. } | LutError::StationDimensionChanged { .. } => {
                Self::Shape(s)
            }
            LutError::NonPositiveVelocity { .. }
            | LutError::SourceOutsideDomain
            | LutError::DidNotConverge => Self::Build(s),
            LutError::UnsupportedVersion { .. } | LutError::Corrupt(_) | LutError::Io(_) => {
                Self::Io(s)
            }
            LutError::OutOfMemory { bytes } => Self::OutOfMemory { bytes },
        }
    }
}

impl From<OnsetError> for SeisError {
    fn from(e: OnsetError) -> Self {
        let s = e.to_string();
        match e {
            OnsetError::ShapeMismatch { .. } => Self::Shape(s),
            OnsetError::InvalidFilter { .. } | OnsetError::InvalidWindow { .. } => Self::Config(s),
        }
    }
}

impl From<ScanError> for SeisError {
    fn from(e: ScanError) -> Self {
        let s = e.to_string();
        match e {
            ScanError::ShapeMismatch { .. } => Self::Shape(s),
            ScanError::NoStations => Self::NoStations(s),
            ScanError::PadTooSmall { .. } => Self::Window(s),
            ScanError::OutOfMemory { bytes } => Self::OutOfMemory { bytes },
        }
    }
}

impl From<TriggerError> for SeisError {
    fn from(e: TriggerError) -> Self {
        let s = e.to_string();
        match e {
            TriggerError::RepeatLessThanMarginal { .. } => Self::Config(s),
        }
    }
}

impl From<LocateError> for SeisError {
    fn from(e: LocateError) -> Self {
        let s = e.to_string();
        match e {
            LocateError::Scan(e) => Self::from(e),
            LocateError::Lut(e) => Self::from(e),
            LocateError::EmptyWindow | LocateError::ArgmaxOutsideMarginal => Self::Window(s),
            LocateError::Fit(_) => Self::Fit(s),
            LocateError::SingularCovariance => Self::Fit(s),
        }
    }
}

impl From<StationFileError> for SeisError {
    fn from(e: StationFileError) -> Self {
        let s = e.to_string();
        match e {
            StationFileError::Io(_) => Self::Io(s),
            _ => Self::Config(s),
        }
    }
}

impl From<std::io::Error> for SeisError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
