//! Event and pick records, and the (out-of-scope) results-persistence
//! interface those records are handed to.

use std::io::Write;

use hifitime::Epoch;

use crate::constants::PICK_SENTINEL;
use crate::error::SeisError;

/// The seismic phase a pick or travel time refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    P,
    S,
}

/// A triggered and located microseismic event.
#[derive(Clone, Debug)]
pub struct Event {
    pub event_id: String,
    pub coa_time: Epoch,
    pub coa_value: f64,
    /// The spline-refined location; see `locate::Location` for every
    /// estimate produced during localisation.
    pub coa_xyz: (f64, f64, f64),
    pub min_time: Epoch,
    pub max_time: Epoch,
}

impl Event {
    /// Derives an `event_id` from `coa_time`: its ISO-8601 rendering with
    /// `:`, `-` and `.` separators stripped.
    pub fn id_from_time(coa_time: Epoch) -> String {
        let iso = format!("{coa_time:?}");
        iso.chars().filter(|c| !matches!(c, ':' | '-' | '.')).collect()
    }
}

/// A single phase pick at one station.
#[derive(Clone, Debug)]
pub struct Pick {
    pub station: String,
    pub phase: Phase,
    pub modelled_time: Epoch,
    /// `None` when the fit failed; sentinel values are not used in this
    /// in-memory representation (only in the on-disk record format, per
    /// `SPEC_FULL.md` §7).
    pub pick_time: Option<Epoch>,
    pub pick_error: f64,
    pub pick_value: f64,
}

impl Pick {
    pub fn unpicked(station: impl Into<String>, phase: Phase, modelled_time: Epoch) -> Self {
        Self {
            station: station.into(),
            phase,
            modelled_time,
            pick_time: None,
            pick_error: PICK_SENTINEL,
            pick_value: PICK_SENTINEL,
        }
    }

    pub fn is_picked(&self) -> bool {
        self.pick_time.is_some()
    }
}

/// A full location estimate for one event: the three independent estimates
/// described in `SPEC_FULL.md` §4.8, plus the picks computed against it.
#[derive(Clone, Debug)]
pub struct LocatedEvent {
    pub event: Event,
    pub spline_xyz: (f64, f64, f64),
    pub covariance_xyz: (f64, f64, f64),
    pub covariance_err: (f64, f64, f64),
    pub gaussian_xyz: (f64, f64, f64),
    pub gaussian_err: (f64, f64, f64),
    pub picks: Vec<Pick>,
}

/// The interface event/pick records are handed to. Persistence is
/// deliberately out of scope; [`CsvResultsWriter`] is a reference
/// implementation for the CLI and tests.
pub trait ResultsWriter {
    fn write_event(&mut self, located: &LocatedEvent) -> Result<(), SeisError>;
}

/// Writes one CSV row per event with the columns named in `SPEC_FULL.md` §6.
pub struct CsvResultsWriter<W: Write> {
    writer: W,
    header_written: bool,
}

impl<W: Write> CsvResultsWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            header_written: false,
        }
    }

    fn write_header(&mut self) -> Result<(), SeisError> {
        writeln!(
            self.writer,
            "event_id,coa_time,coa_value,x,y,z,spline_x,spline_y,spline_z,cov_x,cov_y,cov_z,cov_err_x,cov_err_y,cov_err_z,gauss_err_x,gauss_err_y,gauss_err_z"
        )?;
        self.header_written = true;
        Ok(())
    }
}

impl<W: Write> ResultsWriter for CsvResultsWriter<W> {
    fn write_event(&mut self, located: &LocatedEvent) -> Result<(), SeisError> {
        if !self.header_written {
            self.write_header()?;
        }
        let e = &located.event;
        writeln!(
            self.writer,
            "{},{:?},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            e.event_id,
            e.coa_time,
            e.coa_value,
            e.coa_xyz.0,
            e.coa_xyz.1,
            e.coa_xyz.2,
            located.spline_xyz.0,
            located.spline_xyz.1,
            located.spline_xyz.2,
            located.covariance_xyz.0,
            located.covariance_xyz.1,
            located.covariance_xyz.2,
            located.covariance_err.0,
            located.covariance_err.1,
            located.covariance_err.2,
            located.gaussian_err.0,
            located.gaussian_err.1,
            located.gaussian_err.2,
        )?;
        Ok(())
    }
}
