//! Waveform input. Reading continuous seismic data is deliberately out of
//! scope for this crate (see `SPEC_FULL.md` §1); callers supply a
//! [`WaveformSource`] implementation. A minimal reference implementation,
//! [`RawF32Source`], is provided for tests and the CLI.

use std::io::Read;
use std::path::Path;

use hifitime::Epoch;
use ndarray::Array3;

use crate::error::SeisError;

/// Component order is fixed: East, North, Z (up).
pub const N_COMPONENTS: usize = 3;

/// A window of three-component waveform data for every station in a
/// [`crate::station::StationSet`].
#[derive(Clone, Debug)]
pub struct WaveformFrame {
    pub start_time: Epoch,
    pub sampling_rate: f64,
    /// `[component, station, sample]`, component order (E, N, Z).
    pub signal: Array3<f64>,
    /// `1` if the station's channels are present and usable, `0` otherwise.
    pub availability: Vec<u8>,
}

impl WaveformFrame {
    pub fn n_stations(&self) -> usize {
        self.signal.shape()[1]
    }

    pub fn n_samples(&self) -> usize {
        self.signal.shape()[2]
    }
}

/// The interface a waveform collaborator must implement. Production readers
/// (miniSEED, SAC, etc.) are the caller's responsibility.
pub trait WaveformSource {
    fn read(
        &self,
        window_start: Epoch,
        window_end: Epoch,
        sampling_rate: f64,
    ) -> Result<WaveformFrame, SeisError>;
}

/// A minimal on-disk format used by tests and the CLI: a little-endian
/// header (`n_stations: u32`, `n_samples: u32`, `sampling_rate: f64`,
/// `start_time_unix_s: f64`) followed by `3 * n_stations * n_samples` `f32`
/// samples in `[component, station, sample]` order, then `n_stations` `u8`
/// availability flags.
pub struct RawF32Source {
    path: std::path::PathBuf,
}

impl RawF32Source {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl WaveformSource for RawF32Source {
    fn read(
        &self,
        _window_start: Epoch,
        _window_end: Epoch,
        _sampling_rate: f64,
    ) -> Result<WaveformFrame, SeisError> {
        use byteorder::{LittleEndian, ReadBytesExt};

        let mut file = std::fs::File::open(&self.path)?;
        let n_stations = file.read_u32::<LittleEndian>()? as usize;
        let n_samples = file.read_u32::<LittleEndian>()? as usize;
        let sampling_rate = file.read_f64::<LittleEndian>()?;
        let start_unix_s = file.read_f64::<LittleEndian>()?;

        let mut signal = Array3::<f64>::zeros((N_COMPONENTS, n_stations, n_samples));
        for c in 0..N_COMPONENTS {
            for s in 0..n_stations {
                for t in 0..n_samples {
                    signal[[c, s, t]] = file.read_f32::<LittleEndian>()? as f64;
                }
            }
        }
        let mut availability = vec![0u8; n_stations];
        file.read_exact(&mut availability)?;

        Ok(WaveformFrame {
            start_time: Epoch::from_unix_seconds(start_unix_s),
            sampling_rate,
            signal,
            availability,
        })
    }
}
