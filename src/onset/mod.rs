//! Turns raw waveform windows into onset (detection) functions, ready for
//! the coalescence scanner to stack against travel times.
//!
//! Grounded on `examples/original_source/QMigrate/signal/scan.py`: bandpass
//! filter, taper, STA/LTA, log-clipped onset transform.

mod filter;
mod pipeline;
mod stalta;

pub use filter::{bandpass_filter, FilterSpec};
pub use pipeline::{OnsetPipeline, PhaseOnsetConfig, StaLtaMode};
pub use stalta::{classic_sta_lta, onset_transform, centred_sta_lta, StaLtaWindow};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OnsetError {
    #[error("signal and availability arrays disagree on station count: {signal_stations} vs {availability_len}")]
    ShapeMismatch {
        signal_stations: usize,
        availability_len: usize,
    },

    #[error("invalid filter corner frequencies: low={low}, high={high}, nyquist={nyquist}")]
    InvalidFilter { low: f64, high: f64, nyquist: f64 },

    #[error("invalid STA/LTA window: sta={sta_samples}, lta={lta_samples}, signal_len={signal_len}")]
    InvalidWindow {
        sta_samples: usize,
        lta_samples: usize,
        signal_len: usize,
    },
}
