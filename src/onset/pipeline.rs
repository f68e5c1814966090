//! Wires the per-channel primitives (`filter`, `stalta`) into the full
//! per-station P/S onset computation, per `SPEC_FULL.md` §4.5.
//!
//! Grounded on `examples/original_source/QMigrate/signal/scan.py`'s
//! `_compute_p_onset`/`_compute_s_onset`: DC removal, taper, filter,
//! STA/LTA, onset transform, run independently per channel, then P from Z
//! and S from the RMS of E/N.

use ndarray::Array2;

use crate::constants::TAPER_FRACTION;
use crate::math::cosine_taper;
use crate::waveform::WaveformFrame;

use super::{bandpass_filter, centred_sta_lta, classic_sta_lta, onset_transform, FilterSpec, OnsetError, StaLtaWindow};

/// STA/LTA mode selector (`SPEC_FULL.md` §4.5 step 4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StaLtaMode {
    Classic,
    Centred,
}

/// Per-phase filter corners and STA/LTA window, bundled so `P` and `S` can
/// be configured independently.
#[derive(Clone, Copy, Debug)]
pub struct PhaseOnsetConfig {
    pub filter: FilterSpec,
    pub window: StaLtaWindow,
    pub mode: StaLtaMode,
}

/// The full onset pipeline: P onsets from Z, S onsets from E/N.
#[derive(Clone, Copy, Debug)]
pub struct OnsetPipeline {
    pub p: PhaseOnsetConfig,
    pub s: PhaseOnsetConfig,
}

/// Processes one raw channel: DC removal, taper, filter, STA/LTA, onset
/// transform. Returns the log-clipped onset function.
fn process_channel(signal: &[f64], config: &PhaseOnsetConfig) -> Result<Vec<f64>, OnsetError> {
    if signal.iter().all(|&v| v == 0.0) {
        return Ok(vec![0.0; signal.len()]);
    }
    let first = signal[0];
    let dc_removed: Vec<f64> = signal.iter().map(|&v| v - first).collect();

    let taper = cosine_taper(dc_removed.len(), TAPER_FRACTION);
    let tapered: Vec<f64> = dc_removed.iter().zip(taper.iter()).map(|(&v, &w)| v * w).collect();

    let filtered = bandpass_filter(&tapered, &config.filter)?;

    let ratio = match config.mode {
        StaLtaMode::Classic => classic_sta_lta(&filtered, config.window)?,
        StaLtaMode::Centred => centred_sta_lta(&filtered, config.window)?,
    };
    Ok(onset_transform(&ratio))
}

impl OnsetPipeline {
    /// Runs the pipeline over every station in `frame`, producing
    /// `[nstn, nsamples]` P and S onset arrays.
    pub fn run(&self, frame: &WaveformFrame) -> Result<(Array2<f64>, Array2<f64>), OnsetError> {
        let n_stations = frame.n_stations();
        let n_samples = frame.n_samples();
        let mut p_onset = Array2::<f64>::zeros((n_stations, n_samples));
        let mut s_onset = Array2::<f64>::zeros((n_stations, n_samples));

        for station in 0..n_stations {
            if frame.availability.get(station).copied().unwrap_or(0) == 0 {
                continue;
            }
            let e: Vec<f64> = frame.signal.slice(ndarray::s![0, station, ..]).to_vec();
            let n: Vec<f64> = frame.signal.slice(ndarray::s![1, station, ..]).to_vec();
            let z: Vec<f64> = frame.signal.slice(ndarray::s![2, station, ..]).to_vec();

            let onset_z = process_channel(&z, &self.p)?;
            let onset_e = process_channel(&e, &self.s)?;
            let onset_n = process_channel(&n, &self.s)?;

            for t in 0..n_samples {
                p_onset[[station, t]] = onset_z[t];
                s_onset[[station, t]] = ((onset_e[t].powi(2) + onset_n[t].powi(2)) / 2.0).sqrt();
            }
        }
        Ok((p_onset, s_onset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hifitime::Epoch;
    use ndarray::Array3;

    fn step_signal(n: usize, onset: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let phase = (i as f64) * 0.3;
                let amplitude = if i < onset { 0.01 } else { 1.0 };
                amplitude * phase.sin()
            })
            .collect()
    }

    fn config() -> PhaseOnsetConfig {
        PhaseOnsetConfig {
            filter: FilterSpec { low_hz: 2.0, high_hz: 16.0, order: 2, sampling_rate: 100.0 },
            window: StaLtaWindow { sta_samples: 5, lta_samples: 50 },
            mode: StaLtaMode::Classic,
        }
    }

    #[test]
    fn runs_over_every_available_station() {
        let n_samples = 500;
        let mut signal = Array3::<f64>::zeros((3, 2, n_samples));
        for (c, ch) in signal.outer_iter_mut().enumerate() {
            let _ = c;
            let mut ch = ch;
            for mut station in ch.outer_iter_mut() {
                station.assign(&ndarray::Array1::from(step_signal(n_samples, 250)));
            }
        }
        let frame = WaveformFrame {
            start_time: Epoch::from_unix_seconds(0.0),
            sampling_rate: 100.0,
            signal,
            availability: vec![1, 0],
        };
        let pipeline = OnsetPipeline { p: config(), s: config() };
        let (p_onset, s_onset) = pipeline.run(&frame).unwrap();
        assert!(p_onset.row(0).iter().any(|&v| v > 0.0));
        assert!(s_onset.row(1).iter().all(|&v| v == 0.0));
    }
}
