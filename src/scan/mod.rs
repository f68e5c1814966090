//! Stacks per-station onset functions against travel times into a 4D
//! (3D-space x time) coalescence volume.
//!
//! Grounded on `examples/original_source/QMigrate/signal/scan.py`'s
//! `_compute` stacking loop (per-station streaming accumulation, NaN
//! treated as zero contribution, the `dsnr` scaling and normalised-
//! coalescence rescale), and on
//! `examples/cjordan-mwa_hyperdrive/src/model/mod.rs`'s outer-axis
//! `into_par_iter()` parallel-accumulation pattern.

use ndarray::{parallel::prelude::*, Array2, Axis};
use thiserror::Error;

use crate::event::Phase;
use crate::lut::Lut;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("onset array shape mismatch: expected {expected} stations, found {found}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("no stations are available to scan")]
    NoStations,

    #[error("pad of {pad_samples} samples is smaller than the largest travel time ({max_tt_samples} samples)")]
    PadTooSmall { pad_samples: usize, max_tt_samples: usize },

    #[error("out of memory: failed to allocate {bytes} bytes for the coalescence volume")]
    OutOfMemory { bytes: usize },
}

/// Per-station onset functions for one phase, `[station, sample]`.
pub type OnsetFunctions = Array2<f64>;

/// The result of one scan: the coalescence volume `[time, cell]` and the
/// number of stations that contributed to each time sample (for `dsnr`
/// scaling downstream, in [`crate::trigger`]).
pub struct ScanResult {
    pub coalescence: Array2<f64>,
    pub n_available: Vec<usize>,
}

pub struct CoalescenceScanner<'a> {
    lut: &'a Lut,
    sampling_rate: f64,
    normalise: bool,
}

impl<'a> CoalescenceScanner<'a> {
    pub fn new(lut: &'a Lut, sampling_rate: f64, normalise: bool) -> Self {
        Self {
            lut,
            sampling_rate,
            normalise,
        }
    }

    /// Scans `p_onsets`/`s_onsets` (each `[station, sample]`, already
    /// time-aligned with the LUT's grid and with `availability[station] ==
    /// 0` rows pre-zeroed by the caller) into a coalescence volume over
    /// every sample for which a full travel-time lookahead fits inside the
    /// onset arrays.
    pub fn scan(
        &self,
        p_onsets: &OnsetFunctions,
        s_onsets: &OnsetFunctions,
        availability: &[u8],
    ) -> Result<ScanResult, ScanError> {
        let n_stations = self.lut.stations().len();
        if p_onsets.shape()[0] != n_stations || s_onsets.shape()[0] != n_stations {
            return Err(ScanError::ShapeMismatch {
                expected: n_stations,
                found: p_onsets.shape()[0].max(s_onsets.shape()[0]),
            });
        }
        if availability.len() != n_stations {
            return Err(ScanError::ShapeMismatch {
                expected: n_stations,
                found: availability.len(),
            });
        }
        let n_available_total = availability.iter().filter(|&&a| a != 0).count();
        if n_available_total == 0 {
            return Err(ScanError::NoStations);
        }

        let n_cells = self.lut.grid().n_cells();
        let n_samples = p_onsets.shape()[1].min(s_onsets.shape()[1]);

        // Precompute each station's P/S travel times in samples, per cell.
        let p_tt_samples: Vec<Vec<i64>> = (0..n_stations)
            .map(|s| {
                self.lut
                    .fetch_map(s, Phase::P)
                    .into_iter()
                    .map(|t| (t * self.sampling_rate).round() as i64)
                    .collect()
            })
            .collect();
        let s_tt_samples: Vec<Vec<i64>> = (0..n_stations)
            .map(|s| {
                self.lut
                    .fetch_map(s, Phase::S)
                    .into_iter()
                    .map(|t| (t * self.sampling_rate).round() as i64)
                    .collect()
            })
            .collect();

        let max_tt_samples = p_tt_samples
            .iter()
            .chain(s_tt_samples.iter())
            .flat_map(|v| v.iter())
            .copied()
            .max()
            .unwrap_or(0) as usize;
        if n_samples <= max_tt_samples {
            return Err(ScanError::PadTooSmall {
                pad_samples: n_samples,
                max_tt_samples,
            });
        }
        let n_origins = n_samples - max_tt_samples;

        let mut coalescence = Array2::<f64>::zeros((n_origins, n_cells));
        let mut n_available = vec![0usize; n_origins];

        coalescence
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(origin, mut row)| {
                // Per-station streaming accumulation: walking one station's
                // full P/S arrays at a time keeps each station's onset and
                // travel-time data resident in cache before moving on.
                for station in 0..n_stations {
                    if availability[station] == 0 {
                        continue;
                    }
                    let p_row = p_onsets.row(station);
                    let s_row = s_onsets.row(station);
                    let p_tt = &p_tt_samples[station];
                    let s_tt = &s_tt_samples[station];
                    for cell in 0..n_cells {
                        let p_idx = origin + p_tt[cell] as usize;
                        let s_idx = origin + s_tt[cell] as usize;
                        let p_value = p_row.get(p_idx).copied().unwrap_or(0.0);
                        let s_value = s_row.get(s_idx).copied().unwrap_or(0.0);
                        let p_value = if p_value.is_nan() { 0.0 } else { p_value };
                        let s_value = if s_value.is_nan() { 0.0 } else { s_value };
                        row[cell] += p_value + s_value;
                    }
                }
            });

        for origin in 0..n_origins {
            n_available[origin] = n_available_total;
        }

        // `dsnr` scaling: rescales the summed onset by the number of
        // stations that actually contributed, so sparser networks aren't
        // penalised relative to denser ones.
        for (origin, mut row) in coalescence.axis_iter_mut(Axis(0)).enumerate() {
            let n = n_available[origin].max(1) as f64;
            let total = row.sum();
            let scale = (total / (2.0 * n) - 1.0).exp();
            if self.normalise {
                let factor = scale * n_cells as f64 / total.max(1e-300);
                row.mapv_inplace(|v| v * factor);
            } else {
                row.mapv_inplace(|v| v * scale);
            }
        }

        Ok(ScanResult {
            coalescence,
            n_available,
        })
    }
}

/// Reduces a [`ScanResult`]'s `[time, cell]` volume to one
/// [`crate::trigger::CoaSample`] per time sample: the spatial maximum and
/// its cell's global position, ready for [`crate::trigger::trigger`].
pub fn coa_series(
    result: &ScanResult,
    lut: &Lut,
    onset_start: hifitime::Epoch,
    sampling_rate: f64,
) -> Vec<crate::trigger::CoaSample> {
    let grid = lut.grid();
    result
        .coalescence
        .axis_iter(Axis(0))
        .enumerate()
        .map(|(t, row)| {
            let (cell, &value) = row
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
                .unwrap_or((0, &f64::NEG_INFINITY));
            let (i, j, k) = grid.index_to_ijk(cell).unwrap_or((0, 0, 0));
            let xyz = grid.loc_to_global_xyz((i as f64, j as f64, k as f64));
            let time = onset_start + hifitime::Duration::from_f64(t as f64 / sampling_rate, hifitime::Unit::Second);
            crate::trigger::CoaSample { time, value, xyz }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{GridSpec, Projection, SortOrder};
    use crate::station::{Station, StationSet};
    use ndarray::Array4;

    fn tiny_lut() -> Lut {
        let grid = GridSpec {
            cell_count: (2, 2, 2),
            cell_size: (100.0, 100.0, 100.0),
            azimuth: 0.0,
            dip: 0.0,
            sort_order: SortOrder::RowMajor,
            elevation: 0.0,
            projection: Projection::Wgs84,
            longitude: 0.0,
            latitude: 0.0,
        }
        .try_build()
        .unwrap();
        let stations = StationSet::new(vec![
            Station::new("AA01", 0.0, 0.0, 0.0),
            Station::new("AA02", 0.001, 0.001, 0.0),
        ]);
        let p_times = Array4::<f64>::from_elem((2, 2, 2, 2), 0.1);
        let s_times = Array4::<f64>::from_elem((2, 2, 2, 2), 0.2);
        Lut::new(grid, stations, p_times, s_times).unwrap()
    }

    #[test]
    fn scan_produces_one_row_per_fitting_origin() {
        let lut = tiny_lut();
        let sampling_rate = 100.0;
        let n_samples = 50;
        let p_onsets = Array2::<f64>::from_elem((2, n_samples), 0.5);
        let s_onsets = Array2::<f64>::from_elem((2, n_samples), 0.3);
        let scanner = CoalescenceScanner::new(&lut, sampling_rate, false);
        let result = scanner.scan(&p_onsets, &s_onsets, &[1, 1]).unwrap();
        assert!(result.coalescence.shape()[0] > 0);
        assert_eq!(result.coalescence.shape()[1], lut.grid().n_cells());
    }

    #[test]
    fn unavailable_stations_do_not_contribute() {
        let lut = tiny_lut();
        let n_samples = 50;
        let p_onsets = Array2::<f64>::from_elem((2, n_samples), 0.5);
        let s_onsets = Array2::<f64>::from_elem((2, n_samples), 0.3);
        let scanner = CoalescenceScanner::new(&lut, 100.0, false);
        let both = scanner.scan(&p_onsets, &s_onsets, &[1, 1]).unwrap();
        let one = scanner.scan(&p_onsets, &s_onsets, &[1, 0]).unwrap();
        assert!(both.coalescence[[0, 0]] >= one.coalescence[[0, 0]]);
    }

    #[test]
    fn rejects_no_stations_available() {
        let lut = tiny_lut();
        let n_samples = 50;
        let p_onsets = Array2::<f64>::from_elem((2, n_samples), 0.5);
        let s_onsets = Array2::<f64>::from_elem((2, n_samples), 0.3);
        let scanner = CoalescenceScanner::new(&lut, 100.0, false);
        assert!(matches!(scanner.scan(&p_onsets, &s_onsets, &[0, 0]), Err(ScanError::NoStations)));
    }

    #[test]
    fn rejects_pad_too_small() {
        let lut = tiny_lut();
        let n_samples = 5;
        let p_onsets = Array2::<f64>::from_elem((2, n_samples), 0.5);
        let s_onsets = Array2::<f64>::from_elem((2, n_samples), 0.3);
        let scanner = CoalescenceScanner::new(&lut, 1000.0, false);
        assert!(matches!(
            scanner.scan(&p_onsets, &s_onsets, &[1, 1]),
            Err(ScanError::PadTooSmall { .. })
        ));
    }
}
