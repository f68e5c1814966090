//! Locates a triggered event: a marginal coalescence map is built from the
//! candidate window's scan, three independent location estimates are taken
//! over it (global covariance, local 3D Gaussian, cubic-RBF spline), and
//! every station's P and S arrivals are picked against the spline
//! location's modelled travel times.
//!
//! Grounded on `examples/original_source/QMigrate/signal/scan.py`'s
//! `_location_error` (which calls `_covfit3d`, `_gaufit3d` and
//! `_splineloc` over the same marginalised map) and its own `_gaufit1d`
//! per-station picking routine further down the same file.

mod covariance;
mod gaussian3d;
mod lm;
mod pick;
mod spline;

use ndarray::Array2;
use thiserror::Error;

use crate::event::{LocatedEvent, Phase};
use crate::lut::{Lut, LutError};
use crate::scan::{ScanError, ScanResult};
use crate::trigger::CandidateWindow;

pub use covariance::CovarianceFit;
pub use gaussian3d::Gaussian3dFit;
pub use pick::PickWindow;
pub use spline::SplineFit;

#[derive(Error, Debug)]
pub enum LocateError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Lut(#[from] LutError),
    #[error("the marginal coalescence map has no usable values")]
    EmptyWindow,
    #[error("the coalescence volume's time-sample maximum falls outside the marginal window around the triggered peak; the event is likely spurious")]
    ArgmaxOutsideMarginal,
    #[error("fit error: {0}")]
    Fit(String),
    #[error("covariance matrix is singular or contains non-finite values")]
    SingularCovariance,
}

/// Tunables for the three location fits and the phase picker.
#[derive(Clone, Copy, Debug)]
pub struct LocateConfig {
    pub covariance_threshold: f64,
    pub gaussian_half_window: i64,
    pub spline_half_window: i64,
    pub spline_upscale: usize,
    pub sampling_rate: f64,
    /// Half-width, in seconds, of the window the in-window coalescence
    /// maximum must fall inside; outside it the event is dropped (per
    /// `SPEC_FULL.md` §4.8).
    pub marginal_window_s: f64,
    /// Fraction of a phase's travel time added to `marginal_window_s` to
    /// build that phase's candidate pick window (`SPEC_FULL.md` §4.8).
    pub percent_tt: f64,
    /// Percentile (as a fraction in `[0, 1]`) of the onset outside both
    /// phases' pick windows used as one term of the adaptive pick
    /// threshold (`SPEC_FULL.md` §4.8).
    pub pick_threshold: f64,
}

/// Collapses a `[time, cell]` coalescence volume to one value per cell by
/// log-sum-exp over time, then normalises by its maximum, per
/// `SPEC_FULL.md` §4.8: `coa_map[c] = log(sum_t exp(M[c, t]))`.
fn marginalise_over_time(coalescence: &Array2<f64>) -> Vec<f64> {
    let n_cells = coalescence.shape()[1];
    let mut sums = vec![0.0_f64; n_cells];
    for row in coalescence.rows() {
        for (cell, &value) in row.iter().enumerate() {
            if value.is_finite() {
                sums[cell] += value.exp();
            }
        }
    }
    let mut out: Vec<f64> = sums
        .iter()
        .map(|&s| if s > 0.0 { s.ln() } else { f64::NAN })
        .collect();
    let max = out.iter().cloned().filter(|v| v.is_finite()).fold(f64::NEG_INFINITY, f64::max);
    if max.is_finite() && max != 0.0 {
        for value in &mut out {
            *value /= max;
        }
    }
    out
}

/// `true` if the coalescence volume's time-sample maximum (over all cells)
/// falls further than `marginal_window_s` from `peak_time`.
fn time_argmax_outside_marginal(
    coalescence: &Array2<f64>,
    origin: hifitime::Epoch,
    sampling_rate: f64,
    peak_time: hifitime::Epoch,
    marginal_window_s: f64,
) -> bool {
    let best = coalescence
        .rows()
        .into_iter()
        .enumerate()
        .map(|(t, row)| (t, row.iter().cloned().filter(|v| v.is_finite()).fold(f64::NEG_INFINITY, f64::max)))
        .filter(|(_, v)| v.is_finite())
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
    let Some((best_t, _)) = best else {
        return true;
    };
    let best_time = origin + hifitime::Duration::from_f64(best_t as f64 / sampling_rate, hifitime::Unit::Second);
    let offset = (best_time - peak_time).to_seconds().abs();
    offset > marginal_window_s
}

/// Locates one triggered candidate window, producing a fully populated
/// [`LocatedEvent`].
///
/// `p_onsets`/`s_onsets` are the same per-station onset arrays the scan
/// was run over, aligned with `onset_start`; they're reused here for phase
/// picking so the picker works against exactly what the scan saw.
#[allow(clippy::too_many_arguments)]
pub fn locate_event(
    lut: &Lut,
    scan_result: &ScanResult,
    window: &CandidateWindow,
    p_onsets: &Array2<f64>,
    s_onsets: &Array2<f64>,
    onset_start: hifitime::Epoch,
    config: &LocateConfig,
) -> Result<LocatedEvent, LocateError> {
    let grid = lut.grid();
    if time_argmax_outside_marginal(
        &scan_result.coalescence,
        onset_start,
        config.sampling_rate,
        window.peak.time,
        config.marginal_window_s,
    ) {
        return Err(LocateError::ArgmaxOutsideMarginal);
    }
    let marginal = marginalise_over_time(&scan_result.coalescence);
    if marginal.iter().all(|v| !v.is_finite()) {
        return Err(LocateError::EmptyWindow);
    }

    let cov = covariance::covariance_fit(&marginal, grid, config.covariance_threshold)?;
    let gauss = gaussian3d::gaussian3d_fit(&marginal, grid, config.gaussian_half_window)?;
    let spline = spline::spline_fit(&marginal, grid, config.spline_half_window, config.spline_upscale)?;

    let mut event = crate::trigger::event_from_window(window);
    event.coa_xyz = spline.xyz;

    let mut picks = Vec::with_capacity(lut.stations().len() * 2);
    for station_index in 0..lut.stations().len() {
        let loc = grid.global_xyz_to_loc(spline.xyz);
        let p_ttime = lut.value_at(station_index, Phase::P, loc);
        let s_ttime = lut.value_at(station_index, Phase::S, loc);
        // "intersection, narrower wins": a window sized off this phase's own
        // travel time against half the P-S interval, per
        // `examples/original_source/QMigrate/signal/scan.py`'s pick routine.
        let sp_half_width_s = (s_ttime - p_ttime).abs() / 2.0;

        let p_modelled = window.peak.time + hifitime::Duration::from_f64(p_ttime, hifitime::Unit::Second);
        let s_modelled = window.peak.time + hifitime::Duration::from_f64(s_ttime, hifitime::Unit::Second);
        let p_window = PickWindow {
            percent_tt_half_width_s: config.marginal_window_s + config.percent_tt * p_ttime,
            sp_half_width_s,
        };
        let s_window = PickWindow {
            percent_tt_half_width_s: config.marginal_window_s + config.percent_tt * s_ttime,
            sp_half_width_s,
        };
        let station = lut.stations().get(station_index).map(|s| s.name.clone()).unwrap_or_default();

        // Both phases' windows are picked together: each one's adaptive
        // threshold masks out the *other* phase's window too, per
        // `examples/original_source/QMigrate/signal/scan.py`'s picking routine.
        let p_onset: Vec<f64> = p_onsets.row(station_index).to_vec();
        picks.push(pick::pick_phase(
            &station,
            Phase::P,
            &p_onset,
            onset_start,
            config.sampling_rate,
            p_modelled,
            p_window,
            config.pick_threshold,
            Some((s_modelled, s_window)),
        ));

        let s_onset: Vec<f64> = s_onsets.row(station_index).to_vec();
        picks.push(pick::pick_phase(
            &station,
            Phase::S,
            &s_onset,
            onset_start,
            config.sampling_rate,
            s_modelled,
            s_window,
            config.pick_threshold,
            Some((p_modelled, p_window)),
        ));
    }

    Ok(LocatedEvent {
        event,
        spline_xyz: spline.xyz,
        covariance_xyz: cov.xyz,
        covariance_err: cov.error_xyz,
        gaussian_xyz: gauss.xyz,
        gaussian_err: gauss.error_xyz,
        picks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marginalise_is_log_sum_exp_normalised_by_its_max() {
        let coalescence = Array2::from_shape_vec((2, 3), vec![1.0, f64::NAN, 3.0, 2.0, 4.0, f64::NAN]).unwrap();
        let marginal = marginalise_over_time(&coalescence);
        // cell 1 (ln(exp(4))=4) is the largest log-sum-exp, so it normalises to 1.
        assert!((marginal[1] - 1.0).abs() < 1e-9);
        assert!(marginal[0] < marginal[2]);
        assert!(marginal[2] < marginal[1]);
    }

    #[test]
    fn time_argmax_inside_marginal_window_passes() {
        let coalescence = Array2::from_shape_vec((3, 2), vec![0.1, 0.1, 5.0, 0.2, 0.1, 0.1]).unwrap();
        let origin = hifitime::Epoch::from_unix_seconds(0.0);
        let peak_time = hifitime::Epoch::from_unix_seconds(1.0);
        assert!(!time_argmax_outside_marginal(&coalescence, origin, 1.0, peak_time, 0.5));
    }

    #[test]
    fn time_argmax_far_from_peak_is_rejected() {
        let coalescence = Array2::from_shape_vec((3, 2), vec![5.0, 0.1, 0.1, 0.2, 0.1, 0.1]).unwrap();
        let origin = hifitime::Epoch::from_unix_seconds(0.0);
        let peak_time = hifitime::Epoch::from_unix_seconds(2.0);
        assert!(time_argmax_outside_marginal(&coalescence, origin, 1.0, peak_time, 0.5));
    }
}
