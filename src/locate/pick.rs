//! Refines a single phase arrival by fitting a Gaussian to the onset
//! function inside a window around the modelled travel time.
//!
//! Grounded on `examples/original_source/QMigrate/signal/scan.py`'s picking
//! routine: two candidate windows (a fraction of the travel time, and half
//! the P-S interval) are intersected and the narrower one used, an
//! adaptive percentile threshold isolates the peak, and a 1D Gaussian is
//! fit to what's above threshold.

use hifitime::{Duration, Epoch, Unit};

use crate::constants::{PICK_INSIDE_PERCENTILE, PICK_SENTINEL};
use crate::event::{Phase, Pick};
use crate::math::percentile;

use super::lm::{fit_gaussian, GaussianParams};

/// The two candidate pick windows around a modelled arrival; the narrower
/// one (by duration) is used, per the "intersection, narrower wins" rule.
#[derive(Clone, Copy, Debug)]
pub struct PickWindow {
    pub percent_tt_half_width_s: f64,
    pub sp_half_width_s: f64,
}

impl PickWindow {
    fn half_width_s(&self) -> f64 {
        self.percent_tt_half_width_s.min(self.sp_half_width_s)
    }
}

/// The `[lo_idx, hi_idx]` sample range a pick window covers, or `None` if it
/// falls outside the onset array or is degenerate.
fn window_sample_range(
    modelled_time: Epoch,
    window: PickWindow,
    onset_start: Epoch,
    sampling_rate: f64,
    onset_len: usize,
) -> Option<(usize, usize)> {
    let half_width = Duration::from_f64(window.half_width_s(), Unit::Second);
    let lo = modelled_time - half_width;
    let hi = modelled_time + half_width;

    let sample_at = |t: Epoch| -> f64 { (t - onset_start).to_seconds() * sampling_rate };
    let lo_idx = sample_at(lo).floor().max(0.0) as usize;
    let hi_idx = (sample_at(hi).ceil() as i64).clamp(0, onset_len as i64 - 1) as usize;

    if lo_idx >= hi_idx || hi_idx >= onset_len {
        None
    } else {
        Some((lo_idx, hi_idx))
    }
}

/// Picks one phase arrival from `onset`, a station's onset function
/// spanning `[onset_start, onset_start + onset.len() / sampling_rate)`.
///
/// The pick threshold is `max` of two percentiles (`SPEC_FULL.md` §4.8):
/// the `pick_threshold`-th percentile of the onset *outside* both this
/// phase's and `other_phase_window`'s pick windows, and the 88th percentile
/// *inside* this phase's window.
#[allow(clippy::too_many_arguments)]
pub fn pick_phase(
    station: &str,
    phase: Phase,
    onset: &[f64],
    onset_start: Epoch,
    sampling_rate: f64,
    modelled_time: Epoch,
    window: PickWindow,
    pick_threshold: f64,
    other_phase_window: Option<(Epoch, PickWindow)>,
) -> Pick {
    let Some((lo_idx, hi_idx)) = window_sample_range(modelled_time, window, onset_start, sampling_rate, onset.len())
    else {
        return Pick::unpicked(station, phase, modelled_time);
    };
    let window_values = &onset[lo_idx..=hi_idx];
    let threshold_window = percentile(window_values, PICK_INSIDE_PERCENTILE);

    let other_range = other_phase_window
        .and_then(|(t, w)| window_sample_range(t, w, onset_start, sampling_rate, onset.len()));
    let in_a_window = |i: usize| -> bool {
        (lo_idx..=hi_idx).contains(&i) || other_range.is_some_and(|(a, b)| (a..=b).contains(&i))
    };
    let outside_values: Vec<f64> = onset
        .iter()
        .enumerate()
        .filter(|&(i, _)| !in_a_window(i))
        .map(|(_, &v)| v)
        .collect();
    let threshold_outside = percentile(&outside_values, pick_threshold * 100.0);
    let threshold = threshold_outside.max(threshold_window);

    let xs: Vec<f64> = (lo_idx..=hi_idx)
        .filter(|&i| onset[i] >= threshold)
        .map(|i| i as f64 / sampling_rate)
        .collect();
    let ys: Vec<f64> = (lo_idx..=hi_idx)
        .filter(|&i| onset[i] >= threshold)
        .map(|i| onset[i])
        .collect();
    if xs.len() < 3 {
        return Pick::unpicked(station, phase, modelled_time);
    }

    let peak_idx = (lo_idx..=hi_idx)
        .max_by(|&a, &b| onset[a].partial_cmp(&onset[b]).unwrap())
        .unwrap();
    let initial = GaussianParams {
        amplitude: onset[peak_idx],
        mean: peak_idx as f64 / sampling_rate,
        sigma: (hi_idx - lo_idx) as f64 / sampling_rate / 4.0,
    };

    match fit_gaussian(&xs, &ys, initial) {
        Some(fit) if fit.amplitude > 0.0 && fit.sigma > 0.0 && fit.sigma.is_finite() => {
            let pick_time = onset_start + Duration::from_f64(fit.mean, Unit::Second);
            Pick {
                station: station.to_string(),
                phase,
                modelled_time,
                pick_time: Some(pick_time),
                pick_error: fit.sigma,
                pick_value: fit.amplitude,
            }
        }
        _ => Pick::unpicked(station, phase, modelled_time),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaussian_onset(n: usize, sampling_rate: f64, peak_sample: f64, sigma_samples: f64) -> Vec<f64> {
        (0..n)
            .map(|i| (-((i as f64 - peak_sample).powi(2)) / (2.0 * sigma_samples * sigma_samples)).exp())
            .collect()
    }

    #[test]
    fn picks_near_the_true_peak() {
        let sampling_rate = 100.0;
        let onset = gaussian_onset(1000, sampling_rate, 500.0, 5.0);
        let onset_start = Epoch::from_unix_seconds(0.0);
        let modelled_time = Epoch::from_unix_seconds(5.0);
        let window = PickWindow {
            percent_tt_half_width_s: 0.5,
            sp_half_width_s: 1.0,
        };
        let pick = pick_phase(
            "AA01", Phase::P, &onset, onset_start, sampling_rate, modelled_time, window, 0.95, None,
        );
        assert!(pick.is_picked());
        let picked_seconds = (pick.pick_time.unwrap() - onset_start).to_seconds();
        assert!((picked_seconds - 5.0).abs() < 0.2);
    }

    #[test]
    fn out_of_range_window_is_unpicked() {
        let sampling_rate = 100.0;
        let onset = gaussian_onset(100, sampling_rate, 50.0, 5.0);
        let onset_start = Epoch::from_unix_seconds(0.0);
        let modelled_time = Epoch::from_unix_seconds(500.0);
        let window = PickWindow {
            percent_tt_half_width_s: 0.1,
            sp_half_width_s: 0.1,
        };
        let pick = pick_phase(
            "AA01", Phase::P, &onset, onset_start, sampling_rate, modelled_time, window, 0.95, None,
        );
        assert!(!pick.is_picked());
        assert_eq!(pick.pick_error, PICK_SENTINEL);
    }

    #[test]
    fn still_picks_near_the_true_peak_with_a_masked_other_phase_window() {
        let sampling_rate = 100.0;
        let onset = gaussian_onset(1000, sampling_rate, 500.0, 5.0);
        let onset_start = Epoch::from_unix_seconds(0.0);
        let modelled_time = Epoch::from_unix_seconds(5.0);
        let window = PickWindow {
            percent_tt_half_width_s: 0.5,
            sp_half_width_s: 1.0,
        };
        // The other phase's window sits right next to this one; masking it
        // out of the "outside" percentile shouldn't stop this pick from
        // succeeding.
        let other_modelled_time = Epoch::from_unix_seconds(7.0);
        let pick = pick_phase(
            "AA01",
            Phase::P,
            &onset,
            onset_start,
            sampling_rate,
            modelled_time,
            window,
            0.95,
            Some((other_modelled_time, window)),
        );
        assert!(pick.is_picked());
        let picked_seconds = (pick.pick_time.unwrap() - onset_start).to_seconds();
        assert!((picked_seconds - 5.0).abs() < 0.2);
    }
}
