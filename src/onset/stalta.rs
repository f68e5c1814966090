//! STA/LTA onset functions and the log-clipped onset transform.
//!
//! Grounded on `examples/original_source/QMigrate/signal/scan.py`'s
//! `classic_sta_lta` (classic, causal moving-average ratio, imported from
//! `obspy` upstream but reimplemented here) and `sta_lta_centred` (the
//! "centred" variant used for its symmetric-window onset function).

use crate::constants::{LTA_FLOOR, ONSET_CLIP_FLOOR};
use crate::math::clip_lower;

use super::OnsetError;

/// STA/LTA window lengths, in samples.
#[derive(Clone, Copy, Debug)]
pub struct StaLtaWindow {
    pub sta_samples: usize,
    pub lta_samples: usize,
}

impl StaLtaWindow {
    fn validate(&self, signal_len: usize) -> Result<(), OnsetError> {
        if self.sta_samples == 0 || self.lta_samples == 0 || self.lta_samples <= self.sta_samples
            || self.lta_samples >= signal_len
        {
            return Err(OnsetError::InvalidWindow {
                sta_samples: self.sta_samples,
                lta_samples: self.lta_samples,
                signal_len,
            });
        }
        Ok(())
    }
}

fn moving_average(squared: &[f64], window: usize) -> Vec<f64> {
    let n = squared.len();
    let mut out = vec![0.0; n];
    let mut sum = 0.0;
    for i in 0..n {
        sum += squared[i];
        if i >= window {
            sum -= squared[i - window];
        }
        let count = (i + 1).min(window) as f64;
        out[i] = sum / count;
    }
    out
}

/// The classic, causal STA/LTA ratio: both averages trail the current
/// sample.
pub fn classic_sta_lta(signal: &[f64], window: StaLtaWindow) -> Result<Vec<f64>, OnsetError> {
    window.validate(signal.len())?;
    let squared: Vec<f64> = signal.iter().map(|v| v * v).collect();
    let sta = moving_average(&squared, window.sta_samples);
    let lta = moving_average(&squared, window.lta_samples);
    Ok(sta
        .iter()
        .zip(lta.iter())
        .map(|(&s, &l)| s / clip_lower(l, LTA_FLOOR))
        .collect())
}

fn cumulative_sum_of_squares(signal: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; signal.len()];
    let mut running = 0.0;
    for (i, &v) in signal.iter().enumerate() {
        running += v * v;
        out[i] = running;
    }
    out
}

/// The centred STA/LTA variant: the short-term window is shifted fully
/// ahead of the current sample, `sta[n] = (Σ[n..n+nsta] − Σ[n..n]) / nsta`,
/// while the long-term window trails it as an ordinary moving average; the
/// first `nlta - 1` samples (where the LTA isn't yet fully populated) and
/// the last `nsta` samples (where the shifted STA runs past the end of the
/// signal) are zeroed. Grounded on
/// `examples/original_source/QMigrate/signal/scan.py`'s `sta_lta_centred`.
pub fn centred_sta_lta(signal: &[f64], window: StaLtaWindow) -> Result<Vec<f64>, OnsetError> {
    window.validate(signal.len())?;
    let n = signal.len();
    let nsta = window.sta_samples;
    let nlta = window.lta_samples;
    let csum = cumulative_sum_of_squares(signal);

    let mut sta = vec![0.0; n];
    for (i, value) in sta.iter_mut().enumerate() {
        if i + nsta >= n {
            continue;
        }
        *value = (csum[i + nsta] - csum[i]) / nsta as f64;
    }

    let mut lta = vec![0.0; n];
    for (i, value) in lta.iter_mut().enumerate() {
        let lo = if i >= nlta { csum[i - nlta] } else { 0.0 };
        *value = (csum[i] - lo) / nlta as f64;
    }

    for value in sta.iter_mut().take((nlta - 1).min(n)) {
        *value = 0.0;
    }
    for value in sta.iter_mut().rev().take(nsta.min(n)) {
        *value = 0.0;
    }

    Ok(sta
        .iter()
        .zip(lta.iter())
        .map(|(&s, &l)| s / clip_lower(l, LTA_FLOOR))
        .collect())
}

/// The onset transform applied to a raw STA/LTA ratio: `ln(clip(1 + x,
/// floor, inf))`.
pub fn onset_transform(sta_lta: &[f64]) -> Vec<f64> {
    sta_lta
        .iter()
        .map(|&x| clip_lower(1.0 + x, ONSET_CLIP_FLOOR).ln())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn step_signal(n: usize, onset: usize) -> Vec<f64> {
        (0..n).map(|i| if i < onset { 0.01 } else { 1.0 }).collect()
    }

    #[test]
    fn classic_sta_lta_spikes_after_onset() {
        let signal = step_signal(500, 250);
        let window = StaLtaWindow { sta_samples: 5, lta_samples: 50 };
        let ratio = classic_sta_lta(&signal, window).unwrap();
        assert!(ratio[300] > ratio[100]);
    }

    #[test]
    fn centred_sta_lta_zeroes_its_head_and_tail() {
        let signal = step_signal(500, 250);
        let window = StaLtaWindow { sta_samples: 20, lta_samples: 100 };
        let ratio = centred_sta_lta(&signal, window).unwrap();
        assert!(ratio[..99].iter().all(|&v| v == 0.0));
        assert!(ratio[480..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn centred_sta_lta_reacts_earlier_than_classic() {
        let signal = step_signal(500, 250);
        let window = StaLtaWindow { sta_samples: 20, lta_samples: 100 };
        let classic = classic_sta_lta(&signal, window).unwrap();
        let centred = centred_sta_lta(&signal, window).unwrap();
        assert!(centred[245] >= classic[245]);
    }

    #[test]
    fn onset_transform_is_monotonic_in_the_ratio() {
        let ratios = vec![0.0, 1.0, 5.0, 20.0];
        let transformed = onset_transform(&ratios);
        for w in transformed.windows(2) {
            assert!(w[1] >= w[0]);
        }
    }

    #[test]
    fn invalid_window_is_rejected() {
        let signal = vec![0.0; 10];
        let window = StaLtaWindow { sta_samples: 5, lta_samples: 3 };
        assert!(classic_sta_lta(&signal, window).is_err());
    }

    #[test]
    fn onset_floor_prevents_negative_log() {
        let transformed = onset_transform(&[-0.99]);
        assert_abs_diff_eq!(transformed[0], ONSET_CLIP_FLOOR.ln(), epsilon = 1e-9);
    }
}
