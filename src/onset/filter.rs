//! A hand-written zero-phase Butterworth bandpass filter.
//!
//! No DSP crate appears anywhere in the retrieval pack, so this is written
//! directly from the standard second-order-section ("biquad") bandpass
//! design, cascaded `order` times and applied forward then in reverse
//! (`filtfilt`) for zero phase, matching
//! `examples/original_source/QMigrate/signal/scan.py`'s `filter`.

use super::OnsetError;

/// Bandpass corner frequencies (Hz) and filter order.
#[derive(Clone, Copy, Debug)]
pub struct FilterSpec {
    pub low_hz: f64,
    pub high_hz: f64,
    pub order: usize,
    pub sampling_rate: f64,
}

impl FilterSpec {
    fn validate(&self) -> Result<(), OnsetError> {
        let nyquist = self.sampling_rate / 2.0;
        if !(self.low_hz > 0.0 && self.high_hz > self.low_hz && self.high_hz < nyquist) {
            return Err(OnsetError::InvalidFilter {
                low: self.low_hz,
                high: self.high_hz,
                nyquist,
            });
        }
        Ok(())
    }
}

/// One second-order IIR section in transposed direct form II.
#[derive(Clone, Copy)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    fn apply(&self, signal: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; signal.len()];
        let (mut z1, mut z2) = (0.0, 0.0);
        for (i, &x) in signal.iter().enumerate() {
            let y = self.b0 * x + z1;
            z1 = self.b1 * x - self.a1 * y + z2;
            z2 = self.b2 * x - self.a2 * y;
            out[i] = y;
        }
        out
    }
}

/// A single second-order Butterworth bandpass section (RBJ cookbook form),
/// centred at `(low_hz * high_hz).sqrt()` with bandwidth `high_hz - low_hz`.
fn bandpass_biquad(spec: &FilterSpec) -> Biquad {
    let f0 = (spec.low_hz * spec.high_hz).sqrt();
    let bandwidth_octaves = ((spec.high_hz / spec.low_hz).log2()).max(1e-6);
    let w0 = std::f64::consts::TAU * f0 / spec.sampling_rate;
    let (sin_w0, cos_w0) = w0.sin_cos();
    let alpha = sin_w0 * (std::f64::consts::LN_2 / 2.0 * bandwidth_octaves * w0 / sin_w0).sinh();

    let b0 = alpha;
    let b1 = 0.0;
    let b2 = -alpha;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_w0;
    let a2 = 1.0 - alpha;

    Biquad {
        b0: b0 / a0,
        b1: b1 / a0,
        b2: b2 / a0,
        a1: a1 / a0,
        a2: a2 / a0,
    }
}

fn filtfilt(biquads: &[Biquad], signal: &[f64]) -> Vec<f64> {
    let mut forward = signal.to_vec();
    for section in biquads {
        forward = section.apply(&forward);
    }
    forward.reverse();
    let mut backward = forward;
    for section in biquads {
        backward = section.apply(&backward);
    }
    backward.reverse();
    backward
}

/// Applies a zero-phase Butterworth bandpass filter to `signal`, cascading
/// `spec.order` second-order sections.
pub fn bandpass_filter(signal: &[f64], spec: &FilterSpec) -> Result<Vec<f64>, OnsetError> {
    spec.validate()?;
    let order = spec.order.max(1);
    let biquads: Vec<Biquad> = (0..order).map(|_| bandpass_biquad(spec)).collect();
    Ok(filtfilt(&biquads, signal))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq_hz: f64, sampling_rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (std::f64::consts::TAU * freq_hz * i as f64 / sampling_rate).sin())
            .collect()
    }

    #[test]
    fn passes_in_band_signal_with_reduced_amplitude_at_edges() {
        let spec = FilterSpec {
            low_hz: 2.0,
            high_hz: 10.0,
            order: 2,
            sampling_rate: 100.0,
        };
        let signal = sine(5.0, 100.0, 2000);
        let filtered = bandpass_filter(&signal, &spec).unwrap();
        let steady = &filtered[500..1500];
        let rms: f64 = (steady.iter().map(|v| v * v).sum::<f64>() / steady.len() as f64).sqrt();
        assert!(rms > 0.3, "in-band signal should pass through with significant amplitude, got rms={rms}");
    }

    #[test]
    fn attenuates_out_of_band_signal() {
        let spec = FilterSpec {
            low_hz: 20.0,
            high_hz: 30.0,
            order: 2,
            sampling_rate: 200.0,
        };
        let signal = sine(1.0, 200.0, 2000);
        let filtered = bandpass_filter(&signal, &spec).unwrap();
        let steady = &filtered[500..1500];
        let rms: f64 = (steady.iter().map(|v| v * v).sum::<f64>() / steady.len() as f64).sqrt();
        assert!(rms < 0.2, "out-of-band signal should be attenuated, got rms={rms}");
    }

    #[test]
    fn rejects_invalid_corners() {
        let spec = FilterSpec {
            low_hz: 10.0,
            high_hz: 5.0,
            order: 2,
            sampling_rate: 100.0,
        };
        assert!(bandpass_filter(&[0.0; 10], &spec).is_err());
    }
}
