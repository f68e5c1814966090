//! A hand-written 3-parameter Levenberg-Marquardt solver for a 1D Gaussian
//! fit, used by [`super::pick`] to refine a phase arrival.
//!
//! Simpler than `examples/other_examples/...autd3-gain-holo-src-nls-lm.rs.rs`'s
//! generic `LM` solver (that one's `LinAlgBackend` abstraction targets large
//! GPU/CPU systems this crate doesn't have); this is sized to the one
//! 3-parameter problem it's used for.

use crate::constants::lm_defaults;

/// `f(x) = amplitude * exp(-(x - mean)^2 / (2 * sigma^2))`.
#[derive(Clone, Copy, Debug)]
pub struct GaussianParams {
    pub amplitude: f64,
    pub mean: f64,
    pub sigma: f64,
}

impl GaussianParams {
    fn eval(&self, x: f64) -> f64 {
        self.amplitude * (-(x - self.mean).powi(2) / (2.0 * self.sigma * self.sigma)).exp()
    }

    /// Partial derivatives w.r.t. (amplitude, mean, sigma) at `x`.
    fn jacobian_row(&self, x: f64) -> [f64; 3] {
        let d = x - self.mean;
        let s2 = self.sigma * self.sigma;
        let f = self.eval(x);
        [f / self.amplitude.max(1e-300), f * d / s2, f * d * d / (s2 * self.sigma)]
    }
}

/// Fits a 1D Gaussian to `(x, y)` samples by damped least squares, starting
/// from `initial`. Returns the fitted parameters, or `None` if the
/// iteration fails to reduce the residual within `lm_defaults::MAX_ITERS`.
pub fn fit_gaussian(xs: &[f64], ys: &[f64], initial: GaussianParams) -> Option<GaussianParams> {
    if xs.len() != ys.len() || xs.len() < 3 {
        return None;
    }
    let mut params = initial;
    let mut lambda = lm_defaults::INITIAL_LAMBDA;

    let residual_sum_sq = |p: &GaussianParams| -> f64 {
        xs.iter().zip(ys.iter()).map(|(&x, &y)| (y - p.eval(x)).powi(2)).sum()
    };
    let mut current_cost = residual_sum_sq(&params);

    for _ in 0..lm_defaults::MAX_ITERS {
        // Normal equations J^T J delta = J^T r, solved directly for this
        // fixed 3x3 system (no general linear-algebra crate needed here).
        let mut jtj = [[0.0_f64; 3]; 3];
        let mut jtr = [0.0_f64; 3];
        for (&x, &y) in xs.iter().zip(ys.iter()) {
            let j = params.jacobian_row(x);
            let r = y - params.eval(x);
            for a in 0..3 {
                jtr[a] += j[a] * r;
                for b in 0..3 {
                    jtj[a][b] += j[a] * j[b];
                }
            }
        }
        for a in 0..3 {
            jtj[a][a] *= 1.0 + lambda;
        }

        let delta = match solve_3x3(jtj, jtr) {
            Some(d) => d,
            None => return if current_cost.is_finite() { Some(params) } else { None },
        };

        let candidate = GaussianParams {
            amplitude: params.amplitude + delta[0],
            mean: params.mean + delta[1],
            sigma: (params.sigma + delta[2]).abs().max(1e-6),
        };
        let candidate_cost = residual_sum_sq(&candidate);

        if candidate_cost < current_cost {
            let improvement = current_cost - candidate_cost;
            params = candidate;
            current_cost = candidate_cost;
            lambda *= lm_defaults::LAMBDA_DOWN;
            if improvement < lm_defaults::CONVERGENCE_TOL {
                break;
            }
        } else {
            lambda *= lm_defaults::LAMBDA_UP;
        }
    }

    Some(params)
}

fn solve_3x3(a: [[f64; 3]; 3], b: [f64; 3]) -> Option<[f64; 3]> {
    let det = a[0][0] * (a[1][1] * a[2][2] - a[1][2] * a[2][1])
        - a[0][1] * (a[1][0] * a[2][2] - a[1][2] * a[2][0])
        + a[0][2] * (a[1][0] * a[2][1] - a[1][1] * a[2][0]);
    if det.abs() < 1e-300 {
        return None;
    }
    let cramer = |col: usize| -> f64 {
        let mut m = a;
        for row in 0..3 {
            m[row][col] = b[row];
        }
        (m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]))
            / det
    };
    Some([cramer(0), cramer(1), cramer(2)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn recovers_a_clean_gaussian() {
        let truth = GaussianParams { amplitude: 3.0, mean: 5.0, sigma: 1.2 };
        let xs: Vec<f64> = (0..40).map(|i| i as f64 * 0.25).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| truth.eval(x)).collect();
        let initial = GaussianParams { amplitude: 2.0, mean: 4.0, sigma: 1.0 };
        let fit = fit_gaussian(&xs, &ys, initial).unwrap();
        assert_relative_eq!(fit.amplitude, truth.amplitude, epsilon = 0.05);
        assert_relative_eq!(fit.mean, truth.mean, epsilon = 0.05);
        assert_relative_eq!(fit.sigma, truth.sigma, epsilon = 0.05);
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let initial = GaussianParams { amplitude: 1.0, mean: 0.0, sigma: 1.0 };
        assert!(fit_gaussian(&[1.0, 2.0], &[1.0], initial).is_none());
    }
}
