//! A hand-written first-order fast marching method (FMM) eikonal solver.
//!
//! No crate in the retrieval pack solves this (the only "fmm" hit elsewhere
//! is an unrelated fast multipole boundary-element method); this follows
//! `SPEC_FULL.md` §4.4's instruction to hand-write the numerically sensitive
//! kernel.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ndarray::Array3;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FmmError {
    #[error("velocity field contains a non-positive value")]
    NonPositiveVelocity,

    #[error("source index {0:?} is outside the domain")]
    SourceOutsideDomain((i64, i64, i64)),

    #[error("fast marching did not reach every reachable node (velocity field may be disconnected)")]
    DidNotConverge,
}

#[derive(Clone, Copy, PartialEq)]
struct HeapEntry {
    time: f64,
    index: usize,
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse, for a min-heap on `time`.
        other.time.partial_cmp(&self.time).unwrap_or(Ordering::Equal)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Far,
    Narrow,
    Accepted,
}

/// Solves the eikonal equation `|grad T| = 1 / V` on a regular grid of
/// isotropic spacing `dx`, with `T = 0` at `source` and first-arrival times
/// elsewhere, via first-order upwind fast marching.
pub fn fast_marching(
    velocity: &Array3<f64>,
    source: (i64, i64, i64),
    dx: f64,
) -> Result<Array3<f64>, FmmError> {
    let shape = velocity.raw_dim();
    let (nx, ny, nz) = (shape[0], shape[1], shape[2]);

    if velocity.iter().any(|&v| v <= 0.0) {
        return Err(FmmError::NonPositiveVelocity);
    }
    let in_bounds = |i: i64, j: i64, k: i64| {
        i >= 0 && j >= 0 && k >= 0 && (i as usize) < nx && (j as usize) < ny && (k as usize) < nz
    };
    if !in_bounds(source.0, source.1, source.2) {
        return Err(FmmError::SourceOutsideDomain(source));
    }

    let n = nx * ny * nz;
    let idx = |i: usize, j: usize, k: usize| i * ny * nz + j * nz + k;

    let mut time = vec![f64::INFINITY; n];
    let mut state = vec![State::Far; n];
    let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();

    let source_idx = idx(source.0 as usize, source.1 as usize, source.2 as usize);
    time[source_idx] = 0.0;
    state[source_idx] = State::Narrow;
    heap.push(HeapEntry { time: 0.0, index: source_idx });

    let neighbours = |i: usize, j: usize, k: usize| -> [Option<(usize, usize, usize)>; 6] {
        let signed = (i as i64, j as i64, k as i64);
        let mut out = [None; 6];
        let deltas: [(i64, i64, i64); 6] = [
            (-1, 0, 0),
            (1, 0, 0),
            (0, -1, 0),
            (0, 1, 0),
            (0, 0, -1),
            (0, 0, 1),
        ];
        for (slot, d) in out.iter_mut().zip(deltas.iter()) {
            let (ni, nj, nk) = (signed.0 + d.0, signed.1 + d.1, signed.2 + d.2);
            if in_bounds(ni, nj, nk) {
                *slot = Some((ni as usize, nj as usize, nk as usize));
            }
        }
        out
    };

    // First-order upwind update at (i, j, k): solve the quadratic for T
    // using the minimum accepted neighbour along each axis.
    let solve_node = |i: usize, j: usize, k: usize, time: &[f64]| -> f64 {
        let v = velocity[[i, j, k]];
        let mut axis_mins = Vec::with_capacity(3);
        for (a, b) in [((i, j, k), 0usize), ((i, j, k), 1), ((i, j, k), 2)] {
            let (i, j, k) = a;
            let axis = b;
            let (lo, hi) = match axis {
                0 => (
                    (i > 0).then(|| time[idx(i - 1, j, k)]),
                    (i + 1 < nx).then(|| time[idx(i + 1, j, k)]),
                ),
                1 => (
                    (j > 0).then(|| time[idx(i, j - 1, k)]),
                    (j + 1 < ny).then(|| time[idx(i, j + 1, k)]),
                ),
                _ => (
                    (k > 0).then(|| time[idx(i, j, k - 1)]),
                    (k + 1 < nz).then(|| time[idx(i, j, k + 1)]),
                ),
            };
            let m = match (lo, hi) {
                (Some(a), Some(b)) => a.min(b),
                (Some(a), None) => a,
                (None, Some(b)) => b,
                (None, None) => f64::INFINITY,
            };
            if m.is_finite() {
                axis_mins.push(m);
            }
        }
        axis_mins.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let rhs = 1.0 / v;
        // Try using 1, then 2, then 3 axes; fall back if the quadratic has
        // no solution >= the largest contributing neighbour (the standard
        // FMM causality check).
        for n_axes in (1..=axis_mins.len()).rev() {
            let used = &axis_mins[..n_axes];
            let sum_t: f64 = used.iter().sum();
            let sum_t2: f64 = used.iter().map(|t| t * t).sum();
            let a = n_axes as f64;
            let b = -2.0 * sum_t;
            let c = sum_t2 - (rhs * dx).powi(2);
            let disc = b * b - 4.0 * a * c;
            if disc < 0.0 {
                continue;
            }
            let t = (-b + disc.sqrt()) / (2.0 * a);
            if t >= *used.last().unwrap() {
                return t;
            }
        }
        // Degenerate fallback: single-axis update with the closest neighbour.
        axis_mins.first().copied().unwrap_or(0.0) + rhs * dx
    };

    while let Some(HeapEntry { index, .. }) = heap.pop() {
        if state[index] == State::Accepted {
            continue;
        }
        state[index] = State::Accepted;
        let i = index / (ny * nz);
        let rem = index % (ny * nz);
        let j = rem / nz;
        let k = rem % nz;

        for neighbour in neighbours(i, j, k).into_iter().flatten() {
            let (ni, nj, nk) = neighbour;
            let nidx = idx(ni, nj, nk);
            if state[nidx] == State::Accepted {
                continue;
            }
            let candidate = solve_node(ni, nj, nk, &time);
            if candidate < time[nidx] {
                time[nidx] = candidate;
                state[nidx] = State::Narrow;
                heap.push(HeapEntry { time: candidate, index: nidx });
            }
        }
    }

    if state.iter().any(|s| *s == State::Far) {
        return Err(FmmError::DidNotConverge);
    }

    let mut out = Array3::<f64>::zeros((nx, ny, nz));
    for i in 0..nx {
        for j in 0..ny {
            for k in 0..nz {
                out[[i, j, k]] = time[idx(i, j, k)];
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn homogeneous_velocity_gives_radial_travel_time() {
        let n = 21;
        let dx = 10.0;
        let v = 1000.0;
        let velocity = Array3::<f64>::from_elem((n, n, n), v);
        let source = ((n / 2) as i64, (n / 2) as i64, (n / 2) as i64);
        let t = fast_marching(&velocity, source, dx).unwrap();

        let (sx, sy, sz) = (source.0 as f64, source.1 as f64, source.2 as f64);
        for i in [2usize, n - 3] {
            for j in [2usize, n - 3] {
                for k in [2usize, n - 3] {
                    let r = (((i as f64 - sx) * dx).powi(2)
                        + ((j as f64 - sy) * dx).powi(2)
                        + ((k as f64 - sz) * dx).powi(2))
                    .sqrt();
                    let expected = r / v;
                    assert_relative_eq!(t[[i, j, k]], expected, max_relative = 0.1);
                }
            }
        }
    }

    #[test]
    fn source_outside_domain_is_an_error() {
        let velocity = Array3::<f64>::from_elem((5, 5, 5), 1000.0);
        assert!(fast_marching(&velocity, (10, 10, 10), 1.0).is_err());
    }

    #[test]
    fn non_positive_velocity_is_an_error() {
        let mut velocity = Array3::<f64>::from_elem((5, 5, 5), 1000.0);
        velocity[[2, 2, 2]] = 0.0;
        assert!(fast_marching(&velocity, (0, 0, 0), 1.0).is_err());
    }
}
