//! Cubic-RBF spline refinement of the gridded coalescence peak.
//!
//! Grounded on `examples/original_source/QMigrate/signal/scan.py`'s
//! `_splineloc`: a cubic radial basis function is fit to the coalescence
//! values in a window around the gridded peak, evaluated on an upscaled
//! grid, and the upscaled peak is kept only if it falls inside both the
//! peak's own cell and the fit window; otherwise the gridded location is
//! returned unchanged.

use nalgebra::{DMatrix, DVector};

use crate::geo::Grid3D;

use super::LocateError;

#[derive(Clone, Copy, Debug)]
pub struct SplineFit {
    pub xyz: (f64, f64, f64),
}

/// Refines the peak of `marginal` (one value per grid cell, in the grid's
/// flat-index order) with a cubic RBF spline over a `(2*half_window+1)^3`
/// window, sampled at `upscale` points per original grid spacing.
pub fn spline_fit(marginal: &[f64], grid: &Grid3D, half_window: i64, upscale: usize) -> Result<SplineFit, LocateError> {
    let (nx, ny, nz) = grid.cell_count();
    let peak_index = marginal
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .map(|(i, _)| i)
        .ok_or(LocateError::EmptyWindow)?;
    let peak_ijk = grid.index_to_ijk(peak_index).map_err(|e| LocateError::Fit(e.to_string()))?;
    let gridded_xyz = grid.loc_to_global_xyz((peak_ijk.0 as f64, peak_ijk.1 as f64, peak_ijk.2 as f64));

    let lo = (
        (peak_ijk.0 - half_window).max(0),
        (peak_ijk.1 - half_window).max(0),
        (peak_ijk.2 - half_window).max(0),
    );
    let hi = (
        (peak_ijk.0 + half_window + 1).min(nx),
        (peak_ijk.1 + half_window + 1).min(ny),
        (peak_ijk.2 + half_window + 1).min(nz),
    );
    let span = (hi.0 - lo.0, hi.1 - lo.1, hi.2 - lo.2);
    if span.0 != span.1 || span.1 != span.2 {
        log::warn!("spline fit window crosses the edge of the grid; using the gridded location");
        return Ok(SplineFit { xyz: gridded_xyz });
    }

    let mut nodes = Vec::new();
    let mut values = Vec::new();
    for i in lo.0..hi.0 {
        for j in lo.1..hi.1 {
            for k in lo.2..hi.2 {
                let index = grid.ijk_to_index((i, j, k));
                let value = marginal[index];
                if !value.is_finite() {
                    continue;
                }
                nodes.push(((i - lo.0) as f64, (j - lo.1) as f64, (k - lo.2) as f64));
                values.push(value);
            }
        }
    }
    let n = nodes.len();
    if n < 10 {
        return Err(LocateError::Fit("too few finite cells for a spline fit".into()));
    }

    let mut a = DMatrix::<f64>::zeros(n, n);
    for row in 0..n {
        for col in 0..n {
            a[(row, col)] = cubic_radial(nodes[row], nodes[col]);
        }
    }
    let b = DVector::from_vec(values);
    let weights = a
        .lu()
        .solve(&b)
        .ok_or(LocateError::SingularCovariance)?;

    let eval = |p: (f64, f64, f64)| -> f64 {
        nodes.iter().zip(weights.iter()).map(|(&node, &w)| w * cubic_radial(p, node)).sum()
    };

    let steps_per_axis = |span: i64| (span - 1).max(1) as usize * upscale + 1;
    let (sx, sy, sz) = (steps_per_axis(span.0), steps_per_axis(span.1), steps_per_axis(span.2));
    let step = 1.0 / upscale as f64;

    let mut best = (f64::NEG_INFINITY, (0.0, 0.0, 0.0));
    for xi in 0..sx {
        let x = xi as f64 * step;
        for yi in 0..sy {
            let y = yi as f64 * step;
            for zi in 0..sz {
                let z = zi as f64 * step;
                let value = eval((x, y, z));
                if value > best.0 {
                    best = (value, (x, y, z));
                }
            }
        }
    }

    let fitted_local = best.1;
    let fitted_ijk = (
        fitted_local.0 + lo.0 as f64,
        fitted_local.1 + lo.1 as f64,
        fitted_local.2 + lo.2 as f64,
    );

    let outside_own_cell = (fitted_ijk.0 - peak_ijk.0 as f64).abs() > 1.0
        || (fitted_ijk.1 - peak_ijk.1 as f64).abs() > 1.0
        || (fitted_ijk.2 - peak_ijk.2 as f64).abs() > 1.0;
    if outside_own_cell {
        log::warn!("spline location fell outside the gridded peak's own cell");
    }

    let outside_window = (fitted_ijk.0 - peak_ijk.0 as f64).abs() > half_window as f64
        || (fitted_ijk.1 - peak_ijk.1 as f64).abs() > half_window as f64
        || (fitted_ijk.2 - peak_ijk.2 as f64).abs() > half_window as f64;
    if outside_window {
        log::warn!("spline location fell outside the fit window; using the gridded location");
        return Ok(SplineFit { xyz: gridded_xyz });
    }

    Ok(SplineFit { xyz: grid.loc_to_global_xyz(fitted_ijk) })
}

fn cubic_radial(a: (f64, f64, f64), b: (f64, f64, f64)) -> f64 {
    let d = ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2) + (a.2 - b.2).powi(2)).sqrt();
    d.powi(3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{GridSpec, Projection, SortOrder};

    fn tiny_grid() -> Grid3D {
        GridSpec {
            cell_count: (9, 9, 9),
            cell_size: (10.0, 10.0, 10.0),
            azimuth: 0.0,
            dip: 0.0,
            sort_order: SortOrder::RowMajor,
            elevation: 0.0,
            projection: Projection::Wgs84,
            longitude: 0.0,
            latitude: 0.0,
        }
        .try_build()
        .unwrap()
    }

    fn synthetic_gaussian_map(grid: &Grid3D, centre: (i64, i64, i64), sigma: f64) -> Vec<f64> {
        let mut out = vec![0.0; grid.n_cells()];
        for index in 0..grid.n_cells() {
            let ijk = grid.index_to_ijk(index).unwrap();
            let d2 = ((ijk.0 - centre.0).pow(2) + (ijk.1 - centre.1).pow(2) + (ijk.2 - centre.2).pow(2)) as f64;
            out[index] = (-d2 / (2.0 * sigma * sigma)).exp();
        }
        out
    }

    #[test]
    fn refines_towards_a_synthetic_peak() {
        let grid = tiny_grid();
        let marginal = synthetic_gaussian_map(&grid, (4, 4, 4), 2.0);
        let fit = spline_fit(&marginal, &grid, 3, 4).unwrap();
        let gridded = grid.loc_to_global_xyz((4.0, 4.0, 4.0));
        assert!((fit.xyz.0 - gridded.0).abs() < 20.0);
    }

    #[test]
    fn empty_map_is_rejected() {
        let grid = tiny_grid();
        let marginal = vec![f64::NAN; grid.n_cells()];
        assert!(spline_fit(&marginal, &grid, 3, 4).is_err());
    }
}
