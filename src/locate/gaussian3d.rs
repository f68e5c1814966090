//! Local 3D Gaussian location: the marginal coalescence map is first passed
//! through a 3D Gaussian smoother, then a quadratic is fit to its log in a
//! window around the peak.
//!
//! Grounded on `examples/original_source/QMigrate/signal/scan.py`'s
//! `_gaufilt3d` (the smoother: convolution with a 3D Gaussian, mirrored and
//! reconvolved once to cancel the even-length phase shift, each pass
//! renormalised to unity max) and `_gaufit3d`: a 10-parameter quadratic
//! (`x^2, y^2, z^2, xy, xz, yz, x, y, z, 1`) is least-squares fit to
//! `-ln(coalescence)` over a window of grid cells around the peak, the
//! fit's stationary point gives the location, and the Hessian's
//! eigenvalues give the one-sigma uncertainties.

use nalgebra::{DMatrix, DVector, Matrix3, SymmetricEigen, Vector3};

use crate::constants::GAUSSIAN_SMOOTH_SIGMA_CELLS;
use crate::geo::Grid3D;

use super::LocateError;

#[derive(Clone, Copy, Debug)]
pub struct Gaussian3dFit {
    pub xyz: (f64, f64, f64),
    pub error_xyz: (f64, f64, f64),
}

fn gaussian_kernel_1d(sigma: f64) -> Vec<f64> {
    let radius = (6.0 * sigma).ceil() as i64;
    (-radius..=radius).map(|x| (-((x * x) as f64) / (2.0 * sigma * sigma)).exp()).collect()
}

/// Convolves `values` along one grid axis (`0` = x, `1` = y, `2` = z) with
/// a symmetric 1D kernel, treating cells outside the grid as zero.
fn convolve_axis(values: &[f64], grid: &Grid3D, axis: usize, kernel: &[f64]) -> Vec<f64> {
    let (nx, ny, nz) = grid.cell_count();
    let radius = (kernel.len() / 2) as i64;
    let mut out = vec![0.0; values.len()];
    for i in 0..nx {
        for j in 0..ny {
            for k in 0..nz {
                let mut acc = 0.0;
                for (t, &w) in kernel.iter().enumerate() {
                    let offset = t as i64 - radius;
                    let (ii, jj, kk) = match axis {
                        0 => (i + offset, j, k),
                        1 => (i, j + offset, k),
                        _ => (i, j, k + offset),
                    };
                    if (0..nx).contains(&ii) && (0..ny).contains(&jj) && (0..nz).contains(&kk) {
                        acc += w * values[grid.ijk_to_index((ii, jj, kk))];
                    }
                }
                out[grid.ijk_to_index((i, j, k))] = acc;
            }
        }
    }
    out
}

/// Reverses all three axes: `out[nx-1-i, ny-1-j, nz-1-k] = values[i, j, k]`.
fn mirror_3d(values: &[f64], grid: &Grid3D) -> Vec<f64> {
    let (nx, ny, nz) = grid.cell_count();
    let mut out = vec![0.0; values.len()];
    for (index, &value) in values.iter().enumerate() {
        let (i, j, k) = grid.index_to_ijk(index).expect("index within bounds");
        let mirrored = grid.ijk_to_index((nx - 1 - i, ny - 1 - j, nz - 1 - k));
        out[mirrored] = value;
    }
    out
}

fn renormalise_to_unit_max(values: &mut [f64]) {
    let max = values.iter().cloned().filter(|v| v.is_finite()).fold(f64::NEG_INFINITY, f64::max);
    if max.is_finite() && max != 0.0 {
        for v in values.iter_mut() {
            *v /= max;
        }
    }
}

fn gaussian_smooth_3d(marginal: &[f64], grid: &Grid3D) -> Vec<f64> {
    let kernel = gaussian_kernel_1d(GAUSSIAN_SMOOTH_SIGMA_CELLS);
    let nan_mask: Vec<bool> = marginal.iter().map(|v| !v.is_finite()).collect();
    let mut values: Vec<f64> = marginal.iter().map(|&v| if v.is_finite() { v } else { 0.0 }).collect();

    renormalise_to_unit_max(&mut values);
    for axis in 0..3 {
        values = convolve_axis(&values, grid, axis, &kernel);
    }
    values = mirror_3d(&values, grid);
    renormalise_to_unit_max(&mut values);
    for axis in 0..3 {
        values = convolve_axis(&values, grid, axis, &kernel);
    }
    values = mirror_3d(&values, grid);
    renormalise_to_unit_max(&mut values);

    for (value, &was_nan) in values.iter_mut().zip(nan_mask.iter()) {
        if was_nan {
            *value = f64::NAN;
        }
    }
    values
}

/// Fits a local 3D Gaussian to `marginal` (one value per grid cell, in the
/// grid's flat-index order) within `half_window` cells of its peak along
/// each axis. `marginal` is smoothed first, per `_gaufilt3d`.
pub fn gaussian3d_fit(marginal: &[f64], grid: &Grid3D, half_window: i64) -> Result<Gaussian3dFit, LocateError> {
    let (nx, ny, nz) = grid.cell_count();
    let marginal = gaussian_smooth_3d(marginal, grid);
    let marginal = marginal.as_slice();
    let peak_index = marginal
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .map(|(i, _)| i)
        .ok_or(LocateError::EmptyWindow)?;
    let peak_ijk = grid.index_to_ijk(peak_index).map_err(|e| LocateError::Fit(e.to_string()))?;

    let mean: f64 = {
        let finite: Vec<f64> = marginal.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return Err(LocateError::EmptyWindow);
        }
        finite.iter().sum::<f64>() / finite.len() as f64
    };

    let mut rows = Vec::new();
    let mut ys = Vec::new();
    for i in (peak_ijk.0 - half_window).max(0)..(peak_ijk.0 + half_window + 1).min(nx) {
        for j in (peak_ijk.1 - half_window).max(0)..(peak_ijk.1 + half_window + 1).min(ny) {
            for k in (peak_ijk.2 - half_window).max(0)..(peak_ijk.2 + half_window + 1).min(nz) {
                let index = grid.ijk_to_index((i, j, k));
                let value = marginal[index];
                if !value.is_finite() {
                    continue;
                }
                let centred = (value - mean).max(1e-300);
                let x = (i - peak_ijk.0) as f64;
                let y = (j - peak_ijk.1) as f64;
                let z = (k - peak_ijk.2) as f64;
                rows.push([x * x, y * y, z * z, x * y, x * z, y * z, x, y, z, 1.0]);
                ys.push(-centred.ln());
            }
        }
    }
    if rows.len() < 10 {
        return Err(LocateError::Fit("fewer than 10 cells available for the 3D Gaussian fit".into()));
    }

    let a = DMatrix::from_row_slice(rows.len(), 10, &rows.concat());
    let y = DVector::from_vec(ys);
    let svd = a.svd(true, true);
    let p = svd
        .solve(&y, 1e-12)
        .map_err(|e| LocateError::Fit(format!("3D Gaussian fit did not converge: {e}")))?;

    let g = Matrix3::new(
        -2.0 * p[0], -p[3], -p[4],
        -p[3], -2.0 * p[1], -p[5],
        -p[4], -p[5], -2.0 * p[2],
    );
    let h = Vector3::new(p[6], p[7], p[8]);
    let g_inv = g.try_inverse().ok_or(LocateError::SingularCovariance)?;
    let loc = g_inv * h;

    let m = Matrix3::new(p[0], p[3] / 2.0, p[4] / 2.0, p[3] / 2.0, p[1], p[5] / 2.0, p[4] / 2.0, p[5] / 2.0, p[2]);
    let eigen = SymmetricEigen::new(m);
    let mut sigmas = [0.0_f64; 3];
    for (idx, &eigenvalue) in eigen.eigenvalues.iter().enumerate() {
        sigmas[idx] = (0.5_f64 / eigenvalue.abs().max(1e-10)).sqrt() / 2.0;
    }
    let cell_size = grid.cell_size();
    let error_xyz = (sigmas[0] * cell_size.0, sigmas[1] * cell_size.1, sigmas[2] * cell_size.2);

    let fitted_loc = (peak_ijk.0 as f64 + loc.x, peak_ijk.1 as f64 + loc.y, peak_ijk.2 as f64 + loc.z);
    let xyz = grid.loc_to_global_xyz(fitted_loc);

    Ok(Gaussian3dFit { xyz, error_xyz })
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
    fn recovers_the_peak_of_a_synthetic_gaussian() {
        let grid = tiny_grid();
        let marginal = synthetic_gaussian_map(&grid, (4, 4, 4), 1.5);
        let fit = gaussian3d_fit(&marginal, &grid, 3).unwrap();
        let expected = grid.loc_to_global_xyz((4.0, 4.0, 4.0));
        assert!((fit.xyz.0 - expected.0).abs() < 10.0);
        assert!((fit.xyz.1 - expected.1).abs() < 10.0);
    }

    #[test]
    fn smoothing_preserves_a_centred_peak_and_stays_normalised() {
        let grid = tiny_grid();
        let marginal = synthetic_gaussian_map(&grid, (4, 4, 4), 1.0);
        let smoothed = gaussian_smooth_3d(&marginal, &grid);
        let peak_index = smoothed
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(grid.index_to_ijk(peak_index).unwrap(), (4, 4, 4));
        assert!((smoothed[peak_index] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn smoothing_preserves_nan_cells() {
        let grid = tiny_grid();
        let mut marginal = synthetic_gaussian_map(&grid, (4, 4, 4), 1.0);
        marginal[0] = f64::NAN;
        let smoothed = gaussian_smooth_3d(&marginal, &grid);
        assert!(smoothed[0].is_nan());
    }

    #[test]
    fn empty_map_is_rejected() {
        let grid = tiny_grid();
        let marginal = vec![f64::NAN; grid.n_cells()];
        assert!(gaussian3d_fit(&marginal, &grid, 3).is_err());
    }
}
