//! Global covariance location: a weighted mean and covariance matrix over
//! every grid cell above a normalised coalescence threshold.
//!
//! Grounded on `examples/original_source/QMigrate/signal/scan.py`'s
//! `_covfit3d`: normalise the marginalised coalescence map by its maximum,
//! threshold it, take the coalescence-weighted first and second moments of
//! the surviving cells' grid positions, and report the one-sigma
//! uncertainties as the square roots of the covariance diagonal.

use nalgebra::Matrix3;

use crate::geo::Grid3D;

use super::LocateError;

/// A covariance-fit location estimate and its one-sigma uncertainties,
/// both in global projected Cartesian coordinates.
#[derive(Clone, Copy, Debug)]
pub struct CovarianceFit {
    pub xyz: (f64, f64, f64),
    pub error_xyz: (f64, f64, f64),
}

/// Fits a covariance-weighted location to `marginal`, a flattened
/// marginalised coalescence map (one value per grid cell, in the grid's
/// flat-index order), keeping only cells whose value (after normalising by
/// the map's maximum) exceeds `threshold`.
pub fn covariance_fit(marginal: &[f64], grid: &Grid3D, threshold: f64) -> Result<CovarianceFit, LocateError> {
    let max = marginal.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() || max <= 0.0 {
        return Err(LocateError::EmptyWindow);
    }

    let (dx, dy, dz) = grid.cell_size();
    let mut weights = Vec::with_capacity(marginal.len());
    let mut positions = Vec::with_capacity(marginal.len());
    for (index, &value) in marginal.iter().enumerate() {
        let normalised = value / max;
        if !normalised.is_finite() || normalised <= threshold {
            continue;
        }
        let (i, j, k) = grid
            .index_to_ijk(index)
            .map_err(|e| LocateError::Fit(e.to_string()))?;
        weights.push(normalised);
        positions.push((i as f64 * dx, j as f64 * dy, k as f64 * dz));
    }
    if weights.is_empty() {
        return Err(LocateError::EmptyWindow);
    }

    let total_weight: f64 = weights.iter().sum();
    let mean = positions
        .iter()
        .zip(weights.iter())
        .fold((0.0, 0.0, 0.0), |acc, (p, &w)| (acc.0 + w * p.0, acc.1 + w * p.1, acc.2 + w * p.2));
    let mean = (mean.0 / total_weight, mean.1 / total_weight, mean.2 / total_weight);

    let mut cov = Matrix3::<f64>::zeros();
    for (p, &w) in positions.iter().zip(weights.iter()) {
        let d = [p.0 - mean.0, p.1 - mean.1, p.2 - mean.2];
        for a in 0..3 {
            for b in 0..3 {
                cov[(a, b)] += w * d[a] * d[b];
            }
        }
    }
    cov /= total_weight;
    if !cov.iter().all(|v| v.is_finite()) {
        return Err(LocateError::SingularCovariance);
    }

    let error_xyz = (cov[(0, 0)].max(0.0).sqrt(), cov[(1, 1)].max(0.0).sqrt(), cov[(2, 2)].max(0.0).sqrt());
    let loc = (mean.0 / dx, mean.1 / dy, mean.2 / dz);
    let xyz = grid.loc_to_global_xyz(loc);

    Ok(CovarianceFit { xyz, error_xyz })
}
