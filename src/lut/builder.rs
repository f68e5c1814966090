//! Builds travel-time volumes from a velocity model, in one of three modes.
//!
//! Grounded on `examples/original_source/QMigrate/core/model.py`:
//! `compute_homogeneous_vmodel` (straight-ray analytic travel time),
//! `compute_1d_vmodel`/`compute_1d_vmodel_skfmm` (a radial/depth 2D table,
//! interpolated laterally — the source computes this 2D table by calling out
//! to NonLinLoc binaries or `skfmm`; here it is a direct 2D fast-marching
//! sweep, since shelling out to an external tool is not this crate's
//! concern), and `compute_3d_vmodel`, which the source itself leaves as a
//! `NotImplementedError` stub: mode iii below is a real implementation of
//! it, a direct 3D fast march over a laterally-homogeneous-per-depth
//! velocity field.

use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use ndarray::{Array3, Array4};
use rayon::prelude::*;

use crate::event::Phase;
use crate::geo::Grid3D;
use crate::station::StationSet;

use super::fmm::fast_marching;
use super::{Lut, LutError, VelocityModel};

/// How a station's travel-time volume is computed.
#[derive(Clone, Copy, Debug)]
pub enum BuildMode {
    /// A single velocity value per phase; travel time is straight-line
    /// distance divided by that velocity.
    Homogeneous,
    /// A 1D layered velocity model, solved on a 2D (radius, depth) plane via
    /// fast marching and sampled laterally by bilinear interpolation.
    Layered1dRadial,
    /// A 1D layered velocity model broadcast laterally across the full 3D
    /// grid, solved directly by 3D fast marching.
    Layered1dDirect,
}

pub struct TravelTimeBuilder {
    grid: Grid3D,
    stations: StationSet,
    velocity: VelocityModel,
    mode: BuildMode,
}

impl TravelTimeBuilder {
    pub fn new(grid: Grid3D, stations: StationSet, velocity: VelocityModel, mode: BuildMode) -> Self {
        Self {
            grid,
            stations,
            velocity,
            mode,
        }
    }

    /// Consumes the builder, computing a travel-time volume for every
    /// station and phase (in parallel across stations).
    pub fn build(self) -> Result<Lut, LutError> {
        if self.stations.is_empty() {
            return Err(LutError::StationDimensionChanged { expected: 1, found: 0 });
        }
        let (nx, ny, nz) = self.grid.cell_count();
        let shape = (self.stations.len(), nx as usize, ny as usize, nz as usize);

        info!(
            "building {:?} LUT for {} stations over {} cells",
            self.mode,
            self.stations.len(),
            self.grid.n_cells()
        );
        let bar = ProgressBar::new(self.stations.len() as u64 * 2);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} station-phases")
                .unwrap(),
        );

        let results: Vec<Result<(Array3<f64>, Array3<f64>), LutError>> = (0..self.stations.len())
            .into_par_iter()
            .map(|i| {
                let station = &self.stations[i];
                let p = self.build_one(station, Phase::P);
                bar.inc(1);
                let s = self.build_one(station, Phase::S);
                bar.inc(1);
                Ok((p?, s?))
            })
            .collect();
        bar.finish_and_clear();

        let mut p_times = Array4::<f64>::zeros(shape);
        let mut s_times = Array4::<f64>::zeros(shape);
        for (i, result) in results.into_iter().enumerate() {
            let (p, s) = result?;
            p_times.index_axis_mut(ndarray::Axis(0), i).assign(&p);
            s_times.index_axis_mut(ndarray::Axis(0), i).assign(&s);
        }

        Lut::new(self.grid, self.stations, p_times, s_times)
    }

    fn build_one(&self, station: &crate::station::Station, phase: Phase) -> Result<Array3<f64>, LutError> {
        match self.mode {
            BuildMode::Homogeneous => self.build_homogeneous(station, phase),
            BuildMode::Layered1dRadial => self.build_layered_radial(station, phase),
            BuildMode::Layered1dDirect => self.build_layered_direct(station, phase),
        }
    }

    fn station_global_xyz(&self, station: &crate::station::Station) -> Result<(f64, f64, f64), LutError> {
        Ok(self
            .grid
            .geographic_to_global_xyz((station.longitude, station.latitude, station.elevation))?)
    }

    fn build_homogeneous(
        &self,
        station: &crate::station::Station,
        phase: Phase,
    ) -> Result<Array3<f64>, LutError> {
        let (sx, sy, sz) = self.station_global_xyz(station)?;
        // A single representative velocity: the model's shallowest layer.
        let v = match phase {
            Phase::P => self.velocity.vp_at(f64::NEG_INFINITY),
            Phase::S => self.velocity.vs_at(f64::NEG_INFINITY),
        };
        let (nx, ny, nz) = self.grid.cell_count();
        let mut out = Array3::<f64>::zeros((nx as usize, ny as usize, nz as usize));
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let (x, y, z) = self.grid.loc_to_global_xyz((i as f64, j as f64, k as f64));
                    let r = ((x - sx).powi(2) + (y - sy).powi(2) + (z - sz).powi(2)).sqrt();
                    out[[i as usize, j as usize, k as usize]] = r / v;
                }
            }
        }
        Ok(out)
    }

    /// Solves the eikonal equation on a 2D (radius, depth) plane through the
    /// station, then samples it for every 3D grid node by horizontal
    /// distance and depth.
    fn build_layered_radial(
        &self,
        station: &crate::station::Station,
        phase: Phase,
    ) -> Result<Array3<f64>, LutError> {
        let (sx, sy, sz) = self.station_global_xyz(station)?;
        let (nx, ny, nz) = self.grid.cell_count();
        let (dx, dy, dz) = self.grid.cell_size();
        let plane_dx = dx.min(dy).min(dz);

        let max_radius = {
            let corners = self.grid.grid_corners();
            corners
                .iter()
                .map(|&(x, y, _)| ((x - sx).powi(2) + (y - sy).powi(2)).sqrt())
                .fold(0.0_f64, f64::max)
                + plane_dx
        };
        let (min_z, max_z) = {
            let corners = self.grid.grid_corners();
            let zs: Vec<f64> = corners.iter().map(|&(_, _, z)| z).collect();
            (
                zs.iter().cloned().fold(f64::INFINITY, f64::min).min(sz) - plane_dx,
                zs.iter().cloned().fold(f64::NEG_INFINITY, f64::max).max(sz) + plane_dx,
            )
        };

        let n_r = (max_radius / plane_dx).ceil() as usize + 2;
        let n_z = ((max_z - min_z) / plane_dx).ceil() as usize + 2;

        let mut velocity = Array3::<f64>::zeros((n_r, 1, n_z));
        for r in 0..n_r {
            for k in 0..n_z {
                let depth = min_z + k as f64 * plane_dx;
                let v = match phase {
                    Phase::P => self.velocity.vp_at(-depth),
                    Phase::S => self.velocity.vs_at(-depth),
                };
                velocity[[r, 0, k]] = v;
            }
        }

        let source_r = 0usize;
        let source_k = ((sz - min_z) / plane_dx).round().clamp(0.0, (n_z - 1) as f64) as i64;
        let plane_times = fast_marching(&velocity, (source_r as i64, 0, source_k), plane_dx)
            .map_err(|_| LutError::DidNotConverge)?;

        let sample = |radius: f64, z: f64| -> f64 {
            let rf = (radius / plane_dx).clamp(0.0, (n_r - 1) as f64);
            let kf = ((z - min_z) / plane_dx).clamp(0.0, (n_z - 1) as f64);
            let r0 = rf.floor() as usize;
            let r1 = (r0 + 1).min(n_r - 1);
            let k0 = kf.floor() as usize;
            let k1 = (k0 + 1).min(n_z - 1);
            let fr = rf - r0 as f64;
            let fk = kf - k0 as f64;
            let a = plane_times[[r0, 0, k0]] * (1.0 - fr) + plane_times[[r1, 0, k0]] * fr;
            let b = plane_times[[r0, 0, k1]] * (1.0 - fr) + plane_times[[r1, 0, k1]] * fr;
            a * (1.0 - fk) + b * fk
        };

        let mut out = Array3::<f64>::zeros((nx as usize, ny as usize, nz as usize));
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let (x, y, z) = self.grid.loc_to_global_xyz((i as f64, j as f64, k as f64));
                    let radius = ((x - sx).powi(2) + (y - sy).powi(2)).sqrt();
                    out[[i as usize, j as usize, k as usize]] = sample(radius, z);
                }
            }
        }
        Ok(out)
    }

    /// Broadcasts the 1D velocity model across the full 3D grid and solves
    /// the eikonal equation directly.
    fn build_layered_direct(
        &self,
        station: &crate::station::Station,
        phase: Phase,
    ) -> Result<Array3<f64>, LutError> {
        let (sx, sy, sz) = self.station_global_xyz(station)?;
        let (nx, ny, nz) = self.grid.cell_count();
        let (dx, dy, dz) = self.grid.cell_size();
        // Fast marching assumes isotropic spacing; the smallest cell size
        // is used uniformly, matching the radial mode's approach.
        let h = dx.min(dy).min(dz);

        let mut velocity = Array3::<f64>::zeros((nx as usize, ny as usize, nz as usize));
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let (_, _, z) = self.grid.loc_to_global_xyz((i as f64, j as f64, k as f64));
                    let v = match phase {
                        Phase::P => self.velocity.vp_at(-z),
                        Phase::S => self.velocity.vs_at(-z),
                    };
                    velocity[[i as usize, j as usize, k as usize]] = v;
                }
            }
        }

        let source_loc = self.grid.global_xyz_to_loc((sx, sy, sz));
        let source = (
            source_loc.0.round().clamp(0.0, (nx - 1) as f64) as i64,
            source_loc.1.round().clamp(0.0, (ny - 1) as f64) as i64,
            source_loc.2.round().clamp(0.0, (nz - 1) as f64) as i64,
        );
        fast_marching(&velocity, source, h).map_err(|_| LutError::DidNotConverge)
    }
}
