//! The travel-time lookup table itself: a [`crate::geo::Grid3D`] plus one
//! travel-time volume per station per phase, with trilinear interpolation
//! for off-node queries.

use ndarray::Array4;

use crate::event::Phase;
use crate::geo::Grid3D;
use crate::station::StationSet;

use super::LutError;

/// A travel-time lookup table: `times[phase][station, i, j, k]` (seconds).
pub struct Lut {
    grid: Grid3D,
    stations: StationSet,
    /// `[station, i, j, k]`.
    p_times: Array4<f64>,
    /// `[station, i, j, k]`.
    s_times: Array4<f64>,
}

impl Lut {
    pub(super) fn new(
        grid: Grid3D,
        stations: StationSet,
        p_times: Array4<f64>,
        s_times: Array4<f64>,
    ) -> Result<Self, LutError> {
        let n_cells = grid.n_cells();
        let (nx, ny, nz) = grid.cell_count();
        let expected_shape = [stations.len(), nx as usize, ny as usize, nz as usize];
        if p_times.shape() != expected_shape || s_times.shape() != expected_shape {
            return Err(LutError::ShapeMismatch {
                expected: n_cells,
                found: p_times.len().max(s_times.len()),
            });
        }
        for (name, times) in [("P", &p_times), ("S", &s_times)] {
            for &v in times.iter() {
                if !v.is_finite() {
                    return Err(LutError::NonFiniteTravelTime {
                        station: String::new(),
                        phase: if name == "P" { Phase::P } else { Phase::S },
                    });
                }
                if v < 0.0 {
                    return Err(LutError::NegativeTravelTime {
                        station: String::new(),
                        phase: if name == "P" { Phase::P } else { Phase::S },
                        value: v,
                    });
                }
            }
        }
        Ok(Self {
            grid,
            stations,
            p_times,
            s_times,
        })
    }

    pub fn grid(&self) -> &Grid3D {
        &self.grid
    }

    pub fn stations(&self) -> &StationSet {
        &self.stations
    }

    /// Decomposes the LUT into its grid, stations and raw travel-time
    /// volumes, for serialization.
    pub(super) fn into_raw(self) -> (Grid3D, StationSet, Array4<f64>, Array4<f64>) {
        (self.grid, self.stations, self.p_times, self.s_times)
    }

    fn volume(&self, phase: Phase) -> &Array4<f64> {
        match phase {
            Phase::P => &self.p_times,
            Phase::S => &self.s_times,
        }
    }

    /// The full travel-time map for one station and phase, as a flat,
    /// `sort_order`-raveled slice matching the scanner's stacking order.
    pub fn fetch_map(&self, station_index: usize, phase: Phase) -> Vec<f64> {
        let volume = self.volume(phase);
        let (nx, ny, nz) = self.grid.cell_count();
        let mut out = vec![0.0; self.grid.n_cells()];
        for flat in 0..out.len() {
            let (i, j, k) = self.grid.index_to_ijk(flat).expect("flat < n_cells");
            let _ = (nx, ny, nz);
            out[flat] = volume[[station_index, i as usize, j as usize, k as usize]];
        }
        out
    }

    /// The travel time at a single grid node, by flat index.
    pub fn fetch_index(&self, station_index: usize, phase: Phase, flat_index: usize) -> Result<f64, LutError> {
        let (i, j, k) = self.grid.index_to_ijk(flat_index)?;
        Ok(self.volume(phase)[[station_index, i as usize, j as usize, k as usize]])
    }

    /// Trilinearly interpolated travel time at an arbitrary fractional
    /// `(i, j, k)` grid-index position (clamped to the grid's extent).
    pub fn value_at(&self, station_index: usize, phase: Phase, loc: (f64, f64, f64)) -> f64 {
        let (nx, ny, nz) = self.grid.cell_count();
        let clamp = |v: f64, n: i64| v.clamp(0.0, (n - 1) as f64);
        let (x, y, z) = (clamp(loc.0, nx), clamp(loc.1, ny), clamp(loc.2, nz));

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let z0 = z.floor() as usize;
        let x1 = (x0 + 1).min(nx as usize - 1);
        let y1 = (y0 + 1).min(ny as usize - 1);
        let z1 = (z0 + 1).min(nz as usize - 1);
        let (fx, fy, fz) = (x - x0 as f64, y - y0 as f64, z - z0 as f64);

        let volume = self.volume(phase);
        let at = |i: usize, j: usize, k: usize| volume[[station_index, i, j, k]];

        let c00 = at(x0, y0, z0) * (1.0 - fx) + at(x1, y0, z0) * fx;
        let c01 = at(x0, y0, z1) * (1.0 - fx) + at(x1, y0, z1) * fx;
        let c10 = at(x0, y1, z0) * (1.0 - fx) + at(x1, y1, z0) * fx;
        let c11 = at(x0, y1, z1) * (1.0 - fx) + at(x1, y1, z1) * fx;
        let c0 = c00 * (1.0 - fy) + c10 * fy;
        let c1 = c01 * (1.0 - fy) + c11 * fy;
        c0 * (1.0 - fz) + c1 * fz
    }

    /// Produces a coarser LUT by decimating the grid and resampling the
    /// travel-time volumes at the new nodes' fractional positions in the
    /// old grid.
    pub fn decimate(&self, ds: (i64, i64, i64)) -> Result<Lut, LutError> {
        let new_grid = self.grid.decimate(ds)?;
        let (nx, ny, nz) = new_grid.cell_count();
        let mut p_times = Array4::<f64>::zeros((self.stations.len(), nx as usize, ny as usize, nz as usize));
        let mut s_times = p_times.clone();

        for station in 0..self.stations.len() {
            for i in 0..nx as usize {
                for j in 0..ny as usize {
                    for k in 0..nz as usize {
                        let global = new_grid.loc_to_global_xyz((i as f64, j as f64, k as f64));
                        let old_loc = self.grid.global_xyz_to_loc(global);
                        p_times[[station, i, j, k]] = self.value_at(station, Phase::P, old_loc);
                        s_times[[station, i, j, k]] = self.value_at(station, Phase::S, old_loc);
                    }
                }
            }
        }

        Lut::new(new_grid, self.stations.clone(), p_times, s_times)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{GridSpec, Projection, SortOrder};
    use crate::station::Station;
    use approx::assert_abs_diff_eq;

    fn tiny_lut() -> Lut {
        let grid = GridSpec {
            cell_count: (3, 3, 3),
            cell_size: (100.0, 100.0, 100.0),
            azimuth: 0.0,
            dip: 0.0,
            sort_order: SortOrder::RowMajor,
            elevation: 0.0,
            projection: Projection::Wgs84,
            longitude: 0.0,
            latitude: 0.0,
        }
        .try_build()
        .unwrap();
        let stations = StationSet::new(vec![Station::new("AA01", 0.0, 0.0, 0.0)]);
        let p_times = Array4::<f64>::from_shape_fn((1, 3, 3, 3), |(_, i, j, k)| (i + j + k) as f64);
        let s_times = p_times.clone() * 1.7;
        Lut::new(grid, stations, p_times, s_times).unwrap()
    }

    #[test]
    fn fetch_index_matches_node_value() {
        let lut = tiny_lut();
        let flat = lut.grid().ijk_to_index((1, 1, 1));
        assert_abs_diff_eq!(lut.fetch_index(0, Phase::P, flat).unwrap(), 3.0);
    }

    #[test]
    fn value_at_interpolates_between_nodes() {
        let lut = tiny_lut();
        let v = lut.value_at(0, Phase::P, (0.5, 0.0, 0.0));
        assert_abs_diff_eq!(v, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn fetch_map_has_one_value_per_cell() {
        let lut = tiny_lut();
        assert_eq!(lut.fetch_map(0, Phase::P).len(), lut.grid().n_cells());
    }
}
