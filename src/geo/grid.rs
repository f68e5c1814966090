//! A regular 3D cell grid anchored in a projected frame.
//!
//! `Grid3D` is an immutable value type (see `DESIGN.md` for the rationale):
//! all of its coupled fields (centre, projection, rotation) are resolved
//! once by [`GridSpec::try_build`] rather than updated piecemeal by cascading
//! setters.

use thiserror::Error;

use super::projector::{rotate_about, Projection, Projector};

#[derive(Error, Debug)]
pub enum GridError {
    #[error("cell count along axis {axis} must be positive, got {value}")]
    NonPositiveCellCount { axis: usize, value: i64 },

    #[error("cell size along axis {axis} must be positive, got {value}")]
    NonPositiveCellSize { axis: usize, value: f64 },

    #[error("grid centre is inconsistent: geographic centre and projected centre were both set explicitly and disagree")]
    InconsistentCentre,

    #[error("invalid projection parameters: {0}")]
    InvalidProjection(String),

    #[error("index {index} is out of bounds for grid of {count} cells")]
    IndexOutOfBounds { index: usize, count: usize },
}

/// `ravel_multi_index`/`unravel_index` order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    /// Row-major (C-style): the last axis (z) varies fastest.
    RowMajor,
    /// Column-major (Fortran-style): the first axis (x) varies fastest.
    ColumnMajor,
}

/// Builder that resolves `Grid3D`'s coupled fields once, replacing the
/// source's mixin-style cross-cut setters.
#[derive(Clone, Debug)]
pub struct GridSpec {
    pub cell_count: (i64, i64, i64),
    pub cell_size: (f64, f64, f64),
    pub azimuth: f64,
    pub dip: f64,
    pub sort_order: SortOrder,
    pub elevation: f64,
    pub projection: Projection,
    /// Geographic centre of the grid (degrees). Required to resolve
    /// `grid_centre` via the projection.
    pub longitude: f64,
    pub latitude: f64,
}

impl GridSpec {
    pub fn try_build(self) -> Result<Grid3D, GridError> {
        let counts = [self.cell_count.0, self.cell_count.1, self.cell_count.2];
        for (axis, &value) in counts.iter().enumerate() {
            if value <= 0 {
                return Err(GridError::NonPositiveCellCount { axis, value });
            }
        }
        let sizes = [self.cell_size.0, self.cell_size.1, self.cell_size.2];
        for (axis, &value) in sizes.iter().enumerate() {
            if !(value > 0.0) {
                return Err(GridError::NonPositiveCellSize { axis, value });
            }
        }

        let projector = Projector::new(self.projection, self.longitude, self.latitude)?;
        let (cx, cy) = projector.project(self.longitude, self.latitude)?;
        let grid_centre = (cx, cy, self.elevation - (self.cell_count.2 - 1) as f64 * self.cell_size.2 / 2.0);

        Ok(Grid3D {
            cell_count: self.cell_count,
            cell_size: self.cell_size,
            azimuth: self.azimuth,
            dip: self.dip,
            sort_order: self.sort_order,
            elevation: self.elevation,
            grid_centre,
            longitude: self.longitude,
            latitude: self.latitude,
            projector,
        })
    }
}

/// An immutable, fully-resolved 3D cell grid.
pub struct Grid3D {
    cell_count: (i64, i64, i64),
    cell_size: (f64, f64, f64),
    azimuth: f64,
    dip: f64,
    sort_order: SortOrder,
    elevation: f64,
    grid_centre: (f64, f64, f64),
    longitude: f64,
    latitude: f64,
    projector: Projector,
}

impl Grid3D {
    pub fn cell_count(&self) -> (i64, i64, i64) {
        self.cell_count
    }

    pub fn cell_size(&self) -> (f64, f64, f64) {
        self.cell_size
    }

    pub fn azimuth(&self) -> f64 {
        self.azimuth
    }

    pub fn dip(&self) -> f64 {
        self.dip
    }

    pub fn grid_centre(&self) -> (f64, f64, f64) {
        self.grid_centre
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    pub fn elevation(&self) -> f64 {
        self.elevation
    }

    /// The geographic centre (degrees) the grid was built around; together
    /// with the other [`GridSpec`] fields this round-trips through
    /// [`GridSpec::try_build`].
    pub fn centre_geographic(&self) -> (f64, f64) {
        (self.longitude, self.latitude)
    }

    pub fn projection(&self) -> Projection {
        self.projector.projection()
    }

    pub fn n_cells(&self) -> usize {
        (self.cell_count.0 * self.cell_count.1 * self.cell_count.2) as usize
    }

    pub fn projector(&self) -> &Projector {
        &self.projector
    }

    /// Ravels `(i, j, k)` into a flat index under `sort_order`.
    pub fn ijk_to_index(&self, ijk: (i64, i64, i64)) -> usize {
        let (nx, ny, nz) = self.cell_count;
        let (i, j, k) = ijk;
        match self.sort_order {
            SortOrder::RowMajor => (i * ny * nz + j * nz + k) as usize,
            SortOrder::ColumnMajor => (k * ny * nx + j * nx + i) as usize,
        }
    }

    /// Unravels a flat index into `(i, j, k)` under `sort_order`.
    pub fn index_to_ijk(&self, index: usize) -> Result<(i64, i64, i64), GridError> {
        let (nx, ny, nz) = self.cell_count;
        let n = self.n_cells();
        if index >= n {
            return Err(GridError::IndexOutOfBounds { index, count: n });
        }
        let index = index as i64;
        Ok(match self.sort_order {
            SortOrder::RowMajor => {
                let i = index / (ny * nz);
                let rem = index % (ny * nz);
                let j = rem / nz;
                let k = rem % nz;
                (i, j, k)
            }
            SortOrder::ColumnMajor => {
                let k = index / (ny * nx);
                let rem = index % (ny * nx);
                let j = rem / nx;
                let i = rem % nx;
                (i, j, k)
            }
        })
    }

    /// `(i, j, k)` fractional grid-index position -> unrotated local
    /// Cartesian position (still anchored at `grid_centre`, before azimuth/
    /// dip rotation is applied).
    pub fn loc_to_local_xyz(&self, loc: (f64, f64, f64)) -> (f64, f64, f64) {
        let centre_idx = (
            (self.cell_count.0 - 1) as f64 / 2.0,
            (self.cell_count.1 - 1) as f64 / 2.0,
            (self.cell_count.2 - 1) as f64 / 2.0,
        );
        (
            self.grid_centre.0 + self.cell_size.0 * (loc.0 - centre_idx.0),
            self.grid_centre.1 + self.cell_size.1 * (loc.1 - centre_idx.1),
            self.grid_centre.2 + self.cell_size.2 * (loc.2 - centre_idx.2),
        )
    }

    /// Inverse of [`Grid3D::loc_to_local_xyz`].
    pub fn local_xyz_to_loc(&self, local: (f64, f64, f64)) -> (f64, f64, f64) {
        let centre_idx = (
            (self.cell_count.0 - 1) as f64 / 2.0,
            (self.cell_count.1 - 1) as f64 / 2.0,
            (self.cell_count.2 - 1) as f64 / 2.0,
        );
        (
            (local.0 - self.grid_centre.0) / self.cell_size.0 + centre_idx.0,
            (local.1 - self.grid_centre.1) / self.cell_size.1 + centre_idx.1,
            (local.2 - self.grid_centre.2) / self.cell_size.2 + centre_idx.2,
        )
    }

    /// Unrotated local Cartesian -> rotated, projected global Cartesian.
    pub fn local_xyz_to_global_xyz(&self, local: (f64, f64, f64)) -> (f64, f64, f64) {
        rotate_about(local, self.grid_centre, self.azimuth, self.dip, false)
    }

    /// Inverse of [`Grid3D::local_xyz_to_global_xyz`].
    pub fn global_xyz_to_local_xyz(&self, global: (f64, f64, f64)) -> (f64, f64, f64) {
        rotate_about(global, self.grid_centre, self.azimuth, self.dip, true)
    }

    /// Global projected Cartesian -> geographic (lon, lat, elevation).
    pub fn global_xyz_to_geographic(&self, global: (f64, f64, f64)) -> Result<(f64, f64, f64), GridError> {
        let (lon, lat) = self.projector.unproject(global.0, global.1)?;
        Ok((lon, lat, global.2))
    }

    /// Geographic (lon, lat, elevation) -> global projected Cartesian.
    pub fn geographic_to_global_xyz(&self, geo: (f64, f64, f64)) -> Result<(f64, f64, f64), GridError> {
        let (x, y) = self.projector.project(geo.0, geo.1)?;
        Ok((x, y, geo.2))
    }

    /// Fractional `(i, j, k)` grid-index position -> global Cartesian,
    /// applying the grid's rotation.
    pub fn loc_to_global_xyz(&self, loc: (f64, f64, f64)) -> (f64, f64, f64) {
        self.local_xyz_to_global_xyz(self.loc_to_local_xyz(loc))
    }

    /// Inverse of [`Grid3D::loc_to_global_xyz`], unclamped (may fall outside
    /// `[0, cell_count)`).
    pub fn global_xyz_to_loc(&self, global: (f64, f64, f64)) -> (f64, f64, f64) {
        self.local_xyz_to_loc(self.global_xyz_to_local_xyz(global))
    }

    /// Converts global Cartesian to the nearest integer cell index, clamping
    /// coordinates that fall outside the grid to the nearest interior
    /// half-cell offset.
    pub fn xyz_to_index(&self, global: (f64, f64, f64)) -> usize {
        let loc = self.global_xyz_to_loc(global);
        let clamp = |v: f64, n: i64| v.clamp(-0.5, n as f64 - 0.5).round().clamp(0.0, (n - 1) as f64) as i64;
        let ijk = (
            clamp(loc.0, self.cell_count.0),
            clamp(loc.1, self.cell_count.1),
            clamp(loc.2, self.cell_count.2),
        );
        self.ijk_to_index(ijk)
    }

    /// Global Cartesian position of the cell centre nearest `global`
    /// ("snap to cell").
    pub fn snap_to_cell(&self, global: (f64, f64, f64)) -> (f64, f64, f64) {
        let index = self.xyz_to_index(global);
        let ijk = self.index_to_ijk(index).expect("xyz_to_index always returns a valid index");
        self.loc_to_global_xyz((ijk.0 as f64, ijk.1 as f64, ijk.2 as f64))
    }

    /// The 8 projected corners of the grid.
    pub fn grid_corners(&self) -> [(f64, f64, f64); 8] {
        let (nx, ny, nz) = self.cell_count;
        let lasts = [0i64, nx - 1];
        let mut corners = [(0.0, 0.0, 0.0); 8];
        let mut idx = 0;
        for &i in &lasts {
            for &j in &[0i64, ny - 1] {
                for &k in &[0i64, nz - 1] {
                    corners[idx] = self.loc_to_global_xyz((i as f64, j as f64, k as f64));
                    idx += 1;
                }
            }
        }
        corners
    }

    /// Produces a coarser grid with `new_count = 1 + (old_count - 1) / ds`
    /// and `new_size = old_size * ds`, re-centring to preserve the midpoint.
    pub fn decimate(&self, ds: (i64, i64, i64)) -> Result<Grid3D, GridError> {
        let new_count = (
            1 + (self.cell_count.0 - 1) / ds.0,
            1 + (self.cell_count.1 - 1) / ds.1,
            1 + (self.cell_count.2 - 1) / ds.2,
        );
        let new_size = (
            self.cell_size.0 * ds.0 as f64,
            self.cell_size.1 * ds.1 as f64,
            self.cell_size.2 * ds.2 as f64,
        );

        let old_centre_idx = (
            (self.cell_count.0 - 1) as f64 / 2.0,
            (self.cell_count.1 - 1) as f64 / 2.0,
            (self.cell_count.2 - 1) as f64 / 2.0,
        );
        let centre_global = self.loc_to_global_xyz(old_centre_idx);
        let centre_geo = self.global_xyz_to_geographic(centre_global)?;

        GridSpec {
            cell_count: new_count,
            cell_size: new_size,
            azimuth: self.azimuth,
            dip: self.dip,
            sort_order: self.sort_order,
            elevation: self.elevation,
            projection: self.projector.projection(),
            longitude: centre_geo.0,
            latitude: centre_geo.1,
        }
        .try_build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn simple_grid() -> Grid3D {
        GridSpec {
            cell_count: (11, 11, 11),
            cell_size: (100.0, 100.0, 100.0),
            azimuth: 0.0,
            dip: 0.0,
            sort_order: SortOrder::RowMajor,
            elevation: 0.0,
            projection: Projection::Wgs84,
            longitude: 151.2,
            latitude: -33.8,
        }
        .try_build()
        .unwrap()
    }

    #[test]
    fn index_ijk_round_trip() {
        let grid = simple_grid();
        for index in [0usize, 5, 57, 1330] {
            let ijk = grid.index_to_ijk(index).unwrap();
            assert_eq!(grid.ijk_to_index(ijk), index);
        }
    }

    #[test]
    fn loc_xyz_round_trip() {
        let grid = simple_grid();
        let loc = (3.0, 7.0, 2.0);
        let global = grid.loc_to_global_xyz(loc);
        let back = grid.global_xyz_to_loc(global);
        assert_abs_diff_eq!(back.0, loc.0, epsilon = 1e-6);
        assert_abs_diff_eq!(back.1, loc.1, epsilon = 1e-6);
        assert_abs_diff_eq!(back.2, loc.2, epsilon = 1e-6);
    }

    #[test]
    fn decimate_preserves_centre_and_counts() {
        let grid = simple_grid();
        let decimated = grid.decimate((2, 2, 2)).unwrap();
        assert_eq!(decimated.cell_count(), (6, 6, 6));
        let d = (
            decimated.grid_centre().0 - grid.grid_centre().0,
            decimated.grid_centre().1 - grid.grid_centre().1,
            decimated.grid_centre().2 - grid.grid_centre().2,
        );
        assert!(d.0.abs() < grid.cell_size().0);
        assert!(d.1.abs() < grid.cell_size().1);
        assert!(d.2.abs() < grid.cell_size().2);
    }

    #[test]
    fn nonpositive_cell_count_is_rejected() {
        let mut spec_source = simple_grid();
        let _ = &mut spec_source;
        let bad = GridSpec {
            cell_count: (0, 11, 11),
            cell_size: (100.0, 100.0, 100.0),
            azimuth: 0.0,
            dip: 0.0,
            sort_order: SortOrder::RowMajor,
            elevation: 0.0,
            projection: Projection::Wgs84,
            longitude: 151.2,
            latitude: -33.8,
        }
        .try_build();
        assert!(matches!(bad, Err(GridError::NonPositiveCellCount { axis: 0, .. })));
    }
}
