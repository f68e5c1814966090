//! Planar projections and the spherical rotation used to orient a grid
//! frame relative to the projected plane.

use proj4rs::transform::transform;
use proj4rs::Proj;

use super::grid::GridError;

/// Mean radius (metres) used for the flat-earth "SIMPLE" approximation under
/// the WGS84 ellipsoid.
const WGS84_MEAN_RADIUS_M: f64 = 6_371_000.0;

/// Mean radius (metres) used for the flat-earth "SIMPLE" approximation under
/// the Clarke 1866 ellipsoid (NAD27's reference ellipsoid).
const NAD27_MEAN_RADIUS_M: f64 = 6_370_997.2;

/// The supported projection families. `Wgs84`/`Nad27` are not true planar
/// projections; they describe a flat-earth tangent-plane approximation
/// around a reference point, matching NonLinLoc's `SIMPLE` transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Projection {
    Wgs84,
    Nad27,
    Utm { zone: i32 },
    Lcc { lon0: f64, lat0: f64, p1: f64, p2: f64 },
    Tm { lon0: f64, lat0: f64 },
}

impl Projection {
    fn proj_string(&self) -> Option<String> {
        match *self {
            Projection::Wgs84 | Projection::Nad27 => None,
            Projection::Utm { zone } => {
                let south = zone < 0;
                let zone = zone.unsigned_abs();
                if south {
                    Some(format!("+proj=utm +zone={zone} +south +ellps=WGS84"))
                } else {
                    Some(format!("+proj=utm +zone={zone} +ellps=WGS84"))
                }
            }
            Projection::Lcc { lon0, lat0, p1, p2 } => Some(format!(
                "+proj=lcc +lon_0={lon0} +lat_0={lat0} +lat_1={p1} +lat_2={p2} +ellps=WGS84"
            )),
            Projection::Tm { lon0, lat0 } => {
                Some(format!("+proj=tmerc +lon_0={lon0} +lat_0={lat0} +ellps=WGS84"))
            }
        }
    }

    fn geographic_proj_string(&self) -> &'static str {
        match self {
            Projection::Nad27 => "+proj=longlat +ellps=clrk66 +datum=NAD27",
            _ => "+proj=longlat +ellps=WGS84 +datum=WGS84",
        }
    }

    fn simple_radius_m(&self) -> f64 {
        match self {
            Projection::Nad27 => NAD27_MEAN_RADIUS_M,
            _ => WGS84_MEAN_RADIUS_M,
        }
    }
}

/// Converts between geographic coordinates (degrees) and a projected
/// Cartesian plane (metres), for one [`Projection`] family anchored at a
/// reference origin.
pub struct Projector {
    projection: Projection,
    origin_lon: f64,
    origin_lat: f64,
    geographic: Proj,
    planar: Option<Proj>,
}

impl Projector {
    /// Builds a new projector. `origin_lon`/`origin_lat` (degrees) anchor the
    /// flat-earth approximation used by the `Wgs84`/`Nad27` variants; they
    /// are ignored by the true planar projections, which derive their own
    /// origin from their parameters.
    pub fn new(projection: Projection, origin_lon: f64, origin_lat: f64) -> Result<Self, GridError> {
        let geographic = Proj::from_proj_string(projection.geographic_proj_string())
            .map_err(|e| GridError::InvalidProjection(e.to_string()))?;
        let planar = match projection.proj_string() {
            Some(s) => Some(
                Proj::from_proj_string(&s).map_err(|e| GridError::InvalidProjection(e.to_string()))?,
            ),
            None => None,
        };
        Ok(Self {
            projection,
            origin_lon,
            origin_lat,
            geographic,
            planar,
        })
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Forward: geographic (lon, lat) degrees -> projected Cartesian (x, y)
    /// metres.
    pub fn project(&self, lon: f64, lat: f64) -> Result<(f64, f64), GridError> {
        match &self.planar {
            Some(planar) => {
                let mut point = (lon.to_radians(), lat.to_radians(), 0.0);
                transform(&self.geographic, planar, &mut point)
                    .map_err(|e| GridError::InvalidProjection(e.to_string()))?;
                Ok((point.0, point.1))
            }
            None => {
                let r = self.projection.simple_radius_m();
                let lat0 = self.origin_lat.to_radians();
                let x = r * (lon - self.origin_lon).to_radians() * lat0.cos();
                let y = r * (lat - self.origin_lat).to_radians();
                Ok((x, y))
            }
        }
    }

    /// Inverse: projected Cartesian (x, y) metres -> geographic (lon, lat)
    /// degrees.
    pub fn unproject(&self, x: f64, y: f64) -> Result<(f64, f64), GridError> {
        match &self.planar {
            Some(planar) => {
                let mut point = (x, y, 0.0);
                transform(planar, &self.geographic, &mut point)
                    .map_err(|e| GridError::InvalidProjection(e.to_string()))?;
                Ok((point.0.to_degrees(), point.1.to_degrees()))
            }
            None => {
                let r = self.projection.simple_radius_m();
                let lat0 = self.origin_lat.to_radians();
                let lon = self.origin_lon + (x / (r * lat0.cos())).to_degrees();
                let lat = self.origin_lat + (y / r).to_degrees();
                Ok((lon, lat))
            }
        }
    }
}

/// Cartesian (x, y, z) -> spherical (theta, phi, r), with `theta = atan2(y,
/// x)`, `phi = atan2(z, sqrt(x^2+y^2))`.
pub fn cart_to_sph(xyz: (f64, f64, f64)) -> (f64, f64, f64) {
    let (x, y, z) = xyz;
    let xy = (x * x + y * y).sqrt();
    let theta = y.atan2(x);
    let phi = z.atan2(xy);
    let r = (xy * xy + z * z).sqrt();
    (theta, phi, r)
}

/// Inverse of [`cart_to_sph`].
pub fn sph_to_cart(tpr: (f64, f64, f64)) -> (f64, f64, f64) {
    let (theta, phi, r) = tpr;
    let x = r * phi.cos() * theta.cos();
    let y = r * phi.cos() * theta.sin();
    let z = r * phi.sin();
    (x, y, z)
}

/// Rotates `value` about `centre` by `(azimuth, dip)` using the spherical
/// parameterisation: convert `value - centre` to `(theta, phi, r)`, add (or
/// subtract, if `inverse`) `(azimuth, dip, 0)`, convert back, re-add
/// `centre`.
pub fn rotate_about(
    value: (f64, f64, f64),
    centre: (f64, f64, f64),
    azimuth: f64,
    dip: f64,
    inverse: bool,
) -> (f64, f64, f64) {
    let relative = (value.0 - centre.0, value.1 - centre.1, value.2 - centre.2);
    let mut tpr = cart_to_sph(relative);
    if inverse {
        tpr.0 -= azimuth;
        tpr.1 -= dip;
    } else {
        tpr.0 += azimuth;
        tpr.1 += dip;
    }
    let rotated = sph_to_cart(tpr);
    (rotated.0 + centre.0, rotated.1 + centre.1, rotated.2 + centre.2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rotation_round_trips() {
        let centre = (1000.0, 2000.0, -500.0);
        let value = (1200.0, 2300.0, -480.0);
        let rotated = rotate_about(value, centre, 0.3, 0.1, false);
        let back = rotate_about(rotated, centre, 0.3, 0.1, true);
        assert_abs_diff_eq!(back.0, value.0, epsilon = 1e-6);
        assert_abs_diff_eq!(back.1, value.1, epsilon = 1e-6);
        assert_abs_diff_eq!(back.2, value.2, epsilon = 1e-6);
    }

    #[test]
    fn zero_rotation_is_identity() {
        let centre = (0.0, 0.0, 0.0);
        let value = (10.0, -5.0, 3.0);
        let rotated = rotate_about(value, centre, 0.0, 0.0, false);
        assert_abs_diff_eq!(rotated.0, value.0, epsilon = 1e-9);
        assert_abs_diff_eq!(rotated.1, value.1, epsilon = 1e-9);
        assert_abs_diff_eq!(rotated.2, value.2, epsilon = 1e-9);
    }

    #[test]
    fn simple_projection_round_trips() {
        let p = Projector::new(Projection::Wgs84, 151.2, -33.8).unwrap();
        let (x, y) = p.project(151.25, -33.75).unwrap();
        let (lon, lat) = p.unproject(x, y).unwrap();
        assert_abs_diff_eq!(lon, 151.25, epsilon = 1e-6);
        assert_abs_diff_eq!(lat, -33.75, epsilon = 1e-6);
    }
}
