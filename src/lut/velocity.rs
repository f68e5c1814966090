//! A 1D layered velocity model, and its hand-rolled CSV reader.

use std::io::BufRead;
use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VelocityError {
    #[error("velocity model file has no header row")]
    MissingHeader,

    #[error("velocity model row {row} has {found} columns, expected 3 (depth, vp, vs)")]
    WrongColumnCount { row: usize, found: usize },

    #[error("velocity model row {row} has an unparseable numeric value: {value:?}")]
    BadNumber { row: usize, value: String },

    #[error("velocity model has no layers")]
    Empty,

    #[error("velocity at depth {depth} is non-positive: vp={vp}, vs={vs}")]
    NonPositiveVelocity { depth: f64, vp: f64, vs: f64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One layer of a 1D velocity model. `depth_m` is positive down.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Layer {
    pub depth_m: f64,
    pub vp_m_s: f64,
    pub vs_m_s: f64,
}

/// An ordered sequence of velocity layers, interpreted either as piecewise-
/// constant blocks or piecewise-linear gradients between consecutive depths.
/// The first and last layer are extended to +/-infinity.
#[derive(Clone, Debug)]
pub struct VelocityModel {
    layers: Vec<Layer>,
    block_model: bool,
}

impl VelocityModel {
    pub fn new(mut layers: Vec<Layer>, block_model: bool) -> Result<Self, VelocityError> {
        if layers.is_empty() {
            return Err(VelocityError::Empty);
        }
        layers.sort_by(|a, b| a.depth_m.partial_cmp(&b.depth_m).unwrap());
        for layer in &layers {
            if layer.vp_m_s <= 0.0 || layer.vs_m_s <= 0.0 {
                return Err(VelocityError::NonPositiveVelocity {
                    depth: layer.depth_m,
                    vp: layer.vp_m_s,
                    vs: layer.vs_m_s,
                });
            }
        }
        Ok(Self { layers, block_model })
    }

    /// Reads the velocity-model CSV format described in `SPEC_FULL.md` §6: a
    /// header row followed by `depth, vp, vs` rows (metres, m/s).
    pub fn from_csv(path: impl AsRef<Path>, block_model: bool) -> Result<Self, VelocityError> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let mut lines = reader.lines();

        lines.next().ok_or(VelocityError::MissingHeader)??;

        let mut layers = Vec::new();
        for (row, line) in lines.enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() != 3 {
                return Err(VelocityError::WrongColumnCount {
                    row: row + 1,
                    found: fields.len(),
                });
            }
            let parse = |row: usize, s: &str| -> Result<f64, VelocityError> {
                s.parse::<f64>().map_err(|_| VelocityError::BadNumber {
                    row,
                    value: s.to_string(),
                })
            };
            layers.push(Layer {
                depth_m: parse(row + 1, fields[0])?,
                vp_m_s: parse(row + 1, fields[1])?,
                vs_m_s: parse(row + 1, fields[2])?,
            });
        }

        Self::new(layers, block_model)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    fn velocity_at(&self, depth_m: f64, pick: impl Fn(&Layer) -> f64) -> f64 {
        let layers = &self.layers;
        if depth_m <= layers[0].depth_m {
            return pick(&layers[0]);
        }
        if depth_m >= layers[layers.len() - 1].depth_m {
            return pick(&layers[layers.len() - 1]);
        }
        let upper = layers.partition_point(|l| l.depth_m <= depth_m);
        let lo = &layers[upper - 1];
        let hi = &layers[upper];
        if self.block_model {
            pick(lo)
        } else {
            let frac = (depth_m - lo.depth_m) / (hi.depth_m - lo.depth_m);
            pick(lo) + frac * (pick(hi) - pick(lo))
        }
    }

    pub fn vp_at(&self, depth_m: f64) -> f64 {
        self.velocity_at(depth_m, |l| l.vp_m_s)
    }

    pub fn vs_at(&self, depth_m: f64) -> f64 {
        self.velocity_at(depth_m, |l| l.vs_m_s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn model() -> VelocityModel {
        VelocityModel::new(
            vec![
                Layer { depth_m: 0.0, vp_m_s: 3000.0, vs_m_s: 1700.0 },
                Layer { depth_m: 1000.0, vp_m_s: 5000.0, vs_m_s: 2800.0 },
                Layer { depth_m: 3000.0, vp_m_s: 6000.0, vs_m_s: 3400.0 },
            ],
            false,
        )
        .unwrap()
    }

    #[test]
    fn gradient_interpolates_linearly() {
        let m = model();
        assert_abs_diff_eq!(m.vp_at(500.0), 4000.0, epsilon = 1e-9);
    }

    #[test]
    fn block_model_is_piecewise_constant() {
        let m = VelocityModel::new(model().layers.clone(), true).unwrap();
        assert_abs_diff_eq!(m.vp_at(1999.0), 5000.0, epsilon = 1e-9);
    }

    #[test]
    fn extends_outside_layer_range() {
        let m = model();
        assert_abs_diff_eq!(m.vp_at(-500.0), 3000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(m.vp_at(10_000.0), 6000.0, epsilon = 1e-9);
    }

    #[test]
    fn rejects_non_positive_velocity() {
        let bad = VelocityModel::new(
            vec![Layer { depth_m: 0.0, vp_m_s: 0.0, vs_m_s: 1000.0 }],
            true,
        );
        assert!(bad.is_err());
    }
}
