/*!
Useful constants.

All constants *must* be double precision. Seiscoal should do as many
calculations as possible in double precision before converting to a lower
precision, if it is ever required.
 */

pub use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Lower clip bound applied to `1 + STA/LTA` before taking the onset
/// logarithm. Below this the ratio is considered noise floor.
pub const ONSET_CLIP_FLOOR: f64 = 0.8;

/// Substituted for the LTA denominator whenever it falls at or below this
/// value, to avoid dividing by (near) zero.
pub const LTA_FLOOR: f64 = 1e-8;

/// Fractional width (each side) of the cosine taper applied before
/// filtering.
pub const TAPER_FRACTION: f64 = 0.1;

/// Percentile used for the "inside window" adaptive pick threshold.
pub const PICK_INSIDE_PERCENTILE: f64 = 88.0;

/// Fraction of the scanner's post-pad that must exceed `1.05 * max(tau_s)`.
pub const POST_PAD_SAFETY_FACTOR: f64 = 1.05;

/// Cosine-taper margin (fraction of window length) the caller is expected to
/// add to both sides of a scan window.
pub const TAPER_MARGIN_FRACTION: f64 = 0.06;

/// Current version of the on-disk binary LUT format.
pub const LUT_FORMAT_VERSION: u32 = 1;

/// Magic bytes at the start of every binary LUT file.
pub const LUT_MAGIC: [u8; 4] = *b"SLUT";

/// Default Levenberg-Marquardt damping parameters for the 1D Gaussian pick
/// fit.
pub mod lm_defaults {
    pub const MAX_ITERS: usize = 100;
    pub const INITIAL_LAMBDA: f64 = 1e-3;
    pub const LAMBDA_UP: f64 = 10.0;
    pub const LAMBDA_DOWN: f64 = 0.1;
    pub const CONVERGENCE_TOL: f64 = 1e-10;
}

/// Sentinel value used for an unpicked phase arrival (`pick_time`,
/// `pick_error`, `pick_value` all take this value on fit failure).
pub const PICK_SENTINEL: f64 = -1.0;

/// Width, in grid cells, of the 3D Gaussian smoother applied to the
/// marginal coalescence map before the local Gaussian location fit.
pub const GAUSSIAN_SMOOTH_SIGMA_CELLS: f64 = 0.8;
