//! The crate's configuration surface: one `Config` deserialised from a
//! TOML or YAML file, with every field overridable from the CLI.
//!
//! Grounded on `examples/original_source/QMigrate/io/data.py` and
//! `signal/scan.py`'s constructor keyword arguments, which this struct
//! collects into one typed, validated record rather than loose kwargs.

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("pick_threshold must be in [0, 1], got {0}")]
    PickThresholdOutOfRange(f64),

    #[error("percent_tt must be in [0, 1], got {0}")]
    PercentTtOutOfRange(f64),

    #[error("minimum_repeat ({minimum_repeat}) must be at least marginal_window ({marginal_window})")]
    RepeatLessThanMarginal { minimum_repeat: f64, marginal_window: f64 },

    #[error("n_cores must be at least 1, got {0}")]
    NoCores(usize),

    #[error("failed to read config file {path}: {source}")]
    Read { path: String, source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, source: String },
}

/// A bandpass filter's corner frequencies and order.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct BandpassFilterConfig {
    pub low_hz: f64,
    pub high_hz: f64,
    pub order: usize,
}

/// An STA/LTA window, in seconds.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct OnsetWindowConfig {
    pub sta_s: f64,
    pub lta_s: f64,
}

/// Decimation factors applied to a LUT's grid before scanning.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct DecimateConfig {
    pub dx: i64,
    pub dy: i64,
    pub dz: i64,
}

/// The full config surface, deserialised from the CLI's `--config` file
/// and overridable field-by-field by explicit CLI flags.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub p_bp_filter: BandpassFilterConfig,
    pub s_bp_filter: BandpassFilterConfig,
    pub p_onset_win: OnsetWindowConfig,
    pub s_onset_win: OnsetWindowConfig,
    pub detection_threshold: f64,
    pub marginal_window_s: f64,
    pub minimum_repeat_s: f64,
    pub pick_threshold: f64,
    pub percent_tt: f64,
    pub sampling_rate: f64,
    pub decimate: DecimateConfig,
    pub onset_centred: bool,
    pub normalise_coalescence: bool,
    pub time_step_s: f64,
    pub n_cores: usize,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("sampling_rate", self.sampling_rate),
            ("detection_threshold", self.detection_threshold),
            ("marginal_window_s", self.marginal_window_s),
            ("minimum_repeat_s", self.minimum_repeat_s),
            ("time_step_s", self.time_step_s),
        ] {
            if !(value > 0.0) {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        if !(0.0..=1.0).contains(&self.pick_threshold) {
            return Err(ConfigError::PickThresholdOutOfRange(self.pick_threshold));
        }
        if !(0.0..=1.0).contains(&self.percent_tt) {
            return Err(ConfigError::PercentTtOutOfRange(self.percent_tt));
        }
        if self.minimum_repeat_s < self.marginal_window_s {
            return Err(ConfigError::RepeatLessThanMarginal {
                minimum_repeat: self.minimum_repeat_s,
                marginal_window: self.marginal_window_s,
            });
        }
        if self.n_cores == 0 {
            return Err(ConfigError::NoCores(self.n_cores));
        }
        Ok(())
    }

    /// Loads a `Config` from a TOML or YAML file, inferred from its
    /// extension (`.yml`/`.yaml` -> YAML, anything else -> TOML).
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yml") | Some("yaml")
        );
        let config = if is_yaml {
            serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                source: e.to_string(),
            })?
        } else {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                source: e.to_string(),
            })?
        };
        Ok(config)
    }
}

impl From<ConfigError> for crate::error::SeisError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Read { .. } | ConfigError::Parse { .. } => Self::Io(e.to_string()),
            _ => Self::Config(e.to_string()),
        }
    }
}
