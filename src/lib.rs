//! Detection, triggering and location of microseismic events from a 4D
//! (3D-space x time) coalescence volume.
//!
//! The pipeline: waveform frames feed [`onset`], whose P/S onset functions
//! are stacked against a travel-time [`lut`] by [`scan`] into a coalescence
//! time series; [`trigger`] groups coalescence peaks into candidate events;
//! [`locate`] re-scans each candidate window and refines a hypocentre.

pub mod cli;
pub(crate) mod config;
pub(crate) mod constants;
pub(crate) mod error;
pub mod event;
pub mod geo;
pub(crate) mod logging;
pub mod lut;
pub(crate) mod math;
pub mod onset;
pub mod locate;
pub mod scan;
pub mod station;
pub mod trigger;
pub mod waveform;

pub use config::Config;
pub use error::SeisError;
pub use event::{Event, Pick};
pub use station::Station;
