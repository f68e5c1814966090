//! Map projections and the regular 3D cell grid anchored in a projected
//! frame.

pub mod grid;
pub mod projector;

pub use grid::{Grid3D, GridError, GridSpec, SortOrder};
pub use projector::{Projection, Projector};
