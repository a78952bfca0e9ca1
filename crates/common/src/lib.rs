//! Shared types for the gridspace workspace.
//!
//! Everything that crosses a crate boundary lives here: entity identity,
//! axis-aligned bounding boxes, and the [`Spatial`] capability the grid
//! consumes from host entities.

mod types;

pub use types::{BoundingBox, EntityId, Spatial};

pub fn crate_info() -> &'static str {
    "gridspace-common v0.1.0"
}
