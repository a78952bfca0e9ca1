//! Spatial partitioning: a fixed-resolution uniform grid over a cube of world space.
//!
//! # Invariants
//! - Partitions are created once at construction and never move; only their
//!   membership sets change.
//! - After every index pass, each indexed entity is listed by exactly the
//!   partitions recorded for it in the reverse index, once each.
//! - Queries never mutate the grid.
//!
//! # Threading
//! The grid performs no locking. Hosts that step the simulation in parallel
//! must serialize index passes and queries against a given grid.

mod config;
mod error;
mod grid;

pub use config::{GridConfig, MAX_PARTITION_COUNT};
pub use error::GridError;
pub use grid::{ClampMode, GridStats, Partition, PartitionKey, SpatialGrid};

pub fn crate_info() -> &'static str {
    "gridspace-partition v0.1.0"
}
