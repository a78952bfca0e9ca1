//! World Kernel: a host simulation of moving boxes driving the spatial grid.
//!
//! # Invariants
//! - Every live body is indexed; despawned bodies are removed from the grid
//!   before they are dropped.
//! - Each tick issues exactly one index pass, covering the bodies that moved.

mod rng;
pub mod world;

pub use rng::SplitMix64;
pub use world::{Body, World, WorldError};

pub fn crate_info() -> &'static str {
    "gridspace-kernel v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("kernel"));
    }
}
