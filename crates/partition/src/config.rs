use serde::{Deserialize, Serialize};
use std::io::BufReader;
use std::path::Path;

use crate::error::GridError;

/// Largest accepted `partition_count`: about a billion partitions in total.
pub const MAX_PARTITION_COUNT: u32 = 1024;

/// Grid resolution: the side of one partition cube and the number of
/// partitions along each axis. Both are fixed for the lifetime of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Side length of a single partition, in world units.
    pub partition_dimension: u32,
    /// Partitions per axis; the grid holds `partition_count³` partitions.
    pub partition_count: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            partition_dimension: 16,
            partition_count: 16,
        }
    }
}

impl GridConfig {
    pub fn new(partition_dimension: u32, partition_count: u32) -> Self {
        Self {
            partition_dimension,
            partition_count,
        }
    }

    /// Reject zero-sized partitions, an empty grid, and counts above
    /// [`MAX_PARTITION_COUNT`].
    pub fn validate(&self) -> Result<(), GridError> {
        if self.partition_dimension == 0 {
            return Err(GridError::InvalidPartitionDimension(self.partition_dimension));
        }
        if self.partition_count == 0 {
            return Err(GridError::InvalidPartitionCount(self.partition_count));
        }
        if self.partition_count > MAX_PARTITION_COUNT {
            return Err(GridError::TooManyPartitions {
                count: self.partition_count,
            });
        }
        self.total_partitions()?;
        Ok(())
    }

    /// Number of partitions the grid allocates (`partition_count³`).
    pub fn total_partitions(&self) -> Result<usize, GridError> {
        let n = self.partition_count as usize;
        n.checked_mul(n)
            .and_then(|sq| sq.checked_mul(n))
            .ok_or(GridError::TooManyPartitions {
                count: self.partition_count,
            })
    }

    /// Side of the whole covered cube.
    pub fn world_extent(&self) -> f64 {
        self.partition_dimension as f64 * self.partition_count as f64
    }

    /// Parse and validate a JSON config. Missing fields fall back to defaults.
    pub fn from_json_str(json: &str) -> Result<Self, GridError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GridError> {
        let file = std::fs::File::open(path.as_ref())?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        tracing::debug!(
            path = %path.as_ref().display(),
            partition_dimension = config.partition_dimension,
            partition_count = config.partition_count,
            "grid config loaded"
        );
        Ok(config)
    }
}
