/// Errors from grid construction and configuration loading.
///
/// Indexing and querying have no failure path; boxes outside the grid simply
/// touch no partitions.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("partition dimension must be positive, got {0}")]
    InvalidPartitionDimension(u32),
    #[error("partition count must be positive, got {0}")]
    InvalidPartitionCount(u32),
    #[error("partition count {count} yields more partitions than can be allocated")]
    TooManyPartitions { count: u32 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
