use thiserror::Error;

/// Errors from the MicroAdapt statistical branch.
#[derive(Debug, Error)]
pub enum MicroAdaptError {
    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: String,
        actual: String,
    },

    #[error("invalid microadapt configuration: {0}")]
    InvalidConfig(String),

    #[error("window set has no finest-level data")]
    EmptyWindow,

    #[error("model unit pool is empty")]
    EmptyPool,

    #[error("model unit index {index} out of range for pool of {pool_size}")]
    UnknownUnitIndex { index: usize, pool_size: usize },

    #[error("numerical instability: {0}")]
    NumericalInstability(String),
}

/// Convenience type alias for MicroAdapt results.
pub type MicroAdaptResult<T> = Result<T, MicroAdaptError>;
