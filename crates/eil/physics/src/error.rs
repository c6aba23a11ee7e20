use thiserror::Error;

/// Errors from a physics regime detector.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("energy map is empty")]
    EmptyEnergyMap,

    #[error("energy map contains non-finite values: {0}")]
    NonFinite(String),

    #[error("detector backend failed: {0}")]
    Backend(String),
}

/// Convenience type alias for detector results.
pub type DetectorResult<T> = Result<T, DetectorError>;
