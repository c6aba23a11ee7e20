use eil_microadapt::MicroAdaptError;
use eil_physics::DetectorError;
use thiserror::Error;

/// Errors that can occur in the Energy Intelligence Layer.
#[derive(Debug, Error)]
pub enum EilError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("configuration parse error: {0}")]
    ConfigParse(String),

    #[error("energy map is empty")]
    EmptyEnergyMap,

    #[error("energy map reduces to a non-finite value: {0}")]
    NonFiniteEnergy(f64),

    #[error("statistical branch failed: {0}")]
    MicroAdapt(#[from] MicroAdaptError),

    #[error("physics branch failed: {0}")]
    Physics(#[from] DetectorError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for layer results.
pub type EilResult<T> = Result<T, EilError>;
