//! # eil-physics
//!
//! Physics branch of the Energy Intelligence Layer.
//!
//! Defines the [`RegimeDetector`] contract the orchestrator calls into, the
//! [`RegimeState`] it returns, and a rule-based
//! [`ThermodynamicRegimeDetector`] for deployments without a learned model.

#![deny(unsafe_code)]

pub mod detector;
pub mod error;
pub mod thermodynamic;
pub mod types;

// ── Re-exports ──────────────────────────────────────────────────────────

pub use detector::RegimeDetector;
pub use error::{DetectorError, DetectorResult};
pub use thermodynamic::{DetectorThresholds, ThermodynamicRegimeDetector};
pub use types::{PhysicsRegime, RegimeState};
