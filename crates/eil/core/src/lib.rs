//! # eil-core
//!
//! Orchestration and fusion for the Energy Intelligence Layer.
//!
//! [`EnergyIntelligenceLayer::process`] reduces an energy map to a scalar,
//! runs it through MicroAdapt for a statistical regime and forecast, asks a
//! [`RegimeDetector`](eil_physics::RegimeDetector) for a physics regime, and
//! fuses both through the fixed [`FusionPolicy`] into an [`EilDecision`].
//!
//! ```text
//!   energy map ──► mean ──► MicroAdapt ──► (regime, confidence, forecast) ─┐
//!        │                                                               ├─► FusionPolicy ─► EilDecision
//!        └──────────────► RegimeDetector ──► (label, confidence, ΔS) ─────┘
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod context;
pub mod decision;
pub mod error;
pub mod fusion;
pub mod layer;

// ── Re-exports ──────────────────────────────────────────────────────────

pub use config::EilConfig;
pub use context::{EilContext, StatisticalSummary};
pub use decision::EilDecision;
pub use error::{EilError, EilResult};
pub use fusion::{FusionOutcome, FusionPolicy, RecommendedAction, RiskLevel};
pub use layer::{EilStats, EnergyIntelligenceLayer, DEFAULT_CLUSTER, DEFAULT_NODE};
