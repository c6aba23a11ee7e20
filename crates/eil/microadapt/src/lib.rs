//! # eil-microadapt
//!
//! Statistical branch of the Energy Intelligence Layer.
//!
//! MicroAdapt turns a scalar energy signal into a regime assignment and a
//! short-horizon forecast:
//!
//! ```text
//!   scalar energy ──► DynamicDataCollection ──► WindowSet (multi-scale)
//!                                                  │
//!                     ModelUnitAdaptation ◄────────┤  (online learning)
//!                          │ unit pool             │
//!                          ▼                       ▼
//!                     ModelUnitSearch ──► RegimeAssignment + Forecast
//! ```
//!
//! The crate is synchronous and single-owner: one orchestrator holds the
//! collection and the pool and serialises all mutation.

#![deny(unsafe_code)]

pub mod adaptation;
pub mod collection;
pub mod config;
pub mod error;
pub mod model_unit;
pub mod ring;
pub mod search;
pub mod stats;
pub mod window;

// ── Re-exports ──────────────────────────────────────────────────────────

pub use adaptation::{AdaptationReport, ModelUnitAdaptation};
pub use collection::{moving_average, DynamicDataCollection, LevelState};
pub use config::MicroAdaptConfig;
pub use error::{MicroAdaptError, MicroAdaptResult};
pub use model_unit::{ModelUnit, ModelUnitParameters};
pub use ring::RingBuffer;
pub use search::{softmax, Forecast, ModelUnitSearch, RegimeAssignment};
pub use window::{HierarchicalWindow, WindowSet};
