//! Layer configuration, loadable from TOML.

use std::path::Path;

use eil_microadapt::MicroAdaptConfig;
use eil_physics::DetectorThresholds;
use serde::{Deserialize, Serialize};

use crate::error::{EilError, EilResult};

/// Configuration for an [`EnergyIntelligenceLayer`](crate::EnergyIntelligenceLayer).
///
/// Tables come last so the struct serialises to valid TOML.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EilConfig {
    /// Per-branch confidence that counts as "stable".
    pub consensus_threshold: f64,
    /// Minimum validity score for approval.
    pub approval_threshold: f64,
    /// Scalar energy readings retained by the orchestrator.
    pub history_capacity: usize,
    /// History below this length uses a synthetic repeated-value window set.
    pub min_history_for_decompose: usize,
    /// History below this length skips unit adaptation.
    pub min_history_for_adaptation: usize,
    /// Forecast steps per decision.
    pub forecast_horizon: usize,
    pub microadapt: MicroAdaptConfig,
    /// Thresholds for the built-in thermodynamic detector.
    pub detector: DetectorThresholds,
}

impl Default for EilConfig {
    fn default() -> Self {
        Self {
            consensus_threshold: 0.85,
            approval_threshold: 0.75,
            history_capacity: 3600,
            min_history_for_decompose: 10,
            min_history_for_adaptation: 60,
            forecast_horizon: 60,
            microadapt: MicroAdaptConfig::default(),
            detector: DetectorThresholds::default(),
        }
    }
}

impl EilConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> EilResult<Self> {
        let config: EilConfig =
            toml::from_str(contents).map_err(|e| EilError::ConfigParse(e.to_string()))?;
        config.validate()
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> EilResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Render as pretty TOML.
    pub fn to_toml_string(&self) -> EilResult<String> {
        toml::to_string_pretty(self).map_err(|e| EilError::ConfigParse(e.to_string()))
    }

    /// Validate this config and the nested MicroAdapt config.
    pub fn validate(mut self) -> EilResult<Self> {
        for (name, value) in [
            ("consensus_threshold", self.consensus_threshold),
            ("approval_threshold", self.approval_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EilError::InvalidConfig(format!(
                    "{name} {value} must be in [0, 1]"
                )));
            }
        }
        if self.history_capacity == 0 {
            return Err(EilError::InvalidConfig("history_capacity must be positive".into()));
        }
        if self.min_history_for_decompose == 0 {
            return Err(EilError::InvalidConfig(
                "min_history_for_decompose must be positive".into(),
            ));
        }
        if self.forecast_horizon == 0 {
            return Err(EilError::InvalidConfig("forecast_horizon must be positive".into()));
        }
        // Both history gates must be reachable.
        let required = self
            .min_history_for_decompose
            .max(self.min_history_for_adaptation);
        if self.history_capacity < required {
            return Err(EilError::InvalidConfig(format!(
                "history_capacity {} is below the history gates (min_history_for_decompose {}, min_history_for_adaptation {})",
                self.history_capacity, self.min_history_for_decompose, self.min_history_for_adaptation
            )));
        }
        self.microadapt = self.microadapt.validate()?;
        Ok(self)
    }
}
