use chrono::{DateTime, Utc};
use eil_microadapt::AdaptationReport;
use eil_physics::RegimeState;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::fusion::FusionOutcome;

/// Statistical branch outputs for one tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatisticalSummary {
    pub regime_id: String,
    pub confidence: f64,
    pub forecast_mean: f64,
    pub forecast_std: f64,
    pub forecast_horizon: usize,
    pub active_units: usize,
    /// True when the tick used the synthetic cold-start window set.
    pub cold_start: bool,
    /// Length and mean of the finest window the branch ran on.
    pub window_length: usize,
    pub window_mean: f64,
    /// Present when adaptation ran and succeeded on this tick.
    pub adaptation: Option<AdaptationReport>,
}

/// Per-tick record, filled in stage by stage and embedded in the decision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EilContext {
    pub energy_map: Array2<f64>,
    pub domain: String,
    pub cluster: String,
    pub node: String,
    pub timestamp: DateTime<Utc>,
    /// Opaque caller payload, never read by the fusion policy.
    pub hypothesis: Option<serde_json::Value>,
    pub statistical: Option<StatisticalSummary>,
    /// Physics detector output, verbatim.
    pub physics: Option<RegimeState>,
    pub fusion: Option<FusionOutcome>,
}

impl EilContext {
    pub fn new(
        energy_map: Array2<f64>,
        domain: impl Into<String>,
        cluster: impl Into<String>,
        node: impl Into<String>,
        hypothesis: Option<serde_json::Value>,
    ) -> Self {
        Self {
            energy_map,
            domain: domain.into(),
            cluster: cluster.into(),
            node: node.into(),
            timestamp: Utc::now(),
            hypothesis,
            statistical: None,
            physics: None,
            fusion: None,
        }
    }

    /// All three stages have recorded their outputs.
    pub fn is_complete(&self) -> bool {
        self.statistical.is_some() && self.physics.is_some() && self.fusion.is_some()
    }
}
