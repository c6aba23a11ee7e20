use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::EilContext;
use crate::fusion::{RecommendedAction, RiskLevel};

/// Final output of one [`process`](crate::EnergyIntelligenceLayer::process) call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EilDecision {
    pub decision_id: Uuid,
    /// Physics label suffixed with `_confirmed` or `_unconfirmed`.
    pub unified_regime: String,
    /// Consensus confidence: the weaker of the two branch confidences.
    pub confidence: f64,
    pub approved: bool,
    pub validity_score: f64,
    pub forecast_mean: f64,
    pub forecast_std: f64,
    pub forecast_horizon: usize,
    /// Scalar mean of the tick's energy map.
    pub energy_state: f64,
    pub entropy_rate: f64,
    pub temperature: f64,
    pub recommended_action: RecommendedAction,
    pub risk_level: RiskLevel,
    pub proof_required: bool,
    pub timestamp: DateTime<Utc>,
    pub processing_time_ms: f64,
    pub hypothesis: Option<serde_json::Value>,
    pub context: EilContext,
}

impl EilDecision {
    pub fn regime_label(&self) -> &str {
        self.unified_regime
            .rsplit_once('_')
            .map(|(label, _)| label)
            .unwrap_or(&self.unified_regime)
    }
}
