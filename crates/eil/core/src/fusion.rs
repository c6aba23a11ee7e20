//! Fixed decision policy fusing the statistical and physics branches.
//!
//! ```text
//!   statistical confidence ─┐
//!                           ├─► consensus ─► approved ─► proof_required
//!   physics label/conf ─────┘       │
//!                                   ├─► unified regime
//!   entropy rate ─► risk level      └─► recommended action
//! ```

use eil_physics::{PhysicsRegime, RegimeState};
use serde::{Deserialize, Serialize};

use crate::config::EilConfig;

/// Weight of the statistical confidence in the validity score.
pub const STATISTICAL_WEIGHT: f64 = 0.4;

/// Weight of the physics confidence in the validity score.
pub const PHYSICS_WEIGHT: f64 = 0.6;

/// Entropy rate below which risk is low.
pub const LOW_RISK_CEILING: f64 = 0.05;

/// Entropy rate below which risk is medium.
pub const MEDIUM_RISK_CEILING: f64 = 0.15;

/// Risk classification from the physics entropy rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Breakpoints are exclusive: exactly 0.05 is medium, exactly 0.15 is high.
    pub fn from_entropy_rate(entropy_rate: f64) -> Self {
        if entropy_rate < LOW_RISK_CEILING {
            Self::Low
        } else if entropy_rate < MEDIUM_RISK_CEILING {
            Self::Medium
        } else {
            Self::High
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Action recommended to downstream consumers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    Proceed,
    Monitor,
    Investigate,
    Alert,
    Defer,
}

impl std::fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Proceed => write!(f, "proceed"),
            Self::Monitor => write!(f, "monitor"),
            Self::Investigate => write!(f, "investigate"),
            Self::Alert => write!(f, "alert"),
            Self::Defer => write!(f, "defer"),
        }
    }
}

/// Everything the policy derives from one pair of branch outputs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FusionOutcome {
    pub statistical_stable: bool,
    pub physics_stable: bool,
    pub consensus: bool,
    /// `min(statistical, physics)` confidence.
    pub consensus_confidence: f64,
    pub validity_score: f64,
    pub approved: bool,
    pub unified_regime: String,
    pub risk_level: RiskLevel,
    pub recommended_action: RecommendedAction,
    pub proof_required: bool,
}

/// Consensus and approval thresholds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FusionPolicy {
    pub consensus_threshold: f64,
    pub approval_threshold: f64,
}

impl Default for FusionPolicy {
    fn default() -> Self {
        Self::from_config(&EilConfig::default())
    }
}

impl FusionPolicy {
    pub fn new(consensus_threshold: f64, approval_threshold: f64) -> Self {
        Self {
            consensus_threshold,
            approval_threshold,
        }
    }

    pub fn from_config(config: &EilConfig) -> Self {
        Self::new(config.consensus_threshold, config.approval_threshold)
    }

    /// Fuse the statistical confidence with the physics regime state.
    pub fn fuse(&self, statistical_confidence: f64, physics: &RegimeState) -> FusionOutcome {
        let label = &physics.label;
        let physics_confidence = physics.confidence;

        let statistical_stable = statistical_confidence > self.consensus_threshold;
        let physics_stable = label.is_settled() && physics_confidence > self.consensus_threshold;
        let consensus = statistical_stable && physics_stable;
        let consensus_confidence = statistical_confidence.min(physics_confidence);

        let validity_score =
            STATISTICAL_WEIGHT * statistical_confidence + PHYSICS_WEIGHT * physics_confidence;
        let approved = validity_score >= self.approval_threshold && consensus;

        let suffix = if consensus { "confirmed" } else { "unconfirmed" };
        let unified_regime = format!("{label}_{suffix}");

        let risk_level = RiskLevel::from_entropy_rate(physics.entropy_rate);
        let recommended_action = recommend(label, consensus);
        let proof_required = risk_level == RiskLevel::High || !approved;

        FusionOutcome {
            statistical_stable,
            physics_stable,
            consensus,
            consensus_confidence,
            validity_score,
            approved,
            unified_regime,
            risk_level,
            recommended_action,
            proof_required,
        }
    }
}

/// First match wins; a stable label without consensus defers.
fn recommend(label: &PhysicsRegime, consensus: bool) -> RecommendedAction {
    match label {
        PhysicsRegime::Stable if consensus => RecommendedAction::Proceed,
        PhysicsRegime::Transitional => RecommendedAction::Monitor,
        PhysicsRegime::Chaotic | PhysicsRegime::PhaseChange => RecommendedAction::Investigate,
        PhysicsRegime::Anomalous => RecommendedAction::Alert,
        _ => RecommendedAction::Defer,
    }
}
