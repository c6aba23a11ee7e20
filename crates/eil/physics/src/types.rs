use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Physics-derived operating regime label.
///
/// Serialises as the bare label string. Labels outside the known set are
/// preserved verbatim in [`PhysicsRegime::Other`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PhysicsRegime {
    Stable,
    Transitional,
    Chaotic,
    PhaseChange,
    Anomalous,
    Other(String),
}

impl PhysicsRegime {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Stable => "stable",
            Self::Transitional => "transitional",
            Self::Chaotic => "chaotic",
            Self::PhaseChange => "phase_change",
            Self::Anomalous => "anomalous",
            Self::Other(label) => label,
        }
    }

    /// Stable or transitional: the labels eligible for consensus.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Stable | Self::Transitional)
    }
}

impl From<&str> for PhysicsRegime {
    fn from(label: &str) -> Self {
        match label {
            "stable" => Self::Stable,
            "transitional" => Self::Transitional,
            "chaotic" => Self::Chaotic,
            "phase_change" => Self::PhaseChange,
            "anomalous" => Self::Anomalous,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for PhysicsRegime {
    fn from(label: String) -> Self {
        Self::from(label.as_str())
    }
}

impl From<PhysicsRegime> for String {
    fn from(regime: PhysicsRegime) -> Self {
        match regime {
            PhysicsRegime::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for PhysicsRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output of a physics regime detector, consumed verbatim by the fusion stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegimeState {
    pub label: PhysicsRegime,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Thermodynamic disorder growth, ≥ 0.
    pub entropy_rate: f64,
    /// Effective temperature.
    pub temperature: f64,
    /// Named features; opaque to the fusion stage.
    pub critical_features: BTreeMap<String, serde_json::Value>,
}

impl RegimeState {
    pub fn new(
        label: impl Into<PhysicsRegime>,
        confidence: f64,
        entropy_rate: f64,
        temperature: f64,
    ) -> Self {
        Self {
            label: label.into(),
            confidence,
            entropy_rate,
            temperature,
            critical_features: BTreeMap::new(),
        }
    }

    pub fn with_feature(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.critical_features.insert(name.into(), value.into());
        self
    }
}
