//! Rule-based thermodynamic regime detector.
//!
//! Derives three field statistics from the energy map and labels the regime
//! from fixed thresholds:
//!
//! - **entropy**: Shannon entropy of `|E|` normalised by `ln(cells)`
//! - **temperature**: mean squared finite difference along both axes
//! - **entropy rate**: `|H_t - H_{t-1}|` for the same domain
//!
//! Rules are checked in order: anomalous spike, phase change, chaotic,
//! transitional, stable.

use std::collections::HashMap;

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::detector::RegimeDetector;
use crate::error::{DetectorError, DetectorResult};
use crate::types::{PhysicsRegime, RegimeState};

const EPS: f64 = 1e-12;

/// Decision thresholds for [`ThermodynamicRegimeDetector`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorThresholds {
    /// Entropy rate above which the field is transitional.
    pub transitional_rate: f64,
    /// Entropy rate above which the field is chaotic.
    pub chaotic_rate: f64,
    /// Entropy rate above which the field is undergoing a phase change.
    pub phase_change_rate: f64,
    /// Relative roughness (`sqrt(temperature) / mean|E|`) marking a transitional field.
    pub transitional_roughness: f64,
    /// Relative roughness marking a chaotic field.
    pub chaotic_roughness: f64,
    /// Max z-score of a single cell that flags an anomalous spike.
    pub anomaly_z: f64,
}

impl Default for DetectorThresholds {
    fn default() -> Self {
        Self {
            transitional_rate: 0.01,
            chaotic_rate: 0.05,
            phase_change_rate: 0.15,
            transitional_roughness: 0.1,
            chaotic_roughness: 0.5,
            anomaly_z: 4.0,
        }
    }
}

/// Field statistics computed from one energy map.
#[derive(Clone, Debug, PartialEq)]
struct FieldStats {
    mean_energy: f64,
    entropy: f64,
    temperature: f64,
    max_gradient: f64,
    roughness: f64,
    max_z: f64,
}

/// Lightweight physics detector built on field entropy and gradient energy.
#[derive(Clone, Debug, Default)]
pub struct ThermodynamicRegimeDetector {
    thresholds: DetectorThresholds,
    previous_entropy: HashMap<String, f64>,
}

impl ThermodynamicRegimeDetector {
    pub fn new(thresholds: DetectorThresholds) -> Self {
        Self {
            thresholds,
            previous_entropy: HashMap::new(),
        }
    }

    pub fn thresholds(&self) -> &DetectorThresholds {
        &self.thresholds
    }

    /// Forget the entropy history of every domain.
    pub fn reset(&mut self) {
        self.previous_entropy.clear();
    }

    fn classify(&self, stats: &FieldStats, entropy_rate: f64) -> (PhysicsRegime, f64) {
        let t = &self.thresholds;
        if stats.max_z > t.anomaly_z {
            return (PhysicsRegime::Anomalous, saturate(stats.max_z / t.anomaly_z - 1.0));
        }
        if entropy_rate > t.phase_change_rate {
            return (
                PhysicsRegime::PhaseChange,
                saturate(entropy_rate / t.phase_change_rate - 1.0),
            );
        }
        let chaos = (entropy_rate / t.chaotic_rate).max(stats.roughness / t.chaotic_roughness);
        if chaos > 1.0 {
            return (PhysicsRegime::Chaotic, saturate(chaos - 1.0));
        }
        let pressure =
            (entropy_rate / t.transitional_rate).max(stats.roughness / t.transitional_roughness);
        if pressure > 1.0 {
            return (PhysicsRegime::Transitional, saturate(pressure - 1.0));
        }
        (PhysicsRegime::Stable, 0.5 + 0.49 * (1.0 - pressure))
    }
}

impl RegimeDetector for ThermodynamicRegimeDetector {
    fn detect(&mut self, energy_map: &Array2<f64>, domain: &str) -> DetectorResult<RegimeState> {
        let stats = field_stats(energy_map)?;
        let entropy_rate = self
            .previous_entropy
            .insert(domain.to_string(), stats.entropy)
            .map(|prev| (stats.entropy - prev).abs())
            .unwrap_or(0.0);

        let (label, confidence) = self.classify(&stats, entropy_rate);
        trace!(
            domain,
            label = %label,
            confidence,
            entropy = stats.entropy,
            entropy_rate,
            temperature = stats.temperature,
            "thermodynamic regime"
        );

        Ok(RegimeState::new(label, confidence, entropy_rate, stats.temperature)
            .with_feature("mean_energy", stats.mean_energy)
            .with_feature("max_gradient", stats.max_gradient)
            .with_feature("entropy", stats.entropy)
            .with_feature("roughness", stats.roughness))
    }

    fn name(&self) -> &str {
        "thermodynamic"
    }
}

/// Map a non-negative excess over a threshold into a confidence in `[0.5, 0.99)`.
fn saturate(excess: f64) -> f64 {
    0.5 + 0.49 * (1.0 - (-excess.max(0.0)).exp())
}

fn field_stats(energy_map: &Array2<f64>) -> DetectorResult<FieldStats> {
    if energy_map.is_empty() {
        return Err(DetectorError::EmptyEnergyMap);
    }
    if let Some(((r, c), v)) = energy_map.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(DetectorError::NonFinite(format!("cell ({r}, {c}) = {v}")));
    }

    let n = energy_map.len() as f64;
    let mean_energy = energy_map.sum() / n;
    let abs_total: f64 = energy_map.iter().map(|v| v.abs()).sum();
    let mean_abs = abs_total / n;

    let entropy = if energy_map.len() > 1 && abs_total > EPS {
        let h: f64 = energy_map
            .iter()
            .map(|v| v.abs() / abs_total)
            .filter(|p| *p > 0.0)
            .map(|p| -p * p.ln())
            .sum();
        h / n.ln()
    } else {
        0.0
    };

    let mut sq_sum = 0.0;
    let mut count = 0usize;
    let mut max_gradient: f64 = 0.0;
    for axis in [Axis(0), Axis(1)] {
        for lane in energy_map.lanes(axis) {
            for pair in lane.windows(2) {
                let d = pair[1] - pair[0];
                sq_sum += d * d;
                max_gradient = max_gradient.max(d.abs());
                count += 1;
            }
        }
    }
    let temperature = if count > 0 { sq_sum / count as f64 } else { 0.0 };
    let roughness = temperature.sqrt() / (mean_abs + EPS);

    let variance = energy_map
        .iter()
        .map(|v| (v - mean_energy).powi(2))
        .sum::<f64>()
        / n;
    let std = variance.sqrt();
    let max_z = if std > EPS {
        energy_map
            .iter()
            .map(|v| (v - mean_energy).abs() / std)
            .fold(0.0, f64::max)
    } else {
        0.0
    };

    Ok(FieldStats {
        mean_energy,
        entropy,
        temperature,
        max_gradient,
        roughness,
        max_z,
    })
}
