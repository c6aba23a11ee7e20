//! Model unit search: regime assignment and ensemble forecasting.
//!
//! ```text
//!   finest window ──► fitness per unit = 1 / (1 + MSE)
//!                        │
//!                        ▼
//!                  top-K (stable, descending)
//!                        │
//!                        ▼
//!                  softmax ──► RegimeAssignment
//!                        │
//!                        ▼
//!   Σ_k w_k · (E_k + step · dE_k)  ──► forecast + 95% band
//! ```

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::MicroAdaptConfig;
use crate::error::{MicroAdaptError, MicroAdaptResult};
use crate::model_unit::ModelUnit;
use crate::stats;
use crate::window::WindowSet;

/// Two-sided 95% Gaussian z-score.
pub const Z_95: f64 = 1.96;

/// Fraction of the prediction spread used as the interval standard deviation.
pub const INTERVAL_SPREAD_FRACTION: f64 = 0.1;

/// Probabilistic assignment of the current window to the unit pool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegimeAssignment {
    /// ID of the best-fitting unit.
    pub regime_id: String,
    /// Softmax over the top-K fitness values, aligned with `top_k_indices`.
    pub probabilities: Vec<f64>,
    /// Pool indices of the top-K units, best first.
    pub top_k_indices: Vec<usize>,
    pub model_unit_ids: Vec<String>,
    /// `max(probabilities)`.
    pub confidence: f64,
    /// Fitness of every unit in pool order.
    pub fitness_scores: Vec<f64>,
}

/// Ensemble forecast with a uniform confidence band.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub predictions: Vec<f64>,
    /// `(lower, upper)` per step.
    pub confidence_intervals: Vec<(f64, f64)>,
}

impl Forecast {
    pub fn horizon(&self) -> usize {
        self.predictions.len()
    }

    pub fn mean(&self) -> f64 {
        stats::mean(&self.predictions)
    }

    pub fn std(&self) -> f64 {
        stats::std_dev(&self.predictions)
    }
}

/// Numerically stable softmax: `exp(f - max f) / Σ exp(f - max f)`.
pub fn softmax(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Regime identification and short-horizon forecasting over a unit pool.
#[derive(Clone, Debug)]
pub struct ModelUnitSearch {
    top_k: usize,
}

impl ModelUnitSearch {
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k: top_k.max(1),
        }
    }

    pub fn from_config(config: &MicroAdaptConfig) -> Self {
        Self::new(config.top_k)
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Score every unit on the finest window and assign probabilities to the top-K.
    pub fn assign_regime(
        &self,
        current_window: &WindowSet,
        model_units: &[ModelUnit],
    ) -> MicroAdaptResult<RegimeAssignment> {
        if model_units.is_empty() {
            return Err(MicroAdaptError::EmptyPool);
        }
        let actual = current_window.finest_data()?;
        let fitness_scores: Vec<f64> = model_units.iter().map(|u| u.fitness(actual)).collect();

        let mut order: Vec<usize> = (0..fitness_scores.len()).collect();
        // Stable sort keeps pool order among equal fitness.
        order.sort_by(|&a, &b| {
            fitness_scores[b]
                .partial_cmp(&fitness_scores[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order.truncate(self.top_k);

        let top_fitness: Vec<f64> = order.iter().map(|&i| fitness_scores[i]).collect();
        let probabilities = softmax(&top_fitness);
        let confidence = probabilities.iter().copied().fold(0.0, f64::max);
        let model_unit_ids: Vec<String> = order
            .iter()
            .map(|&i| model_units[i].unit_id.clone())
            .collect();
        let regime_id = model_unit_ids[0].clone();

        trace!(regime = %regime_id, confidence, k = order.len(), "assigned regime");
        Ok(RegimeAssignment {
            regime_id,
            probabilities,
            top_k_indices: order,
            model_unit_ids,
            confidence,
            fitness_scores,
        })
    }

    /// Probability-weighted ensemble of per-unit linear extrapolations.
    pub fn forecast(
        &self,
        current_window: &WindowSet,
        regime_assignment: &RegimeAssignment,
        model_units: &[ModelUnit],
        forecast_steps: usize,
    ) -> MicroAdaptResult<Forecast> {
        let current = current_window.finest_data()?;
        let mut predictions = vec![0.0; forecast_steps];

        for (&idx, &weight) in regime_assignment
            .top_k_indices
            .iter()
            .zip(&regime_assignment.probabilities)
        {
            let unit = model_units
                .get(idx)
                .ok_or(MicroAdaptError::UnknownUnitIndex {
                    index: idx,
                    pool_size: model_units.len(),
                })?;
            let level = unit.predict_energy(current);
            let velocity = unit.predict_energy_derivative(current);
            for (step, slot) in predictions.iter_mut().enumerate() {
                *slot += weight * (level + step as f64 * velocity);
            }
        }

        let band = Z_95 * INTERVAL_SPREAD_FRACTION * stats::std_dev(&predictions);
        let confidence_intervals = predictions.iter().map(|p| (p - band, p + band)).collect();
        Ok(Forecast {
            predictions,
            confidence_intervals,
        })
    }
}

impl Default for ModelUnitSearch {
    fn default() -> Self {
        Self::new(MicroAdaptConfig::default().top_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_unit::ModelUnitParameters;
    use crate::window::HierarchicalWindow;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    /// A 1x1 unit predicting `level` with velocity `velocity`.
    fn unit(id: &str, level: f64, velocity: f64) -> ModelUnit {
        let params = ModelUnitParameters::new(
            array![velocity],
            Array2::zeros((1, 1)),
            array![level],
            array![[1.0]],
            array![0.0],
        )
        .unwrap();
        ModelUnit::new(id, Some(params))
    }

    fn window(data: Vec<f64>) -> WindowSet {
        WindowSet::new(vec![HierarchicalWindow::new(1, 60, data)]).unwrap()
    }

    #[test]
    fn softmax_sums_to_one_and_is_stable() {
        let p = softmax(&[1000.0, 1001.0, 1002.0]);
        assert_abs_diff_eq!(p.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(p[2] > p[1] && p[1] > p[0]);
        assert!(softmax(&[]).is_empty());
    }

    #[test]
    fn assign_regime_ranks_by_fitness() {
        let units = vec![
            unit("far", 20.0, 0.0),
            unit("exact", 10.0, 0.0),
            unit("near", 11.0, 0.0),
        ];
        let search = ModelUnitSearch::new(2);
        let a = search.assign_regime(&window(vec![10.0; 5]), &units).unwrap();
        assert_eq!(a.regime_id, "exact");
        assert_eq!(a.top_k_indices, vec![1, 2]);
        assert_eq!(a.model_unit_ids, vec!["exact", "near"]);
        assert_eq!(a.fitness_scores.len(), 3);
        assert_abs_diff_eq!(a.fitness_scores[1], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(a.fitness_scores[2], 0.5, epsilon = 1e-12);
        let expected = softmax(&[1.0, 0.5]);
        assert_abs_diff_eq!(a.probabilities[0], expected[0], epsilon = 1e-12);
        assert_abs_diff_eq!(a.confidence, expected[0], epsilon = 1e-12);
    }

    #[test]
    fn ties_keep_pool_order() {
        let units = vec![
            unit("a", 5.0, 0.0),
            unit("b", 5.0, 0.0),
            unit("c", 5.0, 0.0),
        ];
        let a = ModelUnitSearch::new(5)
            .assign_regime(&window(vec![5.0; 3]), &units)
            .unwrap();
        assert_eq!(a.top_k_indices, vec![0, 1, 2]);
        assert_eq!(a.regime_id, "a");
        assert_abs_diff_eq!(a.confidence, 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn assign_regime_errors() {
        let search = ModelUnitSearch::default();
        assert!(matches!(
            search.assign_regime(&window(vec![1.0]), &[]),
            Err(MicroAdaptError::EmptyPool)
        ));
        assert!(matches!(
            search.assign_regime(&WindowSet::default(), &[unit("a", 1.0, 0.0)]),
            Err(MicroAdaptError::EmptyWindow)
        ));
    }

    #[test]
    fn forecast_is_weighted_linear_extrapolation() {
        let units = vec![unit("up", 10.0, 1.0), unit("down", 10.0, -1.0)];
        let search = ModelUnitSearch::new(2);
        let ws = window(vec![10.0; 4]);
        let a = search.assign_regime(&ws, &units).unwrap();
        // Equal fitness -> equal weights -> slopes cancel.
        let f = search.forecast(&ws, &a, &units, 5).unwrap();
        assert_eq!(f.horizon(), 5);
        for p in &f.predictions {
            assert_abs_diff_eq!(*p, 10.0, epsilon = 1e-12);
        }
        for (lo, hi) in &f.confidence_intervals {
            assert_abs_diff_eq!(*lo, 10.0, epsilon = 1e-12);
            assert_abs_diff_eq!(*hi, 10.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn forecast_band_is_tenth_of_spread() {
        let units = vec![unit("up", 0.0, 2.0)];
        let search = ModelUnitSearch::new(1);
        let ws = window(vec![0.0; 3]);
        let a = search.assign_regime(&ws, &units).unwrap();
        let f = search.forecast(&ws, &a, &units, 3).unwrap();
        assert_eq!(f.predictions, vec![0.0, 2.0, 4.0]);
        let band = 1.96 * 0.1 * stats::std_dev(&[0.0, 2.0, 4.0]);
        assert_abs_diff_eq!(f.confidence_intervals[1].0, 2.0 - band, epsilon = 1e-12);
        assert_abs_diff_eq!(f.confidence_intervals[1].1, 2.0 + band, epsilon = 1e-12);
        assert_abs_diff_eq!(f.mean(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn forecast_rejects_stale_indices() {
        let units = vec![unit("a", 1.0, 0.0)];
        let search = ModelUnitSearch::new(1);
        let ws = window(vec![1.0]);
        let mut a = search.assign_regime(&ws, &units).unwrap();
        a.top_k_indices = vec![4];
        assert!(matches!(
            search.forecast(&ws, &a, &units, 3),
            Err(MicroAdaptError::UnknownUnitIndex { index: 4, .. })
        ));
    }

    #[test]
    fn zero_steps_gives_empty_forecast() {
        let units = vec![unit("a", 1.0, 0.0)];
        let search = ModelUnitSearch::new(1);
        let ws = window(vec![1.0]);
        let a = search.assign_regime(&ws, &units).unwrap();
        let f = search.forecast(&ws, &a, &units, 0).unwrap();
        assert!(f.predictions.is_empty());
        assert!(f.confidence_intervals.is_empty());
    }
}
