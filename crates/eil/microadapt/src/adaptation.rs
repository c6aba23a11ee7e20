//! Model unit adaptation: owns the unit pool and evolves it online.
//!
//! Each `adapt` call re-scores every unit on the finest window and nudges the
//! best unit toward the observed level, slope and increment variance with an
//! exponential-moving-average step. Updates are staged on a copy of the pool
//! and committed only when every parameter stays finite, so a failed step
//! leaves the pool exactly as it was.

use chrono::Utc;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::MicroAdaptConfig;
use crate::error::{MicroAdaptError, MicroAdaptResult};
use crate::model_unit::{ModelUnit, ModelUnitParameters};
use crate::stats;
use crate::window::WindowSet;

/// Outcome of one adaptation step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdaptationReport {
    pub best_unit_id: String,
    pub best_fitness: f64,
    /// ID of a unit spawned because no existing unit fitted well.
    pub spawned: Option<String>,
}

/// Summary statistics of the finest window that drive an update.
#[derive(Clone, Copy, Debug)]
struct Observed {
    mean: f64,
    std: f64,
    slope: f64,
    increment_variance: f64,
}

impl Observed {
    fn from_window(data: &[f64]) -> Self {
        Self {
            mean: stats::mean(data),
            std: stats::std_dev(data),
            slope: stats::slope(data),
            increment_variance: stats::increment_variance(data),
        }
    }
}

/// The model unit pool and its online learning rule.
pub struct ModelUnitAdaptation {
    config: MicroAdaptConfig,
    units: Vec<ModelUnit>,
    rng: StdRng,
    next_id: u64,
    /// `(d_s, d_x)` fixed at initialisation.
    dims: Option<(usize, usize)>,
    /// Stamped on units created from now on.
    cluster: Option<String>,
}

impl ModelUnitAdaptation {
    pub fn new(config: MicroAdaptConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            units: Vec::new(),
            rng,
            next_id: 1,
            dims: None,
            cluster: None,
        }
    }

    /// Tag units created by later bootstraps and spawns with `cluster`.
    pub fn set_cluster(&mut self, cluster: impl Into<String>) {
        self.cluster = Some(cluster.into());
    }

    pub fn units(&self) -> &[ModelUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn dims(&self) -> Option<(usize, usize)> {
        self.dims
    }

    /// Bootstrap `initial_units` units (never exceeding `max_units`) around the
    /// finest window of `initial_window_set`. Returns the number created.
    pub fn initialize_model_units(
        &mut self,
        initial_window_set: &WindowSet,
        d_s: usize,
        d_x: usize,
    ) -> MicroAdaptResult<usize> {
        if d_s == 0 || d_x == 0 {
            return Err(MicroAdaptError::DimensionMismatch {
                what: "d_s/d_x",
                expected: "positive".into(),
                actual: format!("d_s={}, d_x={}", d_s, d_x),
            });
        }
        if let Some((s, x)) = self.dims {
            if (s, x) != (d_s, d_x) {
                return Err(MicroAdaptError::DimensionMismatch {
                    what: "pool dimensions",
                    expected: format!("d_s={}, d_x={}", s, x),
                    actual: format!("d_s={}, d_x={}", d_s, d_x),
                });
            }
        }
        let observed = Observed::from_window(initial_window_set.finest_data()?);
        let room = self.config.max_units.saturating_sub(self.units.len());
        let count = self.config.initial_units.min(room);
        let spread = self.config.init_scale * (1.0 + observed.std + observed.mean.abs());
        if !spread.is_finite() {
            return Err(MicroAdaptError::NumericalInstability(format!(
                "bootstrap spread overflowed (mean={}, std={})",
                observed.mean, observed.std
            )));
        }

        let mut created = Vec::with_capacity(count);
        for _ in 0..count {
            let mut params = self.random_parameters(d_s, d_x)?;
            let jitter = self.gaussian(spread)?;
            calibrate_level(&mut params, observed.mean + jitter, 1.0);
            created.push(self.make_unit(params));
        }

        self.dims = Some((d_s, d_x));
        self.units.extend(created);
        info!(
            created = count,
            pool = self.units.len(),
            d_s,
            d_x,
            bootstrap_mean = observed.mean,
            "model unit pool initialized"
        );
        Ok(count)
    }

    /// One online-learning step against `window_set`.
    pub fn adapt(&mut self, window_set: &WindowSet) -> MicroAdaptResult<AdaptationReport> {
        if self.units.is_empty() {
            return Err(MicroAdaptError::EmptyPool);
        }
        let (d_s, d_x) = self.dims.ok_or(MicroAdaptError::EmptyPool)?;
        let actual = window_set.finest_data()?;
        let observed = Observed::from_window(actual);
        let lr = self.config.learning_rate;
        let now = Utc::now();

        let mut staged = self.units.clone();
        for unit in &mut staged {
            unit.fitness_score = unit.fitness(actual);
        }
        let best_idx = argmax_first(staged.iter().map(|u| u.fitness_score))
            .ok_or(MicroAdaptError::EmptyPool)?;
        let best_fitness = staged[best_idx].fitness_score;

        {
            let winner = &mut staged[best_idx];
            if let Some(params) = winner.parameters.as_mut() {
                calibrate_level(params, observed.mean, lr);
                relax_diffusion(params, observed.increment_variance, lr);
                calibrate_slope(params, observed.slope, lr);
                if !params.is_finite() {
                    return Err(MicroAdaptError::NumericalInstability(format!(
                        "unit {} produced non-finite parameters",
                        winner.unit_id
                    )));
                }
            }
            winner.fitness_score = winner.fitness(actual);
            winner.usage_count += 1;
            winner.last_used = now;
            winner.last_updated = now;
            winner.pattern_type = winner.classify_pattern().to_string();
        }
        let best_unit_id = staged[best_idx].unit_id.clone();

        let mut spawned = None;
        if best_fitness < self.config.novelty_threshold && staged.len() < self.config.max_units {
            let mut params = self.random_parameters(d_s, d_x)?;
            calibrate_level(&mut params, observed.mean, 1.0);
            calibrate_slope(&mut params, observed.slope, 1.0);
            if !params.is_finite() {
                return Err(MicroAdaptError::NumericalInstability(
                    "spawned unit produced non-finite parameters".into(),
                ));
            }
            let mut unit = self.make_unit(params);
            unit.fitness_score = unit.fitness(actual);
            debug!(unit = %unit.unit_id, best_fitness, "spawned model unit for novel pattern");
            spawned = Some(unit.unit_id.clone());
            staged.push(unit);
        }

        self.units = staged;
        debug!(
            unit = %best_unit_id,
            best_fitness,
            pool = self.units.len(),
            "adapted model unit pool"
        );
        Ok(AdaptationReport {
            best_unit_id,
            best_fitness,
            spawned,
        })
    }

    /// Record that `unit_id` won a regime assignment.
    pub fn mark_used(&mut self, unit_id: &str) -> bool {
        match self.units.iter_mut().find(|u| u.unit_id == unit_id) {
            Some(unit) => {
                unit.last_used = Utc::now();
                true
            }
            None => false,
        }
    }

    // ── Private ─────────────────────────────────────────────────────

    fn make_unit(&mut self, params: ModelUnitParameters) -> ModelUnit {
        let id = format!("mu-{:04}", self.next_id);
        self.next_id += 1;
        let unit = ModelUnit::new(id, Some(params));
        match &self.cluster {
            Some(cluster) => unit.with_cluster(cluster.clone()),
            None => unit,
        }
    }

    fn gaussian(&mut self, std_dev: f64) -> MicroAdaptResult<f64> {
        let normal = Normal::new(0.0, std_dev)
            .map_err(|e| MicroAdaptError::InvalidConfig(format!("normal({}): {}", std_dev, e)))?;
        Ok(normal.sample(&mut self.rng))
    }

    fn random_parameters(&mut self, d_s: usize, d_x: usize) -> MicroAdaptResult<ModelUnitParameters> {
        let normal = Normal::new(0.0, self.config.init_scale).map_err(|e| {
            MicroAdaptError::InvalidConfig(format!("init_scale {}: {}", self.config.init_scale, e))
        })?;
        let rng = &mut self.rng;
        let p = Array1::from_shape_fn(d_s, |_| normal.sample(&mut *rng));
        let a = Array2::from_shape_fn((d_s, d_s), |_| normal.sample(&mut *rng));
        let q = (&a + &a.t()) * 0.5;
        let u = Array1::from_shape_fn(d_x, |_| normal.sample(&mut *rng));
        let v = Array2::from_shape_fn((d_x, d_s), |_| normal.sample(&mut *rng));
        let s_star = Array1::from_shape_fn(d_s, |_| normal.sample(&mut *rng));
        ModelUnitParameters::new(p, q, u, v, s_star)
    }
}

/// Index of the largest value, first on ties.
fn argmax_first(values: impl Iterator<Item = f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Shift `u` uniformly so the mean observation closes `rate` of the gap to `target`.
fn calibrate_level(params: &mut ModelUnitParameters, target: f64, rate: f64) {
    let current = params.observation_at_reference().mean().unwrap_or(0.0);
    let shift = rate * (target - current);
    params.u_mut().mapv_inplace(|x| x + shift);
}

/// Relax `Q` toward an isotropic matrix whose trace equals `increment_variance`.
fn relax_diffusion(params: &mut ModelUnitParameters, increment_variance: f64, rate: f64) {
    let d_s = params.latent_dim();
    let target = Array2::<f64>::eye(d_s) * (increment_variance / d_s as f64);
    let q = params.q_mut();
    *q = &*q * (1.0 - rate) + target * rate;
}

/// Move `p` along `c = Vᵀ·1 / d_x` so the mean velocity closes `rate` of the gap to `target`.
fn calibrate_slope(params: &mut ModelUnitParameters, target: f64, rate: f64) {
    let d_x = params.observation_dim() as f64;
    let c = params.v().sum_axis(ndarray::Axis(0)) / d_x;
    let cc = c.dot(&c);
    if cc < f64::EPSILON {
        return;
    }
    let current = params.observation_velocity().mean().unwrap_or(0.0);
    let step = rate * (target - current) / cc;
    let p = params.p_mut();
    p.scaled_add(step, &c);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::HierarchicalWindow;
    use approx::assert_abs_diff_eq;

    fn seeded(seed: u64) -> ModelUnitAdaptation {
        ModelUnitAdaptation::new(MicroAdaptConfig {
            seed: Some(seed),
            ..MicroAdaptConfig::default()
        })
    }

    fn ramp(start: f64, step: f64, n: usize) -> WindowSet {
        let data: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
        WindowSet::new(vec![HierarchicalWindow::new(1, 60, data)]).unwrap()
    }

    #[test]
    fn initialize_creates_configured_units_with_consistent_dims() {
        let mut pool = seeded(7);
        let ws = WindowSet::repeated(10.0, 10, &[60, 600, 3600]);
        let created = pool.initialize_model_units(&ws, 4, 3).unwrap();
        assert_eq!(created, 10);
        assert_eq!(pool.len(), 10);
        assert_eq!(pool.dims(), Some((4, 3)));
        for unit in pool.units() {
            let params = unit.parameters.as_ref().unwrap();
            assert_eq!(params.latent_dim(), 4);
            assert_eq!(params.observation_dim(), 3);
            assert_eq!(params.v().dim(), (3, 4));
            // Q is symmetric
            assert_abs_diff_eq!(params.q()[[0, 1]], params.q()[[1, 0]], epsilon = 1e-12);
        }
        let ids: std::collections::HashSet<_> = pool.units().iter().map(|u| &u.unit_id).collect();
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn initialized_units_predict_near_bootstrap_mean() {
        let mut pool = seeded(11);
        let ws = WindowSet::repeated(10.0, 10, &[60]);
        pool.initialize_model_units(&ws, 4, 4).unwrap();
        for unit in pool.units() {
            assert!((unit.predict_energy(&[]) - 10.0).abs() < 3.0);
        }
    }

    #[test]
    fn initialize_respects_max_units() {
        let mut pool = ModelUnitAdaptation::new(MicroAdaptConfig {
            max_units: 12,
            initial_units: 10,
            seed: Some(1),
            ..MicroAdaptConfig::default()
        });
        let ws = WindowSet::repeated(1.0, 10, &[60]);
        assert_eq!(pool.initialize_model_units(&ws, 2, 2).unwrap(), 10);
        assert_eq!(pool.initialize_model_units(&ws, 2, 2).unwrap(), 2);
        assert_eq!(pool.initialize_model_units(&ws, 2, 2).unwrap(), 0);
        assert_eq!(pool.len(), 12);
    }

    #[test]
    fn initialize_overflowing_spread_is_numerical_instability() {
        let mut pool = seeded(5);
        let data = vec![1e200, -1e200, 1e200, -1e200];
        let ws = WindowSet::new(vec![HierarchicalWindow::new(1, 60, data)]).unwrap();
        let err = pool.initialize_model_units(&ws, 2, 2).unwrap_err();
        assert!(matches!(err, MicroAdaptError::NumericalInstability(_)));
        assert!(pool.is_empty());
        assert_eq!(pool.dims(), None);
    }

    #[test]
    fn created_units_carry_cluster_tag() {
        let mut pool = ModelUnitAdaptation::new(MicroAdaptConfig {
            initial_units: 2,
            max_units: 3,
            novelty_threshold: 0.5,
            seed: Some(6),
            ..MicroAdaptConfig::default()
        });
        pool.set_cluster("east");
        pool.initialize_model_units(&WindowSet::repeated(0.0, 10, &[60]), 2, 2)
            .unwrap();
        assert!(pool.units().iter().all(|u| u.cluster_name.as_deref() == Some("east")));

        pool.set_cluster("west");
        let report = pool.adapt(&WindowSet::repeated(1000.0, 10, &[60])).unwrap();
        let spawned = report.spawned.unwrap();
        let unit = pool.units().iter().find(|u| u.unit_id == spawned).unwrap();
        assert_eq!(unit.cluster_name.as_deref(), Some("west"));
    }

    #[test]
    fn initialize_rejects_changed_dims() {
        let mut pool = seeded(3);
        let ws = WindowSet::repeated(1.0, 10, &[60]);
        pool.initialize_model_units(&ws, 2, 2).unwrap();
        assert!(pool.initialize_model_units(&ws, 3, 2).is_err());
    }

    #[test]
    fn same_seed_same_pool() {
        let ws = WindowSet::repeated(5.0, 10, &[60]);
        let mut a = seeded(42);
        let mut b = seeded(42);
        a.initialize_model_units(&ws, 3, 3).unwrap();
        b.initialize_model_units(&ws, 3, 3).unwrap();
        for (ua, ub) in a.units().iter().zip(b.units()) {
            assert_eq!(ua.parameters, ub.parameters);
        }
    }

    #[test]
    fn adapt_on_empty_pool_fails() {
        let mut pool = seeded(1);
        let ws = WindowSet::repeated(1.0, 10, &[60]);
        assert!(matches!(pool.adapt(&ws), Err(MicroAdaptError::EmptyPool)));
    }

    #[test]
    fn adapt_on_empty_window_leaves_pool_untouched() {
        let mut pool = seeded(1);
        pool.initialize_model_units(&WindowSet::repeated(1.0, 10, &[60]), 2, 2)
            .unwrap();
        let before: Vec<_> = pool.units().iter().map(|u| u.parameters.clone()).collect();
        assert!(pool.adapt(&WindowSet::default()).is_err());
        let after: Vec<_> = pool.units().iter().map(|u| u.parameters.clone()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn adapt_moves_winner_toward_observed_level() {
        let mut pool = seeded(5);
        pool.initialize_model_units(&WindowSet::repeated(10.0, 10, &[60]), 4, 4)
            .unwrap();
        let target = WindowSet::repeated(12.0, 20, &[60]);

        let report = pool.adapt(&target).unwrap();
        let winner = pool
            .units()
            .iter()
            .find(|u| u.unit_id == report.best_unit_id)
            .unwrap();
        let before_gap = (1.0 / report.best_fitness - 1.0).sqrt();
        let after_gap = (winner.predict_energy(&[]) - 12.0).abs();
        assert!(after_gap < before_gap);
        assert_eq!(winner.usage_count, 1);
        assert!(winner.fitness_score > report.best_fitness);
    }

    #[test]
    fn repeated_adaptation_tracks_slope() {
        let mut pool = ModelUnitAdaptation::new(MicroAdaptConfig {
            learning_rate: 0.5,
            seed: Some(9),
            ..MicroAdaptConfig::default()
        });
        let ws = ramp(0.0, 0.5, 60);
        pool.initialize_model_units(&ws, 4, 4).unwrap();
        let mut last = None;
        for _ in 0..30 {
            last = Some(pool.adapt(&ws).unwrap());
        }
        let id = last.unwrap().best_unit_id;
        let winner = pool.units().iter().find(|u| u.unit_id == id).unwrap();
        assert_abs_diff_eq!(winner.predict_energy_derivative(&[]), 0.5, epsilon = 0.05);
        assert_eq!(winner.pattern_type, "ascending");
    }

    #[test]
    fn poor_fit_spawns_unit_below_cap() {
        let mut pool = ModelUnitAdaptation::new(MicroAdaptConfig {
            initial_units: 2,
            max_units: 3,
            novelty_threshold: 0.5,
            seed: Some(2),
            ..MicroAdaptConfig::default()
        });
        pool.initialize_model_units(&WindowSet::repeated(0.0, 10, &[60]), 2, 2)
            .unwrap();
        let far = WindowSet::repeated(1000.0, 10, &[60]);

        let report = pool.adapt(&far).unwrap();
        let spawned = report.spawned.expect("novel pattern should spawn");
        assert_eq!(pool.len(), 3);
        let unit = pool.units().iter().find(|u| u.unit_id == spawned).unwrap();
        assert_abs_diff_eq!(unit.predict_energy(&[]), 1000.0, epsilon = 1e-6);

        // At the cap nothing more is spawned.
        let far2 = WindowSet::repeated(-5000.0, 10, &[60]);
        let report = pool.adapt(&far2).unwrap();
        assert!(report.spawned.is_none());
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn mark_used_finds_unit() {
        let mut pool = seeded(4);
        pool.initialize_model_units(&WindowSet::repeated(1.0, 10, &[60]), 2, 2)
            .unwrap();
        let id = pool.units()[0].unit_id.clone();
        assert!(pool.mark_used(&id));
        assert!(!pool.mark_used("mu-missing"));
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax_first([0.2, 0.9, 0.9, 0.1].into_iter()), Some(1));
        assert_eq!(argmax_first(std::iter::empty()), None);
    }
}
