//! MicroAdapt configuration.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{MicroAdaptError, MicroAdaptResult};

/// Default per-level window sizes in seconds (1 min, 10 min, 1 h).
pub const DEFAULT_WINDOW_SIZES: [usize; 3] = [60, 600, 3600];

/// Every recognised MicroAdapt option with its default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MicroAdaptConfig {
    /// Number of hierarchy levels. Forced to `window_sizes.len()` on mismatch.
    pub hierarchy_levels: usize,
    /// Per-level buffer capacity, finest first.
    pub window_sizes: Vec<usize>,
    /// Hard cap on the model unit pool.
    pub max_units: usize,
    /// Units created when the pool is bootstrapped.
    pub initial_units: usize,
    /// Units retained in a regime assignment.
    pub top_k: usize,
    /// Latent state dimension (d_s).
    pub latent_dim: usize,
    /// Observation dimension (d_x).
    pub observation_dim: usize,
    /// EMA rate for online adaptation, in (0, 1].
    pub learning_rate: f64,
    /// Standard deviation of the random parameter initialisation.
    pub init_scale: f64,
    /// Best-fitness floor below which adaptation spawns a new unit.
    pub novelty_threshold: f64,
    /// Seed for reproducible pool initialisation.
    pub seed: Option<u64>,
}

impl Default for MicroAdaptConfig {
    fn default() -> Self {
        Self {
            hierarchy_levels: DEFAULT_WINDOW_SIZES.len(),
            window_sizes: DEFAULT_WINDOW_SIZES.to_vec(),
            max_units: 100,
            initial_units: 10,
            top_k: 5,
            latent_dim: 4,
            observation_dim: 4,
            learning_rate: 0.1,
            init_scale: 0.05,
            novelty_threshold: 0.01,
            seed: None,
        }
    }
}

impl MicroAdaptConfig {
    /// Normalise and validate the configuration.
    pub fn validate(mut self) -> MicroAdaptResult<Self> {
        if self.window_sizes.is_empty() {
            return Err(MicroAdaptError::InvalidConfig(
                "window_sizes must name at least one level".into(),
            ));
        }
        if self.hierarchy_levels != self.window_sizes.len() {
            warn!(
                hierarchy_levels = self.hierarchy_levels,
                window_sizes = self.window_sizes.len(),
                "hierarchy_levels disagrees with window_sizes; using window_sizes length"
            );
            self.hierarchy_levels = self.window_sizes.len();
        }
        if self.window_sizes.iter().any(|&s| s == 0) {
            return Err(MicroAdaptError::InvalidConfig(
                "window sizes must be positive".into(),
            ));
        }
        if self.window_sizes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(MicroAdaptError::InvalidConfig(format!(
                "window sizes must be strictly increasing, got {:?}",
                self.window_sizes
            )));
        }
        if self.max_units == 0 {
            return Err(MicroAdaptError::InvalidConfig("max_units must be positive".into()));
        }
        // initial_units may exceed max_units; bootstrap clamps to the cap.
        if self.initial_units == 0 {
            return Err(MicroAdaptError::InvalidConfig("initial_units must be positive".into()));
        }
        if self.top_k == 0 {
            return Err(MicroAdaptError::InvalidConfig("top_k must be positive".into()));
        }
        if self.latent_dim == 0 || self.observation_dim == 0 {
            return Err(MicroAdaptError::InvalidConfig(
                "latent_dim and observation_dim must be positive".into(),
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(MicroAdaptError::InvalidConfig(format!(
                "learning_rate {} must be in (0, 1]",
                self.learning_rate
            )));
        }
        if !(self.init_scale.is_finite() && self.init_scale > 0.0) {
            return Err(MicroAdaptError::InvalidConfig(format!(
                "init_scale {} must be positive",
                self.init_scale
            )));
        }
        if !(0.0..=1.0).contains(&self.novelty_threshold) {
            return Err(MicroAdaptError::InvalidConfig(format!(
                "novelty_threshold {} must be in [0, 1]",
                self.novelty_threshold
            )));
        }
        Ok(self)
    }
}
