//! Model units: one candidate regime as a linear-Gaussian latent system.
//!
//! A unit with parameters `(p, Q, u, V, s*)` describes
//!
//! ```text
//!   ds/dt = p + Q·s        (latent drift + diffusion, d_s)
//!   x     = u + V·s        (observation projection, d_x)
//! ```
//!
//! All predictions are evaluated at the fixed reference state `s*`; the
//! `window` arguments are accepted for interface parity and are not read.

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{MicroAdaptError, MicroAdaptResult};
use crate::stats;

// ── Parameters ──────────────────────────────────────────────────────────

/// Shape-checked parameters of one linear-Gaussian dynamical system.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParameters", into = "RawParameters")]
pub struct ModelUnitParameters {
    p: Array1<f64>,
    q: Array2<f64>,
    u: Array1<f64>,
    v: Array2<f64>,
    s_star: Array1<f64>,
}

#[derive(Serialize, Deserialize)]
struct RawParameters {
    p: Array1<f64>,
    #[serde(rename = "Q")]
    q: Array2<f64>,
    u: Array1<f64>,
    #[serde(rename = "V")]
    v: Array2<f64>,
    s_star: Array1<f64>,
}

impl TryFrom<RawParameters> for ModelUnitParameters {
    type Error = MicroAdaptError;

    fn try_from(raw: RawParameters) -> MicroAdaptResult<Self> {
        Self::new(raw.p, raw.q, raw.u, raw.v, raw.s_star)
    }
}

impl From<ModelUnitParameters> for RawParameters {
    fn from(params: ModelUnitParameters) -> Self {
        Self {
            p: params.p,
            q: params.q,
            u: params.u,
            v: params.v,
            s_star: params.s_star,
        }
    }
}

fn shape(rows: usize, cols: usize) -> String {
    format!("{}x{}", rows, cols)
}

impl ModelUnitParameters {
    /// Build parameters, rejecting any inconsistent shapes.
    ///
    /// `d_s` is taken from `p`, `d_x` from `u`.
    pub fn new(
        p: Array1<f64>,
        q: Array2<f64>,
        u: Array1<f64>,
        v: Array2<f64>,
        s_star: Array1<f64>,
    ) -> MicroAdaptResult<Self> {
        let d_s = p.len();
        let d_x = u.len();
        if d_s == 0 || d_x == 0 {
            return Err(MicroAdaptError::DimensionMismatch {
                what: "p/u",
                expected: "non-empty".into(),
                actual: format!("d_s={}, d_x={}", d_s, d_x),
            });
        }
        if q.dim() != (d_s, d_s) {
            return Err(MicroAdaptError::DimensionMismatch {
                what: "Q",
                expected: shape(d_s, d_s),
                actual: shape(q.nrows(), q.ncols()),
            });
        }
        if v.dim() != (d_x, d_s) {
            return Err(MicroAdaptError::DimensionMismatch {
                what: "V",
                expected: shape(d_x, d_s),
                actual: shape(v.nrows(), v.ncols()),
            });
        }
        if s_star.len() != d_s {
            return Err(MicroAdaptError::DimensionMismatch {
                what: "s_star",
                expected: d_s.to_string(),
                actual: s_star.len().to_string(),
            });
        }
        Ok(Self { p, q, u, v, s_star })
    }

    /// Latent dimension d_s.
    pub fn latent_dim(&self) -> usize {
        self.p.len()
    }

    /// Observation dimension d_x.
    pub fn observation_dim(&self) -> usize {
        self.u.len()
    }

    pub fn p(&self) -> &Array1<f64> {
        &self.p
    }

    pub fn q(&self) -> &Array2<f64> {
        &self.q
    }

    pub fn u(&self) -> &Array1<f64> {
        &self.u
    }

    pub fn v(&self) -> &Array2<f64> {
        &self.v
    }

    pub fn s_star(&self) -> &Array1<f64> {
        &self.s_star
    }

    /// `x̂ = u + V·s*`.
    pub fn observation_at_reference(&self) -> Array1<f64> {
        &self.u + &self.v.dot(&self.s_star)
    }

    /// `dx/dt = V·(p + Q·s*)`.
    pub fn observation_velocity(&self) -> Array1<f64> {
        let ds = &self.p + &self.q.dot(&self.s_star);
        self.v.dot(&ds)
    }

    /// Whether every entry is finite.
    pub fn is_finite(&self) -> bool {
        self.p.iter().all(|x| x.is_finite())
            && self.q.iter().all(|x| x.is_finite())
            && self.u.iter().all(|x| x.is_finite())
            && self.v.iter().all(|x| x.is_finite())
            && self.s_star.iter().all(|x| x.is_finite())
    }

    pub(crate) fn p_mut(&mut self) -> &mut Array1<f64> {
        &mut self.p
    }

    pub(crate) fn q_mut(&mut self) -> &mut Array2<f64> {
        &mut self.q
    }

    pub(crate) fn u_mut(&mut self) -> &mut Array1<f64> {
        &mut self.u
    }
}

// ── Model Unit ──────────────────────────────────────────────────────────

/// A learned regime pattern in the energy signal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelUnit {
    pub unit_id: String,
    /// `None` for a unit that has not been parameterised yet; it predicts `0.0`.
    pub parameters: Option<ModelUnitParameters>,
    pub pattern_type: String,
    pub fitness_score: f64,
    pub usage_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub cluster_name: Option<String>,
}

impl ModelUnit {
    pub fn new(unit_id: impl Into<String>, parameters: Option<ModelUnitParameters>) -> Self {
        let now = Utc::now();
        let mut unit = Self {
            unit_id: unit_id.into(),
            parameters,
            pattern_type: String::new(),
            fitness_score: 0.0,
            usage_count: 0,
            created_at: now,
            last_used: now,
            last_updated: now,
            cluster_name: None,
        };
        unit.pattern_type = unit.classify_pattern().to_string();
        unit
    }

    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster_name = Some(cluster.into());
        self
    }

    /// Scalar observation estimate at the reference state.
    pub fn predict_energy(&self, _window: &[f64]) -> f64 {
        match &self.parameters {
            Some(params) => params.observation_at_reference().mean().unwrap_or(0.0),
            None => 0.0,
        }
    }

    /// Trace of the diffusion matrix.
    pub fn predict_entropy(&self, _window: &[f64]) -> f64 {
        match &self.parameters {
            Some(params) => params.q().diag().sum(),
            None => 0.0,
        }
    }

    /// Scalar observation velocity at the reference state.
    pub fn predict_energy_derivative(&self, _window: &[f64]) -> f64 {
        match &self.parameters {
            Some(params) => params.observation_velocity().mean().unwrap_or(0.0),
            None => 0.0,
        }
    }

    /// `1 / (1 + MSE)` of the scalar prediction broadcast against `actual`.
    pub fn fitness(&self, actual: &[f64]) -> f64 {
        let predicted = self.predict_energy(actual);
        1.0 / (1.0 + stats::mse_against_scalar(actual, predicted))
    }

    /// Label from the sign of the unit's observation velocity.
    pub fn classify_pattern(&self) -> &'static str {
        let d = self.predict_energy_derivative(&[]);
        if d > PATTERN_SLOPE_EPSILON {
            "ascending"
        } else if d < -PATTERN_SLOPE_EPSILON {
            "descending"
        } else {
            "steady"
        }
    }
}

/// Velocities within this band classify as `"steady"`.
const PATTERN_SLOPE_EPSILON: f64 = 1e-6;
