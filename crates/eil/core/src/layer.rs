//! The Energy Intelligence Layer orchestrator.
//!
//! One `process()` call runs three stages:
//!
//! 1. **Statistical**: energy map → scalar mean → history → window set →
//!    (gated) adaptation → regime assignment → forecast
//! 2. **Physics**: raw energy map → [`RegimeDetector`]
//! 3. **Fusion**: [`FusionPolicy`] → [`EilDecision`]
//!
//! Only adaptation failures are recovered locally. Every other failure
//! propagates out of `process()`.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use eil_microadapt::{
    stats, DynamicDataCollection, LevelState, ModelUnit, ModelUnitAdaptation, ModelUnitSearch,
    RingBuffer, WindowSet,
};
use eil_physics::{RegimeDetector, ThermodynamicRegimeDetector};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::EilConfig;
use crate::context::{EilContext, StatisticalSummary};
use crate::decision::EilDecision;
use crate::error::{EilError, EilResult};
use crate::fusion::FusionPolicy;

pub const DEFAULT_CLUSTER: &str = "default";
pub const DEFAULT_NODE: &str = "default";

/// Diagnostic snapshot of the layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EilStats {
    pub detector: String,
    pub active_units: usize,
    pub max_units: usize,
    pub history_size: usize,
    pub history_capacity: usize,
    pub hierarchy_levels: usize,
    pub window_sizes: Vec<usize>,
    pub levels: BTreeMap<usize, LevelState>,
    pub consensus_threshold: f64,
    pub approval_threshold: f64,
    pub ticks_processed: u64,
}

/// Fuses MicroAdapt's statistical regime with a physics regime detector.
///
/// Single-owner and synchronous. Callers sharing one instance across
/// threads must serialise `process()` themselves.
pub struct EnergyIntelligenceLayer {
    config: EilConfig,
    policy: FusionPolicy,
    detector: Box<dyn RegimeDetector + Send>,
    collection: DynamicDataCollection,
    adaptation: ModelUnitAdaptation,
    search: ModelUnitSearch,
    energy_history: RingBuffer<f64>,
    ticks_processed: u64,
}

impl EnergyIntelligenceLayer {
    /// Validate `config` and build a layer around `detector`.
    pub fn new(config: EilConfig, detector: impl RegimeDetector + Send + 'static) -> EilResult<Self> {
        let config = config.validate()?;
        Ok(Self {
            policy: FusionPolicy::from_config(&config),
            detector: Box::new(detector),
            collection: DynamicDataCollection::new(&config.microadapt),
            adaptation: ModelUnitAdaptation::new(config.microadapt.clone()),
            search: ModelUnitSearch::from_config(&config.microadapt),
            energy_history: RingBuffer::new(config.history_capacity),
            ticks_processed: 0,
            config,
        })
    }

    /// Build a layer using the built-in [`ThermodynamicRegimeDetector`].
    pub fn with_thermodynamic_detector(config: EilConfig) -> EilResult<Self> {
        let detector = ThermodynamicRegimeDetector::new(config.detector.clone());
        Self::new(config, detector)
    }

    pub fn config(&self) -> &EilConfig {
        &self.config
    }

    pub fn policy(&self) -> &FusionPolicy {
        &self.policy
    }

    pub fn units(&self) -> &[ModelUnit] {
        self.adaptation.units()
    }

    /// Scalar energy readings, oldest first.
    pub fn energy_history(&self) -> Vec<f64> {
        self.energy_history.to_vec()
    }

    /// [`process`](Self::process) with the default cluster and node and no hypothesis.
    pub fn process_default(&mut self, energy_map: &Array2<f64>, domain: &str) -> EilResult<EilDecision> {
        self.process(energy_map, domain, DEFAULT_CLUSTER, DEFAULT_NODE, None)
    }

    /// Run one tick through both branches and the fusion policy.
    #[instrument(
        name = "eil.process",
        skip_all,
        fields(domain = %domain, cluster = %cluster, node = %node)
    )]
    pub fn process(
        &mut self,
        energy_map: &Array2<f64>,
        domain: &str,
        cluster: &str,
        node: &str,
        hypothesis: Option<serde_json::Value>,
    ) -> EilResult<EilDecision> {
        let started = Instant::now();
        if energy_map.is_empty() {
            return Err(EilError::EmptyEnergyMap);
        }
        let energy = energy_map.iter().sum::<f64>() / energy_map.len() as f64;
        if !energy.is_finite() {
            return Err(EilError::NonFiniteEnergy(energy));
        }

        let mut ctx = EilContext::new(energy_map.clone(), domain, cluster, node, hypothesis);

        let statistical = self.statistical_branch(energy, cluster, ctx.timestamp)?;
        let physics = self.detector.detect(energy_map, domain)?;
        let fusion = self.policy.fuse(statistical.confidence, &physics);

        debug!(
            regime = %fusion.unified_regime,
            validity = fusion.validity_score,
            approved = fusion.approved,
            risk = %fusion.risk_level,
            action = %fusion.recommended_action,
            "fused decision"
        );

        ctx.statistical = Some(statistical.clone());
        ctx.physics = Some(physics.clone());
        ctx.fusion = Some(fusion.clone());
        self.ticks_processed += 1;

        Ok(EilDecision {
            decision_id: Uuid::new_v4(),
            unified_regime: fusion.unified_regime,
            confidence: fusion.consensus_confidence,
            approved: fusion.approved,
            validity_score: fusion.validity_score,
            forecast_mean: statistical.forecast_mean,
            forecast_std: statistical.forecast_std,
            forecast_horizon: statistical.forecast_horizon,
            energy_state: energy,
            entropy_rate: physics.entropy_rate,
            temperature: physics.temperature,
            recommended_action: fusion.recommended_action,
            risk_level: fusion.risk_level,
            proof_required: fusion.proof_required,
            timestamp: Utc::now(),
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            hypothesis: ctx.hypothesis.clone(),
            context: ctx,
        })
    }

    fn statistical_branch(
        &mut self,
        energy: f64,
        cluster: &str,
        now: DateTime<Utc>,
    ) -> EilResult<StatisticalSummary> {
        self.energy_history.push(energy);
        self.collection.add_data_point(energy, now);

        let history_len = self.energy_history.len();
        let cold_start = history_len < self.config.min_history_for_decompose;
        let window_set = if cold_start {
            debug!(history_len, "cold start: using repeated-value window set");
            WindowSet::repeated(
                energy,
                self.config.min_history_for_decompose,
                self.collection.window_sizes(),
            )
        } else {
            self.collection.decompose(None)
        };
        let finest = window_set.finest_data()?;
        let (window_length, window_mean) = (finest.len(), stats::mean(finest));

        self.adaptation.set_cluster(cluster);
        if self.adaptation.is_empty() {
            let created = self.adaptation.initialize_model_units(
                &window_set,
                self.config.microadapt.latent_dim,
                self.config.microadapt.observation_dim,
            )?;
            info!(created, "bootstrapped model unit pool");
        }

        let adaptation = if history_len >= self.config.min_history_for_adaptation {
            match self.adaptation.adapt(&window_set) {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(error = %e, "adaptation failed; continuing with unadapted pool");
                    None
                }
            }
        } else {
            debug!(
                history_len,
                required = self.config.min_history_for_adaptation,
                "warm-up: skipping adaptation"
            );
            None
        };

        let assignment = self.search.assign_regime(&window_set, self.adaptation.units())?;
        self.adaptation.mark_used(&assignment.regime_id);
        let forecast = self.search.forecast(
            &window_set,
            &assignment,
            self.adaptation.units(),
            self.config.forecast_horizon,
        )?;

        Ok(StatisticalSummary {
            regime_id: assignment.regime_id,
            confidence: assignment.confidence,
            forecast_mean: forecast.mean(),
            forecast_std: forecast.std(),
            forecast_horizon: forecast.horizon(),
            active_units: self.adaptation.len(),
            cold_start,
            window_length,
            window_mean,
            adaptation,
        })
    }

    /// Pool size, history size, window levels and thresholds.
    pub fn get_stats(&self) -> EilStats {
        EilStats {
            detector: self.detector.name().to_string(),
            active_units: self.adaptation.len(),
            max_units: self.config.microadapt.max_units,
            history_size: self.energy_history.len(),
            history_capacity: self.energy_history.capacity(),
            hierarchy_levels: self.collection.hierarchy_levels(),
            window_sizes: self.collection.window_sizes().to_vec(),
            levels: self.collection.get_current_state(),
            consensus_threshold: self.policy.consensus_threshold,
            approval_threshold: self.policy.approval_threshold,
            ticks_processed: self.ticks_processed,
        }
    }
}

impl std::fmt::Debug for EnergyIntelligenceLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnergyIntelligenceLayer")
            .field("detector", &self.detector.name())
            .field("active_units", &self.adaptation.len())
            .field("history_size", &self.energy_history.len())
            .field("ticks_processed", &self.ticks_processed)
            .finish()
    }
}
