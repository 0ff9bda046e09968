//! What the strategy search may change and what it maximizes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FedBatchError, Result};
use crate::model::{ModelParameters, State};
use crate::parameters::Bounds;

/// Default search horizon (h).
pub const DEFAULT_HORIZON: f64 = 48.0;

/// Default working-volume limit (L).
pub const DEFAULT_MAX_VOLUME: f64 = 5.0;

/// Terminal quantity to maximize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Final product concentration P
    MaxProduct,
    /// Final biomass concentration X
    MaxBiomass,
}

impl Objective {
    /// The maximized quantity in a state.
    pub fn value(&self, state: &State) -> f64 {
        match self {
            Objective::MaxProduct => state.p,
            Objective::MaxBiomass => state.x,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Objective::MaxProduct => "max_product",
            Objective::MaxBiomass => "max_biomass",
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Objective {
    type Err = FedBatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "max_product" => Ok(Objective::MaxProduct),
            "max_biomass" => Ok(Objective::MaxBiomass),
            other => Err(FedBatchError::invalid(format!(
                "unknown objective: {} (expected max_product or max_biomass)",
                other
            ))),
        }
    }
}

/// Operational parameters the strategy search may vary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Tunable {
    #[serde(rename = "ti")]
    Ti,
    #[serde(rename = "k1")]
    K1,
    #[serde(rename = "k2")]
    K2,
    #[serde(rename = "b")]
    B,
    #[serde(rename = "Sf")]
    Sf,
}

impl Tunable {
    pub const ALL: [Tunable; 5] = [Tunable::Ti, Tunable::K1, Tunable::K2, Tunable::B, Tunable::Sf];

    /// Parameter name in the model record.
    pub fn name(&self) -> &'static str {
        match self {
            Tunable::Ti => "ti",
            Tunable::K1 => "k1",
            Tunable::K2 => "k2",
            Tunable::B => "b",
            Tunable::Sf => "Sf",
        }
    }

    /// Current value in a record.
    pub fn get(&self, params: &ModelParameters) -> f64 {
        match self {
            Tunable::Ti => params.ti,
            Tunable::K1 => params.k1,
            Tunable::K2 => params.k2,
            Tunable::B => params.b,
            Tunable::Sf => params.sf,
        }
    }

    /// Copy of `params` with this parameter replaced.
    pub fn set(&self, params: &ModelParameters, value: f64) -> ModelParameters {
        let mut out = *params;
        match self {
            Tunable::Ti => out.ti = value,
            Tunable::K1 => out.k1 = value,
            Tunable::K2 => out.k2 = value,
            Tunable::B => out.b = value,
            Tunable::Sf => out.sf = value,
        }
        out
    }
}

impl fmt::Display for Tunable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tunable {
    type Err = FedBatchError;

    fn from_str(s: &str) -> Result<Self> {
        Tunable::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| {
                FedBatchError::invalid(format!(
                    "{} cannot be tuned (expected one of ti, k1, k2, b, Sf)",
                    s
                ))
            })
    }
}

/// A constrained strategy search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSpec {
    /// Record supplying every value that is not tuned
    pub baseline: ModelParameters,

    /// Search interval of each tuned parameter
    pub tunables: BTreeMap<Tunable, Bounds>,

    pub objective: Objective,

    /// Largest allowed final working volume (L)
    #[serde(default = "default_max_volume")]
    pub max_volume: f64,

    /// End of the simulated run (h)
    #[serde(default = "default_horizon")]
    pub horizon: f64,
}

fn default_max_volume() -> f64 {
    DEFAULT_MAX_VOLUME
}

fn default_horizon() -> f64 {
    DEFAULT_HORIZON
}

impl OptimizationSpec {
    pub fn new(baseline: ModelParameters, objective: Objective) -> Self {
        Self {
            baseline,
            tunables: BTreeMap::new(),
            objective,
            max_volume: DEFAULT_MAX_VOLUME,
            horizon: DEFAULT_HORIZON,
        }
    }

    /// Add a tuned parameter with its search interval.
    pub fn with_tunable(mut self, tunable: Tunable, bounds: Bounds) -> Self {
        self.tunables.insert(tunable, bounds);
        self
    }

    pub fn with_max_volume(mut self, max_volume: f64) -> Self {
        self.max_volume = max_volume;
        self
    }

    pub fn with_horizon(mut self, horizon: f64) -> Self {
        self.horizon = horizon;
        self
    }

    /// Tuned parameters in search-vector order.
    pub fn tuned(&self) -> Vec<Tunable> {
        self.tunables.keys().copied().collect()
    }

    /// Search intervals in search-vector order.
    pub fn bounds(&self) -> Vec<Bounds> {
        self.tunables.values().copied().collect()
    }

    /// Baseline value of each tuned parameter.
    pub fn baseline_point(&self) -> Vec<f64> {
        self.tunables.keys().map(|t| t.get(&self.baseline)).collect()
    }

    /// Baseline record with `values` applied to the tuned parameters.
    pub fn apply(&self, values: &[f64]) -> ModelParameters {
        self.tunables
            .keys()
            .zip(values)
            .fold(self.baseline, |params, (t, &v)| t.set(&params, v))
    }

    /// Check the search against the initial state, before any integration.
    pub fn validate(&self, init: &State) -> Result<()> {
        self.baseline.validate()?;
        init.validate_initial()?;

        if self.tunables.is_empty() {
            return Err(FedBatchError::invalid("no parameters selected for optimization"));
        }
        for (tunable, bounds) in &self.tunables {
            if !bounds.is_finite() {
                return Err(FedBatchError::invalid(format!(
                    "search interval for {} must be finite, got [{}, {}]",
                    tunable, bounds.min, bounds.max
                )));
            }
            if matches!(tunable, Tunable::Sf | Tunable::Ti) && bounds.min < 0.0 {
                return Err(FedBatchError::invalid(format!(
                    "search interval for {} must be non-negative, got [{}, {}]",
                    tunable, bounds.min, bounds.max
                )));
            }
        }
        if !(self.horizon.is_finite() && self.horizon > 0.0) {
            return Err(FedBatchError::invalid(format!(
                "horizon must be positive and finite, got {}",
                self.horizon
            )));
        }
        if !self.max_volume.is_finite() || self.max_volume < init.v {
            return Err(FedBatchError::invalid(format!(
                "max volume {} is below the initial volume {}",
                self.max_volume, init.v
            )));
        }
        Ok(())
    }
}
