//! Integrator settings.

use serde::{Deserialize, Serialize};

use crate::model::ProductionMode;

/// Tolerances and limits used by every simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Relative tolerance of the adaptive step. Default: 1e-8
    pub rtol: f64,

    /// Absolute tolerance of the adaptive step. Default: 1e-10
    pub atol: f64,

    /// Maximum number of solver steps per integrated segment. Default: 100000
    pub max_steps: u32,

    /// Whether product formation waits for induction. Default: induced
    pub production_mode: ProductionMode,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            rtol: 1e-8,
            atol: 1e-10,
            max_steps: 100_000,
            production_mode: ProductionMode::default(),
        }
    }
}

impl SimulatorConfig {
    pub fn with_rtol(mut self, rtol: f64) -> Self {
        self.rtol = rtol;
        self
    }

    pub fn with_atol(mut self, atol: f64) -> Self {
        self.atol = atol;
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_production_mode(mut self, mode: ProductionMode) -> Self {
        self.production_mode = mode;
        self
    }
}
