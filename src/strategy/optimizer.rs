//! Constrained search over operational parameters.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::spec::{Objective, OptimizationSpec, Tunable};
use crate::error::{FedBatchError, Result};
use crate::global_opt::{CostFunction, DifferentialEvolution, GlobalOptimizer};
use crate::model::{ModelParameters, State};
use crate::simulator::{Simulator, TimeSeries};

/// Cost of a trial whose final volume exceeds the limit, before the excess
/// is added.
pub const INFEASIBLE_PENALTY: f64 = 1e6;

/// Cost of a trial that cannot be simulated.
pub const FAILURE_PENALTY: f64 = 1e7;

/// Negated objective with the volume constraint folded in as a penalty.
struct StrategyCost<'a> {
    simulator: &'a Simulator,
    spec: &'a OptimizationSpec,
    init: State,
}

impl CostFunction for StrategyCost<'_> {
    fn cost(&self, params: &Array1<f64>) -> Result<f64> {
        let trial = self.spec.apply(&params.to_vec());
        match self.simulator.final_state(&trial, &self.init, self.spec.horizon) {
            Ok(end) if end.v > self.spec.max_volume => {
                debug!(volume = end.v, "trial exceeds volume limit");
                Ok(INFEASIBLE_PENALTY + (end.v - self.spec.max_volume))
            }
            Ok(end) => Ok(-self.spec.objective.value(&end)),
            Err(e @ (FedBatchError::IntegrationFailure { .. } | FedBatchError::InvalidSpec(_))) => {
                debug!(error = %e, "trial simulation failed, penalizing");
                Ok(FAILURE_PENALTY)
            }
            Err(e) => Err(e),
        }
    }

    fn dimension(&self) -> usize {
        self.spec.tunables.len()
    }

    fn infeasible_cost(&self) -> Option<f64> {
        Some(INFEASIBLE_PENALTY)
    }
}

/// Outcome of a strategy search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub objective: Objective,

    /// Full record at the best point
    pub parameters: ModelParameters,

    /// Best value of each tuned parameter
    pub optimized: BTreeMap<Tunable, f64>,

    /// Objective at the best point
    pub objective_value: f64,

    /// Final volume at the best point
    pub final_volume: f64,

    pub max_volume: f64,
    pub horizon: f64,

    /// Objective of the untouched baseline
    pub baseline_value: f64,

    /// Final volume of the untouched baseline
    pub baseline_volume: f64,

    /// Baseline trajectory on the reporting grid
    pub baseline_series: TimeSeries,

    /// Optimized trajectory on the reporting grid
    pub series: TimeSeries,

    pub iterations: usize,
    pub func_evals: usize,
    pub converged: bool,
    pub message: String,
}

impl OptimizationResult {
    /// Relative gain over the baseline, if the baseline value is nonzero.
    pub fn improvement(&self) -> Option<f64> {
        (self.baseline_value != 0.0)
            .then(|| (self.objective_value - self.baseline_value) / self.baseline_value.abs())
    }

    /// Whether the baseline itself respects the volume limit.
    pub fn baseline_feasible(&self) -> bool {
        self.baseline_volume <= self.max_volume
    }
}

impl fmt::Display for OptimizationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Results:")?;
        writeln!(f, "Objective: {}", self.objective)?;
        writeln!(f, "Best Value: {:.4}", self.objective_value)?;
        writeln!(
            f,
            "Final Volume: {:.4} L (limit {:.4} L, horizon {} h)",
            self.final_volume, self.max_volume, self.horizon
        )?;
        write!(
            f,
            "Baseline Value: {:.4} (volume {:.4} L",
            self.baseline_value, self.baseline_volume
        )?;
        if !self.baseline_feasible() {
            write!(f, ", exceeds limit")?;
        }
        writeln!(f, ")")?;
        if let Some(gain) = self.improvement() {
            writeln!(f, "Improvement: {:+.2}%", gain * 100.0)?;
        }
        writeln!(f, "Optimized Parameters:")?;
        for (tunable, value) in &self.optimized {
            writeln!(f, "  {}: {:.4}", tunable, value)?;
        }
        writeln!(f, "Search: {} generations, {} evaluations", self.iterations, self.func_evals)?;
        writeln!(f, "{}", self.message)
    }
}

/// Maximizes a terminal quantity over operational parameters under a volume
/// limit.
#[derive(Debug, Clone)]
pub struct StrategyOptimizer {
    simulator: Simulator,
    search: DifferentialEvolution,
    reporting_step: f64,
}

impl Default for StrategyOptimizer {
    fn default() -> Self {
        Self {
            simulator: Simulator::default(),
            search: DifferentialEvolution::default(),
            reporting_step: 0.5,
        }
    }
}

impl StrategyOptimizer {
    pub fn new(simulator: Simulator) -> Self {
        Self {
            simulator,
            ..Self::default()
        }
    }

    /// Replace the search settings.
    pub fn with_search(mut self, search: DifferentialEvolution) -> Self {
        self.search = search;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.search = self.search.with_seed(seed);
        self
    }

    /// Spacing of the trajectories returned in the result.
    pub fn with_reporting_step(mut self, step: f64) -> Self {
        self.reporting_step = step;
        self
    }

    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }

    /// Search the tuned parameters of `spec`, integrating from `init`.
    ///
    /// Returns [`FedBatchError::NoFeasibleSolution`] if no evaluated point
    /// kept the final volume within the limit.
    pub fn optimize(&self, spec: &OptimizationSpec, init: &State) -> Result<OptimizationResult> {
        spec.validate(init)?;

        let baseline_end = self
            .simulator
            .final_state(&spec.baseline, init, spec.horizon)?;
        let baseline_value = spec.objective.value(&baseline_end);
        if baseline_end.v > spec.max_volume {
            warn!(
                volume = baseline_end.v,
                max_volume = spec.max_volume,
                "baseline exceeds the volume limit"
            );
        }

        let cost = StrategyCost {
            simulator: &self.simulator,
            spec,
            init: *init,
        };
        let bounds = spec.bounds();
        let start = Array1::from(spec.baseline_point());
        let outcome = self.search.optimize(&cost, &bounds, Some(&start))?;

        if outcome.cost >= INFEASIBLE_PENALTY {
            return Err(FedBatchError::NoFeasibleSolution {
                evaluations: outcome.func_evals,
                reason: format!(
                    "every trial exceeded the {} L volume limit or failed to integrate",
                    spec.max_volume
                ),
            });
        }

        let point = outcome.params.to_vec();
        let parameters = spec.apply(&point);
        let optimized = spec.tuned().into_iter().zip(point).collect();

        let series = self
            .simulator
            .simulate(&parameters, init, spec.horizon, self.reporting_step)?;
        let baseline_series =
            self.simulator
                .simulate(&spec.baseline, init, spec.horizon, self.reporting_step)?;
        let end = series
            .final_state()
            .ok_or_else(|| FedBatchError::invalid("empty simulation"))?;

        info!(
            objective = %spec.objective,
            value = spec.objective.value(&end),
            baseline = baseline_value,
            volume = end.v,
            generations = outcome.iterations,
            func_evals = outcome.func_evals,
            "strategy search finished"
        );

        Ok(OptimizationResult {
            objective: spec.objective,
            parameters,
            optimized,
            objective_value: spec.objective.value(&end),
            final_volume: end.v,
            max_volume: spec.max_volume,
            horizon: spec.horizon,
            baseline_value,
            baseline_volume: baseline_end.v,
            baseline_series,
            series,
            iterations: outcome.iterations,
            func_evals: outcome.func_evals,
            converged: outcome.converged,
            message: outcome.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::Bounds;
    use approx::assert_relative_eq;

    fn baseline() -> ModelParameters {
        ModelParameters {
            mu_max: 0.6,
            ks: 0.1,
            ks_p: 0.5,
            y_xs: 0.5,
            y_ps: 0.2,
            ms: 0.05,
            alpha: 0.1,
            beta: 0.02,
            sf: 500.0,
            ti: 10.0,
            k1: 0.01,
            b: 0.005,
            k2: 0.0,
            fi: None,
        }
    }

    fn init() -> State {
        State::new(0.5, 20.0, 0.0, 1.0)
    }

    fn quick() -> StrategyOptimizer {
        StrategyOptimizer::default()
            .with_search(
                DifferentialEvolution::new()
                    .with_population_size(5)
                    .with_max_iterations(10)
                    .with_seed(7),
            )
            .with_reporting_step(1.0)
    }

    #[test]
    fn test_cost_penalizes_volume() {
        let spec = OptimizationSpec::new(baseline(), Objective::MaxProduct)
            .with_tunable(Tunable::K1, Bounds::new(0.0, 0.5).unwrap())
            .with_horizon(20.0)
            .with_max_volume(1.5);
        let sim = Simulator::default();
        let cost = StrategyCost {
            simulator: &sim,
            spec: &spec,
            init: init(),
        };

        let heavy = cost.cost(&Array1::from(vec![0.5])).unwrap();
        assert!(heavy > INFEASIBLE_PENALTY);

        let light = cost.cost(&Array1::from(vec![0.0])).unwrap();
        assert!(light <= 0.0);
    }

    #[test]
    fn test_result_respects_volume_limit() {
        let spec = OptimizationSpec::new(baseline(), Objective::MaxProduct)
            .with_tunable(Tunable::K1, Bounds::new(0.0, 0.05).unwrap())
            .with_tunable(Tunable::Ti, Bounds::new(2.0, 18.0).unwrap())
            .with_horizon(20.0)
            .with_max_volume(1.5);

        // Only small k1 stays under the limit, so the first population may
        // hold no feasible point at all; the search has to keep going.
        let result = quick().optimize(&spec, &init()).unwrap();
        assert!(!result.baseline_feasible());
        assert!(result.iterations > 0);
        assert!(result.final_volume <= 1.5 + 1e-9);
        assert_eq!(result.optimized.len(), 2);
        assert_relative_eq!(result.parameters.mu_max, 0.6);
        assert_eq!(result.series.len(), 21);
        assert_eq!(result.baseline_series.len(), 21);
    }

    #[test]
    fn test_no_feasible_point() {
        // Even the smallest feed overfills a 1.01 L limit within 20 h.
        let spec = OptimizationSpec::new(baseline(), Objective::MaxBiomass)
            .with_tunable(Tunable::B, Bounds::new(0.05, 0.1).unwrap())
            .with_horizon(20.0)
            .with_max_volume(1.01);

        let err = quick().optimize(&spec, &init()).unwrap_err();
        assert!(matches!(err, FedBatchError::NoFeasibleSolution { .. }));
    }
}
