//! Convergence criteria for the Levenberg-Marquardt iteration.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Possible convergence states for an optimization algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceStatus {
    /// The algorithm is still running.
    Running,

    /// The algorithm has converged due to a small parameter change.
    ParameterConvergence,

    /// The algorithm has converged due to a small function value change.
    FunctionValueConvergence,

    /// The algorithm has converged due to a small gradient.
    GradientConvergence,

    /// The algorithm has terminated due to reaching the maximum number of iterations.
    MaxIterationsReached,

    /// The evaluation budget ran out.
    MaxFunctionEvaluationsReached,

    /// Damping reached its ceiling without finding a downhill step.
    NoFurtherReduction,

    /// Nothing to optimize.
    NoFreeParameters,
}

impl ConvergenceStatus {
    /// Returns true if the optimization has terminated (either converged or failed).
    pub fn is_terminated(&self) -> bool {
        !matches!(self, ConvergenceStatus::Running)
    }

    /// Returns true if the optimization has converged.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            ConvergenceStatus::ParameterConvergence
                | ConvergenceStatus::FunctionValueConvergence
                | ConvergenceStatus::GradientConvergence
                | ConvergenceStatus::NoFreeParameters
        )
    }

    /// Returns a description of the convergence status.
    pub fn description(&self) -> &'static str {
        match self {
            ConvergenceStatus::Running => "Optimization is still running",
            ConvergenceStatus::ParameterConvergence => "Converged: small parameter change",
            ConvergenceStatus::FunctionValueConvergence => "Converged: small function value change",
            ConvergenceStatus::GradientConvergence => "Converged: small gradient",
            ConvergenceStatus::MaxIterationsReached => "Terminated: maximum iterations reached",
            ConvergenceStatus::MaxFunctionEvaluationsReached => {
                "Terminated: maximum function evaluations reached"
            }
            ConvergenceStatus::NoFurtherReduction => {
                "Terminated: no downhill step found at maximum damping"
            }
            ConvergenceStatus::NoFreeParameters => "No free parameters; nothing to optimize",
        }
    }
}

/// Criteria for determining when the iteration has converged.
#[derive(Debug, Clone)]
pub struct ConvergenceCriteria {
    /// Tolerance for change in parameter values.
    pub xtol: f64,

    /// Tolerance for change in function value.
    pub ftol: f64,

    /// Tolerance for gradient max-norm.
    pub gtol: f64,
}

impl ConvergenceCriteria {
    pub fn new(xtol: f64, ftol: f64, gtol: f64) -> Self {
        Self { xtol, ftol, gtol }
    }

    /// Gradient test, done before attempting a step.
    pub fn check_gradient(&self, gradient: &Array1<f64>) -> ConvergenceStatus {
        let norm = gradient.iter().fold(0.0_f64, |acc, g| acc.max(g.abs()));
        if norm <= self.gtol {
            ConvergenceStatus::GradientConvergence
        } else {
            ConvergenceStatus::Running
        }
    }

    /// Whether `step` is negligible relative to `params`.
    pub fn step_is_small(&self, params: &Array1<f64>, step: &Array1<f64>) -> bool {
        let step_norm = step.dot(step).sqrt();
        let params_norm = params.dot(params).sqrt();
        step_norm <= self.xtol * (params_norm + self.xtol)
    }

    /// Step tests, done after an accepted step.
    pub fn check_step(
        &self,
        params: &Array1<f64>,
        step: &Array1<f64>,
        cost: f64,
        new_cost: f64,
    ) -> ConvergenceStatus {
        if self.step_is_small(params, step) {
            return ConvergenceStatus::ParameterConvergence;
        }

        if cost - new_cost <= self.ftol * cost {
            return ConvergenceStatus::FunctionValueConvergence;
        }

        ConvergenceStatus::Running
    }
}
