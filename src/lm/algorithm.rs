//! Implementation of the Levenberg-Marquardt algorithm.

use std::fmt;

use nalgebra::{Cholesky, DMatrix, DVector};
use ndarray::{Array1, Array2};
use tracing::{debug, trace};

use crate::error::{FedBatchError, Result};
use crate::problem::Problem;
use crate::utils::finite_difference;
use crate::utils::matrix_convert::{
    nalgebra_vec_to_ndarray, ndarray_to_nalgebra, ndarray_vec_to_nalgebra,
};

use super::config::LmConfig;
use super::convergence::{ConvergenceCriteria, ConvergenceStatus};

/// Result of the Levenberg-Marquardt optimization.
#[derive(Debug, Clone)]
pub struct LmResult {
    /// Optimized parameter values
    pub params: Array1<f64>,

    /// Residuals at the solution
    pub residuals: Array1<f64>,

    /// Sum of squared residuals
    pub cost: f64,

    /// Number of accepted iterations
    pub iterations: usize,

    /// Number of residual evaluations
    pub func_evals: usize,

    /// Why the iteration stopped
    pub status: ConvergenceStatus,

    /// A message describing the result
    pub message: String,

    /// The Jacobian matrix at the solution (if requested)
    pub jacobian: Option<Array2<f64>>,
}

impl LmResult {
    /// Whether the optimization converged.
    pub fn success(&self) -> bool {
        self.status.is_converged()
    }
}

impl fmt::Display for LmResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Result:")?;
        writeln!(f, "  Success: {}", self.success())?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Parameters: {:?}", self.params)?;
        Ok(())
    }
}

/// The Levenberg-Marquardt optimizer.
///
/// Steps solve `(JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr` (Marquardt scaling), so the
/// damping is invariant to the scale of each parameter.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    config: LmConfig,
}

impl LevenbergMarquardt {
    /// Create a new Levenberg-Marquardt optimizer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new Levenberg-Marquardt optimizer with the given configuration.
    pub fn with_config(config: LmConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set whether to calculate and return the Jacobian at the solution.
    pub fn with_calc_jacobian(mut self, calc_jacobian: bool) -> Self {
        self.config.calc_jacobian = calc_jacobian;
        self
    }

    /// Minimize the sum of squared residuals for the given problem.
    ///
    /// Non-convergence is not an error: the result carries the best point
    /// reached and a status saying why the iteration stopped. Errors from
    /// the problem itself are propagated.
    pub fn minimize<P: Problem>(
        &self,
        problem: &P,
        initial_params: Array1<f64>,
    ) -> Result<LmResult> {
        let n_params = problem.parameter_count();
        if initial_params.len() != n_params {
            return Err(FedBatchError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                n_params,
                initial_params.len()
            )));
        }

        let criteria =
            ConvergenceCriteria::new(self.config.xtol, self.config.ftol, self.config.gtol);

        let mut params = initial_params;
        let mut residuals = problem.eval(&params)?;
        let mut func_evals = 1;
        let mut cost = sum_of_squares(&residuals);
        if !cost.is_finite() {
            return Err(FedBatchError::ConvergenceFailure(
                "residuals at the initial point are not finite".to_string(),
            ));
        }

        if n_params == 0 {
            return self.finish(
                problem,
                params,
                residuals,
                cost,
                0,
                func_evals,
                ConvergenceStatus::NoFreeParameters,
            );
        }

        let mut lambda = self.config.initial_lambda;
        let mut iterations = 0;

        let status = 'outer: loop {
            if iterations >= self.config.max_iterations {
                break ConvergenceStatus::MaxIterationsReached;
            }
            if func_evals + n_params >= self.config.max_func_evals {
                break ConvergenceStatus::MaxFunctionEvaluationsReached;
            }

            let jac = self.jacobian(problem, &params, &residuals)?;
            func_evals += n_params;

            let gradient = jac.t().dot(&residuals);
            let status = criteria.check_gradient(&gradient);
            if status.is_terminated() {
                break status;
            }

            let jtj = ndarray_to_nalgebra(&jac.t().dot(&jac));
            let jtr = ndarray_vec_to_nalgebra(&gradient);

            loop {
                let step = match solve_damped(&jtj, &jtr, lambda) {
                    Some(step) => step,
                    None => {
                        lambda *= self.config.lambda_up_factor;
                        if lambda > self.config.max_lambda {
                            break 'outer ConvergenceStatus::NoFurtherReduction;
                        }
                        continue;
                    }
                };

                let new_params = &params + &step;
                let new_residuals = problem.eval(&new_params)?;
                func_evals += 1;
                let new_cost = sum_of_squares(&new_residuals);

                trace!(iterations, lambda, cost, new_cost, "lm trial step");

                if new_cost.is_finite() && new_cost < cost {
                    let status = criteria.check_step(&params, &step, cost, new_cost);

                    params = new_params;
                    residuals = new_residuals;
                    cost = new_cost;
                    lambda = (lambda * self.config.lambda_down_factor).max(self.config.min_lambda);
                    iterations += 1;

                    if status.is_terminated() {
                        break 'outer status;
                    }
                    break;
                }

                // A rejected step this small means we sit at the noise floor.
                if criteria.step_is_small(&params, &step) {
                    break 'outer ConvergenceStatus::ParameterConvergence;
                }
                lambda *= self.config.lambda_up_factor;
                if lambda > self.config.max_lambda {
                    break 'outer ConvergenceStatus::NoFurtherReduction;
                }
                if func_evals >= self.config.max_func_evals {
                    break 'outer ConvergenceStatus::MaxFunctionEvaluationsReached;
                }
            }
        };

        debug!(
            iterations,
            func_evals,
            cost,
            status = status.description(),
            "levenberg-marquardt finished"
        );

        self.finish(problem, params, residuals, cost, iterations, func_evals, status)
    }

    fn jacobian<P: Problem>(
        &self,
        problem: &P,
        params: &Array1<f64>,
        residuals: &Array1<f64>,
    ) -> Result<Array2<f64>> {
        let epsilon = self.config.epsilon.unwrap_or_else(|| problem.jacobian_epsilon());
        finite_difference::jacobian_at(problem, params, residuals, Some(epsilon))
    }

    #[allow(clippy::too_many_arguments)]
    fn finish<P: Problem>(
        &self,
        problem: &P,
        params: Array1<f64>,
        residuals: Array1<f64>,
        cost: f64,
        iterations: usize,
        mut func_evals: usize,
        status: ConvergenceStatus,
    ) -> Result<LmResult> {
        let jacobian = if self.config.calc_jacobian && !params.is_empty() {
            func_evals += params.len();
            Some(self.jacobian(problem, &params, &residuals)?)
        } else {
            None
        };

        Ok(LmResult {
            params,
            residuals,
            cost,
            iterations,
            func_evals,
            status,
            message: status.description().to_string(),
            jacobian,
        })
    }
}

fn sum_of_squares(residuals: &Array1<f64>) -> f64 {
    residuals.iter().map(|r| r * r).sum()
}

/// Solve the damped normal equations. `None` if the system is not
/// positive definite or the step is not finite.
fn solve_damped(jtj: &DMatrix<f64>, jtr: &DVector<f64>, lambda: f64) -> Option<Array1<f64>> {
    let mut a = jtj.clone();
    for i in 0..a.nrows() {
        a[(i, i)] += lambda * jtj[(i, i)].max(1e-12);
    }

    let step = Cholesky::new(a)?.solve(&(-jtr));
    if step.iter().all(|s| s.is_finite()) {
        Some(nalgebra_vec_to_ndarray(&step))
    } else {
        None
    }
}
