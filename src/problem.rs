//! Problem definition trait.
//!
//! This module defines the `Problem` trait, which represents a nonlinear
//! least squares problem to be solved with the Levenberg-Marquardt algorithm.

use ndarray::{Array1, Array2};

use crate::error::Result;

/// A nonlinear least squares problem.
///
/// Parameters and residuals are plain vectors. Bounds, naming and the mapping
/// back to model parameters are the implementor's business.
pub trait Problem {
    /// Evaluate the residuals at the given parameters.
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>>;

    /// Get the number of parameters in the problem.
    fn parameter_count(&self) -> usize;

    /// Get the number of residuals in the problem.
    fn residual_count(&self) -> usize;

    /// Evaluate the Jacobian matrix at the given parameters.
    ///
    /// The default implementation uses forward finite differences with the
    /// step returned by [`Problem::jacobian_epsilon`].
    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>>
    where
        Self: Sized,
    {
        crate::utils::finite_difference::jacobian(self, params, Some(self.jacobian_epsilon()))
    }

    /// Relative step used by the finite-difference Jacobian.
    fn jacobian_epsilon(&self) -> f64 {
        crate::utils::finite_difference::DEFAULT_EPSILON
    }

    /// Evaluate the sum of squared residuals at the given parameters.
    fn eval_cost(&self, params: &Array1<f64>) -> Result<f64> {
        let residuals = self.eval(params)?;
        Ok(residuals.iter().map(|r| r.powi(2)).sum())
    }
}
