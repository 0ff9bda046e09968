//! Finite difference methods for numerical differentiation.

use ndarray::{Array1, Array2};

use crate::error::{FedBatchError, Result};
use crate::problem::Problem;

/// Default relative step size for finite differences.
pub const DEFAULT_EPSILON: f64 = 1e-8;

/// Compute the Jacobian matrix using forward finite differences.
///
/// `J[i,j] = d residual[i] / d param[j]`. The step for parameter `j` is
/// `epsilon * |param[j]|`, or `epsilon` itself when the parameter is smaller
/// than that.
pub fn jacobian(
    problem: &dyn Problem,
    params: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let residuals = problem.eval(params)?;
    jacobian_at(problem, params, &residuals, epsilon)
}

/// Forward-difference Jacobian reusing residuals already evaluated at
/// `params`.
pub fn jacobian_at(
    problem: &dyn Problem,
    params: &Array1<f64>,
    residuals: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    let n_params = params.len();
    let n_residuals = problem.residual_count();

    if residuals.len() != n_residuals {
        return Err(FedBatchError::DimensionMismatch(format!(
            "Expected {} residuals, got {}",
            n_residuals,
            residuals.len()
        )));
    }

    let mut jac = Array2::zeros((n_residuals, n_params));

    for j in 0..n_params {
        let mut params_perturbed = params.clone();

        let param_j = params[j];
        let eps_j = if param_j.abs() > 1.0 {
            param_j.abs() * eps
        } else {
            eps
        };
        params_perturbed[j] += eps_j;

        let residuals_perturbed = problem.eval(&params_perturbed)?;
        if residuals_perturbed.len() != n_residuals {
            return Err(FedBatchError::DimensionMismatch(format!(
                "Expected {} residuals, got {}",
                n_residuals,
                residuals_perturbed.len()
            )));
        }

        for i in 0..n_residuals {
            jac[[i, j]] = (residuals_perturbed[i] - residuals[i]) / eps_j;
        }
    }

    Ok(jac)
}
