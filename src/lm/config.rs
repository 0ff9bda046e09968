//! Configuration options for the Levenberg-Marquardt algorithm.

/// Configuration options for the Levenberg-Marquardt algorithm.
#[derive(Debug, Clone)]
pub struct LmConfig {
    /// Maximum number of accepted iterations. Default: 100
    pub max_iterations: usize,

    /// Maximum number of residual evaluations, Jacobian columns included.
    /// Default: 5000
    pub max_func_evals: usize,

    /// Tolerance for relative change in cost. Default: 1e-10
    pub ftol: f64,

    /// Tolerance for relative change in parameter values. Default: 1e-10
    pub xtol: f64,

    /// Tolerance for the gradient max-norm. Default: 1e-12
    pub gtol: f64,

    /// Initial value for the damping parameter. Default: 1e-3
    pub initial_lambda: f64,

    /// Factor by which to increase lambda. Default: 10.0
    pub lambda_up_factor: f64,

    /// Factor by which to decrease lambda. Default: 0.1
    pub lambda_down_factor: f64,

    /// Minimum value for lambda. Default: 1e-12
    pub min_lambda: f64,

    /// Maximum value for lambda. Default: 1e12
    pub max_lambda: f64,

    /// Relative step for the finite-difference Jacobian. `None` uses the
    /// problem's own choice.
    pub epsilon: Option<f64>,

    /// Whether to calculate and return the Jacobian at the solution. Default: false
    pub calc_jacobian: bool,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            max_func_evals: 5000,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-12,
            initial_lambda: 1e-3,
            lambda_up_factor: 10.0,
            lambda_down_factor: 0.1,
            min_lambda: 1e-12,
            max_lambda: 1e12,
            epsilon: None,
            calc_jacobian: false,
        }
    }
}
