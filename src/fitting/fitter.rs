//! Bounded least-squares fit of model parameters to observations.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::data::ObservedData;
use super::metrics::{ChannelMetrics, FitMetrics, MetricsBuilder};
use super::spec::FitSpec;
use super::uncertainty::standard_errors;
use crate::error::{FedBatchError, Result};
use crate::lm::{ConvergenceStatus, LevenbergMarquardt, LmConfig};
use crate::model::{Channel, ModelParameters, State};
use crate::parameters::BoundsTransform;
use crate::problem::Problem;
use crate::simulator::{reporting_grid, Simulator, TimeSeries};

/// Residual assigned to every measurement when a trial cannot be simulated.
pub const FAILED_TRIAL_RESIDUAL: f64 = 1e6;

/// One fitted parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FittedParameter {
    pub value: f64,
    pub stderr: Option<f64>,
    pub initial: f64,
    #[serde(rename = "min")]
    pub lower: f64,
    #[serde(rename = "max")]
    pub upper: f64,
}

/// Outcome of a fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    /// The full parameter record at the solution
    pub parameters: ModelParameters,

    /// The searched subset
    pub fitted: BTreeMap<String, FittedParameter>,

    /// Per-channel statistics
    pub channels: BTreeMap<Channel, ChannelMetrics>,

    /// Pooled R² over all measured channels
    pub r_squared: Option<f64>,

    /// Sum of squared residuals
    pub ssr: f64,

    /// Number of residuals
    pub n_residuals: usize,

    /// Simulation with the fitted parameters on the reporting grid
    pub series: TimeSeries,

    pub iterations: usize,
    pub func_evals: usize,
    pub status: ConvergenceStatus,
    pub converged: bool,
    pub message: String,
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fit Result:")?;
        writeln!(f, "  Status: {}", self.message)?;
        writeln!(f, "  Iterations: {}, evaluations: {}", self.iterations, self.func_evals)?;
        writeln!(f, "  SSR: {:.6e} over {} residuals", self.ssr, self.n_residuals)?;
        match self.r_squared {
            Some(r2) => writeln!(f, "  R² (pooled): {:.6}", r2)?,
            None => writeln!(f, "  R² (pooled): undefined")?,
        }
        for (channel, m) in &self.channels {
            match m.r_squared {
                Some(r2) => writeln!(
                    f,
                    "  {}: R² = {:.6}, RMSE = {:.4e} (n = {})",
                    channel, r2, m.rmse, m.n
                )?,
                None => writeln!(
                    f,
                    "  {}: R² undefined, RMSE = {:.4e} (n = {})",
                    channel, m.rmse, m.n
                )?,
            }
        }
        writeln!(f, "  Parameters:")?;
        for (name, p) in &self.fitted {
            match p.stderr {
                Some(se) => writeln!(f, "    {} = {:.6} +/- {:.3e}", name, p.value, se)?,
                None => writeln!(f, "    {} = {:.6}", name, p.value)?,
            }
        }
        Ok(())
    }
}

/// Residuals of one fit, indexed by the internal coordinates of the free
/// parameters.
struct FitProblem<'a> {
    simulator: &'a Simulator,
    base: ModelParameters,
    names: Vec<&'a str>,
    transforms: Vec<BoundsTransform>,
    init: State,
    times: Vec<f64>,
    /// `(index into times, channel, measured value)` per residual
    targets: Vec<(usize, Channel, f64)>,
}

impl<'a> FitProblem<'a> {
    fn new(
        simulator: &'a Simulator,
        data: &ObservedData,
        spec: &'a FitSpec,
        init: State,
    ) -> Result<Self> {
        let base = spec.initial_parameters()?;
        let names = spec.free_names();
        let transforms = spec
            .free
            .values()
            .map(|free| Ok(BoundsTransform::new(free.bounds()?)?))
            .collect::<Result<Vec<_>>>()?;

        let times = data.unique_times();
        let mut targets = Vec::with_capacity(data.measurement_count());
        for obs in data.observations() {
            let idx = times.partition_point(|t| *t < obs.t);
            for (&channel, &value) in &obs.values {
                targets.push((idx, channel, value));
            }
        }

        Ok(Self {
            simulator,
            base,
            names,
            transforms,
            init,
            times,
            targets,
        })
    }

    fn initial_internal(&self, spec: &FitSpec) -> Result<Array1<f64>> {
        spec.free
            .values()
            .zip(&self.transforms)
            .map(|(free, transform)| Ok(transform.to_internal(free.initial)?))
            .collect()
    }

    fn external(&self, internal: &Array1<f64>) -> Vec<f64> {
        internal
            .iter()
            .zip(&self.transforms)
            .map(|(&x, transform)| transform.to_external(x))
            .collect()
    }

    /// Full record for a point in internal coordinates.
    fn parameters_at(&self, internal: &Array1<f64>) -> Result<ModelParameters> {
        let values = self.external(internal);
        self.base
            .with_values(self.names.iter().copied().zip(values))
    }

    fn simulate(&self, params: &ModelParameters) -> Result<TimeSeries> {
        self.simulator.simulate_at(params, &self.init, &self.times)
    }

    fn residuals_for(&self, series: &TimeSeries) -> Array1<f64> {
        let samples = series.samples();
        self.targets
            .iter()
            .map(|&(idx, channel, measured)| samples[idx].state.get(channel) - measured)
            .collect()
    }

    fn metrics_for(&self, series: &TimeSeries) -> FitMetrics {
        let samples = series.samples();
        let mut builder = MetricsBuilder::default();
        for &(idx, channel, measured) in &self.targets {
            builder.push(channel, measured, samples[idx].state.get(channel));
        }
        builder.finish()
    }
}

impl Problem for FitProblem<'_> {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        let trial = self.parameters_at(params)?;
        match self.simulate(&trial) {
            Ok(series) => Ok(self.residuals_for(&series)),
            Err(e @ (FedBatchError::IntegrationFailure { .. } | FedBatchError::InvalidSpec(_))) => {
                debug!(error = %e, "trial simulation failed, penalizing");
                Ok(Array1::from_elem(self.targets.len(), FAILED_TRIAL_RESIDUAL))
            }
            Err(e) => Err(e),
        }
    }

    fn parameter_count(&self) -> usize {
        self.names.len()
    }

    fn residual_count(&self) -> usize {
        self.targets.len()
    }

    fn jacobian_epsilon(&self) -> f64 {
        1e-6
    }
}

/// Fits a subset of model parameters to observed data.
#[derive(Debug, Clone)]
pub struct Fitter {
    simulator: Simulator,
    lm: LmConfig,
    reporting_step: f64,
}

impl Default for Fitter {
    fn default() -> Self {
        Self {
            simulator: Simulator::default(),
            lm: LmConfig::default(),
            reporting_step: 0.5,
        }
    }
}

impl Fitter {
    pub fn new(simulator: Simulator) -> Self {
        Self {
            simulator,
            ..Self::default()
        }
    }

    pub fn with_lm_config(mut self, config: LmConfig) -> Self {
        self.lm = config;
        self
    }

    /// Spacing of the fitted trajectory returned in the result.
    pub fn with_reporting_step(mut self, step: f64) -> Self {
        self.reporting_step = step;
        self
    }

    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }

    /// Fit the free parameters of `spec` to `data`, integrating from `init`.
    ///
    /// The fixed/free partition is checked before any integration. An empty free
    /// set skips the search and reports metrics for the fixed record.
    pub fn fit(&self, data: &ObservedData, spec: &FitSpec, init: &State) -> Result<FitResult> {
        let problem = FitProblem::new(&self.simulator, data, spec, *init)?;
        init.validate_initial()?;

        let start = problem.initial_internal(spec)?;
        // The starting point must simulate; later trials may fail and get
        // penalized, but a fit cannot begin from a broken record.
        problem.simulate(&problem.parameters_at(&start)?)?;

        let lm = LevenbergMarquardt::with_config(LmConfig {
            calc_jacobian: true,
            ..self.lm.clone()
        });
        let outcome = lm.minimize(&problem, start)?;

        let parameters = problem.parameters_at(&outcome.params)?;
        let solution = problem.simulate(&parameters)?;
        let metrics = problem.metrics_for(&solution);

        let stderrs = match &outcome.jacobian {
            Some(jac) => standard_errors(jac, &outcome.params, &problem.transforms, metrics.ssr),
            None => vec![None; problem.names.len()],
        };

        let fitted = spec
            .free
            .iter()
            .zip(problem.external(&outcome.params))
            .zip(stderrs)
            .map(|(((name, free), value), stderr)| {
                (
                    name.clone(),
                    FittedParameter {
                        value,
                        stderr,
                        initial: free.initial,
                        lower: free.lower,
                        upper: free.upper,
                    },
                )
            })
            .collect();

        let series = self.report_series(&parameters, init, data)?;

        if !outcome.status.is_converged() {
            warn!(status = outcome.status.description(), "fit did not converge");
        }
        info!(
            free = problem.names.len(),
            iterations = outcome.iterations,
            func_evals = outcome.func_evals,
            ssr = metrics.ssr,
            r_squared = ?metrics.r_squared,
            "fit finished"
        );

        Ok(FitResult {
            parameters,
            fitted,
            channels: metrics.channels,
            r_squared: metrics.r_squared,
            ssr: metrics.ssr,
            n_residuals: problem.targets.len(),
            series,
            iterations: outcome.iterations,
            func_evals: outcome.func_evals,
            status: outcome.status,
            converged: outcome.status.is_converged(),
            message: outcome.message,
        })
    }

    fn report_series(
        &self,
        params: &ModelParameters,
        init: &State,
        data: &ObservedData,
    ) -> Result<TimeSeries> {
        let t_end = data.last_time();
        if t_end > 0.0 {
            let grid = reporting_grid(t_end, self.reporting_step)?;
            self.simulator.simulate_at(params, init, &grid)
        } else {
            self.simulator.simulate_at(params, init, &[0.0])
        }
    }
}
