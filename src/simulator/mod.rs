//! # Simulator
//!
//! Integrates the fed-batch model from `t = 0` with Dormand-Prince 5(4).
//!
//! The feed law and (in induced mode) the production law jump at `ti`. Each
//! output interval is therefore integrated as its own solver run, split at
//! `ti` when the interval contains it, and every run evaluates the model in
//! the feed phase of that run. No step ever straddles the switch, and state
//! continuity across it is exact.
//!
//! ```rust
//! use fedbatch_rs::model::{ModelParameters, ParameterSet, State};
//! use fedbatch_rs::simulator::Simulator;
//!
//! let set: ParameterSet = [
//!     ("mu_max", 0.6), ("Ks", 0.1), ("Ks_p", 0.5), ("Y_xs", 0.5), ("Y_ps", 0.2),
//!     ("ms", 0.05), ("alpha", 0.1), ("beta", 0.02), ("Sf", 500.0),
//!     ("ti", 10.0), ("k1", 0.01), ("b", 0.005), ("k2", 0.0),
//! ]
//! .into_iter()
//! .map(|(k, v)| (k.to_string(), v))
//! .collect();
//! let params = ModelParameters::from_set(&set).unwrap();
//!
//! let series = Simulator::default()
//!     .simulate(&params, &State::new(0.5, 20.0, 0.0, 1.0), 24.0, 0.5)
//!     .unwrap();
//! assert_eq!(series.len(), 49);
//! assert!(series.final_state().unwrap().p > 0.0);
//! ```

mod config;
mod series;

pub use config::SimulatorConfig;
pub use series::{reporting_grid, Sample, TimeSeries};

use ode_solvers::dop_shared::{IntegrationError, OutputType};
use ode_solvers::Dopri5;
use tracing::trace;

use crate::error::{FedBatchError, Result};
use crate::model::{FeedPhase, FedBatchSystem, ModelParameters, State};

/// Runs the model forward in time.
#[derive(Debug, Clone, Copy, Default)]
pub struct Simulator {
    config: SimulatorConfig,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Simulate from `t = 0` to `t_end`, reporting on a uniform grid of
    /// spacing `step` that always ends at `t_end`.
    pub fn simulate(
        &self,
        params: &ModelParameters,
        init: &State,
        t_end: f64,
        step: f64,
    ) -> Result<TimeSeries> {
        let grid = reporting_grid(t_end, step)?;
        self.simulate_at(params, init, &grid)
    }

    /// Simulate from `t = 0` and report the state at each of `times`.
    ///
    /// `times` must be finite, non-negative and strictly increasing. The
    /// returned series has exactly one sample per requested time.
    pub fn simulate_at(
        &self,
        params: &ModelParameters,
        init: &State,
        times: &[f64],
    ) -> Result<TimeSeries> {
        params.validate()?;
        init.validate_initial()?;
        validate_times(times)?;

        let mut samples = Vec::with_capacity(times.len());
        let mut t = 0.0;
        let mut state = *init;

        for &target in times {
            state = self.advance(params, state, t, target)?;
            t = target;
            samples.push(Sample { t, state });
        }

        Ok(TimeSeries::from_sorted(samples))
    }

    /// State at `t_end` without any intermediate reporting.
    pub fn final_state(&self, params: &ModelParameters, init: &State, t_end: f64) -> Result<State> {
        if !(t_end.is_finite() && t_end > 0.0) {
            return Err(FedBatchError::invalid(format!(
                "end time must be positive and finite, got {}",
                t_end
            )));
        }
        let series = self.simulate_at(params, init, &[t_end])?;
        series
            .final_state()
            .ok_or_else(|| FedBatchError::invalid("empty simulation"))
    }

    /// Advance `state` from `t0` to `t1`, splitting at `ti` if it falls
    /// strictly inside the interval.
    fn advance(&self, params: &ModelParameters, state: State, t0: f64, t1: f64) -> Result<State> {
        if t0 < params.ti && params.ti < t1 {
            let mid = self.integrate_segment(params, state, t0, params.ti, FeedPhase::Growth)?;
            self.integrate_segment(params, mid, params.ti, t1, FeedPhase::Production)
        } else {
            self.integrate_segment(params, state, t0, t1, FeedPhase::at(t0, params))
        }
    }

    fn integrate_segment(
        &self,
        params: &ModelParameters,
        state: State,
        t0: f64,
        t1: f64,
        phase: FeedPhase,
    ) -> Result<State> {
        let span = t1 - t0;
        if span <= 1e-12 * t1.abs().max(1.0) {
            return Ok(state);
        }

        let system = FedBatchSystem {
            params: *params,
            mode: self.config.production_mode,
            phase,
        };

        let mut stepper = Dopri5::from_param(
            system,
            t0,
            t1,
            span,
            state.to_vector(),
            self.config.rtol,
            self.config.atol,
            0.9,
            0.04,
            0.2,
            10.0,
            span,
            0.0,
            self.config.max_steps,
            // The system turns stiff once substrate is exhausted; the step
            // control copes, so stiffness detection stays off.
            u32::MAX,
            // Sparse output records every accepted step, so the last entry
            // is the furthest point reached even when the run fails.
            OutputType::Sparse,
        );

        let outcome = stepper.integrate();
        let (xs, ys) = stepper.results().get();
        let (t_reached, y) = match (xs.last(), ys.last()) {
            (Some(t), Some(y)) => (*t, State::from_vector(y)),
            _ => (t0, state),
        };

        let stats = match outcome {
            Ok(stats) => stats,
            Err(e) => {
                let time = match e {
                    IntegrationError::MaxNumStepReached { x, .. }
                    | IntegrationError::StepSizeUnderflow { x }
                    | IntegrationError::StiffnessDetected { x } => x,
                };
                return Err(FedBatchError::IntegrationFailure {
                    time,
                    state: y,
                    reason: e.to_string(),
                });
            }
        };
        trace!(
            t0,
            t1,
            ?phase,
            steps = stats.accepted_steps,
            rejected = stats.rejected_steps,
            "segment integrated"
        );

        if (t_reached - t1).abs() > 1e-9 * t1.abs().max(1.0) {
            return Err(FedBatchError::IntegrationFailure {
                time: t_reached,
                state: y,
                reason: format!("solver stopped short of t = {}", t1),
            });
        }

        check_physical(t_reached, y)
    }
}

/// Reject a solver state that is no longer physical: any non-finite entry,
/// or a negative volume.
fn check_physical(t: f64, state: State) -> Result<State> {
    if !state.is_finite() || state.v < 0.0 {
        return Err(FedBatchError::IntegrationFailure {
            time: t,
            state,
            reason: "state left the physical domain".to_string(),
        });
    }
    Ok(state)
}

fn validate_times(times: &[f64]) -> Result<()> {
    if times.is_empty() {
        return Err(FedBatchError::invalid("no output times requested"));
    }
    if let Some(t) = times.iter().find(|t| !t.is_finite() || **t < 0.0) {
        return Err(FedBatchError::invalid(format!(
            "output times must be finite and non-negative, got {}",
            t
        )));
    }
    if let Some(w) = times.windows(2).find(|w| w[1] <= w[0]) {
        return Err(FedBatchError::invalid(format!(
            "output times must be strictly increasing, got {} after {}",
            w[1], w[0]
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{derivatives, ProductionMode};
    use approx::assert_relative_eq;

    fn params() -> ModelParameters {
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

    #[test]
    fn test_volume_matches_integrated_feed() {
        // V(t) = V0 + b t + k1 t^2 / 2 before ti, then + Fi (t - ti) with k2 = 0.
        let p = params();
        let series = Simulator::default().simulate(&p, &init(), 20.0, 1.0).unwrap();

        let v10 = series.state_at(10.0).unwrap().v;
        assert_relative_eq!(v10, 1.0 + 0.005 * 10.0 + 0.01 * 50.0, epsilon = 1e-8);
        let v20 = series.final_state().unwrap().v;
        assert_relative_eq!(v20, v10 + 0.105 * 10.0, epsilon = 1e-8);
    }

    #[test]
    fn test_no_product_before_induction() {
        let series = Simulator::default().simulate(&params(), &init(), 20.0, 0.5).unwrap();
        for sample in series.iter().filter(|s| s.t <= 10.0) {
            assert_eq!(sample.state.p, 0.0, "P at t = {}", sample.t);
        }
        assert!(series.final_state().unwrap().p > 0.0);

        let config = SimulatorConfig::default().with_production_mode(ProductionMode::Continuous);
        let continuous = Simulator::new(config)
            .simulate(&params(), &init(), 20.0, 0.5)
            .unwrap();
        assert!(continuous.state_at(5.0).unwrap().p > 0.0);
    }

    #[test]
    fn test_short_interval_matches_euler_step() {
        let p = params();
        let h = 1e-4;
        let end = Simulator::default().final_state(&p, &init(), h).unwrap();
        let d = derivatives(0.0, &init(), &p, ProductionMode::Induced);
        assert_relative_eq!(end.x, init().x + h * d.dx, max_relative = 1e-5);
        assert_relative_eq!(end.v, init().v + h * d.dv, max_relative = 1e-8);
    }

    #[test]
    fn test_simulate_at_matches_grid() {
        let p = params();
        let sim = Simulator::default();
        let grid = sim.simulate(&p, &init(), 12.0, 1.0).unwrap();
        let at = sim.simulate_at(&p, &init(), &[3.0, 10.0, 12.0]).unwrap();
        for sample in at.iter() {
            let g = grid.state_at(sample.t).unwrap();
            assert_relative_eq!(sample.state.x, g.x, max_relative = 1e-6);
            assert_relative_eq!(sample.state.s, g.s, epsilon = 1e-6, max_relative = 1e-5);
        }
    }

    #[test]
    fn test_invalid_inputs() {
        let sim = Simulator::default();
        let p = params();
        assert!(matches!(
            sim.simulate(&p, &init(), -1.0, 1.0),
            Err(FedBatchError::InvalidSpec(_))
        ));
        assert!(sim.simulate_at(&p, &init(), &[2.0, 1.0]).is_err());
        assert!(sim.simulate_at(&p, &State::new(-1.0, 1.0, 0.0, 1.0), &[1.0]).is_err());
        let bad = ModelParameters { y_xs: 0.0, ..p };
        assert!(sim.simulate(&bad, &init(), 1.0, 0.5).is_err());
    }

    #[test]
    fn test_step_limit_reports_failure_point() {
        // ti = 10 splits the run; the budget runs out inside [0, 10].
        let sim = Simulator::new(SimulatorConfig::default().with_max_steps(3));
        let err = sim.simulate(&params(), &init(), 20.0, 20.0).unwrap_err();
        match err {
            FedBatchError::IntegrationFailure { time, state, reason } => {
                assert!(time > 0.0 && time < 10.0, "{reason}");
                assert!(reason.contains(&format!("{}", time)), "{reason}");
                assert!(state.is_finite());
                assert_ne!(state, init());
                // Feed only adds volume, so the last accepted state has grown.
                assert!(state.v > init().v);
            }
            other => panic!("expected integration failure, got {other}"),
        }
    }

    #[test]
    fn test_unphysical_state_is_a_failure() {
        let bad_volume = State::new(1.0, 1.0, 0.0, -1e-3);
        match check_physical(4.5, bad_volume) {
            Err(FedBatchError::IntegrationFailure { time, state, .. }) => {
                assert_eq!(time, 4.5);
                assert_eq!(state, bad_volume);
            }
            other => panic!("expected integration failure, got {other:?}"),
        }

        let diverged = State::new(f64::INFINITY, 1.0, 0.0, 1.0);
        assert!(check_physical(1.0, diverged).is_err());
        assert!(check_physical(1.0, init()).is_ok());
    }
}
