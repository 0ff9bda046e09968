//! Model equations: feed law, specific rates and state derivatives.
//!
//! All functions here are pure. The feed phase is either derived from `t`
//! and `ti` or passed in explicitly; the explicit form lets the integrator
//! hold one phase for a whole segment so that no Runge-Kutta stage evaluated
//! exactly at `ti` picks up the other branch.

use std::fmt;
use std::str::FromStr;

use ode_solvers::{System, Vector4};
use serde::{Deserialize, Serialize};

use super::parameters::ModelParameters;
use super::state::State;
use crate::error::FedBatchError;

/// Feeding control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedPhase {
    /// Before induction: feed ramps up to build biomass.
    Growth,
    /// At and after induction: feed follows the production law.
    Production,
}

impl FeedPhase {
    /// The phase in effect at time `t`. The switch happens exactly at `ti`.
    pub fn at(t: f64, params: &ModelParameters) -> Self {
        if t < params.ti {
            FeedPhase::Growth
        } else {
            FeedPhase::Production
        }
    }
}

/// Whether product formation is gated by induction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionMode {
    /// No product is formed before `ti`.
    #[default]
    Induced,
    /// Product is formed throughout the run.
    Continuous,
}

impl fmt::Display for ProductionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductionMode::Induced => f.write_str("induced"),
            ProductionMode::Continuous => f.write_str("continuous"),
        }
    }
}

impl FromStr for ProductionMode {
    type Err = FedBatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "induced" => Ok(ProductionMode::Induced),
            "continuous" => Ok(ProductionMode::Continuous),
            other => Err(FedBatchError::invalid(format!(
                "unknown production mode: {} (expected induced or continuous)",
                other
            ))),
        }
    }
}

/// Specific rates at one point of the trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpecificRates {
    /// Specific growth rate (1/h)
    pub mu: f64,
    /// Specific product formation rate (g/g/h)
    #[serde(rename = "qP")]
    pub q_p: f64,
    /// Specific substrate uptake rate (g/g/h)
    #[serde(rename = "qS")]
    pub q_s: f64,
}

/// Time derivative of the state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derivatives {
    pub dx: f64,
    pub ds: f64,
    pub dp: f64,
    pub dv: f64,
}

/// Feed rate F(t) in L/h.
pub fn feed_rate(t: f64, params: &ModelParameters) -> f64 {
    feed_rate_in_phase(t, params, FeedPhase::at(t, params))
}

/// Feed rate F(t) in L/h under an explicit phase. Never negative.
pub fn feed_rate_in_phase(t: f64, params: &ModelParameters, phase: FeedPhase) -> f64 {
    let f = match phase {
        FeedPhase::Growth => params.k1 * t + params.b,
        FeedPhase::Production => params.induction_feed() + params.k2 * (t - params.ti),
    };
    f.max(0.0)
}

/// Specific rates at time `t`.
pub fn specific_rates(
    t: f64,
    state: &State,
    params: &ModelParameters,
    mode: ProductionMode,
) -> SpecificRates {
    specific_rates_in_phase(state, params, mode, FeedPhase::at(t, params))
}

/// Specific rates under an explicit phase.
///
/// Monod growth, Luedeking-Piret production with substrate saturation, and
/// substrate uptake for growth, maintenance and production. All rates are
/// zero once substrate is exhausted.
pub fn specific_rates_in_phase(
    state: &State,
    params: &ModelParameters,
    mode: ProductionMode,
    phase: FeedPhase,
) -> SpecificRates {
    let s = state.s;
    if s <= 0.0 {
        return SpecificRates {
            mu: 0.0,
            q_p: 0.0,
            q_s: 0.0,
        };
    }

    let mu = params.mu_max * s / (params.ks + s);

    let producing = match mode {
        ProductionMode::Continuous => true,
        ProductionMode::Induced => phase == FeedPhase::Production,
    };
    let q_p = if producing {
        (params.alpha * mu + params.beta) * s / (params.ks_p + s)
    } else {
        0.0
    };

    let q_s = mu / params.y_xs + params.ms + q_p / params.y_ps;

    SpecificRates { mu, q_p, q_s }
}

/// State derivative at time `t`.
pub fn derivatives(
    t: f64,
    state: &State,
    params: &ModelParameters,
    mode: ProductionMode,
) -> Derivatives {
    derivatives_in_phase(t, state, params, mode, FeedPhase::at(t, params))
}

/// State derivative under an explicit phase.
pub fn derivatives_in_phase(
    t: f64,
    state: &State,
    params: &ModelParameters,
    mode: ProductionMode,
    phase: FeedPhase,
) -> Derivatives {
    let f = feed_rate_in_phase(t, params, phase);
    let dilution = if state.v > 0.0 { f / state.v } else { 0.0 };

    let x = state.x.max(0.0);
    let p = state.p.max(0.0);
    let rates = specific_rates_in_phase(state, params, mode, phase);

    Derivatives {
        dx: (rates.mu - dilution) * x,
        ds: dilution * (params.sf - state.s.max(0.0)) - rates.q_s * x,
        dp: rates.q_p * x - dilution * p,
        dv: f,
    }
}

/// The model bound to one parameter record and one feed phase, in the form
/// the ODE solver consumes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FedBatchSystem {
    pub params: ModelParameters,
    pub mode: ProductionMode,
    pub phase: FeedPhase,
}

impl System<f64, Vector4<f64>> for FedBatchSystem {
    fn system(&self, t: f64, y: &Vector4<f64>, dy: &mut Vector4<f64>) {
        let state = State::from_vector(y);
        let d = derivatives_in_phase(t, &state, &self.params, self.mode, self.phase);
        dy[0] = d.dx;
        dy[1] = d.ds;
        dy[2] = d.dp;
        dy[3] = d.dv;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[test]
    fn test_feed_rate_piecewise() {
        let p = params();
        assert_eq!(feed_rate(0.0, &p), p.b);
        assert_relative_eq!(feed_rate(5.0, &p), p.k1 * 5.0 + p.b);

        let fi = p.k1 * p.ti + p.b;
        assert_relative_eq!(feed_rate(10.0, &p), fi);
        assert_relative_eq!(feed_rate(12.0, &p), fi + p.k2 * 2.0);
    }

    #[test]
    fn test_feed_rate_switch_is_exact() {
        let p = ModelParameters {
            k2: -0.005,
            fi: Some(0.05),
            ..params()
        };
        // At ti the production law applies.
        assert_relative_eq!(feed_rate(p.ti, &p), 0.05);
        // Just before, the growth ramp is still in force.
        let left = feed_rate(p.ti - 1e-9, &p);
        assert_relative_eq!(left, p.k1 * p.ti + p.b, epsilon = 1e-9);
        assert!((left - feed_rate(p.ti, &p)).abs() > 0.05);
    }

    #[test]
    fn test_feed_rate_never_negative() {
        let p = ModelParameters {
            k2: -1.0,
            ..params()
        };
        assert_eq!(feed_rate(30.0, &p), 0.0);
    }

    #[test]
    fn test_rates_before_and_after_induction() {
        let p = params();
        let state = State::new(1.0, 100.0, 0.0, 1.0);

        let before = specific_rates(5.0, &state, &p, ProductionMode::Induced);
        assert_relative_eq!(before.mu, 0.6 * 100.0 / 100.1, max_relative = 1e-12);
        assert_eq!(before.q_p, 0.0);

        let after = specific_rates(15.0, &state, &p, ProductionMode::Induced);
        let expected = (p.alpha * after.mu + p.beta) * 100.0 / 100.5;
        assert_relative_eq!(after.q_p, expected, max_relative = 1e-12);

        let continuous = specific_rates(5.0, &state, &p, ProductionMode::Continuous);
        assert_relative_eq!(continuous.q_p, expected, max_relative = 1e-12);
    }

    #[test]
    fn test_derivatives_growth_phase() {
        let p = params();
        let state = State::new(1.0, 20.0, 0.0, 1.0);
        let d = derivatives(5.0, &state, &p, ProductionMode::Induced);

        let f = p.k1 * 5.0 + p.b;
        let mu = 0.6 * 20.0 / 20.1;
        assert_relative_eq!(d.dv, f);
        assert_eq!(d.dp, 0.0);
        assert_relative_eq!(d.dx, (mu - f) * 1.0, max_relative = 1e-12);
        let q_s = mu / 0.5 + 0.05;
        assert_relative_eq!(d.ds, f * (500.0 - 20.0) - q_s, max_relative = 1e-12);
    }

    #[test]
    fn test_degenerate_states_stay_finite() {
        let p = params();
        let d = derivatives(5.0, &State::new(1.0, -1e-9, 0.0, 1.0), &p, ProductionMode::Induced);
        assert!(d.dx.is_finite() && d.ds.is_finite());
        assert!(d.dx < 0.0, "only dilution acts without substrate");

        let d = derivatives(5.0, &State::new(1.0, 10.0, 0.5, 0.0), &p, ProductionMode::Induced);
        assert!(d.dx.is_finite() && d.ds.is_finite() && d.dp.is_finite());
        assert_eq!(d.dv, feed_rate(5.0, &p));

        let zero_ks = ModelParameters { ks: 0.0, ks_p: 0.0, ..p };
        let starved = State::new(1.0, 0.0, 0.0, 1.0);
        let d = derivatives(15.0, &starved, &zero_ks, ProductionMode::Induced);
        assert!(d.dx.is_finite() && d.dp.is_finite());
    }

    #[test]
    fn test_system_uses_pinned_phase() {
        let p = params();
        let y = State::new(1.0, 100.0, 0.0, 1.0).to_vector();
        let mut dy = Vector4::zeros();

        let growth = FedBatchSystem {
            params: p,
            mode: ProductionMode::Induced,
            phase: FeedPhase::Growth,
        };
        // Evaluated at ti, but the segment is still the growth segment.
        growth.system(p.ti, &y, &mut dy);
        assert_eq!(dy[2], 0.0);

        let production = FedBatchSystem {
            phase: FeedPhase::Production,
            ..growth
        };
        production.system(p.ti, &y, &mut dy);
        assert!(dy[2] > 0.0);
    }
}
