//! Properties of the model equations.

mod common;

use approx::assert_relative_eq;
use common::{reference_parameters, reference_state};
use fedbatch_rs::model::{
    derivatives, derivatives_in_phase, feed_rate, feed_rate_in_phase, specific_rates, FeedPhase,
    ProductionMode, State,
};

#[test]
fn feed_switches_exactly_at_induction() {
    let mut params = reference_parameters();
    params.fi = Some(0.2);

    let at_ti = feed_rate(params.ti, &params);
    let left = feed_rate_in_phase(params.ti, &params, FeedPhase::Growth);

    assert_eq!(FeedPhase::at(params.ti, &params), FeedPhase::Production);
    assert_relative_eq!(at_ti, 0.2);
    assert_relative_eq!(left, params.k1 * params.ti + params.b);
    assert!((at_ti - left).abs() > 1e-3);
}

#[test]
fn default_induction_feed_is_continuous() {
    let params = reference_parameters();
    let left = feed_rate_in_phase(params.ti, &params, FeedPhase::Growth);
    assert_relative_eq!(feed_rate(params.ti, &params), left, epsilon = 1e-15);
    assert_relative_eq!(
        feed_rate(params.ti + 5.0, &params),
        left + params.k2 * 5.0,
        epsilon = 1e-12
    );
}

#[test]
fn feed_is_never_negative() {
    let mut params = reference_parameters();
    params.k2 = -1.0;
    assert_eq!(feed_rate(params.ti + 10.0, &params), 0.0);
    let d = derivatives(params.ti + 10.0, &reference_state(), &params, ProductionMode::Induced);
    assert_eq!(d.dv, 0.0);
}

#[test]
fn volume_derivative_is_feed() {
    let params = reference_parameters();
    for t in [0.0, 3.0, 9.99, 10.0, 20.0] {
        let d = derivatives(t, &reference_state(), &params, ProductionMode::Induced);
        assert_eq!(d.dv, feed_rate(t, &params));
    }
}

#[test]
fn product_is_gated_by_induction() {
    let params = reference_parameters();
    let state = State::new(2.0, 10.0, 0.0, 1.2);

    let before = derivatives(params.ti - 1.0, &state, &params, ProductionMode::Induced);
    assert_eq!(before.dp, 0.0);

    let after = derivatives(params.ti, &state, &params, ProductionMode::Induced);
    assert!(after.dp > 0.0);

    let continuous = derivatives(params.ti - 1.0, &state, &params, ProductionMode::Continuous);
    assert!(continuous.dp > 0.0);
}

#[test]
fn luedeking_piret_rates() {
    let params = reference_parameters();
    let state = State::new(2.0, 10.0, 0.0, 1.2);
    let r = specific_rates(params.ti + 1.0, &state, &params, ProductionMode::Induced);

    let mu = 0.6 * 10.0 / 10.1;
    let q_p = (0.1 * mu + 0.02) * 10.0 / 10.5;
    assert_relative_eq!(r.mu, mu, epsilon = 1e-12);
    assert_relative_eq!(r.q_p, q_p, epsilon = 1e-12);
    assert_relative_eq!(r.q_s, mu / 0.5 + 0.05 + q_p / 0.2, epsilon = 1e-12);
}

#[test]
fn degenerate_states_stay_finite() {
    let params = reference_parameters();
    for state in [
        State::new(1.0, 0.0, 0.1, 1.0),
        State::new(1.0, -1e-9, 0.1, 1.0),
        State::new(1.0, 5.0, 0.1, 0.0),
        State::new(-1e-12, 5.0, -1e-12, -1e-6),
    ] {
        for phase in [FeedPhase::Growth, FeedPhase::Production] {
            let d = derivatives_in_phase(12.0, &state, &params, ProductionMode::Continuous, phase);
            assert!(d.dx.is_finite() && d.ds.is_finite() && d.dp.is_finite() && d.dv.is_finite());
        }
    }

    let empty = State::new(1.0, 0.0, 0.0, 1.0);
    let starved = specific_rates(12.0, &empty, &params, ProductionMode::Induced);
    assert_eq!((starved.mu, starved.q_p, starved.q_s), (0.0, 0.0, 0.0));
}
