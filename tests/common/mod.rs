#![allow(dead_code)]

use fedbatch_rs::model::{ModelParameters, State};

/// A record close to a typical squalene fed-batch run.
pub fn reference_parameters() -> ModelParameters {
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
        k2: 0.002,
        fi: None,
    }
}

pub fn reference_state() -> State {
    State::new(0.5, 20.0, 0.0, 1.0)
}
