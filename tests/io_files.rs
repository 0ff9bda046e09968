//! Reading and writing record files on disk.

mod common;

use std::fs;

use common::{reference_parameters, reference_state};
use fedbatch_rs::fitting::{FitSpec, Fitter};
use fedbatch_rs::io;
use fedbatch_rs::model::{Channel, ProductionMode};
use fedbatch_rs::simulator::Simulator;
use fedbatch_rs::strategy::Tunable;
use tempfile::tempdir;

#[test]
fn parameter_file_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("params.yml");

    io::write_parameters_yaml(&path, &reference_parameters()).unwrap();
    assert_eq!(io::read_parameters(&path).unwrap(), reference_parameters());
}

#[test]
fn full_fit_from_files() {
    let dir = tempdir().unwrap();
    let params = reference_parameters();

    // Export a simulation and feed part of it back as observed data.
    let series = Simulator::default()
        .simulate(&params, &reference_state(), 20.0, 2.0)
        .unwrap();
    let csv_path = dir.path().join("sim.csv");
    io::write_series_csv(&csv_path, &series, &params, ProductionMode::Induced).unwrap();

    let observed = io::read_observed(&csv_path).unwrap();
    assert_eq!(observed.len(), 11);
    assert_eq!(
        observed.channels(),
        vec![Channel::Biomass, Channel::Substrate, Channel::Product, Channel::Volume]
    );
    assert_eq!(observed.initial_state(), Some(reference_state()));

    let free_path = dir.path().join("free.yml");
    fs::write(&free_path, "mu_max: [0.55, 0.4, 0.8]\n").unwrap();
    let free = io::read_free_parameters(&free_path).unwrap();

    let result = Fitter::default()
        .fit(&observed, &FitSpec::from_parameters(&params, free), &reference_state())
        .unwrap();
    assert!((result.parameters.mu_max - 0.6).abs() < 6e-3);

    let json_path = dir.path().join("fit.json");
    io::write_json(&json_path, &result).unwrap();
    let text = fs::read_to_string(&json_path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    let written = json["parameters"]["mu_max"].as_f64().unwrap();
    assert!((written - result.parameters.mu_max).abs() < 1e-12);
    assert_eq!(json["fitted"]["mu_max"]["min"].as_f64(), Some(0.4));
}

#[test]
fn initial_state_and_bounds_files() {
    let dir = tempdir().unwrap();

    let init_path = dir.path().join("init.yml");
    fs::write(&init_path, "X: 0.5\nS: 20.0\nP: 0.0\nV: 1.0\n").unwrap();
    assert_eq!(io::read_initial_state(&init_path).unwrap(), reference_state());

    let bounds_path = dir.path().join("bounds.yml");
    fs::write(&bounds_path, "ti: [4.0, 24.0]\nk1: [0.0, 0.05]\nSf: [200, 600]\n").unwrap();
    let bounds = io::read_tunable_bounds(&bounds_path).unwrap();
    assert_eq!(
        bounds.keys().copied().collect::<Vec<_>>(),
        vec![Tunable::Ti, Tunable::K1, Tunable::Sf]
    );
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let err = io::read_parameters(dir.path().join("absent.yml")).unwrap_err();
    assert!(matches!(err, fedbatch_rs::FedBatchError::IoError(_)));
}
