//! Command dispatch.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use fedbatch_rs::fitting::{FitSpec, Fitter};
use fedbatch_rs::global_opt::DifferentialEvolution;
use fedbatch_rs::io;
use fedbatch_rs::lm::LmConfig;
use fedbatch_rs::model::{ModelParameters, State};
use fedbatch_rs::simulator::{Simulator, SimulatorConfig};
use fedbatch_rs::strategy::{OptimizationSpec, StrategyOptimizer, Tunable};
use tracing::info;

use super::{Command, FitArgs, ModelArgs, OptimizeArgs, SimulateArgs};

pub fn run(command: Command) -> Result<()> {
    match command {
        Command::Simulate(args) => simulate(&args),
        Command::Fit(args) => fit(&args),
        Command::Optimize(args) => optimize(&args),
    }
}

/// Inputs every command starts from.
struct Setup {
    params: ModelParameters,
    simulator: Simulator,
    output: PathBuf,
}

impl Setup {
    fn load(args: &ModelArgs) -> Result<Self> {
        let params = io::read_parameters(&args.param)
            .with_context(|| format!("reading parameters from {}", args.param.display()))?;
        fs::create_dir_all(&args.output)
            .with_context(|| format!("creating output directory {}", args.output.display()))?;
        Ok(Self {
            params,
            simulator: Simulator::new(SimulatorConfig::default().with_production_mode(args.mode)),
            output: args.output.clone(),
        })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.output.join(name)
    }
}

fn default_init_path(param: &Path) -> PathBuf {
    param
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("init.yml")
}

fn load_init(args: &ModelArgs) -> Result<State> {
    let path = args.init.clone().unwrap_or_else(|| default_init_path(&args.param));
    io::read_initial_state(&path)
        .with_context(|| format!("reading initial state from {}", path.display()))
}

fn simulate(args: &SimulateArgs) -> Result<()> {
    let setup = Setup::load(&args.model)?;
    let init = load_init(&args.model)?;

    let series = setup
        .simulator
        .simulate(&setup.params, &init, args.t_end, args.step)?;

    let path = setup.path("simulation.csv");
    io::write_series_csv(&path, &series, &setup.params, args.model.mode)?;

    if let Some(end) = series.final_state() {
        println!("Final state at t = {} h: {}", args.t_end, end);
    }
    info!(path = %path.display(), samples = series.len(), "simulation saved");
    Ok(())
}

fn fit(args: &FitArgs) -> Result<()> {
    let setup = Setup::load(&args.model)?;
    let data = io::read_observed(&args.data)
        .with_context(|| format!("reading observed data from {}", args.data.display()))?;
    let free = io::read_free_parameters(&args.free)
        .with_context(|| format!("reading free parameters from {}", args.free.display()))?;

    let init = match (&args.model.init, data.initial_state()) {
        (Some(_), _) | (None, None) => load_init(&args.model)?,
        (None, Some(state)) => {
            info!("using the first observation as the initial state");
            state
        }
    };

    let spec = FitSpec::from_parameters(&setup.params, free);
    let fitter = Fitter::new(setup.simulator)
        .with_lm_config(LmConfig {
            max_iterations: args.max_iterations,
            ..LmConfig::default()
        })
        .with_reporting_step(args.step);
    let result = fitter.fit(&data, &spec, &init)?;

    println!("{}", result);

    io::write_parameters_yaml(setup.path("fitted_params.yml"), &result.parameters)?;
    io::write_series_csv(
        setup.path("fit_simulation.csv"),
        &result.series,
        &result.parameters,
        args.model.mode,
    )?;
    io::write_json(setup.path("fit_result.json"), &result)?;
    info!(output = %setup.output.display(), "fit results saved");
    Ok(())
}

fn optimize(args: &OptimizeArgs) -> Result<()> {
    let setup = Setup::load(&args.model)?;
    let init = load_init(&args.model)?;
    let all_bounds = io::read_tunable_bounds(&args.bounds)
        .with_context(|| format!("reading bounds from {}", args.bounds.display()))?;

    let flags = [
        (Tunable::Ti, args.opt_ti),
        (Tunable::K1, args.opt_k1),
        (Tunable::K2, args.opt_k2),
        (Tunable::B, args.opt_b),
        (Tunable::Sf, args.opt_sf),
    ];
    let mut spec = OptimizationSpec::new(setup.params, args.objective)
        .with_max_volume(args.max_volume)
        .with_horizon(args.horizon);
    for (tunable, selected) in flags {
        if !selected {
            continue;
        }
        match all_bounds.get(&tunable) {
            Some(bounds) => spec = spec.with_tunable(tunable, *bounds),
            None => bail!(
                "--opt-{} given but {} has no bounds",
                tunable.name().to_lowercase(),
                tunable
            ),
        }
    }
    if spec.tunables.is_empty() {
        bail!("no parameters selected for optimization, use flags like --opt-ti");
    }

    let tuned: Vec<&str> = spec.tunables.keys().map(|t| t.name()).collect();
    info!(objective = %args.objective, tuned = ?tuned, "starting strategy search");

    let mut search = DifferentialEvolution::new().with_max_iterations(args.generations);
    if let Some(seed) = args.seed {
        search = search.with_seed(seed);
    }
    let result = StrategyOptimizer::new(setup.simulator)
        .with_search(search)
        .optimize(&spec, &init)?;

    println!("{}", result);

    io::write_summary(setup.path("optimization_summary.txt"), &result)?;
    io::write_parameters_yaml(setup.path("optimized_params.yml"), &result.parameters)?;
    io::write_series_csv(
        setup.path("baseline_simulation.csv"),
        &result.baseline_series,
        &spec.baseline,
        args.model.mode,
    )?;
    io::write_series_csv(
        setup.path("optimized_simulation.csv"),
        &result.series,
        &result.parameters,
        args.model.mode,
    )?;
    io::write_json(setup.path("optimization_result.json"), &result)?;
    info!(output = %setup.output.display(), "optimization results saved");
    Ok(())
}
