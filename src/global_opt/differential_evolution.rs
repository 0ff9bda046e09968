//! Differential Evolution algorithm for global optimization.
//!
//! A population-based stochastic minimizer over a box. Trial vectors are
//! built from scaled differences of population members and accepted
//! greedily, one member at a time, so an improved best is used immediately
//! by the next trial of the same generation.

use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use crate::error::Result;
use crate::global_opt::{
    argmin, check_bounds, clip_to_bounds, create_population, evaluate_population, CostFunction,
    GlobalOptResult, GlobalOptimizer,
};
use crate::parameters::Bounds;

/// Differential Evolution optimizer, `best1bin` variant.
///
/// Mutants are `x_best + F * (x_r1 - x_r2)` followed by binomial crossover.
/// Defaults: population of 15 per parameter, mutation factor redrawn each
/// generation from `[0.5, 1.0)`, crossover probability 0.7, at most 100
/// generations, relative tolerance 0.01 on the spread of population costs.
#[derive(Debug, Clone)]
pub struct DifferentialEvolution {
    /// Population size multiplier (population size = multiplier * parameter count)
    pub pop_size_multiplier: usize,

    /// Range of the mutation factor F. Equal ends give a constant F.
    pub mutation: (f64, f64),

    /// Crossover probability (CR) in range [0, 1]
    pub crossover_prob: f64,

    /// Maximum number of generations
    pub max_iterations: usize,

    /// Relative tolerance on the standard deviation of population costs
    pub tol: f64,

    /// Absolute tolerance on the standard deviation of population costs
    pub atol: f64,

    /// RNG seed. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for DifferentialEvolution {
    fn default() -> Self {
        Self {
            pop_size_multiplier: 15,
            mutation: (0.5, 1.0),
            crossover_prob: 0.7,
            max_iterations: 100,
            tol: 0.01,
            atol: 0.0,
            seed: None,
        }
    }
}

impl DifferentialEvolution {
    /// Create a new DifferentialEvolution optimizer with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the population size multiplier.
    pub fn with_population_size(mut self, multiplier: usize) -> Self {
        self.pop_size_multiplier = multiplier;
        self
    }

    /// Set the maximum number of generations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the relative convergence tolerance.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set the random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn population_size(&self, n_params: usize) -> usize {
        (self.pop_size_multiplier * n_params).max(5)
    }

    fn draw_weight(&self, rng: &mut impl Rng) -> f64 {
        let (lo, hi) = self.mutation;
        if hi > lo {
            rng.gen_range(lo..hi)
        } else {
            lo
        }
    }

    /// Create a trial vector for population member `target_idx`.
    fn create_trial_vector(
        &self,
        target_idx: usize,
        best_idx: usize,
        weight: f64,
        population: &[Array1<f64>],
        bounds: &[Bounds],
        rng: &mut impl Rng,
    ) -> Array1<f64> {
        let n_params = population[target_idx].len();

        let mut others: Vec<usize> = (0..population.len()).filter(|&i| i != target_idx).collect();
        others.shuffle(rng);

        let (r1, r2) = (others[0], others[1]);
        let mut trial = &population[best_idx] + &((&population[r1] - &population[r2]) * weight);

        // Binomial crossover; one component always comes from the mutant.
        let target = &population[target_idx];
        let j_rand = rng.gen_range(0..n_params);
        for j in 0..n_params {
            if j != j_rand && rng.gen::<f64>() >= self.crossover_prob {
                trial[j] = target[j];
            }
        }

        clip_to_bounds(&trial, bounds)
    }

    /// Spread test on the population costs. A penalty plateau is flat, so
    /// penalized members rule convergence out instead of satisfying it.
    fn converged(&self, costs: &[f64], infeasible_cost: Option<f64>) -> bool {
        if let Some(limit) = infeasible_cost {
            if costs.iter().any(|&c| c >= limit) {
                return false;
            }
        }
        let n = costs.len() as f64;
        let mean = costs.iter().sum::<f64>() / n;
        let var = costs.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n;
        var.sqrt() <= self.atol + self.tol * mean.abs()
    }
}

impl GlobalOptimizer for DifferentialEvolution {
    fn optimize<C: CostFunction>(
        &self,
        cost: &C,
        bounds: &[Bounds],
        initial: Option<&Array1<f64>>,
    ) -> Result<GlobalOptResult> {
        let n_params = cost.dimension();
        check_bounds(bounds, n_params)?;

        let mut rng = match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let pop_size = self.population_size(n_params);
        let mut population = create_population(bounds, pop_size, &mut rng);
        if let Some(x0) = initial {
            if x0.len() == n_params && x0.iter().zip(bounds).all(|(&x, b)| b.is_within_bounds(x)) {
                population[0] = x0.clone();
            }
        }

        let mut costs = evaluate_population(cost, &population)?;
        let mut func_evals = population.len();
        let mut best_idx = argmin(&costs);

        let infeasible_cost = cost.infeasible_cost();
        let mut iterations = 0;
        let mut converged = false;

        while !converged && iterations < self.max_iterations {
            let weight = self.draw_weight(&mut rng);

            for i in 0..pop_size {
                let trial =
                    self.create_trial_vector(i, best_idx, weight, &population, bounds, &mut rng);
                let trial_cost = cost.cost(&trial)?;
                func_evals += 1;

                if trial_cost <= costs[i] {
                    population[i] = trial;
                    costs[i] = trial_cost;
                    if trial_cost < costs[best_idx] {
                        best_idx = i;
                    }
                }
            }

            iterations += 1;
            converged = self.converged(&costs, infeasible_cost);
            trace!(iterations, best = costs[best_idx], weight, "de generation");
        }

        let message = if converged {
            format!("Population converged after {} generations", iterations)
        } else {
            format!("Reached maximum number of generations: {}", self.max_iterations)
        };
        debug!(
            iterations,
            func_evals,
            best = costs[best_idx],
            converged,
            "differential evolution finished"
        );

        Ok(GlobalOptResult {
            params: population[best_idx].clone(),
            cost: costs[best_idx],
            iterations,
            func_evals,
            converged,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FedBatchError;

    /// f(x, y) = sin(x) cos(y) + 0.1 x^2 + 0.1 y^2, global minimum near (-1.3, 0).
    struct MultiMinima;

    impl CostFunction for MultiMinima {
        fn cost(&self, p: &Array1<f64>) -> Result<f64> {
            Ok(p[0].sin() * p[1].cos() + 0.1 * p[0].powi(2) + 0.1 * p[1].powi(2))
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    fn bounds() -> Vec<Bounds> {
        vec![Bounds::new(-10.0, 10.0).unwrap(), Bounds::new(-10.0, 10.0).unwrap()]
    }

    #[test]
    fn test_finds_global_minimum() {
        let optimizer = DifferentialEvolution::new()
            .with_seed(42)
            .with_max_iterations(200)
            .with_tol(1e-8);
        let result = optimizer.optimize(&MultiMinima, &bounds(), None).unwrap();

        assert!(result.cost < -0.7, "{}", result);
        assert!((result.params[0] + 1.31).abs() < 0.1);
        assert!(result.params[1].abs() < 0.1);
    }

    #[test]
    fn test_same_seed_same_result() {
        let optimizer = DifferentialEvolution::new().with_seed(3).with_max_iterations(10);
        let a = optimizer.optimize(&MultiMinima, &bounds(), None).unwrap();
        let b = optimizer.optimize(&MultiMinima, &bounds(), None).unwrap();
        assert_eq!(a.params, b.params);
        assert_eq!(a.func_evals, b.func_evals);
    }

    #[test]
    fn test_initial_point_is_kept_when_best() {
        // With zero generations the result is the best of the first population.
        let optimizer = DifferentialEvolution::new().with_seed(1).with_max_iterations(0);
        let x0 = Array1::from(vec![-1.306, 0.0]);
        let result = optimizer.optimize(&MultiMinima, &bounds(), Some(&x0)).unwrap();
        assert_eq!(result.params, x0);
        assert_eq!(result.iterations, 0);
    }

    /// Penalized everywhere except a sliver `x <= 0.02` of `[0, 1]`, with the
    /// penalty growing with the distance to it.
    struct Sliver;

    impl CostFunction for Sliver {
        fn cost(&self, p: &Array1<f64>) -> Result<f64> {
            let x = p[0];
            Ok(if x > 0.02 { 1e6 + (x - 0.02) } else { -x })
        }

        fn dimension(&self) -> usize {
            1
        }

        fn infeasible_cost(&self) -> Option<f64> {
            Some(1e6)
        }
    }

    #[test]
    fn test_penalty_plateau_is_not_convergence() {
        let bounds = [Bounds::new(0.0, 1.0).unwrap()];
        let optimizer = DifferentialEvolution::new().with_seed(4).with_max_iterations(30);
        let result = optimizer.optimize(&Sliver, &bounds, None).unwrap();

        assert!(result.iterations > 0);
        assert!(result.cost <= 0.0, "{}", result);
        assert!(result.params[0] <= 0.02);
    }

    #[test]
    fn test_runs_a_generation_before_checking_spread() {
        struct Flat;
        impl CostFunction for Flat {
            fn cost(&self, _: &Array1<f64>) -> Result<f64> {
                Ok(1.0)
            }
            fn dimension(&self) -> usize {
                2
            }
        }

        let result = DifferentialEvolution::new()
            .with_seed(2)
            .optimize(&Flat, &bounds(), None)
            .unwrap();
        assert!(result.converged);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.func_evals, 60);
    }

    #[test]
    fn test_rejects_unbounded_dimension() {
        let optimizer = DifferentialEvolution::new();
        let err = optimizer
            .optimize(&MultiMinima, &[Bounds::new(0.0, 1.0).unwrap(), Bounds::unbounded()], None)
            .unwrap_err();
        assert!(matches!(err, FedBatchError::InvalidSpec(_)));
    }
}
