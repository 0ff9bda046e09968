//! Global optimization methods for finding global minima.
//!
//! The strategy search minimizes a scalar cost over a box. Its surface has a
//! kink wherever `ti` crosses a reporting boundary and a cliff at the volume
//! constraint, so a population method is used instead of a gradient method.

use std::fmt;

use ndarray::Array1;
use rand::Rng;

use crate::error::{FedBatchError, Result};
use crate::parameters::Bounds;

mod differential_evolution;

pub use differential_evolution::DifferentialEvolution;

/// A scalar objective to be minimized.
pub trait CostFunction {
    /// Evaluate the cost at a point.
    fn cost(&self, params: &Array1<f64>) -> Result<f64>;

    /// Number of parameters.
    fn dimension(&self) -> usize;

    /// Costs at or above this level mark penalized, infeasible points.
    /// A population holding any of them is never reported as converged.
    fn infeasible_cost(&self) -> Option<f64> {
        None
    }
}

/// Trait for global optimization methods.
pub trait GlobalOptimizer {
    /// Run the optimization and return the best solution found.
    ///
    /// `initial`, when given and inside the bounds, is included in the first
    /// population so the result is never worse than it.
    fn optimize<C: CostFunction>(
        &self,
        cost: &C,
        bounds: &[Bounds],
        initial: Option<&Array1<f64>>,
    ) -> Result<GlobalOptResult>;
}

/// Result of a global optimization.
#[derive(Debug, Clone)]
pub struct GlobalOptResult {
    /// The best parameters found
    pub params: Array1<f64>,

    /// The best cost found
    pub cost: f64,

    /// The number of generations performed
    pub iterations: usize,

    /// The number of function evaluations
    pub func_evals: usize,

    /// Whether the population met the convergence tolerance
    pub converged: bool,

    /// A message describing the result
    pub message: String,
}

impl fmt::Display for GlobalOptResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Global Optimization Result:")?;
        writeln!(f, "  Converged: {}", self.converged)?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Parameters: {:?}", self.params)?;
        Ok(())
    }
}

/// Check that every bound is finite and that there is one per parameter.
fn check_bounds(bounds: &[Bounds], n_params: usize) -> Result<()> {
    if n_params != bounds.len() {
        return Err(FedBatchError::DimensionMismatch(format!(
            "Expected {} bounds for parameters, got {}",
            n_params,
            bounds.len()
        )));
    }
    if let Some(b) = bounds.iter().find(|b| !b.is_finite()) {
        return Err(FedBatchError::invalid(format!(
            "global search needs finite bounds, got [{}, {}]",
            b.min, b.max
        )));
    }
    Ok(())
}

/// Generate a random point within the given bounds.
fn random_point(bounds: &[Bounds], rng: &mut impl Rng) -> Array1<f64> {
    bounds
        .iter()
        .map(|b| {
            if b.width() > 0.0 {
                rng.gen_range(b.min..b.max)
            } else {
                b.min
            }
        })
        .collect()
}

/// Clip a point to the given bounds.
fn clip_to_bounds(point: &Array1<f64>, bounds: &[Bounds]) -> Array1<f64> {
    point
        .iter()
        .zip(bounds)
        .map(|(&x, b)| b.clamp(x))
        .collect()
}

/// Create a population of random points within the given bounds.
fn create_population(bounds: &[Bounds], pop_size: usize, rng: &mut impl Rng) -> Vec<Array1<f64>> {
    (0..pop_size).map(|_| random_point(bounds, rng)).collect()
}

/// Evaluate the cost for each point in a population.
fn evaluate_population<C: CostFunction>(cost: &C, population: &[Array1<f64>]) -> Result<Vec<f64>> {
    population.iter().map(|point| cost.cost(point)).collect()
}

/// Index of the lowest cost.
fn argmin(costs: &[f64]) -> usize {
    costs
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_population_within_bounds() {
        let bounds = [Bounds::new(0.0, 1.0).unwrap(), Bounds::new(5.0, 5.0).unwrap()];
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let population = create_population(&bounds, 50, &mut rng);
        assert_eq!(population.len(), 50);
        for point in &population {
            assert!((0.0..1.0).contains(&point[0]));
            assert_eq!(point[1], 5.0);
        }
    }

    #[test]
    fn test_clip_to_bounds() {
        let bounds = [Bounds::new(0.0, 1.0).unwrap(), Bounds::new(-1.0, 1.0).unwrap()];
        let clipped = clip_to_bounds(&Array1::from(vec![1.5, -3.0]), &bounds);
        assert_eq!(clipped, Array1::from(vec![1.0, -1.0]));
    }

    #[test]
    fn test_check_bounds() {
        let finite = [Bounds::new(0.0, 1.0).unwrap()];
        assert!(check_bounds(&finite, 1).is_ok());
        assert!(check_bounds(&finite, 2).is_err());
        assert!(check_bounds(&[Bounds::min_only(0.0)], 1).is_err());
    }

    #[test]
    fn test_argmin_ignores_order_of_ties() {
        assert_eq!(argmin(&[3.0, 1.0, 2.0]), 1);
        assert_eq!(argmin(&[]), 0);
    }
}
