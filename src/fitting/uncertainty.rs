//! Standard errors of fitted parameters.
//!
//! The covariance is estimated in the search (internal) coordinates as
//! `redchi * inv(JᵀJ)`, with `redchi = SSR / (m - n)`. It is carried to the
//! external value through the derivative of the bounds transform.

use nalgebra::{Cholesky, DMatrix};
use ndarray::{Array1, Array2};

use crate::parameters::BoundsTransform;
use crate::utils::matrix_convert::ndarray_to_nalgebra;

/// Standard error of each parameter, or `None` where it is not defined.
///
/// A parameter has no standard error when the problem has no residual
/// degrees of freedom, when its Jacobian column vanishes (pinned by its
/// bounds, or sitting on one), or when the normal matrix of the remaining
/// columns is singular.
pub fn standard_errors(
    jacobian: &Array2<f64>,
    internal: &Array1<f64>,
    transforms: &[BoundsTransform],
    ssr: f64,
) -> Vec<Option<f64>> {
    let (m, n) = jacobian.dim();
    let mut errors = vec![None; n];
    if m <= n || !ssr.is_finite() {
        return errors;
    }

    let active: Vec<usize> = (0..n)
        .filter(|&j| {
            let col = jacobian.column(j);
            let derivative = transforms[j].external_derivative(internal[j]);
            col.dot(&col) > 0.0 && derivative.abs() > 1e-8
        })
        .collect();
    if active.is_empty() {
        return errors;
    }

    let sub = Array2::from_shape_fn((m, active.len()), |(i, k)| jacobian[[i, active[k]]]);
    let jtj: DMatrix<f64> = ndarray_to_nalgebra(&sub.t().dot(&sub));
    let inverse = match Cholesky::new(jtj) {
        Some(chol) => chol.inverse(),
        None => return errors,
    };

    let redchi = ssr / (m - n) as f64;
    for (k, &j) in active.iter().enumerate() {
        let var = redchi * inverse[(k, k)];
        if var.is_finite() && var >= 0.0 {
            let scale = transforms[j].external_derivative(internal[j]).abs();
            errors[j] = Some(var.sqrt() * scale);
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::Bounds;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn unit() -> BoundsTransform {
        BoundsTransform::new(Bounds::new(-1.0, 1.0).unwrap()).unwrap()
    }

    #[test]
    fn test_linear_regression_errors() {
        // y = a + b x at x = 0, 1, 2, 3; on [-1, 1] at internal 0 the
        // transform has unit slope.
        let jac = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let transforms = [unit(); 2];
        let ssr = 2.0;
        let errors = standard_errors(&jac, &array![0.0, 0.0], &transforms, ssr);

        // inv(JᵀJ) = [[0.7, -0.3], [-0.3, 0.2]], redchi = 1.
        assert_relative_eq!(errors[0].unwrap(), 0.7_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(errors[1].unwrap(), 0.2_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_no_degrees_of_freedom() {
        let jac = array![[1.0, 0.0], [0.0, 1.0]];
        let transforms = [unit(); 2];
        assert_eq!(standard_errors(&jac, &array![0.0, 0.0], &transforms, 1.0), vec![None, None]);
    }

    #[test]
    fn test_pinned_column_is_skipped() {
        let jac = array![[1.0, 0.0], [1.0, 0.0], [1.0, 0.0]];
        let transforms = [
            unit(),
            BoundsTransform::new(Bounds::new(2.0, 2.0).unwrap()).unwrap(),
        ];
        let errors = standard_errors(&jac, &array![0.0, 0.0], &transforms, 1.0);
        assert!(errors[0].is_some());
        assert!(errors[1].is_none());
    }
}
