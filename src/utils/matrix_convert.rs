//! Conversions between ndarray and nalgebra.
//!
//! Problems and results use ndarray. The linear solves inside the
//! Levenberg-Marquardt step and the covariance estimate use nalgebra's
//! decompositions.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};

/// Convert an ndarray Array2 to a nalgebra DMatrix.
pub fn ndarray_to_nalgebra(arr: &Array2<f64>) -> DMatrix<f64> {
    let (rows, cols) = arr.dim();
    DMatrix::from_fn(rows, cols, |i, j| arr[[i, j]])
}

/// Convert an ndarray Array1 to a nalgebra DVector.
pub fn ndarray_vec_to_nalgebra(arr: &Array1<f64>) -> DVector<f64> {
    DVector::from_iterator(arr.len(), arr.iter().copied())
}

/// Convert a nalgebra DVector to an ndarray Array1.
pub fn nalgebra_vec_to_ndarray(vec: &DVector<f64>) -> Array1<f64> {
    Array1::from_iter(vec.iter().copied())
}
