//! Bridges to nalgebra for the factorizations the updates need.

use nalgebra::{Cholesky, DMatrix, Dyn, SymmetricEigen};
use nd::{Array, ArrayBase, Data, Ix2};

use rand::Rng;
use rand_distr::StandardNormal;

use na_core::{Error, Result};

/// Eigenvalues below this (relative to the largest one) are treated as
/// zero when taking a semidefinite square root.
const EIGEN_TOL: f64 = 1.0e-12;

pub fn to_matrix<S>(a: &ArrayBase<S, Ix2>) -> DMatrix<f64>
  where S: Data<Elem = f64>,
{
  let (m, n) = a.dim();
  DMatrix::from_fn(m, n, |i, j| a[[i, j]])
}

pub fn from_matrix(m: &DMatrix<f64>) -> Array<f64, Ix2> {
  Array::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

/// Unit normal draws scaled by `scale`.
pub fn make_2d_randn<R>(dim: (usize, usize),
                        scale: f64,
                        rand: &mut R) -> Array<f64, Ix2>
  where R: Rng + ?Sized,
{
  let mut r: Array<f64, Ix2> = ArrayBase::zeros(dim);
  for v in r.iter_mut() {
    let z: f64 = rand.sample(StandardNormal);
    *v = z * scale;
  }

  r
}

fn factor<S>(a: &ArrayBase<S, Ix2>) -> Result<Cholesky<f64, Dyn>>
  where S: Data<Elem = f64>,
{
  let (m, n) = a.dim();
  if m != n {
    return Err(Error::mismatch("cholesky input columns", m, n));
  }
  if a.iter().any(|v| !v.is_finite()) {
    return Err(Error::NumericalFailure("matrix has non-finite entries".into()));
  }
  to_matrix(a)
    .cholesky()
    .ok_or_else(|| Error::NumericalFailure(format!("{}x{} matrix is not positive definite", m, m)))
}

/// Lower triangular `L` with `L L^T = a`. Fails unless `a` is
/// symmetric positive definite.
pub fn cholesky<S>(a: &ArrayBase<S, Ix2>) -> Result<Array<f64, Ix2>>
  where S: Data<Elem = f64>,
{
  Ok(from_matrix(&factor(a)?.l()))
}

/// `F` with `F F^T = a` for symmetric positive semidefinite `a`, built
/// as `V sqrt(Λ)` from the eigendecomposition. Used to draw correlated
/// noise, where singular covariances are fine.
pub fn sqrt_factor<S>(a: &ArrayBase<S, Ix2>) -> Result<Array<f64, Ix2>>
  where S: Data<Elem = f64>,
{
  let (m, n) = a.dim();
  if m != n {
    return Err(Error::mismatch("square root input columns", m, n));
  }
  if a.iter().any(|v| !v.is_finite()) {
    return Err(Error::NumericalFailure("matrix has non-finite entries".into()));
  }

  let eigen = SymmetricEigen::new(to_matrix(a));
  let scale = eigen.eigenvalues.iter().fold(0.0f64, |s, v| s.max(v.abs()));
  let tol = EIGEN_TOL * if scale > 0.0 { scale } else { 1.0 };

  let mut f = eigen.eigenvectors;
  for (j, &lambda) in eigen.eigenvalues.iter().enumerate() {
    if lambda < -tol {
      return Err(Error::NumericalFailure(format!("matrix is not positive semidefinite (eigenvalue {:e})", lambda)));
    }
    let s = if lambda > 0.0 { lambda.sqrt() } else { 0.0 };
    f.column_mut(j).scale_mut(s);
  }

  Ok(from_matrix(&f))
}

/// `L^-1 b` where `L L^T = a`; columns of the result have unit
/// covariance when `b`'s columns have covariance `a`.
pub fn whiten<S1, S2>(a: &ArrayBase<S1, Ix2>, b: &ArrayBase<S2, Ix2>) -> Result<Array<f64, Ix2>>
  where S1: Data<Elem = f64>,
        S2: Data<Elem = f64>,
{
  if a.dim().0 != b.dim().0 {
    return Err(Error::mismatch("whitened rows", a.dim().0, b.dim().0));
  }
  let l = factor(a)?.l();
  l.solve_lower_triangular(&to_matrix(b))
    .map(|w| from_matrix(&w))
    .ok_or_else(|| Error::NumericalFailure("singular cholesky factor".into()))
}

/// Solves `a x = b` for symmetric positive definite `a`.
pub fn spd_solve<S1, S2>(a: &ArrayBase<S1, Ix2>, b: &ArrayBase<S2, Ix2>) -> Result<Array<f64, Ix2>>
  where S1: Data<Elem = f64>,
        S2: Data<Elem = f64>,
{
  if a.dim().0 != b.dim().0 {
    return Err(Error::mismatch("linear solve rows", a.dim().0, b.dim().0));
  }
  let chol = factor(a)?;
  Ok(from_matrix(&chol.solve(&to_matrix(b))))
}
