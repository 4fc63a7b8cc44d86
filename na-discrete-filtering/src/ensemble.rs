//! Common stuffs for ensembles/particles. Members are columns.

use nd::{Array, ArrayView, Axis, Ix1, Ix2};
use nd::parallel::prelude::*;

use na_core::{Error, Result};

pub fn ensemble_mean(ensemble: ArrayView<f64, Ix2>) -> Result<Array<f64, Ix1>> {
  ensemble.mean_axis(Axis(1))
    .ok_or_else(|| Error::mismatch("ensemble members", 1, 0))
}

/// Members minus the ensemble mean, multiplied by `inflation`.
pub fn anomalies(ensemble: ArrayView<f64, Ix2>, inflation: f64) -> Result<Array<f64, Ix2>> {
  let mean = ensemble_mean(ensemble)?;
  let mut x = ensemble.to_owned();
  x.axis_iter_mut(Axis(1))
    .into_par_iter()
    .for_each(|mut member| {
      member -= &mean;
      if inflation != 1.0 {
        member *= inflation;
      }
    });
  Ok(x)
}

/// Unbiased sample covariance of `a` against `b`, both `(rows, members)`
/// anomaly arrays.
pub fn cross_covariance(a: ArrayView<f64, Ix2>, b: ArrayView<f64, Ix2>) -> Result<Array<f64, Ix2>> {
  let n = a.dim().1;
  if n != b.dim().1 {
    return Err(Error::mismatch("ensemble members", n, b.dim().1));
  }
  if n < 2 {
    return Err(Error::NumericalFailure(format!("sample covariance needs at least two members, got {}", n)));
  }
  let mut c = a.dot(&b.t());
  c /= (n - 1) as f64;
  Ok(c)
}
