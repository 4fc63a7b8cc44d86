//! Linear ODE systems `dy/dt = A y`, with `A` taken from the parameter
//! row after the initial condition.

use nd::{ArrayView, ArrayViewMut, Ix1, Ix2};

use na_core::{Error, Result};

/// Right hand side for `OdeEnsemble`. `theta` holds `A` row major.
pub fn linear_rhs(_: f64, y: ArrayView<f64, Ix1>, theta: ArrayView<f64, Ix1>, mut yp: ArrayViewMut<f64, Ix1>) {
  let n = y.len();
  debug_assert!(theta.len() >= n * n);

  for i in 0..n {
    let row = theta.slice(s![i * n..(i + 1) * n]);
    yp[i] = row.dot(&y);
  }
}

/// Parameter rows must carry `sim_dim` initial values and a full
/// `sim_dim x sim_dim` system matrix.
pub fn check_params(params: ArrayView<f64, Ix2>, sim_dim: usize) -> Result<()> {
  let expected = sim_dim + sim_dim * sim_dim;
  if params.dim().1 != expected {
    return Err(Error::mismatch("linear model parameter columns", expected, params.dim().1));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use nd::{arr1, arr2, Array};

  #[test]
  fn applies_row_major_matrix() {
    let y = arr1(&[1.0, 2.0]);
    let a = arr1(&[0.0, 1.0, -1.0, 0.0]);
    let mut yp = Array::zeros(2);
    linear_rhs(0.0, y.view(), a.view(), yp.view_mut());
    assert_eq!(yp, arr1(&[2.0, -1.0]));
  }

  #[test]
  fn param_width_is_checked() {
    assert!(check_params(arr2(&[[1.0, -0.5]]).view(), 1).is_ok());
    assert!(check_params(arr2(&[[1.0, 2.0, 3.0]]).view(), 2).is_err());
  }
}
