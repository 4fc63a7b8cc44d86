//! Perturbed-observation noise.

use nd::{Array, ArrayView, Ix2};

use rand::Rng;

use na_core::{Covariance, Error, Result};

use crate::utils::{make_2d_randn, sqrt_factor};

/// Draws `(block.rows, members)` observation noise with covariance
/// `block`, the lag-window block form of `covariance`.
///
/// Isotropic noise is drawn entry by entry with standard deviation
/// `sqrt(c)`. Matrix noise applies a square root factor `F` of the block
/// (`F F^T = block`, from its eigendecomposition) to unit normal draws, so that both branches produce
/// samples whose covariance is `block`.
pub fn observation_perturbation<R>(covariance: &Covariance,
                                   block: ArrayView<f64, Ix2>,
                                   members: usize,
                                   rand: &mut R) -> Result<Array<f64, Ix2>>
  where R: Rng + ?Sized,
{
  let (rows, cols) = block.dim();
  if rows != cols {
    return Err(Error::InvalidCovarianceShape { shape: vec![rows, cols], });
  }

  match covariance {
    &Covariance::Scalar(c) => {
      Ok(make_2d_randn((rows, members), c.sqrt(), rand))
    },
    &Covariance::Matrix(_) => {
      let f = sqrt_factor(&block)?;
      let z = make_2d_randn((rows, members), 1.0, rand);
      Ok(f.dot(&z))
    },
  }
}
