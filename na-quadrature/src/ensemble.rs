//! Runs one RK4 integration per ensemble member, in parallel.

use nd::{Array, ArrayView, ArrayViewMut, Axis, Ix1, Ix2};
use nd::parallel::prelude::*;

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use rand_distr::StandardNormal;

use na_core::{member_params, EnsemblePropagator, Error, Parameters, Result, TrajectoryBuffer};

use crate::rk4;

/// Output times for `steps` equal intervals after `start`; the last
/// one is `stop` and `start` itself isn't included.
pub fn time_grid(start: f64, stop: f64, steps: usize) -> Array<f64, Ix1> {
  let dt = (stop - start) / steps as f64;
  Array::from_shape_fn(steps, |n| {
    if n + 1 == steps {
      stop
    } else {
      start + (n + 1) as f64 * dt
    }
  })
}

/// Propagates each member's initial condition through `rhs`, with the
/// member's trailing parameters passed as `theta`.
pub struct OdeEnsemble<F> {
  rhs: F,
  sim_dim: usize,
  members: usize,
  substeps: usize,
  spread: Option<Array<f64, Ix1>>,
  seed: u64,
}

impl<F> OdeEnsemble<F>
  where F: Fn(f64, ArrayView<f64, Ix1>, ArrayView<f64, Ix1>, ArrayViewMut<f64, Ix1>) + Send + Sync,
{
  pub fn new(rhs: F, sim_dim: usize, members: usize) -> OdeEnsemble<F> {
    OdeEnsemble {
      rhs,
      sim_dim,
      members,
      substeps: 1,
      spread: None,
      seed: 0,
    }
  }

  /// RK4 steps per output interval.
  pub fn with_substeps(mut self, substeps: usize) -> Self {
    self.substeps = ::std::cmp::max(substeps, 1);
    self
  }

  /// Adds `spread[d] * N(0, 1)` to every member's initial condition when
  /// the ensemble is run from a single shared parameter row. Per member
  /// rows are taken as already perturbed. Draws depend only on `seed`
  /// and the member index, so repeated propagations see the same
  /// perturbation.
  pub fn with_spread(mut self, spread: Array<f64, Ix1>, seed: u64) -> Self {
    self.spread = Some(spread);
    self.seed = seed;
    self
  }

  pub fn sim_dim(&self) -> usize { self.sim_dim }
  pub fn members(&self) -> usize { self.members }

  fn member_rng(&self, member: usize) -> StdRng {
    StdRng::seed_from_u64(self.seed ^ (member as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15))
  }
}

impl<F> EnsemblePropagator for OdeEnsemble<F>
  where F: Fn(f64, ArrayView<f64, Ix1>, ArrayView<f64, Ix1>, ArrayViewMut<f64, Ix1>) + Send + Sync,
{
  fn realize_params(&self, params: ArrayView<f64, Ix2>) -> Result<Parameters> {
    if params.dim().1 < self.sim_dim {
      return Err(Error::mismatch("parameter columns", self.sim_dim, params.dim().1));
    }
    let shared = params.dim().0 == 1;
    let mut rows = member_params(params, self.members)?;

    if let Some(ref spread) = self.spread {
      if spread.len() != self.sim_dim {
        return Err(Error::mismatch("initial condition spread", self.sim_dim, spread.len()));
      }
      if shared {
        for (member, mut row) in rows.axis_iter_mut(Axis(0)).enumerate() {
          let mut rand = self.member_rng(member);
          for (y, &sd) in row.iter_mut().zip(spread.iter()) {
            let z: f64 = rand.sample(StandardNormal);
            *y += sd * z;
          }
        }
      }
    }

    Ok(rows)
  }

  fn propagate(&self, params: ArrayView<f64, Ix2>,
               start: f64, stop: f64, steps: usize)
               -> Result<(TrajectoryBuffer, Array<f64, Ix1>)>
  {
    if steps == 0 {
      return Err(Error::mismatch("propagation output steps", 1, 0));
    }

    let params = self.realize_params(params)?;
    let times = time_grid(start, stop, steps);
    debug!("propagating {} members over ({}, {}] in {} steps",
           self.members, start, stop, steps);

    let sim_dim = self.sim_dim;
    let mut out: Array<f64, Ix2> = Array::zeros((steps * sim_dim, self.members));
    out.axis_iter_mut(Axis(1))
      .into_par_iter()
      .zip(params.axis_iter(Axis(0)).into_par_iter())
      .enumerate()
      .try_for_each(|(member, (column, row))| -> Result<()> {
        let y0 = row.slice(s![..sim_dim]);
        let theta = row.slice(s![sim_dim..]);

        rk4::integrate(&self.rhs, start, y0, theta,
                       times.view(), self.substeps, column)
          .map_err(|e| match e {
            Error::NumericalFailure(msg) => Error::NumericalFailure(format!("member {}: {}", member, msg)),
            e => e,
          })
      })?;

    Ok((TrajectoryBuffer::from_array(out, sim_dim)?, times))
  }
}
