#[macro_use]
extern crate ndarray as nd;
extern crate rand;
extern crate serde;
extern crate thiserror;

use nd::prelude::*;
use nd::ArrayD;

use rand::RngCore;

pub use covariance::{Covariance, NoiseSpec};
pub use error::{Result, Error};
pub use trajectory::{TrajectoryBuffer, TrajectoryView};

pub mod covariance;
pub mod error;
pub mod trajectory;

/// Initial conditions (first `sim_dim` columns) followed by model
/// parameters. Either one row shared by the whole ensemble or one row
/// per member.
pub type Parameters = Array<f64, Ix2>;

/// Maps a trajectory ensemble into observation space.
pub trait ObservationOperator {
  /// Returns an `(obs_dim, members)` array for the state at the end of
  /// `trajectory`. Must be deterministic.
  fn observe(&self, trajectory: TrajectoryView) -> Result<Array<f64, Ix2>> {
    let _ = trajectory;
    Err(Error::NotImplemented("ObservationOperator::observe"))
  }
}

/// Supplies the observation-noise covariance. Called once per run.
pub trait CovarianceModel {
  /// Rank 0 for isotropic noise, rank 2 (`obs_dim x obs_dim`) otherwise.
  fn data_covariance(&self, noise: &NoiseSpec) -> Result<ArrayD<f64>> {
    let _ = noise;
    Err(Error::NotImplemented("CovarianceModel::data_covariance"))
  }
}

/// Advances the ensemble from shared (or per member) parameters.
pub trait EnsemblePropagator {
  /// The parameters `propagate` effectively runs each member from, eg
  /// with any initial condition perturbation applied. Propagating the
  /// result gives the same ensemble as propagating `params`.
  fn realize_params(&self, params: ArrayView<f64, Ix2>) -> Result<Parameters> {
    Ok(params.to_owned())
  }


  /// Produces `steps` output states ending at `stop`, plus their times.
  fn propagate(&self, params: ArrayView<f64, Ix2>,
               start: f64, stop: f64, steps: usize)
               -> Result<(TrajectoryBuffer, Array<f64, Ix1>)>;
}

#[derive(Debug, Clone, Copy)]
pub struct AnalysisInput<'a> {
  /// Perturbed data, `(lag * obs_dim, members)`.
  pub data: ArrayView<'a, f64, Ix2>,
  /// Joint noise covariance over the stacked window.
  pub covariance: ArrayView<'a, f64, Ix2>,
  pub params: ArrayView<'a, f64, Ix2>,
  pub ensemble: TrajectoryView<'a>,
  /// Stacked window observations, rows ordered like `data`.
  pub observation: ArrayView<'a, f64, Ix2>,
}

#[derive(Debug, Clone)]
pub struct Analysis {
  pub ensemble: TrajectoryBuffer,
  /// One row per member.
  pub params: Parameters,
}

pub trait AnalysisUpdater {
  fn analyze(&self, input: AnalysisInput, rand: &mut dyn RngCore) -> Result<Analysis>;
}

impl<'a, T> AnalysisUpdater for &'a T
  where T: AnalysisUpdater + ?Sized,
{
  fn analyze(&self, input: AnalysisInput, rand: &mut dyn RngCore) -> Result<Analysis> {
    (**self).analyze(input, rand)
  }
}

/// Expands `params` to one row per member. A single row is repeated.
pub fn member_params(params: ArrayView<f64, Ix2>, members: usize) -> Result<Parameters> {
  match params.dim().0 {
    1 => {
      let row = params.row(0);
      let mut out = Array::zeros((members, row.len()));
      for mut r in out.axis_iter_mut(Axis(0)) {
        r.assign(&row);
      }
      Ok(out)
    },
    n if n == members => Ok(params.to_owned()),
    n => Err(Error::mismatch("parameter rows", members, n)),
  }
}
