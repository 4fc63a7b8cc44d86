//! Kernel-perturbed particle update.
//!
//! Every member is weighted by the Gaussian likelihood of its own
//! perturbed data column, members are resampled by weight, and the
//! resampled parameter rows are jittered with a normal kernel so the
//! parameter ensemble doesn't collapse onto a few particles.

use rand::RngCore;
use rand::distributions::{Distribution, WeightedIndex};

use na_core::{member_params, Analysis, AnalysisInput, AnalysisUpdater,
              Error, Result, TrajectoryBuffer};

use crate::utils::{make_2d_randn, whiten};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelPerturbedParticleUpdate {
  /// Standard deviation of the parameter kernel.
  pub sigma: f64,
}

impl KernelPerturbedParticleUpdate {
  pub fn new(sigma: f64) -> KernelPerturbedParticleUpdate {
    KernelPerturbedParticleUpdate { sigma, }
  }
}

impl AnalysisUpdater for KernelPerturbedParticleUpdate {
  fn analyze(&self, input: AnalysisInput, rand: &mut dyn RngCore) -> Result<Analysis> {
    let AnalysisInput {
      data, covariance, params, ensemble, observation,
    } = input;

    let n = ensemble.members();
    let m = data.dim().0;
    if n == 0 {
      return Err(Error::mismatch("ensemble members", 1, 0));
    }
    if data.dim().1 != n {
      return Err(Error::mismatch("perturbed data columns", n, data.dim().1));
    }
    if observation.dim() != (m, n) {
      return Err(Error::mismatch("stacked observation rows", m, observation.dim().0));
    }
    if covariance.dim() != (m, m) {
      return Err(Error::mismatch("block covariance size", m, covariance.dim().0));
    }

    // log w_k = -1/2 |L^-1 (d_k - y_k)|^2
    let whitened = whiten(&covariance, &(&data - &observation))?;
    let log_weights: Vec<f64> = whitened.columns()
      .into_iter()
      .map(|c| -0.5 * c.dot(&c))
      .collect();

    let max = log_weights.iter().cloned().fold(::std::f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
      return Err(Error::NumericalFailure("particle log-weights are not finite".into()));
    }
    let weights: Vec<f64> = log_weights.iter().map(|lw| (lw - max).exp()).collect();
    let total: f64 = weights.iter().sum();
    let ess = total * total / weights.iter().map(|w| w * w).sum::<f64>();
    debug!("kernel pf: effective sample size {:.2} of {}", ess, n);

    let picker = WeightedIndex::new(&weights)
      .map_err(|e| Error::NumericalFailure(format!("can't resample particles: {}", e)))?;

    let theta = member_params(params, n)?;
    let p = theta.dim().1;
    let mut resampled = TrajectoryBuffer::zeros(ensemble.steps(), ensemble.sim_dim(), n);
    let mut params_a = make_2d_randn((n, p), self.sigma, &mut *rand);
    for k in 0..n {
      let pick = picker.sample(&mut *rand);
      resampled.member_mut(k).assign(&ensemble.member(pick));
      let mut row = params_a.row_mut(k);
      row += &theta.row(pick);
    }

    Ok(Analysis {
      ensemble: resampled,
      params: params_a,
    })
  }
}
