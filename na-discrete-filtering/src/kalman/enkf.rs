//! Perturbed-observation ensemble Kalman update, with the parameters
//! carried along as augmented state.
//!
//! With anomalies `Y'` (observations), `X'` (trajectories) and `Θ'`
//! (parameters) and `S = Y'Y'^T / (N - 1) + R`:
//!
//! ```text
//! W    = S^-1 (D - Y)
//! X_a  = X + X' Y'^T W / (N - 1)
//! Θ_a  = Θ + Θ' Y'^T W / (N - 1)
//! ```

use rand::RngCore;

use na_core::{member_params, Analysis, AnalysisInput, AnalysisUpdater,
              Error, Result, TrajectoryBuffer};

use crate::ensemble::{anomalies, cross_covariance};
use crate::utils::spd_solve;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearEnsembleUpdate {
  /// Multiplies every anomaly before the covariances are formed.
  pub inflation: f64,
}

impl Default for LinearEnsembleUpdate {
  fn default() -> Self {
    LinearEnsembleUpdate {
      inflation: 1.0,
    }
  }
}

impl LinearEnsembleUpdate {
  pub fn new(inflation: f64) -> LinearEnsembleUpdate {
    LinearEnsembleUpdate { inflation, }
  }
}

impl AnalysisUpdater for LinearEnsembleUpdate {
  fn analyze(&self, input: AnalysisInput, _rand: &mut dyn RngCore) -> Result<Analysis> {
    let AnalysisInput {
      data, covariance, params, ensemble, observation,
    } = input;

    let n = ensemble.members();
    let m = data.dim().0;
    if n < 2 {
      return Err(Error::NumericalFailure(format!("ensemble Kalman update needs at least two members, got {}", n)));
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

    let theta = member_params(params, n)?.reversed_axes();

    let y = anomalies(observation, self.inflation)?;
    let x = anomalies(ensemble.as_array(), self.inflation)?;
    let t = anomalies(theta.view(), self.inflation)?;

    let mut s = cross_covariance(y.view(), y.view())?;
    s += &covariance;

    let innovation = &data - &observation;
    let w = spd_solve(&s, &innovation)?;
    debug!("enkf: {} members, {} data rows, mean |innovation| {:.3e}",
           n, m, innovation.iter().map(|v| v.abs()).sum::<f64>() / (m * n) as f64);

    // shared n x n weight applied to every augmented block
    let mut yw = y.t().dot(&w);
    yw /= (n - 1) as f64;

    let analysis = &ensemble.as_array() + &x.dot(&yw);
    let theta_a = &theta + &t.dot(&yw);

    Ok(Analysis {
      ensemble: TrajectoryBuffer::from_array(analysis, ensemble.sim_dim())?,
      params: theta_a.reversed_axes(),
    })
  }
}
