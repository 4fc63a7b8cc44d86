use nd::{Array, ArrayD, Ix2};

use na_core::{CovarianceModel, Error, NoiseSpec, ObservationOperator, Result, TrajectoryView};

/// Observes a subset of the state components at the last step of the
/// trajectory, eg only the infected fraction of an epidemic model.
/// Noise covariance is taken straight from the configured `NoiseSpec`.
#[derive(Debug, Clone)]
pub struct FinalStateSelection {
  pub dims: Vec<usize>,
}

impl FinalStateSelection {
  pub fn new(dims: Vec<usize>) -> FinalStateSelection {
    FinalStateSelection { dims, }
  }

  pub fn obs_dim(&self) -> usize { self.dims.len() }
}

impl ObservationOperator for FinalStateSelection {
  fn observe(&self, trajectory: TrajectoryView) -> Result<Array<f64, Ix2>> {
    if trajectory.steps() == 0 {
      return Err(Error::mismatch("observed trajectory steps", 1, 0));
    }
    let last = trajectory.last_state();
    let mut out = Array::zeros((self.dims.len(), trajectory.members()));
    for (row, &dim) in self.dims.iter().enumerate() {
      if dim >= trajectory.sim_dim() {
        return Err(Error::mismatch("observed state dimension", trajectory.sim_dim(), dim));
      }
      out.row_mut(row).assign(&last.row(dim));
    }
    Ok(out)
  }
}

impl CovarianceModel for FinalStateSelection {
  fn data_covariance(&self, noise: &NoiseSpec) -> Result<ArrayD<f64>> {
    noise.to_covariance_array()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use na_core::TrajectoryBuffer;
  use nd::arr2;

  #[test]
  fn observes_selected_dims_at_final_step() {
    let mut t = TrajectoryBuffer::zeros(2, 3, 2);
    t.state_mut(1).assign(&arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]));
    let op = FinalStateSelection::new(vec![2, 0]);
    let obs = op.observe(t.view()).unwrap();
    assert_eq!(obs, arr2(&[[5.0, 6.0], [1.0, 2.0]]));

    let earlier = op.observe(t.view().rewind(1).unwrap()).unwrap();
    assert_eq!(earlier, Array::zeros((2, 2)));
  }

  #[test]
  fn out_of_range_dim_is_a_mismatch() {
    let t = TrajectoryBuffer::zeros(1, 2, 2);
    assert!(FinalStateSelection::new(vec![2]).observe(t.view()).is_err());
  }
}
