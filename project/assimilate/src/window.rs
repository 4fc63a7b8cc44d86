//! Lag window bookkeeping: how many past observations take part in an
//! analysis, and how they're stacked.

use nd::{Array, Ix2};

use std::cmp::min;

use na_core::{Error, ObservationOperator, Result, TrajectoryView};
use util::ObservationRecord;

/// Observations assimilated together at index `index`.
pub fn lag_window(index: usize, data_lag: usize) -> usize {
  min(index + 1, data_lag)
}

/// Applies `operator` to the trajectory as it stood at each of the last
/// `lag` observations, rewinding `ntimestep` output steps per
/// observation. Rows are `(lag * obs_dim)`, oldest observation first.
pub fn stack_observations<O>(operator: &O,
                             trajectory: TrajectoryView,
                             lag: usize,
                             ntimestep: usize,
                             obs_dim: usize) -> Result<Array<f64, Ix2>>
  where O: ObservationOperator + ?Sized,
{
  let members = trajectory.members();
  let mut stacked = Array::zeros((lag * obs_dim, members));
  for j in 0..lag {
    let earlier = trajectory.rewind(j * ntimestep)?;
    let obs = operator.observe(earlier)?;
    if obs.dim() != (obs_dim, members) {
      return Err(Error::mismatch("observation operator rows", obs_dim, obs.dim().0));
    }

    let slot = lag - 1 - j;
    stacked.slice_mut(s![slot * obs_dim..(slot + 1) * obs_dim, ..])
      .assign(&obs);
  }

  Ok(stacked)
}

/// The last `lag` measurements up to `index`, flattened oldest first and
/// repeated in every member column.
pub fn tile_window(record: &ObservationRecord, index: usize,
                   lag: usize, members: usize) -> Result<Array<f64, Ix2>> {
  let window = record.window(index, lag)?;
  let flat: Vec<f64> = window.iter().cloned().collect();
  Ok(Array::from_shape_fn((flat.len(), members), |(r, _)| flat[r]))
}
