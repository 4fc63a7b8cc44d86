//! Flattened (time step, state dimension) trajectory ensembles.
//!
//! Row `step * sim_dim + dim` holds state component `dim` at output
//! step `step`; every column is one ensemble member.

use nd::{Array, ArrayView, ArrayViewMut, Axis, Ix1, Ix2};

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryBuffer {
  sim_dim: usize,
  data: Array<f64, Ix2>,
}

impl TrajectoryBuffer {
  pub fn zeros(steps: usize, sim_dim: usize, members: usize) -> TrajectoryBuffer {
    TrajectoryBuffer {
      sim_dim,
      data: Array::zeros((steps * sim_dim, members)),
    }
  }

  pub fn from_array(data: Array<f64, Ix2>, sim_dim: usize) -> Result<TrajectoryBuffer> {
    check_layout(data.dim().0, sim_dim)?;
    Ok(TrajectoryBuffer { sim_dim, data, })
  }

  pub fn view(&self) -> TrajectoryView {
    TrajectoryView {
      sim_dim: self.sim_dim,
      data: self.data.view(),
    }
  }

  pub fn sim_dim(&self) -> usize { self.sim_dim }
  pub fn steps(&self) -> usize { self.data.dim().0 / self.sim_dim }
  pub fn members(&self) -> usize { self.data.dim().1 }

  pub fn at(&self, step: usize, dim: usize, member: usize) -> f64 {
    self.view().at(step, dim, member)
  }

  pub fn as_array(&self) -> ArrayView<f64, Ix2> { self.data.view() }
  pub fn into_array(self) -> Array<f64, Ix2> { self.data }

  /// `(sim_dim, members)` slab for a single output step.
  pub fn state_mut(&mut self, step: usize) -> ArrayViewMut<f64, Ix2> {
    let start = step * self.sim_dim;
    self.data.slice_mut(s![start..start + self.sim_dim, ..])
  }

  pub fn member_mut(&mut self, member: usize) -> ArrayViewMut<f64, Ix1> {
    self.data.index_axis_mut(Axis(1), member)
  }
}

#[derive(Debug, Clone, Copy)]
pub struct TrajectoryView<'a> {
  sim_dim: usize,
  data: ArrayView<'a, f64, Ix2>,
}

impl<'a> TrajectoryView<'a> {
  pub fn new(data: ArrayView<'a, f64, Ix2>, sim_dim: usize) -> Result<TrajectoryView<'a>> {
    check_layout(data.dim().0, sim_dim)?;
    Ok(TrajectoryView { sim_dim, data, })
  }

  pub fn sim_dim(&self) -> usize { self.sim_dim }
  pub fn steps(&self) -> usize { self.data.dim().0 / self.sim_dim }
  pub fn members(&self) -> usize { self.data.dim().1 }

  pub fn at(&self, step: usize, dim: usize, member: usize) -> f64 {
    debug_assert!(dim < self.sim_dim);
    self.data[[step * self.sim_dim + dim, member]]
  }

  pub fn as_array(&self) -> ArrayView<'a, f64, Ix2> { self.data }

  /// `(sim_dim, members)` slab for a single output step.
  pub fn state(&self, step: usize) -> ArrayView<'a, f64, Ix2> {
    let start = step * self.sim_dim;
    self.data.slice_move(s![start..start + self.sim_dim, ..])
  }

  pub fn last_state(&self) -> ArrayView<'a, f64, Ix2> {
    self.state(self.steps() - 1)
  }

  pub fn member(&self, member: usize) -> ArrayView<'a, f64, Ix1> {
    self.data.index_axis_move(Axis(1), member)
  }

  /// The trajectory as it stood `steps` output steps ago, ie with the
  /// most recent `steps * sim_dim` rows dropped.
  pub fn rewind(&self, steps: usize) -> Result<TrajectoryView<'a>> {
    if steps >= self.steps() {
      return Err(Error::mismatch("trajectory rewind", self.steps().saturating_sub(1), steps));
    }
    let keep = (self.steps() - steps) * self.sim_dim;
    Ok(TrajectoryView {
      sim_dim: self.sim_dim,
      data: self.data.slice_move(s![..keep, ..]),
    })
  }

  pub fn to_owned(&self) -> TrajectoryBuffer {
    TrajectoryBuffer {
      sim_dim: self.sim_dim,
      data: self.data.to_owned(),
    }
  }
}

fn check_layout(rows: usize, sim_dim: usize) -> Result<()> {
  if sim_dim == 0 || rows % sim_dim != 0 {
    return Err(Error::mismatch("trajectory rows per state", sim_dim, rows));
  }
  Ok(())
}
