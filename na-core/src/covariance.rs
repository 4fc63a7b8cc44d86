//! Observation-noise covariance and its lag-window block form.

use nd::{Array, ArrayD, ArrayView, Ix2, IxDyn};

use crate::{Error, Result};

/// Relative tolerance used when checking a covariance for symmetry.
const SYMMETRY_TOL: f64 = 1.0e-9;

/// Configured observation noise, as given by the user.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum NoiseSpec {
  /// Standard deviation shared by every measurement component.
  Scalar(f64),
  /// One standard deviation per measurement component.
  Diagonal(Vec<f64>),
  /// A full covariance matrix, used as is.
  Matrix(Vec<Vec<f64>>),
}

impl NoiseSpec {
  /// The covariance described here, as a rank 0 or rank 2 array.
  pub fn to_covariance_array(&self) -> Result<ArrayD<f64>> {
    match self {
      &NoiseSpec::Scalar(sd) => {
        Ok(ArrayD::from_elem(IxDyn(&[]), sd * sd))
      },
      &NoiseSpec::Diagonal(ref sds) => {
        let n = sds.len();
        let mut c = Array::zeros((n, n));
        for (i, sd) in sds.iter().enumerate() {
          c[[i, i]] = sd * sd;
        }
        Ok(c.into_dyn())
      },
      &NoiseSpec::Matrix(ref rows) => {
        let n = rows.len();
        let mut c = Array::zeros((n, n));
        for (i, row) in rows.iter().enumerate() {
          if row.len() != n {
            return Err(Error::InvalidCovarianceShape {
              shape: vec![n, row.len()],
            });
          }
          for (j, &v) in row.iter().enumerate() {
            c[[i, j]] = v;
          }
        }
        Ok(c.into_dyn())
      },
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Covariance {
  /// Isotropic noise variance.
  Scalar(f64),
  /// `ObsDim x ObsDim` symmetric noise covariance.
  Matrix(Array<f64, Ix2>),
}

impl Covariance {
  /// Validates a dynamically shaped covariance against the measurement
  /// dimension. Only rank 0 and square rank 2 arrays are accepted.
  pub fn from_array(c: ArrayD<f64>, obs_dim: usize) -> Result<Covariance> {
    match c.ndim() {
      0 => {
        let v = c.iter().next().cloned().unwrap_or(::std::f64::NAN);
        if !v.is_finite() || v < 0.0 {
          return Err(Error::NumericalFailure(format!("scalar data covariance {} is not a variance", v)));
        }
        Ok(Covariance::Scalar(v))
      },
      2 => {
        let shape = c.shape().to_vec();
        if shape[0] != shape[1] {
          return Err(Error::InvalidCovarianceShape { shape, });
        }
        if shape[0] != obs_dim {
          return Err(Error::mismatch("data covariance", obs_dim, shape[0]));
        }
        let c = c.into_dimensionality::<Ix2>()
          .map_err(|_| Error::InvalidCovarianceShape { shape: shape.clone(), })?;
        if c.iter().any(|v| !v.is_finite()) {
          return Err(Error::NumericalFailure("data covariance has non-finite entries".into()));
        }
        if !is_symmetric(c.view()) {
          return Err(Error::NumericalFailure("data covariance is not symmetric".into()));
        }
        Ok(Covariance::Matrix(c))
      },
      _ => Err(Error::InvalidCovarianceShape { shape: c.shape().to_vec(), }),
    }
  }

  pub fn is_scalar(&self) -> bool {
    match self {
      &Covariance::Scalar(_) => true,
      _ => false,
    }
  }

  /// Joint noise covariance over `lag` stacked observations of size
  /// `obs_dim`, ie `kron(I_lag, C)`. A scalar expands to `c * I`.
  pub fn block(&self, lag: usize, obs_dim: usize) -> Array<f64, Ix2> {
    match self {
      &Covariance::Scalar(c) => {
        let mut b = Array::eye(lag * obs_dim);
        b *= c;
        b
      },
      &Covariance::Matrix(ref c) => kron_identity(lag, c.view()),
    }
  }
}

/// `kron(I_n, a)`.
pub fn kron_identity(n: usize, a: ArrayView<f64, Ix2>) -> Array<f64, Ix2> {
  let (r, c) = a.dim();
  let mut out = Array::zeros((n * r, n * c));
  for k in 0..n {
    out.slice_mut(s![k * r..(k + 1) * r, k * c..(k + 1) * c])
      .assign(&a);
  }
  out
}

pub fn is_symmetric(a: ArrayView<f64, Ix2>) -> bool {
  let (r, c) = a.dim();
  if r != c { return false; }

  let scale = a.iter().fold(1.0f64, |m, v| m.max(v.abs()));
  for i in 0..r {
    for j in i + 1..c {
      if (a[[i, j]] - a[[j, i]]).abs() > SYMMETRY_TOL * scale {
        return false;
      }
    }
  }
  true
}
