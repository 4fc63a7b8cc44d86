use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = ::std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
  /// A model-specific capability was never provided.
  #[error("{0} is not implemented for this model")]
  NotImplemented(&'static str),
  #[error("data covariance must be a scalar or a square matrix, got shape {shape:?}")]
  InvalidCovarianceShape {
    shape: Vec<usize>,
  },
  #[error("{context} dimension mismatch: expected {expected}, got {got}")]
  DimensionMismatch {
    context: &'static str,
    expected: usize,
    got: usize,
  },
  #[error("io error on {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
  #[error("{}:{line}: can't parse {value:?} as a number", .path.display())]
  Parse {
    path: PathBuf,
    line: usize,
    value: String,
  },
  #[error("invalid data: {0}")]
  InvalidData(String),
  #[error("numerical failure: {0}")]
  NumericalFailure(String),
  #[error("invalid configuration: {0}")]
  InvalidConfig(String),
  #[error("iteration {index} (lag window {lag}): {source}")]
  Iteration {
    index: usize,
    lag: usize,
    #[source]
    source: Box<Error>,
  },
}

impl Error {
  pub fn io<P>(path: P, source: io::Error) -> Error
    where P: AsRef<Path>,
  {
    Error::Io {
      path: path.as_ref().to_path_buf(),
      source,
    }
  }

  pub fn mismatch(context: &'static str, expected: usize, got: usize) -> Error {
    Error::DimensionMismatch { context, expected, got, }
  }

  /// Strips iteration context, returning the error that actually
  /// aborted the run.
  pub fn root(&self) -> &Error {
    match self {
      &Error::Iteration { ref source, .. } => source.root(),
      e => e,
    }
  }
}
