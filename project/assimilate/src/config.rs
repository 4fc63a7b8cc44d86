//! Run configuration, read from a TOML file.

use serde::{Deserialize, Serialize};

use std::fs;
use std::path::{Path, PathBuf};

use na_core::{Error, NoiseSpec, Result};
use na_discrete_filtering::{KernelPerturbedParticleUpdate, LinearEnsembleUpdate, Updater};

use crate::smoother::LoopSettings;

fn default_output_dir() -> PathBuf { PathBuf::from(".") }
fn default_inflation() -> f64 { 1.0 }
fn default_substeps() -> usize { 1 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
  /// Observation file, `[t, m_1 .. m_obs_dim]` per row.
  pub data: PathBuf,
  /// Initial parameters, copied to `param.0.dat` before the run.
  pub params: PathBuf,
  #[serde(default = "default_output_dir")]
  pub output_dir: PathBuf,
  pub data_lag: usize,
  pub horizon: f64,
  pub ensemble_size: usize,
  pub sim_dim: usize,
  /// Output steps per observation interval.
  pub ntimestep: usize,
  #[serde(default)]
  pub initial_time: f64,
  pub horizon_intervals: usize,
  #[serde(default)]
  pub seed: u64,
  #[serde(default)]
  pub progress: bool,
  pub noise: NoiseSpec,
  pub updater: UpdaterConfig,
  pub model: ModelConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum UpdaterConfig {
  Enkf {
    #[serde(default = "default_inflation")]
    inflation: f64,
  },
  KernelPf {
    sigma: f64,
  },
}

impl From<UpdaterConfig> for Updater {
  fn from(v: UpdaterConfig) -> Updater {
    match v {
      UpdaterConfig::Enkf { inflation, } => LinearEnsembleUpdate::new(inflation).into(),
      UpdaterConfig::KernelPf { sigma, } => KernelPerturbedParticleUpdate::new(sigma).into(),
    }
  }
}

/// The bundled linear model, `dy/dt = A y`. Parameter rows hold the
/// initial condition followed by `A` in row major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
  /// State dimensions that are measured, in data file column order.
  pub observe: Vec<usize>,
  #[serde(default = "default_substeps")]
  pub substeps: usize,
  /// Per-dimension standard deviation added to member initial conditions.
  #[serde(default)]
  pub spread: Option<Vec<f64>>,
}

impl RunConfig {
  /// Reads and validates `path`. Relative file names inside are taken
  /// relative to the directory holding the config.
  pub fn load<P>(path: P) -> Result<RunConfig>
    where P: AsRef<Path>,
  {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
      .map_err(|e| Error::io(path, e))?;
    let mut config: RunConfig = toml::from_str(&text)
      .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))?;

    if let Some(base) = path.parent() {
      config.resolve_paths(base);
    }
    config.validate()?;
    Ok(config)
  }

  pub fn resolve_paths(&mut self, base: &Path) {
    for p in [&mut self.data, &mut self.params, &mut self.output_dir] {
      if p.is_relative() {
        *p = base.join(&*p);
      }
    }
  }

  pub fn validate(&self) -> Result<()> {
    fn invalid<T>(msg: String) -> Result<T> { Err(Error::InvalidConfig(msg)) }

    if self.data_lag == 0 {
      return invalid("data_lag must be at least 1".into());
    }
    if self.sim_dim == 0 {
      return invalid("sim_dim must be at least 1".into());
    }
    if self.ntimestep == 0 || self.horizon_intervals == 0 {
      return invalid("ntimestep and horizon_intervals must be at least 1".into());
    }
    if !(self.horizon >= self.initial_time) {
      return invalid(format!("horizon {} is before initial_time {}", self.horizon, self.initial_time));
    }
    match self.updater {
      UpdaterConfig::Enkf { inflation, } => {
        if self.ensemble_size < 2 {
          return invalid(format!("enkf needs an ensemble of at least 2, got {}", self.ensemble_size));
        }
        if !(inflation > 0.0) || !inflation.is_finite() {
          return invalid(format!("inflation must be positive, got {}", inflation));
        }
      },
      UpdaterConfig::KernelPf { sigma, } => {
        if self.ensemble_size == 0 {
          return invalid("ensemble_size must be at least 1".into());
        }
        if !(sigma >= 0.0) || !sigma.is_finite() {
          return invalid(format!("kernel sigma must be non-negative, got {}", sigma));
        }
      },
    }

    if self.model.observe.is_empty() {
      return invalid("model.observe must name at least one state dimension".into());
    }
    if let Some(&d) = self.model.observe.iter().find(|&&d| d >= self.sim_dim) {
      return invalid(format!("observed dimension {} is out of range for sim_dim {}", d, self.sim_dim));
    }
    if self.model.substeps == 0 {
      return invalid("model.substeps must be at least 1".into());
    }
    if let Some(ref spread) = self.model.spread {
      if spread.len() != self.sim_dim {
        return invalid(format!("model.spread has {} entries, expected {}", spread.len(), self.sim_dim));
      }
    }

    Ok(())
  }

  pub fn loop_settings(&self) -> LoopSettings {
    LoopSettings {
      data_lag: self.data_lag,
      horizon: self.horizon,
      initial_time: self.initial_time,
      ntimestep: self.ntimestep,
      horizon_intervals: self.horizon_intervals,
      noise: self.noise.clone(),
      progress: self.progress,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const EXAMPLE: &'static str = r#"
data = "obs.dat"
params = "params.dat"
output_dir = "out"
data_lag = 2
horizon = 10.0
ensemble_size = 25
sim_dim = 2
ntimestep = 20
horizon_intervals = 10
seed = 1
noise = 0.05

[updater]
kind = "enkf"

[model]
observe = [1]
substeps = 4
spread = [0.01, 0.01]
"#;

  fn example() -> RunConfig {
    toml::from_str(EXAMPLE).unwrap()
  }

  #[test]
  fn example_parses_with_defaults() {
    let c = example();
    assert_eq!(c.initial_time, 0.0);
    assert!(!c.progress);
    assert_eq!(c.noise, NoiseSpec::Scalar(0.05));
    assert_eq!(c.updater, UpdaterConfig::Enkf { inflation: 1.0 });
    assert_eq!(c.model.observe, vec![1]);
    c.validate().unwrap();
  }

  #[test]
  fn serde_round_trip() {
    let mut c = example();
    c.updater = UpdaterConfig::KernelPf { sigma: 0.2 };
    c.noise = NoiseSpec::Matrix(vec![vec![1.0, 0.5], vec![0.5, 1.0]]);
    let text = toml::to_string(&c).unwrap();
    let back: RunConfig = toml::from_str(&text).unwrap();
    assert_eq!(back, c);
  }

  #[test]
  fn noise_forms() {
    let diag: RunConfig = toml::from_str(&EXAMPLE.replace("noise = 0.05", "noise = [0.1, 0.2]")).unwrap();
    assert_eq!(diag.noise, NoiseSpec::Diagonal(vec![0.1, 0.2]));
  }

  #[test]
  fn invalid_configs_are_rejected() {
    let checks: [fn(&mut RunConfig); 9] = [
      |c| c.data_lag = 0,
      |c| c.ensemble_size = 1,
      |c| c.sim_dim = 0,
      |c| c.ntimestep = 0,
      |c| c.horizon_intervals = 0,
      |c| c.horizon = -1.0,
      |c| c.model.observe = vec![2],
      |c| c.model.spread = Some(vec![0.1]),
      |c| c.updater = UpdaterConfig::KernelPf { sigma: -1.0 },
    ];
    for (i, f) in checks.iter().enumerate() {
      let mut c = example();
      f(&mut c);
      match c.validate() {
        Err(Error::InvalidConfig(_)) => {},
        other => panic!("check {}: unexpected {:?}", i, other),
      }
    }
  }

  #[test]
  fn load_resolves_relative_paths() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.toml");
    fs::write(&path, EXAMPLE).unwrap();
    let c = RunConfig::load(&path).unwrap();
    assert_eq!(c.data, dir.path().join("obs.dat"));
    assert_eq!(c.output_dir, dir.path().join("out"));

    match RunConfig::load(dir.path().join("missing.toml")) {
      Err(Error::Io { .. }) => {},
      other => panic!("unexpected {:?}", other),
    }
  }
}
