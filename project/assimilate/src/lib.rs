//! Lagged init-to-horizon ensemble smoothing of ODE models against
//! sparse observations.

#[macro_use]
extern crate log;
#[macro_use]
extern crate ndarray as nd;
extern crate na_core;
extern crate na_discrete_filtering;
extern crate na_quadrature;
extern crate rand;
extern crate serde;
extern crate toml;
extern crate util;

use nd::Array;

use na_core::{Error, Result};
use na_discrete_filtering::{FinalStateSelection, Updater};
use na_quadrature::OdeEnsemble;
use util::{read_observations, read_params, OutputLayout};

pub use config::{ModelConfig, RunConfig, UpdaterConfig};
pub use smoother::{AssimilationLoop, LoopSettings, RunSummary, StepOutcome};

pub mod config;
pub mod linear;
pub mod smoother;
pub mod window;

/// Runs the bundled linear model as described by `config`: seeds
/// `param.0.dat` in the output directory and assimilates every
/// observation in the data file.
pub fn run(config: &RunConfig) -> Result<RunSummary> {
  config.validate()?;

  let record = read_observations(&config.data)?;
  if record.obs_dim() != config.model.observe.len() {
    return Err(Error::mismatch("measurement columns", config.model.observe.len(), record.obs_dim()));
  }

  let layout = OutputLayout::new(config.output_dir.clone())?;
  let seeded = layout.seed_params(&config.params)?;
  let params = read_params(&seeded)?;
  linear::check_params(params.view(), config.sim_dim)?;
  info!("seeded {} ({} parameter rows)", seeded.display(), params.dim().0);

  let model = FinalStateSelection::new(config.model.observe.clone());
  let mut propagator = OdeEnsemble::new(linear::linear_rhs, config.sim_dim, config.ensemble_size)
    .with_substeps(config.model.substeps);
  if let Some(ref spread) = config.model.spread {
    propagator = propagator.with_spread(Array::from(spread.clone()), config.seed);
  }
  let updater: Updater = config.updater.into();

  let mut smoother = AssimilationLoop::new(config.loop_settings(), record,
                                           model, propagator, updater,
                                           layout, config.seed)?;
  smoother.run_with(params)
}
