//! The lagged init-to-horizon smoother.
//!
//! Every iteration re-runs the ensemble from the initial time with the
//! current parameters, so only the initial conditions and parameters
//! are ever adjusted. Observation `i` is assimilated together with up to
//! `data_lag - 1` earlier ones. Per iteration the loop writes
//!
//!  * `ensemble.<i>.dat`: the forecast to the horizon before the analysis,
//!  * `analysis.<i>.dat`: the forecast after it,
//!  * `param.<i+1>.dat`: the analysed parameters.

use nd::ArrayView2;

use rand::SeedableRng;
use rand::rngs::StdRng;

use std::path::PathBuf;

use na_core::{AnalysisInput, AnalysisUpdater, Covariance, CovarianceModel,
              EnsemblePropagator, Error, NoiseSpec, ObservationOperator,
              Parameters, Result};
use na_discrete_filtering::forcing::observation_perturbation;
use util::{read_params, write_ensemble, write_params,
           ObservationRecord, OutputLayout, ReportingIterator};

use crate::window::{lag_window, stack_observations, tile_window};

#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
  pub data_lag: usize,
  pub horizon: f64,
  pub initial_time: f64,
  /// Output steps per observation interval.
  pub ntimestep: usize,
  /// Observation intervals between the initial time and the horizon.
  pub horizon_intervals: usize,
  pub noise: NoiseSpec,
  pub progress: bool,
}

#[derive(Debug, Clone)]
pub struct StepOutcome {
  pub lag: usize,
  pub params: Parameters,
  pub written: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
  /// Lag window used at each iteration.
  pub lags: Vec<usize>,
  /// Parameters after the last analysis.
  pub params: Parameters,
  pub written: Vec<PathBuf>,
}

pub struct AssimilationLoop<M, P, A> {
  settings: LoopSettings,
  record: ObservationRecord,
  model: M,
  propagator: P,
  updater: A,
  layout: OutputLayout,
  rand: StdRng,
}

impl<M, P, A> AssimilationLoop<M, P, A>
  where M: ObservationOperator + CovarianceModel,
        P: EnsemblePropagator,
        A: AnalysisUpdater,
{
  pub fn new(settings: LoopSettings,
             record: ObservationRecord,
             model: M, propagator: P, updater: A,
             layout: OutputLayout,
             seed: u64) -> Result<AssimilationLoop<M, P, A>>
  {
    if settings.data_lag == 0 {
      return Err(Error::InvalidConfig("data_lag must be at least 1".into()));
    }
    if settings.ntimestep == 0 || settings.horizon_intervals == 0 {
      return Err(Error::InvalidConfig("ntimestep and horizon_intervals must be at least 1".into()));
    }
    if record.is_empty() {
      return Err(Error::InvalidData("no observations to assimilate".into()));
    }
    if record.time(0) < settings.initial_time {
      return Err(Error::InvalidData(format!("first observation at t = {} precedes the initial time {}",
                                            record.time(0), settings.initial_time)));
    }

    Ok(AssimilationLoop {
      settings,
      record,
      model,
      propagator,
      updater,
      layout,
      rand: StdRng::seed_from_u64(seed),
    })
  }

  pub fn layout(&self) -> &OutputLayout { &self.layout }
  pub fn record(&self) -> &ObservationRecord { &self.record }

  /// The validated observation noise covariance.
  pub fn data_covariance(&self) -> Result<Covariance> {
    let raw = self.model.data_covariance(&self.settings.noise)?;
    Covariance::from_array(raw, self.record.obs_dim())
  }

  /// Reads `param.0.dat` from the output directory and assimilates every
  /// observation in order.
  pub fn run(&mut self) -> Result<RunSummary> {
    let params = read_params(self.layout.params_path(0))?;
    self.run_with(params)
  }

  /// Like `run`, starting from parameters already read from `param.0.dat`.
  pub fn run_with(&mut self, initial: Parameters) -> Result<RunSummary> {
    let covariance = self.data_covariance()?;
    // one row per member, holding the initial conditions actually propagated
    let mut params = self.propagator.realize_params(initial.view())?;
    info!("assimilating {} observations (lag {}, {} covariance)",
          self.record.len(), self.settings.data_lag,
          if covariance.is_scalar() { "scalar" } else { "matrix" });

    let n = self.record.len();
    let mut lags = Vec::with_capacity(n);
    let mut written = Vec::new();
    for index in ReportingIterator::new(0..n, "assimilating".into(), self.settings.progress) {
      let outcome = self.step(index, params.view(), &covariance)?;
      info!("observation {} at t = {}: lag window {}",
            index, self.record.time(index), outcome.lag);

      lags.push(outcome.lag);
      written.extend(outcome.written);
      params = outcome.params;
    }

    Ok(RunSummary {
      lags,
      params,
      written,
    })
  }

  /// One full cycle for observation `index`. Failures carry the index
  /// and lag window.
  pub fn step(&mut self, index: usize, params: ArrayView2<f64>,
              covariance: &Covariance) -> Result<StepOutcome>
  {
    let lag = lag_window(index, self.settings.data_lag);
    self.cycle(index, lag, params, covariance)
      .map_err(|e| Error::Iteration {
        index,
        lag,
        source: Box::new(e),
      })
  }

  fn cycle(&mut self, index: usize, lag: usize, params: ArrayView2<f64>,
           covariance: &Covariance) -> Result<StepOutcome>
  {
    let settings = &self.settings;
    let obs_dim = self.record.obs_dim();
    let forecast_steps = settings.ntimestep * settings.horizon_intervals;

    let (ensemble, _) = self.propagator
      .propagate(params, settings.initial_time, self.record.time(index),
                 (index + 1) * settings.ntimestep)?;
    let members = ensemble.members();
    debug!("propagated {} members to t = {}", members, self.record.time(index));

    let (forecast, times) = self.propagator
      .propagate(params, settings.initial_time, settings.horizon, forecast_steps)?;
    let ensemble_path = self.layout.ensemble_path(index);
    write_ensemble(&ensemble_path, forecast.view(), times.view())?;

    let observation = stack_observations(&self.model, ensemble.view(), lag,
                                         settings.ntimestep, obs_dim)?;

    let block = covariance.block(lag, obs_dim);
    let mut data = tile_window(&self.record, index, lag, members)?;
    data += &observation_perturbation(covariance, block.view(), members, &mut self.rand)?;
    debug!("perturbed {}x{} window data", data.dim().0, data.dim().1);

    let input = AnalysisInput {
      data: data.view(),
      covariance: block.view(),
      params: params.view(),
      ensemble: ensemble.view(),
      observation: observation.view(),
    };
    let analysis = self.updater.analyze(input, &mut self.rand)?;
    if analysis.params.dim() != (members, params.dim().1) {
      return Err(Error::mismatch("analysed parameter rows", members, analysis.params.dim().0));
    }

    let (forecast, times) = self.propagator
      .propagate(analysis.params.view(), settings.initial_time, settings.horizon, forecast_steps)?;
    let params_path = self.layout.params_path(index + 1);
    let analysis_path = self.layout.analysis_path(index);
    write_params(&params_path, analysis.params.view())?;
    write_ensemble(&analysis_path, forecast.view(), times.view())?;

    Ok(StepOutcome {
      lag,
      params: analysis.params,
      written: vec![ensemble_path, params_path, analysis_path],
    })
  }
}
