extern crate assimilate;
extern crate na_core;
extern crate na_discrete_filtering;
extern crate na_quadrature;
extern crate ndarray as nd;
extern crate rand;
extern crate tempfile;
extern crate util;

use nd::{arr1, arr2, Array, ArrayD, ArrayView1, ArrayViewMut1, Ix2, IxDyn};
use rand::RngCore;

use std::fs;
use std::path::Path;

use assimilate::linear::linear_rhs;
use assimilate::{AssimilationLoop, LoopSettings, RunConfig};
use na_core::{member_params, Analysis, AnalysisInput, AnalysisUpdater,
              CovarianceModel, Error, NoiseSpec, ObservationOperator,
              Result, TrajectoryView};
use na_discrete_filtering::{FinalStateSelection, LinearEnsembleUpdate};
use na_quadrature::OdeEnsemble;
use util::{read_ensemble, read_params, write_params, ObservationRecord, OutputLayout};

const MEMBERS: usize = 4;

fn settings() -> LoopSettings {
  LoopSettings {
    data_lag: 2,
    horizon: 5.0,
    initial_time: 0.0,
    ntimestep: 2,
    horizon_intervals: 5,
    noise: NoiseSpec::Scalar(0.1),
    progress: false,
  }
}

/// Decay of a scalar state observed at t = 1, 2, 3.
fn record() -> ObservationRecord {
  ObservationRecord::new(arr1(&[1.0, 2.0, 3.0]),
                         arr2(&[[0.61], [0.37], [0.22]]))
    .unwrap()
}

fn member_params_file(layout: &OutputLayout) -> Array<f64, Ix2> {
  let params = arr2(&[
    [0.9, -0.3],
    [1.0, -0.45],
    [1.1, -0.6],
    [1.05, -0.7],
  ]);
  write_params(layout.params_path(0), params.view()).unwrap();
  read_params(layout.params_path(0)).unwrap()
}

type Rhs = fn(f64, ArrayView1<f64>, ArrayView1<f64>, ArrayViewMut1<f64>);

fn propagator() -> OdeEnsemble<Rhs> {
  OdeEnsemble::new(linear_rhs as Rhs, 1, MEMBERS)
    .with_substeps(4)
}

struct Identity;
impl AnalysisUpdater for Identity {
  fn analyze(&self, input: AnalysisInput, _: &mut dyn RngCore) -> Result<Analysis> {
    Ok(Analysis {
      ensemble: input.ensemble.to_owned(),
      params: member_params(input.params, input.ensemble.members())?,
    })
  }
}

/// Observes the final state but never provides a noise model.
struct RankOneNoise;
impl ObservationOperator for RankOneNoise {
  fn observe(&self, trajectory: TrajectoryView) -> Result<Array<f64, Ix2>> {
    Ok(trajectory.last_state().to_owned())
  }
}
impl CovarianceModel for RankOneNoise {
  fn data_covariance(&self, _: &NoiseSpec) -> Result<ArrayD<f64>> {
    Ok(ArrayD::zeros(IxDyn(&[1])))
  }
}

/// Provides noise but no observation mapping.
struct Bare;
impl ObservationOperator for Bare {}
impl CovarianceModel for Bare {
  fn data_covariance(&self, noise: &NoiseSpec) -> Result<ArrayD<f64>> {
    noise.to_covariance_array()
  }
}

fn file_lines(path: &Path) -> Vec<String> {
  fs::read_to_string(path).unwrap()
    .lines()
    .map(|l| l.to_string())
    .collect()
}

#[test]
fn lag_windows_grow_to_data_lag() {
  let dir = tempfile::tempdir().unwrap();
  let layout = OutputLayout::new(dir.path()).unwrap();
  member_params_file(&layout);

  let mut smoother = AssimilationLoop::new(settings(), record(),
                                           FinalStateSelection::new(vec![0]),
                                           propagator(),
                                           LinearEnsembleUpdate::default(),
                                           layout.clone(), 7)
    .unwrap();
  let summary = smoother.run().unwrap();

  assert_eq!(summary.lags, vec![1, 2, 2]);
  assert_eq!(summary.params.dim(), (MEMBERS, 2));
  assert!(summary.params.iter().all(|v| v.is_finite()));
  assert_eq!(summary.written.len(), 9);
  for i in 0..3 {
    assert!(layout.ensemble_path(i).is_file());
    assert!(layout.analysis_path(i).is_file());
    assert!(layout.params_path(i + 1).is_file());
  }
  assert!(!layout.params_path(4).exists());
}

#[test]
fn ensemble_files_hold_the_horizon_forecast() {
  let dir = tempfile::tempdir().unwrap();
  let layout = OutputLayout::new(dir.path()).unwrap();
  member_params_file(&layout);

  let mut smoother = AssimilationLoop::new(settings(), record(),
                                           FinalStateSelection::new(vec![0]),
                                           propagator(),
                                           LinearEnsembleUpdate::default(),
                                           layout.clone(), 7)
    .unwrap();
  smoother.run().unwrap();

  // ntimestep * horizon_intervals rows, sim_dim * members + 1 columns
  let lines = file_lines(&layout.ensemble_path(0));
  assert_eq!(lines.len(), 10);
  let mut last = ::std::f64::NEG_INFINITY;
  for line in lines.iter() {
    let cols: Vec<f64> = line.split(' ').map(|v| v.parse().unwrap()).collect();
    assert_eq!(cols.len(), MEMBERS + 1);
    assert!(cols[0] > last);
    last = cols[0];
  }
  assert_eq!(last, 5.0);

  let (forecast, times) = read_ensemble(layout.analysis_path(2), 1).unwrap();
  assert_eq!(forecast.steps(), 10);
  assert_eq!(forecast.members(), MEMBERS);
  assert_eq!(times[9], 5.0);
}

#[test]
fn identity_update_leaves_parameters_alone() {
  let dir = tempfile::tempdir().unwrap();
  let layout = OutputLayout::new(dir.path()).unwrap();
  member_params_file(&layout);

  let mut smoother = AssimilationLoop::new(settings(), record(),
                                           FinalStateSelection::new(vec![0]),
                                           propagator(), Identity,
                                           layout.clone(), 1)
    .unwrap();
  smoother.run().unwrap();

  for i in 0..3 {
    assert_eq!(file_lines(&layout.params_path(i + 1)),
               file_lines(&layout.params_path(i)),
               "param.{} differs from param.{}", i + 1, i);
  }
}

#[test]
fn rank_one_covariance_aborts_before_any_output() {
  let dir = tempfile::tempdir().unwrap();
  let layout = OutputLayout::new(dir.path()).unwrap();
  member_params_file(&layout);

  let mut smoother = AssimilationLoop::new(settings(), record(), RankOneNoise,
                                           propagator(), Identity,
                                           layout.clone(), 1)
    .unwrap();
  match smoother.run() {
    Err(ref e) => match e.root() {
      &Error::InvalidCovarianceShape { ref shape } => assert_eq!(shape, &vec![1]),
      other => panic!("unexpected {:?}", other),
    },
    Ok(_) => panic!("rank one covariance was accepted"),
  }
  assert!(!layout.ensemble_path(0).exists());
}

#[test]
fn missing_observation_operator_fails_first_iteration() {
  let dir = tempfile::tempdir().unwrap();
  let layout = OutputLayout::new(dir.path()).unwrap();
  member_params_file(&layout);

  let mut smoother = AssimilationLoop::new(settings(), record(), Bare,
                                           propagator(), Identity,
                                           layout.clone(), 1)
    .unwrap();
  match smoother.run() {
    Err(Error::Iteration { index: 0, lag: 1, ref source }) => match **source {
      Error::NotImplemented(what) => assert!(what.contains("observe")),
      ref other => panic!("unexpected {:?}", other),
    },
    other => panic!("unexpected {:?}", other.map(|s| s.lags)),
  }
  assert!(!layout.params_path(1).exists());
}

#[test]
fn observations_before_initial_time_are_rejected() {
  let dir = tempfile::tempdir().unwrap();
  let layout = OutputLayout::new(dir.path()).unwrap();
  let mut s = settings();
  s.initial_time = 1.5;
  let r = AssimilationLoop::new(s, record(), FinalStateSelection::new(vec![0]),
                                propagator(), Identity, layout, 1);
  match r {
    Err(Error::InvalidData(_)) => {},
    Err(e) => panic!("unexpected {:?}", e),
    Ok(_) => panic!("accepted observation before initial time"),
  }
}

#[test]
fn run_from_config_file() {
  let dir = tempfile::tempdir().unwrap();
  fs::write(dir.path().join("obs.dat"), "1.0\t0.61\n2.0\t0.37\n3.0\t0.22\n").unwrap();
  fs::write(dir.path().join("params.dat"),
            "1.0\t-0.4\n1.1\t-0.5\n0.9\t-0.6\n1.0\t-0.55\n1.05\t-0.45\n").unwrap();
  fs::write(dir.path().join("run.toml"), r#"
data = "obs.dat"
params = "params.dat"
output_dir = "out"
data_lag = 2
horizon = 4.0
ensemble_size = 5
sim_dim = 1
ntimestep = 3
horizon_intervals = 4
seed = 3
noise = 0.05

[updater]
kind = "enkf"

[model]
observe = [0]
substeps = 2
spread = [0.01]
"#).unwrap();

  let config = RunConfig::load(dir.path().join("run.toml")).unwrap();
  let summary = assimilate::run(&config).unwrap();
  assert_eq!(summary.lags, vec![1, 2, 2]);

  let out = dir.path().join("out");
  assert_eq!(file_lines(&out.join("param.0.dat")),
             file_lines(&dir.path().join("params.dat")));
  let final_params = read_params(out.join("param.3.dat")).unwrap();
  assert_eq!(final_params.dim(), (5, 2));

  // data decays like exp(-t / 2); the analysed rates should stay negative
  assert!(final_params.column(1).iter().all(|&a| a < 0.0));
}

#[test]
fn shared_row_initial_conditions_are_updated() {
  let dir = tempfile::tempdir().unwrap();
  let layout = OutputLayout::new(dir.path()).unwrap();
  write_params(layout.params_path(0), arr2(&[[1.0, -0.1]]).view()).unwrap();

  let members = 8;
  let spread = OdeEnsemble::new(linear_rhs as Rhs, 1, members)
    .with_substeps(4)
    .with_spread(arr1(&[0.2]), 5);
  let mut s = settings();
  s.noise = NoiseSpec::Scalar(0.05);
  let mut smoother = AssimilationLoop::new(s, record(),
                                           FinalStateSelection::new(vec![0]),
                                           spread, LinearEnsembleUpdate::default(),
                                           layout.clone(), 2)
    .unwrap();
  let summary = smoother.run().unwrap();

  let last = read_params(layout.params_path(3)).unwrap();
  assert_eq!(last.dim(), (members, 2));
  let ic = last.column(0);
  assert!(ic.iter().any(|&v| (v - ic[0]).abs() > 1e-5), "collapsed initial conditions {:?}", ic);
  // data sit well below exp(-t / 10), so the initial condition comes down
  let mean = ic.sum() / members as f64;
  assert!(mean < 0.9, "mean initial condition {}", mean);
  // the shared rate has no spread for the update to work with
  assert!(summary.params.column(1).iter().all(|&a| (a + 0.1).abs() < 1e-12));
}

#[test]
fn run_with_uses_the_given_parameters() {
  let dir = tempfile::tempdir().unwrap();
  let layout = OutputLayout::new(dir.path()).unwrap();
  let params = arr2(&[[1.0, -0.5]]);

  let mut smoother = AssimilationLoop::new(settings(), record(),
                                           FinalStateSelection::new(vec![0]),
                                           propagator(), Identity,
                                           layout.clone(), 1)
    .unwrap();
  // no param.0.dat on disk
  let summary = smoother.run_with(params).unwrap();
  assert_eq!(summary.lags, vec![1, 2, 2]);
  assert_eq!(read_params(layout.params_path(1)).unwrap(),
             arr2(&[[1.0, -0.5], [1.0, -0.5], [1.0, -0.5], [1.0, -0.5]]));
}

/// Two observed components of a coupled linear decay, correlated noise
/// and a three observation window.
fn coupled_config(dir: &Path, updater: &str) -> RunConfig {
  fs::write(dir.join("obs.dat"),
            "1.0\t0.73\t1.50\n2.0\t0.56\t1.08\n3.0\t0.40\t0.82\n").unwrap();
  fs::write(dir.join("params.dat"), "1.0\t2.0\t-0.5\t0.1\t0.0\t-0.3\n").unwrap();
  fs::write(dir.join("run.toml"), format!(r#"
data = "obs.dat"
params = "params.dat"
output_dir = "out"
data_lag = 3
horizon = 4.0
ensemble_size = 10
sim_dim = 2
ntimestep = 4
horizon_intervals = 4
seed = 9
noise = [[0.0025, 0.0005], [0.0005, 0.0025]]

[updater]
{}

[model]
observe = [0, 1]
substeps = 2
spread = [0.05, 0.05]
"#, updater)).unwrap();
  RunConfig::load(dir.join("run.toml")).unwrap()
}

fn check_coupled_run(updater: &str) {
  let dir = tempfile::tempdir().unwrap();
  let config = coupled_config(dir.path(), updater);
  assert_eq!(config.noise, NoiseSpec::Matrix(vec![vec![0.0025, 0.0005], vec![0.0005, 0.0025]]));

  let summary = assimilate::run(&config).unwrap();
  assert_eq!(summary.lags, vec![1, 2, 3]);
  assert_eq!(summary.params.dim(), (10, 6));
  assert!(summary.params.iter().all(|v| v.is_finite()));

  let out = dir.path().join("out");
  assert_eq!(read_params(out.join("param.3.dat")).unwrap().dim(), (10, 6));
  for name in ["ensemble.2.dat", "analysis.2.dat"].iter() {
    let (e, times) = read_ensemble(out.join(name), 2).unwrap();
    assert_eq!(e.steps(), 16);
    assert_eq!(e.members(), 10);
    assert_eq!(times[15], 4.0);
  }
}

#[test]
fn matrix_noise_window_with_enkf() {
  check_coupled_run("kind = \"enkf\"\ninflation = 1.02");
}

#[test]
fn matrix_noise_window_with_kernel_pf() {
  check_coupled_run("kind = \"kernel_pf\"\nsigma = 0.01");
}
