//! Analysis updates and the small amount of dense linear algebra they
//! need. Ensembles are `(rows, members)`: one column per member.

#[macro_use]
extern crate log;
extern crate nalgebra;
extern crate ndarray as nd;
extern crate na_core;
extern crate rand;
extern crate rand_distr;

use rand::RngCore;

use na_core::{Analysis, AnalysisInput, AnalysisUpdater, Result};

pub use kalman::LinearEnsembleUpdate;
pub use observation::FinalStateSelection;
pub use particle::KernelPerturbedParticleUpdate;

pub mod ensemble;
pub mod forcing;
pub mod kalman;
pub mod observation;
pub mod particle;
pub mod utils;

/// The bundled update rules, for picking one at run time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Updater {
  Linear(LinearEnsembleUpdate),
  KernelParticle(KernelPerturbedParticleUpdate),
}

impl AnalysisUpdater for Updater {
  fn analyze(&self, input: AnalysisInput, rand: &mut dyn RngCore) -> Result<Analysis> {
    match self {
      &Updater::Linear(ref u) => u.analyze(input, rand),
      &Updater::KernelParticle(ref u) => u.analyze(input, rand),
    }
  }
}

impl From<LinearEnsembleUpdate> for Updater {
  fn from(v: LinearEnsembleUpdate) -> Updater { Updater::Linear(v) }
}
impl From<KernelPerturbedParticleUpdate> for Updater {
  fn from(v: KernelPerturbedParticleUpdate) -> Updater { Updater::KernelParticle(v) }
}
