//! Fixed-step integration of ODE ensembles.

#[macro_use]
extern crate log;
#[macro_use]
extern crate ndarray as nd;
extern crate na_core;
extern crate rand;
extern crate rand_distr;

pub use ensemble::{time_grid, OdeEnsemble};

pub mod ensemble;
pub mod rk4;
