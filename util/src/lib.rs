//! File formats and console reporting shared by the assimilation tools.

extern crate csv;
#[macro_use]
extern crate log;
#[macro_use]
extern crate ndarray as nd;
extern crate na_core;
extern crate pbr;

pub use data::{read_ensemble, read_observations, read_params,
               write_ensemble, write_params, ObservationRecord, OutputLayout};
pub use progress::ReportingIterator;

pub mod data;
pub mod progress;
