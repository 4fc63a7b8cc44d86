//! Kalman-type updates.

pub use self::enkf::LinearEnsembleUpdate;

pub mod enkf;
