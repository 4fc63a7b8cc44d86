//! Particle-type updates.

pub use self::kernel::KernelPerturbedParticleUpdate;

pub mod kernel;
