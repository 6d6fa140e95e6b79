//! Reference kernels for the picframe substrate.
//!
//! These consume the particle and execution APIs the way a physics module
//! would. None of them is part of the substrate itself.
//!
//! # Step order
//!
//! 1. [`FillKernel`] (once): `particles_per_supercell` particles per
//!    supercell on the cell lattice, unit mass, at rest.
//! 2. [`VelocityKernel`]: softened two-body kick from the particles of the
//!    same supercell.
//! 3. [`PositionKernel`]: `position += timestep * velocity`.
//!
//! [`NBody`] bundles the three as a [`ParticleModel`](picframe_engine::ParticleModel).

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fill;
pub mod nbody;
pub mod push;

pub use fill::{FillArgs, FillKernel};
pub use nbody::{schema, NBody, NBodyKeys};
pub use push::{PositionKernel, PushArgs, VelocityKernel};
