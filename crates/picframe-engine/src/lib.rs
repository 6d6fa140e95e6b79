//! Execution and orchestration for the picframe particle substrate.
//!
//! - [`lockstep`]: kernels over supercells with lanes advancing in passes
//!   separated by barriers, on a build-time selected [`Backend`].
//! - [`comm`]: the [`Communicator`] seam and an in-process mesh.
//! - [`exchange`] and [`field`]: halo exchange of particles and of field
//!   guard cells between neighbouring devices.
//! - [`gather`]: collecting a 2-D slice on one coordinating device.
//! - [`Simulation`]: one device's step loop over a [`ParticleModel`];
//!   [`run_cluster`] runs a whole decomposition as threads.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cluster;
pub mod comm;
pub mod config;
pub mod context;
pub mod error;
pub mod exchange;
pub mod field;
pub mod gather;
pub mod lockstep;
pub mod metrics;
pub mod model;
pub mod simulation;

pub use cluster::{run_cluster, DeviceReport};
pub use comm::{Communicator, LocalCommunicator, Message, Tag};
pub use config::{ConfigError, SimulationConfig};
pub use context::SimulationContext;
pub use error::{CommError, ExchangeError, SimulationError};
pub use exchange::{exchange_particles, ExchangeKind, ExchangeRegistry, ExchangeSpec, ExchangeStats};
pub use field::{exchange_field, FieldBuffer};
pub use gather::GatherSlice;
pub use lockstep::{
    Backend, DefaultBackend, Executor, Kernel, LaneVar, Sequential, ThreadTeam, Worker, WorkerCfg,
};
pub use metrics::StepMetrics;
pub use model::{Launch, ParticleModel};
pub use simulation::Simulation;
