//! picframe: a particle-in-cell substrate.
//!
//! This is the facade crate that re-exports the public API of the picframe
//! sub-crates. Adding `picframe` as a single dependency is enough for most
//! users.
//!
//! # Quick start
//!
//! ```rust
//! use picframe::prelude::*;
//!
//! // One periodic device holding a single 8x8x4 supercell.
//! let config = SimulationConfig {
//!     devices: Coord3::splat(1),
//!     global_cells: Coord3::new(8, 8, 4),
//!     supercell_size: Coord3::new(8, 8, 4),
//!     particles_per_supercell: 16,
//!     steps: 2,
//!     ..Default::default()
//! };
//! let reports = run_cluster(&config, |_| NBody::from_config(&config)).unwrap();
//! assert_eq!(reports[0].live_particles, 16);
//! assert_eq!(reports[0].metrics.len(), 2);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `picframe-core` | Coordinates, ids, particle schema, records, step errors |
//! | [`arena`] | `picframe-arena` | Slab allocator and frame pool |
//! | [`space`] | `picframe-space` | Directions, supercell mapping, device grid, guard regions |
//! | [`particles`] | `picframe-particles` | Per-supercell frame lists, gap fill, shift, guard packing |
//! | [`engine`] | `picframe-engine` | Lockstep executor, communicators, exchange, gather, simulation |
//! | [`kernels`] | `picframe-kernels` | Reference fill and n-body kernels |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Coordinates, ids, the particle schema and step errors (`picframe-core`).
pub use picframe_core as types;

/// Slab allocation of particle frames (`picframe-arena`).
///
/// [`arena::SlabAllocator`] hands out frame indices; [`arena::FramePool`]
/// owns the attribute storage behind them.
pub use picframe_arena as arena;

/// Grid geometry (`picframe-space`).
///
/// Supercell classification in [`space::MappingDescription`], device
/// neighbourhoods in [`space::DeviceGrid`] and guard regions in
/// [`space::GridLayout`].
pub use picframe_space as space;

/// Per-supercell particle storage (`picframe-particles`).
pub use picframe_particles as particles;

/// Execution, communication and the step loop (`picframe-engine`).
pub use picframe_engine as engine;

/// Reference kernels (`picframe-kernels`).
pub use picframe_kernels as kernels;

/// Common imports for typical picframe usage.
///
/// ```rust
/// use picframe::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use picframe_core::{
        float3, AttrKey, AttributeDef, Coord3, DeviceRank, Float3, ParticleSchema, StepError,
        StepId, SuperCellId,
    };

    // Storage
    pub use picframe_arena::SlabConfig;
    pub use picframe_particles::{ParticleBox, ParticleBuffer, ParticleError};

    // Space
    pub use picframe_space::{AreaType, Direction, DirectionMask, MappingDescription};

    // Execution
    pub use picframe_engine::{
        Executor, Kernel, Launch, ParticleModel, Worker, WorkerCfg,
    };

    // Orchestration
    pub use picframe_engine::{
        run_cluster, Communicator, DeviceReport, LocalCommunicator, Simulation,
        SimulationConfig, SimulationContext, SimulationError, StepMetrics,
    };

    // Kernels
    pub use picframe_kernels::NBody;
}
