//! The seam between the substrate and a physical model.

use std::sync::Arc;

use picframe_core::{Coord3, ParticleSchema, StepError, StepId};
use picframe_particles::ParticleBox;
use picframe_space::{AreaMapper, AreaType, MappingDescription};

use crate::lockstep::{Backend, DefaultBackend, Executor, Kernel, WorkerCfg};

/// What a model's kernels need to launch on one device for one step.
pub struct Launch<'a, B: Backend = DefaultBackend> {
    executor: &'a Executor<B>,
    pbox: ParticleBox<'a>,
    cfg: WorkerCfg,
    local_offset: Coord3,
    step: StepId,
}

impl<'a, B: Backend> Launch<'a, B> {
    /// Bundle a launch.
    pub fn new(
        executor: &'a Executor<B>,
        pbox: ParticleBox<'a>,
        cfg: WorkerCfg,
        local_offset: Coord3,
        step: StepId,
    ) -> Self {
        Self {
            executor,
            pbox,
            cfg,
            local_offset,
            step,
        }
    }

    /// The particle buffer's kernel view.
    pub fn pbox(&self) -> ParticleBox<'a> {
        self.pbox
    }

    /// Supercell mapping of the buffer.
    pub fn mapping(&self) -> &'a MappingDescription {
        self.pbox.mapping()
    }

    /// Lanes per block.
    pub fn cfg(&self) -> WorkerCfg {
        self.cfg
    }

    /// Global cell of local cell `(0, 0, 0)`.
    pub fn local_offset(&self) -> Coord3 {
        self.local_offset
    }

    /// Step being computed.
    pub fn step(&self) -> StepId {
        self.step
    }

    /// Run `kernel` over every supercell of `area`.
    pub fn submit<A, K>(&self, kernel: &K, area: AreaType, args: &A) -> Result<(), StepError>
    where
        A: Sync + ?Sized,
        K: Kernel<A> + ?Sized,
    {
        let mapper = AreaMapper::new(self.mapping(), area);
        self.executor.submit(kernel, self.cfg, &mapper, args)
    }
}

/// A physical model driven by a [`Simulation`](crate::Simulation).
///
/// The schema must contain a three-component `position` attribute holding
/// global positions in cell units; the simulation re-homes and exchanges
/// particles by it after every [`advance`](Self::advance).
pub trait ParticleModel: Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Particle attributes the model stores.
    fn schema(&self) -> Arc<ParticleSchema>;

    /// Create the initial particles. Gap filling follows.
    fn initialize<B: Backend>(&self, launch: &Launch<'_, B>) -> Result<(), StepError>;

    /// Advance every particle by one step.
    fn advance<B: Backend>(&self, launch: &Launch<'_, B>) -> Result<(), StepError>;
}
