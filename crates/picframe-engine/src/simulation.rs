//! One device's simulation loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use log::{debug, error, info};
use picframe_core::{float3, AttrKey, Float3, StepError, StepId};
use picframe_particles::{shift_particles, GapFillStats, ParticleBox, ParticleBuffer};
use picframe_space::{AreaMapper, AreaType, DirectionMask};

use crate::comm::{Communicator, LocalCommunicator};
use crate::config::SimulationConfig;
use crate::context::SimulationContext;
use crate::error::SimulationError;
use crate::exchange::{exchange_particles, ExchangeKind, ExchangeStats};
use crate::gather::GatherSlice;
use crate::lockstep::{Backend, DefaultBackend, Executor, Kernel, Worker, WorkerCfg};
use crate::metrics::{micros_since, StepMetrics};
use crate::model::{Launch, ParticleModel};

/// Particle storage, model and context of one device.
///
/// Each [`step`](Self::step) runs, in order: the model's kernels, the
/// supercell shift, the particle exchange (a barrier across devices), gap
/// filling and, in debug builds, the storage invariant check. A failed
/// step leaves the simulation unusable; the run is meant to be aborted.
pub struct Simulation<M, C = LocalCommunicator, B: Backend = DefaultBackend> {
    config: SimulationConfig,
    ctx: SimulationContext<C>,
    model: M,
    buffer: ParticleBuffer,
    executor: Executor<B>,
    position: AttrKey<Float3>,
    step: StepId,
}

impl<M: ParticleModel, C: Communicator> Simulation<M, C> {
    /// Build the device's buffers and initial particles on the default
    /// backend.
    pub fn new(
        config: SimulationConfig,
        ctx: SimulationContext<C>,
        model: M,
    ) -> Result<Self, SimulationError> {
        Self::with_executor(config, ctx, model, Executor::new())
    }
}

impl<M: ParticleModel, C: Communicator, B: Backend> Simulation<M, C, B> {
    /// Build the device's buffers and initial particles on `executor`.
    ///
    /// Registers a particle exchange over all directions unless `ctx`
    /// already has one, runs the model's initialisation and gap fills.
    pub fn with_executor(
        config: SimulationConfig,
        mut ctx: SimulationContext<C>,
        model: M,
        executor: Executor<B>,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        let schema = model.schema();
        let position = schema.key::<Float3>("position")?;
        let buffer = ParticleBuffer::new(schema, config.slab(), ctx.mapping().clone())?;
        if ctx.exchanges().of_kind(ExchangeKind::Particles).next().is_none() {
            let guard = ctx.mapping().guard_supercells();
            ctx.add_exchange(
                ExchangeKind::Particles,
                DirectionMask::ALL,
                guard,
                config.particle_exchange_tag,
            )?;
        }
        let sim = Self {
            config,
            ctx,
            model,
            buffer,
            executor,
            position,
            step: StepId(0),
        };
        sim.model.initialize(&sim.launch())?;
        sim.particle_box()
            .fill_all_gaps()
            .map_err(|e| e.at_step(sim.step))?;

        let domain = sim.ctx.local_domain();
        info!(
            "device {}: model {} with {} particles in {} frames, domain {} + {}, {} backend, {} lanes",
            sim.ctx.rank(),
            sim.model.name(),
            sim.live_particles(),
            sim.buffer.pool().slab().live_frames(),
            domain.offset,
            domain.size,
            sim.executor.backend().name(),
            sim.config.lanes,
        );
        Ok(sim)
    }

    fn launch(&self) -> Launch<'_, B> {
        Launch::new(
            &self.executor,
            self.buffer.particle_box(),
            WorkerCfg::new(self.config.lanes),
            self.ctx.local_domain().offset,
            self.step,
        )
    }

    /// Advance one step.
    pub fn step(&mut self) -> Result<StepMetrics, StepError> {
        let result = self.try_step();
        if let Err(e) = &result {
            error!("device {}: {e}", self.ctx.rank());
        }
        result
    }

    /// Advance `steps` steps, stopping at the first failure.
    pub fn run(&mut self, steps: u64) -> Result<Vec<StepMetrics>, StepError> {
        (0..steps).map(|_| self.step()).collect()
    }

    fn try_step(&mut self) -> Result<StepMetrics, StepError> {
        let step = self.step;
        let start = Instant::now();
        let pbox = self.buffer.particle_box();
        let mut m = StepMetrics {
            step: step.0,
            ..Default::default()
        };

        let t = Instant::now();
        self.model.advance(&self.launch())?;
        m.kernel_us = micros_since(t);

        let t = Instant::now();
        let shifted = shift_particles(pbox, self.position, self.ctx.local_domain().offset)
            .map_err(|e| e.at_step(step))?;
        m.moved = shifted.moved as u64;
        m.shift_us = micros_since(t);

        let t = Instant::now();
        let mut traffic = ExchangeStats::default();
        for spec in self.ctx.exchanges().of_kind(ExchangeKind::Particles) {
            traffic += exchange_particles(
                &self.ctx,
                spec,
                pbox,
                self.position,
                self.config.exchange_capacity,
                step,
            )?;
        }
        m.sent = traffic.sent;
        m.received = traffic.received;
        m.absorbed = traffic.absorbed;
        m.exchange_us = micros_since(t);

        let t = Instant::now();
        let gaps = self.fill_gaps(step)?;
        m.compacted = gaps.moved as u64;
        m.frames_freed = gaps.freed as u64;
        m.gap_fill_us = micros_since(t);

        #[cfg(debug_assertions)]
        pbox.check_invariants().map_err(|v| v.at_step(step))?;

        let slab = self.buffer.pool().slab();
        m.live_particles = pbox.total_particles();
        m.live_frames = slab.live_frames();
        m.failed_allocations = slab.failed_allocations();
        m.total_us = micros_since(start);
        debug!(
            "device {} step {step}: {} live, moved {}, sent {}, received {}, absorbed {}, {} us",
            self.ctx.rank(),
            m.live_particles,
            m.moved,
            m.sent,
            m.received,
            m.absorbed,
            m.total_us,
        );
        self.step = step.next();
        Ok(m)
    }

    fn fill_gaps(&self, step: StepId) -> Result<GapFillStats, StepError> {
        let args = GapFillArgs {
            pbox: self.buffer.particle_box(),
            step,
            moved: AtomicU64::new(0),
            freed: AtomicU64::new(0),
        };
        let mapper = AreaMapper::new(self.ctx.mapping(), AreaType::ALL);
        self.executor
            .submit(&GapFill, WorkerCfg::new(self.config.lanes), &mapper, &args)?;
        Ok(GapFillStats {
            moved: args.moved.load(Ordering::Relaxed) as usize,
            freed: args.freed.load(Ordering::Relaxed) as usize,
        })
    }

    /// Particles per cell of the global plane `z` within this device's
    /// domain, x fastest, or `None` if the plane misses the domain.
    pub fn density_slice(&self, z: i32) -> Option<Vec<f32>> {
        let domain = self.ctx.local_domain();
        let local_z = z - domain.offset.z;
        if !(0..domain.size.z).contains(&local_z) {
            return None;
        }
        let size = domain.size;
        let mut out = vec![0.0; (size.x * size.y) as usize];
        let pbox = self.particle_box();
        let mapper = AreaMapper::new(self.ctx.mapping(), AreaType::CORE | AreaType::BORDER);
        for &id in mapper.supercells() {
            for frame in pbox.frames(id) {
                for slot in (0..frame.slots()).filter(|&s| frame.is_live(s)) {
                    let cell = float3::cell_of(frame.get(self.position, slot)) - domain.offset;
                    if cell.z == local_z && cell.is_within(size) {
                        out[(cell.x + cell.y * size.x) as usize] += 1.0;
                    }
                }
            }
        }
        Some(out)
    }

    /// Gather the global density slice at plane `z` on the coordinating
    /// device. Collective: every device must call it.
    pub fn gather_density(&self, z: i32) -> Result<Option<Vec<f32>>, StepError> {
        let rank = self.ctx.rank();
        let local = self.density_slice(z);
        let mut gather = GatherSlice::new(&self.ctx, z);
        gather
            .participate(local.is_some())
            .map_err(|e| e.at_step(rank, self.step))?;
        gather
            .gather(local.as_deref().unwrap_or(&[]))
            .map_err(|e| e.at_step(rank, self.step))
    }

    /// Configuration the simulation was built with.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// The device context.
    pub fn context(&self) -> &SimulationContext<C> {
        &self.ctx
    }

    /// The model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Particle storage.
    pub fn buffer(&self) -> &ParticleBuffer {
        &self.buffer
    }

    /// Kernel view of the particle storage.
    pub fn particle_box(&self) -> ParticleBox<'_> {
        self.buffer.particle_box()
    }

    /// Key of the position attribute.
    pub fn position_key(&self) -> AttrKey<Float3> {
        self.position
    }

    /// Next step to run.
    pub fn current_step(&self) -> StepId {
        self.step
    }

    /// Live particles on this device.
    pub fn live_particles(&self) -> u64 {
        self.particle_box().total_particles()
    }
}

struct GapFillArgs<'a> {
    pbox: ParticleBox<'a>,
    step: StepId,
    moved: AtomicU64,
    freed: AtomicU64,
}

/// Lane 0 compacts the block's supercell; the outcome is shared so every
/// lane returns the same result.
struct GapFill;

impl Kernel<GapFillArgs<'_>> for GapFill {
    fn run(&self, worker: &Worker<'_>, args: &GapFillArgs<'_>) -> Result<(), StepError> {
        let outcome = worker.broadcast(|| args.pbox.fill_gaps(worker.supercell()));
        let stats = outcome.map_err(|e| e.in_supercell(worker.supercell()).at_step(args.step))?;
        if worker.is_master() {
            args.moved.fetch_add(stats.moved as u64, Ordering::Relaxed);
            args.freed.fetch_add(stats.freed as u64, Ordering::Relaxed);
        }
        Ok(())
    }
}
