//! Integration test: particles survive multi-device exchange.
//!
//! A drift model moves every particle by a fixed per-particle velocity so
//! that many cross supercell and device boundaries each step. With
//! periodic edges nothing may be created or lost; with an open edge, the
//! particles lost are exactly the ones reported absorbed.

use std::sync::Arc;
use std::thread;

use picframe_core::{float3, Coord3, DeviceRank, ParticleSchema, StepError, StepId, SuperCellId};
use picframe_engine::{
    run_cluster, Backend, Communicator, Kernel, Launch, LocalCommunicator, ParticleModel,
    Simulation, SimulationConfig, SimulationContext, Worker,
};
use picframe_particles::{ParticleBox, ParticleError};
use picframe_space::AreaType;
use picframe_test_utils::{nbody_schema, NbodyKeys};

struct Drift {
    schema: Arc<ParticleSchema>,
    keys: NbodyKeys,
    per_supercell: u32,
    rank: u32,
}

impl Drift {
    fn new(rank: DeviceRank, per_supercell: u32) -> Self {
        let schema = nbody_schema();
        let keys = NbodyKeys::of(&schema);
        Self {
            schema,
            keys,
            per_supercell,
            rank: rank.0,
        }
    }
}

struct DriftArgs<'a> {
    pbox: ParticleBox<'a>,
    keys: NbodyKeys,
    local_offset: Coord3,
    per_supercell: u32,
    rank: u32,
    step: StepId,
}

/// Velocity components in (-3, 3) cells per step, deterministic per
/// particle.
fn velocity(rank: u32, id: u32, k: u32) -> [f32; 3] {
    let h = |salt: u32| {
        let v = (rank * 7919 + id * 104_729 + k * 31 + salt * 17) % 11;
        v as f32 * 0.5 - 2.5
    };
    [h(1), h(2), h(3)]
}

struct Seed;

impl Kernel<DriftArgs<'_>> for Seed {
    fn run(&self, w: &Worker<'_>, a: &DriftArgs<'_>) -> Result<(), StepError> {
        let id = w.supercell();
        let result: Result<(), ParticleError> = w.broadcast(|| {
            let m = a.pbox.mapping();
            let size = m.supercell_size();
            let origin = m.origin_cell(m.coord_of(id)) + a.local_offset;
            for k in 0..a.per_supercell {
                let within = Coord3::from_linear(k as usize, size);
                let (frame, slot) = a.pbox.insert(id)?;
                let p = float3::add(float3::from_coord(origin + within), [0.5; 3]);
                frame.set(a.keys.position, slot, p);
                frame.set(a.keys.velocity, slot, velocity(a.rank, id.0, k));
                frame.set_local_cell(slot, k);
            }
            Ok(())
        });
        result.map_err(|e| e.in_supercell(id).at_step(a.step))
    }
}

struct Push;

impl Kernel<DriftArgs<'_>> for Push {
    fn run(&self, w: &Worker<'_>, a: &DriftArgs<'_>) -> Result<(), StepError> {
        for frame in a.pbox.frames(w.supercell()) {
            w.for_each(frame.slots() as usize, |s| {
                let s = s as u32;
                if frame.is_live(s) {
                    let p = frame.get(a.keys.position, s);
                    let v = frame.get(a.keys.velocity, s);
                    frame.set(a.keys.position, s, float3::add(p, v));
                }
            });
        }
        Ok(())
    }
}

impl Drift {
    fn args<'a, B: Backend>(&self, launch: &Launch<'a, B>) -> DriftArgs<'a> {
        DriftArgs {
            pbox: launch.pbox(),
            keys: self.keys,
            local_offset: launch.local_offset(),
            per_supercell: self.per_supercell,
            rank: self.rank,
            step: launch.step(),
        }
    }
}

impl ParticleModel for Drift {
    fn name(&self) -> &str {
        "drift"
    }

    fn schema(&self) -> Arc<ParticleSchema> {
        self.schema.clone()
    }

    fn initialize<B: Backend>(&self, launch: &Launch<'_, B>) -> Result<(), StepError> {
        launch.submit(&Seed, AreaType::CORE | AreaType::BORDER, &self.args(launch))
    }

    fn advance<B: Backend>(&self, launch: &Launch<'_, B>) -> Result<(), StepError> {
        launch.submit(&Push, AreaType::CORE | AreaType::BORDER, &self.args(launch))
    }
}

fn config(periodic: Coord3) -> SimulationConfig {
    SimulationConfig {
        devices: Coord3::new(2, 2, 1),
        periodic,
        global_cells: Coord3::new(16, 16, 4),
        supercell_size: Coord3::new(4, 4, 4),
        slots_per_frame: 8,
        max_frames: 256,
        particles_per_supercell: 20,
        lanes: 3,
        steps: 6,
        ..Default::default()
    }
}

#[test]
fn periodic_exchange_conserves_particles() {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = config(Coord3::splat(1));
    let reports = run_cluster(&config, |rank| Drift::new(rank, 20)).unwrap();

    // 4 devices x 4 supercells x 20 particles.
    let total: u64 = reports.iter().map(|r| r.live_particles).sum();
    assert_eq!(total, 320);
    for step in 0..config.steps as usize {
        let sent: u64 = reports.iter().map(|r| r.metrics[step].sent).sum();
        let received: u64 = reports.iter().map(|r| r.metrics[step].received).sum();
        let live: u64 = reports.iter().map(|r| r.metrics[step].live_particles).sum();
        assert_eq!(sent, received, "step {step}");
        assert_eq!(live, 320, "step {step}");
        assert!(reports.iter().all(|r| r.metrics[step].absorbed == 0));
    }
    assert!(reports.iter().any(|r| r.metrics.iter().any(|m| m.sent > 0)));

    let density = reports[0].density.as_ref().expect("rank 0 coordinates");
    assert_eq!(density.len(), 16 * 16);
    assert!(reports[1..].iter().all(|r| r.density.is_none()));
}

#[test]
fn open_edges_absorb_what_leaves() {
    let config = config(Coord3::new(0, 1, 1));
    let reports = run_cluster(&config, |rank| Drift::new(rank, 20)).unwrap();
    let live: u64 = reports.iter().map(|r| r.live_particles).sum();
    let absorbed: u64 = reports
        .iter()
        .flat_map(|r| r.metrics.iter().map(|m| m.absorbed))
        .sum();
    assert_eq!(live + absorbed, 320);
    assert!(absorbed > 0);
}

#[test]
fn every_particle_ends_inside_its_device() {
    let config = config(Coord3::splat(1));
    thread::scope(|s| {
        for comm in LocalCommunicator::mesh(4) {
            let config = &config;
            s.spawn(move || {
                let rank = comm.rank();
                let ctx = SimulationContext::from_config(comm, config).unwrap();
                let mut sim = Simulation::new(config.clone(), ctx, Drift::new(rank, 20)).unwrap();
                sim.run(config.steps).unwrap();

                let domain = sim.context().local_domain();
                let pbox = sim.particle_box();
                pbox.check_invariants().unwrap();
                let m = pbox.mapping();
                for i in 0..m.supercell_count() as u32 {
                    let id = SuperCellId(i);
                    let guard = m.area_of(m.coord_of(id)) == AreaType::GUARD;
                    for frame in pbox.frames(id) {
                        assert!(!guard, "particles left in guard supercell {id}");
                        for slot in (0..frame.slots()).filter(|&s| frame.is_live(s)) {
                            let cell = float3::cell_of(frame.get(sim.position_key(), slot));
                            assert!(domain.contains(cell), "{rank}: {cell} outside {domain:?}");
                        }
                    }
                }
            });
        }
    });
}
