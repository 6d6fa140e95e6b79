//! Integration test: a failing step surfaces the error that caused it.
//!
//! A hop model moves every particle a fixed distance along x each step.
//! Each scenario breaks one resource (exchange capacity, frame pool, or a
//! device's own advance) and checks the error the caller sees.

use std::sync::Arc;
use std::thread;

use picframe_core::{float3, Coord3, DeviceRank, ParticleSchema, StepError, StepId};
use picframe_engine::{
    run_cluster, Backend, Communicator, Kernel, Launch, LocalCommunicator, ParticleModel,
    Simulation, SimulationConfig, SimulationContext, SimulationError, Worker,
};
use picframe_particles::{ParticleBox, ParticleError};
use picframe_space::{AreaType, Direction};
use picframe_test_utils::{nbody_schema, NbodyKeys};

struct Hop {
    schema: Arc<ParticleSchema>,
    keys: NbodyKeys,
    per_supercell: u32,
    dx: f32,
    rank: DeviceRank,
    /// Device whose advance fails, and the step it fails at.
    fail_at: Option<(DeviceRank, StepId)>,
}

impl Hop {
    fn new(rank: DeviceRank, per_supercell: u32, dx: f32) -> Self {
        let schema = nbody_schema();
        let keys = NbodyKeys::of(&schema);
        Self {
            schema,
            keys,
            per_supercell,
            dx,
            rank,
            fail_at: None,
        }
    }

    fn failing_at(mut self, rank: DeviceRank, step: StepId) -> Self {
        self.fail_at = Some((rank, step));
        self
    }

    fn args<'a, B: Backend>(&self, launch: &Launch<'a, B>) -> HopArgs<'a> {
        HopArgs {
            pbox: launch.pbox(),
            keys: self.keys,
            local_offset: launch.local_offset(),
            per_supercell: self.per_supercell,
            dx: self.dx,
            step: launch.step(),
        }
    }
}

struct HopArgs<'a> {
    pbox: ParticleBox<'a>,
    keys: NbodyKeys,
    local_offset: Coord3,
    per_supercell: u32,
    dx: f32,
    step: StepId,
}

struct Seed;

impl Kernel<HopArgs<'_>> for Seed {
    fn run(&self, w: &Worker<'_>, a: &HopArgs<'_>) -> Result<(), StepError> {
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
                frame.set_local_cell(slot, k);
            }
            Ok(())
        });
        result.map_err(|e| e.in_supercell(id).at_step(a.step))
    }
}

struct Push;

impl Kernel<HopArgs<'_>> for Push {
    fn run(&self, w: &Worker<'_>, a: &HopArgs<'_>) -> Result<(), StepError> {
        for frame in a.pbox.frames(w.supercell()) {
            w.for_each(frame.slots() as usize, |s| {
                let s = s as u32;
                if frame.is_live(s) {
                    let p = frame.get(a.keys.position, s);
                    frame.set(a.keys.position, s, float3::add(p, [a.dx, 0.0, 0.0]));
                }
            });
        }
        Ok(())
    }
}

impl ParticleModel for Hop {
    fn name(&self) -> &str {
        "hop"
    }

    fn schema(&self) -> Arc<ParticleSchema> {
        self.schema.clone()
    }

    fn initialize<B: Backend>(&self, launch: &Launch<'_, B>) -> Result<(), StepError> {
        launch.submit(&Seed, AreaType::CORE | AreaType::BORDER, &self.args(launch))
    }

    fn advance<B: Backend>(&self, launch: &Launch<'_, B>) -> Result<(), StepError> {
        if self.fail_at == Some((self.rank, launch.step())) {
            return Err(StepError::InvariantViolated {
                supercell: None,
                step: launch.step(),
                reason: format!("device {} refused to advance", self.rank),
            });
        }
        launch.submit(&Push, AreaType::CORE | AreaType::BORDER, &self.args(launch))
    }
}

/// Two devices side by side along x, each 2x2x1 supercells of 4^3 cells.
fn pair() -> SimulationConfig {
    SimulationConfig {
        devices: Coord3::new(2, 1, 1),
        periodic: Coord3::splat(1),
        global_cells: Coord3::new(16, 8, 4),
        supercell_size: Coord3::splat(4),
        slots_per_frame: 8,
        max_frames: 128,
        particles_per_supercell: 8,
        lanes: 2,
        steps: 4,
        ..Default::default()
    }
}

#[test]
fn zero_exchange_capacity_overflows_on_the_first_crossing() {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = SimulationConfig {
        exchange_capacity: Some(0),
        ..pair()
    };
    // A whole supercell per step: every particle of the right border
    // column lands in the right guard face.
    let err = run_cluster(&config, |rank| Hop::new(rank, 8, 4.0)).unwrap_err();
    match err {
        SimulationError::Step(StepError::ExchangeOverflow {
            direction,
            requested,
            capacity,
        }) => {
            assert_eq!(direction, Direction::RIGHT.code());
            assert_eq!(capacity, 0);
            // Two supercells of eight particles face the right neighbour.
            assert_eq!(requested, 16);
        }
        other => panic!("expected an exchange overflow, got {other:?}"),
    }
}

#[test]
fn ample_exchange_capacity_lets_the_same_run_finish() {
    let config = SimulationConfig {
        exchange_capacity: Some(16),
        ..pair()
    };
    let reports = run_cluster(&config, |rank| Hop::new(rank, 8, 4.0)).unwrap();
    let live: u64 = reports.iter().map(|r| r.live_particles).sum();
    assert_eq!(live, 2 * 4 * 8);
}

#[test]
fn cluster_reports_the_failing_device_not_its_disconnected_peer() {
    let config = pair();
    let err = run_cluster(&config, |rank| {
        Hop::new(rank, 8, 0.5).failing_at(DeviceRank(1), StepId(2))
    })
    .unwrap_err();
    assert_eq!(
        err,
        SimulationError::Step(StepError::InvariantViolated {
            supercell: None,
            step: StepId(2),
            reason: "device 1 refused to advance".to_string(),
        })
    );
}

#[test]
fn peer_of_a_failed_device_sees_a_communication_error() {
    let config = pair();
    let errors: Vec<StepError> = thread::scope(|s| {
        let handles: Vec<_> = LocalCommunicator::mesh(2)
            .into_iter()
            .map(|comm| {
                let config = &config;
                s.spawn(move || {
                    let rank = comm.rank();
                    let ctx = SimulationContext::from_config(comm, config).unwrap();
                    let model = Hop::new(rank, 8, 0.5).failing_at(DeviceRank(1), StepId(1));
                    let mut sim = Simulation::new(config.clone(), ctx, model).unwrap();
                    sim.run(config.steps).unwrap_err()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(matches!(
        errors[0],
        StepError::Communication {
            rank: DeviceRank(0),
            step: StepId(1),
            ..
        }
    ));
    assert!(matches!(
        errors[1],
        StepError::InvariantViolated {
            step: StepId(1),
            ..
        }
    ));
}

#[test]
fn exhausted_pool_fails_the_step_that_needs_a_frame() {
    // One device, four supercells of one full frame each: the pool is
    // used up by the initial fill.
    let config = SimulationConfig {
        devices: Coord3::splat(1),
        global_cells: Coord3::new(8, 8, 4),
        max_frames: 4,
        ..pair()
    };
    let comm = LocalCommunicator::mesh(1).pop().unwrap();
    let ctx = SimulationContext::from_config(comm, &config).unwrap();
    let mut sim = Simulation::new(config, ctx, Hop::new(DeviceRank(0), 8, 1.0)).unwrap();
    assert_eq!(sim.live_particles(), 32);

    // Particles in each supercell's last x column cross into a neighbour
    // whose only frame is full.
    let err = sim.step().unwrap_err();
    assert!(
        matches!(
            err,
            StepError::CapacityExhausted {
                supercell: Some(_),
                step: StepId(0),
                capacity: 4,
            }
        ),
        "{err:?}"
    );
}
