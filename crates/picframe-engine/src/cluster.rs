//! Running every device of a decomposition as threads of one process.

use std::thread;

use log::info;
use picframe_core::{DeviceRank, StepError};
use picframe_space::Domain;

use crate::comm::{Communicator, LocalCommunicator};
use crate::config::SimulationConfig;
use crate::context::SimulationContext;
use crate::error::SimulationError;
use crate::metrics::StepMetrics;
use crate::model::ParticleModel;
use crate::simulation::Simulation;

/// Outcome of one device's run.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceReport {
    /// The device.
    pub rank: DeviceRank,
    /// Its part of the global domain.
    pub local_domain: Domain,
    /// Metrics of every step, in order.
    pub metrics: Vec<StepMetrics>,
    /// Live particles after the last step.
    pub live_particles: u64,
    /// Density of the global mid-z plane, at the coordinating device only.
    pub density: Option<Vec<f32>>,
}

/// Run `config.steps` steps on every device of `config.devices`, one
/// thread per device, connected by a [`LocalCommunicator`] mesh.
///
/// `make_model` builds each device's model. Reports come back in rank
/// order. When devices fail, the first failure that is not a peer
/// dropping out is returned, since the others follow from it.
pub fn run_cluster<M, F>(
    config: &SimulationConfig,
    make_model: F,
) -> Result<Vec<DeviceReport>, SimulationError>
where
    M: ParticleModel,
    F: Fn(DeviceRank) -> M + Sync,
{
    config.validate()?;
    let n = config.device_count();
    info!(
        "running {n} devices ({}) for {} steps",
        config.devices, config.steps
    );
    let results: Vec<Result<DeviceReport, SimulationError>> = thread::scope(|s| {
        let handles: Vec<_> = LocalCommunicator::mesh(n)
            .into_iter()
            .map(|comm| {
                let make_model = &make_model;
                s.spawn(move || run_device(config, comm, make_model))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|payload| std::panic::resume_unwind(payload)))
            .collect()
    });

    let (reports, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let mut errors = errors.into_iter().filter_map(Result::err);
    let first = errors.next();
    if let Some(first) = first {
        let root = std::iter::once(first.clone())
            .chain(errors)
            .find(|e| !is_peer_failure(e))
            .unwrap_or(first);
        return Err(root);
    }
    Ok(reports.into_iter().filter_map(Result::ok).collect())
}

fn is_peer_failure(e: &SimulationError) -> bool {
    matches!(
        e,
        SimulationError::Comm(_) | SimulationError::Step(StepError::Communication { .. })
    )
}

fn run_device<M: ParticleModel>(
    config: &SimulationConfig,
    comm: LocalCommunicator,
    make_model: &impl Fn(DeviceRank) -> M,
) -> Result<DeviceReport, SimulationError> {
    let rank = comm.rank();
    let ctx = SimulationContext::from_config(comm, config)?;
    let local_domain = ctx.local_domain();
    let mut sim = Simulation::new(config.clone(), ctx, make_model(rank))?;
    let metrics = sim.run(config.steps)?;
    let density = sim.gather_density(config.global_cells.z / 2)?;
    Ok(DeviceReport {
        rank,
        local_domain,
        metrics,
        live_particles: sim.live_particles(),
        density,
    })
}
