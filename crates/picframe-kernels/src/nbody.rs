//! The n-body particle schema and model.

use std::sync::Arc;

use log::debug;
use picframe_core::{AttrKey, AttributeDef, Float3, ParticleSchema, SchemaError, StepError};
use picframe_engine::{Backend, Launch, ParticleModel, SimulationConfig};
use picframe_space::AreaType;

use crate::fill::{FillArgs, FillKernel};
use crate::push::{PositionKernel, PushArgs, VelocityKernel};

/// Position, velocity and mass.
pub fn schema() -> Arc<ParticleSchema> {
    ParticleSchema::builder()
        .attribute(AttributeDef::vector3("position", [0.0; 3]))
        .attribute(AttributeDef::vector3("velocity", [0.0; 3]))
        .attribute(AttributeDef::scalar("mass", 1.0))
        .build()
        .expect("n-body schema is valid")
}

/// Typed keys into [`schema`].
#[derive(Clone, Copy, Debug)]
pub struct NBodyKeys {
    /// Global position in cell units.
    pub position: AttrKey<Float3>,
    /// Velocity in cells per unit time.
    pub velocity: AttrKey<Float3>,
    /// Mass.
    pub mass: AttrKey<f32>,
}

impl NBodyKeys {
    /// Resolve the keys in a schema built by [`schema`].
    pub fn of(schema: &ParticleSchema) -> Result<Self, SchemaError> {
        Ok(Self {
            position: schema.key("position")?,
            velocity: schema.key("velocity")?,
            mass: schema.key("mass")?,
        })
    }
}

/// Softened gravity between the particles of each supercell.
#[derive(Clone, Debug)]
pub struct NBody {
    schema: Arc<ParticleSchema>,
    keys: NBodyKeys,
    epsilon: f32,
    timestep: f32,
    particles_per_supercell: u32,
}

impl NBody {
    /// A model with explicit parameters.
    pub fn new(epsilon: f32, timestep: f32, particles_per_supercell: u32) -> Self {
        let schema = schema();
        let keys = NBodyKeys::of(&schema).expect("n-body schema has its own keys");
        Self {
            schema,
            keys,
            epsilon,
            timestep,
            particles_per_supercell,
        }
    }

    /// A model using the config's `epsilon`, `timestep` and
    /// `particles_per_supercell`.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(
            config.epsilon,
            config.timestep,
            config.particles_per_supercell,
        )
    }

    /// Attribute keys.
    pub fn keys(&self) -> NBodyKeys {
        self.keys
    }

    /// Softening length.
    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// Timestep.
    pub fn timestep(&self) -> f32 {
        self.timestep
    }

    fn push_args<'a, B: Backend>(&self, launch: &Launch<'a, B>) -> PushArgs<'a> {
        PushArgs {
            pbox: launch.pbox(),
            keys: self.keys,
            epsilon: self.epsilon,
            timestep: self.timestep,
        }
    }
}

impl ParticleModel for NBody {
    fn name(&self) -> &str {
        "n-body"
    }

    fn schema(&self) -> Arc<ParticleSchema> {
        self.schema.clone()
    }

    fn initialize<B: Backend>(&self, launch: &Launch<'_, B>) -> Result<(), StepError> {
        let args = FillArgs {
            pbox: launch.pbox(),
            keys: self.keys,
            particles: self.particles_per_supercell,
            local_offset: launch.local_offset(),
            step: launch.step(),
        };
        debug!(
            "filling {} particles per supercell",
            self.particles_per_supercell
        );
        launch.submit(&FillKernel, AreaType::CORE | AreaType::BORDER, &args)
    }

    fn advance<B: Backend>(&self, launch: &Launch<'_, B>) -> Result<(), StepError> {
        let args = self.push_args(launch);
        let area = AreaType::CORE | AreaType::BORDER;
        launch.submit(&VelocityKernel, area, &args)?;
        launch.submit(&PositionKernel, area, &args)
    }
}
