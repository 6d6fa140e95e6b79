//! Test fixtures for picframe development.
//!
//! Provides the n-body particle schema, ready-made particle buffers and
//! helpers that place or scatter particles without going through a kernel.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::sync::Arc;

use picframe_arena::SlabConfig;
use picframe_core::{AttrKey, AttributeDef, Coord3, Float3, ParticleSchema};
use picframe_particles::ParticleBuffer;
use picframe_space::MappingDescription;

pub use fixtures::{place, scatter_uniform, snapshot, ParticleSnapshot};

/// Position, velocity and mass, in that order.
pub fn nbody_schema() -> Arc<ParticleSchema> {
    ParticleSchema::builder()
        .attribute(AttributeDef::vector3("position", [0.0; 3]))
        .attribute(AttributeDef::vector3("velocity", [0.0; 3]))
        .attribute(AttributeDef::scalar("mass", 1.0))
        .build()
        .expect("n-body schema is valid")
}

/// Typed keys into [`nbody_schema`].
#[derive(Clone, Copy, Debug)]
pub struct NbodyKeys {
    pub position: AttrKey<Float3>,
    pub velocity: AttrKey<Float3>,
    pub mass: AttrKey<f32>,
}

impl NbodyKeys {
    pub fn of(schema: &ParticleSchema) -> Self {
        Self {
            position: schema.key("position").expect("position"),
            velocity: schema.key("velocity").expect("velocity"),
            mass: schema.key("mass").expect("mass"),
        }
    }
}

/// An n-body buffer over `local_cells` with a one-supercell guard ring.
pub fn nbody_buffer(
    local_cells: Coord3,
    supercell_size: Coord3,
    max_frames: u32,
    slots_per_frame: u32,
) -> (ParticleBuffer, NbodyKeys) {
    let schema = nbody_schema();
    let keys = NbodyKeys::of(&schema);
    let mapping = MappingDescription::new(local_cells, supercell_size, Coord3::splat(1))
        .expect("test mapping is valid");
    let buffer = ParticleBuffer::new(schema, SlabConfig::new(max_frames, slots_per_frame), mapping)
        .expect("test pool config is valid");
    (buffer, keys)
}
