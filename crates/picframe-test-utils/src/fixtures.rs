//! Particle placement and comparison helpers.
//!
//! - [`place`] inserts one particle at a position, in the supercell the
//!   position falls in.
//! - [`scatter_uniform`] places `n` particles uniformly over the local
//!   domain from a seeded generator.
//! - [`snapshot`] captures every live particle in a canonical order so two
//!   buffers can be compared regardless of slot layout.

use picframe_arena::FrameRef;
use picframe_core::{float3, Coord3, Float3, SuperCellId};
use picframe_particles::{ParticleBox, ParticleError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::NbodyKeys;

/// Insert a particle with unit mass and zero velocity at `position`
/// (local coordinates, local offset zero).
pub fn place<'a>(
    pbox: ParticleBox<'a>,
    keys: NbodyKeys,
    position: Float3,
) -> Result<(FrameRef<'a>, u32), ParticleError> {
    let m = pbox.mapping();
    let cell = float3::cell_of(position);
    let id = m
        .id_of(m.supercell_of_cell(cell))
        .expect("position inside the supercell grid");
    let (frame, slot) = pbox.insert(id)?;
    frame.set(keys.position, slot, position);
    frame.set(keys.velocity, slot, [0.0; 3]);
    frame.set(keys.mass, slot, 1.0);
    frame.set_local_cell(slot, m.local_cell_index(cell));
    Ok((frame, slot))
}

/// Place `n` particles uniformly over the CORE+BORDER cells, offset by
/// `origin` (the local domain's global offset).
pub fn scatter_uniform(
    pbox: ParticleBox<'_>,
    keys: NbodyKeys,
    n: usize,
    origin: Coord3,
    seed: u64,
) -> Result<(), ParticleError> {
    let m = pbox.mapping();
    let extent = m.local_cells();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for _ in 0..n {
        let local: Float3 = [
            rng.random_range(0.0..extent.x as f32),
            rng.random_range(0.0..extent.y as f32),
            rng.random_range(0.0..extent.z as f32),
        ];
        let cell = float3::cell_of(local);
        let id = m
            .id_of(m.supercell_of_cell(cell))
            .expect("scattered inside the local domain");
        let (frame, slot) = pbox.insert(id)?;
        frame.set(keys.position, slot, float3::add(local, float3::from_coord(origin)));
        frame.set(keys.mass, slot, rng.random_range(0.5..2.0));
        frame.set_local_cell(slot, m.local_cell_index(cell));
    }
    Ok(())
}

/// One live particle, bit-exact.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ParticleSnapshot {
    pub supercell: SuperCellId,
    pub position: [u32; 3],
    pub velocity: [u32; 3],
    pub mass: u32,
}

/// Every live particle, sorted.
pub fn snapshot(pbox: ParticleBox<'_>, keys: NbodyKeys) -> Vec<ParticleSnapshot> {
    let mut out = Vec::new();
    for i in 0..pbox.mapping().supercell_count() as u32 {
        let id = SuperCellId(i);
        for frame in pbox.frames(id) {
            for slot in (0..frame.slots()).filter(|&s| frame.is_live(s)) {
                out.push(ParticleSnapshot {
                    supercell: id,
                    position: frame.get(keys.position, slot).map(f32::to_bits),
                    velocity: frame.get(keys.velocity, slot).map(f32::to_bits),
                    mass: frame.get(keys.mass, slot).to_bits(),
                });
            }
        }
    }
    out.sort();
    out
}
