//! Initial particle placement.

use picframe_core::{float3, Coord3, StepError, StepId};
use picframe_engine::{Kernel, Worker};
use picframe_particles::{ParticleBox, ParticleError};

use crate::nbody::NBodyKeys;

/// Arguments of [`FillKernel`].
pub struct FillArgs<'a> {
    /// Particle storage.
    pub pbox: ParticleBox<'a>,
    /// Attribute keys.
    pub keys: NBodyKeys,
    /// Particles to create per supercell; at most its cell count.
    pub particles: u32,
    /// Global cell of local cell `(0, 0, 0)`.
    pub local_offset: Coord3,
    /// Step reported in errors.
    pub step: StepId,
}

/// Places particle `i` of a supercell on the `i`-th cell of the supercell
/// (x fastest), at the cell's lower corner, with unit mass and zero
/// velocity.
///
/// Frames are filled one at a time: lane 0 takes a frame from the pool and
/// appends it, every lane writes its share of the frame's slots, then lane
/// 0 sets the frame's cursor. The supercell must be empty beforehand.
#[derive(Clone, Copy, Debug, Default)]
pub struct FillKernel;

impl Kernel<FillArgs<'_>> for FillKernel {
    fn run(&self, w: &Worker<'_>, a: &FillArgs<'_>) -> Result<(), StepError> {
        let id = w.supercell();
        let pbox = a.pbox;
        let mapping = pbox.mapping();
        let size = mapping.supercell_size();
        let origin = mapping.origin_cell(mapping.coord_of(id)) + a.local_offset;
        let slots = pbox.pool().slots_per_frame();

        let mut placed = 0;
        while placed < a.particles {
            let frame: Result<u32, ParticleError> = w.broadcast(|| {
                let handle = pbox.get_empty_frame()?;
                pbox.set_as_last_frame(handle, id)?;
                Ok(handle.index())
            });
            let frame = frame
                .map_err(|e| e.in_supercell(id).at_step(a.step))
                .map(|index| pbox.pool().frame_at(index))?;
            let count = slots.min(a.particles - placed);

            w.for_each(count as usize, |s| {
                let slot = s as u32;
                let idx = placed + slot;
                let within = Coord3::from_linear(idx as usize, size);
                frame.init_slot(slot);
                frame.set(a.keys.position, slot, float3::from_coord(origin + within));
                frame.set(a.keys.velocity, slot, [0.0; 3]);
                frame.set(a.keys.mass, slot, 1.0);
                frame.set_local_cell(slot, idx);
                frame.set_live(slot, true);
            });
            if w.is_master() {
                frame.set_cursor(count);
            }
            w.sync();
            placed += count;
        }
        Ok(())
    }
}
