//! Moving particles between supercells after a position update.

use picframe_core::{float3, AttrKey, Coord3, Float3};
use picframe_space::{AreaMapper, AreaType};

use crate::error::ParticleError;
use crate::particle_box::ParticleBox;

/// What one shift pass did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShiftStats {
    /// Particles that changed supercell.
    pub moved: usize,
    /// Of those, particles that landed in a guard supercell.
    pub into_guard: usize,
}

/// Re-home every CORE and BORDER particle whose cell left its supercell.
///
/// Positions are global, in cell units; `local_offset` is the global cell
/// of local cell `(0, 0, 0)`. A particle stays in its slot when its cell is
/// still inside its supercell and only its local cell index is refreshed.
/// Otherwise it is copied into the target supercell and its old slot is
/// killed, leaving a hole for the next gap fill. Targets beyond the guard
/// ring and NaN or infinite positions are errors.
pub fn shift_particles(
    pbox: ParticleBox<'_>,
    position: AttrKey<Float3>,
    local_offset: Coord3,
) -> Result<ShiftStats, ParticleError> {
    let mapping = pbox.mapping();
    let mapper = AreaMapper::new(mapping, AreaType::CORE | AreaType::BORDER);
    let mut stats = ShiftStats::default();
    for &id in mapper.supercells() {
        let here = mapping.coord_of(id);
        for frame in pbox.frames(id) {
            for slot in 0..frame.slots() {
                if !frame.is_live(slot) {
                    continue;
                }
                let pos = frame.get(position, slot);
                if !pos.iter().all(|c| c.is_finite()) {
                    return Err(ParticleError::NonFinitePosition {
                        supercell: Some(id),
                        position: pos,
                    });
                }
                let cell = float3::cell_of(pos) - local_offset;
                let target = mapping.supercell_of_cell(cell);
                let cell_index = mapping.local_cell_index(cell);
                if target == here {
                    frame.set_local_cell(slot, cell_index);
                    continue;
                }
                let target_id = mapping.id_of(target).ok_or(ParticleError::Escaped {
                    supercell: id,
                    position: pos,
                })?;
                let (dst, dst_slot) = pbox.insert(target_id)?;
                frame.copy_slot_to(slot, &dst, dst_slot);
                dst.set_local_cell(dst_slot, cell_index);
                frame.kill(slot);
                stats.moved += 1;
                if mapping.area_of(target) == AreaType::GUARD {
                    stats.into_guard += 1;
                }
            }
        }
    }
    log::trace!(
        "shift: {} particles moved, {} into guard",
        stats.moved,
        stats.into_guard
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ParticleBuffer;
    use picframe_arena::{FrameRef, SlabConfig};
    use picframe_core::{AttributeDef, ParticleSchema, SuperCellId};
    use picframe_space::MappingDescription;

    fn buffer() -> (ParticleBuffer, AttrKey<Float3>) {
        let schema = ParticleSchema::builder()
            .attribute(AttributeDef::vector3("position", [0.0; 3]))
            .attribute(AttributeDef::scalar("mass", 1.0))
            .build()
            .unwrap();
        let pos = schema.key::<Float3>("position").unwrap();
        let mapping =
            MappingDescription::new(Coord3::splat(4), Coord3::splat(2), Coord3::splat(1)).unwrap();
        let buf = ParticleBuffer::new(schema, SlabConfig::new(64, 8), mapping).unwrap();
        (buf, pos)
    }

    fn place<'a>(pbox: ParticleBox<'a>, pos: AttrKey<Float3>, p: Float3) -> (FrameRef<'a>, u32) {
        let m = pbox.mapping();
        let id = m.id_of(m.supercell_of_cell(float3::cell_of(p))).unwrap();
        let (frame, slot) = pbox.insert(id).unwrap();
        frame.set(pos, slot, p);
        (frame, slot)
    }

    #[test]
    fn particle_crossing_supercell_is_moved() {
        let (buf, pos) = buffer();
        let pbox = buf.particle_box();
        let (frame, slot) = place(pbox, pos, [0.5, 0.5, 0.5]);
        frame.set(pos, slot, [2.5, 0.5, 0.5]);

        let stats = shift_particles(pbox, pos, Coord3::ZERO).unwrap();
        assert_eq!(stats, ShiftStats { moved: 1, into_guard: 0 });
        pbox.fill_all_gaps().unwrap();

        let m = pbox.mapping();
        let from = m.id_of(Coord3::new(1, 1, 1)).unwrap();
        let to = m.id_of(Coord3::new(2, 1, 1)).unwrap();
        assert_eq!(pbox.count_particles(from), 0);
        assert_eq!(pbox.count_particles(to), 1);
        let moved = pbox.first_frame(to).unwrap();
        assert_eq!(moved.get(pos, 0), [2.5, 0.5, 0.5]);
        assert_eq!(moved.local_cell(0), 0);
    }

    #[test]
    fn particle_leaving_local_domain_lands_in_guard() {
        let (buf, pos) = buffer();
        let pbox = buf.particle_box();
        let (frame, slot) = place(pbox, pos, [0.5, 0.5, 0.5]);
        frame.set(pos, slot, [-0.5, 0.5, 0.5]);

        let stats = shift_particles(pbox, pos, Coord3::ZERO).unwrap();
        assert_eq!(stats.into_guard, 1);
        let guard = pbox.mapping().id_of(Coord3::new(0, 1, 1)).unwrap();
        assert_eq!(pbox.count_particles(guard), 1);
    }

    #[test]
    fn local_offset_is_subtracted() {
        let (buf, pos) = buffer();
        let pbox = buf.particle_box();
        let (frame, slot) = place(pbox, pos, [0.5, 0.5, 0.5]);
        frame.set(pos, slot, [16.5, 8.5, 0.5]);
        let stats = shift_particles(pbox, pos, Coord3::new(16, 8, 0)).unwrap();
        assert_eq!(stats.moved, 0);
    }

    #[test]
    fn particle_beyond_guard_ring_is_an_error() {
        let (buf, pos) = buffer();
        let pbox = buf.particle_box();
        let (frame, slot) = place(pbox, pos, [0.5, 0.5, 0.5]);
        frame.set(pos, slot, [-3.0, 0.5, 0.5]);
        let err = shift_particles(pbox, pos, Coord3::ZERO).unwrap_err();
        assert!(matches!(
            err,
            ParticleError::Escaped { supercell: SuperCellId(_), .. }
        ));
    }

    #[test]
    fn nan_position_is_rejected_not_rehomed() {
        let (buf, pos) = buffer();
        let pbox = buf.particle_box();
        let (frame, slot) = place(pbox, pos, [0.5, 0.5, 0.5]);
        frame.set(pos, slot, [f32::NAN, 0.5, 0.5]);
        let err = shift_particles(pbox, pos, Coord3::ZERO).unwrap_err();
        let home = pbox.mapping().id_of(Coord3::new(1, 1, 1)).unwrap();
        assert!(matches!(
            err,
            ParticleError::NonFinitePosition { supercell: Some(id), .. } if id == home
        ));
        assert_eq!(pbox.count_particles(home), 1);
    }

    #[test]
    fn staying_particle_gets_fresh_cell_index() {
        let (buf, pos) = buffer();
        let pbox = buf.particle_box();
        let (frame, slot) = place(pbox, pos, [0.5, 0.5, 0.5]);
        frame.set(pos, slot, [1.5, 1.5, 0.5]);
        let stats = shift_particles(pbox, pos, Coord3::ZERO).unwrap();
        assert_eq!(stats.moved, 0);
        assert_eq!(frame.local_cell(slot), 1 + 2);
    }
}
