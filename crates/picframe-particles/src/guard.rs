//! Serialising guard particles for exchange and inserting received ones.

use picframe_core::{float3, AttrKey, Coord3, Float3, ParticleRecord};
use picframe_space::{AreaMapper, AreaType, Direction};

use crate::error::ParticleError;
use crate::particle_box::ParticleBox;

/// Serialise every particle in the guard supercells facing `direction`
/// and empty those supercells.
pub fn pack_guard(
    pbox: ParticleBox<'_>,
    direction: Direction,
) -> Result<Vec<ParticleRecord>, ParticleError> {
    let mut records = Vec::new();
    for &id in AreaMapper::guard_side(pbox.mapping(), direction).supercells() {
        for frame in pbox.frames(id) {
            records.extend(
                (0..frame.slots())
                    .filter(|&s| frame.is_live(s))
                    .map(|s| frame.read_record(s)),
            );
        }
        pbox.delete_supercell(id)?;
    }
    Ok(records)
}

/// Insert received records at the supercell their position falls in.
///
/// Every record must carry a finite position landing in CORE or BORDER;
/// anything else means the sender routed it to the wrong device or its
/// state is corrupt. Returns the number inserted.
pub fn unpack(
    pbox: ParticleBox<'_>,
    records: &[ParticleRecord],
    position: AttrKey<Float3>,
    local_offset: Coord3,
) -> Result<usize, ParticleError> {
    let mapping = pbox.mapping();
    let schema = pbox.pool().schema();
    for record in records {
        let pos = schema.read_from(position, record);
        if !pos.iter().all(|c| c.is_finite()) {
            return Err(ParticleError::NonFinitePosition {
                supercell: None,
                position: pos,
            });
        }
        let cell = float3::cell_of(pos) - local_offset;
        let supercell = mapping.supercell_of_cell(cell);
        let id = mapping
            .id_of(supercell)
            .filter(|_| mapping.area_of(supercell) != AreaType::GUARD)
            .ok_or(ParticleError::Misrouted { position: pos })?;
        let (frame, slot) = pbox.insert(id)?;
        frame.write_record(slot, record);
        frame.set_local_cell(slot, mapping.local_cell_index(cell));
    }
    Ok(records.len())
}

/// Add `delta` to the position stored in each record.
pub fn shift_records(
    pbox: ParticleBox<'_>,
    records: &mut [ParticleRecord],
    position: AttrKey<Float3>,
    delta: Float3,
) {
    if delta == [0.0; 3] {
        return;
    }
    let schema = pbox.pool().schema();
    for record in records {
        let pos = schema.read_from(position, record);
        schema.write_into(position, record, float3::add(pos, delta));
    }
}
