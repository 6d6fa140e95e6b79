//! Halo exchange registration and the per-step particle exchange.
//!
//! An exchange is a tagged set of directions. For direction `d`, a device
//! sends to its neighbour in `d` on tag `(tag, d)` and receives on the same
//! tag from its neighbour in `d.opposite()`, so every message is matched
//! by exactly one receive. Directions without a neighbour are skipped.

use indexmap::IndexMap;
use log::{debug, error, warn};
use picframe_core::{float3, AttrKey, Coord3, Float3, StepError, StepId};
use picframe_particles::{pack_guard, shift_records, unpack, ParticleBox};
use picframe_space::DirectionMask;

use crate::comm::{Communicator, Message, Tag};
use crate::context::SimulationContext;
use crate::error::{CommError, ExchangeError};

/// What an exchange carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    /// Particles that moved into the guard ring.
    Particles,
    /// Border cells of a scalar field, copied into the neighbour's guard.
    Field,
}

/// One registered exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExchangeSpec {
    /// Payload kind.
    pub kind: ExchangeKind,
    /// Directions exchanged.
    pub mask: DirectionMask,
    /// Guard width: supercells for particles, cells for fields.
    pub guard: Coord3,
    /// Tag; unique per context.
    pub tag: u32,
}

/// Exchanges of one context, in registration order.
#[derive(Clone, Debug, Default)]
pub struct ExchangeRegistry {
    specs: IndexMap<u32, ExchangeSpec>,
}

impl ExchangeRegistry {
    /// Register `spec`; its tag must be new and not reserved, and its mask
    /// non-empty.
    pub fn add(&mut self, spec: ExchangeSpec) -> Result<(), ExchangeError> {
        if spec.tag == Tag::RESERVED_BASE {
            return Err(ExchangeError::ReservedTag { tag: spec.tag });
        }
        if spec.mask.is_empty() {
            return Err(ExchangeError::EmptyMask { tag: spec.tag });
        }
        if self.specs.contains_key(&spec.tag) {
            return Err(ExchangeError::DuplicateTag { tag: spec.tag });
        }
        self.specs.insert(spec.tag, spec);
        Ok(())
    }

    /// The exchange registered as `tag`.
    pub fn get(&self, tag: u32) -> Option<&ExchangeSpec> {
        self.specs.get(&tag)
    }

    /// Every exchange, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ExchangeSpec> {
        self.specs.values()
    }

    /// Exchanges of one kind, in registration order.
    pub fn of_kind(&self, kind: ExchangeKind) -> impl Iterator<Item = &ExchangeSpec> {
        self.specs.values().filter(move |s| s.kind == kind)
    }

    /// Number of registered exchanges.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Particle traffic of one exchange round on one device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExchangeStats {
    /// Particles sent.
    pub sent: u64,
    /// Particles received and inserted.
    pub received: u64,
    /// Guard particles dropped because no neighbour takes them.
    pub absorbed: u64,
    /// Masked directions without a neighbour.
    pub skipped: u32,
}

impl std::ops::AddAssign for ExchangeStats {
    fn add_assign(&mut self, rhs: Self) {
        self.sent += rhs.sent;
        self.received += rhs.received;
        self.absorbed += rhs.absorbed;
        self.skipped += rhs.skipped;
    }
}

/// Move every particle in the guard ring to the device that owns it.
///
/// For each masked direction the guard supercells on that side are packed
/// and emptied. With a neighbour, positions are shifted across periodic
/// edges of the global domain and the batch is sent; without one, the
/// batch is dropped and counted as absorbed. Then one batch per masked
/// direction is received and inserted. Guard particles on sides outside
/// the mask are dropped. The round ends with a barrier over all devices.
///
/// `capacity` bounds the particles one direction may carry.
pub fn exchange_particles<C: Communicator>(
    ctx: &SimulationContext<C>,
    spec: &ExchangeSpec,
    pbox: ParticleBox<'_>,
    position: AttrKey<Float3>,
    capacity: Option<usize>,
    step: StepId,
) -> Result<ExchangeStats, StepError> {
    let rank = ctx.rank();
    let comm_err = |e: CommError| e.at_step(rank, step);
    let global = ctx.global_size();
    let local_offset = ctx.local_domain().offset;
    let mut stats = ExchangeStats::default();

    for direction in spec.mask.iter() {
        let mut records = pack_guard(pbox, direction).map_err(|e| e.at_step(step))?;
        let Some(dest) = ctx.neighbor(direction) else {
            stats.skipped += 1;
            debug!("step {step}: no neighbour in direction {direction}, exchange skipped");
            if !records.is_empty() {
                warn!(
                    "step {step}: {} particles absorbed at the {direction} boundary",
                    records.len()
                );
                stats.absorbed += records.len() as u64;
            }
            continue;
        };
        if let Some(cap) = capacity.filter(|&cap| records.len() > cap) {
            error!(
                "step {step}: exchange {direction} needs {} slots, capacity {cap}",
                records.len()
            );
            return Err(StepError::ExchangeOverflow {
                direction: direction.code(),
                requested: records.len(),
                capacity: cap,
            });
        }
        let wrap = ctx.devices().wrap_shift(rank, direction) * global;
        shift_records(pbox, &mut records, position, float3::from_coord(wrap));
        stats.sent += records.len() as u64;
        ctx.comm()
            .send(
                dest,
                Tag::new(spec.tag, direction.code()),
                Message::Particles(records),
            )
            .map_err(comm_err)?;
    }

    for direction in spec.mask.iter() {
        let Some(src) = ctx.neighbor(direction.opposite()) else {
            continue;
        };
        let tag = Tag::new(spec.tag, direction.code());
        let records = match ctx.comm().recv(src, tag).map_err(comm_err)? {
            Message::Particles(records) => records,
            other => {
                return Err(comm_err(CommError::UnexpectedMessage {
                    peer: src,
                    tag,
                    got: other.kind(),
                }))
            }
        };
        let inserted =
            unpack(pbox, &records, position, local_offset).map_err(|e| e.at_step(step))?;
        stats.received += inserted as u64;
    }

    let stray = pbox
        .delete_guard_particles()
        .map_err(|e| e.at_step(step))?;
    if stray > 0 {
        warn!("step {step}: {stray} guard particles outside the exchange mask dropped");
        stats.absorbed += stray;
    }

    ctx.comm().barrier().map_err(comm_err)?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(tag: u32) -> ExchangeSpec {
        ExchangeSpec {
            kind: ExchangeKind::Particles,
            mask: DirectionMask::ALL,
            guard: Coord3::splat(1),
            tag,
        }
    }

    #[test]
    fn registry_keeps_registration_order() {
        let mut r = ExchangeRegistry::default();
        r.add(spec(5)).unwrap();
        r.add(ExchangeSpec {
            kind: ExchangeKind::Field,
            ..spec(1)
        })
        .unwrap();
        r.add(spec(3)).unwrap();
        let tags: Vec<_> = r.iter().map(|s| s.tag).collect();
        assert_eq!(tags, vec![5, 1, 3]);
        let particle_tags: Vec<_> = r.of_kind(ExchangeKind::Particles).map(|s| s.tag).collect();
        assert_eq!(particle_tags, vec![5, 3]);
    }

    #[test]
    fn empty_mask_is_rejected() {
        let mut r = ExchangeRegistry::default();
        let err = r
            .add(ExchangeSpec {
                mask: DirectionMask::NONE,
                ..spec(0)
            })
            .unwrap_err();
        assert_eq!(err, ExchangeError::EmptyMask { tag: 0 });
        assert!(r.is_empty());
    }

    #[test]
    fn reserved_tag_is_rejected() {
        let mut r = ExchangeRegistry::default();
        let err = r.add(spec(Tag::RESERVED_BASE)).unwrap_err();
        assert_eq!(err, ExchangeError::ReservedTag { tag: u32::MAX });
        assert!(r.is_empty());
        r.add(spec(u32::MAX - 1)).unwrap();
    }
}
