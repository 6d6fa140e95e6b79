//! Collecting a 2-D slice of the global domain on one device.
//!
//! Every device calls [`GatherSlice::participate`] and then
//! [`GatherSlice::gather`], whether or not its domain intersects the slice,
//! so the collective stays in step across devices.

use picframe_core::{Coord3, DeviceRank};

use crate::comm::{Communicator, Message, Tag};
use crate::context::SimulationContext;
use crate::error::CommError;

/// Gathers the `z = plane` slice (global cells) of a per-cell quantity.
///
/// Slices are `x * y` values, x fastest: the local extent on contributing
/// devices, the global extent at the coordinator.
pub struct GatherSlice<'c, C> {
    ctx: &'c SimulationContext<C>,
    plane: i32,
    active: Vec<DeviceRank>,
}

impl<'c, C: Communicator> GatherSlice<'c, C> {
    /// A gather of the global slice at `plane`.
    pub fn new(ctx: &'c SimulationContext<C>, plane: i32) -> Self {
        Self {
            ctx,
            plane,
            active: Vec::new(),
        }
    }

    /// Global z of the slice.
    pub fn plane(&self) -> i32 {
        self.plane
    }

    /// Whether this device's domain intersects the slice.
    pub fn intersects(&self) -> bool {
        let domain = self.ctx.local_domain();
        (domain.offset.z..domain.offset.z + domain.size.z).contains(&self.plane)
    }

    /// Announce whether this device contributes; returns whether it is the
    /// coordinator, the lowest contributing rank.
    ///
    /// Collective: every device must call it.
    pub fn participate(&mut self, active: bool) -> Result<bool, CommError> {
        let comm = self.ctx.comm();
        let me = comm.rank();
        let peers = (0..comm.size() as u32).map(DeviceRank).filter(|&r| r != me);
        for peer in peers.clone() {
            comm.send(peer, Tag::PARTICIPATE, Message::Flag(active))?;
        }
        self.active.clear();
        if active {
            self.active.push(me);
        }
        for peer in peers {
            match comm.recv(peer, Tag::PARTICIPATE)? {
                Message::Flag(true) => self.active.push(peer),
                Message::Flag(false) => {}
                other => {
                    return Err(CommError::UnexpectedMessage {
                        peer,
                        tag: Tag::PARTICIPATE,
                        got: other.kind(),
                    })
                }
            }
        }
        self.active.sort_unstable();
        Ok(self.is_coordinator())
    }

    /// The coordinating rank, if any device is active.
    pub fn coordinator(&self) -> Option<DeviceRank> {
        self.active.first().copied()
    }

    /// Whether this device coordinates the gather.
    pub fn is_coordinator(&self) -> bool {
        self.coordinator() == Some(self.ctx.rank())
    }

    /// Contribute `local` and, at the coordinator, assemble the global
    /// slice. Every other device gets `None`.
    ///
    /// Collective over the devices that announced themselves active;
    /// inactive devices return immediately.
    pub fn gather(&self, local: &[f32]) -> Result<Option<Vec<f32>>, CommError> {
        let me = self.ctx.rank();
        let Some(coordinator) = self.coordinator() else {
            return Ok(None);
        };
        if !self.active.contains(&me) {
            return Ok(None);
        }
        if me != coordinator {
            self.ctx
                .comm()
                .send(coordinator, Tag::GATHER, Message::Scalars(local.to_vec()))?;
            return Ok(None);
        }

        let global = self.ctx.global_size();
        let local_size = self.ctx.local_domain().size;
        let expected = (local_size.x * local_size.y) as usize;
        let mut out = vec![0.0; (global.x * global.y) as usize];
        for &rank in &self.active {
            let values = if rank == me {
                local.to_vec()
            } else {
                match self.ctx.comm().recv(rank, Tag::GATHER)? {
                    Message::Scalars(v) => v,
                    other => {
                        return Err(CommError::UnexpectedMessage {
                            peer: rank,
                            tag: Tag::GATHER,
                            got: other.kind(),
                        })
                    }
                }
            };
            if values.len() != expected {
                return Err(CommError::LengthMismatch {
                    peer: rank,
                    expected,
                    got: values.len(),
                });
            }
            let origin = self.ctx.devices().position_of(rank) * local_size;
            place(&mut out, global, origin, local_size, &values);
        }
        Ok(Some(out))
    }
}

fn place(out: &mut [f32], global: Coord3, origin: Coord3, size: Coord3, values: &[f32]) {
    for (i, &v) in values.iter().enumerate() {
        let x = origin.x + (i as i32 % size.x);
        let y = origin.y + (i as i32 / size.x);
        out[(x + y * global.x) as usize] = v;
    }
}
