//! Cell-centred scalar fields with guard cells.

use log::debug;
use picframe_core::{Coord3, StepError, StepId};
use picframe_space::{CellRegion, GridLayout};

use crate::comm::{Communicator, Message, Tag};
use crate::context::SimulationContext;
use crate::error::CommError;
use crate::exchange::ExchangeSpec;

/// A scalar per cell over the local domain plus its guard, x fastest.
///
/// Coordinates are array coordinates: `(0, 0, 0)` is the first guard cell,
/// `layout.guard()` the first owned cell.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldBuffer {
    layout: GridLayout,
    values: Vec<f32>,
}

impl FieldBuffer {
    /// A zeroed field over `layout`.
    pub fn new(layout: GridLayout) -> Self {
        Self {
            values: vec![0.0; layout.full_space().volume()],
            layout,
        }
    }

    /// The field's layout.
    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    /// All values, guard included.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    fn offset(&self, cell: Coord3) -> Option<usize> {
        cell.to_linear(self.layout.full_space())
    }

    /// Value at an array cell, `None` outside the array.
    pub fn get(&self, cell: Coord3) -> Option<f32> {
        self.offset(cell).map(|i| self.values[i])
    }

    /// Store `value` at an array cell. Returns `false` outside the array.
    pub fn set(&mut self, cell: Coord3, value: f32) -> bool {
        match self.offset(cell) {
            Some(i) => {
                self.values[i] = value;
                true
            }
            None => false,
        }
    }

    /// Set every owned (non-guard) cell from `f(local_cell)`.
    pub fn fill_owned(&mut self, mut f: impl FnMut(Coord3) -> f32) {
        let guard = self.layout.guard();
        for local in self.layout.data_space().iter_extent() {
            self.set(local + guard, f(local));
        }
    }

    /// Copy a region out, in the region's linear order.
    pub fn read_region(&self, region: CellRegion) -> Vec<f32> {
        region
            .iter()
            .filter_map(|c| self.get(c))
            .collect()
    }

    /// Overwrite a region from values in the region's linear order.
    pub fn write_region(&mut self, region: CellRegion, values: &[f32]) {
        for (cell, &v) in region.iter().zip(values) {
            self.set(cell, v);
        }
    }
}

/// Copy each neighbour's border cells into the matching guard cells.
///
/// For a masked direction `d`, the border facing `d` goes to the
/// neighbour in `d`, and what arrives from the neighbour in
/// `d.opposite()` fills the guard on that side. Guard cells facing no
/// neighbour are left as they are. Ends with a barrier over all devices.
pub fn exchange_field<C: Communicator>(
    ctx: &SimulationContext<C>,
    spec: &ExchangeSpec,
    field: &mut FieldBuffer,
    step: StepId,
) -> Result<(), StepError> {
    let rank = ctx.rank();
    let comm_err = |e: CommError| e.at_step(rank, step);

    for direction in spec.mask.iter() {
        let Some(dest) = ctx.neighbor(direction) else {
            debug!("step {step}: no neighbour in direction {direction}, field exchange skipped");
            continue;
        };
        let border = field.read_region(field.layout().border_region(direction));
        ctx.comm()
            .send(dest, Tag::new(spec.tag, direction.code()), Message::Scalars(border))
            .map_err(comm_err)?;
    }

    for direction in spec.mask.iter() {
        let Some(src) = ctx.neighbor(direction.opposite()) else {
            continue;
        };
        let tag = Tag::new(spec.tag, direction.code());
        let region = field.layout().guard_region(direction.opposite());
        match ctx.comm().recv(src, tag).map_err(comm_err)? {
            Message::Scalars(values) if values.len() == region.volume() => {
                field.write_region(region, &values);
            }
            Message::Scalars(values) => {
                return Err(comm_err(CommError::LengthMismatch {
                    peer: src,
                    expected: region.volume(),
                    got: values.len(),
                }))
            }
            other => {
                return Err(comm_err(CommError::UnexpectedMessage {
                    peer: src,
                    tag,
                    got: other.kind(),
                }))
            }
        }
    }

    ctx.comm().barrier().map_err(comm_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::LocalCommunicator;
    use crate::config::SimulationConfig;
    use crate::exchange::ExchangeKind;
    use picframe_space::{Direction, DirectionMask};

    #[test]
    fn regions_read_back_what_was_written() {
        let mut f = FieldBuffer::new(GridLayout::new(Coord3::new(4, 3, 2), Coord3::splat(1)).unwrap());
        let region = f.layout().border_region(Direction::RIGHT);
        let values: Vec<f32> = (0..region.volume()).map(|i| i as f32).collect();
        f.write_region(region, &values);
        assert_eq!(f.read_region(region), values);
        assert!(!f.set(Coord3::new(6, 0, 0), 1.0));
    }

    #[test]
    fn single_periodic_device_wraps_its_own_border() {
        let comm = LocalCommunicator::mesh(1).pop().unwrap();
        let config = SimulationConfig {
            global_cells: Coord3::new(8, 8, 4),
            ..Default::default()
        };
        let mut ctx = SimulationContext::from_config(comm, &config).unwrap();
        ctx.add_exchange(ExchangeKind::Field, DirectionMask::ALL, Coord3::splat(1), 7)
            .unwrap();
        let spec = *ctx.exchanges().get(7).unwrap();
        let mut field = ctx.field_buffer(7).unwrap();
        let n = field.layout().data_space();
        field.fill_owned(|c| c.to_linear(n).unwrap() as f32);

        exchange_field(&ctx, &spec, &mut field, StepId(0)).unwrap();

        // Guard cell left of x = 0 mirrors the owned cell at x = n.x - 1.
        for cell in field.layout().guard_region(Direction::LEFT).iter() {
            let source = Coord3::new(n.x - 1, cell.y - 1, cell.z - 1);
            assert_eq!(field.get(cell), Some(source.to_linear(n).unwrap() as f32));
        }
        // Corner guard cell wraps on all three axes.
        let corner = field.get(Coord3::ZERO).unwrap();
        assert_eq!(corner, (n - Coord3::splat(1)).to_linear(n).unwrap() as f32);
    }
}
