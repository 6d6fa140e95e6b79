//! Per-device simulation context.

use picframe_core::{Coord3, DeviceRank};
use picframe_space::{
    DeviceGrid, Direction, DirectionMask, Domain, GridLayout, MappingDescription, SubGrid,
};

use crate::comm::{Communicator, LocalCommunicator};
use crate::config::{ConfigError, SimulationConfig};
use crate::error::{ExchangeError, SimulationError};
use crate::exchange::{ExchangeKind, ExchangeRegistry, ExchangeSpec};
use crate::field::FieldBuffer;

/// Everything one device knows about the run: where it sits in the device
/// grid, which part of the domain it owns, how that part is cut into
/// supercells, how it talks to its peers and which exchanges it runs.
///
/// Built once at startup and handed to every component that needs it.
pub struct SimulationContext<C = LocalCommunicator> {
    comm: C,
    devices: DeviceGrid,
    subgrid: SubGrid,
    mapping: MappingDescription,
    exchanges: ExchangeRegistry,
}

impl<C: Communicator> SimulationContext<C> {
    /// Context for the device `comm` speaks for.
    ///
    /// `subgrid` is this device's domain; it is cut into supercells of
    /// `supercell_size` cells with a guard ring `guard_supercells` wide.
    pub fn new(
        comm: C,
        devices: DeviceGrid,
        subgrid: SubGrid,
        supercell_size: Coord3,
        guard_supercells: Coord3,
    ) -> Result<Self, SimulationError> {
        if comm.size() != devices.device_count() {
            return Err(ConfigError::DeviceCountMismatch {
                devices: devices.device_count(),
                communicator: comm.size(),
            }
            .into());
        }
        let mapping = MappingDescription::new(
            subgrid.local_domain().size,
            supercell_size,
            guard_supercells,
        )?;
        Ok(Self {
            comm,
            devices,
            subgrid,
            mapping,
            exchanges: ExchangeRegistry::default(),
        })
    }

    /// Context for `comm`'s rank with an even split of the configured
    /// global domain.
    pub fn from_config(comm: C, config: &SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;
        let devices = DeviceGrid::new(config.devices, config.periodic)?;
        let subgrid = SubGrid::for_device(&devices, comm.rank(), config.global_cells)?;
        Self::new(
            comm,
            devices,
            subgrid,
            config.supercell_size,
            config.guard_supercells,
        )
    }

    /// This device's rank.
    pub fn rank(&self) -> DeviceRank {
        self.comm.rank()
    }

    /// The communicator.
    pub fn comm(&self) -> &C {
        &self.comm
    }

    /// The device grid.
    pub fn devices(&self) -> &DeviceGrid {
        &self.devices
    }

    /// Global and local domains.
    pub fn subgrid(&self) -> &SubGrid {
        &self.subgrid
    }

    /// This device's domain in global cells.
    pub fn local_domain(&self) -> Domain {
        self.subgrid.local_domain()
    }

    /// Size of the global domain in cells.
    pub fn global_size(&self) -> Coord3 {
        self.subgrid.global_domain().size
    }

    /// Supercell mapping of the local domain.
    pub fn mapping(&self) -> &MappingDescription {
        &self.mapping
    }

    /// Registered exchanges.
    pub fn exchanges(&self) -> &ExchangeRegistry {
        &self.exchanges
    }

    /// Directions in which this device has a neighbour.
    pub fn participating(&self) -> DirectionMask {
        self.devices.participating(self.rank())
    }

    /// Neighbour in `direction`, if there is one.
    pub fn neighbor(&self, direction: Direction) -> Option<DeviceRank> {
        self.devices.neighbor(self.rank(), direction)
    }

    /// Register an exchange.
    ///
    /// `guard` is in supercells for [`ExchangeKind::Particles`], where it
    /// must equal the mapping's guard ring, and in cells for
    /// [`ExchangeKind::Field`], where it must fit inside the local domain.
    pub fn add_exchange(
        &mut self,
        kind: ExchangeKind,
        mask: DirectionMask,
        guard: Coord3,
        tag: u32,
    ) -> Result<(), ExchangeError> {
        match kind {
            ExchangeKind::Particles if guard != self.mapping.guard_supercells() => {
                return Err(ExchangeError::InvalidGuard {
                    tag,
                    reason: format!(
                        "particle guard {guard} differs from the supercell guard ring {}",
                        self.mapping.guard_supercells()
                    ),
                });
            }
            ExchangeKind::Field
                if guard.min(Coord3::ZERO) != Coord3::ZERO
                    || guard.max(self.local_domain().size) != self.local_domain().size =>
            {
                return Err(ExchangeError::InvalidGuard {
                    tag,
                    reason: format!(
                        "field guard {guard} must lie within 0..={}",
                        self.local_domain().size
                    ),
                });
            }
            _ => {}
        }
        self.exchanges.add(ExchangeSpec {
            kind,
            mask,
            guard,
            tag,
        })
    }

    /// A zeroed field laid out for the field exchange registered as `tag`.
    pub fn field_buffer(&self, tag: u32) -> Result<FieldBuffer, ExchangeError> {
        let spec = self
            .exchanges
            .get(tag)
            .filter(|s| s.kind == ExchangeKind::Field)
            .ok_or(ExchangeError::UnknownTag { tag })?;
        let layout = GridLayout::new(self.local_domain().size, spec.guard).map_err(|e| {
            ExchangeError::InvalidGuard {
                tag,
                reason: e.to_string(),
            }
        })?;
        Ok(FieldBuffer::new(layout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single() -> SimulationContext {
        let comm = LocalCommunicator::mesh(1).pop().unwrap();
        SimulationContext::from_config(comm, &SimulationConfig::default()).unwrap()
    }

    #[test]
    fn from_config_covers_the_whole_domain_on_one_device() {
        let ctx = single();
        assert_eq!(ctx.local_domain().offset, Coord3::ZERO);
        assert_eq!(ctx.local_domain().size, Coord3::new(16, 16, 8));
        assert_eq!(ctx.mapping().local_supercells(), Coord3::splat(2));
        // Fully periodic: a lone device is its own neighbour everywhere.
        assert_eq!(ctx.participating(), DirectionMask::ALL);
        assert_eq!(ctx.neighbor(Direction::LEFT), Some(DeviceRank(0)));
    }

    #[test]
    fn communicator_size_must_match_devices() {
        let comm = LocalCommunicator::mesh(2).pop().unwrap();
        let err = SimulationContext::from_config(comm, &SimulationConfig::default())
            .err()
            .unwrap();
        assert_eq!(
            err,
            SimulationError::Config(ConfigError::DeviceCountMismatch {
                devices: 1,
                communicator: 2
            })
        );
    }

    #[test]
    fn duplicate_exchange_tags_are_rejected() {
        let mut ctx = single();
        ctx.add_exchange(ExchangeKind::Particles, DirectionMask::ALL, Coord3::splat(1), 3)
            .unwrap();
        assert_eq!(
            ctx.add_exchange(ExchangeKind::Field, DirectionMask::FACES, Coord3::splat(1), 3),
            Err(ExchangeError::DuplicateTag { tag: 3 })
        );
        assert_eq!(ctx.exchanges().len(), 1);
    }

    #[test]
    fn exchange_guards_are_checked_per_kind() {
        let mut ctx = single();
        assert!(matches!(
            ctx.add_exchange(ExchangeKind::Particles, DirectionMask::ALL, Coord3::splat(2), 0),
            Err(ExchangeError::InvalidGuard { tag: 0, .. })
        ));
        assert!(matches!(
            ctx.add_exchange(ExchangeKind::Field, DirectionMask::ALL, Coord3::new(1, 1, 9), 1),
            Err(ExchangeError::InvalidGuard { tag: 1, .. })
        ));
        ctx.add_exchange(ExchangeKind::Field, DirectionMask::ALL, Coord3::splat(2), 1)
            .unwrap();
        let field = ctx.field_buffer(1).unwrap();
        assert_eq!(field.layout().full_space(), Coord3::new(20, 20, 12));
        assert_eq!(ctx.field_buffer(0), Err(ExchangeError::UnknownTag { tag: 0 }));
    }
}
