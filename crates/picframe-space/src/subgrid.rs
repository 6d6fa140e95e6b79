//! Global and local domains of one device.

use picframe_core::{Coord3, DeviceRank};

use crate::device::DeviceGrid;
use crate::error::{require_positive, SpaceError};

/// An offset plus a size, in cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Domain {
    /// First cell.
    pub offset: Coord3,
    /// Cells per axis.
    pub size: Coord3,
}

impl Domain {
    /// Whether a global cell lies in this domain.
    pub fn contains(&self, cell: Coord3) -> bool {
        (cell - self.offset).is_within(self.size)
    }
}

/// The global domain and the part of it this device owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubGrid {
    global: Domain,
    local: Domain,
}

impl SubGrid {
    /// Validate and record the global and local domains.
    pub fn init(
        global_size: Coord3,
        local_size: Coord3,
        local_offset: Coord3,
    ) -> Result<Self, SpaceError> {
        require_positive("global domain", global_size)?;
        require_positive("local domain", local_size)?;
        let end = local_offset + local_size;
        if local_offset.min(Coord3::ZERO) != Coord3::ZERO || end.max(global_size) != global_size {
            return Err(SpaceError::LocalOutsideGlobal {
                offset: local_offset,
                size: local_size,
                global: global_size,
            });
        }
        Ok(Self {
            global: Domain {
                offset: Coord3::ZERO,
                size: global_size,
            },
            local: Domain {
                offset: local_offset,
                size: local_size,
            },
        })
    }

    /// Even split of `global_size` over `devices`, for `rank`.
    pub fn for_device(
        devices: &DeviceGrid,
        rank: DeviceRank,
        global_size: Coord3,
    ) -> Result<Self, SpaceError> {
        let shape = devices.shape();
        if global_size % shape != Coord3::ZERO {
            return Err(SpaceError::NotDivisible {
                name: "global domain",
                extent: global_size,
                by: shape,
            });
        }
        let local_size = global_size / shape;
        Self::init(global_size, local_size, devices.position_of(rank) * local_size)
    }

    /// The whole simulation domain.
    pub fn global_domain(&self) -> Domain {
        self.global
    }

    /// This device's part of the domain.
    pub fn local_domain(&self) -> Domain {
        self.local
    }
}
