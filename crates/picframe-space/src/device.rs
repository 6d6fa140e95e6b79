//! Cartesian arrangement of devices and neighbour lookup.

use picframe_core::{Coord3, DeviceRank};
use smallvec::SmallVec;

use crate::direction::{Direction, DirectionMask};
use crate::edge::{resolve_axis, Boundary};
use crate::error::{require_positive, SpaceError};

/// Neighbours of one device, at most 26.
pub type NeighborList = SmallVec<[(Direction, DeviceRank); 26]>;

/// Devices arranged on a 3-D grid, one subdomain each.
///
/// Ranks are linear positions with x fastest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceGrid {
    shape: Coord3,
    boundaries: [Boundary; 3],
}

impl DeviceGrid {
    /// A grid of `shape` devices; `periodic` holds `1` for wrapping axes.
    pub fn new(shape: Coord3, periodic: Coord3) -> Result<Self, SpaceError> {
        require_positive("device grid", shape)?;
        Ok(Self {
            shape,
            boundaries: Boundary::from_flags(periodic),
        })
    }

    /// Devices per axis.
    pub fn shape(&self) -> Coord3 {
        self.shape
    }

    /// Per-axis boundary behaviour.
    pub fn boundaries(&self) -> [Boundary; 3] {
        self.boundaries
    }

    /// Total number of devices.
    pub fn device_count(&self) -> usize {
        self.shape.volume()
    }

    /// Grid position of a rank.
    pub fn position_of(&self, rank: DeviceRank) -> Coord3 {
        Coord3::from_linear(rank.index(), self.shape)
    }

    /// Rank at a grid position.
    pub fn rank_of(&self, position: Coord3) -> Result<DeviceRank, SpaceError> {
        position
            .to_linear(self.shape)
            .map(|i| DeviceRank(i as u32))
            .ok_or(SpaceError::CoordOutOfBounds {
                coord: position,
                extent: self.shape,
            })
    }

    /// Neighbour of `rank` in `direction`, or `None` across an absorbing
    /// edge. A single device along a periodic axis is its own neighbour.
    pub fn neighbor(&self, rank: DeviceRank, direction: Direction) -> Option<DeviceRank> {
        let pos = self.position_of(rank) + direction.offset();
        let mut out = [0i32; 3];
        for (axis, o) in out.iter_mut().enumerate() {
            *o = resolve_axis(pos.axis(axis), self.shape.axis(axis), self.boundaries[axis])?;
        }
        self.rank_of(Coord3::from_array(out)).ok()
    }

    /// Whether `rank` has a neighbour in `direction`.
    pub fn participates(&self, rank: DeviceRank, direction: Direction) -> bool {
        self.neighbor(rank, direction).is_some()
    }

    /// Directions in which `rank` has a neighbour.
    pub fn participating(&self, rank: DeviceRank) -> DirectionMask {
        Direction::all()
            .filter(|d| self.participates(rank, *d))
            .collect()
    }

    /// Every neighbour of `rank` in direction order.
    pub fn neighbors(&self, rank: DeviceRank) -> NeighborList {
        Direction::all()
            .filter_map(|d| self.neighbor(rank, d).map(|n| (d, n)))
            .collect()
    }

    /// Per-axis wrap when stepping from `rank` in `direction`.
    ///
    /// `-1` where the step leaves the high edge of the device grid and
    /// re-enters at the low edge, `+1` for the reverse, `0` otherwise.
    /// Multiplying by the global domain size gives the shift that maps a
    /// sender's global position into the receiver's frame.
    pub fn wrap_shift(&self, rank: DeviceRank, direction: Direction) -> Coord3 {
        let pos = self.position_of(rank) + direction.offset();
        let mut out = [0i32; 3];
        for (axis, o) in out.iter_mut().enumerate() {
            let p = pos.axis(axis);
            *o = if p < 0 {
                1
            } else if p >= self.shape.axis(axis) {
                -1
            } else {
                0
            };
        }
        Coord3::from_array(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_position_roundtrip() {
        let g = DeviceGrid::new(Coord3::new(2, 3, 1), Coord3::splat(1)).unwrap();
        assert_eq!(g.device_count(), 6);
        for r in 0..6 {
            let rank = DeviceRank(r);
            assert_eq!(g.rank_of(g.position_of(rank)).unwrap(), rank);
        }
        assert_eq!(g.position_of(DeviceRank(3)), Coord3::new(1, 1, 0));
    }

    #[test]
    fn periodic_neighbors_wrap() {
        let g = DeviceGrid::new(Coord3::new(2, 1, 1), Coord3::splat(1)).unwrap();
        assert_eq!(g.neighbor(DeviceRank(1), Direction::RIGHT), Some(DeviceRank(0)));
        assert_eq!(g.neighbor(DeviceRank(0), Direction::LEFT), Some(DeviceRank(1)));
        assert_eq!(g.wrap_shift(DeviceRank(1), Direction::RIGHT), Coord3::new(-1, 0, 0));
        assert_eq!(g.wrap_shift(DeviceRank(0), Direction::RIGHT), Coord3::ZERO);
    }

    #[test]
    fn single_periodic_device_is_its_own_neighbor() {
        let g = DeviceGrid::new(Coord3::splat(1), Coord3::splat(1)).unwrap();
        assert_eq!(g.neighbors(DeviceRank(0)).len(), 26);
        assert!(g.neighbors(DeviceRank(0)).iter().all(|(_, n)| *n == DeviceRank(0)));
    }

    #[test]
    fn absorbing_edges_have_no_neighbor() {
        let g = DeviceGrid::new(Coord3::new(2, 1, 1), Coord3::ZERO).unwrap();
        assert_eq!(g.neighbor(DeviceRank(0), Direction::LEFT), None);
        assert_eq!(g.neighbor(DeviceRank(0), Direction::RIGHT), Some(DeviceRank(1)));
        assert!(!g.participates(DeviceRank(1), Direction::RIGHT));
        assert_eq!(g.participating(DeviceRank(0)), DirectionMask::single(Direction::RIGHT));
    }

    #[test]
    fn rank_out_of_bounds() {
        let g = DeviceGrid::new(Coord3::splat(2), Coord3::ZERO).unwrap();
        assert!(g.rank_of(Coord3::new(2, 0, 0)).is_err());
    }
}
