//! Cell-level layout of one device's data, guard ring included.

use picframe_core::Coord3;

use crate::direction::Direction;
use crate::error::{require_positive, SpaceError};

/// Axis-aligned box of cells in guard-inclusive array coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRegion {
    /// First cell of the box.
    pub start: Coord3,
    /// Extent of the box.
    pub size: Coord3,
}

impl CellRegion {
    /// Number of cells in the box.
    pub fn volume(&self) -> usize {
        self.size.volume()
    }

    /// Cells of the box, x fastest.
    pub fn iter(&self) -> impl Iterator<Item = Coord3> {
        let start = self.start;
        self.size.iter_extent().map(move |c| c + start)
    }
}

/// Local data extent plus guard width, both in cells.
///
/// Array coordinates run from `0` to `data_space + 2 * guard`; the
/// CORE+BORDER data starts at `guard`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridLayout {
    data_space: Coord3,
    guard: Coord3,
}

impl GridLayout {
    /// Layout with `data_space` cells of data and `guard` cells of halo on
    /// each side.
    pub fn new(data_space: Coord3, guard: Coord3) -> Result<Self, SpaceError> {
        require_positive("data space", data_space)?;
        if guard.min(Coord3::ZERO) != Coord3::ZERO {
            return Err(SpaceError::NegativeGuard { guard });
        }
        Ok(Self { data_space, guard })
    }

    /// Cells of local data per axis.
    pub fn data_space(&self) -> Coord3 {
        self.data_space
    }

    /// Guard width in cells per axis.
    pub fn guard(&self) -> Coord3 {
        self.guard
    }

    /// Array extent including the guard on both sides.
    pub fn full_space(&self) -> Coord3 {
        self.data_space + self.guard * 2
    }

    /// Guard cells on the side facing `direction`.
    pub fn guard_region(&self, direction: Direction) -> CellRegion {
        let (g, n) = (self.guard.to_array(), self.data_space.to_array());
        let off = direction.offset().to_array();
        let mut start = [0i32; 3];
        let mut size = [0i32; 3];
        for axis in 0..3 {
            (start[axis], size[axis]) = match off[axis] {
                -1 => (0, g[axis]),
                0 => (g[axis], n[axis]),
                _ => (g[axis] + n[axis], g[axis]),
            };
        }
        CellRegion {
            start: Coord3::from_array(start),
            size: Coord3::from_array(size),
        }
    }

    /// Border cells a neighbour in `direction` mirrors into its guard.
    ///
    /// Same shape as [`guard_region`](Self::guard_region) for the same
    /// direction.
    pub fn border_region(&self, direction: Direction) -> CellRegion {
        let (g, n) = (self.guard.to_array(), self.data_space.to_array());
        let off = direction.offset().to_array();
        let mut start = [0i32; 3];
        let mut size = [0i32; 3];
        for axis in 0..3 {
            (start[axis], size[axis]) = match off[axis] {
                -1 => (g[axis], g[axis]),
                0 => (g[axis], n[axis]),
                _ => (n[axis], g[axis]),
            };
        }
        CellRegion {
            start: Coord3::from_array(start),
            size: Coord3::from_array(size),
        }
    }
}
