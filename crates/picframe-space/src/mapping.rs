//! Supercell mapping and area classification.
//!
//! A [`MappingDescription`] fixes how a device's local domain is cut into
//! supercells and how those supercells map to linear [`SuperCellId`]s. The
//! supercell grid includes a guard ring of `guard_supercells` on every side.
//!
//! Cell coordinates used here are *local*: `(0, 0, 0)` is the first cell of
//! the CORE+BORDER region, so guard cells have negative coordinates or
//! coordinates at or beyond the local extent.

use std::ops::{BitOr, BitOrAssign};

use picframe_core::{Coord3, SuperCellId};

use crate::direction::Direction;
use crate::error::{require_positive, SpaceError};

/// Region classes of a subdomain, combinable with `|`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AreaType(u8);

impl AreaType {
    /// Interior supercells with no dependency on neighbours.
    pub const CORE: Self = Self(1);
    /// Supercells within one guard width of the guard ring.
    pub const BORDER: Self = Self(2);
    /// Halo copies of neighbour data.
    pub const GUARD: Self = Self(4);
    /// Every supercell of the grid.
    pub const ALL: Self = Self(7);

    /// Whether every class in `other` is also in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether `self` and `other` share a class.
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for AreaType {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for AreaType {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Read-only description of one device's supercell grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappingDescription {
    local_supercells: Coord3,
    supercell_size: Coord3,
    guard_supercells: Coord3,
}

impl MappingDescription {
    /// Build a mapping for a local domain of `local_cells` cells.
    ///
    /// `local_cells` must be a whole number of supercells in every axis.
    pub fn new(
        local_cells: Coord3,
        supercell_size: Coord3,
        guard_supercells: Coord3,
    ) -> Result<Self, SpaceError> {
        require_positive("local domain", local_cells)?;
        require_positive("supercell size", supercell_size)?;
        if guard_supercells.min(Coord3::ZERO) != Coord3::ZERO {
            return Err(SpaceError::NegativeGuard {
                guard: guard_supercells,
            });
        }
        if local_cells % supercell_size != Coord3::ZERO {
            return Err(SpaceError::NotDivisible {
                name: "local domain",
                extent: local_cells,
                by: supercell_size,
            });
        }
        Ok(Self {
            local_supercells: local_cells / supercell_size,
            supercell_size,
            guard_supercells,
        })
    }

    /// Supercells in CORE+BORDER per axis.
    pub fn local_supercells(&self) -> Coord3 {
        self.local_supercells
    }

    /// Cells per supercell per axis.
    pub fn supercell_size(&self) -> Coord3 {
        self.supercell_size
    }

    /// Guard width in supercells per axis.
    pub fn guard_supercells(&self) -> Coord3 {
        self.guard_supercells
    }

    /// Guard width in cells per axis.
    pub fn guard_cells(&self) -> Coord3 {
        self.guard_supercells * self.supercell_size
    }

    /// Cells in CORE+BORDER per axis.
    pub fn local_cells(&self) -> Coord3 {
        self.local_supercells * self.supercell_size
    }

    /// Supercell grid extent including the guard ring.
    pub fn grid_supercells(&self) -> Coord3 {
        self.local_supercells + self.guard_supercells * 2
    }

    /// Number of supercells including the guard ring.
    pub fn supercell_count(&self) -> usize {
        self.grid_supercells().volume()
    }

    /// Cells per supercell.
    pub fn cells_per_supercell(&self) -> u32 {
        self.supercell_size.volume() as u32
    }

    /// Linear id of a supercell coordinate (guard ring included).
    pub fn id_of(&self, supercell: Coord3) -> Option<SuperCellId> {
        supercell
            .to_linear(self.grid_supercells())
            .map(|i| SuperCellId(i as u32))
    }

    /// Supercell coordinate of a linear id.
    pub fn coord_of(&self, id: SuperCellId) -> Coord3 {
        Coord3::from_linear(id.index(), self.grid_supercells())
    }

    /// Supercell (guard ring included) containing a local cell.
    pub fn supercell_of_cell(&self, cell: Coord3) -> Coord3 {
        cell.div_floor(self.supercell_size) + self.guard_supercells
    }

    /// Linear index of a local cell within its supercell.
    pub fn local_cell_index(&self, cell: Coord3) -> u32 {
        let within = cell.rem_euclid(self.supercell_size);
        within.to_linear(self.supercell_size).unwrap_or(0) as u32
    }

    /// Local cell coordinate of the first cell of a supercell.
    pub fn origin_cell(&self, supercell: Coord3) -> Coord3 {
        (supercell - self.guard_supercells) * self.supercell_size
    }

    /// Region class of a supercell.
    pub fn area_of(&self, supercell: Coord3) -> AreaType {
        let g = self.guard_supercells.to_array();
        let n = self.local_supercells.to_array();
        let c = supercell.to_array();
        let mut border = false;
        for axis in 0..3 {
            if c[axis] < g[axis] || c[axis] >= g[axis] + n[axis] {
                return AreaType::GUARD;
            }
            if c[axis] < 2 * g[axis] || c[axis] >= n[axis] {
                border = true;
            }
        }
        if border {
            AreaType::BORDER
        } else {
            AreaType::CORE
        }
    }

    /// The side of the guard ring a guard supercell lies on, or `None` for
    /// CORE and BORDER supercells.
    pub fn guard_direction(&self, supercell: Coord3) -> Option<Direction> {
        let g = self.guard_supercells.to_array();
        let n = self.local_supercells.to_array();
        let c = supercell.to_array();
        let mut offset = [0i32; 3];
        for axis in 0..3 {
            if c[axis] < g[axis] {
                offset[axis] = -1;
            } else if c[axis] >= g[axis] + n[axis] {
                offset[axis] = 1;
            }
        }
        Direction::from_offset(Coord3::from_array(offset))
    }
}

/// Enumerates the supercells of a set of areas in linear order.
///
/// Each enumerated supercell is one block of a kernel launch.
#[derive(Clone, Debug)]
pub struct AreaMapper {
    area: AreaType,
    blocks: Vec<SuperCellId>,
}

impl AreaMapper {
    /// Collect every supercell of `mapping` whose class is in `area`.
    pub fn new(mapping: &MappingDescription, area: AreaType) -> Self {
        let blocks = mapping
            .grid_supercells()
            .iter_extent()
            .filter(|c| area.intersects(mapping.area_of(*c)))
            .filter_map(|c| mapping.id_of(c))
            .collect();
        Self { area, blocks }
    }

    /// Supercells on one side of the guard ring.
    pub fn guard_side(mapping: &MappingDescription, direction: Direction) -> Self {
        let blocks = mapping
            .grid_supercells()
            .iter_extent()
            .filter(|c| mapping.guard_direction(*c) == Some(direction))
            .filter_map(|c| mapping.id_of(c))
            .collect();
        Self {
            area: AreaType::GUARD,
            blocks,
        }
    }

    /// Area classes this mapper covers.
    pub fn area(&self) -> AreaType {
        self.area
    }

    /// Number of blocks in a launch over this mapper.
    pub fn grid_dim(&self) -> usize {
        self.blocks.len()
    }

    /// Supercell handled by `block`.
    pub fn supercell(&self, block: usize) -> SuperCellId {
        self.blocks[block]
    }

    /// All supercells in block order.
    pub fn supercells(&self) -> &[SuperCellId] {
        &self.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> MappingDescription {
        MappingDescription::new(Coord3::new(32, 32, 16), Coord3::new(8, 8, 4), Coord3::splat(1))
            .unwrap()
    }

    #[test]
    fn grid_includes_guard_ring() {
        let m = mapping();
        assert_eq!(m.local_supercells(), Coord3::new(4, 4, 4));
        assert_eq!(m.grid_supercells(), Coord3::new(6, 6, 6));
        assert_eq!(m.supercell_count(), 216);
        assert_eq!(m.cells_per_supercell(), 256);
    }

    #[test]
    fn indivisible_domain_rejected() {
        let err = MappingDescription::new(Coord3::new(30, 32, 16), Coord3::new(8, 8, 4), Coord3::splat(1));
        assert!(matches!(err, Err(SpaceError::NotDivisible { .. })));
    }

    #[test]
    fn area_classification() {
        let m = mapping();
        assert_eq!(m.area_of(Coord3::new(0, 2, 2)), AreaType::GUARD);
        assert_eq!(m.area_of(Coord3::new(5, 2, 2)), AreaType::GUARD);
        assert_eq!(m.area_of(Coord3::new(1, 2, 2)), AreaType::BORDER);
        assert_eq!(m.area_of(Coord3::new(4, 2, 2)), AreaType::BORDER);
        assert_eq!(m.area_of(Coord3::new(2, 2, 2)), AreaType::CORE);
    }

    #[test]
    fn mapper_counts_match_areas() {
        let m = mapping();
        let core = AreaMapper::new(&m, AreaType::CORE);
        let border = AreaMapper::new(&m, AreaType::BORDER);
        let guard = AreaMapper::new(&m, AreaType::GUARD);
        let all = AreaMapper::new(&m, AreaType::CORE | AreaType::BORDER | AreaType::GUARD);
        assert_eq!(core.grid_dim(), 8);
        assert_eq!(border.grid_dim(), 64 - 8);
        assert_eq!(guard.grid_dim(), 216 - 64);
        assert_eq!(all.grid_dim(), 216);
    }

    #[test]
    fn guard_sides_partition_the_ring() {
        let m = mapping();
        let total: usize = Direction::all()
            .map(|d| AreaMapper::guard_side(&m, d).grid_dim())
            .sum();
        assert_eq!(total, 216 - 64);
        assert_eq!(AreaMapper::guard_side(&m, Direction::RIGHT).grid_dim(), 16);
        let corner = Direction::from_offset(Coord3::new(1, 1, 1)).unwrap();
        assert_eq!(AreaMapper::guard_side(&m, corner).grid_dim(), 1);
    }

    #[test]
    fn cell_to_supercell_mapping() {
        let m = mapping();
        assert_eq!(m.supercell_of_cell(Coord3::ZERO), Coord3::splat(1));
        assert_eq!(m.supercell_of_cell(Coord3::new(-1, 0, 0)), Coord3::new(0, 1, 1));
        assert_eq!(m.supercell_of_cell(Coord3::new(8, 8, 4)), Coord3::splat(2));
        assert_eq!(m.local_cell_index(Coord3::new(9, 1, 5)), 1 + 8 + 64);
        assert_eq!(m.origin_cell(Coord3::splat(2)), Coord3::new(8, 8, 4));
    }

    #[test]
    fn id_roundtrip() {
        let m = mapping();
        let c = Coord3::new(3, 4, 5);
        let id = m.id_of(c).unwrap();
        assert_eq!(m.coord_of(id), c);
        assert_eq!(m.id_of(Coord3::new(6, 0, 0)), None);
    }
}
