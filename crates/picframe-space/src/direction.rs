//! Neighbour directions and direction masks.
//!
//! A 3-D subdomain has up to 26 neighbours: 6 faces, 12 edges and 8
//! corners. Each is identified by its offset in `{-1, 0, 1}^3` and encoded
//! base-3 with digit `0` for no offset, `1` for `+1` and `2` for `-1`:
//!
//! ```text
//! code = dx + 3 * dy + 9 * dz        (codes 1..=26, 0 is "self")
//! +x = 1   -x = 2   +y = 3   -y = 6   +z = 9   -z = 18
//! ```
//!
//! Combined directions add their face codes, e.g. `+x+y = 4`.

use std::fmt;

use picframe_core::Coord3;

/// Number of codes including the unused "self" code 0.
pub const NUMBER_OF_EXCHANGES: u32 = 27;

/// One of the 26 neighbour offsets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Direction(u32);

impl Direction {
    /// `+x`
    pub const RIGHT: Self = Self(1);
    /// `-x`
    pub const LEFT: Self = Self(2);
    /// `+y`
    pub const BOTTOM: Self = Self(3);
    /// `-y`
    pub const TOP: Self = Self(6);
    /// `+z`
    pub const BACK: Self = Self(9);
    /// `-z`
    pub const FRONT: Self = Self(18);

    /// Direction from its base-3 code. `None` for 0 or codes above 26.
    pub fn from_code(code: u32) -> Option<Self> {
        (1..NUMBER_OF_EXCHANGES).contains(&code).then_some(Self(code))
    }

    /// Direction from an offset in `{-1, 0, 1}^3`. `None` for the zero
    /// offset or components outside that range.
    pub fn from_offset(offset: Coord3) -> Option<Self> {
        let mut code = 0;
        let mut weight = 1;
        for d in offset.to_array() {
            let digit = match d {
                0 => 0,
                1 => 1,
                -1 => 2,
                _ => return None,
            };
            code += digit * weight;
            weight *= 3;
        }
        Self::from_code(code)
    }

    /// Base-3 code of this direction.
    pub fn code(self) -> u32 {
        self.0
    }

    /// Offset in `{-1, 0, 1}^3`.
    pub fn offset(self) -> Coord3 {
        let mut c = self.0;
        let mut out = [0i32; 3];
        for o in &mut out {
            *o = match c % 3 {
                1 => 1,
                2 => -1,
                _ => 0,
            };
            c /= 3;
        }
        Coord3::from_array(out)
    }

    /// The direction pointing the other way.
    pub fn opposite(self) -> Self {
        // Offsets are never zero, so the negation is always valid.
        Self::from_offset(-self.offset()).unwrap_or(self)
    }

    /// Number of non-zero axes: 1 for faces, 2 for edges, 3 for corners.
    pub fn rank(self) -> u32 {
        self.offset().to_array().iter().filter(|&&d| d != 0).count() as u32
    }

    /// All 26 directions in code order.
    pub fn all() -> impl Iterator<Item = Direction> {
        (1..NUMBER_OF_EXCHANGES).map(Direction)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.offset();
        for (name, d) in [("x", o.x), ("y", o.y), ("z", o.z)] {
            if d != 0 {
                write!(f, "{}{name}", if d > 0 { '+' } else { '-' })?;
            }
        }
        Ok(())
    }
}

/// A set of directions, one bit per code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DirectionMask(u32);

impl DirectionMask {
    /// No direction.
    pub const NONE: Self = Self(0);
    /// All 26 directions.
    pub const ALL: Self = Self(((1u32 << NUMBER_OF_EXCHANGES) - 1) & !1);
    /// The six face directions.
    pub const FACES: Self = Self(
        (1 << Direction::RIGHT.0)
            | (1 << Direction::LEFT.0)
            | (1 << Direction::BOTTOM.0)
            | (1 << Direction::TOP.0)
            | (1 << Direction::BACK.0)
            | (1 << Direction::FRONT.0),
    );

    /// Mask with exactly one direction.
    pub fn single(d: Direction) -> Self {
        Self(1 << d.0)
    }

    /// Raw bits (bit `n` set means code `n` is included).
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Whether `d` is in the set.
    pub fn contains(self, d: Direction) -> bool {
        self.0 & (1 << d.0) != 0
    }

    /// Add `d` to the set.
    pub fn insert(&mut self, d: Direction) {
        self.0 |= 1 << d.0;
    }

    /// Union of two sets.
    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Whether the set is empty.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of directions in the set.
    pub fn len(self) -> u32 {
        self.0.count_ones()
    }

    /// Directions in code order.
    pub fn iter(self) -> impl Iterator<Item = Direction> {
        Direction::all().filter(move |d| self.contains(*d))
    }
}

impl FromIterator<Direction> for DirectionMask {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        let mut mask = Self::NONE;
        for d in iter {
            mask.insert(d);
        }
        mask
    }
}
