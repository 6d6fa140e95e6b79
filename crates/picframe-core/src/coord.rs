//! Three-dimensional integer indices and float vectors.
//!
//! [`Coord3`] doubles as an index and as an extent. Linearisation is
//! always x-fastest, so `Coord3::new(1, 0, 0)` and `Coord3::new(0, 1, 0)`
//! are `1` and `extent.x` apart.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Rem, Sub};

/// A 3-D integer coordinate or extent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Coord3 {
    /// X component (fastest varying in linear order).
    pub x: i32,
    /// Y component.
    pub y: i32,
    /// Z component (slowest varying in linear order).
    pub z: i32,
}

impl Coord3 {
    /// The origin.
    pub const ZERO: Self = Self::new(0, 0, 0);

    /// Create a coordinate from its components.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// A coordinate with all components set to `v`.
    pub const fn splat(v: i32) -> Self {
        Self::new(v, v, v)
    }

    /// Components as an array, `[x, y, z]`.
    pub const fn to_array(self) -> [i32; 3] {
        [self.x, self.y, self.z]
    }

    /// Build from an array `[x, y, z]`.
    pub const fn from_array(a: [i32; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }

    /// Component by axis number (0 = x, 1 = y, 2 = z).
    ///
    /// # Panics
    ///
    /// Panics if `axis > 2`.
    pub fn axis(self, axis: usize) -> i32 {
        self.to_array()[axis]
    }

    /// Copy with one axis replaced.
    pub fn with_axis(self, axis: usize, value: i32) -> Self {
        let mut a = self.to_array();
        a[axis] = value;
        Self::from_array(a)
    }

    /// Product of the components, i.e. the number of points in an extent.
    ///
    /// Negative extents count as empty.
    pub fn volume(self) -> usize {
        if self.x <= 0 || self.y <= 0 || self.z <= 0 {
            return 0;
        }
        self.x as usize * self.y as usize * self.z as usize
    }

    /// Whether every component is strictly positive.
    pub fn is_positive(self) -> bool {
        self.x > 0 && self.y > 0 && self.z > 0
    }

    /// Whether `0 <= self < extent` holds component-wise.
    pub fn is_within(self, extent: Self) -> bool {
        (0..extent.x).contains(&self.x)
            && (0..extent.y).contains(&self.y)
            && (0..extent.z).contains(&self.z)
    }

    /// Linear index of `self` inside `extent`, x fastest.
    ///
    /// Returns `None` if `self` lies outside the extent.
    pub fn to_linear(self, extent: Self) -> Option<usize> {
        if !self.is_within(extent) {
            return None;
        }
        let (x, y, z) = (self.x as usize, self.y as usize, self.z as usize);
        Some(x + extent.x as usize * (y + extent.y as usize * z))
    }

    /// Inverse of [`to_linear`](Self::to_linear).
    pub fn from_linear(index: usize, extent: Self) -> Self {
        let ex = extent.x.max(1) as usize;
        let ey = extent.y.max(1) as usize;
        Self::new(
            (index % ex) as i32,
            ((index / ex) % ey) as i32,
            (index / (ex * ey)) as i32,
        )
    }

    /// Component-wise floor division (rounds toward negative infinity).
    pub fn div_floor(self, rhs: Self) -> Self {
        Self::new(
            self.x.div_euclid(rhs.x),
            self.y.div_euclid(rhs.y),
            self.z.div_euclid(rhs.z),
        )
    }

    /// Component-wise non-negative remainder.
    pub fn rem_euclid(self, rhs: Self) -> Self {
        Self::new(
            self.x.rem_euclid(rhs.x),
            self.y.rem_euclid(rhs.y),
            self.z.rem_euclid(rhs.z),
        )
    }

    /// Component-wise minimum.
    pub fn min(self, rhs: Self) -> Self {
        Self::new(self.x.min(rhs.x), self.y.min(rhs.y), self.z.min(rhs.z))
    }

    /// Component-wise maximum.
    pub fn max(self, rhs: Self) -> Self {
        Self::new(self.x.max(rhs.x), self.y.max(rhs.y), self.z.max(rhs.z))
    }

    /// Iterate every point of the extent in linear order.
    pub fn iter_extent(self) -> impl Iterator<Item = Coord3> {
        let extent = self;
        (0..extent.volume()).map(move |i| Coord3::from_linear(i, extent))
    }
}

impl fmt::Display for Coord3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

macro_rules! componentwise {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait for Coord3 {
            type Output = Coord3;
            fn $method(self, rhs: Coord3) -> Coord3 {
                Coord3::new(self.x $op rhs.x, self.y $op rhs.y, self.z $op rhs.z)
            }
        }

        impl $trait<i32> for Coord3 {
            type Output = Coord3;
            fn $method(self, rhs: i32) -> Coord3 {
                Coord3::new(self.x $op rhs, self.y $op rhs, self.z $op rhs)
            }
        }
    };
}

componentwise!(Add, add, +);
componentwise!(Sub, sub, -);
componentwise!(Mul, mul, *);
componentwise!(Div, div, /);
componentwise!(Rem, rem, %);

impl Neg for Coord3 {
    type Output = Coord3;
    fn neg(self) -> Coord3 {
        Coord3::new(-self.x, -self.y, -self.z)
    }
}

/// A 3-component float vector, as stored in particle attributes.
pub type Float3 = [f32; 3];

/// Small helpers for [`Float3`] arithmetic.
pub mod float3 {
    use super::{Coord3, Float3};

    /// `a + b`
    pub fn add(a: Float3, b: Float3) -> Float3 {
        [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
    }

    /// `a - b`
    pub fn sub(a: Float3, b: Float3) -> Float3 {
        [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
    }

    /// `a * s`
    pub fn scale(a: Float3, s: f32) -> Float3 {
        [a[0] * s, a[1] * s, a[2] * s]
    }

    /// Dot product.
    pub fn dot(a: Float3, b: Float3) -> f32 {
        a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
    }

    /// Integer cell containing a point, `floor` per component.
    pub fn cell_of(p: Float3) -> Coord3 {
        Coord3::new(
            p[0].floor() as i32,
            p[1].floor() as i32,
            p[2].floor() as i32,
        )
    }

    /// Convert an integer coordinate to floats.
    pub fn from_coord(c: Coord3) -> Float3 {
        [c.x as f32, c.y as f32, c.z as f32]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn volume_of_supercell() {
        assert_eq!(Coord3::new(8, 8, 4).volume(), 256);
        assert_eq!(Coord3::new(8, 0, 4).volume(), 0);
        assert_eq!(Coord3::new(-1, 2, 2).volume(), 0);
    }

    #[test]
    fn linear_order_is_x_fastest() {
        let extent = Coord3::new(8, 8, 4);
        assert_eq!(Coord3::new(1, 0, 0).to_linear(extent), Some(1));
        assert_eq!(Coord3::new(0, 1, 0).to_linear(extent), Some(8));
        assert_eq!(Coord3::new(0, 0, 1).to_linear(extent), Some(64));
        assert_eq!(Coord3::new(8, 0, 0).to_linear(extent), None);
    }

    #[test]
    fn div_floor_rounds_down_for_negatives() {
        let c = Coord3::new(-1, 7, 8).div_floor(Coord3::splat(8));
        assert_eq!(c, Coord3::new(-1, 0, 1));
        assert_eq!(Coord3::new(-1, 7, 8).rem_euclid(Coord3::splat(8)), Coord3::new(7, 7, 0));
    }

    #[test]
    fn cell_of_floors() {
        assert_eq!(float3::cell_of([0.5, -0.25, 3.0]), Coord3::new(0, -1, 3));
    }

    #[test]
    fn iter_extent_visits_every_point_once() {
        let extent = Coord3::new(3, 2, 2);
        let all: Vec<_> = extent.iter_extent().collect();
        assert_eq!(all.len(), 12);
        assert_eq!(all[0], Coord3::ZERO);
        assert_eq!(all[11], Coord3::new(2, 1, 1));
    }

    proptest! {
        #[test]
        fn linear_roundtrip(x in 1i32..16, y in 1i32..16, z in 1i32..16, seed in 0usize..4096) {
            let extent = Coord3::new(x, y, z);
            let index = seed % extent.volume();
            let c = Coord3::from_linear(index, extent);
            prop_assert_eq!(c.to_linear(extent), Some(index));
        }
    }
}
